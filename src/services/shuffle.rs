use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{seq::SliceRandom, SeedableRng};

use crate::db::models::{Question, QuestionOption};

/// Presentation snapshot for one attempt. Computed once from the attempt's
/// seed when the attempt is created and persisted verbatim; later edits to
/// the question bank never change what an in-flight attempt displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FrozenOrder {
    pub(crate) question_order: Vec<String>,
    pub(crate) option_orders: HashMap<String, Vec<String>>,
}

pub(crate) fn freeze_order(
    seed: u64,
    questions: &[Question],
    options: &[QuestionOption],
    shuffle_questions: bool,
    shuffle_options: bool,
) -> FrozenOrder {
    let mut rng = StdRng::seed_from_u64(seed);

    let mut question_order: Vec<String> = questions.iter().map(|q| q.id.clone()).collect();
    if shuffle_questions {
        question_order.shuffle(&mut rng);
    }

    // Options are grouped and shuffled in authoring order so the result
    // depends only on the seed, not on the question shuffle above.
    let mut option_orders: HashMap<String, Vec<String>> = HashMap::new();
    for question in questions {
        let mut ids: Vec<String> = options
            .iter()
            .filter(|option| option.question_id == question.id)
            .map(|option| option.id.clone())
            .collect();
        if ids.is_empty() {
            continue;
        }
        if shuffle_options {
            ids.shuffle(&mut rng);
        }
        option_orders.insert(question.id.clone(), ids);
    }

    FrozenOrder { question_order, option_orders }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::QuestionType;
    use time::macros::datetime;

    fn question(id: &str, order_index: i32) -> Question {
        Question {
            id: id.to_string(),
            test_id: "test-1".to_string(),
            question_type: QuestionType::MultipleChoice,
            question_text: format!("Question {id}"),
            marks: 1.0,
            order_index,
            created_at: datetime!(2024-01-01 00:00:00),
            updated_at: datetime!(2024-01-01 00:00:00),
        }
    }

    fn option(id: &str, question_id: &str, order_index: i32) -> QuestionOption {
        QuestionOption {
            id: id.to_string(),
            question_id: question_id.to_string(),
            option_text: format!("Option {id}"),
            is_correct: false,
            order_index,
            created_at: datetime!(2024-01-01 00:00:00),
        }
    }

    fn fixture() -> (Vec<Question>, Vec<QuestionOption>) {
        let questions = vec![question("q1", 0), question("q2", 1), question("q3", 2)];
        let options = vec![
            option("o1", "q1", 0),
            option("o2", "q1", 1),
            option("o3", "q1", 2),
            option("o4", "q2", 0),
            option("o5", "q2", 1),
        ];
        (questions, options)
    }

    #[test]
    fn same_seed_produces_same_order() {
        let (questions, options) = fixture();
        let first = freeze_order(42, &questions, &options, true, true);
        let second = freeze_order(42, &questions, &options, true, true);
        assert_eq!(first, second);
    }

    #[test]
    fn shuffling_disabled_keeps_authoring_order() {
        let (questions, options) = fixture();
        let frozen = freeze_order(7, &questions, &options, false, false);
        assert_eq!(frozen.question_order, vec!["q1", "q2", "q3"]);
        assert_eq!(frozen.option_orders["q1"], vec!["o1", "o2", "o3"]);
        assert_eq!(frozen.option_orders["q2"], vec!["o4", "o5"]);
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let (questions, options) = fixture();
        let frozen = freeze_order(99, &questions, &options, true, true);

        let mut question_ids = frozen.question_order.clone();
        question_ids.sort();
        assert_eq!(question_ids, vec!["q1", "q2", "q3"]);

        let mut q1_options = frozen.option_orders["q1"].clone();
        q1_options.sort();
        assert_eq!(q1_options, vec!["o1", "o2", "o3"]);
    }

    #[test]
    fn questions_without_options_are_omitted_from_option_orders() {
        let (questions, options) = fixture();
        let frozen = freeze_order(1, &questions, &options, true, true);
        assert!(!frozen.option_orders.contains_key("q3"));
    }
}
