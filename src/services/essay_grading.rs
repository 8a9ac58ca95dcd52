use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::config::Settings;

const GRADING_SYSTEM_PROMPT: &str = r#"You are an experienced university examiner.
Your task is to grade a student's essay answer against the question, awarding marks out of the stated maximum.

Grading criteria:
1. Relevance to the question asked
2. Factual correctness
3. Depth and structure of the argument
4. Clarity of expression

Respond with strict JSON only:
{
  "marks": <number between 0 and the stated maximum>,
  "feedback": "Concise feedback for the student explaining the grade"
}
"#;

#[derive(Debug, Clone)]
pub(crate) struct EssayGrade {
    pub(crate) marks: f64,
    pub(crate) feedback: String,
}

#[derive(Debug, Clone)]
pub(crate) struct EssayGradingService {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl EssayGradingService {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.ai().ai_request_timeout);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: settings.ai().openai_api_key.clone(),
            base_url: settings.ai().openai_base_url.trim_end_matches('/').to_string(),
            model: settings.ai().ai_model.clone(),
            max_tokens: settings.ai().ai_max_tokens,
        })
    }

    pub(crate) async fn grade_essay(
        &self,
        question_text: &str,
        max_marks: f64,
        answer_text: &str,
    ) -> Result<EssayGrade> {
        let user_prompt = format!(
            "Question (maximum {max_marks} marks):\n{question_text}\n\nStudent's answer:\n{answer_text}\n\nGrade the answer and respond in the JSON format described in the system prompt."
        );

        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": GRADING_SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt}
            ],
            "max_completion_tokens": self.max_tokens,
            "response_format": {"type": "json_object"}
        });

        let url = format!("{}/chat/completions", self.base_url);
        let mut last_error = None;
        let mut body = Value::Null;

        for attempt in 0u64..=3 {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_secs(2 * attempt)).await;
            }

            let response =
                self.client.post(&url).bearer_auth(&self.api_key).json(&payload).send().await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    body = resp.json().await.unwrap_or(Value::Null);
                    if status.is_success() {
                        last_error = None;
                        break;
                    }
                    last_error = Some(anyhow!("OpenAI API error: {body}"));
                }
                Err(err) => {
                    last_error = Some(anyhow!(err).context("Failed to call OpenAI API"));
                }
            }
        }

        if let Some(err) = last_error {
            return Err(err);
        }

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("AI response missing message content: {body}"))?;

        parse_grade(content, max_marks)
    }
}

fn parse_grade(content: &str, max_marks: f64) -> Result<EssayGrade> {
    let parsed: Value =
        serde_json::from_str(content.trim()).context("AI response was not valid JSON")?;

    let marks =
        parsed["marks"].as_f64().ok_or_else(|| anyhow!("AI response missing numeric marks"))?;
    let feedback = parsed["feedback"].as_str().unwrap_or_default().to_string();

    Ok(EssayGrade { marks: marks.clamp(0.0, max_marks), feedback })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_grade_reads_marks_and_feedback() {
        let grade =
            parse_grade(r#"{"marks": 7.5, "feedback": "Solid answer."}"#, 10.0).expect("grade");
        assert_eq!(grade.marks, 7.5);
        assert_eq!(grade.feedback, "Solid answer.");
    }

    #[test]
    fn parse_grade_clamps_to_maximum() {
        let grade = parse_grade(r#"{"marks": 42, "feedback": ""}"#, 10.0).expect("grade");
        assert_eq!(grade.marks, 10.0);
    }

    #[test]
    fn parse_grade_clamps_negative_to_zero() {
        let grade = parse_grade(r#"{"marks": -3, "feedback": ""}"#, 10.0).expect("grade");
        assert_eq!(grade.marks, 0.0);
    }

    #[test]
    fn parse_grade_rejects_non_json() {
        assert!(parse_grade("the answer deserves 5 marks", 10.0).is_err());
    }

    #[test]
    fn parse_grade_rejects_missing_marks() {
        assert!(parse_grade(r#"{"feedback": "nice"}"#, 10.0).is_err());
    }
}
