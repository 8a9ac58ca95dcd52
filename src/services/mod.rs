pub(crate) mod essay_grading;
pub(crate) mod penalty;
pub(crate) mod scoring;
pub(crate) mod settlement;
pub(crate) mod shuffle;
