pub mod prompt;
pub mod refine;
