use serde::Serialize;

// Refine
#[derive(Debug, Serialize)]
pub struct RefineOutput {
    pub input_path: String,
    pub output_path: String,
    pub log_path: Option<String>,
    pub rows: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub stopped_early: usize,
    pub reached_limit: usize,
    pub model_calls: usize,
    pub failed_model_calls: usize,
}

// Prompt preview
#[derive(Debug, Serialize)]
pub struct PromptOutput {
    pub row: usize,
    pub source: String,
    pub target: String,
    pub context: serde_json::Value,
    pub prompt: String,
}

// Error output
#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub error: String,
    pub error_type: String,
}
