// ctxloop library - iterative evidence-context refinement for LLM explanations

pub mod config;
pub use config::{ApiMode, CtxloopConfig, RecordErrorPolicy, RefineConfig, RefineSettings};

pub mod cmds;
pub mod json_mode;
pub mod logging;
pub mod refine;
pub mod responder;
pub mod store;
pub mod table;

pub use refine::{RefineError, Refiner};
pub use responder::Responder;
pub use store::{JsonlAbstractStore, MemoryStore, ReferenceStore};
pub use table::Table;
