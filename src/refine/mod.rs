pub mod engine;
pub mod error;
pub mod observer;
pub mod policy;
pub mod prompt;
pub mod rotation;
pub mod types;

pub use engine::{RecordOutcome, Refiner};
pub use error::RefineError;
pub use observer::{
    FileRunLog, NullObserver, Observers, RefineEvent, RefineObserver, TracingObserver,
};
pub use policy::{FirstPolicy, RandomPolicy, SelectionPolicy};
pub use prompt::build_prompt;
pub use types::{
    EdgeMap, IterationRecord, ModelReply, Record, RecordResult, Rotation, StopReason,
};
