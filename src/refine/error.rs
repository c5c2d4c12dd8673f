#[derive(Debug)]
pub enum RefineError {
    /// The reference store has no entry for this id.
    MissingReference(String),
    /// The reference store has an entry for this id, but it is empty.
    EmptyReference(String),
    NoAbstracts,
    NoEdges,
    InvalidConfig(String),
    InvalidRecord { row: usize, message: String },
    RecordFailed { row: usize, source: Box<RefineError> },
    IoError(std::io::Error),
    SerializationError(serde_json::Error),
}

impl RefineError {
    /// Failures that make a single record unusable, as opposed to problems
    /// with the run as a whole.
    pub fn is_record_fatal(&self) -> bool {
        matches!(
            self,
            RefineError::MissingReference(_)
                | RefineError::EmptyReference(_)
                | RefineError::NoAbstracts
                | RefineError::NoEdges
                | RefineError::InvalidRecord { .. }
        )
    }
}

impl From<std::io::Error> for RefineError {
    fn from(err: std::io::Error) -> Self {
        RefineError::IoError(err)
    }
}

impl From<serde_json::Error> for RefineError {
    fn from(err: serde_json::Error) -> Self {
        RefineError::SerializationError(err)
    }
}

impl std::fmt::Display for RefineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefineError::MissingReference(id) => write!(f, "PMID {id} not found in the database."),
            RefineError::EmptyReference(id) => write!(f, "No abstract found for PMID: {id}"),
            RefineError::NoAbstracts => write!(f, "No abstracts retrieved for the selected PMIDs."),
            RefineError::NoEdges => write!(f, "Record has no edges to rotate"),
            RefineError::InvalidConfig(msg) => write!(f, "Invalid configuration: {msg}"),
            RefineError::InvalidRecord { row, message } => {
                write!(f, "Invalid record at row {row}: {message}")
            }
            RefineError::RecordFailed { row, source } => {
                write!(f, "Processing failed for row {row}: {source}")
            }
            RefineError::IoError(err) => write!(f, "IO error: {err}"),
            RefineError::SerializationError(err) => write!(f, "Serialization error: {err}"),
        }
    }
}

impl std::error::Error for RefineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RefineError::RecordFailed { source, .. } => Some(source.as_ref()),
            RefineError::IoError(err) => Some(err),
            RefineError::SerializationError(err) => Some(err),
            _ => None,
        }
    }
}
