use chrono::Local;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::refine::error::RefineError;
use crate::refine::types::{EdgeMap, Record, Rotation};

/// Something worth reporting while a table is refined.
#[derive(Debug)]
pub enum RefineEvent<'a> {
    RowStarted {
        row: usize,
        total: usize,
        record: &'a Record,
    },
    Context {
        iteration: usize,
        context: &'a EdgeMap<Vec<String>>,
    },
    Prompt {
        iteration: usize,
        max_iterations: usize,
        prompt: &'a str,
    },
    Response {
        row: usize,
        iteration: usize,
        response: &'a str,
        elapsed: Duration,
    },
    ResponderFailed {
        row: usize,
        iteration: usize,
        error: &'a str,
    },
    Rotated {
        rotation: &'a Rotation,
    },
    Exhausted {
        row: usize,
        rotation: &'a Rotation,
    },
    ReachedLimit {
        row: usize,
    },
    RecordFailed {
        row: usize,
        error: &'a RefineError,
    },
}

/// Receives loop events. Observers are for visibility only and cannot
/// influence the run.
pub trait RefineObserver: Send {
    fn on_event(&mut self, event: &RefineEvent<'_>);
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NullObserver;

impl RefineObserver for NullObserver {
    fn on_event(&mut self, _event: &RefineEvent<'_>) {}
}

/// Fans each event out to several observers, in order.
#[derive(Default)]
pub struct Observers<'a> {
    inner: Vec<&'a mut dyn RefineObserver>,
}

impl<'a> Observers<'a> {
    pub fn new() -> Self {
        Self { inner: Vec::new() }
    }

    pub fn with(mut self, observer: &'a mut dyn RefineObserver) -> Self {
        self.inner.push(observer);
        self
    }
}

impl RefineObserver for Observers<'_> {
    fn on_event(&mut self, event: &RefineEvent<'_>) {
        for observer in self.inner.iter_mut() {
            observer.on_event(event);
        }
    }
}

/// Reports events through `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl RefineObserver for TracingObserver {
    fn on_event(&mut self, event: &RefineEvent<'_>) {
        match event {
            RefineEvent::RowStarted { row, total, record } => tracing::info!(
                row,
                total,
                source = %record.subj_name,
                target = %record.obj_name,
                edges = record.final_context_pmids.len(),
                "processing row"
            ),
            RefineEvent::Context { iteration, context } => tracing::debug!(
                iteration,
                context = ?context,
                "iteration context"
            ),
            RefineEvent::Prompt {
                iteration, prompt, ..
            } => tracing::debug!(iteration, chars = prompt.len(), "prompt built"),
            RefineEvent::Response {
                row,
                iteration,
                elapsed,
                ..
            } => tracing::info!(
                row,
                iteration,
                seconds = elapsed.as_secs_f64(),
                "response received"
            ),
            RefineEvent::ResponderFailed {
                row,
                iteration,
                error,
            } => tracing::warn!(row, iteration, error, "responder call failed"),
            RefineEvent::Rotated { rotation } => tracing::debug!(
                edge = rotation.edge(),
                dropped = rotation.dropped(),
                added = rotation.added(),
                "rotated reference"
            ),
            RefineEvent::Exhausted { row, rotation } => tracing::info!(
                row,
                edge = rotation.edge(),
                "references exhausted, stopping early"
            ),
            RefineEvent::ReachedLimit { row } => {
                tracing::info!(row, "reached max iteration")
            }
            RefineEvent::RecordFailed { row, error } => {
                tracing::error!(row, error = %error, "record failed")
            }
        }
    }
}

/// Plain-text run log, one file per run, named after its start time.
///
/// Lines look like `2024-05-01 12:00:00,123 - <message>`. Write failures do
/// not interrupt the run; the first one is reported by [`FileRunLog::finish`].
pub struct FileRunLog {
    path: PathBuf,
    writer: BufWriter<File>,
    error: Option<io::Error>,
}

impl FileRunLog {
    /// Create `llm_context_log_<YYYYmmdd_HHMMSS>.txt` inside `log_dir`,
    /// creating the directory if needed.
    pub fn create(log_dir: impl AsRef<Path>) -> io::Result<Self> {
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir)?;
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = log_dir.join(format!("llm_context_log_{timestamp}.txt"));
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            error: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and close the log, returning its path.
    pub fn finish(mut self) -> io::Result<PathBuf> {
        self.writer.flush()?;
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(self.path.clone()),
        }
    }

    fn line(&mut self, message: &str) {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S,%3f");
        if let Err(err) = writeln!(self.writer, "{timestamp} - {message}") {
            self.error.get_or_insert(err);
        }
    }
}

impl RefineObserver for FileRunLog {
    fn on_event(&mut self, event: &RefineEvent<'_>) {
        match event {
            RefineEvent::RowStarted { row, total, record } => {
                let rule = "=".repeat(80);
                self.line(&rule);
                self.line(&format!(
                    "Processing Row {row}/{total}: Source={}, Target={}",
                    record.subj_name, record.obj_name
                ));
                self.line(&rule);
            }
            RefineEvent::Context { iteration, context } => {
                let context = serde_json::to_string(context).unwrap_or_default();
                self.line(&format!("Context for iteration {iteration}: {context}"));
            }
            RefineEvent::Prompt {
                iteration,
                max_iterations,
                prompt,
            } => {
                self.line(&format!(
                    "Iteration {iteration}/{max_iterations}: Full prompt sent to LLM:"
                ));
                self.line(prompt);
            }
            RefineEvent::Response {
                row,
                iteration,
                response,
                elapsed,
            } => {
                self.line(&format!(
                    "Response received for Row {row}, Iteration {iteration}: {response}"
                ));
                self.line(&format!(
                    "Response time: {:.2} seconds",
                    elapsed.as_secs_f64()
                ));
            }
            RefineEvent::ResponderFailed {
                row,
                iteration,
                error,
            } => self.line(&format!(
                "Failed to get LLM response for Row {row}, Iteration {iteration}: {error}"
            )),
            RefineEvent::Rotated { rotation } => {
                let dropped = rotation.dropped().unwrap_or("none");
                let message = match rotation.added() {
                    Some(added) => format!(
                        "Replaced PMID {dropped} with {added} in edge {}",
                        rotation.edge()
                    ),
                    None => format!(
                        "Dropped PMID {dropped} from edge {} with no replacement available",
                        rotation.edge()
                    ),
                };
                self.line(&message);
            }
            RefineEvent::Exhausted { row, .. } => self.line(&format!(
                "Not Enough PMIDs to be found for Row {row}. Stopping early."
            )),
            RefineEvent::ReachedLimit { row } => {
                self.line(&format!("Reached max iteration for Row {row}."))
            }
            RefineEvent::RecordFailed { row, error } => {
                self.line(&format!("Processing failed for Row {row}: {error}"))
            }
        }
    }
}

impl Drop for FileRunLog {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record() -> Record {
        let candidates: EdgeMap<Vec<String>> =
            [("treats", vec!["1".to_string()])].into_iter().collect();
        Record::new("Aspirin", "Stroke", candidates)
    }

    #[test]
    fn test_file_log_writes_timestamped_lines() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let log_dir = temp_dir.path().join("logs");
        let mut log = FileRunLog::create(&log_dir).unwrap();

        let record = record();
        let rotation = Rotation::Swapped {
            edge: "treats".to_string(),
            dropped: "1".to_string(),
            added: "2".to_string(),
        };
        log.on_event(&RefineEvent::RowStarted {
            row: 0,
            total: 1,
            record: &record,
        });
        log.on_event(&RefineEvent::Rotated {
            rotation: &rotation,
        });
        log.on_event(&RefineEvent::ReachedLimit { row: 0 });

        let path = log.finish().unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("llm_context_log_") && name.ends_with(".txt"));

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines.iter().all(|line| line.contains(" - ")));
        assert!(lines[1].ends_with("Processing Row 0/1: Source=Aspirin, Target=Stroke"));
        assert!(lines[3].ends_with("Replaced PMID 1 with 2 in edge treats"));
        assert!(lines[4].ends_with("Reached max iteration for Row 0."));
    }

    #[test]
    fn test_observers_fan_out_in_order() {
        use std::sync::{Arc, Mutex};

        struct Tag(&'static str, Arc<Mutex<Vec<&'static str>>>);
        impl RefineObserver for Tag {
            fn on_event(&mut self, _event: &RefineEvent<'_>) {
                self.1.lock().unwrap().push(self.0);
            }
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut first = Tag("first", seen.clone());
        let mut null = NullObserver;
        let mut second = Tag("second", seen.clone());
        let mut observers = Observers::new()
            .with(&mut first)
            .with(&mut null)
            .with(&mut second);

        observers.on_event(&RefineEvent::ReachedLimit { row: 3 });

        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
    }
}
