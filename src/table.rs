use serde_json::{Map, Value, json};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::refine::engine::RecordOutcome;
use crate::refine::error::RefineError;
use crate::refine::types::{Record, RecordResult};

pub const RESPONSES_COLUMN: &str = "respond_llm";
pub const RESPONSE_TIMES_COLUMN: &str = "respond_time_llm";
pub const PROMPTS_COLUMN: &str = "prompts_per_iteration";
pub const CONTEXTS_COLUMN: &str = "pmid_contexts_per_iteration";
pub const CHANGES_COLUMN: &str = "pmid_changes_per_iteration";
pub const ERROR_COLUMN: &str = "refine_error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// A single JSON array of row objects
    Json,
    /// One row object per line
    JsonLines,
}

impl TableFormat {
    /// `.jsonl` and `.ndjson` are line-oriented, anything else is a JSON array.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .as_deref()
        {
            Some("jsonl") | Some("ndjson") => TableFormat::JsonLines,
            _ => TableFormat::Json,
        }
    }
}

/// The five per-row result columns, plus the failure column.
///
/// Each vector has one entry per input row; failed rows hold `null`.
#[derive(Debug, Default)]
pub struct ResultColumns {
    pub responses: Vec<Value>,
    pub response_times: Vec<Value>,
    pub prompts: Vec<Value>,
    pub contexts: Vec<Value>,
    pub changes: Vec<Value>,
    pub errors: Vec<Value>,
}

impl ResultColumns {
    pub fn from_outcomes(outcomes: &[RecordOutcome]) -> Result<Self, RefineError> {
        let mut columns = Self::default();
        for outcome in outcomes {
            match outcome {
                Ok(result) => columns.push_result(result)?,
                Err(err) => columns.push_failure(err),
            }
        }
        Ok(columns)
    }

    fn push_result(&mut self, result: &RecordResult) -> Result<(), RefineError> {
        let its = &result.iterations;
        self.responses.push(Value::Array(
            its.iter()
                .map(|it| json!({"iteration": it.iteration, "response": it.reply.text()}))
                .collect(),
        ));
        self.response_times.push(Value::Array(
            its.iter().map(|it| json!(it.reply.seconds())).collect(),
        ));
        self.prompts.push(Value::Array(
            its.iter().map(|it| Value::String(it.prompt.clone())).collect(),
        ));
        self.contexts.push(Value::Array(
            its.iter()
                .map(|it| serde_json::to_value(&it.context))
                .collect::<Result<_, _>>()?,
        ));
        self.changes.push(Value::Array(
            its.iter()
                .map(|it| serde_json::to_value(&it.rotation))
                .collect::<Result<_, _>>()?,
        ));
        self.errors.push(Value::Null);
        Ok(())
    }

    fn push_failure(&mut self, err: &RefineError) {
        self.responses.push(Value::Null);
        self.response_times.push(Value::Null);
        self.prompts.push(Value::Null);
        self.contexts.push(Value::Null);
        self.changes.push(Value::Null);
        self.errors.push(Value::String(err.to_string()));
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

/// Rows as loose JSON objects. Columns the refiner does not know about are
/// carried through untouched.
#[derive(Debug, Clone, Default)]
pub struct Table {
    rows: Vec<Map<String, Value>>,
}

impl Table {
    pub fn from_rows(rows: Vec<Map<String, Value>>) -> Self {
        Self { rows }
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, RefineError> {
        let path = path.as_ref();
        match TableFormat::from_path(path) {
            TableFormat::Json => {
                let contents = fs::read_to_string(path)?;
                let rows: Vec<Map<String, Value>> = serde_json::from_str(&contents)?;
                Ok(Self { rows })
            }
            TableFormat::JsonLines => {
                let reader = BufReader::new(File::open(path)?);
                let mut rows = Vec::new();
                for line in reader.lines() {
                    let line = line?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    rows.push(serde_json::from_str(&line)?);
                }
                Ok(Self { rows })
            }
        }
    }

    pub fn rows(&self) -> &[Map<String, Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Typed view of every row. A row that does not parse stays in place as
    /// its `InvalidRecord` error.
    pub fn records(&self) -> Vec<Result<Record, RefineError>> {
        self.rows
            .iter()
            .enumerate()
            .map(|(row, fields)| self.record_from(row, fields))
            .collect()
    }

    pub fn record(&self, row: usize) -> Result<Record, RefineError> {
        let fields = self.rows.get(row).ok_or_else(|| RefineError::InvalidRecord {
            row,
            message: format!("table has only {} rows", self.rows.len()),
        })?;
        self.record_from(row, fields)
    }

    fn record_from(&self, row: usize, fields: &Map<String, Value>) -> Result<Record, RefineError> {
        serde_json::from_value(Value::Object(fields.clone())).map_err(|err| {
            RefineError::InvalidRecord {
                row,
                message: err.to_string(),
            }
        })
    }

    /// Add the result columns to every row, matching by position.
    pub fn augment(&mut self, columns: ResultColumns) -> Result<(), RefineError> {
        if columns.len() != self.rows.len() {
            return Err(RefineError::InvalidConfig(format!(
                "{} results for {} rows",
                columns.len(),
                self.rows.len()
            )));
        }

        let ResultColumns {
            responses,
            response_times,
            prompts,
            contexts,
            changes,
            errors,
        } = columns;

        let values = responses
            .into_iter()
            .zip(response_times)
            .zip(prompts)
            .zip(contexts)
            .zip(changes)
            .zip(errors);

        for (row, (((((response, time), prompt), context), change), error)) in
            self.rows.iter_mut().zip(values)
        {
            row.insert(RESPONSES_COLUMN.to_string(), response);
            row.insert(RESPONSE_TIMES_COLUMN.to_string(), time);
            row.insert(PROMPTS_COLUMN.to_string(), prompt);
            row.insert(CONTEXTS_COLUMN.to_string(), context);
            row.insert(CHANGES_COLUMN.to_string(), change);
            row.insert(ERROR_COLUMN.to_string(), error);
        }
        Ok(())
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), RefineError> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        match TableFormat::from_path(path) {
            TableFormat::Json => {
                serde_json::to_writer_pretty(&mut writer, &self.rows)?;
                writeln!(writer)?;
            }
            TableFormat::JsonLines => {
                for row in &self.rows {
                    serde_json::to_writer(&mut writer, row)?;
                    writeln!(writer)?;
                }
            }
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refine::types::{EdgeMap, IterationRecord, ModelReply, Rotation, StopReason};
    use std::time::Duration;
    use tempfile::TempDir;

    fn sample_rows() -> Vec<Map<String, Value>> {
        let rows = json!([
            {
                "subj_name": "Aspirin",
                "obj_name": "Stroke",
                "final_context_pmids": {"inhibits": [1, 2, 3], "activates": [4]},
                "path_id": 17
            },
            {
                "subj_name": "Caffeine",
                "obj_name": "Migraine",
                "final_context_pmids": {"affects": ["9"]}
            }
        ]);
        serde_json::from_value(rows).unwrap()
    }

    fn finished() -> RecordResult {
        let context: EdgeMap<Vec<String>> = [("inhibits", vec!["1".to_string(), "2".to_string()])]
            .into_iter()
            .collect();
        RecordResult {
            iterations: vec![
                IterationRecord {
                    iteration: 1,
                    prompt: "p1".to_string(),
                    reply: ModelReply::Answered {
                        text: "r1".to_string(),
                        elapsed: Duration::from_millis(1500),
                    },
                    context: context.clone(),
                    rotation: Rotation::Swapped {
                        edge: "inhibits".to_string(),
                        dropped: "1".to_string(),
                        added: "3".to_string(),
                    },
                },
                IterationRecord {
                    iteration: 2,
                    prompt: "p2".to_string(),
                    reply: ModelReply::Failed {
                        error: "timeout".to_string(),
                    },
                    context,
                    rotation: Rotation::MaxIteration,
                },
            ],
            stop: StopReason::ReachedLimit,
        }
    }

    #[test]
    fn test_records_from_rows() {
        let table = Table::from_rows(sample_rows());
        let records: Vec<Record> = table
            .records()
            .into_iter()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].subj_name, "Aspirin");
        assert_eq!(
            records[0].final_context_pmids.get("inhibits").unwrap(),
            &vec!["1".to_string(), "2".to_string(), "3".to_string()]
        );
        let edges: Vec<&str> = records[0].final_context_pmids.keys().collect();
        assert_eq!(edges, vec!["inhibits", "activates"]);
        assert!(table.record(5).is_err());
    }

    #[test]
    fn test_invalid_row_reports_position() {
        let mut rows = sample_rows();
        rows[1].remove("obj_name");
        let table = Table::from_rows(rows);
        let records = table.records();
        assert_eq!(records.len(), 2);
        assert!(records[0].is_ok());
        assert!(matches!(
            records[1],
            Err(RefineError::InvalidRecord { row: 1, .. })
        ));
    }

    #[test]
    fn test_augment_adds_result_columns() {
        let mut table = Table::from_rows(sample_rows());
        let outcomes: Vec<RecordOutcome> = vec![Ok(finished()), Err(RefineError::NoAbstracts)];

        table
            .augment(ResultColumns::from_outcomes(&outcomes).unwrap())
            .unwrap();

        let first = &table.rows()[0];
        assert_eq!(first["path_id"], json!(17));
        assert_eq!(
            first[RESPONSES_COLUMN],
            json!([
                {"iteration": 1, "response": "r1"},
                {"iteration": 2, "response": "Error: timeout"}
            ])
        );
        assert_eq!(first[RESPONSE_TIMES_COLUMN], json!([1.5, 0.0]));
        assert_eq!(first[PROMPTS_COLUMN], json!(["p1", "p2"]));
        assert_eq!(
            first[CONTEXTS_COLUMN],
            json!([{"inhibits": ["1", "2"]}, {"inhibits": ["1", "2"]}])
        );
        assert_eq!(
            first[CHANGES_COLUMN],
            json!([
                {"edge": "inhibits", "dropped": "1", "added": "3"},
                {"edge": "max_iteration", "dropped": "max_iteration", "added": "max_iteration"}
            ])
        );
        assert_eq!(first[ERROR_COLUMN], Value::Null);

        let second = &table.rows()[1];
        assert_eq!(second[RESPONSES_COLUMN], Value::Null);
        assert_eq!(
            second[ERROR_COLUMN],
            json!("No abstracts retrieved for the selected PMIDs.")
        );
    }

    #[test]
    fn test_augment_rejects_length_mismatch() {
        let mut table = Table::from_rows(sample_rows());
        let outcomes: Vec<RecordOutcome> = vec![Ok(finished())];
        assert!(
            table
                .augment(ResultColumns::from_outcomes(&outcomes).unwrap())
                .is_err()
        );
    }

    #[test]
    fn test_write_and_read_back_both_formats() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let table = Table::from_rows(sample_rows());

        for name in ["rows.json", "rows.jsonl"] {
            let path = temp_dir.path().join(name);
            table.write(&path).unwrap();
            let back = Table::read(&path).unwrap();
            assert_eq!(back.rows(), table.rows());
        }

        let lines = fs::read_to_string(temp_dir.path().join("rows.jsonl")).unwrap();
        assert_eq!(lines.lines().count(), 2);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(TableFormat::from_path(Path::new("a.JSONL")), TableFormat::JsonLines);
        assert_eq!(TableFormat::from_path(Path::new("a.ndjson")), TableFormat::JsonLines);
        assert_eq!(TableFormat::from_path(Path::new("a.json")), TableFormat::Json);
        assert_eq!(TableFormat::from_path(Path::new("a")), TableFormat::Json);
    }
}
