use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::refine::error::RefineError;
use crate::store::ReferenceStore;

/// Abstract texts kept on disk as JSON lines, read one line at a time.
///
/// Two line shapes are understood:
///
/// * `{"<id>": <text>, ...}` with any number of ids per line
/// * `{"pmid": <id>, "abstract": <text>}` (`"text"` is accepted too)
///
/// `<text>` is a string or a list of sentences, which are joined with a
/// single space. Opening the store reads the file once to index every id to
/// the byte offset of its line; texts are parsed only when looked up.
pub struct JsonlAbstractStore {
    path: PathBuf,
    offsets: HashMap<String, u64>,
    reader: Mutex<BufReader<File>>,
}

impl JsonlAbstractStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RefineError> {
        let path = path.as_ref().to_path_buf();
        let mut reader = BufReader::new(File::open(&path)?);
        let mut offsets = HashMap::new();

        let mut offset = 0u64;
        let mut line = String::new();
        loop {
            line.clear();
            let read = reader.read_line(&mut line)?;
            if read == 0 {
                break;
            }
            if !line.trim().is_empty() {
                let object: Map<String, Value> = serde_json::from_str(&line)?;
                for id in line_ids(&object) {
                    // first occurrence wins
                    offsets.entry(id).or_insert(offset);
                }
            }
            offset += read as u64;
        }

        tracing::debug!(path = %path.display(), ids = offsets.len(), "indexed abstract store");

        Ok(Self {
            path,
            offsets,
            reader: Mutex::new(reader),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_line_at(&self, offset: u64) -> Result<Map<String, Value>, RefineError> {
        let mut reader = self
            .reader
            .lock()
            .map_err(|_| std::io::Error::other("abstract store reader poisoned"))?;
        reader.seek(SeekFrom::Start(offset))?;
        let mut line = String::new();
        reader.read_line(&mut line)?;
        Ok(serde_json::from_str(&line)?)
    }
}

impl ReferenceStore for JsonlAbstractStore {
    fn lookup(&self, id: &str) -> Result<Option<String>, RefineError> {
        let Some(&offset) = self.offsets.get(id) else {
            return Ok(None);
        };
        let object = self.read_line_at(offset)?;
        Ok(line_text(&object, id))
    }

    fn len(&self) -> usize {
        self.offsets.len()
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Array(parts) => Some(
            parts
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(" "),
        ),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

fn keyed_body(object: &Map<String, Value>) -> Option<&Value> {
    object.get("abstract").or_else(|| object.get("text"))
}

fn line_ids(object: &Map<String, Value>) -> Vec<String> {
    match object.get("pmid").and_then(id_string) {
        Some(id) if keyed_body(object).is_some() => vec![id],
        _ => object.keys().cloned().collect(),
    }
}

fn line_text(object: &Map<String, Value>, id: &str) -> Option<String> {
    match object.get("pmid").and_then(id_string) {
        Some(pmid) if keyed_body(object).is_some() => {
            if pmid == id {
                keyed_body(object).and_then(text_value)
            } else {
                None
            }
        }
        _ => object.get(id).and_then(text_value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_store(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_lookup_by_key_lines() {
        let file = write_store(&[
            r#"{"111": "first abstract", "222": "second abstract"}"#,
            "",
            r#"{"333": ["Sentence one.", "Sentence two."]}"#,
        ]);
        let store = JsonlAbstractStore::open(file.path()).unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(
            store.lookup("222").unwrap().as_deref(),
            Some("second abstract")
        );
        assert_eq!(
            store.lookup("333").unwrap().as_deref(),
            Some("Sentence one. Sentence two.")
        );
        assert_eq!(store.lookup("444").unwrap(), None);
    }

    #[test]
    fn test_lookup_by_record_lines() {
        let file = write_store(&[
            r#"{"pmid": 12345, "abstract": "numeric id"}"#,
            r#"{"pmid": "678", "text": ""}"#,
        ]);
        let store = JsonlAbstractStore::open(file.path()).unwrap();

        assert_eq!(store.lookup("12345").unwrap().as_deref(), Some("numeric id"));
        assert_eq!(store.lookup("678").unwrap().as_deref(), Some(""));
        assert_eq!(store.lookup("pmid").unwrap(), None);
    }

    #[test]
    fn test_repeated_lookups_reuse_reader() {
        let file = write_store(&[r#"{"1": "a"}"#, r#"{"2": "b"}"#]);
        let store = JsonlAbstractStore::open(file.path()).unwrap();

        for _ in 0..3 {
            assert_eq!(store.lookup("2").unwrap().as_deref(), Some("b"));
            assert_eq!(store.lookup("1").unwrap().as_deref(), Some("a"));
        }
    }

    #[test]
    fn test_malformed_line_fails_to_open() {
        let file = write_store(&["not json"]);
        assert!(matches!(
            JsonlAbstractStore::open(file.path()),
            Err(RefineError::SerializationError(_))
        ));
    }
}
