use serde::de::{self, MapAccess, Visitor};
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

/// Marker written into every field of the event that closes a record at its
/// iteration cap.
pub const MAX_ITERATION_MARKER: &str = "max_iteration";

/// Edge name to value mapping that keeps insertion order.
///
/// Edge order decides both prompt layout and snapshot layout, so a plain
/// `HashMap` is not enough here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> Default for EdgeMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> EdgeMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value for `edge`. New edges go to the end.
    pub fn insert(&mut self, edge: impl Into<String>, value: V) {
        let edge = edge.into();
        match self.entries.iter_mut().find(|(name, _)| *name == edge) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((edge, value)),
        }
    }

    pub fn get(&self, edge: &str) -> Option<&V> {
        self.entries
            .iter()
            .find(|(name, _)| name == edge)
            .map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, edge: &str) -> Option<&mut V> {
        self.entries
            .iter_mut()
            .find(|(name, _)| name == edge)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn map_values<U>(&self, mut f: impl FnMut(&V) -> U) -> EdgeMap<U> {
        EdgeMap {
            entries: self
                .entries
                .iter()
                .map(|(name, value)| (name.clone(), f(value)))
                .collect(),
        }
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for EdgeMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = EdgeMap::new();
        for (edge, value) in iter {
            map.insert(edge, value);
        }
        map
    }
}

impl<V: Serialize> Serialize for EdgeMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (edge, value) in &self.entries {
            map.serialize_entry(edge, value)?;
        }
        map.end()
    }
}

struct EdgeMapVisitor<V> {
    marker: PhantomData<fn() -> EdgeMap<V>>,
}

impl<'de, V: Deserialize<'de>> Visitor<'de> for EdgeMapVisitor<V> {
    type Value = EdgeMap<V>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map from edge names to values")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Self::Value, M::Error> {
        let mut map = EdgeMap::new();
        while let Some((edge, value)) = access.next_entry::<String, V>()? {
            map.insert(edge, value);
        }
        Ok(map)
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for EdgeMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(EdgeMapVisitor {
            marker: PhantomData,
        })
    }
}

/// Reference ids show up both as JSON strings and as bare integers
/// (PubMed ids are numeric). Internally they are always strings.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum RawId {
    Text(String),
    Unsigned(u64),
    Signed(i64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(text) => text,
            RawId::Unsigned(n) => n.to_string(),
            RawId::Signed(n) => n.to_string(),
        }
    }
}

fn deserialize_candidates<'de, D>(deserializer: D) -> Result<EdgeMap<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = EdgeMap::<Vec<RawId>>::deserialize(deserializer)?;
    let mut map = EdgeMap::new();
    for (edge, ids) in raw.entries {
        map.insert(edge, ids.into_iter().map(String::from).collect());
    }
    Ok(map)
}

fn deserialize_name<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer)
        .map(String::from)
        .map_err(|_| de::Error::custom("expected an entity name"))
}

/// One input row: a source entity, a target entity and the candidate
/// references for every intermediate edge between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(deserialize_with = "deserialize_name")]
    pub subj_name: String,
    #[serde(deserialize_with = "deserialize_name")]
    pub obj_name: String,
    #[serde(deserialize_with = "deserialize_candidates")]
    pub final_context_pmids: EdgeMap<Vec<String>>,
}

impl Record {
    pub fn new(
        subj_name: impl Into<String>,
        obj_name: impl Into<String>,
        final_context_pmids: EdgeMap<Vec<String>>,
    ) -> Self {
        Self {
            subj_name: subj_name.into(),
            obj_name: obj_name.into(),
            final_context_pmids,
        }
    }
}

/// What happened to a working subset at the end of an iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rotation {
    /// `dropped` left the subset and `added` was appended.
    Swapped {
        edge: String,
        dropped: String,
        added: String,
    },
    /// No unused candidate was left. The dropped id went back in at the end.
    /// `dropped` is `None` only for an edge without any candidates.
    Exhausted {
        edge: String,
        dropped: Option<String>,
    },
    /// The iteration cap was reached; nothing was rotated.
    MaxIteration,
}

impl Rotation {
    pub fn edge(&self) -> &str {
        match self {
            Rotation::Swapped { edge, .. } | Rotation::Exhausted { edge, .. } => edge,
            Rotation::MaxIteration => MAX_ITERATION_MARKER,
        }
    }

    pub fn dropped(&self) -> Option<&str> {
        match self {
            Rotation::Swapped { dropped, .. } => Some(dropped),
            Rotation::Exhausted { dropped, .. } => dropped.as_deref(),
            Rotation::MaxIteration => Some(MAX_ITERATION_MARKER),
        }
    }

    pub fn added(&self) -> Option<&str> {
        match self {
            Rotation::Swapped { added, .. } => Some(added),
            Rotation::Exhausted { .. } => None,
            Rotation::MaxIteration => Some(MAX_ITERATION_MARKER),
        }
    }
}

impl Serialize for Rotation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut event = serializer.serialize_struct("Rotation", 3)?;
        event.serialize_field("edge", self.edge())?;
        event.serialize_field("dropped", &self.dropped())?;
        event.serialize_field("added", &self.added())?;
        event.end()
    }
}

/// Result of the single model call made in an iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    Answered { text: String, elapsed: Duration },
    Failed { error: String },
}

impl ModelReply {
    /// Text stored in the output table. Failures become `Error: <message>`.
    pub fn text(&self) -> String {
        match self {
            ModelReply::Answered { text, .. } => text.clone(),
            ModelReply::Failed { error } => format!("Error: {error}"),
        }
    }

    /// Latency in seconds. Failed calls are recorded as zero.
    pub fn seconds(&self) -> f64 {
        match self {
            ModelReply::Answered { elapsed, .. } => elapsed.as_secs_f64(),
            ModelReply::Failed { .. } => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IterationRecord {
    /// 1-based.
    pub iteration: usize,
    pub prompt: String,
    pub reply: ModelReply,
    /// Working subsets at the time the prompt was built.
    pub context: EdgeMap<Vec<String>>,
    pub rotation: Rotation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The edge picked for rotation had no unused references left.
    StoppedEarly,
    ReachedLimit,
}

/// Everything one record produced, in iteration order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordResult {
    pub iterations: Vec<IterationRecord>,
    pub stop: StopReason,
}

impl RecordResult {
    pub fn rotations(&self) -> impl Iterator<Item = &Rotation> {
        self.iterations.iter().map(|it| &it.rotation)
    }
}
