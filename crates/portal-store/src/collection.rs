//! Collections, documents and counter paths

use crate::error::StoreError;
use portal_model::Platform;
use serde_json::{Map, Value};

/// A stored record in backend-neutral form
pub type Document = Value;

/// Persisted collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    /// News articles
    Articles,
    /// Meetings and activities
    Meetings,
    /// Media-kit assets
    MediaAssets,
    /// Guest registry
    Guests,
}

impl Collection {
    /// All collections
    pub const ALL: [Self; 4] = [Self::Articles, Self::Meetings, Self::MediaAssets, Self::Guests];

    /// Stable name (table / file name)
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Articles => "articles",
            Self::Meetings => "meetings",
            Self::MediaAssets => "media_assets",
            Self::Guests => "guests",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Counter inside a document that supports atomic increment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterPath {
    /// Article view count
    Views,
    /// Article link clicks for one platform
    LinkClick(Platform),
}

impl CounterPath {
    /// Every counter an article carries
    pub const ARTICLE: [Self; 4] = [
        Self::Views,
        Self::LinkClick(Platform::Facebook),
        Self::LinkClick(Platform::Instagram),
        Self::LinkClick(Platform::X),
    ];

    fn invalid(&self, message: &str) -> StoreError {
        StoreError::InvalidCounter {
            path: self.to_string(),
            message: message.to_string(),
        }
    }

    /// Path segments inside the document
    #[must_use]
    pub fn segments(&self) -> Vec<&'static str> {
        match self {
            Self::Views => vec!["views"],
            Self::LinkClick(p) => vec!["link_clicks", p.key()],
        }
    }
}

impl std::fmt::Display for CounterPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.segments().join("."))
    }
}

/// Extract the `id` field of a document
///
/// # Errors
/// `StoreError::MissingId` if absent or not a string.
pub fn document_id(collection: Collection, doc: &Document) -> Result<String, StoreError> {
    doc.get("id")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or(StoreError::MissingId(collection))
}

/// Slot holding the counter at `path`, creating missing parents and a zero leaf
fn counter_slot<'a>(doc: &'a mut Document, path: &CounterPath) -> Result<&'a mut Value, StoreError> {
    let segments = path.segments();
    let (last, parents) = segments.split_last().ok_or_else(|| path.invalid("empty path"))?;

    let mut cursor = doc;
    for seg in parents {
        let obj = cursor
            .as_object_mut()
            .ok_or_else(|| path.invalid("parent is not an object"))?;
        cursor = obj
            .entry((*seg).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    let obj = cursor
        .as_object_mut()
        .ok_or_else(|| path.invalid("parent is not an object"))?;
    Ok(obj.entry((*last).to_string()).or_insert(Value::from(0u64)))
}

fn counter_of(slot: &Value, path: &CounterPath) -> Result<u64, StoreError> {
    match slot {
        Value::Null => Ok(0),
        Value::Number(n) => n.as_u64().ok_or_else(|| path.invalid("not a non-negative integer")),
        _ => Err(path.invalid("not a number")),
    }
}

/// Current value of the counter at `path`; missing counters read as zero.
///
/// # Errors
/// `StoreError::InvalidCounter` when the value on the path is not a counter.
pub fn counter_value(doc: &Document, path: &CounterPath) -> Result<u64, StoreError> {
    let mut cursor = doc;
    for seg in path.segments() {
        match cursor.get(seg) {
            Some(next) => cursor = next,
            None => return Ok(0),
        }
    }
    counter_of(cursor, path)
}

/// Increment the counter at `path` in place and return the new value.
///
/// Missing counters (and missing intermediate objects) start at zero.
///
/// # Errors
/// `StoreError::InvalidCounter` when an existing value on the path is not a
/// non-negative integer or an object, or when the counter is already at
/// `u64::MAX`.
pub fn apply_increment(doc: &mut Document, path: &CounterPath) -> Result<u64, StoreError> {
    let slot = counter_slot(doc, path)?;
    let next = counter_of(slot, path)?
        .checked_add(1)
        .ok_or_else(|| path.invalid("counter overflow"))?;
    *slot = Value::from(next);
    Ok(next)
}

/// Copy the counters listed in `keep` from the stored document into its
/// replacement.
///
/// # Errors
/// `StoreError::InvalidCounter` when either document has a non-counter on one
/// of the paths.
pub fn carry_counters(stored: &Document, replacement: &mut Document, keep: &[CounterPath]) -> Result<(), StoreError> {
    for path in keep {
        let value = counter_value(stored, path)?;
        *counter_slot(replacement, path)? = Value::from(value);
    }
    Ok(())
}
