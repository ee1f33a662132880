//! Field addressing over events.
//!
//! Events are JSON-like trees ([`serde_json::Value`] with insertion order
//! preserved). Rules address fields with either slash- or dot-delimited paths;
//! both notations normalize to the same [`FieldPath`]:
//!
//! ```rust
//! use event_engine::FieldPath;
//!
//! let slash = FieldPath::parse("a/b/c").unwrap();
//! let dot = FieldPath::parse("a.b.c").unwrap();
//! let pointer = FieldPath::parse("/a/b/c").unwrap();
//! assert_eq!(slash, dot);
//! assert_eq!(dot, pointer);
//! assert_eq!(slash.to_string(), "/a/b/c");
//! ```
//!
//! Reading never creates structure and never coerces types: descending into a
//! scalar with further segments simply yields "not found". Writing creates
//! missing intermediate objects.

use crate::error::BuildError;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A single event flowing through the pipeline.
pub type Event = Value;

/// Prefix marking a field reference argument.
pub const REFERENCE_PREFIX: char = '$';

/// Immutable, normalized path to a field inside an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

/// A write could not be carried out because the path runs through a value
/// that cannot hold the next segment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot write '{path}': segment {segment} is not addressable")]
pub struct PathConflict {
    pub path: String,
    pub segment: usize,
}

impl FieldPath {
    /// Parse a slash- or dot-delimited path.
    ///
    /// A leading `/` or any `/` in the text selects slash notation, so keys
    /// containing dots stay intact in slash paths. Empty paths and empty
    /// segments are rejected.
    pub fn parse(text: &str) -> Result<Self, BuildError> {
        let invalid = |reason: &str| BuildError::InvalidFieldPath {
            path: text.to_string(),
            reason: reason.to_string(),
        };

        let body = text.strip_prefix('/').unwrap_or(text);
        if body.is_empty() {
            return Err(invalid("path is empty"));
        }

        let delimiter = if text.contains('/') { '/' } else { '.' };
        let segments: Vec<String> = body.split(delimiter).map(str::to_string).collect();

        if segments.iter().any(String::is_empty) {
            return Err(invalid("path contains an empty segment"));
        }

        Ok(Self { segments })
    }

    /// Build a path from already-split segments.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() || segments.iter().any(String::is_empty) {
            return Err(BuildError::InvalidFieldPath {
                path: segments.join("/"),
                reason: "path is empty or contains an empty segment".to_string(),
            });
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Resolve the path against an event.
    pub fn resolve<'a>(&self, event: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(event, |current, segment| step(current, segment))
    }

    /// Resolve the path for in-place modification.
    pub fn resolve_mut<'a>(&self, event: &'a mut Value) -> Option<&'a mut Value> {
        let mut current = event;
        for segment in &self.segments {
            current = match current {
                Value::Object(map) => map.get_mut(segment)?,
                Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn exists(&self, event: &Value) -> bool {
        self.resolve(event).is_some()
    }

    /// Resolve the path to a string value.
    pub fn resolve_str<'a>(&self, event: &'a Value) -> Option<&'a str> {
        self.resolve(event).and_then(Value::as_str)
    }

    /// Write `value` at this path, overwriting whatever is there.
    ///
    /// Missing intermediate objects are created. Existing arrays are only
    /// descended through in-range indices; scalars along the way are a
    /// conflict and leave the event untouched.
    pub fn set(&self, event: &mut Value, value: Value) -> Result<(), PathConflict> {
        let Some((last, parents)) = self.segments.split_last() else {
            *event = value;
            return Ok(());
        };

        if !self.can_write(event) {
            return Err(self.conflict_at(event));
        }

        let mut current = event;
        for segment in parents {
            current = match current {
                Value::Object(map) => map
                    .entry(segment.clone())
                    .or_insert_with(|| Value::Object(Map::new())),
                Value::Array(items) => match segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| items.get_mut(index))
                {
                    Some(item) => item,
                    None => return Err(self.conflict(0)),
                },
                _ => return Err(self.conflict(0)),
            };
        }

        match current {
            Value::Object(map) => {
                map.insert(last.clone(), value);
                Ok(())
            }
            Value::Array(items) => {
                match last.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                    Some(slot) => {
                        *slot = value;
                        Ok(())
                    }
                    None => Err(self.conflict(self.segments.len() - 1)),
                }
            }
            _ => Err(self.conflict(self.segments.len() - 1)),
        }
    }

    /// Remove the field at this path, returning its previous value.
    pub fn remove(&self, event: &mut Value) -> Option<Value> {
        let (last, parents) = self.segments.split_last()?;
        let mut current = event;
        for segment in parents {
            current = match current {
                Value::Object(map) => map.get_mut(segment)?,
                Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        match current {
            Value::Object(map) => map.remove(last),
            Value::Array(items) => {
                let index = last.parse::<usize>().ok()?;
                (index < items.len()).then(|| items.remove(index))
            }
            _ => None,
        }
    }

    /// Dry run of [`set`](Self::set): true when every existing value along the
    /// path can take the next segment.
    fn can_write(&self, event: &Value) -> bool {
        let mut current = Some(event);
        for (depth, segment) in self.segments.iter().enumerate() {
            let Some(value) = current else {
                return true;
            };
            let is_last = depth + 1 == self.segments.len();
            current = match value {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => match segment.parse::<usize>() {
                    Ok(index) if index < items.len() => items.get(index),
                    _ => return false,
                },
                _ => return false,
            };
            if is_last {
                return true;
            }
        }
        true
    }

    fn conflict_at(&self, event: &Value) -> PathConflict {
        let mut current = event;
        for (depth, segment) in self.segments.iter().enumerate() {
            match step(current, segment) {
                Some(next) => current = next,
                None => return self.conflict(depth),
            }
        }
        self.conflict(self.segments.len() - 1)
    }

    fn conflict(&self, segment: usize) -> PathConflict {
        PathConflict {
            path: self.to_string(),
            segment,
        }
    }
}

fn step<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => items.get(segment.parse::<usize>().ok()?),
        _ => None,
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Recursively merge `source` into `target`.
///
/// Object into object merges key by key, recursing where both sides hold
/// objects. Every other combination replaces `target` wholesale.
pub fn merge_values(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, value) in source_map {
                let nested =
                    value.is_object() && target_map.get(&key).map_or(false, Value::is_object);
                if nested {
                    if let Some(existing) = target_map.get_mut(&key) {
                        merge_values(existing, value);
                    }
                } else {
                    target_map.insert(key, value);
                }
            }
        }
        (target, source) => *target = source,
    }
}

/// A helper argument: literal text or a reference to a field of the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    Literal(String),
    Reference(FieldPath),
}

impl Argument {
    /// Classify a raw argument token. `$name` is a reference, anything else a literal.
    pub fn parse(token: &str) -> Result<Self, BuildError> {
        match token.strip_prefix(REFERENCE_PREFIX) {
            Some(path) => Ok(Argument::Reference(FieldPath::parse(path)?)),
            None => Ok(Argument::Literal(token.to_string())),
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Argument::Reference(_))
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Argument::Literal(text) => Some(text),
            Argument::Reference(_) => None,
        }
    }

    /// Resolve to a value against the current event.
    ///
    /// Literals resolve to a JSON string; references to whatever the event
    /// holds, or `None` when the field is absent.
    pub fn resolve<'a>(&'a self, event: &'a Value) -> Option<Cow<'a, Value>> {
        match self {
            Argument::Literal(text) => Some(Cow::Owned(Value::String(text.clone()))),
            Argument::Reference(path) => path.resolve(event).map(Cow::Borrowed),
        }
    }

    /// Resolve to a string against the current event.
    ///
    /// A reference to a non-string value resolves to `None`.
    pub fn resolve_str<'a>(&'a self, event: &'a Value) -> Option<&'a str> {
        match self {
            Argument::Literal(text) => Some(text),
            Argument::Reference(path) => path.resolve_str(event),
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Literal(text) => f.write_str(text),
            Argument::Reference(path) => write!(f, "{REFERENCE_PREFIX}{path}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(text: &str) -> FieldPath {
        FieldPath::parse(text).unwrap()
    }

    #[test]
    fn test_notations_normalize_identically() {
        assert_eq!(path("a/b/c"), path("a.b.c"));
        assert_eq!(path("/a/b/c"), path("a.b.c"));
        assert_eq!(path("a.b.c").segments(), ["a", "b", "c"]);
    }

    #[test]
    fn test_slash_notation_keeps_dotted_keys() {
        let p = path("/parent/file.name");
        assert_eq!(p.segments(), ["parent", "file.name"]);
    }

    #[test]
    fn test_empty_paths_rejected() {
        for bad in ["", "/", "a..b", "a//b", "a/", "."] {
            let err = FieldPath::parse(bad).unwrap_err();
            assert!(matches!(err, BuildError::InvalidFieldPath { .. }), "{bad}");
        }
    }

    #[test]
    fn test_resolve_nested_and_indexed() {
        let event = json!({"a": {"b": [10, {"c": "x"}]}});
        assert_eq!(path("a.b.0").resolve(&event), Some(&json!(10)));
        assert_eq!(path("a/b/1/c").resolve_str(&event), Some("x"));
        assert!(path("a.b.5").resolve(&event).is_none());
    }

    #[test]
    fn test_resolve_through_scalar_is_not_found() {
        let event = json!({"a": "text"});
        assert!(!path("a.b").exists(&event));
        assert!(path("a.b.c").resolve(&event).is_none());
    }

    #[test]
    fn test_resolve_is_case_sensitive() {
        let event = json!({"Field": 1});
        assert!(path("Field").exists(&event));
        assert!(!path("field").exists(&event));
    }

    #[test]
    fn test_set_creates_intermediate_objects() {
        let mut event = json!({});
        path("parent._field").set(&mut event, json!("exp")).unwrap();
        assert_eq!(event, json!({"parent": {"_field": "exp"}}));
    }

    #[test]
    fn test_set_overwrites_existing_value() {
        let mut event = json!({"a": {"b": 1}});
        path("a/b").set(&mut event, json!([1, 2])).unwrap();
        assert_eq!(event, json!({"a": {"b": [1, 2]}}));
    }

    #[test]
    fn test_set_through_scalar_conflicts_without_mutation() {
        let mut event = json!({"a": "scalar"});
        let err = path("a.b.c").set(&mut event, json!(1)).unwrap_err();
        assert_eq!(err.segment, 1);
        assert_eq!(event, json!({"a": "scalar"}));
    }

    #[test]
    fn test_set_into_array_slot() {
        let mut event = json!({"list": [1, 2]});
        path("list.1").set(&mut event, json!("two")).unwrap();
        assert_eq!(event, json!({"list": [1, "two"]}));
        assert!(path("list.7").set(&mut event, json!(0)).is_err());
    }

    #[test]
    fn test_remove() {
        let mut event = json!({"a": {"b": 1, "c": 2}});
        assert_eq!(path("a.b").remove(&mut event), Some(json!(1)));
        assert_eq!(event, json!({"a": {"c": 2}}));
        assert_eq!(path("a.zz").remove(&mut event), None);
    }

    #[test]
    fn test_merge_objects_recursively() {
        let mut target = json!({"keep": 1, "nested": {"x": 1, "y": {"z": 1}}});
        let source = json!({"new": 2, "nested": {"y": {"w": 2}, "x": 3}});
        merge_values(&mut target, source);
        assert_eq!(
            target,
            json!({"keep": 1, "new": 2, "nested": {"x": 3, "y": {"z": 1, "w": 2}}})
        );
    }

    #[test]
    fn test_merge_non_objects_replace() {
        let mut target = json!({"a": 1});
        merge_values(&mut target, json!([1, 2]));
        assert_eq!(target, json!([1, 2]));

        let mut target = json!("text");
        merge_values(&mut target, json!({"a": 1}));
        assert_eq!(target, json!({"a": 1}));
    }

    #[test]
    fn test_argument_classification() {
        assert_eq!(
            Argument::parse("$wdb.query_parameters").unwrap(),
            Argument::Reference(path("wdb/query_parameters"))
        );
        assert_eq!(
            Argument::parse("(exp)").unwrap(),
            Argument::Literal("(exp)".to_string())
        );
        assert!(Argument::parse("$").is_err());
    }

    #[test]
    fn test_argument_resolution() {
        let event = json!({"src": "value", "num": 3});
        let reference = Argument::parse("$src").unwrap();
        assert_eq!(reference.resolve_str(&event), Some("value"));

        let numeric = Argument::parse("$num").unwrap();
        assert_eq!(numeric.resolve_str(&event), None);
        assert_eq!(numeric.resolve(&event).as_deref(), Some(&json!(3)));

        let literal = Argument::parse("text").unwrap();
        assert_eq!(literal.resolve_str(&event), Some("text"));
        assert_eq!(literal.to_string(), "text");
        assert_eq!(reference.to_string(), "$/src");
    }
}
