//! Serde model of rule documents.

use serde::Deserialize;
use serde_json::{Map, Value};

/// A rule document ("asset"):
///
/// ```yaml
/// name: decoder/sshd/0
/// check:
///   - process.name: sshd
///   - event.original: +exists/
/// normalize:
///   - map:
///       event.category: authentication
///       source.ip: +r_ext/_tmp.ip/from ([0-9.]+)/
///   - check:
///       - _tmp.ip: +exists/
///     map:
///       source.address: $_tmp.ip
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct AssetDocument {
    pub name: String,

    #[serde(default)]
    pub check: Option<Conditions>,

    #[serde(default)]
    pub normalize: Vec<Stage>,
}

/// `field: value` entries, written either as a list of one-key maps or as a
/// single map. The list form keeps the author's order even for repeated keys.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Conditions {
    List(Vec<Map<String, Value>>),
    Map(Map<String, Value>),
}

impl Conditions {
    /// Entries in document order.
    pub fn entries(&self) -> Vec<(&str, &Value)> {
        match self {
            Conditions::List(items) => items
                .iter()
                .flat_map(|item| item.iter().map(|(k, v)| (k.as_str(), v)))
                .collect(),
            Conditions::Map(map) => map.iter().map(|(k, v)| (k.as_str(), v)).collect(),
        }
    }
}

/// One normalization stage: writes in `map` apply when `check` passes.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Stage {
    #[serde(default)]
    pub check: Option<Conditions>,

    #[serde(default)]
    pub map: Option<Conditions>,
}
