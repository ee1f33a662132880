//! Rule document compiler.
//!
//! Turns YAML or JSON rule documents into one [`CompiledExpression`]. Values
//! in `check` and `map` sections are interpreted by their first character:
//!
//! | Value | In `check` | In `map` |
//! |-------|------------|----------|
//! | `+name/args/` | helper invocation | helper invocation |
//! | `$field` | equals the referenced field | copy the referenced field |
//! | anything else | equals the literal | assign the literal |
//!
//! Each document becomes `Implication(And(check), Chain(stages))` where every
//! stage is `Implication(And(stage check), Chain(map))`; chains over stages and
//! map entries always succeed. A rule set is a chain over its documents that
//! succeeds if any document accepted the event.
//!
//! # Examples
//!
//! ```rust
//! use event_engine::{Compiler, HelperRegistry};
//! use serde_json::json;
//!
//! let registry = HelperRegistry::new();
//! let mut compiler = Compiler::new(&registry);
//! compiler.compile_asset(r#"
//! name: decoder/login
//! check:
//!   - event.code: 4624
//! normalize:
//!   - map:
//!       event.category: authentication
//! "#)?;
//!
//! let expression = compiler.into_expression()?;
//! let result = expression.evaluate(json!({"event": {"code": 4624}}));
//! assert!(result.is_success());
//! assert_eq!(result.event()["event"]["category"], "authentication");
//! # Ok::<(), event_engine::EngineError>(())
//! ```

pub mod document;

pub use document::{AssetDocument, Conditions, Stage};

use crate::error::{BuildError, Result};
use crate::expr::{ChainPolicy, CompiledExpression, ExpressionBuilder, NodeId};
use crate::field::{FieldPath, REFERENCE_PREFIX};
use crate::helper::transform::{assign_value, copy_reference};
use crate::helper::filter::{reference_equal, value_equal};
use crate::helper::{HelperRegistry, Operation, HELPER_PREFIX};
use serde_json::Value;
use tracing::debug;

/// Which section a `field: value` entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Check,
    Map,
}

/// Compiler accumulating rule documents into a single expression graph.
pub struct Compiler<'r> {
    registry: &'r HelperRegistry,
    builder: ExpressionBuilder,
    assets: Vec<(String, NodeId)>,
}

impl<'r> Compiler<'r> {
    pub fn new(registry: &'r HelperRegistry) -> Self {
        Self {
            registry,
            builder: ExpressionBuilder::new(),
            assets: Vec::new(),
        }
    }

    /// Compile a YAML (or JSON) document and add it to the rule set.
    ///
    /// # Returns
    /// * `Ok(NodeId)` - Root node of the document's subgraph
    /// * `Err(EngineError)` - The text is not a valid document or a value
    ///   does not build
    pub fn compile_asset(&mut self, text: &str) -> Result<NodeId> {
        let document: AssetDocument = serde_yaml::from_str(text)?;
        Ok(self.compile_document(&document)?)
    }

    /// Compile an already parsed document.
    pub fn compile_value(&mut self, value: &Value) -> Result<NodeId> {
        let document: AssetDocument = serde_json::from_value(value.clone())?;
        Ok(self.compile_document(&document)?)
    }

    pub fn compile_document(&mut self, document: &AssetDocument) -> std::result::Result<NodeId, BuildError> {
        let name = document.name.trim();
        if name.is_empty() {
            return Err(BuildError::InvalidAsset {
                asset: document.name.clone(),
                reason: "name is empty".to_string(),
            });
        }
        if self.assets.iter().any(|(existing, _)| existing == name) {
            return Err(BuildError::InvalidAsset {
                asset: name.to_string(),
                reason: "duplicate asset name".to_string(),
            });
        }

        // A document that fails halfway must not leave nodes behind.
        let mark = self.builder.node_count();
        let root = match self.compile_body(name, document) {
            Ok(root) => root,
            Err(err) => {
                self.builder.truncate(mark);
                return Err(err);
            }
        };
        self.builder.with_name(root, name);
        self.assets.push((name.to_string(), root));

        debug!(asset = name, stages = document.normalize.len(), "compiled asset");
        Ok(root)
    }

    fn compile_body(&mut self, name: &str, document: &AssetDocument) -> std::result::Result<NodeId, BuildError> {
        let check = self.compile_section(document.check.as_ref(), Section::Check)?;
        let check = self.builder.and(check);

        let mut stages = Vec::with_capacity(document.normalize.len());
        for (index, stage) in document.normalize.iter().enumerate() {
            let node = self.compile_stage(stage)?;
            self.builder.with_name(node, format!("{name}/normalize/{index}"));
            stages.push(node);
        }
        let normalize = self.builder.broadcast(stages);

        Ok(self.builder.implication(check, normalize))
    }

    /// Names of the compiled documents, in compilation order.
    pub fn asset_names(&self) -> Vec<&str> {
        self.assets.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    /// Finish the rule set: a chain over every document that succeeds if
    /// any of them accepted the event.
    pub fn into_expression(mut self) -> std::result::Result<CompiledExpression, BuildError> {
        let assets: Vec<NodeId> = self.assets.iter().map(|(_, node)| *node).collect();
        let root = self.builder.chain(ChainPolicy::AnySucceed, assets);
        self.builder.with_name(root, "ruleset");
        self.builder.build(root)
    }

    fn compile_stage(&mut self, stage: &Stage) -> std::result::Result<NodeId, BuildError> {
        let map = self.compile_section(stage.map.as_ref(), Section::Map)?;
        let map = self.builder.broadcast(map);

        match &stage.check {
            Some(conditions) => {
                let check = self.compile_section(Some(conditions), Section::Check)?;
                let check = self.builder.and(check);
                Ok(self.builder.implication(check, map))
            }
            None => Ok(map),
        }
    }

    fn compile_section(
        &mut self,
        conditions: Option<&Conditions>,
        section: Section,
    ) -> std::result::Result<Vec<NodeId>, BuildError> {
        let Some(conditions) = conditions else {
            return Ok(Vec::new());
        };

        let mut terms = Vec::new();
        for (field, value) in conditions.entries() {
            let operation = self.compile_entry(field, value, section)?;
            terms.push(self.builder.term(operation));
        }
        Ok(terms)
    }

    fn compile_entry(&self, field: &str, value: &Value, section: Section) -> std::result::Result<Operation, BuildError> {
        if let Value::String(text) = value {
            if text.starts_with(HELPER_PREFIX) {
                return self.registry.parse_and_build(field, text);
            }
            if let Some(source) = text.strip_prefix(REFERENCE_PREFIX) {
                let destination = FieldPath::parse(field)?;
                let source = FieldPath::parse(source)?;
                return Ok(match section {
                    Section::Check => reference_equal(destination, source),
                    Section::Map => copy_reference(destination, source),
                });
            }
        }

        let destination = FieldPath::parse(field)?;
        Ok(match section {
            Section::Check => value_equal(destination, value.clone()),
            Section::Map => assign_value(destination, value.clone()),
        })
    }
}
