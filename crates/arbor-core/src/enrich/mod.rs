// ── Node enrichment ──
//
// A template may carry an enrichment rule that derives display fields
// from each raw record. Rules are either a small expression language
// compiled once at load time, or `@strategy <key>` naming a registered
// implementation. Nothing here executes arbitrary code.

mod eval;
mod lexer;
mod parser;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

pub use eval::Program;

use crate::diagnostics::DiagnosticSink;
use crate::error::CoreError;
use crate::model::{EnrichedNode, FieldMap, NodeId, RawNode};

/// Prefix selecting a registered strategy instead of an expression rule.
pub const STRATEGY_PREFIX: &str = "@strategy";

/// Why a rule failed to compile or to evaluate on one record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    #[error("line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("{function}() takes {expected} argument(s), got {got}")]
    Arity {
        function: String,
        expected: String,
        got: usize,
    },

    #[error("'${name}' is used before it is assigned")]
    UnknownOutput { name: String },

    #[error("unknown enrichment strategy '{key}'")]
    UnknownStrategy { key: String },

    #[error("cannot use null in {operation}")]
    NullOperand { operation: String },

    #[error("{0}")]
    Type(String),
}

impl RuleError {
    /// Attach a source position, turning the error into a syntax error.
    pub(crate) fn at(self, line: usize, column: usize) -> Self {
        match self {
            err @ Self::Syntax { .. } => err,
            other => Self::Syntax {
                line,
                column,
                message: other.to_string(),
            },
        }
    }
}

impl From<RuleError> for CoreError {
    fn from(err: RuleError) -> Self {
        CoreError::RuleSyntax {
            message: err.to_string(),
        }
    }
}

/// Per-response values a rule may read besides the record itself.
#[derive(Debug, Clone, Copy)]
pub struct EnrichContext<'a> {
    pub base_url: &'a str,
    pub primary_key_field: &'a str,
}

/// Derives display fields for one record.
///
/// Implementations see only the record and the context; the returned map
/// is merged over the record's raw fields.
pub trait Enricher: fmt::Debug + Send + Sync {
    fn enrich(&self, node: &RawNode, ctx: &EnrichContext<'_>) -> Result<FieldMap, RuleError>;
}

/// Enrich one record, merging derived fields over raw ones.
///
/// Without an enricher the record passes through. When the enricher
/// fails, the record is kept unchanged and exactly one
/// `EnrichmentFailed` is reported.
pub fn enrich_node(
    raw: &RawNode,
    enricher: Option<&dyn Enricher>,
    ctx: &EnrichContext<'_>,
    sink: &dyn DiagnosticSink,
) -> EnrichedNode {
    let Some(enricher) = enricher else {
        return EnrichedNode::new(raw.fields().clone());
    };
    match enricher.enrich(raw, ctx) {
        Ok(derived) => {
            let mut fields = raw.fields().clone();
            fields.extend(derived);
            EnrichedNode::new(fields)
        }
        Err(err) => {
            sink.report(&CoreError::EnrichmentFailed {
                node_id: raw
                    .id(ctx.primary_key_field)
                    .unwrap_or_else(NodeId::unknown),
                reason: err.to_string(),
            });
            EnrichedNode::new(raw.fields().clone())
        }
    }
}

// ── Built-in strategies ─────────────────────────────────────────────

/// Adds `recordUrl = baseUrl/<primary key>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordLink;

impl Enricher for RecordLink {
    fn enrich(&self, node: &RawNode, ctx: &EnrichContext<'_>) -> Result<FieldMap, RuleError> {
        let id = node.id(ctx.primary_key_field).ok_or_else(|| {
            RuleError::Type(format!(
                "record has no '{}' value to link to",
                ctx.primary_key_field
            ))
        })?;
        let mut out = FieldMap::new();
        out.insert(
            "recordUrl".into(),
            Value::String(eval::join_url(&[
                ctx.base_url.to_owned(),
                id.as_str().to_owned(),
            ])),
        );
        Ok(out)
    }
}

/// [`RecordLink`] plus `recordLabel` copied from `Name`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordNameLink;

impl Enricher for RecordNameLink {
    fn enrich(&self, node: &RawNode, ctx: &EnrichContext<'_>) -> Result<FieldMap, RuleError> {
        let mut out = RecordLink.enrich(node, ctx)?;
        out.insert(
            "recordLabel".into(),
            node.get("Name").cloned().unwrap_or(Value::Null),
        );
        Ok(out)
    }
}

// ── Registry ────────────────────────────────────────────────────────

/// Named enrichment strategies plus the rule compiler.
#[derive(Clone)]
pub struct EnricherRegistry {
    strategies: BTreeMap<String, Arc<dyn Enricher>>,
}

impl EnricherRegistry {
    /// A registry with no strategies; only expression rules compile.
    pub fn empty() -> Self {
        Self {
            strategies: BTreeMap::new(),
        }
    }

    /// A registry with `record-link` and `record-name-link`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("record-link", Arc::new(RecordLink));
        registry.register("record-name-link", Arc::new(RecordNameLink));
        registry
    }

    /// Register a strategy, returning any it replaced.
    pub fn register(
        &mut self,
        key: impl Into<String>,
        enricher: Arc<dyn Enricher>,
    ) -> Option<Arc<dyn Enricher>> {
        self.strategies.insert(key.into(), enricher)
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn Enricher>> {
        self.strategies.get(key).cloned()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.strategies.keys().map(String::as_str)
    }

    /// Compile rule text into an enricher.
    ///
    /// Blank text (or text that is only comments) means no enrichment.
    pub fn compile(&self, text: &str) -> Result<Option<Arc<dyn Enricher>>, RuleError> {
        let trimmed = text.trim();
        if let Some(rest) = trimmed.strip_prefix(STRATEGY_PREFIX) {
            let key = rest.trim();
            return self
                .get(key)
                .map(Some)
                .ok_or_else(|| RuleError::UnknownStrategy { key: key.to_owned() });
        }

        let program = Program::compile(trimmed)?;
        if program.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Arc::new(program)))
        }
    }
}

impl Default for EnricherRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for EnricherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnricherRegistry")
            .field("strategies", &self.strategies.keys().collect::<Vec<_>>())
            .finish()
    }
}
