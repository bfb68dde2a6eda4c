//! Schema-bundle registry and merge.
//!
//! # Responsibility
//! - Hold named schema sources, each contributing a DDL fragment.
//! - Merge the sources a configuration names into exactly one schema.
//!
//! # Invariants
//! - Source ids are unique within a registry.
//! - A merge either yields one `MergedSchema` or fails; there is no
//!   partial result.
//! - `MergedSchema` is never mutated after creation.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One named schema bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSource {
    /// Stable identifier referenced from `StoreConfig::model_sources`.
    pub id: String,
    /// DDL applied at store attachment. Must be idempotent
    /// (`CREATE TABLE IF NOT EXISTS` style) because attachment re-runs it
    /// on every startup.
    pub ddl: String,
    /// Optional ordering clause consumers may apply to default queries.
    pub default_order_by: Option<String>,
}

impl SchemaSource {
    pub fn new(id: impl Into<String>, ddl: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ddl: ddl.into(),
            default_order_by: None,
        }
    }

    pub fn with_default_order_by(mut self, clause: impl Into<String>) -> Self {
        self.default_order_by = Some(clause.into());
        self
    }
}

/// Registry of schema sources known to the process.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    sources: BTreeMap<String, SchemaSource>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one schema source.
    ///
    /// # Errors
    /// - Blank id.
    /// - Id already registered.
    pub fn register(&mut self, source: SchemaSource) -> Result<(), SchemaError> {
        let id = source.id.trim().to_string();
        if id.is_empty() {
            return Err(SchemaError::BlankSourceId);
        }
        if self.sources.contains_key(id.as_str()) {
            return Err(SchemaError::DuplicateSourceId(id));
        }

        self.sources.insert(id.clone(), SchemaSource { id, ..source });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Returns sorted registered source ids.
    pub fn source_ids(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }

    /// Merges the named sources into exactly one schema.
    ///
    /// Fragments are concatenated in the order requested, which keeps the
    /// merged DDL deterministic for a given configuration.
    ///
    /// # Errors
    /// - Empty request.
    /// - Unknown or repeated source id in the request.
    pub fn merge(&self, model_sources: &[String]) -> Result<MergedSchema, SchemaError> {
        if model_sources.is_empty() {
            return Err(SchemaError::NoModelSources);
        }

        let mut source_ids = Vec::with_capacity(model_sources.len());
        let mut ddl = String::new();
        let mut default_order_by = None;

        for requested in model_sources {
            let id = requested.trim();
            let source = self
                .sources
                .get(id)
                .ok_or_else(|| SchemaError::UnknownSource(id.to_string()))?;
            if source_ids.iter().any(|seen: &String| seen == id) {
                return Err(SchemaError::RepeatedSource(id.to_string()));
            }

            if !ddl.is_empty() {
                ddl.push('\n');
            }
            ddl.push_str(source.ddl.trim_end());
            ddl.push('\n');
            if default_order_by.is_none() {
                default_order_by = source.default_order_by.clone();
            }
            source_ids.push(source.id.clone());
        }

        Ok(MergedSchema {
            source_ids,
            ddl,
            default_order_by,
        })
    }
}

/// The single schema object produced by a successful merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedSchema {
    source_ids: Vec<String>,
    ddl: String,
    default_order_by: Option<String>,
}

impl MergedSchema {
    pub fn source_ids(&self) -> &[String] {
        &self.source_ids
    }

    pub fn ddl(&self) -> &str {
        &self.ddl
    }

    /// First ordering clause declared by the merged sources, if any.
    pub fn default_order_by(&self) -> Option<&str> {
        self.default_order_by.as_deref()
    }
}

/// Schema registration and merge errors. Merge failures are fatal at
/// provisioning time; the system cannot run without a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    BlankSourceId,
    DuplicateSourceId(String),
    NoModelSources,
    UnknownSource(String),
    RepeatedSource(String),
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankSourceId => write!(f, "schema source id must not be blank"),
            Self::DuplicateSourceId(id) => {
                write!(f, "schema source id already registered: {id}")
            }
            Self::NoModelSources => write!(f, "configuration names no model sources"),
            Self::UnknownSource(id) => write!(f, "schema source not registered: {id}"),
            Self::RepeatedSource(id) => {
                write!(f, "schema source requested more than once: {id}")
            }
        }
    }
}

impl Error for SchemaError {}
