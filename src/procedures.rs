//! Procedure sets: the operations available at a point in the pipeline.
//!
//! The core treats procedure definitions as opaque: a key, a kind, and the
//! names of the input and output shapes. They are used only to reject
//! operations whose key the current set does not declare.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// The kind of a procedure, and of the operation invoking it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcedureKind {
    Query,
    Mutation,
    Subscription,
}

impl ProcedureKind {
    /// Lowercase name, as used in error messages and serialized schemas.
    pub fn as_str(self) -> &'static str {
        match self {
            ProcedureKind::Query => "query",
            ProcedureKind::Mutation => "mutation",
            ProcedureKind::Subscription => "subscription",
        }
    }
}

impl fmt::Display for ProcedureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureDef {
    pub key: String,
    pub kind: ProcedureKind,
    /// Name of the input shape
    pub input: String,
    /// Name of the output shape
    pub output: String,
}

impl ProcedureDef {
    pub fn new(
        key: impl Into<String>,
        kind: ProcedureKind,
        input: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            kind,
            input: input.into(),
            output: output.into(),
        }
    }
}

/// An immutable set of procedures keyed by their unique key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureSchema {
    procedures: BTreeMap<String, ProcedureDef>,
}

impl ProcedureSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a procedure. A later definition replaces an earlier one with the
    /// same key.
    #[must_use]
    pub fn with(mut self, def: ProcedureDef) -> Self {
        if let Some(previous) = self.procedures.insert(def.key.clone(), def) {
            log::warn!(
                "procedure `{}` declared twice; keeping the last definition",
                previous.key
            );
        }
        self
    }

    #[must_use]
    pub fn query(self, key: &str, input: &str, output: &str) -> Self {
        self.with(ProcedureDef::new(key, ProcedureKind::Query, input, output))
    }

    #[must_use]
    pub fn mutation(self, key: &str, input: &str, output: &str) -> Self {
        self.with(ProcedureDef::new(key, ProcedureKind::Mutation, input, output))
    }

    #[must_use]
    pub fn subscription(self, key: &str, input: &str, output: &str) -> Self {
        self.with(ProcedureDef::new(
            key,
            ProcedureKind::Subscription,
            input,
            output,
        ))
    }

    pub fn get(&self, key: &str) -> Option<&ProcedureDef> {
        self.procedures.get(key)
    }

    /// Look up `key` and require it to be a procedure of `kind`.
    pub fn resolve(&self, kind: ProcedureKind, key: &str) -> Result<&ProcedureDef, Error> {
        self.procedures
            .get(key)
            .filter(|def| def.kind == kind)
            .ok_or_else(|| Error::UnknownProcedure {
                kind,
                key: key.to_string(),
            })
    }

    /// Keys of all procedures of `kind`, sorted.
    pub fn keys(&self, kind: ProcedureKind) -> impl Iterator<Item = &str> {
        self.procedures
            .values()
            .filter(move |def| def.kind == kind)
            .map(|def| def.key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcedureDef> {
        self.procedures.values()
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }
}

impl FromIterator<ProcedureDef> for ProcedureSchema {
    fn from_iter<I: IntoIterator<Item = ProcedureDef>>(iter: I) -> Self {
        iter.into_iter().fold(ProcedureSchema::new(), ProcedureSchema::with)
    }
}

/// A procedure set known at compile time.
///
/// Implemented by a marker type per API surface. Links name their input and
/// output sets through this trait, so a link that projects procedures
/// changes the client's type.
///
/// ```
/// use rspc_client::{ProcedureSchema, Procedures};
///
/// struct Api;
///
/// impl Procedures for Api {
///     fn schema() -> ProcedureSchema {
///         ProcedureSchema::new()
///             .query("version", "()", "String")
///             .mutation("users.create", "NewUser", "User")
///     }
/// }
///
/// assert_eq!(Api::schema().len(), 2);
/// ```
pub trait Procedures: Send + Sync + 'static {
    fn schema() -> ProcedureSchema;
}

/// The empty procedure set.
impl Procedures for () {
    fn schema() -> ProcedureSchema {
        ProcedureSchema::new()
    }
}

pub(crate) fn schema_of<P: Procedures>() -> Arc<ProcedureSchema> {
    Arc::new(P::schema())
}
