/// Native SQL emission
/// Translating a compiled phi operator into standard SQL for a remote
/// engine. The trait is the committed surface; the Postgres path is not
/// implemented.
use crate::error::{EngineError, EngineResult};
use crate::query::phi::PhiOperatorSpec;

pub trait SqlBackend {
    /// Render the specification as native SQL text for a remote engine
    fn emit(&self, spec: &PhiOperatorSpec) -> EngineResult<String>;
}

#[derive(Default)]
pub struct PostgresBackend;

impl PostgresBackend {
    pub fn new() -> Self {
        Self
    }
}

impl SqlBackend for PostgresBackend {
    fn emit(&self, spec: &PhiOperatorSpec) -> EngineResult<String> {
        Err(EngineError::unsupported(format!(
            "native SQL emission for query over '{}' is not implemented",
            spec.relation_name
        )))
    }
}
