/// Unified error type for the groupwise query engine
/// Compile/plan failures form the query taxonomy; substrate failures carry
/// the offending grouping variable and pipeline stage.
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// Query text does not partition into the recognized clauses
    #[error("malformed query: {message}")]
    MalformedQuery { message: String },

    /// A condition does not parse into a valid comparison structure
    #[error("invalid predicate '{condition}': {message}")]
    InvalidPredicate { condition: String, message: String },

    /// A grouping variable was referenced without being declared
    #[error("unknown grouping variable '{gv}' referenced in {context}")]
    UnknownGroupingVariable { gv: String, context: String },

    /// The suchthat cross-references form a cycle
    #[error("cyclic dependency between grouping variables {remaining:?}")]
    CyclicDependency { remaining: Vec<String> },

    /// More than one grouping variable must be joined but the grouping key is empty
    #[error("cannot join grouping variables {participants:?} on an empty grouping key")]
    EmptyJoinKey { participants: Vec<String> },

    /// Substrate/runtime failures, tagged with grouping variable and stage
    #[error("execution error: {message}")]
    Execution {
        message: String,
        gv: Option<String>,
        stage: Option<String>,
    },

    /// Declared but intentionally unimplemented paths
    #[error("unsupported operation: {message}")]
    Unsupported { message: String },

    /// File and CSV I/O
    #[error("IO error: {message}")]
    Io { message: String, path: Option<String> },

    /// Configuration loading/saving
    #[error("config error: {message}")]
    Config { message: String, path: Option<String> },
}

impl EngineError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedQuery { message: message.into() }
    }

    pub fn invalid_predicate(condition: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPredicate {
            condition: condition.into(),
            message: message.into(),
        }
    }

    pub fn unknown_gv(gv: impl Into<String>, context: impl Into<String>) -> Self {
        Self::UnknownGroupingVariable {
            gv: gv.into(),
            context: context.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            gv: None,
            stage: None,
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported { message: message.into() }
    }

    pub fn io_with_path(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    pub fn config_with_path(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    /// Tag an execution error with the grouping variable and pipeline stage
    /// it surfaced in; other variants pass through unchanged.
    pub fn tagged(mut self, gv: &str, stage: &str) -> Self {
        if let Self::Execution { gv: err_gv, stage: err_stage, .. } = &mut self {
            if err_gv.is_none() {
                *err_gv = Some(gv.to_string());
            }
            if err_stage.is_none() {
                *err_stage = Some(stage.to_string());
            }
        }
        self
    }
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        Self::Execution {
            message: err.to_string(),
            gv: None,
            stage: None,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            path: None,
        }
    }
}

impl From<csv::Error> for EngineError {
    fn from(err: csv::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            path: None,
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config {
            message: err.to_string(),
            path: None,
        }
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
