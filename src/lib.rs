//! # MFQ Engine
//!
//! A groupwise query engine: compiles and executes extended relational
//! queries where several named grouping variables independently filter and
//! aggregate one base relation, correlate through cross-references, and
//! combine into a single result (the phi operator).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mfq_engine::{MfqEngine, Relation, Value};
//!
//! let mut engine = MfqEngine::new();
//!
//! let sales = Relation::with_rows(
//!     vec!["cust".into(), "state".into(), "quant".into()],
//!     vec![vec![
//!         Value::String("c1".into()),
//!         Value::String("NY".into()),
//!         Value::Int64(20),
//!     ]],
//! );
//! engine.register_relation("sales", sales);
//!
//! let result = engine.execute_query(
//!     "select cust, sum(x.quant), sum(y.quant)\n\
//!      from sales\n\
//!      group by cust : x, y\n\
//!      suchthat x.state = 'NY' and x.quant > 15, y.state = 'NJ'\n\
//!      having sum(x.quant) > 0",
//! ).unwrap();
//!
//! println!("{} rows", result.row_count());
//! ```
//!
//! ## Pipeline
//!
//! Query text splits into clauses, builds a phi-operator specification,
//! parses predicates into grouping-variable-scoped expression trees,
//! orders the variables by their cross-reference dependencies, greedily
//! plans the join set, and executes: filter, windowed aggregate, join,
//! having, projection, distinct.

// Internal modules
pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod execution;
pub mod query;
pub mod storage;

// Public API - main types users need
pub use engine::{compile, MfqEngine};
pub use query::phi::{CompiledQuery, PhiOperatorSpec};

// Re-export commonly used error and data types
pub use error::{EngineError, EngineResult};
pub use storage::relation::Relation;
pub use storage::value::Value;
