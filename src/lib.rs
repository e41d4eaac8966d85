//! tagexpr - lazy tag expressions over batched, cached data stores
//!
//! Build algebraic expressions whose leaves name values in remote stores,
//! then resolve whole specs in one pass: dependencies are collected across
//! all outputs, each store is asked once for everything that is not already
//! cached, and evaluation runs purely against the cache. Results are scalars
//! or time-indexed series; series combine elementwise, broadcasting scalars
//! and outer-joining mismatched indices with gaps.
//!
//! ```
//! use std::collections::HashMap;
//! use tagexpr::{Expr, TagResolver, Value};
//!
//! fn demo_store(tags: &[String]) -> anyhow::Result<HashMap<String, Value>> {
//!     Ok(tags
//!         .iter()
//!         .enumerate()
//!         .map(|(i, tag)| (tag.clone(), Value::from(i as i64 + 2)))
//!         .collect())
//! }
//!
//! let mut resolver = TagResolver::new(demo_store);
//! let spec = HashMap::from([
//!     ("x".to_string(), Expr::tag("A") + Expr::tag("B")),
//! ]);
//! let results = resolver.resolve(&spec).unwrap();
//! assert_eq!(results["x"], Value::from(5i64));
//! ```

pub mod ast;
pub mod cache;
pub mod deps;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod resolver;
pub mod store;
pub mod value;

pub use ast::{BinaryOperator, Expr, FunctionRef, UnaryOperator};
pub use cache::ValueCache;
pub use error::{Error, Result};
pub use evaluator::Evaluator;
pub use functions::{FunctionRegistry, TagFunction};
pub use resolver::{TagResolver, TagSpec};
pub use store::{Store, StoreSet, DEFAULT_STORE_KEY};
pub use value::{Scalar, Series, Timestamp, Value};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
