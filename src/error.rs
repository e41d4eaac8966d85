//! Error types for expression construction and resolution
//!
//! Every failure mode surfaces synchronously from `TagResolver::resolve` (or
//! earlier, at construction time). Nothing is retried internally and there is
//! no partial-result mode: a resolve call either returns a value for every
//! name in the spec or fails on the first error.

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// All errors raised by the engine
#[derive(Debug, Error)]
pub enum Error {
    /// An unevaluated expression was coerced to a native boolean.
    ///
    /// Short-circuit logic (`&&`, `||`, `if`) would have to pick a branch
    /// before any data has been fetched, so this is a permanent restriction
    /// rather than a missing feature. Boolean logic belongs inside the
    /// expression, via `bitand`/`bitor`/`bitxor`/`not`.
    #[error(
        "expression `{0}` has no truth value before it is resolved; \
         build boolean logic into the expression with `bitand`/`bitor`/`not`"
    )]
    BooleanContext(String),

    /// A leaf references a store key that no fetch function is registered for.
    /// Raised during dependency resolution, before any store is contacted.
    #[error("tag `{tag}` references unknown store `{store}`")]
    UnknownStore { store: String, tag: String },

    /// A named function reference is absent from the registry.
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// A store's response omitted one or more requested tags.
    #[error("store `{store}` did not return requested tags: {}", missing.join(", "))]
    FetchIncomplete { store: String, missing: Vec<String> },

    /// A spec output refers (directly or transitively) to itself.
    #[error("cyclic definition of output `{0}`")]
    CyclicSpec(String),

    /// A leaf was evaluated without its value being fetched first.
    /// Cannot happen through `TagResolver::resolve`; only reachable when
    /// driving `Evaluator` by hand against an incomplete cache.
    #[error("tag `{tag}` from store `{store}` has not been fetched")]
    Unresolved { store: String, tag: String },

    /// An operator or function was applied to unsupported operand types.
    #[error("{0}")]
    Type(String),

    /// An injected store fetch function failed.
    #[error("store `{store}` failed")]
    Store {
        store: String,
        #[source]
        source: anyhow::Error,
    },
}
