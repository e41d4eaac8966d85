//! Resolve specs: collect dependencies, fetch in batches, evaluate
//!
//! A [`TagResolver`] owns the cache, the configured stores, and the function
//! registry. One `resolve` call runs the full pipeline: spec-internal
//! reference inlining, dependency collection, store-key validation, one
//! batched fetch per store for whatever the cache is missing, then pure
//! evaluation of every root. Repeated calls on the same instance reuse the
//! cache, so overlapping specs never re-request a tag.

use crate::ast::Expr;
use crate::cache::ValueCache;
use crate::deps;
use crate::error::{Error, Result};
use crate::evaluator::Evaluator;
use crate::functions::FunctionRegistry;
use crate::store::{Store, StoreSet, DEFAULT_STORE_KEY};
use crate::value::{Scalar, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace};

/// Output name -> root expression; the unit of work for one resolve call
pub type TagSpec = HashMap<String, Expr>;

/// Stateful orchestrator owning the cache and store/function configuration
///
/// The cache lives exactly as long as the resolver and is never invalidated;
/// create a new instance to force re-fetching.
pub struct TagResolver {
    cache: ValueCache,
    stores: StoreSet,
    functions: FunctionRegistry,
}

impl TagResolver {
    /// Create a resolver with the mandatory default store and the built-in
    /// function registry
    pub fn new(default_store: impl Store + 'static) -> Self {
        Self {
            cache: ValueCache::new(),
            stores: StoreSet::new(default_store),
            functions: FunctionRegistry::new(),
        }
    }

    /// Register an additional named store, selectable per leaf via
    /// [`Expr::tag_in`]
    pub fn with_store(mut self, key: impl Into<String>, store: impl Store + 'static) -> Self {
        self.stores.insert(key, store);
        self
    }

    /// Register one extra function on top of the built-ins
    pub fn with_function(
        mut self,
        name: impl Into<String>,
        function: impl Fn(&[Scalar]) -> Result<Scalar> + Send + Sync + 'static,
    ) -> Self {
        self.functions.register(name, function);
        self
    }

    /// Replace the function registry wholesale
    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    /// Read-only view of the cache, mainly for diagnostics and tests
    pub fn cache(&self) -> &ValueCache {
        &self.cache
    }

    /// Resolve every output in the spec
    ///
    /// Returns a mapping with exactly the spec's names, or the first error
    /// encountered during reference inlining, dependency validation, store
    /// invocation, or evaluation. Each configured store is invoked at most
    /// once, only with tags the cache does not already hold.
    pub fn resolve(&mut self, spec: &TagSpec) -> Result<HashMap<String, Value>> {
        let roots = inline_spec_refs(spec)?;
        let dependencies = deps::collect_all(roots.values());
        debug!(
            outputs = roots.len(),
            dependencies = dependencies.len(),
            "resolving tag spec"
        );

        // Validate every store key and partition uncached tags by store,
        // keeping the resolved store alongside its batch. Validation errors
        // fire before any store is contacted.
        let mut batches: BTreeMap<&str, (&dyn Store, Vec<String>)> = BTreeMap::new();
        for (store, tag) in &dependencies {
            let key = store.as_deref().unwrap_or(DEFAULT_STORE_KEY);
            let store = match self.stores.get(key) {
                Some(store) => store,
                None => {
                    return Err(Error::UnknownStore {
                        store: key.to_string(),
                        tag: tag.clone(),
                    })
                }
            };
            if self.cache.contains(key, tag) {
                trace!(store = key, tag = tag.as_str(), "cache hit");
            } else {
                batches
                    .entry(key)
                    .or_insert_with(|| (store, Vec::new()))
                    .1
                    .push(tag.clone());
            }
        }

        for (store_key, (store, mut tags)) in batches {
            tags.sort();
            debug!(store = store_key, tags = tags.len(), "fetching batch");
            let fetched = store.fetch(&tags).map_err(|source| Error::Store {
                store: store_key.to_string(),
                source,
            })?;

            let missing: Vec<String> = tags
                .iter()
                .filter(|tag| !fetched.contains_key(*tag))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(Error::FetchIncomplete {
                    store: store_key.to_string(),
                    missing,
                });
            }

            for (tag, value) in fetched {
                self.cache.insert(store_key, tag, value);
            }
        }

        let evaluator = Evaluator::new(&self.cache, &self.functions);
        let mut results = HashMap::with_capacity(roots.len());
        for (name, expr) in &roots {
            results.insert(name.clone(), evaluator.eval(expr)?);
        }
        Ok(results)
    }
}

/// Substitute spec-internal references in every root
///
/// A default-store leaf nested inside a composite expression, whose tag
/// equals the name of another spec output with a composite expression, refers
/// to that output rather than to a remote tag. Bare-leaf outputs never act as
/// aliases, and root-level leaves are always real tags. Cycles are detected
/// per root.
fn inline_spec_refs(spec: &TagSpec) -> Result<TagSpec> {
    let mut roots = TagSpec::with_capacity(spec.len());
    for (name, expr) in spec {
        let inlined = match expr {
            Expr::Leaf { .. } => expr.clone(),
            _ => {
                let mut stack = vec![name.clone()];
                inline_children(expr, spec, &mut stack)?
            }
        };
        roots.insert(name.clone(), inlined);
    }
    Ok(roots)
}

fn inline_children(expr: &Expr, spec: &TagSpec, stack: &mut Vec<String>) -> Result<Expr> {
    match expr {
        Expr::Leaf { .. } | Expr::Literal { .. } => Ok(expr.clone()),
        Expr::Binary { op, left, right } => Ok(Expr::Binary {
            op: *op,
            left: Box::new(inline_expr(left, spec, stack)?),
            right: Box::new(inline_expr(right, spec, stack)?),
        }),
        Expr::Unary { op, operand } => Ok(Expr::Unary {
            op: *op,
            operand: Box::new(inline_expr(operand, spec, stack)?),
        }),
        Expr::Apply { function, args } => Ok(Expr::Apply {
            function: function.clone(),
            args: args
                .iter()
                .map(|arg| inline_expr(arg, spec, stack))
                .collect::<Result<_>>()?,
        }),
    }
}

fn inline_expr(expr: &Expr, spec: &TagSpec, stack: &mut Vec<String>) -> Result<Expr> {
    if let Expr::Leaf { tag, store: None } = expr {
        // Only composite outputs act as aliases; a bare-leaf output is a
        // plain remote tag that happens to share a name.
        let target = spec.get(tag).filter(|e| !matches!(e, Expr::Leaf { .. }));
        if let Some(target) = target {
            if stack.contains(tag) {
                return Err(Error::CyclicSpec(tag.clone()));
            }
            stack.push(tag.clone());
            let inlined = inline_children(target, spec, stack)?;
            stack.pop();
            return Ok(inlined);
        }
    }
    inline_children(expr, spec, stack)
}
