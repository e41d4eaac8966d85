//! End-to-end tests for spec resolution: batching, caching, multi-store
//! partitioning, elementwise evaluation, and the error paths.

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tagexpr::{
    Error, Expr, Scalar, Series, Store, TagResolver, TagSpec, Timestamp, Value,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn ts(h: u32) -> Timestamp {
    Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap()
}

fn spec(entries: impl IntoIterator<Item = (&'static str, Expr)>) -> TagSpec {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

type CallLog = Rc<RefCell<Vec<Vec<String>>>>;

/// Serves canned values and records every fetch batch
struct RecordingStore {
    values: HashMap<String, Value>,
    calls: CallLog,
}

impl RecordingStore {
    fn new(values: impl IntoIterator<Item = (&'static str, Value)>) -> (Self, CallLog) {
        let calls: CallLog = Rc::new(RefCell::new(Vec::new()));
        let store = Self {
            values: values
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            calls: Rc::clone(&calls),
        };
        (store, calls)
    }
}

impl Store for RecordingStore {
    fn fetch(&self, tags: &[String]) -> anyhow::Result<HashMap<String, Value>> {
        self.calls.borrow_mut().push(tags.to_vec());
        Ok(tags
            .iter()
            .filter_map(|tag| self.values.get(tag).map(|v| (tag.clone(), v.clone())))
            .collect())
    }
}

/// Derives each tag's value from its numeric suffix: "A1" -> 1, "B2" -> 2
fn dummy_store(tags: &[String]) -> anyhow::Result<HashMap<String, Value>> {
    Ok(tags
        .iter()
        .map(|tag| {
            let n: i64 = tag
                .chars()
                .filter(|c| c.is_ascii_digit())
                .collect::<String>()
                .parse()
                .unwrap_or(0);
            (tag.clone(), Value::from(n))
        })
        .collect())
}

// Scenario A: one batched fetch, then arithmetic over the results.
#[test]
fn test_scalar_addition_over_one_store() {
    init_tracing();
    let (store, calls) = RecordingStore::new([("A", Value::from(2i64)), ("B", Value::from(3i64))]);
    let mut resolver = TagResolver::new(store);

    let results = resolver
        .resolve(&spec([("x", Expr::tag("A") + Expr::tag("B"))]))
        .unwrap();

    assert_eq!(results, HashMap::from([("x".to_string(), Value::from(5i64))]));
    let calls = calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], vec!["A".to_string(), "B".to_string()]);
}

// Scenario B: the second resolve only requests what the cache is missing.
#[test]
fn test_incremental_resolve_never_refetches() {
    let (store, calls) = RecordingStore::new([("A", Value::from(2i64)), ("B", Value::from(3i64))]);
    let mut resolver = TagResolver::new(store);

    let first = resolver.resolve(&spec([("a", Expr::tag("A"))])).unwrap();
    assert_eq!(first["a"], Value::from(2i64));

    let second = resolver
        .resolve(&spec([("s", Expr::tag("A") + Expr::tag("B"))]))
        .unwrap();
    assert_eq!(second["s"], Value::from(5i64));

    let calls = calls.borrow();
    assert_eq!(*calls, vec![vec!["A".to_string()], vec!["B".to_string()]]);
}

#[test]
fn test_fully_cached_spec_triggers_no_fetch() {
    let (store, calls) = RecordingStore::new([("A", Value::from(2i64)), ("B", Value::from(3i64))]);
    let mut resolver = TagResolver::new(store);

    resolver
        .resolve(&spec([("s", Expr::tag("A") + Expr::tag("B"))]))
        .unwrap();
    assert_eq!(calls.borrow().len(), 1);

    // dependencies of the second spec are a subset of the cache
    let results = resolver
        .resolve(&spec([("p", Expr::tag("A") * Expr::tag("B"))]))
        .unwrap();
    assert_eq!(results["p"], Value::from(6i64));
    assert_eq!(calls.borrow().len(), 1);
}

// Scenario C, scalar half: max(5, 9) == 9.
#[test]
fn test_apply_named_function_on_scalars() {
    let (store, _) = RecordingStore::new([("A", Value::from(5i64)), ("B", Value::from(9i64))]);
    let mut resolver = TagResolver::new(store);

    let results = resolver
        .resolve(&spec([("m", Expr::apply("max", [Expr::tag("A"), Expr::tag("B")]))]))
        .unwrap();
    assert_eq!(results["m"], Value::from(9i64));
}

// Scenario C, series half: max over a series and a broadcast scalar.
#[test]
fn test_apply_named_function_broadcasts_scalar() {
    let series: Series = [(ts(1), Scalar::Int(5)), (ts(2), Scalar::Int(9))]
        .into_iter()
        .collect();
    let (store, _) = RecordingStore::new([
        ("A", Value::Series(series)),
        ("B", Value::from(7i64)),
    ]);
    let mut resolver = TagResolver::new(store);

    let results = resolver
        .resolve(&spec([("m", Expr::apply("max", [Expr::tag("A"), Expr::tag("B")]))]))
        .unwrap();

    let expected: Series = [(ts(1), Scalar::Int(7)), (ts(2), Scalar::Int(9))]
        .into_iter()
        .collect();
    assert_eq!(results["m"], Value::Series(expected));
}

// Scenario D: boolean coercion fails at construction time, no store traffic.
#[test]
fn test_boolean_coercion_fails_before_any_fetch() {
    let (store, calls) = RecordingStore::new([("A", Value::from(1i64))]);
    let _resolver = TagResolver::new(store);

    let condition = Expr::tag("A").gt(0i64);
    let err = condition.truthy().unwrap_err();

    assert!(matches!(err, Error::BooleanContext(_)));
    assert!(calls.borrow().is_empty());
}

// Scenario E: unknown store key fails before the default store is invoked.
#[test]
fn test_unknown_store_fails_before_fetch() {
    let (store, calls) = RecordingStore::new([("A", Value::from(1i64))]);
    let mut resolver = TagResolver::new(store);

    let err = resolver
        .resolve(&spec([("bad", Expr::tag_in("avg", "A"))]))
        .unwrap_err();

    assert!(matches!(err, Error::UnknownStore { store, tag } if store == "avg" && tag == "A"));
    assert!(calls.borrow().is_empty());
}

#[test]
fn test_unknown_store_suppresses_all_fetches() {
    let (store, calls) = RecordingStore::new([("A", Value::from(1i64))]);
    let mut resolver = TagResolver::new(store);

    // the default-store half is resolvable, but validation of the whole
    // dependency set comes before any store call
    let err = resolver
        .resolve(&spec([(
            "mixed",
            Expr::tag("A") + Expr::tag_in("hourly", "H"),
        )]))
        .unwrap_err();

    assert!(matches!(err, Error::UnknownStore { store, tag } if store == "hourly" && tag == "H"));
    assert!(calls.borrow().is_empty());
}

#[test]
fn test_result_keys_equal_spec_keys() {
    let mut resolver = TagResolver::new(dummy_store);

    let results = resolver
        .resolve(&spec([
            ("value_1", Expr::tag("A1")),
            ("value_2", Expr::tag("A1") + Expr::tag("B2") * Expr::tag("B3")),
            ("value_3", Expr::lit(42i64)),
        ]))
        .unwrap();

    let mut keys: Vec<_> = results.keys().cloned().collect();
    keys.sort();
    assert_eq!(keys, vec!["value_1", "value_2", "value_3"]);
    assert_eq!(results["value_1"], Value::from(1i64));
    assert_eq!(results["value_2"], Value::from(7i64));
    assert_eq!(results["value_3"], Value::from(42i64));
}

#[test]
fn test_multi_store_partitioning() {
    let (default_store, default_calls) =
        RecordingStore::new([("A", Value::from(1i64)), ("B", Value::from(2i64))]);
    let (hourly, hourly_calls) = RecordingStore::new([("A", Value::from(10i64))]);
    let (daily, daily_calls) = RecordingStore::new([("C", Value::from(100i64))]);

    let mut resolver = TagResolver::new(default_store)
        .with_store("hourly", hourly)
        .with_store("daily", daily);

    let results = resolver
        .resolve(&spec([(
            "total",
            Expr::tag("A")
                + Expr::tag("B")
                + Expr::tag_in("hourly", "A")
                + Expr::tag_in("daily", "C"),
        )]))
        .unwrap();

    assert_eq!(results["total"], Value::from(113i64));
    // one invocation per store, each with only its own tags
    assert_eq!(
        *default_calls.borrow(),
        vec![vec!["A".to_string(), "B".to_string()]]
    );
    assert_eq!(*hourly_calls.borrow(), vec![vec!["A".to_string()]]);
    assert_eq!(*daily_calls.borrow(), vec![vec!["C".to_string()]]);
}

#[test]
fn test_store_with_no_outstanding_tags_is_not_invoked() {
    let (default_store, _) = RecordingStore::new([("A", Value::from(1i64))]);
    let (hourly, hourly_calls) = RecordingStore::new([("X", Value::from(9i64))]);

    let mut resolver = TagResolver::new(default_store).with_store("hourly", hourly);
    resolver.resolve(&spec([("a", Expr::tag("A"))])).unwrap();

    assert!(hourly_calls.borrow().is_empty());
}

#[test]
fn test_incomplete_fetch_is_fatal() {
    let (store, _) = RecordingStore::new([("A", Value::from(1i64))]);
    let mut resolver = TagResolver::new(store);

    let err = resolver
        .resolve(&spec([("s", Expr::tag("A") + Expr::tag("GONE"))]))
        .unwrap_err();

    assert!(matches!(
        err,
        Error::FetchIncomplete { store, missing }
            if store == "value_store" && missing == vec!["GONE".to_string()]
    ));
}

#[test]
fn test_store_failure_propagates() {
    fn broken(_tags: &[String]) -> anyhow::Result<HashMap<String, Value>> {
        Err(anyhow::anyhow!("connection refused"))
    }
    let mut resolver = TagResolver::new(broken);

    let err = resolver.resolve(&spec([("a", Expr::tag("A"))])).unwrap_err();
    assert!(matches!(err, Error::Store { store, .. } if store == "value_store"));
}

#[test]
fn test_series_alignment_end_to_end() {
    let a: Series = [(ts(1), Scalar::Int(1)), (ts(2), Scalar::Int(2))]
        .into_iter()
        .collect();
    let b: Series = [(ts(2), Scalar::Int(20)), (ts(3), Scalar::Int(30))]
        .into_iter()
        .collect();
    let (store, _) = RecordingStore::new([("A", Value::Series(a)), ("B", Value::Series(b))]);
    let mut resolver = TagResolver::new(store);

    let results = resolver
        .resolve(&spec([
            ("sum", Expr::tag("A") + Expr::tag("B")),
            ("scaled", Expr::tag("A") * Expr::lit(3i64)),
        ]))
        .unwrap();

    let expected_sum: Series = [
        (ts(1), None),
        (ts(2), Some(Scalar::Int(22))),
        (ts(3), None),
    ]
    .into_iter()
    .collect();
    assert_eq!(results["sum"], Value::Series(expected_sum));

    let expected_scaled: Series = [(ts(1), Scalar::Int(3)), (ts(2), Scalar::Int(6))]
        .into_iter()
        .collect();
    assert_eq!(results["scaled"], Value::Series(expected_scaled));
}

#[test]
fn test_comparisons_and_boolean_algebra() {
    let mut resolver = TagResolver::new(dummy_store);

    let results = resolver
        .resolve(&spec([
            ("hot", Expr::tag("A8").gt(5i64)),
            ("in_range", Expr::tag("A8").gt(5i64) & Expr::tag("A8").lt(9i64)),
            ("out_of_range", !(Expr::tag("A8").ge(8i64))),
        ]))
        .unwrap();

    assert_eq!(results["hot"], Value::from(true));
    assert_eq!(results["in_range"], Value::from(true));
    assert_eq!(results["out_of_range"], Value::from(false));
}

#[test]
fn test_direct_function_reference() {
    let mut resolver = TagResolver::new(dummy_store);

    let clamp = |args: &[Scalar]| -> tagexpr::Result<Scalar> {
        match args {
            [Scalar::Int(v), Scalar::Int(hi)] => Ok(Scalar::Int((*v).min(*hi))),
            _ => Err(Error::Type("clamp expects two integers".to_string())),
        }
    };
    let results = resolver
        .resolve(&spec([(
            "clamped",
            Expr::apply_fn(clamp, [Expr::tag("A9"), Expr::lit(5i64)]),
        )]))
        .unwrap();

    assert_eq!(results["clamped"], Value::from(5i64));
}

#[test]
fn test_resolution_is_repeatable() {
    let mut resolver = TagResolver::new(dummy_store);
    let s = spec([("v", (Expr::tag("A4") + Expr::tag("B6")).calc("sqrt"))]);

    let first = resolver.resolve(&s).unwrap();
    let second = resolver.resolve(&s).unwrap();
    assert_eq!(first, second);
    assert_eq!(first["v"], Value::from(Scalar::Float(10f64.sqrt())));
}
