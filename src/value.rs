//! Runtime values: scalars and time-indexed series
//!
//! Everything a store can return, and everything evaluation can produce, is a
//! [`Value`]: either a single [`Scalar`] or a [`Series`] of scalars keyed by
//! timestamp. Series points are `Option<Scalar>` so that aligning two series
//! with partially overlapping indices can mark gaps instead of erroring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Index label for series points
pub type Timestamp = DateTime<Utc>;

/// A single value: number, boolean, or string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl Scalar {
    /// Numeric view of this scalar, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            Scalar::Bool(_) | Scalar::Str(_) => None,
        }
    }

    /// Check if a scalar is truthy
    pub fn is_truthy(&self) -> bool {
        match self {
            Scalar::Bool(b) => *b,
            Scalar::Int(i) => *i != 0,
            Scalar::Float(f) => *f != 0.0,
            Scalar::Str(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

/// An ordered sequence of timestamped points
///
/// Index labels are unique and totally ordered by construction (`BTreeMap`).
/// A `None` point is a gap: the index position exists but carries no value,
/// which is how outer-join alignment records positions present on only one
/// side of a binary operation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Series {
    points: BTreeMap<Timestamp, Option<Scalar>>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a point, replacing any existing point at the same timestamp
    pub fn insert(&mut self, ts: Timestamp, value: impl Into<Scalar>) {
        self.points.insert(ts, Some(value.into()));
    }

    /// Insert a gap at the given timestamp
    pub fn insert_missing(&mut self, ts: Timestamp) {
        self.points.insert(ts, None);
    }

    /// Value at a timestamp; `None` for both gaps and absent positions
    pub fn value_at(&self, ts: &Timestamp) -> Option<&Scalar> {
        self.points.get(ts).and_then(|p| p.as_ref())
    }

    /// Whether the index contains the given timestamp (gap or not)
    pub fn contains(&self, ts: &Timestamp) -> bool {
        self.points.contains_key(ts)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterate points in index order
    pub fn iter(&self) -> impl Iterator<Item = (&Timestamp, Option<&Scalar>)> {
        self.points.iter().map(|(ts, p)| (ts, p.as_ref()))
    }

    /// Iterate index labels in order
    pub fn index(&self) -> impl Iterator<Item = &Timestamp> {
        self.points.keys()
    }

    /// Sorted union of the index labels of several series
    pub fn union_index<'a>(series: impl IntoIterator<Item = &'a Series>) -> BTreeSet<Timestamp> {
        let mut union = BTreeSet::new();
        for s in series {
            union.extend(s.points.keys().copied());
        }
        union
    }
}

impl FromIterator<(Timestamp, Scalar)> for Series {
    fn from_iter<I: IntoIterator<Item = (Timestamp, Scalar)>>(iter: I) -> Self {
        Series {
            points: iter.into_iter().map(|(ts, v)| (ts, Some(v))).collect(),
        }
    }
}

impl FromIterator<(Timestamp, Option<Scalar>)> for Series {
    fn from_iter<I: IntoIterator<Item = (Timestamp, Option<Scalar>)>>(iter: I) -> Self {
        Series {
            points: iter.into_iter().collect(),
        }
    }
}

/// Result of fetching or evaluating a tag expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Scalar(Scalar),
    Series(Series),
}

impl Value {
    pub fn is_series(&self) -> bool {
        matches!(self, Value::Series(_))
    }

    /// The contained scalar, if this is a scalar value
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            Value::Series(_) => None,
        }
    }

    /// The contained series, if this is a series value
    pub fn as_series(&self) -> Option<&Series> {
        match self {
            Value::Scalar(_) => None,
            Value::Series(s) => Some(s),
        }
    }
}

impl From<Scalar> for Value {
    fn from(v: Scalar) -> Self {
        Value::Scalar(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Scalar(Scalar::Int(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(Scalar::Float(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Scalar(Scalar::Bool(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Scalar(Scalar::Str(v.to_string()))
    }
}

impl From<Series> for Value {
    fn from(s: Series) -> Self {
        Value::Series(s)
    }
}
