//! Bottom-up elementwise evaluation of expressions against a cache
//!
//! Evaluation never performs I/O: every leaf must already be in the cache
//! (the resolver guarantees this by fetching first). Each root is a pure
//! function of the cache, so evaluation order across roots or positions
//! cannot change results.
//!
//! Alignment policy: combining two series outer-joins their indices. Where
//! both sides have a point the operator is applied; where only one side does,
//! the result carries a gap. Gaps, not errors, for partially overlapping
//! series.

use crate::ast::{BinaryOperator, Expr, FunctionRef, UnaryOperator};
use crate::cache::ValueCache;
use crate::error::{Error, Result};
use crate::functions::{FunctionRegistry, TagFunction};
use crate::store::DEFAULT_STORE_KEY;
use crate::value::{Scalar, Series, Value};

/// Evaluates expressions against a cache and a function registry
pub struct Evaluator<'a> {
    cache: &'a ValueCache,
    functions: &'a FunctionRegistry,
}

impl<'a> Evaluator<'a> {
    pub fn new(cache: &'a ValueCache, functions: &'a FunctionRegistry) -> Self {
        Self { cache, functions }
    }

    /// Evaluate one expression to a value
    pub fn eval(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Leaf { tag, store } => {
                let key = store.as_deref().unwrap_or(DEFAULT_STORE_KEY);
                self.cache
                    .get(key, tag)
                    .cloned()
                    .ok_or_else(|| Error::Unresolved {
                        store: key.to_string(),
                        tag: tag.clone(),
                    })
            }

            Expr::Literal { value } => Ok(Value::Scalar(value.clone())),

            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                eval_binary(*op, left, right)
            }

            Expr::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                eval_unary(*op, operand)
            }

            Expr::Apply { function, args } => {
                let operands: Vec<Value> =
                    args.iter().map(|arg| self.eval(arg)).collect::<Result<_>>()?;
                let function = self.resolve_function(function)?;
                eval_apply(function, &operands)
            }
        }
    }

    fn resolve_function<'b>(&'b self, function: &'b FunctionRef) -> Result<&'b TagFunction> {
        match function {
            FunctionRef::Named(name) => self
                .functions
                .get(name)
                .ok_or_else(|| Error::UnknownFunction(name.clone())),
            FunctionRef::Direct(f) => Ok(f),
        }
    }
}

/// Apply a binary operator with scalar broadcast and outer-join alignment
fn eval_binary(op: BinaryOperator, left: Value, right: Value) -> Result<Value> {
    match (left, right) {
        (Value::Scalar(l), Value::Scalar(r)) => Ok(Value::Scalar(scalar_binary(op, &l, &r)?)),

        // Scalar broadcast: the scalar combines with every point, the index
        // comes from the series side. Gaps stay gaps.
        (Value::Scalar(l), Value::Series(s)) => {
            let mut out = Series::new();
            for (ts, point) in s.iter() {
                match point {
                    Some(v) => out.insert(*ts, scalar_binary(op, &l, v)?),
                    None => out.insert_missing(*ts),
                }
            }
            Ok(Value::Series(out))
        }

        (Value::Series(s), Value::Scalar(r)) => {
            let mut out = Series::new();
            for (ts, point) in s.iter() {
                match point {
                    Some(v) => out.insert(*ts, scalar_binary(op, v, &r)?),
                    None => out.insert_missing(*ts),
                }
            }
            Ok(Value::Series(out))
        }

        (Value::Series(l), Value::Series(r)) => {
            let mut out = Series::new();
            for ts in Series::union_index([&l, &r]) {
                match (l.value_at(&ts), r.value_at(&ts)) {
                    (Some(x), Some(y)) => out.insert(ts, scalar_binary(op, x, y)?),
                    _ => out.insert_missing(ts),
                }
            }
            Ok(Value::Series(out))
        }
    }
}

/// Apply a unary operator elementwise
fn eval_unary(op: UnaryOperator, operand: Value) -> Result<Value> {
    match operand {
        Value::Scalar(s) => Ok(Value::Scalar(scalar_unary(op, &s)?)),
        Value::Series(series) => {
            let mut out = Series::new();
            for (ts, point) in series.iter() {
                match point {
                    Some(v) => out.insert(*ts, scalar_unary(op, v)?),
                    None => out.insert_missing(*ts),
                }
            }
            Ok(Value::Series(out))
        }
    }
}

/// Apply a function over operands: one call for all-scalar operands, one call
/// per index position otherwise, with scalars broadcast across positions. A
/// gap in any series operand yields a gap in the result at that position.
fn eval_apply(function: &TagFunction, operands: &[Value]) -> Result<Value> {
    let series: Vec<&Series> = operands.iter().filter_map(|v| v.as_series()).collect();

    if series.is_empty() {
        let scalars: Vec<Scalar> = operands
            .iter()
            .filter_map(|v| v.as_scalar().cloned())
            .collect();
        return Ok(Value::Scalar(function(&scalars)?));
    }

    let mut out = Series::new();
    'positions: for ts in Series::union_index(series.iter().copied()) {
        let mut row = Vec::with_capacity(operands.len());
        for operand in operands {
            match operand {
                Value::Scalar(s) => row.push(s.clone()),
                Value::Series(s) => match s.value_at(&ts) {
                    Some(v) => row.push(v.clone()),
                    None => {
                        out.insert_missing(ts);
                        continue 'positions;
                    }
                },
            }
        }
        out.insert(ts, function(&row)?);
    }
    Ok(Value::Series(out))
}

fn type_error(op: BinaryOperator, left: &Scalar, right: &Scalar) -> Error {
    Error::Type(format!(
        "invalid operands for {}: {:?} and {:?}",
        op.symbol(),
        left,
        right
    ))
}

/// Python-style floor division: rounds toward negative infinity
fn floordiv_i64(l: i64, r: i64) -> i64 {
    let q = l / r;
    if l % r != 0 && (l < 0) != (r < 0) {
        q - 1
    } else {
        q
    }
}

/// Python-style modulo: the result takes the sign of the divisor
fn rem_i64(l: i64, r: i64) -> i64 {
    let m = l % r;
    if m != 0 && (m < 0) != (r < 0) {
        m + r
    } else {
        m
    }
}

fn rem_f64(l: f64, r: f64) -> f64 {
    let m = l % r;
    if m != 0.0 && (m < 0.0) != (r < 0.0) {
        m + r
    } else {
        m
    }
}

fn scalars_equal(left: &Scalar, right: &Scalar) -> bool {
    match (left, right) {
        (Scalar::Bool(l), Scalar::Bool(r)) => l == r,
        (Scalar::Str(l), Scalar::Str(r)) => l == r,
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(l), Some(r)) => l == r,
            _ => false,
        },
    }
}

/// Combine two scalars with a binary operator
pub(crate) fn scalar_binary(op: BinaryOperator, left: &Scalar, right: &Scalar) -> Result<Scalar> {
    use Scalar::{Bool, Float, Int, Str};

    match op {
        BinaryOperator::Add => match (left, right) {
            (Int(l), Int(r)) => Ok(Int(l + r)),
            (Float(l), Float(r)) => Ok(Float(l + r)),
            (Int(l), Float(r)) => Ok(Float(*l as f64 + r)),
            (Float(l), Int(r)) => Ok(Float(l + *r as f64)),
            (Str(l), Str(r)) => Ok(Str(format!("{}{}", l, r))),
            _ => Err(type_error(op, left, right)),
        },

        BinaryOperator::Sub => match (left, right) {
            (Int(l), Int(r)) => Ok(Int(l - r)),
            (Float(l), Float(r)) => Ok(Float(l - r)),
            (Int(l), Float(r)) => Ok(Float(*l as f64 - r)),
            (Float(l), Int(r)) => Ok(Float(l - *r as f64)),
            _ => Err(type_error(op, left, right)),
        },

        BinaryOperator::Mul => match (left, right) {
            (Int(l), Int(r)) => Ok(Int(l * r)),
            (Float(l), Float(r)) => Ok(Float(l * r)),
            (Int(l), Float(r)) => Ok(Float(*l as f64 * r)),
            (Float(l), Int(r)) => Ok(Float(l * *r as f64)),
            _ => Err(type_error(op, left, right)),
        },

        // True division: integer operands still produce a float
        BinaryOperator::Div => {
            let l = left.as_f64().ok_or_else(|| type_error(op, left, right))?;
            let r = right.as_f64().ok_or_else(|| type_error(op, left, right))?;
            if r == 0.0 {
                return Err(Error::Type("division by zero".to_string()));
            }
            Ok(Float(l / r))
        }

        BinaryOperator::FloorDiv => match (left, right) {
            (Int(_), Int(0)) => Err(Error::Type("division by zero".to_string())),
            (Int(l), Int(r)) => Ok(Int(floordiv_i64(*l, *r))),
            _ => {
                let l = left.as_f64().ok_or_else(|| type_error(op, left, right))?;
                let r = right.as_f64().ok_or_else(|| type_error(op, left, right))?;
                if r == 0.0 {
                    return Err(Error::Type("division by zero".to_string()));
                }
                Ok(Float((l / r).floor()))
            }
        },

        BinaryOperator::Rem => match (left, right) {
            (Int(_), Int(0)) => Err(Error::Type("modulo by zero".to_string())),
            (Int(l), Int(r)) => Ok(Int(rem_i64(*l, *r))),
            _ => {
                let l = left.as_f64().ok_or_else(|| type_error(op, left, right))?;
                let r = right.as_f64().ok_or_else(|| type_error(op, left, right))?;
                if r == 0.0 {
                    return Err(Error::Type("modulo by zero".to_string()));
                }
                Ok(Float(rem_f64(l, r)))
            }
        },

        BinaryOperator::Pow => match (left, right) {
            (Int(l), Int(r)) if *r >= 0 => Ok(Int(l.pow(*r as u32))),
            (Int(l), Int(r)) => Ok(Float((*l as f64).powf(*r as f64))),
            (Float(l), Float(r)) => Ok(Float(l.powf(*r))),
            (Int(l), Float(r)) => Ok(Float((*l as f64).powf(*r))),
            (Float(l), Int(r)) => Ok(Float(l.powf(*r as f64))),
            _ => Err(type_error(op, left, right)),
        },

        BinaryOperator::Lt => compare(op, left, right, |o| o == std::cmp::Ordering::Less),
        BinaryOperator::Le => compare(op, left, right, |o| o != std::cmp::Ordering::Greater),
        BinaryOperator::Gt => compare(op, left, right, |o| o == std::cmp::Ordering::Greater),
        BinaryOperator::Ge => compare(op, left, right, |o| o != std::cmp::Ordering::Less),

        BinaryOperator::Eq => Ok(Bool(scalars_equal(left, right))),
        BinaryOperator::Ne => Ok(Bool(!scalars_equal(left, right))),

        BinaryOperator::BitAnd => match (left, right) {
            (Bool(l), Bool(r)) => Ok(Bool(*l && *r)),
            (Int(l), Int(r)) => Ok(Int(l & r)),
            _ => Err(type_error(op, left, right)),
        },

        BinaryOperator::BitOr => match (left, right) {
            (Bool(l), Bool(r)) => Ok(Bool(*l || *r)),
            (Int(l), Int(r)) => Ok(Int(l | r)),
            _ => Err(type_error(op, left, right)),
        },

        BinaryOperator::BitXor => match (left, right) {
            (Bool(l), Bool(r)) => Ok(Bool(l ^ r)),
            (Int(l), Int(r)) => Ok(Int(l ^ r)),
            _ => Err(type_error(op, left, right)),
        },
    }
}

fn compare(
    op: BinaryOperator,
    left: &Scalar,
    right: &Scalar,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> Result<Scalar> {
    let ordering = match (left, right) {
        (Scalar::Str(l), Scalar::Str(r)) => l.cmp(r),
        _ => {
            let l = left.as_f64().ok_or_else(|| type_error(op, left, right))?;
            let r = right.as_f64().ok_or_else(|| type_error(op, left, right))?;
            l.partial_cmp(&r)
                .ok_or_else(|| Error::Type(format!("cannot compare {} with {}", l, r)))?
        }
    };
    Ok(Scalar::Bool(accept(ordering)))
}

/// Apply a unary operator to one scalar
pub(crate) fn scalar_unary(op: UnaryOperator, operand: &Scalar) -> Result<Scalar> {
    match op {
        UnaryOperator::Neg => match operand {
            Scalar::Int(i) => Ok(Scalar::Int(-i)),
            Scalar::Float(f) => Ok(Scalar::Float(-f)),
            other => Err(Error::Type(format!("cannot negate {:?}", other))),
        },
        UnaryOperator::Not => match operand {
            Scalar::Bool(b) => Ok(Scalar::Bool(!b)),
            Scalar::Int(i) => Ok(Scalar::Int(!i)),
            other => Err(Error::Type(format!("cannot complement {:?}", other))),
        },
    }
}
