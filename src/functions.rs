//! Named function registry for `Expr::apply`
//!
//! A registry maps function names to scalar callables. The evaluator resolves
//! `FunctionRef::Named` against it at evaluation time and drives the call
//! elementwise over series operands, so the functions themselves only ever
//! see scalars. The default registry covers the usual numeric and boolean
//! helpers; callers extend it at resolver construction.

use crate::error::{Error, Result};
use crate::value::Scalar;
use std::collections::HashMap;
use std::sync::Arc;

/// Function signature: one call per scalar position, variadic arity >= 1
pub type TagFunction = Arc<dyn Fn(&[Scalar]) -> Result<Scalar> + Send + Sync>;

/// Name -> callable registry
pub struct FunctionRegistry {
    functions: HashMap<String, TagFunction>,
}

impl FunctionRegistry {
    /// Create a registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self::empty();

        // Trigonometry and logarithms
        registry.register("sin", fn_sin);
        registry.register("cos", fn_cos);
        registry.register("tan", fn_tan);
        registry.register("sqrt", fn_sqrt);
        registry.register("log", fn_log);
        registry.register("log2", fn_log2);
        registry.register("log10", fn_log10);

        // Rounding
        registry.register("ceil", fn_ceil);
        registry.register("floor", fn_floor);
        registry.register("round", fn_round);

        // Numeric
        registry.register("abs", fn_abs);
        registry.register("recip", fn_recip);
        registry.register("min", fn_min);
        registry.register("max", fn_max);
        registry.register("sum", fn_sum);
        registry.register("avg", fn_avg);

        // Boolean (truthiness-based)
        registry.register("bool", fn_bool);
        registry.register("not", fn_not);

        registry
    }

    /// Create a registry with no functions
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Register a function, replacing any existing one with the same name
    pub fn register(
        &mut self,
        name: impl Into<String>,
        function: impl Fn(&[Scalar]) -> Result<Scalar> + Send + Sync + 'static,
    ) {
        self.functions.insert(name.into(), Arc::new(function));
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&TagFunction> {
        self.functions.get(name)
    }

    /// Call a function by name
    pub fn call(&self, name: &str, args: &[Scalar]) -> Result<Scalar> {
        match self.functions.get(name) {
            Some(function) => function(args),
            None => Err(Error::UnknownFunction(name.to_string())),
        }
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// List all registered function names
    pub fn names(&self) -> Vec<&str> {
        self.functions.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn expect_arity(name: &str, args: &[Scalar], arity: usize) -> Result<()> {
    if args.len() != arity {
        return Err(Error::Type(format!(
            "{}() expects {} argument(s), got {}",
            name,
            arity,
            args.len()
        )));
    }
    Ok(())
}

fn expect_at_least(name: &str, args: &[Scalar], arity: usize) -> Result<()> {
    if args.len() < arity {
        return Err(Error::Type(format!(
            "{}() expects at least {} argument(s), got {}",
            name,
            arity,
            args.len()
        )));
    }
    Ok(())
}

fn numeric(name: &str, arg: &Scalar) -> Result<f64> {
    arg.as_f64()
        .ok_or_else(|| Error::Type(format!("{}() expects a numeric argument, got {}", name, arg)))
}

fn fn_sin(args: &[Scalar]) -> Result<Scalar> {
    expect_arity("sin", args, 1)?;
    Ok(Scalar::Float(numeric("sin", &args[0])?.sin()))
}

fn fn_cos(args: &[Scalar]) -> Result<Scalar> {
    expect_arity("cos", args, 1)?;
    Ok(Scalar::Float(numeric("cos", &args[0])?.cos()))
}

fn fn_tan(args: &[Scalar]) -> Result<Scalar> {
    expect_arity("tan", args, 1)?;
    Ok(Scalar::Float(numeric("tan", &args[0])?.tan()))
}

fn fn_sqrt(args: &[Scalar]) -> Result<Scalar> {
    expect_arity("sqrt", args, 1)?;
    let x = numeric("sqrt", &args[0])?;
    if x < 0.0 {
        return Err(Error::Type(format!("sqrt() of negative value {}", x)));
    }
    Ok(Scalar::Float(x.sqrt()))
}

/// `log(x)` is the natural logarithm; `log(x, base)` uses the given base
fn fn_log(args: &[Scalar]) -> Result<Scalar> {
    match args {
        [x] => Ok(Scalar::Float(numeric("log", x)?.ln())),
        [x, base] => Ok(Scalar::Float(
            numeric("log", x)?.log(numeric("log", base)?),
        )),
        _ => Err(Error::Type(format!(
            "log() expects 1 or 2 arguments, got {}",
            args.len()
        ))),
    }
}

fn fn_log2(args: &[Scalar]) -> Result<Scalar> {
    expect_arity("log2", args, 1)?;
    Ok(Scalar::Float(numeric("log2", &args[0])?.log2()))
}

fn fn_log10(args: &[Scalar]) -> Result<Scalar> {
    expect_arity("log10", args, 1)?;
    Ok(Scalar::Float(numeric("log10", &args[0])?.log10()))
}

fn fn_ceil(args: &[Scalar]) -> Result<Scalar> {
    expect_arity("ceil", args, 1)?;
    Ok(Scalar::Int(numeric("ceil", &args[0])?.ceil() as i64))
}

fn fn_floor(args: &[Scalar]) -> Result<Scalar> {
    expect_arity("floor", args, 1)?;
    Ok(Scalar::Int(numeric("floor", &args[0])?.floor() as i64))
}

fn fn_round(args: &[Scalar]) -> Result<Scalar> {
    expect_arity("round", args, 1)?;
    Ok(Scalar::Int(
        numeric("round", &args[0])?.round_ties_even() as i64
    ))
}

fn fn_abs(args: &[Scalar]) -> Result<Scalar> {
    expect_arity("abs", args, 1)?;
    match &args[0] {
        Scalar::Int(i) => Ok(Scalar::Int(i.abs())),
        Scalar::Float(f) => Ok(Scalar::Float(f.abs())),
        other => Err(Error::Type(format!(
            "abs() expects a numeric argument, got {}",
            other
        ))),
    }
}

fn fn_recip(args: &[Scalar]) -> Result<Scalar> {
    expect_arity("recip", args, 1)?;
    let x = numeric("recip", &args[0])?;
    if x == 0.0 {
        return Err(Error::Type("recip() of zero".to_string()));
    }
    Ok(Scalar::Float(1.0 / x))
}

fn fn_min(args: &[Scalar]) -> Result<Scalar> {
    expect_at_least("min", args, 1)?;
    let mut best = 0;
    for (i, arg) in args.iter().enumerate() {
        if numeric("min", arg)? < numeric("min", &args[best])? {
            best = i;
        }
    }
    Ok(args[best].clone())
}

fn fn_max(args: &[Scalar]) -> Result<Scalar> {
    expect_at_least("max", args, 1)?;
    let mut best = 0;
    for (i, arg) in args.iter().enumerate() {
        if numeric("max", arg)? > numeric("max", &args[best])? {
            best = i;
        }
    }
    Ok(args[best].clone())
}

/// Integer when every argument is an integer, float otherwise
fn fn_sum(args: &[Scalar]) -> Result<Scalar> {
    expect_at_least("sum", args, 1)?;
    if args.iter().all(|a| matches!(a, Scalar::Int(_))) {
        let mut total = 0i64;
        for arg in args {
            if let Scalar::Int(i) = arg {
                total += i;
            }
        }
        return Ok(Scalar::Int(total));
    }
    let mut total = 0.0;
    for arg in args {
        total += numeric("sum", arg)?;
    }
    Ok(Scalar::Float(total))
}

fn fn_avg(args: &[Scalar]) -> Result<Scalar> {
    expect_at_least("avg", args, 1)?;
    let mut total = 0.0;
    for arg in args {
        total += numeric("avg", arg)?;
    }
    Ok(Scalar::Float(total / args.len() as f64))
}

fn fn_bool(args: &[Scalar]) -> Result<Scalar> {
    expect_arity("bool", args, 1)?;
    Ok(Scalar::Bool(args[0].is_truthy()))
}

fn fn_not(args: &[Scalar]) -> Result<Scalar> {
    expect_arity("not", args, 1)?;
    Ok(Scalar::Bool(!args[0].is_truthy()))
}
