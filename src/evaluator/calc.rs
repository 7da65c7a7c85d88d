//! RS-011: `calc`, the built-in scalar/series script language.
//!
//! Values are scalars or series. Arithmetic, comparison and logic apply
//! element-wise; a scalar operand broadcasts against a series. Every
//! statement and loop iteration costs one step against the budget.

use super::syntax::{self, AssignOp, BinOp, Expr, Stmt, UnaryOp, KEYWORDS};
use super::{EvalError, EvalLimits, Evaluator};
use crate::core::types::Value;
use indexmap::IndexMap;
use std::time::Instant;

pub const BACKEND_NAME: &str = "calc";

/// Built-in functions.
pub const BUILTINS: &[&str] = &[
    "zeros", "fill", "len", "sum", "mean", "min", "max", "abs", "sqrt", "ln", "exp", "pow",
    "round", "lag",
];

// Timeout is checked once per this many steps.
const CLOCK_INTERVAL: u64 = 1024;

/// Longest series `zeros` / `fill` will build.
pub const MAX_SERIES_LEN: usize = 1 << 24;

/// Tree-walking interpreter for `calc` scripts.
pub struct CalcEvaluator {
    limits: EvalLimits,
    reserved: Vec<&'static str>,
    env: IndexMap<String, Value>,
}

impl CalcEvaluator {
    pub fn new(limits: EvalLimits) -> Self {
        Self {
            limits,
            reserved: KEYWORDS.iter().chain(BUILTINS).copied().collect(),
            env: IndexMap::new(),
        }
    }
}

impl Evaluator for CalcEvaluator {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn reserved_words(&self) -> &[&'static str] {
        &self.reserved
    }

    fn eval(&mut self, source: &str, bindings: &IndexMap<String, Value>) -> Result<(), EvalError> {
        self.env = bindings.clone();
        let program = syntax::parse_program(source)?;
        let mut machine = Machine {
            env: &mut self.env,
            limits: &self.limits,
            steps: 0,
            started: Instant::now(),
        };
        machine.block(&program)
    }

    fn read_variable(&self, name: &str) -> Option<Value> {
        self.env.get(name).cloned()
    }
}

// ============================================================================
// Interpreter
// ============================================================================

struct Machine<'a> {
    env: &'a mut IndexMap<String, Value>,
    limits: &'a EvalLimits,
    steps: u64,
    started: Instant,
}

fn runtime(line: usize, message: impl Into<String>) -> EvalError {
    EvalError::Runtime {
        line,
        message: message.into(),
    }
}

impl Machine<'_> {
    fn tick(&mut self, line: usize) -> Result<(), EvalError> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(EvalError::Cancelled(format!(
                "step budget of {} exhausted at line {}",
                self.limits.max_steps, line
            )));
        }
        if let Some(timeout) = self.limits.timeout {
            if self.steps % CLOCK_INTERVAL == 0 && self.started.elapsed() > timeout {
                return Err(EvalError::Cancelled(format!(
                    "timed out after {} ms at line {}",
                    timeout.as_millis(),
                    line
                )));
            }
        }
        Ok(())
    }

    fn block(&mut self, stmts: &[Stmt]) -> Result<(), EvalError> {
        for stmt in stmts {
            self.tick(stmt.line())?;
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), EvalError> {
        match stmt {
            Stmt::Assign {
                name,
                index,
                op,
                value,
                line,
            } => {
                let rhs = self.expr(value, *line)?;
                match index {
                    None => self.assign(name, *op, rhs, *line),
                    Some(idx) => {
                        let i = self.index_of(idx, *line)?;
                        self.assign_element(name, i, *op, rhs, *line)
                    }
                }
            }
            Stmt::If {
                cond,
                then,
                otherwise,
                line,
            } => {
                if self.truthy(cond, *line)? {
                    self.block(then)
                } else {
                    self.block(otherwise)
                }
            }
            Stmt::While { cond, body, line } => {
                while self.truthy(cond, *line)? {
                    self.block(body)?;
                    self.tick(*line)?;
                }
                Ok(())
            }
            Stmt::For {
                var,
                start,
                end,
                body,
                line,
            } => {
                let start = self.integer(start, *line, "range start")?;
                let end = self.integer(end, *line, "range end")?;
                for k in start..end {
                    self.tick(*line)?;
                    self.env.insert(var.clone(), Value::Scalar(k as f64));
                    self.block(body)?;
                }
                Ok(())
            }
        }
    }

    fn assign(&mut self, name: &str, op: AssignOp, rhs: Value, line: usize) -> Result<(), EvalError> {
        let value = match op {
            AssignOp::Set => rhs,
            AssignOp::Apply(bin) => {
                let current = self
                    .env
                    .get(name)
                    .ok_or_else(|| runtime(line, format!("undefined variable '{}'", name)))?;
                binary(bin, current, &rhs).map_err(|m| runtime(line, m))?
            }
        };
        self.env.insert(name.to_string(), value);
        Ok(())
    }

    fn assign_element(
        &mut self,
        name: &str,
        index: usize,
        op: AssignOp,
        rhs: Value,
        line: usize,
    ) -> Result<(), EvalError> {
        let Value::Scalar(x) = rhs else {
            return Err(runtime(line, format!("cannot store a series into '{}[{}]'", name, index)));
        };
        let slot = match self.env.get_mut(name) {
            Some(Value::Series(v)) => {
                let len = v.len();
                v.get_mut(index).ok_or_else(|| {
                    runtime(line, format!("index {} out of bounds for '{}' of length {}", index, name, len))
                })?
            }
            Some(Value::Scalar(_)) => {
                return Err(runtime(line, format!("'{}' is a scalar and cannot be indexed", name)))
            }
            None => return Err(runtime(line, format!("undefined variable '{}'", name))),
        };
        *slot = match op {
            AssignOp::Set => x,
            AssignOp::Apply(bin) => scalar_op(bin, *slot, x),
        };
        Ok(())
    }

    fn truthy(&mut self, cond: &Expr, line: usize) -> Result<bool, EvalError> {
        match self.expr(cond, line)? {
            Value::Scalar(x) => Ok(x != 0.0),
            Value::Series(_) => Err(runtime(line, "condition must be a scalar")),
        }
    }

    fn integer(&mut self, expr: &Expr, line: usize, what: &str) -> Result<i64, EvalError> {
        match self.expr(expr, line)? {
            Value::Scalar(x) if x.is_finite() && x.fract() == 0.0 => Ok(x as i64),
            Value::Scalar(x) => Err(runtime(line, format!("{} must be an integer, got {:?}", what, x))),
            Value::Series(_) => Err(runtime(line, format!("{} must be a scalar", what))),
        }
    }

    fn index_of(&mut self, expr: &Expr, line: usize) -> Result<usize, EvalError> {
        let i = self.integer(expr, line, "index")?;
        usize::try_from(i).map_err(|_| runtime(line, format!("negative index {}", i)))
    }

    fn expr(&mut self, expr: &Expr, line: usize) -> Result<Value, EvalError> {
        match expr {
            Expr::Number(n) => Ok(Value::Scalar(*n)),
            Expr::Var(name) => self
                .env
                .get(name)
                .cloned()
                .ok_or_else(|| runtime(line, format!("undefined variable '{}'", name))),
            Expr::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match self.expr(item, line)? {
                        Value::Scalar(x) => out.push(x),
                        Value::Series(_) => {
                            return Err(runtime(line, "series literal elements must be scalars"))
                        }
                    }
                }
                Ok(Value::Series(out))
            }
            Expr::Index(base, idx) => {
                let base = self.expr(base, line)?;
                let i = self.index_of(idx, line)?;
                match base {
                    Value::Series(v) => v.get(i).map(|x| Value::Scalar(*x)).ok_or_else(|| {
                        runtime(line, format!("index {} out of bounds for length {}", i, v.len()))
                    }),
                    Value::Scalar(_) => Err(runtime(line, "cannot index a scalar")),
                }
            }
            Expr::Unary(op, inner) => {
                let v = self.expr(inner, line)?;
                Ok(map(&v, |x| match op {
                    UnaryOp::Neg => -x,
                    UnaryOp::Not => bool_num(x == 0.0),
                }))
            }
            Expr::Binary(op @ (BinOp::And | BinOp::Or), lhs, rhs) => {
                let l = self.expr(lhs, line)?;
                if let Value::Scalar(x) = l {
                    match (op, x != 0.0) {
                        (BinOp::And, false) => return Ok(Value::Scalar(0.0)),
                        (BinOp::Or, true) => return Ok(Value::Scalar(1.0)),
                        _ => {}
                    }
                }
                let r = self.expr(rhs, line)?;
                binary(*op, &l, &r).map_err(|m| runtime(line, m))
            }
            Expr::Binary(op, lhs, rhs) => {
                let l = self.expr(lhs, line)?;
                let r = self.expr(rhs, line)?;
                binary(*op, &l, &r).map_err(|m| runtime(line, m))
            }
            Expr::Call(name, args) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.expr(arg, line)?);
                }
                call(name, &values).map_err(|m| runtime(line, format!("{}(): {}", name, m)))
            }
        }
    }
}

// ============================================================================
// Element-wise operations
// ============================================================================

fn bool_num(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn scalar_op(op: BinOp, a: f64, b: f64) -> f64 {
    match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::Rem => a % b,
        BinOp::Eq => bool_num(a == b),
        BinOp::Ne => bool_num(a != b),
        BinOp::Lt => bool_num(a < b),
        BinOp::Le => bool_num(a <= b),
        BinOp::Gt => bool_num(a > b),
        BinOp::Ge => bool_num(a >= b),
        BinOp::And => bool_num(a != 0.0 && b != 0.0),
        BinOp::Or => bool_num(a != 0.0 || b != 0.0),
    }
}

fn map(v: &Value, f: impl Fn(f64) -> f64) -> Value {
    match v {
        Value::Scalar(x) => Value::Scalar(f(*x)),
        Value::Series(xs) => Value::Series(xs.iter().map(|x| f(*x)).collect()),
    }
}

/// Combine two values, broadcasting scalars over series.
fn zip_with(a: &Value, b: &Value, f: impl Fn(f64, f64) -> f64) -> Result<Value, String> {
    match (a, b) {
        (Value::Scalar(x), Value::Scalar(y)) => Ok(Value::Scalar(f(*x, *y))),
        (Value::Series(xs), Value::Scalar(y)) => Ok(Value::Series(xs.iter().map(|x| f(*x, *y)).collect())),
        (Value::Scalar(x), Value::Series(ys)) => Ok(Value::Series(ys.iter().map(|y| f(*x, *y)).collect())),
        (Value::Series(xs), Value::Series(ys)) => {
            if xs.len() != ys.len() {
                return Err(format!("series length mismatch: {} vs {}", xs.len(), ys.len()));
            }
            Ok(Value::Series(xs.iter().zip(ys).map(|(x, y)| f(*x, *y)).collect()))
        }
    }
}

fn binary(op: BinOp, a: &Value, b: &Value) -> Result<Value, String> {
    zip_with(a, b, |x, y| scalar_op(op, x, y))
}

// ============================================================================
// Built-in functions
// ============================================================================

fn arity(args: &[Value], n: usize) -> Result<(), String> {
    if args.len() == n {
        Ok(())
    } else {
        Err(format!("expected {} argument(s), got {}", n, args.len()))
    }
}

fn count(v: &Value) -> Result<usize, String> {
    match v {
        Value::Scalar(x) if x.is_finite() && x.fract() == 0.0 && *x >= 0.0 => {
            if *x > MAX_SERIES_LEN as f64 {
                return Err(format!(
                    "length {:?} exceeds the series limit of {}",
                    x, MAX_SERIES_LEN
                ));
            }
            Ok(*x as usize)
        }
        Value::Scalar(x) => Err(format!("expected a non-negative integer, got {:?}", x)),
        Value::Series(_) => Err("expected a scalar count".to_string()),
    }
}

/// A series of `n` copies of `fill`, failing instead of aborting when memory runs out.
fn filled(n: usize, fill: f64) -> Result<Value, String> {
    let mut xs = Vec::new();
    xs.try_reserve_exact(n)
        .map_err(|e| format!("cannot allocate a series of length {}: {}", n, e))?;
    xs.resize(n, fill);
    Ok(Value::Series(xs))
}

fn scalar(v: &Value) -> Result<f64, String> {
    match v {
        Value::Scalar(x) => Ok(*x),
        Value::Series(_) => Err("expected a scalar".to_string()),
    }
}

fn call(name: &str, args: &[Value]) -> Result<Value, String> {
    match name {
        "zeros" => {
            arity(args, 1)?;
            filled(count(&args[0])?, 0.0)
        }
        "fill" => {
            arity(args, 2)?;
            filled(count(&args[0])?, scalar(&args[1])?)
        }
        "len" => {
            arity(args, 1)?;
            Ok(Value::Scalar(args[0].to_vec().len() as f64))
        }
        "sum" => {
            arity(args, 1)?;
            Ok(Value::Scalar(args[0].to_vec().iter().sum()))
        }
        "mean" => {
            arity(args, 1)?;
            let xs = args[0].to_vec();
            if xs.is_empty() {
                return Err("mean of an empty series".to_string());
            }
            Ok(Value::Scalar(xs.iter().sum::<f64>() / xs.len() as f64))
        }
        "min" | "max" => {
            let pick: fn(f64, f64) -> f64 = if name == "min" { f64::min } else { f64::max };
            match args {
                [] => Err("expected at least 1 argument".to_string()),
                [single] => single
                    .to_vec()
                    .into_iter()
                    .reduce(pick)
                    .map(Value::Scalar)
                    .ok_or_else(|| format!("{} of an empty series", name)),
                [first, rest @ ..] => rest
                    .iter()
                    .try_fold(first.clone(), |acc, v| zip_with(&acc, v, pick)),
            }
        }
        "abs" | "sqrt" | "ln" | "exp" | "round" => {
            arity(args, 1)?;
            let f: fn(f64) -> f64 = match name {
                "abs" => f64::abs,
                "sqrt" => f64::sqrt,
                "ln" => f64::ln,
                "exp" => f64::exp,
                _ => f64::round,
            };
            Ok(map(&args[0], f))
        }
        "pow" => {
            arity(args, 2)?;
            zip_with(&args[0], &args[1], f64::powf)
        }
        "lag" => {
            let k = match args.len() {
                1 => 1,
                2 => count(&args[1])?,
                n => return Err(format!("expected 1 or 2 arguments, got {}", n)),
            };
            match &args[0] {
                Value::Series(xs) => Ok(Value::Series(
                    (0..xs.len()).map(|t| xs[t.saturating_sub(k)]).collect(),
                )),
                Value::Scalar(_) => Err("expected a series".to_string()),
            }
        }
        _ => Err("unknown function".to_string()),
    }
}
