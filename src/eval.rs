//! Evaluation of replacement expressions.
//!
//! Values are loosely typed. Arithmetic between numbers (and booleans, which
//! count as 0 and 1) is numeric; `+` on anything else concatenates, and the
//! comparison operators compare display strings. Evaluation never fails:
//! unbound variables read as `""` and calling a non-function yields an
//! absent function.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::{trace, warn};

use crate::expr::{BinaryOp, Builtin, Expr, Lambda, UnaryOp};
use crate::pattern::MatchResult;

/// Nested lambda calls allowed before a call evaluates to an absent function.
const MAX_CALL_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    String(String),
    Number(f64),
    /// `None` is the absent function.
    Function(Option<Function>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Function {
    Builtin(Builtin),
    Lambda(Rc<Lambda>),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::String(s) => !s.is_empty(),
            Value::Number(n) => *n != 0.0,
            Value::Function(f) => f.is_some(),
        }
    }

    /// Numeric reading: booleans are 0/1, strings are parsed (0 if they are
    /// not numbers), functions are 0.
    pub fn as_number(&self) -> f64 {
        match self {
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => s.trim().parse().unwrap_or(0.0),
            Value::Function(_) => 0.0,
        }
    }

    /// The falsy value of the same type.
    fn zero_like(&self) -> Value {
        match self {
            Value::Bool(_) => Value::Bool(false),
            Value::String(_) => Value::String(String::new()),
            Value::Number(_) => Value::Number(0.0),
            Value::Function(_) => Value::Function(None),
        }
    }

    /// Both operands as numbers, if neither is a string or function.
    fn numeric_pair(&self, other: &Value) -> Option<(f64, f64)> {
        match (self, other) {
            (Value::Number(_) | Value::Bool(_), Value::Number(_) | Value::Bool(_)) => {
                Some((self.as_number(), other.as_number()))
            }
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::String(s) => f.write_str(s),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Function(Some(Function::Builtin(builtin))) => write!(f, "{builtin}"),
            Value::Function(Some(Function::Lambda(_))) => f.write_str("func"),
            Value::Function(None) => Ok(()),
        }
    }
}

/// Integral numbers print without a fractional part.
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Variable bindings for one evaluation: program globals below a stack of
/// frames (per-match variables, then one frame per active lambda call).
pub struct Scope<'g> {
    globals: &'g HashMap<String, Value>,
    frames: Vec<HashMap<String, Value>>,
}

impl<'g> Scope<'g> {
    pub fn new(globals: &'g HashMap<String, Value>) -> Self {
        Self {
            globals,
            frames: Vec::new(),
        }
    }

    /// Globals plus the captures and implicit variables of `m`.
    pub fn for_match(globals: &'g HashMap<String, Value>, m: &MatchResult) -> Self {
        let mut frame: HashMap<String, Value> = m
            .captures
            .iter()
            .map(|(name, value)| (name.clone(), Value::from(value.as_str())))
            .collect();
        frame.insert("match".into(), Value::from(m.value.as_str()));
        frame.insert("matchLength".into(), Value::Number(m.length as f64));
        frame.insert("matchNumber".into(), Value::Number(m.match_number as f64));
        frame.insert("fileOffset".into(), Value::Number(m.file_offset as f64));
        frame.insert("lineNumber".into(), Value::Number(m.line_number as f64));
        Self {
            globals,
            frames: vec![frame],
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .or_else(|| self.globals.get(name))
    }
}

/// Evaluate `expr` in `scope`.
pub fn evaluate(expr: &Expr, scope: &mut Scope<'_>) -> Value {
    Evaluator { scope, depth: 0 }.eval(expr)
}

/// Evaluate each part and concatenate their display strings.
pub fn evaluate_replacement(parts: &[Expr], scope: &mut Scope<'_>) -> String {
    parts
        .iter()
        .map(|part| evaluate(part, scope).to_string())
        .collect()
}

struct Evaluator<'s, 'g> {
    scope: &'s mut Scope<'g>,
    depth: usize,
}

impl Evaluator<'_, '_> {
    fn eval(&mut self, expr: &Expr) -> Value {
        match expr {
            Expr::Str(s) => Value::String(s.clone()),
            Expr::Number(n) => Value::Number(*n),
            Expr::Bool(b) => Value::Bool(*b),
            Expr::Var(name) => match self.scope.lookup(name) {
                Some(value) => value.clone(),
                None => {
                    trace!("unbound variable @{name}");
                    Value::String(String::new())
                }
            },
            Expr::Builtin(builtin) => Value::Function(Some(Function::Builtin(*builtin))),
            Expr::Lambda(lambda) => Value::Function(Some(Function::Lambda(Rc::clone(lambda)))),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand);
                match op {
                    UnaryOp::Not => Value::Bool(!value.is_truthy()),
                    UnaryOp::Neg => Value::Number(-value.as_number()),
                }
            }
            Expr::Binary {
                op: BinaryOp::And,
                lhs,
                rhs,
            } => Value::Bool(self.eval(lhs).is_truthy() && self.eval(rhs).is_truthy()),
            Expr::Binary {
                op: BinaryOp::Or,
                lhs,
                rhs,
            } => Value::Bool(self.eval(lhs).is_truthy() || self.eval(rhs).is_truthy()),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs);
                let rhs = self.eval(rhs);
                apply_binary(*op, &lhs, &rhs)
            }
            Expr::Case { arms, otherwise } => {
                for (guard, value) in arms {
                    if self.eval(guard).is_truthy() {
                        return self.eval(value);
                    }
                }
                match otherwise {
                    Some(value) => self.eval(value),
                    None => Value::String(String::new()),
                }
            }
            Expr::Call { callee, args } => {
                let callee = self.eval(callee);
                let args: Vec<Value> = args.iter().map(|arg| self.eval(arg)).collect();
                match callee {
                    Value::Function(Some(function)) => self.call(&function, args),
                    other => {
                        trace!("called a non-function value {other:?}");
                        Value::Function(None)
                    }
                }
            }
        }
    }

    fn call(&mut self, function: &Function, args: Vec<Value>) -> Value {
        match function {
            Function::Builtin(builtin) => call_builtin(*builtin, args),
            Function::Lambda(lambda) => {
                if self.depth >= MAX_CALL_DEPTH {
                    warn!("function call depth {MAX_CALL_DEPTH} exceeded");
                    return Value::Function(None);
                }
                let mut args = args.into_iter();
                let frame = lambda
                    .params
                    .iter()
                    .map(|param| {
                        let value = args.next().unwrap_or_else(|| Value::String(String::new()));
                        (param.clone(), value)
                    })
                    .collect();
                self.scope.frames.push(frame);
                self.depth += 1;
                let result = self.eval(&lambda.body);
                self.depth -= 1;
                self.scope.frames.pop();
                result
            }
        }
    }
}

fn call_builtin(builtin: Builtin, args: Vec<Value>) -> Value {
    let arg = args
        .into_iter()
        .next()
        .unwrap_or_else(|| Value::String(String::new()));
    match builtin {
        Builtin::Upper => Value::String(arg.to_string().to_uppercase()),
        Builtin::Lower => Value::String(arg.to_string().to_lowercase()),
        Builtin::Length => Value::Number(arg.to_string().len() as f64),
        Builtin::Trim => Value::String(arg.to_string().trim().to_string()),
        Builtin::Number => Value::Number(arg.as_number()),
        Builtin::String => Value::String(arg.to_string()),
    }
}

fn apply_binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Value {
    let numeric = lhs.numeric_pair(rhs);
    match op {
        BinaryOp::Add => match numeric {
            Some((a, b)) => Value::Number(a + b),
            None => Value::String(format!("{lhs}{rhs}")),
        },
        BinaryOp::Sub => Value::Number(lhs.as_number() - rhs.as_number()),
        BinaryOp::Mul => Value::Number(lhs.as_number() * rhs.as_number()),
        BinaryOp::Div | BinaryOp::Mod => {
            if !rhs.is_truthy() {
                return rhs.zero_like();
            }
            let (a, b) = (lhs.as_number(), rhs.as_number());
            if b == 0.0 {
                return Value::Number(0.0);
            }
            if op == BinaryOp::Div {
                Value::Number(a / b)
            } else {
                Value::Number(a % b)
            }
        }
        BinaryOp::Eq
        | BinaryOp::NotEq
        | BinaryOp::Lt
        | BinaryOp::Gt
        | BinaryOp::LtEq
        | BinaryOp::GtEq => {
            let ordering = match numeric {
                Some((a, b)) => a.partial_cmp(&b),
                None => Some(lhs.to_string().cmp(&rhs.to_string())),
            };
            Value::Bool(compare(op, ordering))
        }
        BinaryOp::And => Value::Bool(lhs.is_truthy() && rhs.is_truthy()),
        BinaryOp::Or => Value::Bool(lhs.is_truthy() || rhs.is_truthy()),
    }
}

/// Apply comparison `op` to an ordering; `None` (NaN) only satisfies `!=`.
fn compare(op: BinaryOp, ordering: Option<Ordering>) -> bool {
    let Some(ordering) = ordering else {
        return op == BinaryOp::NotEq;
    };
    match op {
        BinaryOp::Eq => ordering == Ordering::Equal,
        BinaryOp::NotEq => ordering != Ordering::Equal,
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::Gt => ordering == Ordering::Greater,
        BinaryOp::LtEq => ordering != Ordering::Greater,
        BinaryOp::GtEq => ordering != Ordering::Less,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse_expr;
    use crate::lexer::{Tokens, tokenize};
    use std::collections::BTreeMap;

    fn eval_with(src: &str, globals: &HashMap<String, Value>) -> Value {
        let mut tokens = Tokens::new(tokenize(src).unwrap());
        let expr = parse_expr(&mut tokens).unwrap();
        evaluate(&expr, &mut Scope::new(globals))
    }

    fn eval(src: &str) -> Value {
        eval_with(src, &HashMap::new())
    }

    fn eval_str(src: &str) -> String {
        eval(src).to_string()
    }

    // --- Arithmetic and coercion ---

    #[test]
    fn test_number_arithmetic() {
        assert_eq!(eval("1 + 2 * 3"), Value::Number(7.0));
        assert_eq!(eval("7 % 4"), Value::Number(3.0));
        assert_eq!(eval("7 / 2"), Value::Number(3.5));
        assert_eq!(eval("-(2 - 5)"), Value::Number(3.0));
    }

    #[test]
    fn test_bools_count_as_numbers() {
        assert_eq!(eval("true + 1"), Value::Number(2.0));
        assert_eq!(eval("true + true"), Value::Number(2.0));
        assert_eq!(eval("false * 5"), Value::Number(0.0));
    }

    #[test]
    fn test_plus_concatenates_strings() {
        assert_eq!(eval_str("'a' + 1"), "a1");
        assert_eq!(eval_str("1 + 'a'"), "1a");
        assert_eq!(eval_str("'x' + true"), "xtrue");
        assert_eq!(eval_str("'1' + '2'"), "12");
    }

    #[test]
    fn test_minus_parses_strings() {
        assert_eq!(eval("'10' - 3"), Value::Number(7.0));
        assert_eq!(eval("'abc' * 2"), Value::Number(0.0));
    }

    #[test]
    fn test_division_by_falsy_values() {
        assert_eq!(eval("5 / 0"), Value::Number(0.0));
        assert_eq!(eval("5 % 0"), Value::Number(0.0));
        assert_eq!(eval("5 / false"), Value::Bool(false));
        assert_eq!(eval("5 / ''"), Value::String(String::new()));
    }

    #[test]
    fn test_number_display() {
        assert_eq!(eval_str("2 + 2"), "4");
        assert_eq!(eval_str("1 / 4"), "0.25");
        assert_eq!(eval_str("0 - 3"), "-3");
    }

    // --- Comparison and logic ---

    #[test]
    fn test_numeric_comparison() {
        assert_eq!(eval("10 > 9"), Value::Bool(true));
        assert_eq!(eval("2 == 2.0"), Value::Bool(true));
        assert_eq!(eval("true == 1"), Value::Bool(true));
    }

    #[test]
    fn test_string_comparison() {
        assert_eq!(eval("'10' > '9'"), Value::Bool(false));
        assert_eq!(eval("'abc' == 'abc'"), Value::Bool(true));
        assert_eq!(eval("'3' == 3"), Value::Bool(true));
        assert_eq!(eval("'a' != 'b'"), Value::Bool(true));
    }

    #[test]
    fn test_logic_returns_bools() {
        assert_eq!(eval("'x' and 1"), Value::Bool(true));
        assert_eq!(eval("'' or 0"), Value::Bool(false));
        assert_eq!(eval("not ''"), Value::Bool(true));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Function(None).is_truthy());
        assert!(Value::from("0").is_truthy());
        assert!(Value::Function(Some(Function::Builtin(Builtin::Trim))).is_truthy());
    }

    // --- Case ---

    #[test]
    fn test_case_first_truthy_guard_wins() {
        assert_eq!(
            eval_str("case when 0 then 'a' when 1 then 'b' when 1 then 'c' end"),
            "b"
        );
        assert_eq!(eval_str("case when '' then 'a' otherwise 'z' end"), "z");
        assert_eq!(eval_str("case when false then 'a' end"), "");
    }

    // --- Variables and functions ---

    #[test]
    fn test_unbound_variable_is_empty() {
        assert_eq!(eval("@nothing"), Value::String(String::new()));
    }

    #[test]
    fn test_globals_are_visible() {
        let mut globals = HashMap::new();
        globals.insert("n".to_string(), Value::Number(4.0));
        assert_eq!(eval_with("@n * 2", &globals), Value::Number(8.0));
    }

    #[test]
    fn test_builtins() {
        assert_eq!(eval_str("upper('abc')"), "ABC");
        assert_eq!(eval_str("lower('AbC')"), "abc");
        assert_eq!(eval("length('four')"), Value::Number(4.0));
        assert_eq!(eval_str("trim('  x ')"), "x");
        assert_eq!(eval("number('12') + 1"), Value::Number(13.0));
        assert_eq!(eval_str("string(1) + 1"), "11");
    }

    #[test]
    fn test_lambda_call() {
        assert_eq!(eval("(func(@a, @b) @a * @b)(3, 4)"), Value::Number(12.0));
        assert_eq!(eval_str("(func(@a, @b) @a + @b)('x')"), "x");
    }

    #[test]
    fn test_lambda_from_global() {
        let mut globals = HashMap::new();
        globals.insert("double".to_string(), eval("func(@x) @x * 2"));
        assert_eq!(eval_with("@double(21)", &globals), Value::Number(42.0));
    }

    #[test]
    fn test_runaway_recursion_stops() {
        let mut globals = HashMap::new();
        globals.insert("loop".to_string(), eval("func(@x) @loop(@x)"));
        assert_eq!(eval_with("@loop(1)", &globals), Value::Function(None));
    }

    #[test]
    fn test_calling_a_non_function() {
        assert_eq!(eval("'abc'(1)"), Value::Function(None));
        assert_eq!(eval_str("'abc'(1)"), "");
    }

    #[test]
    fn test_match_scope() {
        let mut captures = BTreeMap::new();
        captures.insert("word".to_string(), "success".to_string());
        let m = MatchResult {
            file_offset: 17,
            length: 7,
            value: "success".into(),
            captures,
            line_number: 1,
            match_number: 2,
            replacement: None,
        };
        let globals = HashMap::new();
        let mut scope = Scope::for_match(&globals, &m);
        let mut tokens = Tokens::new(tokenize("upper(@word) ':' @fileOffset ':' @matchNumber").unwrap());
        let parts = crate::expr::parse_replacement(&mut tokens).unwrap();
        assert_eq!(evaluate_replacement(&parts, &mut scope), "SUCCESS:17:2");
    }
}
