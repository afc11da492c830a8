//! Restricted arithmetic evaluator backing the `calculator` tool.
//!
//! Expressions are tokenized and evaluated by a small recursive-descent parser.
//! Only numeric literals, list/tuple literals, arithmetic operators and a fixed
//! set of functions (`abs`, `round`, `min`, `max`, `pow`, `sum`, `len`) are in
//! scope, so there is no way to reach anything outside the evaluator.

use std::fmt;

use rmcp::ErrorData as McpError;
use serde_json::json;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Maximum expression length in characters.
pub const MAX_EXPRESSION_LENGTH: usize = 1_024;

/// Maximum nesting depth of parentheses, brackets and unary operators.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Functions callable from an expression.
pub const FUNCTIONS: &[&str] = &["abs", "round", "min", "max", "pow", "sum", "len"];

/// `round(x, n)` on a float is a no-op above this many digits and zero below its negation.
const MAX_FLOAT_DIGITS: i64 = 308;

//--------------------------------------------------------------------------------------------------
// Types: Error
//--------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalculatorError {
    #[error("Expression is empty")]
    Empty,

    #[error("Expression exceeds maximum length ({MAX_EXPRESSION_LENGTH} characters)")]
    TooLong,

    #[error("Unexpected character '{ch}' at position {pos}")]
    UnexpectedCharacter { ch: char, pos: usize },

    #[error("Invalid number literal: {0}")]
    InvalidNumber(String),

    #[error("Unexpected token '{0}'")]
    UnexpectedToken(String),

    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    #[error("Name '{0}' is not defined")]
    UnknownName(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Numeric overflow")]
    Overflow,

    #[error("Expression nesting exceeds maximum depth ({MAX_NESTING_DEPTH})")]
    TooDeep,
}

impl CalculatorError {
    /// Get the error code for this error variant.
    pub fn code(&self) -> &'static str {
        match self {
            CalculatorError::Empty => "EMPTY_EXPRESSION",
            CalculatorError::TooLong => "EXPRESSION_TOO_LONG",
            CalculatorError::UnexpectedCharacter { .. } => "UNEXPECTED_CHARACTER",
            CalculatorError::InvalidNumber(_) => "INVALID_NUMBER",
            CalculatorError::UnexpectedToken(_) => "UNEXPECTED_TOKEN",
            CalculatorError::UnexpectedEnd => "UNEXPECTED_END",
            CalculatorError::UnknownName(_) => "UNKNOWN_NAME",
            CalculatorError::InvalidArgument(_) => "INVALID_ARGUMENT",
            CalculatorError::DivisionByZero => "DIVISION_BY_ZERO",
            CalculatorError::Overflow => "OVERFLOW",
            CalculatorError::TooDeep => "TOO_DEEP",
        }
    }

    /// Convert to MCP error with structured data.
    pub fn to_mcp_error(&self) -> McpError {
        McpError::invalid_params(self.to_string(), Some(json!({ "code": self.code() })))
    }
}

type Result<T> = std::result::Result<T, CalculatorError>;

//--------------------------------------------------------------------------------------------------
// Types: Value
//--------------------------------------------------------------------------------------------------

/// Result of evaluating an expression or sub-expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    List(Vec<Value>),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::List(_) => "list",
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::List(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => f.write_str(&format_float(*x)),
            Value::List(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Render a float the way scripting-language REPLs do: the shortest round-trip digits,
/// integral values keep a `.0`, and exponents below -4 or from 16 up use `e±XX`.
fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return (if x > 0.0 { "inf" } else { "-inf" }).to_string();
    }

    let scientific = format!("{x:e}");
    let Some((mantissa, exp)) = scientific.split_once('e') else {
        return scientific;
    };
    let exp: i32 = exp.parse().unwrap_or(0);

    if (-4..16).contains(&exp) {
        let plain = format!("{x}");
        if plain.contains('.') {
            plain
        } else {
            format!("{plain}.0")
        }
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exp.unsigned_abs())
    }
}

//--------------------------------------------------------------------------------------------------
// Types: Tokens
//--------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Value),
    Ident(String),
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(v) => write!(f, "{v}"),
            Token::Ident(name) => f.write_str(name),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::DoubleStar => f.write_str("**"),
            Token::Slash => f.write_str("/"),
            Token::DoubleSlash => f.write_str("//"),
            Token::Percent => f.write_str("%"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::LBracket => f.write_str("["),
            Token::RBracket => f.write_str("]"),
            Token::Comma => f.write_str(","),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinOp {
    fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Public
//--------------------------------------------------------------------------------------------------

/// Evaluate an arithmetic expression.
pub fn evaluate(expression: &str) -> Result<Value> {
    if expression.trim().is_empty() {
        return Err(CalculatorError::Empty);
    }
    if expression.chars().count() > MAX_EXPRESSION_LENGTH {
        return Err(CalculatorError::TooLong);
    }

    let tokens = tokenize(expression)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };

    let value = parser.expr()?;
    if let Some(token) = parser.peek() {
        return Err(CalculatorError::UnexpectedToken(token.to_string()));
    }

    Ok(value)
}

//--------------------------------------------------------------------------------------------------
// Functions: Tokenizer
//--------------------------------------------------------------------------------------------------

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) {
            let (token, next) = lex_number(&chars, i)?;
            tokens.push(token);
            i = next;
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
            continue;
        }

        let next = chars.get(i + 1).copied();
        let (token, width) = match (c, next) {
            ('*', Some('*')) => (Token::DoubleStar, 2),
            ('/', Some('/')) => (Token::DoubleSlash, 2),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            (',', _) => (Token::Comma, 1),
            _ => return Err(CalculatorError::UnexpectedCharacter { ch: c, pos: i }),
        };
        tokens.push(token);
        i += width;
    }

    Ok(tokens)
}

fn lex_number(chars: &[char], start: usize) -> Result<(Token, usize)> {
    let mut i = start;
    let mut is_float = false;

    let digits = |i: &mut usize| {
        while *i < chars.len() && (chars[*i].is_ascii_digit() || chars[*i] == '_') {
            *i += 1;
        }
    };

    digits(&mut i);
    if i < chars.len() && chars[i] == '.' {
        is_float = true;
        i += 1;
        digits(&mut i);
    }
    if i < chars.len() && matches!(chars[i], 'e' | 'E') {
        let mut j = i + 1;
        if j < chars.len() && matches!(chars[j], '+' | '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].is_ascii_digit() {
            is_float = true;
            i = j;
            digits(&mut i);
        }
    }

    let literal: String = chars[start..i].iter().filter(|c| **c != '_').collect();
    let value = if is_float {
        literal
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| CalculatorError::InvalidNumber(literal.clone()))?
    } else {
        // Only overflow can make an all-digit literal fail to parse.
        literal
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| CalculatorError::Overflow)?
    };

    Ok((Token::Number(value), i))
}

//--------------------------------------------------------------------------------------------------
// Functions: Parser
//--------------------------------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        match self.next() {
            Some(ref token) if token == expected => Ok(()),
            Some(token) => Err(CalculatorError::UnexpectedToken(token.to_string())),
            None => Err(CalculatorError::UnexpectedEnd),
        }
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(CalculatorError::TooDeep);
        }
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<Value> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = binary(op, lhs, rhs)?;
        }
    }

    /// term := unary (('*' | '/' | '//' | '%') unary)*
    fn term(&mut self) -> Result<Value> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::DoubleSlash) => BinOp::FloorDiv,
                Some(Token::Percent) => BinOp::Mod,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs)?;
        }
    }

    /// unary := ('+' | '-') unary | power
    fn unary(&mut self) -> Result<Value> {
        if self.eat(&Token::Minus) {
            let value = self.nested(Self::unary)?;
            return negate(value);
        }
        if self.eat(&Token::Plus) {
            let value = self.nested(Self::unary)?;
            return match value {
                Value::List(_) => Err(bad_operand_unary("+", &value)),
                number => Ok(number),
            };
        }
        self.power()
    }

    /// power := primary ('**' unary)?
    fn power(&mut self) -> Result<Value> {
        let base = self.primary()?;
        if self.eat(&Token::DoubleStar) {
            let exponent = self.nested(Self::unary)?;
            return binary(BinOp::Pow, base, exponent);
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Value> {
        match self.next() {
            Some(Token::Number(value)) => Ok(value),
            Some(Token::Ident(name)) => {
                if !self.eat(&Token::LParen) {
                    return Err(if FUNCTIONS.contains(&name.as_str()) {
                        CalculatorError::InvalidArgument(format!("function '{name}' must be called"))
                    } else {
                        CalculatorError::UnknownName(name)
                    });
                }
                let args = self.nested(|p| p.items(&Token::RParen))?;
                call(&name, args)
            }
            Some(Token::LParen) => self.nested(|p| {
                if p.eat(&Token::RParen) {
                    return Ok(Value::List(Vec::new()));
                }
                let first = p.expr()?;
                if p.eat(&Token::RParen) {
                    return Ok(first);
                }
                p.expect(&Token::Comma)?;
                let mut items = vec![first];
                items.extend(p.items(&Token::RParen)?);
                Ok(Value::List(items))
            }),
            Some(Token::LBracket) => self.nested(|p| p.items(&Token::RBracket).map(Value::List)),
            Some(token) => Err(CalculatorError::UnexpectedToken(token.to_string())),
            None => Err(CalculatorError::UnexpectedEnd),
        }
    }

    /// Comma-separated expressions up to and including `close`. A trailing comma is allowed.
    fn items(&mut self, close: &Token) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        loop {
            if self.eat(close) {
                return Ok(items);
            }
            items.push(self.expr()?);
            if !self.eat(&Token::Comma) {
                self.expect(close)?;
                return Ok(items);
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Arithmetic
//--------------------------------------------------------------------------------------------------

fn bad_operands(op: BinOp, lhs: &Value, rhs: &Value) -> CalculatorError {
    CalculatorError::InvalidArgument(format!(
        "unsupported operand types for {}: '{}' and '{}'",
        op.symbol(),
        lhs.type_name(),
        rhs.type_name()
    ))
}

fn bad_operand_unary(op: &str, value: &Value) -> CalculatorError {
    CalculatorError::InvalidArgument(format!(
        "bad operand type for unary {op}: '{}'",
        value.type_name()
    ))
}

fn negate(value: Value) -> Result<Value> {
    match value {
        Value::Int(i) => i.checked_neg().map(Value::Int).ok_or(CalculatorError::Overflow),
        Value::Float(f) => Ok(Value::Float(-f)),
        Value::List(_) => Err(bad_operand_unary("-", &value)),
    }
}

fn binary(op: BinOp, lhs: Value, rhs: Value) -> Result<Value> {
    match (&lhs, &rhs) {
        (Value::Int(l), Value::Int(r)) => int_binary(op, *l, *r),
        (Value::List(l), Value::List(r)) if matches!(op, BinOp::Add) => {
            let mut items = l.clone();
            items.extend(r.iter().cloned());
            Ok(Value::List(items))
        }
        (Value::List(_), _) | (_, Value::List(_)) => Err(bad_operands(op, &lhs, &rhs)),
        _ => {
            let (l, r) = match (lhs.as_f64(), rhs.as_f64()) {
                (Some(l), Some(r)) => (l, r),
                _ => return Err(bad_operands(op, &lhs, &rhs)),
            };
            float_binary(op, l, r)
        }
    }
}

fn int_binary(op: BinOp, l: i64, r: i64) -> Result<Value> {
    let overflow = || CalculatorError::Overflow;
    match op {
        BinOp::Add => l.checked_add(r).map(Value::Int).ok_or_else(overflow),
        BinOp::Sub => l.checked_sub(r).map(Value::Int).ok_or_else(overflow),
        BinOp::Mul => l.checked_mul(r).map(Value::Int).ok_or_else(overflow),
        BinOp::Div => {
            if r == 0 {
                return Err(CalculatorError::DivisionByZero);
            }
            Ok(Value::Float(l as f64 / r as f64))
        }
        BinOp::FloorDiv => {
            if r == 0 {
                return Err(CalculatorError::DivisionByZero);
            }
            let q = l.checked_div(r).ok_or_else(overflow)?;
            let adjust = l % r != 0 && ((l < 0) != (r < 0));
            Ok(Value::Int(if adjust { q - 1 } else { q }))
        }
        BinOp::Mod => {
            if r == 0 {
                return Err(CalculatorError::DivisionByZero);
            }
            Ok(Value::Int(floor_mod(l, r)))
        }
        BinOp::Pow => {
            if r >= 0 {
                let exp = u32::try_from(r).map_err(|_| CalculatorError::Overflow)?;
                l.checked_pow(exp).map(Value::Int).ok_or_else(overflow)
            } else if l == 0 {
                Err(CalculatorError::DivisionByZero)
            } else {
                Ok(Value::Float((l as f64).powf(r as f64)))
            }
        }
    }
}

fn float_binary(op: BinOp, l: f64, r: f64) -> Result<Value> {
    let value = match op {
        BinOp::Add => l + r,
        BinOp::Sub => l - r,
        BinOp::Mul => l * r,
        BinOp::Div => {
            if r == 0.0 {
                return Err(CalculatorError::DivisionByZero);
            }
            l / r
        }
        BinOp::FloorDiv => {
            if r == 0.0 {
                return Err(CalculatorError::DivisionByZero);
            }
            (l / r).floor()
        }
        BinOp::Mod => {
            if r == 0.0 {
                return Err(CalculatorError::DivisionByZero);
            }
            let m = l % r;
            if m != 0.0 && ((m < 0.0) != (r < 0.0)) { m + r } else { m }
        }
        BinOp::Pow => {
            if l == 0.0 && r < 0.0 {
                return Err(CalculatorError::DivisionByZero);
            }
            if l < 0.0 && r.fract() != 0.0 {
                return Err(CalculatorError::InvalidArgument(
                    "negative number cannot be raised to a fractional power".to_string(),
                ));
            }
            let value = l.powf(r);
            if value.is_infinite() && l.is_finite() && r.is_finite() {
                return Err(CalculatorError::Overflow);
            }
            value
        }
    };
    Ok(Value::Float(value))
}

/// Remainder with the sign of the divisor.
fn floor_mod(l: i64, r: i64) -> i64 {
    // i64::MIN % -1 overflows in Rust; the mathematical answer is 0.
    if r == -1 {
        return 0;
    }
    let m = l % r;
    if m != 0 && ((m < 0) != (r < 0)) { m + r } else { m }
}

//--------------------------------------------------------------------------------------------------
// Functions: Builtins
//--------------------------------------------------------------------------------------------------

fn call(name: &str, args: Vec<Value>) -> Result<Value> {
    match name {
        "abs" => {
            let [x] = arity::<1>(name, args)?;
            match x {
                Value::Int(i) => i.checked_abs().map(Value::Int).ok_or(CalculatorError::Overflow),
                Value::Float(f) => Ok(Value::Float(f.abs())),
                Value::List(_) => Err(bad_operand_unary("abs()", &x)),
            }
        }
        "round" => builtin_round(args),
        "min" => builtin_extreme(name, args, |candidate, best| candidate < best),
        "max" => builtin_extreme(name, args, |candidate, best| candidate > best),
        "pow" => builtin_pow(args),
        "sum" => builtin_sum(args),
        "len" => {
            let [x] = arity::<1>(name, args)?;
            match x {
                Value::List(items) => Ok(Value::Int(items.len() as i64)),
                other => Err(CalculatorError::InvalidArgument(format!(
                    "object of type '{}' has no len()",
                    other.type_name()
                ))),
            }
        }
        _ => Err(CalculatorError::UnknownName(name.to_string())),
    }
}

fn arity<const N: usize>(name: &str, args: Vec<Value>) -> Result<[Value; N]> {
    let given = args.len();
    args.try_into().map_err(|_| {
        CalculatorError::InvalidArgument(format!("{name}() takes {N} argument(s) ({given} given)"))
    })
}

fn arity_range(name: &str, args: &[Value], min: usize, max: usize) -> Result<()> {
    if args.len() < min || args.len() > max {
        return Err(CalculatorError::InvalidArgument(format!(
            "{name}() takes {min} to {max} arguments ({} given)",
            args.len()
        )));
    }
    Ok(())
}

fn builtin_round(args: Vec<Value>) -> Result<Value> {
    arity_range("round", &args, 1, 2)?;
    let mut args = args.into_iter();
    let x = args.next().ok_or(CalculatorError::UnexpectedEnd)?;
    let digits = match args.next() {
        None => None,
        Some(Value::Int(d)) => Some(d),
        Some(other) => {
            return Err(CalculatorError::InvalidArgument(format!(
                "round() ndigits must be an integer, not '{}'",
                other.type_name()
            )));
        }
    };

    match (x, digits) {
        (Value::Int(i), None) => Ok(Value::Int(i)),
        (Value::Int(i), Some(d)) if d >= 0 => Ok(Value::Int(i)),
        (Value::Int(i), Some(d)) => {
            let Some(factor) = d
                .checked_neg()
                .and_then(|n| u32::try_from(n).ok())
                .and_then(|exp| 10i64.checked_pow(exp))
            else {
                return Ok(Value::Int(0));
            };
            let q = i.div_euclid(factor);
            let r = i.rem_euclid(factor);
            let round_up = r * 2 > factor || (r * 2 == factor && q % 2 != 0);
            let q = if round_up { q + 1 } else { q };
            q.checked_mul(factor).map(Value::Int).ok_or(CalculatorError::Overflow)
        }
        (Value::Float(f), None) => {
            let rounded = f.round_ties_even();
            if !rounded.is_finite() || rounded < i64::MIN as f64 || rounded >= i64::MAX as f64 {
                return Err(CalculatorError::Overflow);
            }
            Ok(Value::Int(rounded as i64))
        }
        (Value::Float(f), Some(d)) => {
            if d > MAX_FLOAT_DIGITS {
                return Ok(Value::Float(f));
            }
            if d < -MAX_FLOAT_DIGITS {
                return Ok(Value::Float(0.0f64.copysign(f)));
            }
            let factor = 10f64.powi(d as i32);
            let scaled = f * factor;
            if !scaled.is_finite() {
                return Ok(Value::Float(f));
            }
            Ok(Value::Float(scaled.round_ties_even() / factor))
        }
        (x @ Value::List(_), _) => Err(CalculatorError::InvalidArgument(format!(
            "type '{}' doesn't define round()",
            x.type_name()
        ))),
    }
}

fn builtin_extreme(name: &str, args: Vec<Value>, better: fn(f64, f64) -> bool) -> Result<Value> {
    let items = match args.len() {
        0 => {
            return Err(CalculatorError::InvalidArgument(format!(
                "{name}() expected at least 1 argument, got 0"
            )));
        }
        1 => match args.into_iter().next() {
            Some(Value::List(items)) => items,
            Some(single) => {
                return Err(CalculatorError::InvalidArgument(format!(
                    "'{}' object is not iterable",
                    single.type_name()
                )));
            }
            None => Vec::new(),
        },
        _ => args,
    };

    let mut best: Option<(f64, Value)> = None;
    for item in items {
        let key = item.as_f64().ok_or_else(|| {
            CalculatorError::InvalidArgument(format!("{name}() arguments must be numbers"))
        })?;
        let replace = match &best {
            Some((best_key, _)) => better(key, *best_key),
            None => true,
        };
        if replace {
            best = Some((key, item));
        }
    }

    best.map(|(_, value)| value).ok_or_else(|| {
        CalculatorError::InvalidArgument(format!("{name}() arg is an empty sequence"))
    })
}

fn builtin_pow(args: Vec<Value>) -> Result<Value> {
    arity_range("pow", &args, 2, 3)?;
    let mut args = args.into_iter();
    let (Some(base), Some(exp)) = (args.next(), args.next()) else {
        return Err(CalculatorError::UnexpectedEnd);
    };

    let Some(modulus) = args.next() else {
        return binary(BinOp::Pow, base, exp);
    };

    let (Value::Int(base), Value::Int(exp), Value::Int(modulus)) = (base, exp, modulus) else {
        return Err(CalculatorError::InvalidArgument(
            "pow() 3rd argument not allowed unless all arguments are integers".to_string(),
        ));
    };
    if modulus == 0 {
        return Err(CalculatorError::InvalidArgument(
            "pow() 3rd argument cannot be 0".to_string(),
        ));
    }
    if exp < 0 {
        return Err(CalculatorError::InvalidArgument(
            "pow() negative exponent not supported with a modulus".to_string(),
        ));
    }

    let m = modulus as i128;
    let mut result: i128 = 1;
    let mut b = (base as i128).rem_euclid(m.abs());
    let mut e = exp;
    while e > 0 {
        if e & 1 == 1 {
            result = (result * b).rem_euclid(m.abs());
        }
        b = (b * b).rem_euclid(m.abs());
        e >>= 1;
    }
    let result = result % m.abs();
    // Match the divisor's sign like the `%` operator does.
    let result = if result != 0 && m < 0 { result + m } else { result };
    Ok(Value::Int(result as i64))
}

fn builtin_sum(args: Vec<Value>) -> Result<Value> {
    arity_range("sum", &args, 1, 2)?;
    let mut args = args.into_iter();
    let items = match args.next() {
        Some(Value::List(items)) => items,
        Some(other) => {
            return Err(CalculatorError::InvalidArgument(format!(
                "'{}' object is not iterable",
                other.type_name()
            )));
        }
        None => return Err(CalculatorError::UnexpectedEnd),
    };
    let start = args.next().unwrap_or(Value::Int(0));

    items
        .into_iter()
        .try_fold(start, |acc, item| binary(BinOp::Add, acc, item))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &str) -> Value {
        evaluate(expr).unwrap_or_else(|e| panic!("{expr}: {e}"))
    }

    // ==================== Arithmetic Tests ====================

    #[test]
    fn test_precedence() {
        assert_eq!(eval("2 + 3 * 4"), Value::Int(14));
        assert_eq!(eval("(2 + 3) * 4"), Value::Int(20));
        assert_eq!(eval("10 - 4 - 3"), Value::Int(3));
    }

    #[test]
    fn test_true_division_yields_float() {
        assert_eq!(eval("7 / 2"), Value::Float(3.5));
        assert_eq!(eval("8 / 2"), Value::Float(4.0));
    }

    #[test]
    fn test_floor_division_and_modulo_follow_divisor_sign() {
        assert_eq!(eval("7 // 2"), Value::Int(3));
        assert_eq!(eval("-7 // 2"), Value::Int(-4));
        assert_eq!(eval("-7 % 3"), Value::Int(2));
        assert_eq!(eval("7 % -3"), Value::Int(-2));
        assert_eq!(eval("7.5 // 2"), Value::Float(3.0));
    }

    #[test]
    fn test_power() {
        assert_eq!(eval("2 ** 10"), Value::Int(1024));
        assert_eq!(eval("2 ** -1"), Value::Float(0.5));
        assert_eq!(eval("2 ** 3 ** 2"), Value::Int(512));
        assert_eq!(eval("-2 ** 2"), Value::Int(-4));
    }

    #[test]
    fn test_float_literals() {
        assert_eq!(eval(".5 + 1e1"), Value::Float(10.5));
        assert_eq!(eval("1_000 + 1"), Value::Int(1001));
    }

    // ==================== Builtin Tests ====================

    #[test]
    fn test_builtins() {
        assert_eq!(eval("abs(-5)"), Value::Int(5));
        assert_eq!(eval("round(2.5)"), Value::Int(2));
        assert_eq!(eval("round(3.5)"), Value::Int(4));
        assert_eq!(eval("round(3.14159, 2)"), Value::Float(3.14));
        assert_eq!(eval("round(1250, -2)"), Value::Int(1200));
        assert_eq!(eval("max(1, 5, 3)"), Value::Int(5));
        assert_eq!(eval("min([4, 2.5, 8])"), Value::Float(2.5));
        assert_eq!(eval("sum([1, 2, 3])"), Value::Int(6));
        assert_eq!(eval("sum((1, 2), 10)"), Value::Int(13));
        assert_eq!(eval("len([1, 2, 3])"), Value::Int(3));
        assert_eq!(eval("pow(2, 10)"), Value::Int(1024));
        assert_eq!(eval("pow(2, 10, 1000)"), Value::Int(24));
    }

    #[test]
    fn test_round_with_extreme_ndigits() {
        assert_eq!(eval("round(5, -9223372036854775807 - 1)"), Value::Int(0));
        assert_eq!(eval("round(5, -19)"), Value::Int(0));
        assert_eq!(eval("round(-7, -9223372036854775807)"), Value::Int(0));
        assert_eq!(eval("round(1.5, -400)"), Value::Float(0.0));
        assert_eq!(eval("round(-1.5, -400)").to_string(), "-0.0");
        assert_eq!(eval("round(2.675, 400)"), Value::Float(2.675));
        assert_eq!(eval("round(1e300, 10)"), Value::Float(1e300));
    }

    #[test]
    fn test_lists_and_tuples() {
        assert_eq!(
            eval("[1, 2] + [3]"),
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
        assert_eq!(eval("()"), Value::List(vec![]));
        assert_eq!(eval("(1,)"), Value::List(vec![Value::Int(1)]));
    }

    // ==================== Error Tests ====================

    #[test]
    fn test_division_by_zero() {
        assert_eq!(evaluate("1 / 0"), Err(CalculatorError::DivisionByZero));
        assert_eq!(evaluate("1 % 0"), Err(CalculatorError::DivisionByZero));
        assert_eq!(evaluate("0 ** -1"), Err(CalculatorError::DivisionByZero));
    }

    #[test]
    fn test_overflow() {
        assert_eq!(
            evaluate("9223372036854775807 + 1"),
            Err(CalculatorError::Overflow)
        );
        assert_eq!(evaluate("10 ** 100"), Err(CalculatorError::Overflow));
    }

    #[test]
    fn test_rejects_code() {
        assert!(matches!(
            evaluate("__import__('os')"),
            Err(CalculatorError::UnexpectedCharacter { ch: '\'', .. })
        ));
        assert_eq!(
            evaluate("open(1)"),
            Err(CalculatorError::UnknownName("open".to_string()))
        );
        assert_eq!(evaluate("x + 1"), Err(CalculatorError::UnknownName("x".to_string())));
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(evaluate("(1 + 2"), Err(CalculatorError::UnexpectedEnd));
        assert_eq!(
            evaluate("1 2"),
            Err(CalculatorError::UnexpectedToken("2".to_string()))
        );
        assert_eq!(evaluate("   "), Err(CalculatorError::Empty));
        assert_eq!(
            evaluate(&"1+".repeat(MAX_EXPRESSION_LENGTH)),
            Err(CalculatorError::TooLong)
        );
    }

    #[test]
    fn test_nesting_limit() {
        let expr = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(evaluate(&expr), Err(CalculatorError::TooDeep));
    }

    #[test]
    fn test_argument_errors() {
        assert!(matches!(evaluate("len(5)"), Err(CalculatorError::InvalidArgument(_))));
        assert!(matches!(evaluate("max([])"), Err(CalculatorError::InvalidArgument(_))));
        assert!(matches!(evaluate("abs(1, 2)"), Err(CalculatorError::InvalidArgument(_))));
        assert!(matches!(evaluate("abs"), Err(CalculatorError::InvalidArgument(_))));
    }

    // ==================== Display Tests ====================

    #[test]
    fn test_display() {
        assert_eq!(Value::Int(14).to_string(), "14");
        assert_eq!(Value::Float(4.0).to_string(), "4.0");
        assert_eq!(Value::Float(3.5).to_string(), "3.5");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Float(2.0)]).to_string(),
            "[1, 2.0]"
        );
    }

    #[test]
    fn test_display_float_exponents() {
        assert_eq!(Value::Float(1e16).to_string(), "1e+16");
        assert_eq!(Value::Float(1.2345e20).to_string(), "1.2345e+20");
        assert_eq!(Value::Float(0.00001).to_string(), "1e-05");
        assert_eq!(Value::Float(1.5e-7).to_string(), "1.5e-07");
        assert_eq!(Value::Float(1e100).to_string(), "1e+100");
        assert_eq!(Value::Float(1e15).to_string(), "1000000000000000.0");
        assert_eq!(Value::Float(0.0001).to_string(), "0.0001");
        assert_eq!(Value::Float(-0.0).to_string(), "-0.0");
        assert_eq!(eval("0.1 + 0.2").to_string(), "0.30000000000000004");
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(CalculatorError::DivisionByZero.code(), "DIVISION_BY_ZERO");
        assert_eq!(CalculatorError::UnknownName("x".into()).code(), "UNKNOWN_NAME");

        let mcp_err = CalculatorError::Overflow.to_mcp_error();
        assert_eq!(mcp_err.message, "Numeric overflow");
        assert_eq!(
            mcp_err.data.as_ref().unwrap()["code"].as_str().unwrap(),
            "OVERFLOW"
        );
    }
}
