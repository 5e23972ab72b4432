//! Loose comparison and coercion rules for record values.
//!
//! Records are loosely typed: a view count may arrive as `20` in one record and
//! as `"20"` in the next. The helpers here define how such values compare and
//! coerce, and are shared by the caster, the filter rules, the sort engine and
//! the aggregations.
//!
//! - [`loose_eq`] treats numeric strings and numbers as comparable.
//! - [`loose_cmp`] extends that to the ordering used by range operators.
//! - [`sort_cmp`] is a total order by type rank, used for sorting.
//! - [`to_number`], [`truthy`] and [`to_text`] are the coercions behind the
//!   `int`/`float`, `bool` and `string` casts.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Add;

use serde_json::Value;

/// Numeric value produced by coercion.
///
/// Integers stay integers as long as possible so that `sum` over integer
/// columns yields an integer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// Signed 64-bit integer.
    I64(i64),
    /// 64-bit floating point.
    F64(f64),
}

impl Number {
    /// Converts the number to f64.
    pub fn to_f64(self) -> f64 {
        match self {
            Number::I64(n) => n as f64,
            Number::F64(n) => n,
        }
    }

    /// Truncates toward zero, saturating at the i64 bounds.
    pub fn to_i64(self) -> i64 {
        match self {
            Number::I64(n) => n,
            Number::F64(n) if n.is_nan() => 0,
            Number::F64(n) => n as i64,
        }
    }

    /// Compares two numbers, handling mixed types.
    pub fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::I64(a), Number::I64(b)) => Some(a.cmp(&b)),
            _ => self.to_f64().partial_cmp(&other.to_f64()),
        }
    }

    /// Converts into a JSON value. Non-finite floats become `null`.
    pub fn into_value(self) -> Value {
        match self {
            Number::I64(n) => Value::from(n),
            Number::F64(n) => Value::from(n),
        }
    }

    fn from_json(n: &serde_json::Number) -> Number {
        match n.as_i64() {
            Some(i) => Number::I64(i),
            None => Number::F64(n.as_f64().unwrap_or(0.0)),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(*other)
    }
}

/// Integer addition falls back to floating point on overflow.
impl Add for Number {
    type Output = Number;

    fn add(self, other: Number) -> Number {
        match (self, other) {
            (Number::I64(a), Number::I64(b)) => match a.checked_add(b) {
                Some(sum) => Number::I64(sum),
                None => Number::F64(a as f64 + b as f64),
            },
            _ => Number::F64(self.to_f64() + other.to_f64()),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::I64(n) => write!(f, "{}", n),
            Number::F64(n) => write!(f, "{}", n),
        }
    }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self {
        Number::I64(n)
    }
}

impl From<f64> for Number {
    fn from(n: f64) -> Self {
        Number::F64(n)
    }
}

/// Parses the leading numeric portion of a string.
///
/// Leading whitespace is skipped. Returns the number and the count of bytes
/// consumed (including the skipped whitespace), or `None` if the string does
/// not start with a number.
fn parse_prefix(s: &str) -> Option<(Number, usize)> {
    let bytes = s.as_bytes();
    let start = s.len() - s.trim_start().len();
    let mut i = start;

    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let int_digits = i - int_start;

    let mut is_float = false;
    let mut frac_digits = 0;
    if i < bytes.len() && bytes[i] == b'.' {
        let mut j = i + 1;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        frac_digits = j - i - 1;
        if int_digits > 0 || frac_digits > 0 {
            is_float = true;
            i = j;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return None;
    }

    // Exponent only counts when at least one digit follows it.
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            is_float = true;
            i = j;
        }
    }

    let text = &s[start..i];
    let number = if is_float {
        Number::F64(text.parse::<f64>().ok()?)
    } else {
        match text.parse::<i64>() {
            Ok(n) => Number::I64(n),
            Err(_) => Number::F64(text.parse::<f64>().ok()?),
        }
    };
    Some((number, i))
}

/// Parses a string that is numeric in its entirety (surrounding whitespace allowed).
pub fn numeric_str(s: &str) -> Option<Number> {
    let trimmed_end = s.trim_end();
    let (number, consumed) = parse_prefix(trimmed_end)?;
    (consumed == trimmed_end.len()).then_some(number)
}

/// Returns the number a value represents, if it is a number or a numeric string.
pub fn as_number(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) => Some(Number::from_json(n)),
        Value::String(s) => numeric_str(s),
        _ => None,
    }
}

/// Coerces any value to a number, falling back to zero.
///
/// Strings contribute their leading numeric portion (`"12abc"` is 12).
pub fn to_number(value: &Value) -> Number {
    match value {
        Value::Number(n) => Number::from_json(n),
        Value::String(s) => parse_prefix(s).map(|(n, _)| n).unwrap_or(Number::I64(0)),
        Value::Bool(b) => Number::I64(*b as i64),
        Value::Null => Number::I64(0),
        Value::Array(items) => Number::I64(!items.is_empty() as i64),
        Value::Object(map) => Number::I64(!map.is_empty() as i64),
    }
}

/// Truthiness: null, false, zero, `""`, `"0"` and empty containers are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => Number::from_json(n).to_f64() != 0.0,
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Renders a value as plain text.
///
/// Strings are returned unquoted, `null` is empty, booleans are `"1"`/`""`,
/// and containers are rendered as compact JSON.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => String::new(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Loose equality.
///
/// Numbers and numeric strings compare numerically, booleans compare by
/// truthiness, and `null` equals any falsy value (but only the empty string).
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, Value::String(s)) | (Value::String(s), Value::Null) => s.is_empty(),
        (Value::Null, other) | (other, Value::Null) => !truthy(other),
        (Value::Bool(_), _) | (_, Value::Bool(_)) => truthy(a) == truthy(b),
        (Value::Number(_), Value::Number(_)) => numeric_eq(a, b),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            match numeric_str(s) {
                Some(parsed) => Number::from_json(n).compare(parsed) == Some(Ordering::Equal),
                None => n.to_string() == *s,
            }
        }
        (Value::String(x), Value::String(y)) => match (numeric_str(x), numeric_str(y)) {
            (Some(p), Some(q)) => p.compare(q) == Some(Ordering::Equal),
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| loose_eq(p, q))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(key, p)| y.get(key).is_some_and(|q| loose_eq(p, q)))
        }
        _ => false,
    }
}

fn numeric_eq(a: &Value, b: &Value) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(p), Some(q)) => p.compare(q) == Some(Ordering::Equal),
        _ => false,
    }
}

/// Loose ordering, consistent with [`loose_eq`] for equal values.
///
/// Rules, in order:
/// - loosely equal values are `Equal`
/// - `null` against a string compares as the empty string, otherwise by truthiness
/// - booleans compare by truthiness
/// - two numeric values compare numerically (NaN compares equal)
/// - a number against a non-numeric string compares as text
/// - strings compare lexicographically
/// - lists compare by length, then element by element
/// - maps compare by length; containers sort after scalars
pub fn loose_cmp(a: &Value, b: &Value) -> Ordering {
    if loose_eq(a, b) {
        return Ordering::Equal;
    }
    match (a, b) {
        (Value::Null, Value::String(s)) => "".cmp(s.as_str()),
        (Value::String(s), Value::Null) => s.as_str().cmp(""),
        (Value::Null, other) => false.cmp(&truthy(other)),
        (other, Value::Null) => truthy(other).cmp(&false),
        (Value::Bool(_), _) | (_, Value::Bool(_)) => truthy(a).cmp(&truthy(b)),
        (Value::Array(x), Value::Array(y)) => x.len().cmp(&y.len()).then_with(|| {
            x.iter()
                .zip(y)
                .map(|(p, q)| loose_cmp(p, q))
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        }),
        (Value::Object(x), Value::Object(y)) => x.len().cmp(&y.len()),
        (Value::Array(_) | Value::Object(_), _) => Ordering::Greater,
        (_, Value::Array(_) | Value::Object(_)) => Ordering::Less,
        _ => match (as_number(a), as_number(b)) {
            (Some(p), Some(q)) => p.compare(q).unwrap_or(Ordering::Equal),
            _ => to_text(a).cmp(&to_text(b)),
        },
    }
}

/// Total order used for sorting, grouping values by type first.
///
/// ```text
/// null < bool < number | numeric string < other string < list < map
/// ```
///
/// Within a rank: `false < true`, numbers compare exactly (numeric strings by
/// their parsed value), strings lexicographically, lists element by element
/// then by length, maps entry by entry then by length.
pub fn sort_cmp(a: &Value, b: &Value) -> Ordering {
    let (ra, rb) = (rank(a), rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(p, q)| sort_cmp(p, q))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => x
            .iter()
            .zip(y)
            .map(|((kp, p), (kq, q))| kp.cmp(kq).then_with(|| sort_cmp(p, q)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::String(x), Value::String(y)) if ra == 3 => x.cmp(y),
        _ => match (as_number(a), as_number(b)) {
            (Some(p), Some(q)) => exact_cmp(p, q),
            _ => Ordering::Equal,
        },
    }
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(s) if numeric_str(s).is_some() => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Compares without rounding the integer side through f64.
fn exact_cmp(a: Number, b: Number) -> Ordering {
    match (a, b) {
        (Number::I64(x), Number::I64(y)) => x.cmp(&y),
        (Number::F64(x), Number::F64(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Number::I64(x), Number::F64(y)) => int_float_cmp(x, y),
        (Number::F64(x), Number::I64(y)) => int_float_cmp(y, x).reverse(),
    }
}

fn int_float_cmp(int: i64, float: f64) -> Ordering {
    // 2^63; every i64 lies in [-2^63, 2^63).
    const BOUND: f64 = 9_223_372_036_854_775_808.0;
    if float.is_nan() {
        return Ordering::Equal;
    }
    if float >= BOUND {
        return Ordering::Less;
    }
    if float < -BOUND {
        return Ordering::Greater;
    }
    let whole = float.trunc();
    int.cmp(&(whole as i64)).then_with(|| {
        if float > whole {
            Ordering::Less
        } else if float < whole {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    })
}
