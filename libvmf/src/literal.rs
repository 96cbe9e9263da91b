//! Literal typing.
//!
//! VMF stores every value as a quoted string. [`classify_literal`] recovers
//! the intended type by trying a fixed list of patterns in order; the first
//! match wins and anything left over stays an opaque string.

use crate::value::{AxisSpec, Rgb, Value, Vec3};
use once_cell::sync::Lazy;
use regex::Regex;

const NUM: &str = r"[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?";

static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+$").expect("integer pattern"));

static FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?(?:\d+\.\d*|\.\d+|\d+)(?:[eE][+-]?\d+)?$").expect("float pattern")
});

static PAREN_TRIPLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^\(\s*({0})\s+({0})\s+({0})\s*\)$", NUM)).expect("paren pattern")
});

static BRACKET_TRIPLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^\[\s*({0})\s+({0})\s+({0})\s*\]$", NUM)).expect("bracket pattern")
});

static BARE_TRIPLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^({0})\s+({0})\s+({0})$", NUM)).expect("triple pattern")
});

static RGB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,3})\s+(\d{1,3})\s+(\d{1,3})$").expect("rgb pattern"));

/// `[x y z] offset scale`
static AXIS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^\[\s*({0})\s+({0})\s+({0})\s*\]\s+({0})\s+({0})$",
        NUM
    ))
    .expect("axis pattern")
});

/// `[x y z offset] scale`, as Hammer writes `uaxis` / `vaxis`.
static HAMMER_AXIS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^\[\s*({0})\s+({0})\s+({0})\s+({0})\s*\]\s+({0})$",
        NUM
    ))
    .expect("hammer axis pattern")
});

/// Type a raw VMF value.
///
/// Rules, in order:
/// 1. integer
/// 2. float (including integers too large for `i64`)
/// 3. `true` / `false`, any case
/// 4. `(x y z)` vector
/// 5. `x y z` vector, unless it reads as an RGB color
/// 6. `r g b` color, each component an integer in `0..=255`
/// 7. texture axis
pub fn classify_literal(text: &str) -> Value {
    let trimmed = text.trim();

    if INTEGER.is_match(trimmed) {
        if let Ok(n) = trimmed.parse::<i64>() {
            return Value::Integer(n);
        }
    }
    if FLOAT.is_match(trimmed) {
        match trimmed.parse::<f64>() {
            Ok(f) if f.is_finite() => return Value::Float(f),
            _ => {}
        }
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Some(v) = captures_vec3(&PAREN_TRIPLE, trimmed) {
        return Value::Vector3(v);
    }
    let rgb = parse_rgb(trimmed);
    if rgb.is_none() {
        if let Some(v) = captures_vec3(&BARE_TRIPLE, trimmed) {
            return Value::Vector3(v);
        }
    }
    if let Some(c) = rgb {
        return Value::Color(c);
    }
    if let Some(a) = parse_axis(trimmed) {
        return Value::Axis(a);
    }
    Value::String(text.to_string())
}

/// Numbers only: integer, then float, else the text itself.
pub fn classify_numeric(text: &str) -> Value {
    let trimmed = text.trim();
    if INTEGER.is_match(trimmed) {
        if let Ok(n) = trimmed.parse::<i64>() {
            return Value::Integer(n);
        }
    }
    if FLOAT.is_match(trimmed) {
        match trimmed.parse::<f64>() {
            Ok(f) if f.is_finite() => return Value::Float(f),
            _ => {}
        }
    }
    Value::String(text.to_string())
}

/// Three integers in `0..=255`.
pub fn parse_rgb(text: &str) -> Option<Rgb> {
    let caps = RGB.captures(text.trim())?;
    let r = caps[1].parse::<u8>().ok()?;
    let g = caps[2].parse::<u8>().ok()?;
    let b = caps[3].parse::<u8>().ok()?;
    Some(Rgb::new(r, g, b))
}

/// `[x y z]`, as used by camera and displacement positions.
pub fn parse_bracket_vector(text: &str) -> Option<Vec3> {
    captures_vec3(&BRACKET_TRIPLE, text.trim())
}

/// A `vertices_plus` vertex. Always floats, bare or parenthesized.
pub fn parse_vertex(text: &str) -> Option<Vec3> {
    let trimmed = text.trim();
    captures_vec3(&BARE_TRIPLE, trimmed).or_else(|| captures_vec3(&PAREN_TRIPLE, trimmed))
}

/// A row of two or more whitespace-separated numbers.
pub fn parse_number_row(text: &str) -> Option<Vec<Value>> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    if parts.len() < 2 {
        return None;
    }
    parts
        .into_iter()
        .map(|p| match classify_numeric(p) {
            Value::String(_) => None,
            n => Some(n),
        })
        .collect()
}

fn parse_axis(text: &str) -> Option<AxisSpec> {
    let caps = AXIS
        .captures(text)
        .or_else(|| HAMMER_AXIS.captures(text))?;
    let n = |i: usize| finite(&caps[i]);
    Some(AxisSpec {
        axis: Vec3::new(n(1)?, n(2)?, n(3)?),
        offset: n(4)?,
        scale: n(5)?,
    })
}

fn captures_vec3(re: &Regex, text: &str) -> Option<Vec3> {
    let caps = re.captures(text)?;
    Some(Vec3::new(finite(&caps[1])?, finite(&caps[2])?, finite(&caps[3])?))
}

/// A component that overflows to infinity leaves the whole text a string.
fn finite(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|f| f.is_finite())
}
