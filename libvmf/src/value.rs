//! VMF value representation.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;

/// A point or direction in map space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn min(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    pub fn max(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl Serialize for Vec3 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_array().serialize(serializer)
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            format_float(self.x),
            format_float(self.y),
            format_float(self.z)
        )
    }
}

/// An 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.r, self.g, self.b].serialize(serializer)
    }
}

/// A texture axis: direction, offset, and scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisSpec {
    pub axis: Vec3,
    pub offset: f64,
    pub scale: f64,
}

impl fmt::Display for AxisSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} {} {} {}] {}",
            format_float(self.axis.x),
            format_float(self.axis.y),
            format_float(self.axis.z),
            format_float(self.offset),
            format_float(self.scale)
        )
    }
}

/// A VMF value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Opaque text.
    String(String),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit floating-point number.
    Float(f64),
    /// `true` / `false`, in any case.
    Bool(bool),
    /// Three floats, bare or parenthesized.
    Vector3(Vec3),
    /// Three integers in `0..=255`.
    Color(Rgb),
    /// A `uaxis` / `vaxis` texture axis.
    Axis(AxisSpec),
    /// Occurrences of a repeated key, in source order.
    List(Vec<Value>),
    /// A brace-delimited block.
    Block(Block),
}

impl Value {
    /// Returns `true` for `List` and `Block`.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::List(_) | Value::Block(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_vector3(&self) -> Option<Vec3> {
        match self {
            Value::Vector3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<&Block> {
        match self {
            Value::Block(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_block_mut(&mut self) -> Option<&mut Block> {
        match self {
            Value::Block(b) => Some(b),
            _ => None,
        }
    }

    /// Scalar text as it would be written to a VMF file. Containers have none.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Value::String(s) => Some(Cow::Borrowed(s)),
            Value::List(_) | Value::Block(_) => None,
            other => Some(Cow::Owned(other.to_string())),
        }
    }

    /// Blocks stored under a key, whether it occurred once or was folded.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        let items: &[Value] = match self {
            Value::List(items) => items,
            other => std::slice::from_ref(other),
        };
        items.iter().filter_map(Value::as_block)
    }

    /// Short name of the variant, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Vector3(_) => "vector3",
            Value::Color(_) => "color",
            Value::Axis(_) => "axis",
            Value::List(_) => "list",
            Value::Block(_) => "block",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => f.write_str(&format_float(*n)),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Vector3(v) => write!(f, "{}", v),
            Value::Color(c) => write!(f, "{} {} {}", c.r, c.g, c.b),
            Value::Axis(a) => write!(f, "{}", a),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Block(b) => write!(f, "{{{} entries}}", b.len()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::String(s) => serializer.serialize_str(s),
            Value::Integer(n) => serializer.serialize_i64(*n),
            Value::Float(n) => serializer.serialize_f64(*n),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Vector3(v) => v.serialize(serializer),
            Value::Color(c) => c.serialize(serializer),
            Value::Axis(a) => a.serialize(serializer),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Block(b) => b.serialize(serializer),
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

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Vec3> for Value {
    fn from(v: Vec3) -> Self {
        Value::Vector3(v)
    }
}

impl From<Block> for Value {
    fn from(b: Block) -> Self {
        Value::Block(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// An insertion-ordered map with unique keys.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    entries: Vec<(String, Value)>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Text of a scalar entry.
    pub fn text(&self, key: &str) -> Option<Cow<'_, str>> {
        self.get(key).and_then(Value::as_text)
    }

    /// Insert or replace in place, keeping the original position.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        match self.get_mut(&key) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Take the entries out, leaving the block empty.
    pub fn into_entries(mut self) -> Vec<(String, Value)> {
        std::mem::take(&mut self.entries)
    }
}

impl FromIterator<(String, Value)> for Block {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut block = Block::new();
        for (k, v) in iter {
            block.insert(k, v);
        }
        block
    }
}

impl Serialize for Block {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

// Deeply nested input would otherwise overflow the stack on drop.
impl Drop for Block {
    fn drop(&mut self) {
        let mut pending: Vec<Value> = self
            .entries
            .drain(..)
            .map(|(_, v)| v)
            .filter(Value::is_container)
            .collect();
        while let Some(value) = pending.pop() {
            match value {
                Value::Block(mut b) => {
                    pending.extend(
                        b.entries
                            .drain(..)
                            .map(|(_, v)| v)
                            .filter(Value::is_container),
                    );
                }
                Value::List(items) => {
                    pending.extend(items.into_iter().filter(Value::is_container));
                }
                _ => {}
            }
        }
    }
}

/// Format a float so it always reads back as a float.
pub fn format_float(f: f64) -> String {
    format!("{:?}", f)
}
