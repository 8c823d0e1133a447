//! Argument values
//!
//! A [`Value`] is what a command parameter evaluates to. The variants cover
//! everything the builder surface accepts: numbers, flags, strings (colors,
//! fonts, references), lists (dash patterns, matrices, shadows), nested maps
//! (label and hatch options), shared point arrays and nested queues.

use std::collections::HashMap;
use std::fmt;

use glam::DVec2;

use crate::points::SharedPoints;
use crate::queue::Queue;

/// Nested parameter map (e.g. `label: { str, loc, off }`)
pub type ValueMap = HashMap<String, Value>;

/// An evaluated argument value
#[derive(Clone)]
pub enum Value {
    /// Numeric value
    Num(f64),
    /// Boolean flag
    Bool(bool),
    /// String value (colors, fonts, text, uris)
    Str(String),
    /// Ordered list of values
    List(Vec<Value>),
    /// Nested parameter map
    Map(ValueMap),
    /// Shared, caller-mutable point array
    Points(SharedPoints),
    /// Nested command queue
    Queue(Queue),
}

impl Value {
    /// Numeric view. Numeric strings are parsed, everything else is `None`.
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// String view
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean view (only `Bool`)
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// List view
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Map view
    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Shared point array view
    pub fn as_points(&self) -> Option<&SharedPoints> {
        match self {
            Value::Points(points) => Some(points),
            _ => None,
        }
    }

    /// Nested queue view
    pub fn as_queue(&self) -> Option<&Queue> {
        match self {
            Value::Queue(queue) => Some(queue),
            _ => None,
        }
    }

    /// Look up a key of a map value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Read an `{x, y}` map as a point
    pub fn as_point(&self) -> Option<DVec2> {
        let map = self.as_map()?;
        let x = map.get("x").and_then(Value::as_num).unwrap_or(0.0);
        let y = map.get("y").and_then(Value::as_num).unwrap_or(0.0);
        Some(DVec2::new(x, y))
    }

    /// Read a list of numbers, skipping non-numeric entries
    pub fn as_numbers(&self) -> Option<Vec<f64>> {
        self.as_list()
            .map(|items| items.iter().filter_map(Value::as_num).collect())
    }

    /// Forgiving truthiness: zero, NaN, `false` and the empty string are falsy.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Bool(b) => *b,
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Build an `{x, y}` map
    pub fn point(p: DVec2) -> Self {
        let mut map = ValueMap::new();
        map.insert("x".into(), Value::Num(p.x));
        map.insert("y".into(), Value::Num(p.y));
        Value::Map(map)
    }

    /// Build a map from key/value pairs
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Num(a), Value::Num(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Points(a), Value::Points(b)) => a.ptr_eq(b),
            (Value::Queue(a), Value::Queue(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Map(map) => f.debug_map().entries(map).finish(),
            Value::Points(points) => write!(f, "Points({})", points.len()),
            Value::Queue(queue) => write!(f, "Queue({})", queue.len()),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Num(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Num(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Num(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Num(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Vec<f64>> for Value {
    fn from(items: Vec<f64>) -> Self {
        Value::List(items.into_iter().map(Value::Num).collect())
    }
}

impl<const N: usize> From<[f64; N]> for Value {
    fn from(items: [f64; N]) -> Self {
        Value::List(items.into_iter().map(Value::Num).collect())
    }
}

impl From<ValueMap> for Value {
    fn from(map: ValueMap) -> Self {
        Value::Map(map)
    }
}

impl From<DVec2> for Value {
    fn from(p: DVec2) -> Self {
        Value::point(p)
    }
}

impl From<SharedPoints> for Value {
    fn from(points: SharedPoints) -> Self {
        Value::Points(points)
    }
}

impl From<Queue> for Value {
    fn from(queue: Queue) -> Self {
        Value::Queue(queue)
    }
}

impl From<&Queue> for Value {
    fn from(queue: &Queue) -> Self {
        Value::Queue(queue.clone())
    }
}
