use std::fmt;

use serde::{Deserialize, Serialize};

/// Dynamically typed property value observed on, or fed into, a target.
///
/// `Unit` is the synthetic value produced when an animation has nothing
/// better to return (e.g. an enumerated animation with no candidates).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    #[default]
    Unit,
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
    Point { x: f64, y: f64 },
    Color { r: u8, g: u8, b: u8, a: u8 },
}

impl Value {
    pub const RED: Value = Value::Color {
        r: 0xff,
        g: 0,
        b: 0,
        a: 0xff,
    };
    pub const BLUE: Value = Value::Color {
        r: 0,
        g: 0,
        b: 0xff,
        a: 0xff,
    };

    /// Returns the kind tag matching this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Unit => ValueKind::Other("Unit".to_string()),
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Double(_) => ValueKind::Double,
            Value::Text(_) => ValueKind::Text,
            Value::Point { .. } => ValueKind::Point,
            Value::Color { .. } => ValueKind::Color,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            #[allow(clippy::cast_precision_loss)]
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Linearly interpolates between two values of the same continuous
    /// kind. Returns `None` for mismatched or non-continuous kinds.
    pub fn lerp(from: &Value, to: &Value, progress: f64) -> Option<Value> {
        let t = progress.clamp(0.0, 1.0);
        match (from, to) {
            (Value::Double(a), Value::Double(b)) => Some(Value::Double(a + (b - a) * t)),
            (Value::Point { x: x0, y: y0 }, Value::Point { x: x1, y: y1 }) => Some(Value::Point {
                x: x0 + (x1 - x0) * t,
                y: y0 + (y1 - y0) * t,
            }),
            (
                Value::Color {
                    r: r0,
                    g: g0,
                    b: b0,
                    a: a0,
                },
                Value::Color {
                    r: r1,
                    g: g1,
                    b: b1,
                    a: a1,
                },
            ) => Some(Value::Color {
                r: lerp_channel(*r0, *r1, t),
                g: lerp_channel(*g0, *g1, t),
                b: lerp_channel(*b0, *b1, t),
                a: lerp_channel(*a0, *a1, t),
            }),
            _ => None,
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lerp_channel(from: u8, to: u8, t: f64) -> u8 {
    let value = f64::from(from) + (f64::from(to) - f64::from(from)) * t;
    value.round().clamp(0.0, 255.0) as u8
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => f.write_str("()"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
            Value::Point { x, y } => write!(f, "{x},{y}"),
            Value::Color { r, g, b, a } => write!(f, "#{a:02X}{r:02X}{g:02X}{b:02X}"),
        }
    }
}

/// Declared type of a property, as reported by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Bool,
    Int,
    Double,
    Text,
    Point,
    Color,
    /// Any other framework type, identified by name only.
    Other(String),
}

impl ValueKind {
    /// Name used to key candidate tables and diagnostic translation.
    pub fn type_name(&self) -> &str {
        match self {
            ValueKind::Bool => "Boolean",
            ValueKind::Int => "Int32",
            ValueKind::Double => "Double",
            ValueKind::Text => "String",
            ValueKind::Point => "Point",
            ValueKind::Color => "Color",
            ValueKind::Other(name) => name,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}
