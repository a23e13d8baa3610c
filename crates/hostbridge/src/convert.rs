//! Geometry converters.
//!
//! Each converter accepts either a fixed-arity JSON array or a JSON object
//! keyed by component name and returns the canonical keyed form with `f64`
//! components. Errors always name the offending parameter.

use crate::error::ValidationError;
use crate::schema::value_type_name;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

/// RGBA color, every channel in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub center: Vector3,
    pub size: Vector3,
}

impl Vector2 {
    pub fn to_value(self) -> Value {
        json!({ "x": self.x, "y": self.y })
    }
}

impl Vector3 {
    pub fn to_value(self) -> Value {
        json!({ "x": self.x, "y": self.y, "z": self.z })
    }
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    /// XYZ intrinsic composition of three rotations given in degrees.
    pub fn from_euler_degrees(x: f64, y: f64, z: f64) -> Self {
        let (s1, c1) = (x.to_radians() / 2.0).sin_cos();
        let (s2, c2) = (y.to_radians() / 2.0).sin_cos();
        let (s3, c3) = (z.to_radians() / 2.0).sin_cos();

        Quaternion {
            x: s1 * c2 * c3 + c1 * s2 * s3,
            y: c1 * s2 * c3 - s1 * c2 * s3,
            z: c1 * c2 * s3 + s1 * s2 * c3,
            w: c1 * c2 * c3 - s1 * s2 * s3,
        }
    }

    pub fn to_value(self) -> Value {
        json!({ "x": self.x, "y": self.y, "z": self.z, "w": self.w })
    }
}

impl Color {
    pub fn to_value(self) -> Value {
        json!({ "r": self.r, "g": self.g, "b": self.b, "a": self.a })
    }
}

impl Rect {
    pub fn to_value(self) -> Value {
        json!({ "x": self.x, "y": self.y, "width": self.width, "height": self.height })
    }
}

impl Bounds {
    pub fn to_value(self) -> Value {
        json!({ "center": self.center.to_value(), "size": self.size.to_value() })
    }
}

/// Which converter a geometry parameter goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    Vector2,
    Vector3,
    Quaternion,
    /// Euler angles in degrees, sent as a quaternion
    Euler,
    Color,
    Rect,
    Bounds,
}

impl GeometryKind {
    pub fn name(self) -> &'static str {
        match self {
            GeometryKind::Vector2 => "Vector2",
            GeometryKind::Vector3 => "Vector3",
            GeometryKind::Quaternion => "Quaternion",
            GeometryKind::Euler => "Euler",
            GeometryKind::Color => "Color",
            GeometryKind::Rect => "Rect",
            GeometryKind::Bounds => "Bounds",
        }
    }

    /// Run the matching converter and return the canonical mapping.
    pub fn convert(self, value: &Value, param: &str) -> Result<Value, ValidationError> {
        Ok(match self {
            GeometryKind::Vector2 => convert_vector2(value, param)?.to_value(),
            GeometryKind::Vector3 => convert_vector3(value, param)?.to_value(),
            GeometryKind::Quaternion => convert_quaternion(value, param)?.to_value(),
            GeometryKind::Euler => euler_to_quaternion(value, param)?.to_value(),
            GeometryKind::Color => convert_color(value, param)?.to_value(),
            GeometryKind::Rect => convert_rect(value, param)?.to_value(),
            GeometryKind::Bounds => convert_bounds(value, param)?.to_value(),
        })
    }
}

pub fn convert_vector2(value: &Value, param: &str) -> Result<Vector2, ValidationError> {
    let [x, y] = components(value, param, "Vector2", ["x", "y"])?;
    Ok(Vector2 { x, y })
}

pub fn convert_vector3(value: &Value, param: &str) -> Result<Vector3, ValidationError> {
    let [x, y, z] = components(value, param, "Vector3", ["x", "y", "z"])?;
    Ok(Vector3 { x, y, z })
}

pub fn convert_quaternion(value: &Value, param: &str) -> Result<Quaternion, ValidationError> {
    let [x, y, z, w] = components(value, param, "Quaternion", ["x", "y", "z", "w"])?;
    Ok(Quaternion { x, y, z, w })
}

pub fn convert_rect(value: &Value, param: &str) -> Result<Rect, ValidationError> {
    let [x, y, width, height] = components(value, param, "Rect", ["x", "y", "width", "height"])?;
    Ok(Rect {
        x,
        y,
        width,
        height,
    })
}

/// Euler angles in degrees (array or `{x,y,z}`) to a quaternion.
pub fn euler_to_quaternion(value: &Value, param: &str) -> Result<Quaternion, ValidationError> {
    let [x, y, z] = components(value, param, "Euler", ["x", "y", "z"])?;
    Ok(Quaternion::from_euler_degrees(x, y, z))
}

/// RGBA or RGB (alpha defaults to 1.0). Every channel must be in `[0, 1]`.
pub fn convert_color(value: &Value, param: &str) -> Result<Color, ValidationError> {
    let [r, g, b, a] = match value {
        Value::Array(items) if items.len() == 3 => {
            let [r, g, b] = components(value, param, "Color", ["r", "g", "b"])?;
            [r, g, b, 1.0]
        }
        Value::Array(items) if items.len() != 4 => {
            return Err(ValidationError::for_param(
                param,
                format!(
                    "Parameter '{param}' must be a Color with 3 or 4 elements, got {}",
                    items.len()
                ),
            ));
        }
        Value::Object(map) if !map.contains_key("a") => {
            let [r, g, b] = components(value, param, "Color", ["r", "g", "b"])?;
            [r, g, b, 1.0]
        }
        _ => components(value, param, "Color", ["r", "g", "b", "a"])?,
    };

    for (channel, v) in [("r", r), ("g", g), ("b", b), ("a", a)] {
        if !(0.0..=1.0).contains(&v) {
            return Err(ValidationError::for_param(
                param,
                format!(
                    "Parameter '{param}' channel '{channel}' must be between 0.0 and 1.0, got {v}"
                ),
            ));
        }
    }

    Ok(Color { r, g, b, a })
}

/// `{center, size}`, each Vector3-like.
pub fn convert_bounds(value: &Value, param: &str) -> Result<Bounds, ValidationError> {
    let Value::Object(map) = value else {
        return Err(ValidationError::for_param(
            param,
            format!(
                "Parameter '{param}' must be a mapping with keys center, size; got {}",
                value_type_name(value)
            ),
        ));
    };

    let missing: Vec<&str> = ["center", "size"]
        .into_iter()
        .filter(|k| !map.contains_key(*k))
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::for_param(
            param,
            format!(
                "Parameter '{param}' is missing required keys: {}",
                missing.join(", ")
            ),
        ));
    }

    let center = convert_vector3(&map["center"], &format!("{param}.center"))?;
    let size = convert_vector3(&map["size"], &format!("{param}.size"))?;
    Ok(Bounds { center, size })
}

/// Pull `N` numeric components out of an array or keyed object.
fn components<const N: usize>(
    value: &Value,
    param: &str,
    type_name: &str,
    keys: [&str; N],
) -> Result<[f64; N], ValidationError> {
    let mut out = [0.0; N];
    match value {
        Value::Array(items) => {
            if items.len() != N {
                return Err(ValidationError::for_param(
                    param,
                    format!(
                        "Parameter '{param}' must be a {type_name} with {N} elements, got {}",
                        items.len()
                    ),
                ));
            }
            for ((slot, item), key) in out.iter_mut().zip(items).zip(keys) {
                *slot = coerce_number(item, param, key)?;
            }
        }
        Value::Object(map) => {
            let missing: Vec<&str> = keys
                .iter()
                .copied()
                .filter(|k| !map.contains_key(*k))
                .collect();
            if !missing.is_empty() {
                return Err(ValidationError::for_param(
                    param,
                    format!(
                        "Parameter '{param}' is missing required keys: {}",
                        missing.join(", ")
                    ),
                ));
            }
            for (slot, key) in out.iter_mut().zip(keys) {
                *slot = coerce_number(&map[key], param, key)?;
            }
        }
        other => {
            return Err(ValidationError::for_param(
                param,
                format!(
                    "Parameter '{param}' must be a list of {N} numbers or a mapping with keys {}; got {}",
                    keys.join(", "),
                    value_type_name(other)
                ),
            ));
        }
    }
    Ok(out)
}

/// Numbers pass through; numeric strings are parsed. Must be finite.
fn coerce_number(value: &Value, param: &str, key: &str) -> Result<f64, ValidationError> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(ValidationError::for_param(
            param,
            format!("Parameter '{param}' has a non-numeric value for '{key}': {value}"),
        )),
    }
}
