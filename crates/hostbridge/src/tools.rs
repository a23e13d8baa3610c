//! Built-in editor tool schemas.
//!
//! These mirror the commands the editor host understands. Hosts that expose
//! more tools can register additional `ToolSchema`s on the registry.

use crate::convert::GeometryKind;
use crate::error::ValidationError;
use crate::schema::{ActionSchema, ParamType, ToolSchema};
use crate::validation::{
    validate_asset_path, validate_object_name, validate_one_of, validate_unit_range,
};
use serde_json::{Map, Value};

const LIST_OR_MAPPING: ParamType = ParamType::AnyOf(&[ParamType::List, ParamType::Mapping]);

pub const PRIMITIVE_TYPES: &[&str] = &["Cube", "Sphere", "Capsule", "Cylinder", "Plane", "Quad"];

pub const UI_ELEMENT_TYPES: &[&str] = &[
    "Button",
    "Text",
    "Image",
    "Panel",
    "Slider",
    "Toggle",
    "InputField",
];

/// All tools shipped with the bridge.
pub fn builtin_tools() -> Vec<ToolSchema> {
    vec![gameobject_tool(), scene_tool(), material_tool(), ui_tool()]
}

pub fn gameobject_tool() -> ToolSchema {
    ToolSchema::new(
        "manage_gameobject",
        "Create, modify, delete and query objects in the open scene",
    )
    .action(
        ActionSchema::new("create")
            .require("name", ParamType::String)
            .local(),
    )
    .action(ActionSchema::new("modify").require("target", ParamType::String))
    .action(ActionSchema::new("delete").require("target", ParamType::String))
    .action(ActionSchema::new("find").require("search_term", ParamType::String))
    .action(ActionSchema::new("get_components").require("target", ParamType::String))
    .action(ActionSchema::new("find_in_bounds").require("bounds", ParamType::Mapping))
    .geometry("position", GeometryKind::Vector3)
    .geometry("scale", GeometryKind::Vector3)
    .geometry("rotation", GeometryKind::Quaternion)
    .geometry("euler_angles", GeometryKind::Euler)
    .geometry("bounds", GeometryKind::Bounds)
    .hook(check_gameobject)
}

fn check_gameobject(_action: &str, params: &Map<String, Value>) -> Result<(), ValidationError> {
    if let Some(name) = params.get("name").and_then(Value::as_str) {
        validate_object_name("name", name)?;
    }
    if let Some(primitive) = params.get("primitive_type").and_then(Value::as_str) {
        validate_one_of("primitive_type", primitive, PRIMITIVE_TYPES)?;
    }
    if params.contains_key("rotation") && params.contains_key("euler_angles") {
        return Err(ValidationError::for_param(
            "euler_angles",
            "Specify either 'rotation' or 'euler_angles', not both",
        ));
    }
    Ok(())
}

pub fn scene_tool() -> ToolSchema {
    ToolSchema::new("manage_scene", "Load, save, create and inspect scenes")
        .action(ActionSchema::new("load").require("path", ParamType::String))
        .action(ActionSchema::new("save").local())
        .action(
            ActionSchema::new("create")
                .require("name", ParamType::String)
                .local(),
        )
        .action(ActionSchema::new("get_hierarchy"))
        .hook(check_scene)
}

fn check_scene(_action: &str, params: &Map<String, Value>) -> Result<(), ValidationError> {
    if let Some(path) = params.get("path").and_then(Value::as_str) {
        validate_asset_path("path", path, Some(".unity"))?;
    }
    if let Some(name) = params.get("name").and_then(Value::as_str) {
        validate_object_name("name", name)?;
    }
    if let Some(index) = params.get("build_index").filter(|v| !v.is_null()) {
        if index.as_u64().is_none() {
            return Err(ValidationError::for_param(
                "build_index",
                format!("Parameter 'build_index' must be a non-negative integer, got {index}"),
            ));
        }
    }
    Ok(())
}

pub fn material_tool() -> ToolSchema {
    ToolSchema::new("manage_material", "Create materials and set their colors")
        .action(
            ActionSchema::new("create")
                .require("path", ParamType::String)
                .local(),
        )
        .action(
            ActionSchema::new("set_color")
                .require("path", ParamType::String)
                .require("color", LIST_OR_MAPPING),
        )
        .geometry("color", GeometryKind::Color)
        .hook(check_material)
}

fn check_material(_action: &str, params: &Map<String, Value>) -> Result<(), ValidationError> {
    if let Some(path) = params.get("path").and_then(Value::as_str) {
        validate_asset_path("path", path, Some(".mat"))?;
    }
    Ok(())
}

pub fn ui_tool() -> ToolSchema {
    ToolSchema::new("manage_ui", "Create UI elements and lay out their rects")
        .action(
            ActionSchema::new("create_element")
                .require("element_type", ParamType::String)
                .require("name", ParamType::String)
                .local(),
        )
        .action(
            ActionSchema::new("set_rect")
                .require("target", ParamType::String)
                .require("rect", LIST_OR_MAPPING),
        )
        .geometry("rect", GeometryKind::Rect)
        .geometry("anchor_min", GeometryKind::Vector2)
        .geometry("anchor_max", GeometryKind::Vector2)
        .geometry("pivot", GeometryKind::Vector2)
        .hook(check_ui)
}

fn check_ui(_action: &str, params: &Map<String, Value>) -> Result<(), ValidationError> {
    if let Some(kind) = params.get("element_type").and_then(Value::as_str) {
        validate_one_of("element_type", kind, UI_ELEMENT_TYPES)?;
    }
    if let Some(name) = params.get("name").and_then(Value::as_str) {
        validate_object_name("name", name)?;
    }
    // Vector2 params are already canonical here.
    for param in ["anchor_min", "anchor_max", "pivot"] {
        let Some(anchor) = params.get(param).and_then(Value::as_object) else {
            continue;
        };
        for field in ["x", "y"] {
            if let Some(v) = anchor.get(field).and_then(Value::as_f64) {
                validate_unit_range(param, field, v)?;
            }
        }
    }
    if let Some(rect) = params.get("rect").and_then(Value::as_object) {
        for field in ["width", "height"] {
            if rect.get(field).and_then(Value::as_f64).is_some_and(|v| v < 0.0) {
                return Err(ValidationError::for_param(
                    "rect",
                    format!("Parameter 'rect' field '{field}' must not be negative"),
                ));
            }
        }
    }
    Ok(())
}
