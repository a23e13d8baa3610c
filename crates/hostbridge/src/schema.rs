//! Static per-tool, per-action parameter schemas.
//!
//! Every tool is described by one `ToolSchema`: its actions with their
//! required parameters, the parameters that go through a geometry converter,
//! and an optional hook for domain rules. Schemas live in a `ToolRegistry`
//! and are never mutated after construction.

use crate::convert::GeometryKind;
use crate::error::ValidationError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Expected JSON type of a required parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    /// Any JSON number, integer or float
    Number,
    Boolean,
    List,
    Mapping,
    AnyOf(&'static [ParamType]),
}

impl ParamType {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::List => value.is_array(),
            ParamType::Mapping => value.is_object(),
            ParamType::AnyOf(types) => types.iter().any(|t| t.matches(value)),
        }
    }

    pub fn name(&self) -> String {
        match self {
            ParamType::String => "string".to_string(),
            ParamType::Integer => "integer".to_string(),
            ParamType::Number => "number".to_string(),
            ParamType::Boolean => "boolean".to_string(),
            ParamType::List => "list".to_string(),
            ParamType::Mapping => "mapping".to_string(),
            ParamType::AnyOf(types) => types
                .iter()
                .map(|t| t.name())
                .collect::<Vec<_>>()
                .join(" or "),
        }
    }
}

/// Type name of a JSON value as used in validation messages.
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

/// Domain rules for one tool, run after type checks and geometry conversion.
pub type ValidationHook =
    fn(action: &str, params: &Map<String, Value>) -> Result<(), ValidationError>;

/// Required parameters of one `(tool, action)` pair.
#[derive(Debug, Clone)]
pub struct ActionSchema {
    pub action: &'static str,
    pub required: Vec<(&'static str, ParamType)>,
    /// Validate-only requests for this action can be answered without the host.
    pub locally_verifiable: bool,
}

impl ActionSchema {
    pub fn new(action: &'static str) -> Self {
        Self {
            action,
            required: Vec::new(),
            locally_verifiable: false,
        }
    }

    pub fn require(mut self, name: &'static str, ty: ParamType) -> Self {
        self.required.push((name, ty));
        self
    }

    pub fn local(mut self) -> Self {
        self.locally_verifiable = true;
        self
    }
}

/// Everything the validator needs to know about one tool.
#[derive(Clone)]
pub struct ToolSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub actions: Vec<ActionSchema>,
    pub geometry: Vec<(&'static str, GeometryKind)>,
    pub hook: Option<ValidationHook>,
}

impl std::fmt::Debug for ToolSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSchema")
            .field("name", &self.name)
            .field("actions", &self.actions)
            .field("geometry", &self.geometry)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

impl ToolSchema {
    pub fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            actions: Vec::new(),
            geometry: Vec::new(),
            hook: None,
        }
    }

    pub fn action(mut self, action: ActionSchema) -> Self {
        self.actions.push(action);
        self
    }

    pub fn geometry(mut self, param: &'static str, kind: GeometryKind) -> Self {
        self.geometry.push((param, kind));
        self
    }

    pub fn hook(mut self, hook: ValidationHook) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn find_action(&self, action: &str) -> Option<&ActionSchema> {
        self.actions.iter().find(|a| a.action == action)
    }

    pub fn geometry_kind(&self, param: &str) -> Option<GeometryKind> {
        self.geometry
            .iter()
            .find(|(name, _)| *name == param)
            .map(|(_, kind)| *kind)
    }

    /// Unknown actions are never locally verifiable.
    pub fn is_locally_verifiable(&self, action: &str) -> bool {
        self.find_action(action)
            .is_some_and(|a| a.locally_verifiable)
    }
}

/// Lookup table of tool schemas keyed by tool name.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, ToolSchema>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in editor tools.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for tool in crate::tools::builtin_tools() {
            registry.register(tool);
        }
        registry
    }

    /// Add or replace a tool schema.
    pub fn register(&mut self, tool: ToolSchema) {
        let name = tool.name;
        if self.tools.insert(name, tool).is_some() {
            log::debug!("Replaced existing schema for tool '{}'", name);
        }
    }

    pub fn get(&self, tool: &str) -> Option<&ToolSchema> {
        self.tools.get(tool)
    }

    pub fn tools(&self) -> impl Iterator<Item = &ToolSchema> {
        self.tools.values()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
