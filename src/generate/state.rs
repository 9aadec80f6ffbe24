use std::collections::BTreeMap;

use hcl::{Expression, Identifier, ObjectKey};
use serde_json::Value as JsonValue;

use crate::generate::error::{GenerateError, GenerateResult};
use crate::syntax;

/// Structured attribute value as resolved by the planning tool
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Node count, used to tell large documents from small ones
    pub fn complexity(&self) -> usize {
        match self {
            Value::List(items) => 1 + items.iter().map(Value::complexity).sum::<usize>(),
            Value::Object(fields) => 1 + fields.values().map(Value::complexity).sum::<usize>(),
            _ => 1,
        }
    }

    /// Configuration-syntax literal for this value
    pub fn to_expression(&self) -> Expression {
        match self {
            Value::Null => Expression::Null,
            Value::Bool(b) => Expression::Bool(*b),
            Value::Number(n) => number_expression(n),
            Value::String(s) => Expression::String(s.clone()),
            Value::List(items) => {
                Expression::Array(items.iter().map(Value::to_expression).collect())
            }
            Value::Object(fields) => Expression::Object(
                fields
                    .iter()
                    .map(|(key, value)| (object_key(key), value.to_expression()))
                    .collect(),
            ),
        }
    }
}

fn number_expression(n: &serde_json::Number) -> Expression {
    if let Some(i) = n.as_i64() {
        Expression::Number(hcl::Number::from(i))
    } else if let Some(u) = n.as_u64() {
        Expression::Number(hcl::Number::from(u))
    } else {
        n.as_f64()
            .and_then(hcl::Number::from_f64)
            .map(Expression::Number)
            .unwrap_or(Expression::Null)
    }
}

fn object_key(key: &str) -> ObjectKey {
    if syntax::is_identifier(key) && !key.contains('-') {
        ObjectKey::Identifier(Identifier::from(key))
    } else {
        ObjectKey::Expression(Expression::String(key.to_string()))
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => Value::Number(n),
            JsonValue::String(s) => Value::String(s),
            JsonValue::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            JsonValue::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&Value> for JsonValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Number(n) => JsonValue::Number(n.clone()),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::List(items) => JsonValue::Array(items.iter().map(JsonValue::from).collect()),
            Value::Object(fields) => JsonValue::Object(
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), JsonValue::from(value)))
                    .collect(),
            ),
        }
    }
}

/// Fully resolved attribute map for one resource
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedResource {
    pub kind: String,
    pub name: String,
    pub attributes: BTreeMap<String, Value>,
}

impl PlannedResource {
    pub fn new(kind: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: Value) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }

    pub fn attribute(&self, key: &str) -> &Value {
        self.attributes.get(key).unwrap_or(&Value::Null)
    }
}

/// Planned resources of one plan, in plan order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlannedState {
    pub resources: Vec<PlannedResource>,
}

impl PlannedState {
    pub fn new(resources: Vec<PlannedResource>) -> Self {
        Self { resources }
    }

    /// Parse the JSON document printed by `show -json <planfile>`
    pub fn from_plan_json(json: &str) -> GenerateResult<Self> {
        let plan: JsonValue = serde_json::from_str(json)?;

        let Some(resources) = plan
            .pointer("/planned_values/root_module/resources")
            .and_then(JsonValue::as_array)
        else {
            return Ok(Self::default());
        };

        let mut planned = Vec::with_capacity(resources.len());
        for resource in resources {
            // Data sources and module-scoped resources do not map to generated blocks
            if resource.get("mode").and_then(JsonValue::as_str) == Some("data") {
                continue;
            }

            let (Some(kind), Some(name)) = (
                resource.get("type").and_then(JsonValue::as_str),
                resource.get("name").and_then(JsonValue::as_str),
            ) else {
                return Err(GenerateError::Serialization(
                    "planned resource without type or name".to_string(),
                ));
            };

            let attributes = match resource.get("values") {
                Some(JsonValue::Object(values)) => values
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::from(value.clone())))
                    .collect(),
                _ => BTreeMap::new(),
            };

            planned.push(PlannedResource {
                kind: kind.to_string(),
                name: name.to_string(),
                attributes,
            });
        }

        Ok(Self { resources: planned })
    }

    pub fn find(&self, kind: &str, name: &str) -> Option<&PlannedResource> {
        self.resources
            .iter()
            .find(|r| r.kind == kind && r.name == name)
    }

    pub fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a PlannedResource> + 'a {
        self.resources.iter().filter(move |r| r.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = r#"{
        "format_version": "1.2",
        "planned_values": {
            "root_module": {
                "resources": [
                    {
                        "address": "grafana_folder.team_a",
                        "mode": "managed",
                        "type": "grafana_folder",
                        "name": "team_a",
                        "values": {"uid": "abc", "title": "Team A", "org_id": "1", "parent_folder_uid": null}
                    },
                    {
                        "address": "data.grafana_org.current",
                        "mode": "data",
                        "type": "grafana_org",
                        "name": "current",
                        "values": {}
                    }
                ]
            }
        }
    }"#;

    #[test]
    fn test_from_plan_json() {
        let state = PlannedState::from_plan_json(PLAN).unwrap();

        assert_eq!(state.resources.len(), 1);
        let folder = state.find("grafana_folder", "team_a").unwrap();
        assert_eq!(folder.attribute("uid"), &Value::String("abc".to_string()));
        assert!(folder.attribute("parent_folder_uid").is_null());
        assert!(folder.attribute("missing").is_null());
    }

    #[test]
    fn test_from_plan_json_without_planned_values() {
        let state = PlannedState::from_plan_json(r#"{"format_version": "1.2"}"#).unwrap();
        assert!(state.resources.is_empty());
    }

    #[test]
    fn test_complexity() {
        let value = Value::from(serde_json::json!({"a": [1, 2], "b": {"c": null}}));
        // object + list + 2 numbers + object + null
        assert_eq!(value.complexity(), 6);
    }

    #[test]
    fn test_to_expression_renders_literal() {
        let value = Value::from(serde_json::json!({"title": "x", "panel-count": 2, "tags": []}));
        let rendered = syntax::squash(&syntax::render_expr(&value.to_expression()).unwrap());

        assert!(rendered.contains("\"panel-count\" = 2"));
        assert!(rendered.contains("title = \"x\""));
        assert!(rendered.contains("tags = []"));
    }
}
