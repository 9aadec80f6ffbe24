//! String attributes holding JSON documents.
//!
//! Small documents are rewritten as `jsonencode(...)` of the equivalent
//! object; large ones move to `files/` and are read back with `file(...)`.

use hcl::expr::FuncCall;
use hcl::{Body, Expression, Structure};
use serde::Serialize;
use serde_json::Value as JsonValue;
use serde_json::ser::PrettyFormatter;

use crate::generate::error::GenerateResult;
use crate::generate::state::Value;
use crate::syntax;

pub const DEFAULT_EXTRACT_THRESHOLD: usize = 100;
pub const FILES_DIR: &str = "files";

/// The document a string literal holds, when it is a JSON object
fn json_object(expr: &Expression) -> Option<Value> {
    let text = syntax::string_literal(expr)?;
    match serde_json::from_str::<JsonValue>(text) {
        Ok(json @ JsonValue::Object(_)) => Some(Value::from(json)),
        _ => None,
    }
}

fn jsonencode(value: &Value) -> Expression {
    Expression::from(
        FuncCall::builder("jsonencode")
            .arg(value.to_expression())
            .build(),
    )
}

/// Wrap JSON objects below `threshold` in `jsonencode`. Returns how many
/// attributes were rewritten.
pub fn wrap_json_fields(body: &mut Body, threshold: usize) -> usize {
    let mut wrapped = 0;

    for block in syntax::blocks_mut(body) {
        for structure in block.body.0.iter_mut() {
            let Structure::Attribute(attr) = structure else {
                continue;
            };
            if let Some(document) = json_object(&attr.expr)
                && document.complexity() < threshold
            {
                attr.expr = jsonencode(&document);
                wrapped += 1;
            }
        }
    }

    wrapped
}

/// A document moved out of the configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFile {
    /// Path relative to the output directory
    pub relative_path: String,
    pub contents: String,
}

/// Tab-indented JSON with a trailing newline
pub fn to_json_file(value: &Value) -> GenerateResult<String> {
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"\t");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    JsonValue::from(value).serialize(&mut serializer)?;

    let mut contents = String::from_utf8_lossy(&buffer).to_string();
    contents.push('\n');
    Ok(contents)
}

/// Move JSON objects at or above `threshold` to side files
pub fn extract_large_json(body: &mut Body, threshold: usize) -> GenerateResult<Vec<ExtractedFile>> {
    let mut extracted = Vec::new();

    for block in syntax::blocks_mut(body) {
        let Some((kind, name)) = syntax::resource_address(block) else {
            continue;
        };

        let large: Vec<(String, Value)> = block
            .body
            .attributes()
            .filter_map(|attr| {
                json_object(&attr.expr)
                    .filter(|document| document.complexity() >= threshold)
                    .map(|document| (attr.key.as_str().to_string(), document))
            })
            .collect();
        let several = large.len() > 1;

        for (key, document) in large {
            let relative_path = if several {
                format!("{}/{}-{}-{}.json", FILES_DIR, kind, name, key)
            } else {
                format!("{}/{}-{}.json", FILES_DIR, kind, name)
            };

            let reference = syntax::parse_expr(&format!(
                "file(\"${{path.module}}/{}\")",
                relative_path
            ))?;
            syntax::set_attribute(&mut block.body, &key, reference);

            extracted.push(ExtractedFile {
                relative_path,
                contents: to_json_file(&document)?,
            });
        }
    }

    Ok(extracted)
}
