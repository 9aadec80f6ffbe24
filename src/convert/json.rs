//! `.tf` to `.tf.json` conversion.
//!
//! Labelled blocks nest by label and block bodies are arrays. Anything that
//! is not a literal becomes a `"${...}"` string.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use hcl::expr::TemplateExpr;
use hcl::{Body, Expression, ObjectKey, Structure};
use serde_json::{Map, Value as JsonValue};

use crate::generate::error::GenerateResult;
use crate::syntax::{self, Document};
use crate::traits::{FileSystem, Output};

/// Attributes whose traversal is written without the `${ }` wrapper
const BARE_TRAVERSALS: [&str; 2] = ["provider", "to"];

pub fn body_to_json(body: &Body) -> GenerateResult<Map<String, JsonValue>> {
    let mut object = Map::new();

    for structure in body.0.iter() {
        match structure {
            Structure::Attribute(attr) => {
                let key = attr.key.as_str();
                let value = if BARE_TRAVERSALS.contains(&key)
                    && syntax::traversal_path(&attr.expr).is_some()
                {
                    JsonValue::String(syntax::render_expr(&attr.expr)?)
                } else {
                    expr_to_json(&attr.expr)?
                };
                object.insert(key.to_string(), value);
            }
            Structure::Block(block) => {
                let mut path = vec![block.identifier.as_str().to_string()];
                path.extend(block.labels.iter().map(|l| syntax::label_str(l).to_string()));
                insert_block(&mut object, &path, JsonValue::Object(body_to_json(&block.body)?));
            }
        }
    }

    Ok(object)
}

fn insert_block(target: &mut Map<String, JsonValue>, path: &[String], body: JsonValue) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };

    if rest.is_empty() {
        let entry = target
            .entry(first.clone())
            .or_insert_with(|| JsonValue::Array(Vec::new()));
        if let JsonValue::Array(items) = entry {
            items.push(body);
        }
    } else {
        let entry = target
            .entry(first.clone())
            .or_insert_with(|| JsonValue::Object(Map::new()));
        if let JsonValue::Object(inner) = entry {
            insert_block(inner, rest, body);
        }
    }
}

fn interpolated(expr: &Expression) -> GenerateResult<JsonValue> {
    Ok(JsonValue::String(format!("${{{}}}", syntax::render_expr(expr)?)))
}

fn object_key(key: &ObjectKey) -> GenerateResult<String> {
    if let ObjectKey::Identifier(ident) = key {
        return Ok(ident.as_str().to_string());
    }
    if let ObjectKey::Expression(Expression::String(s)) = key {
        return Ok(s.clone());
    }
    if let ObjectKey::Expression(expr) = key
        && let JsonValue::String(text) = interpolated(expr)?
    {
        return Ok(text);
    }
    Ok(String::new())
}

pub fn expr_to_json(expr: &Expression) -> GenerateResult<JsonValue> {
    let value = match expr {
        Expression::Null => JsonValue::Null,
        Expression::Bool(b) => JsonValue::Bool(*b),
        Expression::Number(n) => serde_json::to_value(n)?,
        // Literal `${` has to be escaped in the JSON syntax
        Expression::String(s) => JsonValue::String(s.replace("${", "$${").replace("%{", "%%{")),
        Expression::Array(items) => JsonValue::Array(
            items
                .iter()
                .map(expr_to_json)
                .collect::<GenerateResult<Vec<_>>>()?,
        ),
        Expression::Object(fields) => {
            let mut object = Map::new();
            for (key, value) in fields.iter() {
                object.insert(object_key(key)?, expr_to_json(value)?);
            }
            JsonValue::Object(object)
        }
        Expression::TemplateExpr(template) => {
            if let TemplateExpr::QuotedString(text) = template.as_ref() {
                JsonValue::String(text.clone())
            } else {
                interpolated(expr)?
            }
        }
        other => interpolated(other)?,
    };
    Ok(value)
}

fn json_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".json");
    PathBuf::from(name)
}

/// Convert one file, replacing it with `<file>.json`
pub fn convert_file(fs: &dyn FileSystem, path: &Path) -> GenerateResult<PathBuf> {
    let text = fs.read_to_string(path)?;
    let document = Document::parse(path, &text)?;

    let mut contents = serde_json::to_string_pretty(&JsonValue::Object(body_to_json(&document.body)?))?;
    contents.push('\n');

    let target = json_path(path);
    fs.write(&target, &contents)?;
    fs.remove_file(path)?;
    Ok(target)
}

/// Convert every top-level `.tf` file of `dir`. Returns how many were converted.
pub fn convert_dir(fs: &dyn FileSystem, output: &dyn Output, dir: &Path) -> GenerateResult<usize> {
    let mut converted = 0;

    for path in fs.read_dir(dir)? {
        if !fs.is_file(&path) || path.extension().is_none_or(|ext| ext != "tf") {
            continue;
        }
        let target = convert_file(fs, &path)?;
        output.dimmed(&format!("Converted {} to {}", path.display(), target.display()));
        converted += 1;
    }

    output.success(&format!("Converted {} file(s) to JSON", converted));
    Ok(converted)
}
