//! Helpers over the `hcl` syntax tree.
//!
//! The parser drops comments, so a document keeps its leading comment block
//! (the "generated by" banner the planning tool writes) separately and puts it
//! back when rendering.

use hcl::expr::TraversalOperator;
use hcl::{Attribute, Block, BlockLabel, Body, Expression, Structure};
use std::path::Path;

use crate::generate::error::{GenerateError, GenerateResult};
use crate::traits::{FileSystem, Output};

const EXPR_PLACEHOLDER: &str = "__expr";

/// Parsed configuration file
#[derive(Debug, Clone)]
pub struct Document {
    pub preamble: String,
    pub body: Body,
}

impl Document {
    pub fn parse(path: &Path, text: &str) -> GenerateResult<Self> {
        let body = hcl::parse(text).map_err(|e| GenerateError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Ok(Self {
            preamble: leading_comments(text),
            body,
        })
    }

    pub fn render(&self) -> GenerateResult<String> {
        let rendered = hcl::format::to_string(&self.body)?;
        Ok(format!("{}{}", self.preamble, rendered))
    }
}

fn leading_comments(text: &str) -> String {
    let mut preamble = String::new();
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("//") {
            preamble.push_str(line);
        } else {
            break;
        }
    }

    if preamble.trim().is_empty() {
        String::new()
    } else {
        preamble
    }
}

/// Read, transform and conditionally rewrite a configuration file.
///
/// The file is only written when the transform changed the tree and the
/// rendered bytes differ. Returns whether the file was rewritten.
pub fn postprocess_file<F>(
    fs: &dyn FileSystem,
    output: &dyn Output,
    path: &Path,
    transform: F,
) -> GenerateResult<bool>
where
    F: FnOnce(&mut Body) -> GenerateResult<()>,
{
    let text = fs.read_to_string(path)?;
    let mut document = Document::parse(path, &text)?;
    let original = document.body.clone();

    transform(&mut document.body)?;

    if document.body == original {
        return Ok(false);
    }

    write_if_changed(fs, output, path, &text, &document)
}

/// Render `document` and write it when it differs from `previous`
pub fn write_if_changed(
    fs: &dyn FileSystem,
    output: &dyn Output,
    path: &Path,
    previous: &str,
    document: &Document,
) -> GenerateResult<bool> {
    let rendered = document.render()?;
    if rendered == previous {
        return Ok(false);
    }

    output.dimmed(&format!("Updating file: {}", path.display()));
    fs.write(path, &rendered)?;
    Ok(true)
}

/// Parse a standalone expression
pub fn parse_expr(text: &str) -> GenerateResult<Expression> {
    let body = hcl::parse(&format!("{} = {}\n", EXPR_PLACEHOLDER, text)).map_err(|e| {
        GenerateError::InvalidInput(format!("invalid expression `{}`: {}", text, e))
    })?;

    body.attributes()
        .next()
        .map(|attr| attr.expr.clone())
        .ok_or_else(|| GenerateError::InvalidInput(format!("invalid expression `{}`", text)))
}

/// Render an expression the way it would appear on the right of `=`
pub fn render_expr(expr: &Expression) -> GenerateResult<String> {
    let body: Body = std::iter::once(Structure::Attribute(Attribute::new(
        EXPR_PLACEHOLDER,
        expr.clone(),
    )))
    .collect();
    let rendered = hcl::format::to_string(&body)?;
    let prefix = format!("{} = ", EXPR_PLACEHOLDER);

    Ok(rendered
        .trim_end()
        .strip_prefix(&prefix)
        .unwrap_or(rendered.trim_end())
        .to_string())
}

/// `root.attr1.attr2...` as an expression
pub fn traversal(root: &str, attrs: &[&str]) -> GenerateResult<Expression> {
    let mut text = root.to_string();
    for attr in attrs {
        text.push('.');
        text.push_str(attr);
    }
    parse_expr(&text)
}

/// Names along a plain attribute traversal, root first
pub fn traversal_path(expr: &Expression) -> Option<Vec<String>> {
    match expr {
        Expression::Variable(var) => Some(vec![var.as_str().to_string()]),
        Expression::Traversal(traversal) => {
            let Expression::Variable(root) = &traversal.expr else {
                return None;
            };
            let mut path = vec![root.as_str().to_string()];
            for operator in &traversal.operators {
                match operator {
                    TraversalOperator::GetAttr(ident) => path.push(ident.as_str().to_string()),
                    _ => return None,
                }
            }
            Some(path)
        }
        _ => None,
    }
}

pub fn label_str(label: &BlockLabel) -> &str {
    match label {
        BlockLabel::String(s) => s.as_str(),
        BlockLabel::Identifier(ident) => ident.as_str(),
    }
}

/// `(kind, name)` of a `resource "kind" "name"` block
pub fn resource_address(block: &Block) -> Option<(String, String)> {
    if block.identifier.as_str() != "resource" || block.labels.len() != 2 {
        return None;
    }
    Some((
        label_str(&block.labels[0]).to_string(),
        label_str(&block.labels[1]).to_string(),
    ))
}

/// Literal string value, if the expression is one
pub fn string_literal(expr: &Expression) -> Option<&str> {
    match expr {
        Expression::String(s) => Some(s.as_str()),
        _ => None,
    }
}

pub fn get_attribute<'a>(body: &'a Body, key: &str) -> Option<&'a Attribute> {
    body.attributes().find(|attr| attr.key.as_str() == key)
}

/// Replace an attribute's expression in place, or append it
pub fn set_attribute(body: &mut Body, key: &str, expr: Expression) {
    for structure in body.0.iter_mut() {
        if let Structure::Attribute(attr) = structure
            && attr.key.as_str() == key
        {
            attr.expr = expr;
            return;
        }
    }

    let position = body
        .0
        .iter()
        .position(|s| matches!(s, Structure::Block(_)))
        .unwrap_or(body.0.len());
    body.0.insert(
        position,
        Structure::Attribute(Attribute::new(key, expr)),
    );
}

/// Mutable access to every top-level block
pub fn blocks_mut(body: &mut Body) -> impl Iterator<Item = &mut Block> {
    body.0.iter_mut().filter_map(|s| match s {
        Structure::Block(block) => Some(block),
        _ => None,
    })
}

/// Apply `f` to every expression in the tree, innermost first
pub fn walk_expressions_mut<F>(body: &mut Body, f: &mut F)
where
    F: FnMut(&mut Expression),
{
    for structure in body.0.iter_mut() {
        match structure {
            Structure::Attribute(attr) => walk_expression_mut(&mut attr.expr, f),
            Structure::Block(block) => walk_expressions_mut(&mut block.body, f),
        }
    }
}

fn walk_expression_mut<F>(expr: &mut Expression, f: &mut F)
where
    F: FnMut(&mut Expression),
{
    match expr {
        Expression::Array(items) => {
            for item in items.iter_mut() {
                walk_expression_mut(item, f);
            }
        }
        Expression::Object(object) => {
            for (_, value) in object.iter_mut() {
                walk_expression_mut(value, f);
            }
        }
        Expression::FuncCall(call) => {
            for arg in call.args.iter_mut() {
                walk_expression_mut(arg, f);
            }
        }
        Expression::Parenthesis(inner) => walk_expression_mut(inner, f),
        _ => {}
    }
    f(expr);
}

/// Whether a name can be used as a bare identifier
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Collapse whitespace runs, so assertions do not depend on attribute alignment
#[cfg(test)]
pub fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
