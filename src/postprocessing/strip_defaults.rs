use hcl::{Attribute, Body, Expression, Structure};

use crate::syntax;

/// How an extra default is recognised
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultMatch {
    /// Remove the attribute whatever its value
    Always,
    /// Remove it when its expression renders exactly to this text
    Equals(String),
}

/// An attribute known to hold a provider-side default
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultRule {
    pub attribute: String,
    pub matches: DefaultMatch,
}

impl DefaultRule {
    pub fn always(attribute: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
            matches: DefaultMatch::Always,
        }
    }

    pub fn equals(attribute: &str, rendered: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
            matches: DefaultMatch::Equals(rendered.to_string()),
        }
    }

    fn removes(&self, attr: &Attribute) -> bool {
        if attr.key.as_str() != self.attribute {
            return false;
        }
        match &self.matches {
            DefaultMatch::Always => true,
            DefaultMatch::Equals(text) => {
                syntax::render_expr(&attr.expr).is_ok_and(|rendered| &rendered == text)
            }
        }
    }
}

fn is_empty_value(expr: &Expression) -> bool {
    match expr {
        Expression::Null => true,
        Expression::Array(items) => items.is_empty(),
        Expression::Object(fields) => fields.is_empty(),
        Expression::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Strip empty values and `extras` from every top-level block
pub fn strip_defaults(body: &mut Body, extras: &[DefaultRule]) {
    for block in syntax::blocks_mut(body) {
        strip_body(&mut block.body, extras);
    }
}

fn strip_body(body: &mut Body, extras: &[DefaultRule]) {
    body.0.retain_mut(|structure| match structure {
        Structure::Attribute(attr) => {
            !is_empty_value(&attr.expr) && !extras.iter().any(|rule| rule.removes(attr))
        }
        Structure::Block(block) => {
            strip_body(&mut block.body, extras);
            !block.body.0.is_empty()
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: &str = r#"
resource "grafana_rule_group" "alerts" {
  name        = "alerts"
  description = ""
  org_id      = "1"
  labels      = {}
  annotations = []
  folder_uid  = null
  rule {
    name = "cpu"
    notification_settings {
      group_by = []
    }
    data {
      model                          = "{}"
      missing_series_evals_to_resolve = 0
    }
  }
}
"#;

    fn extras() -> Vec<DefaultRule> {
        vec![
            DefaultRule::equals("org_id", "\"1\""),
            DefaultRule::equals("missing_series_evals_to_resolve", "0"),
        ]
    }

    #[test]
    fn test_strip_defaults() {
        let mut body = hcl::parse(FILE).unwrap();
        strip_defaults(&mut body, &extras());

        let rendered = syntax::squash(&hcl::format::to_string(&body).unwrap());
        assert!(rendered.contains("name = \"alerts\""));
        assert!(!rendered.contains("description"));
        assert!(!rendered.contains("org_id"));
        assert!(!rendered.contains("labels"));
        assert!(!rendered.contains("annotations"));
        assert!(!rendered.contains("folder_uid"));
        assert!(!rendered.contains("notification_settings"));
        assert!(!rendered.contains("missing_series_evals_to_resolve"));
        assert!(rendered.contains("data { model = \"{}\" }"));
    }

    #[test]
    fn test_extra_value_must_match() {
        let mut body = hcl::parse("resource \"a\" \"b\" {\n  org_id = \"2\"\n}\n").unwrap();
        strip_defaults(&mut body, &extras());
        assert!(syntax::get_attribute(&body.blocks().next().unwrap().body, "org_id").is_some());

        strip_defaults(&mut body, &[DefaultRule::always("org_id")]);
        assert!(syntax::get_attribute(&body.blocks().next().unwrap().body, "org_id").is_none());
    }

    #[test]
    fn test_top_level_blocks_are_kept() {
        let mut body = hcl::parse("resource \"a\" \"b\" {\n  x = null\n}\n").unwrap();
        strip_defaults(&mut body, &[]);
        assert_eq!(body.blocks().count(), 1);
    }

    #[test]
    fn test_strip_defaults_is_idempotent() {
        let mut once = hcl::parse(FILE).unwrap();
        strip_defaults(&mut once, &extras());
        let mut twice = once.clone();
        strip_defaults(&mut twice, &extras());

        assert_eq!(once, twice);
    }
}
