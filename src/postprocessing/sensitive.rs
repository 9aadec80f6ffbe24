use hcl::{Body, Expression};

use crate::registry::Registry;
use crate::syntax;

pub const SENSITIVE_PLACEHOLDER: &str = "SENSITIVE_VALUE_TO_REPLACE";

/// Put a placeholder in every sensitive attribute a resource cannot be
/// created without. Returns how many attributes were set.
pub fn replace_sensitive(body: &mut Body, registry: &Registry) -> usize {
    let mut replaced = 0;

    for block in syntax::blocks_mut(body) {
        let Some((kind, _)) = syntax::resource_address(block) else {
            continue;
        };
        let Some(descriptor) = registry.find(&kind) else {
            continue;
        };

        for field in &descriptor.sensitive_required_fields {
            let placeholder = Expression::String(SENSITIVE_PLACEHOLDER.to_string());
            let current = syntax::get_attribute(&block.body, field).map(|a| &a.expr);
            if current != Some(&placeholder) {
                syntax::set_attribute(&mut block.body, field, placeholder);
                replaced += 1;
            }
        }
    }

    replaced
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::catalog;

    const FILE: &str = r#"
resource "grafana_user" "alice" {
  login    = "alice"
  email    = "alice@example.com"
  password = "hunter2"
}

resource "grafana_user" "bob" {
  login = "bob"
}

resource "grafana_folder" "f" {
  title = "F"
}
"#;

    #[test]
    fn test_sensitive_values_are_replaced() {
        let mut body = hcl::parse(FILE).unwrap();
        let replaced = replace_sensitive(&mut body, &catalog::grafana());

        assert_eq!(replaced, 2);
        let rendered = hcl::format::to_string(&body).unwrap();
        assert!(!rendered.contains("hunter2"));
        assert_eq!(rendered.matches(SENSITIVE_PLACEHOLDER).count(), 2);
    }

    #[test]
    fn test_replace_sensitive_is_idempotent() {
        let mut once = hcl::parse(FILE).unwrap();
        replace_sensitive(&mut once, &catalog::grafana());
        let mut twice = once.clone();

        assert_eq!(replace_sensitive(&mut twice, &catalog::grafana()), 0);
        assert_eq!(once, twice);
    }
}
