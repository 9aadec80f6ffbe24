//! Rename resource blocks after a human-readable attribute.
//!
//! Renames cover the resources file and the imports file together: block
//! labels, import targets and every traversal through the old address.

use std::collections::{BTreeMap, BTreeSet};

use hcl::{Body, Expression};

use crate::generate::error::GenerateResult;
use crate::generate::imports::scope_prefix;
use crate::registry::Registry;
use crate::syntax;

type Address = (String, String);

/// Lowercase, non-alphanumerics to `_`, no leading or trailing `_`
pub fn normalize_name(value: &str) -> String {
    let mapped: String = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    mapped.trim_matches('_').to_string()
}

fn preferred_name(scope: &str, value: &str) -> Option<String> {
    let normalized = normalize_name(value);
    if normalized.is_empty() {
        return None;
    }
    let name = format!("{}{}", scope_prefix(scope), normalized);
    if syntax::is_identifier(&name) {
        Some(name)
    } else {
        Some(format!("_{}", name))
    }
}

/// Renames that can be applied without colliding with an existing name
fn plan_renames(resources: &Body, registry: &Registry, scope: &str) -> BTreeMap<Address, String> {
    let mut taken: BTreeSet<Address> = resources
        .blocks()
        .filter_map(syntax::resource_address)
        .collect();
    let mut renames = BTreeMap::new();

    for block in resources.blocks() {
        let Some((kind, name)) = syntax::resource_address(block) else {
            continue;
        };
        let Some(field) = registry
            .find(&kind)
            .and_then(|descriptor| descriptor.preferred_name_field)
        else {
            continue;
        };
        let Some(value) = syntax::get_attribute(&block.body, field)
            .and_then(|attr| syntax::string_literal(&attr.expr))
        else {
            continue;
        };
        let Some(new_name) = preferred_name(scope, value) else {
            continue;
        };

        if new_name == name || taken.contains(&(kind.clone(), new_name.clone())) {
            continue;
        }
        taken.insert((kind.clone(), new_name.clone()));
        renames.insert((kind, name), new_name);
    }

    renames
}

fn apply_renames(body: &mut Body, renames: &BTreeMap<Address, String>) -> GenerateResult<()> {
    for block in syntax::blocks_mut(body) {
        if let Some((kind, name)) = syntax::resource_address(block)
            && let Some(new_name) = renames.get(&(kind, name))
        {
            block.labels[1] = hcl::BlockLabel::from(new_name.as_str());
        }
    }

    let mut error = None;
    syntax::walk_expressions_mut(body, &mut |expr: &mut Expression| {
        if error.is_some() {
            return;
        }
        let Some(path) = syntax::traversal_path(expr) else {
            return;
        };
        if path.len() < 2 {
            return;
        }
        let Some(new_name) = renames.get(&(path[0].clone(), path[1].clone())) else {
            return;
        };

        let mut attrs: Vec<&str> = vec![new_name.as_str()];
        attrs.extend(path[2..].iter().map(String::as_str));
        match syntax::traversal(&path[0], &attrs) {
            Ok(renamed) => *expr = renamed,
            Err(e) => error = Some(e),
        }
    });

    match error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Rename blocks of kinds with a preferred name field, rewriting both files.
/// Returns how many blocks were renamed.
pub fn apply_preferred_names(
    resources: &mut Body,
    imports: &mut Body,
    registry: &Registry,
    scope: &str,
) -> GenerateResult<usize> {
    let mut renamed = 0;

    // A rename can free a name another block prefers, so repeat until stable
    loop {
        let renames = plan_renames(resources, registry, scope);
        if renames.is_empty() {
            return Ok(renamed);
        }
        apply_renames(resources, &renames)?;
        apply_renames(imports, &renames)?;
        renamed += renames.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::catalog;

    const RESOURCES: &str = r#"
resource "grafana_folder" "localhost_abc" {
  uid   = "abc"
  title = "Team A!"
}

resource "grafana_folder" "localhost_def" {
  uid               = "def"
  title             = "Child"
  parent_folder_uid = grafana_folder.localhost_abc.uid
}
"#;

    const IMPORTS: &str = r#"
import {
  provider = grafana.localhost
  to       = grafana_folder.localhost_abc
  id       = "abc"
}

import {
  provider = grafana.localhost
  to       = grafana_folder.localhost_def
  id       = "def"
}
"#;

    fn run(resources: &str, imports: &str) -> (Body, Body, usize) {
        let mut resources = hcl::parse(resources).unwrap();
        let mut imports = hcl::parse(imports).unwrap();
        let renamed =
            apply_preferred_names(&mut resources, &mut imports, &catalog::grafana(), "localhost").unwrap();
        (resources, imports, renamed)
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Team A!"), "team_a");
        assert_eq!(normalize_name("eu-stack-1"), "eu_stack_1");
        assert_eq!(normalize_name("--"), "");
    }

    #[test]
    fn test_blocks_imports_and_references_are_renamed() {
        let (resources, imports, renamed) = run(RESOURCES, IMPORTS);
        assert_eq!(renamed, 2);

        let resources = syntax::squash(&hcl::format::to_string(&resources).unwrap());
        assert!(resources.contains("resource \"grafana_folder\" \"localhost_team_a\""));
        assert!(resources.contains("resource \"grafana_folder\" \"localhost_child\""));
        assert!(resources.contains("parent_folder_uid = grafana_folder.localhost_team_a.uid"));

        let imports = syntax::squash(&hcl::format::to_string(&imports).unwrap());
        assert!(imports.contains("to = grafana_folder.localhost_team_a"));
        assert!(imports.contains("to = grafana_folder.localhost_child"));
        assert!(!imports.contains("localhost_abc"));
    }

    #[test]
    fn test_collision_keeps_old_name() {
        let resources = r#"
resource "grafana_folder" "localhost_a" {
  title = "Same"
}

resource "grafana_folder" "localhost_b" {
  title = "Same"
}
"#;
        let (resources, _, renamed) = run(resources, "");
        assert_eq!(renamed, 1);

        let names: Vec<String> = resources
            .blocks()
            .filter_map(syntax::resource_address)
            .map(|(_, name)| name)
            .collect();
        assert_eq!(names, vec!["localhost_same", "localhost_b"]);
    }

    #[test]
    fn test_freed_name_is_reused() {
        let resources = r#"
resource "grafana_folder" "localhost_x" {
  title = "Y"
}

resource "grafana_folder" "localhost_y" {
  title = "Z"
}
"#;
        let (resources, _, _) = run(resources, "");

        let names: Vec<String> = resources
            .blocks()
            .filter_map(syntax::resource_address)
            .map(|(_, name)| name)
            .collect();
        assert_eq!(names, vec!["localhost_y", "localhost_z"]);
    }

    #[test]
    fn test_apply_preferred_names_is_idempotent() {
        let (mut resources, mut imports, _) = run(RESOURCES, IMPORTS);
        let (before_resources, before_imports) = (resources.clone(), imports.clone());

        let renamed =
            apply_preferred_names(&mut resources, &mut imports, &catalog::grafana(), "localhost").unwrap();

        assert_eq!(renamed, 0);
        assert_eq!(resources, before_resources);
        assert_eq!(imports, before_imports);
    }
}
