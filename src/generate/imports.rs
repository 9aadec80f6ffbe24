//! Import blocks and provider files.

use std::collections::BTreeSet;
use std::path::Path;

use hcl::{Block, Body, Structure};
use lazy_static::lazy_static;
use regex::Regex;

use crate::generate::discovery::DiscoveredKind;
use crate::generate::error::GenerateResult;
use crate::generate::state::Value;
use crate::syntax::{self, Document};
use crate::traits::FileSystem;

pub const CLOUD_SCOPE: &str = "cloud";
pub const PROVIDER_NAME: &str = "grafana";
pub const PROVIDER_SOURCE: &str = "grafana/grafana";
pub const DEFAULT_CLOUD_API_URL: &str = "https://grafana.com";

const NO_RESOURCES: &str = "# No resources found\n";

lazy_static! {
    static ref INVALID_NAME_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9_-]").expect("Invalid name pattern regex");
}

/// `terraform import` style statement
#[derive(Debug, Clone, PartialEq)]
pub struct ImportStatement {
    pub kind: String,
    pub name: String,
    pub id: String,
    pub provider: Option<String>,
}

pub fn imports_file(scope: &str) -> String {
    format!("{}-imports.tf", scope)
}

pub fn resources_file(scope: &str) -> String {
    format!("{}-resources.tf", scope)
}

pub fn provider_file(scope: &str) -> String {
    format!("{}-provider.tf", scope)
}

/// Prefix that keeps local names unique across scopes sharing a directory
pub fn scope_prefix(scope: &str) -> String {
    if scope == CLOUD_SCOPE {
        String::new()
    } else {
        format!("{}_", scope.replace('-', "_"))
    }
}

/// Local name of the block an identifier is imported into
pub fn import_name(scope: &str, id: &str) -> String {
    let name = format!(
        "{}{}",
        scope_prefix(scope),
        INVALID_NAME_CHARS.replace_all(id, "_")
    );
    match name.chars().next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => name,
        _ => format!("_{}", name),
    }
}

/// One statement per discovered identifier, kinds in order. Identifiers
/// that sanitize to the same name get `_2`, `_3`, ... appended.
pub fn import_statements(scope: &str, kinds: &[DiscoveredKind]) -> Vec<ImportStatement> {
    let mut statements = Vec::new();
    for discovered in kinds {
        let mut taken = BTreeSet::new();
        for id in &discovered.ids {
            let base = import_name(scope, id);
            let mut name = base.clone();
            let mut suffix = 2;
            while taken.contains(&name) {
                name = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            taken.insert(name.clone());

            statements.push(ImportStatement {
                kind: discovered.kind.clone(),
                name,
                id: id.clone(),
                provider: Some(format!("{}.{}", PROVIDER_NAME, scope)),
            });
        }
    }
    statements
}

fn import_block(statement: &ImportStatement) -> GenerateResult<Block> {
    let mut builder = Block::builder("import");
    if let Some(provider) = &statement.provider {
        builder = builder.add_attribute(("provider", syntax::parse_expr(provider)?));
    }

    Ok(builder
        .add_attribute((
            "to",
            syntax::traversal(&statement.kind, &[statement.name.as_str()])?,
        ))
        .add_attribute(("id", statement.id.as_str()))
        .build())
}

pub fn render_imports(statements: &[ImportStatement]) -> GenerateResult<String> {
    let body = statements
        .iter()
        .map(|s| import_block(s).map(Structure::Block))
        .collect::<GenerateResult<Body>>()?;

    Document {
        preamble: String::new(),
        body,
    }
    .render()
}

pub fn write_imports(
    fs: &dyn FileSystem,
    dir: &Path,
    scope: &str,
    statements: &[ImportStatement],
) -> GenerateResult<()> {
    fs.write(&dir.join(imports_file(scope)), &render_imports(statements)?)?;
    Ok(())
}

/// Stand-in files for a scope that has nothing to import
pub fn write_placeholders(fs: &dyn FileSystem, dir: &Path, scope: &str) -> GenerateResult<()> {
    fs.write(&dir.join(imports_file(scope)), NO_RESOURCES)?;
    fs.write(&dir.join(resources_file(scope)), NO_RESOURCES)?;
    Ok(())
}

/// `provider.tf`: the provider requirement shared by every scope
pub fn render_required_providers(version: &str) -> GenerateResult<String> {
    let requirement = Value::Object(
        [
            ("source".to_string(), Value::String(PROVIDER_SOURCE.to_string())),
            ("version".to_string(), Value::String(version.to_string())),
        ]
        .into_iter()
        .collect(),
    );

    let required_providers = Block::builder("required_providers")
        .add_attribute((PROVIDER_NAME, requirement.to_expression()))
        .build();
    let terraform = Block::builder("terraform")
        .add_block(required_providers)
        .build();

    render_body(std::iter::once(Structure::Block(terraform)).collect())
}

/// Connection settings of one provider scope
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderSettings {
    Cloud {
        access_policy_token: String,
        api_url: String,
    },
    Instance {
        url: String,
        auth: String,
    },
}

/// `<scope>-provider.tf`: the aliased provider block of one scope
pub fn render_provider(scope: &str, settings: &ProviderSettings) -> GenerateResult<String> {
    let mut builder = Block::builder("provider")
        .add_label(PROVIDER_NAME)
        .add_attribute(("alias", scope));

    match settings {
        ProviderSettings::Cloud {
            access_policy_token,
            api_url,
        } => {
            builder = builder.add_attribute(("cloud_access_policy_token", access_policy_token.as_str()));
            if api_url.trim_end_matches('/') != DEFAULT_CLOUD_API_URL {
                builder = builder.add_attribute(("cloud_api_url", api_url.as_str()));
            }
        }
        ProviderSettings::Instance { url, auth } => {
            builder = builder
                .add_attribute(("url", url.as_str()))
                .add_attribute(("auth", auth.as_str()));
        }
    }

    render_body(std::iter::once(Structure::Block(builder.build())).collect())
}

fn render_body(body: Body) -> GenerateResult<String> {
    Document {
        preamble: String::new(),
        body,
    }
    .render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockFileSystem;

    #[test]
    fn test_import_name() {
        assert_eq!(import_name("cloud", "eu-stack-1"), "eu-stack-1");
        assert_eq!(import_name("cloud", "eu:policy/1"), "eu_policy_1");
        assert_eq!(import_name("cloud", "1abc"), "_1abc");
        assert_eq!(import_name("my-grafana_net", "abc"), "my_grafana_net_abc");
        assert_eq!(import_name("localhost", "1:12"), "localhost_1_12");
    }

    #[test]
    fn test_render_imports() {
        let kinds = vec![DiscoveredKind {
            kind: "grafana_folder".to_string(),
            ids: vec!["abc".to_string()],
        }];
        let rendered = render_imports(&import_statements("localhost", &kinds)).unwrap();
        let squashed = syntax::squash(&rendered);

        assert!(squashed.contains("import {"));
        assert!(squashed.contains("provider = grafana.localhost"));
        assert!(squashed.contains("to = grafana_folder.localhost_abc"));
        assert!(squashed.contains("id = \"abc\""));

        // Re-parses into the same statements
        let body = hcl::parse(&rendered).unwrap();
        assert_eq!(body.blocks().count(), 1);
    }

    #[test]
    fn test_colliding_names_get_suffixes() {
        let kinds = vec![
            DiscoveredKind {
                kind: "grafana_folder".to_string(),
                ids: vec!["a.b".to_string(), "a_b".to_string(), "a:b".to_string()],
            },
            DiscoveredKind {
                kind: "grafana_team".to_string(),
                ids: vec!["a_b".to_string()],
            },
        ];
        let statements = import_statements("cloud", &kinds);
        let names: Vec<&str> = statements.iter().map(|s| s.name.as_str()).collect();

        assert_eq!(names, vec!["a_b", "a_b_2", "a_b_3", "a_b"]);
        assert_eq!(statements[1].id, "a_b");

        let rendered = syntax::squash(&render_imports(&statements).unwrap());
        assert!(rendered.contains("to = grafana_folder.a_b_2"));
        assert!(rendered.contains("to = grafana_folder.a_b_3"));
    }

    #[test]
    fn test_placeholders() {
        let fs = MockFileSystem::new();
        write_placeholders(&fs, Path::new("/out"), "cloud").unwrap();

        assert_eq!(
            fs.get_file_contents(Path::new("/out/cloud-imports.tf")).unwrap(),
            NO_RESOURCES
        );
        assert!(fs.has_file(Path::new("/out/cloud-resources.tf")));
    }

    #[test]
    fn test_required_providers() {
        let rendered = render_required_providers("3.0.0").unwrap();
        let body = hcl::parse(&rendered).unwrap();
        let rendered = syntax::squash(&rendered);
        let terraform = body.blocks().next().unwrap();

        assert_eq!(terraform.identifier.as_str(), "terraform");
        assert!(rendered.contains("source = \"grafana/grafana\""));
        assert!(rendered.contains("version = \"3.0.0\""));
    }

    #[test]
    fn test_provider_blocks() {
        let cloud = render_provider(
            "cloud",
            &ProviderSettings::Cloud {
                access_policy_token: "glc_x".to_string(),
                api_url: "https://grafana.com/".to_string(),
            },
        )
        .unwrap();
        let cloud = syntax::squash(&cloud);
        assert!(cloud.contains("provider \"grafana\""));
        assert!(cloud.contains("alias = \"cloud\""));
        assert!(cloud.contains("cloud_access_policy_token = \"glc_x\""));
        assert!(!cloud.contains("cloud_api_url"));

        let instance = render_provider(
            "localhost",
            &ProviderSettings::Instance {
                url: "http://localhost:3000".to_string(),
                auth: "admin:admin".to_string(),
            },
        )
        .unwrap();
        let instance = syntax::squash(&instance);
        assert!(instance.contains("url = \"http://localhost:3000\""));
        assert!(instance.contains("auth = \"admin:admin\""));
    }
}
