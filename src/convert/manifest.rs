//! Crossplane manifests built from the planned state.
//!
//! The final configuration decides which fields each manifest carries; the
//! planned state provides their values, so references come out resolved.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use hcl::{Body, Structure};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::generate::error::{GenerateError, GenerateResult};
use crate::generate::state::{PlannedResource, PlannedState, Value};
use crate::registry::{Category, Registry};
use crate::syntax::{self, Document};
use crate::traits::{FileSystem, Output};

pub const PROVIDER_CONFIG_NAME: &str = "grafana-provider";
const EXTERNAL_NAME_ANNOTATION: &str = "crossplane.io/external-name";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProviderConfig {
    api_version: &'static str,
    kind: &'static str,
    metadata: Metadata,
    spec: ProviderConfigSpec,
}

#[derive(Debug, Serialize)]
struct ProviderConfigSpec {
    credentials: Credentials,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Credentials {
    source: &'static str,
    secret_ref: SecretRef,
}

#[derive(Debug, Serialize)]
struct SecretRef {
    namespace: &'static str,
    name: &'static str,
    key: &'static str,
}

#[derive(Debug, Serialize)]
struct Metadata {
    name: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    annotations: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    api_version: String,
    kind: String,
    metadata: Metadata,
    spec: ManifestSpec,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ManifestSpec {
    for_provider: Map<String, JsonValue>,
    provider_config_ref: ConfigRef,
}

#[derive(Debug, Serialize)]
struct ConfigRef {
    name: String,
}

fn provider_config() -> ProviderConfig {
    ProviderConfig {
        api_version: "grafana.crossplane.io/v1beta1",
        kind: "ProviderConfig",
        metadata: Metadata {
            name: PROVIDER_CONFIG_NAME.to_string(),
            annotations: BTreeMap::new(),
        },
        spec: ProviderConfigSpec {
            credentials: Credentials {
                source: "Secret",
                secret_ref: SecretRef {
                    namespace: "crossplane",
                    name: PROVIDER_CONFIG_NAME,
                    key: "credentials",
                },
            },
        },
    }
}

/// `snake_case` to `camelCase`
pub fn to_camel_case(s: &str) -> String {
    let mut camel = String::with_capacity(s.len());
    let mut upper = false;
    for c in s.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            camel.extend(c.to_uppercase());
            upper = false;
        } else {
            camel.push(c);
        }
    }
    camel
}

pub fn api_group(category: Option<Category>) -> &'static str {
    match category {
        Some(Category::Cloud) => "cloud",
        Some(Category::SyntheticMonitoring) => "sm",
        Some(Category::Slo) => "slo",
        Some(Category::Alerting) => "alerting",
        Some(Category::MachineLearning) => "ml",
        Some(Category::OnCall) => "oncall",
        Some(Category::GrafanaEnterprise) => "enterprise",
        _ => "oss",
    }
}

/// Kind without the provider prefix of its category
fn strip_kind_prefix(kind: &str, category: Option<Category>) -> &str {
    let prefix = match category {
        Some(Category::Cloud) => "grafana_cloud_",
        Some(Category::SyntheticMonitoring) => "grafana_synthetic_monitoring_",
        _ => "grafana_",
    };
    kind.strip_prefix(prefix)
        .or_else(|| kind.strip_prefix("grafana_"))
        .unwrap_or(kind)
}

fn camel_keys(value: JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(fields) => JsonValue::Object(
            fields
                .into_iter()
                .map(|(key, value)| (to_camel_case(&key), camel_keys(value)))
                .collect(),
        ),
        JsonValue::Array(items) => JsonValue::Array(items.into_iter().map(camel_keys).collect()),
        other => other,
    }
}

/// Fields named in `block`, valued from `planned`
fn for_provider(block: &Body, planned: &PlannedResource) -> Map<String, JsonValue> {
    let mut fields = Map::new();
    for structure in block.0.iter() {
        let key = match structure {
            Structure::Attribute(attr) => attr.key.as_str(),
            Structure::Block(nested) => nested.identifier.as_str(),
        };
        fields
            .entry(to_camel_case(key))
            .or_insert_with(|| camel_keys(JsonValue::from(planned.attribute(key))));
    }
    fields
}

/// Manifest of one planned resource and its final configuration block.
/// Returns the file name alongside it.
pub fn manifest(
    registry: &Registry,
    planned: &PlannedResource,
    block: &Body,
) -> GenerateResult<(String, Manifest)> {
    let category = registry.find(&planned.kind).map(|d| d.category);
    let short_kind = strip_kind_prefix(&planned.kind, category);

    let mut kind = to_camel_case(short_kind);
    if let Some(first) = kind.get(..1) {
        kind = format!("{}{}", first.to_uppercase(), &kind[1..]);
    }

    let id = match planned.attribute("id") {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => {
            return Err(GenerateError::Serialization(format!(
                "planned resource {}.{} has no id",
                planned.kind, planned.name
            )));
        }
    };

    let name = planned.name.trim_start_matches('_').replace('_', "-");
    let file_name = format!("{}-{}.yaml", short_kind.replace('_', "-"), name);

    Ok((
        file_name,
        Manifest {
            api_version: format!("{}.grafana.crossplane.io/v1alpha1", api_group(category)),
            kind,
            metadata: Metadata {
                name,
                annotations: [(EXTERNAL_NAME_ANNOTATION.to_string(), id)]
                    .into_iter()
                    .collect(),
            },
            spec: ManifestSpec {
                for_provider: for_provider(block, planned),
                provider_config_ref: ConfigRef {
                    name: PROVIDER_CONFIG_NAME.to_string(),
                },
            },
        },
    ))
}

/// Final resource blocks of every `.tf` file in `dir`
fn resource_blocks(fs: &dyn FileSystem, dir: &Path) -> GenerateResult<BTreeMap<(String, String), Body>> {
    let mut blocks = BTreeMap::new();
    for path in fs.read_dir(dir)? {
        if !fs.is_file(&path) || path.extension().is_none_or(|ext| ext != "tf") {
            continue;
        }
        let document = Document::parse(&path, &fs.read_to_string(&path)?)?;
        for block in document.body.blocks() {
            if let Some(address) = syntax::resource_address(block) {
                blocks.insert(address, block.body.clone());
            }
        }
    }
    Ok(blocks)
}

/// Replace the contents of `dir` with `provider.yaml` and one manifest per
/// planned resource. Returns how many manifests were written.
pub fn convert_dir(
    fs: &dyn FileSystem,
    output: &dyn Output,
    dir: &Path,
    registry: &Registry,
    state: &PlannedState,
) -> GenerateResult<usize> {
    let blocks = resource_blocks(fs, dir)?;

    for entry in fs.read_dir(dir)? {
        if fs.is_dir(&entry) {
            fs.remove_dir_all(&entry)?;
        } else {
            fs.remove_file(&entry)?;
        }
    }

    fs.write(&dir.join("provider.yaml"), &serde_yaml::to_string(&provider_config())?)?;

    let mut written = BTreeSet::new();
    for planned in &state.resources {
        let Some(block) = blocks.get(&(planned.kind.clone(), planned.name.clone())) else {
            output.warning(&format!(
                "Skipping {}.{}: no resource block",
                planned.kind, planned.name
            ));
            continue;
        };

        let (file_name, manifest) = manifest(registry, planned, block)?;
        let path = dir.join(&file_name);
        output.dimmed(&format!("Writing file: {}", path.display()));
        fs.write(&path, &serde_yaml::to_string(&manifest)?)?;
        written.insert(file_name);
    }

    output.success(&format!("Wrote {} manifest(s)", written.len()));
    Ok(written.len())
}
