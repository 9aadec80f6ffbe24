//! Resource descriptor registry.
//!
//! Each resource kind the generator knows about is described once: how its
//! identifiers are encoded, how to discover them, and the metadata the
//! postprocessing passes and converters need.

pub mod catalog;
pub mod client;
pub mod identifier;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value as JsonValue;
use tokio::sync::OnceCell;

use crate::generate::error::{GenerateError, GenerateResult};
use client::ApiClient;
use identifier::IdFormat;

/// Product area a resource kind belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Alerting,
    Cloud,
    GrafanaEnterprise,
    GrafanaOss,
    MachineLearning,
    OnCall,
    Slo,
    SyntheticMonitoring,
    CloudProvider,
    Connections,
    FleetManagement,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Alerting => "Alerting",
            Category::Cloud => "Cloud",
            Category::GrafanaEnterprise => "Grafana Enterprise",
            Category::GrafanaOss => "Grafana OSS",
            Category::MachineLearning => "Machine Learning",
            Category::OnCall => "OnCall",
            Category::Slo => "SLO",
            Category::SyntheticMonitoring => "Synthetic Monitoring",
            Category::CloudProvider => "Cloud Provider",
            Category::Connections => "Connections",
            Category::FleetManagement => "Fleet Management",
        };
        write!(f, "{}", name)
    }
}

/// Discovery function: lists the identifiers of every existing resource of a kind
pub type DiscoverFn =
    Arc<dyn Fn(Arc<ListerContext>) -> BoxFuture<'static, GenerateResult<Vec<String>>> + Send + Sync>;

/// Static description of one resource kind
#[derive(Clone)]
pub struct ResourceDescriptor {
    pub name: String,
    pub category: Category,
    pub id_format: IdFormat,
    pub discover: Option<DiscoverFn>,
    /// Attribute whose value makes a better local name than the identifier
    pub preferred_name_field: Option<&'static str>,
    /// Sensitive attributes the resource cannot be created without
    pub sensitive_required_fields: Vec<&'static str>,
}

impl ResourceDescriptor {
    pub fn new(category: Category, name: &str, id_format: IdFormat) -> Self {
        Self {
            name: name.to_string(),
            category,
            id_format,
            discover: None,
            preferred_name_field: None,
            sensitive_required_fields: Vec::new(),
        }
    }

    pub fn with_discover<F, Fut>(mut self, discover: F) -> Self
    where
        F: Fn(Arc<ListerContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = GenerateResult<Vec<String>>> + Send + 'static,
    {
        let discover: DiscoverFn = Arc::new(move |ctx: Arc<ListerContext>| discover(ctx).boxed());
        self.discover = Some(discover);
        self
    }

    pub fn with_preferred_name(mut self, field: &'static str) -> Self {
        self.preferred_name_field = Some(field);
        self
    }

    pub fn with_sensitive_required(mut self, field: &'static str) -> Self {
        self.sensitive_required_fields.push(field);
        self
    }
}

impl fmt::Debug for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDescriptor")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("id_format", &self.id_format)
            .field("discover", &self.discover.is_some())
            .field("preferred_name_field", &self.preferred_name_field)
            .field("sensitive_required_fields", &self.sensitive_required_fields)
            .finish()
    }
}

/// Immutable set of descriptors for one provider scope
#[derive(Debug, Clone, Default)]
pub struct Registry {
    descriptors: Vec<ResourceDescriptor>,
}

impl Registry {
    pub fn new(descriptors: Vec<ResourceDescriptor>) -> Self {
        Self { descriptors }
    }

    pub fn list_kinds(&self) -> &[ResourceDescriptor] {
        &self.descriptors
    }

    pub fn find(&self, kind: &str) -> Option<&ResourceDescriptor> {
        self.descriptors.iter().find(|d| d.name == kind)
    }

    /// Union of two registries, first one wins on duplicate kinds
    pub fn merged(&self, other: &Registry) -> Registry {
        let mut descriptors = self.descriptors.clone();
        for descriptor in &other.descriptors {
            if self.find(&descriptor.name).is_none() {
                descriptors.push(descriptor.clone());
            }
        }
        Registry { descriptors }
    }
}

/// A Grafana Cloud stack as listed by the cloud API
#[derive(Debug, Clone, PartialEq)]
pub struct Stack {
    pub id: i64,
    pub slug: String,
    pub region_slug: String,
    pub url: String,
}

/// Shared, read-only discovery context.
///
/// Facts needed by several discovery functions are computed on first use and
/// cached; concurrent callers wait for the first computation.
pub struct ListerContext {
    pub client: Arc<dyn ApiClient>,
    pub single_org: bool,
    pub cloud_org: Option<String>,
    org_id: OnceCell<i64>,
    stacks: OnceCell<Vec<Stack>>,
}

impl ListerContext {
    pub fn new(client: Arc<dyn ApiClient>, single_org: bool, cloud_org: Option<String>) -> Self {
        Self {
            client,
            single_org,
            cloud_org,
            org_id: OnceCell::new(),
            stacks: OnceCell::new(),
        }
    }

    /// Organization the credentials act in
    pub async fn org_id(&self) -> GenerateResult<i64> {
        let id = self
            .org_id
            .get_or_try_init(|| async {
                let org = self.client.get_json("api/org").await?;
                org.get("id")
                    .and_then(JsonValue::as_i64)
                    .ok_or_else(|| GenerateError::Api("api/org response has no id".to_string()))
            })
            .await?;
        Ok(*id)
    }

    /// Stacks of the configured cloud organization
    pub async fn stacks(&self) -> GenerateResult<&[Stack]> {
        let stacks = self
            .stacks
            .get_or_try_init(|| async {
                let org = self.cloud_org.as_deref().ok_or_else(|| {
                    GenerateError::InvalidInput(
                        "a cloud organization is required to list stacks".to_string(),
                    )
                })?;
                let path = format!("api/instances?org={}", org);
                let response = self.client.get_json(&path).await?;
                parse_stacks(&response)
            })
            .await?;
        Ok(stacks.as_slice())
    }
}

fn parse_stacks(response: &JsonValue) -> GenerateResult<Vec<Stack>> {
    let items = response
        .get("items")
        .and_then(JsonValue::as_array)
        .ok_or_else(|| GenerateError::Api("instances response has no items".to_string()))?;

    items
        .iter()
        .map(|item| {
            let text = |key: &str| {
                item.get(key)
                    .and_then(JsonValue::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| GenerateError::Api(format!("stack without {}", key)))
            };
            Ok(Stack {
                id: item
                    .get("id")
                    .and_then(JsonValue::as_i64)
                    .ok_or_else(|| GenerateError::Api("stack without id".to_string()))?,
                slug: text("slug")?,
                region_slug: text("regionSlug")?,
                url: text("url")?,
            })
        })
        .collect()
}
