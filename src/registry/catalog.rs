//! Built-in resource kinds and their discovery functions.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::identifier::{IdField, IdFormat, IdPart};
use super::{Category, ListerContext, Registry, ResourceDescriptor};
use crate::generate::error::{GenerateError, GenerateResult};

const PAGE_SIZE: usize = 1000;

fn org_scoped_uid() -> IdFormat {
    IdFormat::new(vec![IdField::int("orgID").optional(), IdField::string("uid")])
}

fn org_scoped_int() -> IdFormat {
    IdFormat::new(vec![IdField::int("orgID").optional(), IdField::int("id")])
}

fn access_policy_id() -> IdFormat {
    IdFormat::new(vec![IdField::string("region"), IdField::string("policyId")])
        .with_legacy_separator("/")
}

/// Kinds managed through a Grafana instance API
pub fn grafana() -> Registry {
    Registry::new(vec![
        ResourceDescriptor::new(
            Category::GrafanaOss,
            "grafana_annotation",
            org_scoped_int(),
        ),
        ResourceDescriptor::new(
            Category::GrafanaOss,
            "grafana_dashboard",
            org_scoped_uid(),
        )
        .with_discover(list_dashboards),
        ResourceDescriptor::new(
            Category::GrafanaOss,
            "grafana_data_source",
            org_scoped_uid(),
        )
        .with_discover(list_data_sources)
        .with_preferred_name("name"),
        ResourceDescriptor::new(Category::GrafanaOss, "grafana_folder", org_scoped_uid())
            .with_discover(list_folders)
            .with_preferred_name("title"),
        ResourceDescriptor::new(
            Category::GrafanaOss,
            "grafana_organization",
            IdFormat::new(vec![IdField::int("id")]),
        )
        .with_discover(list_organizations),
        ResourceDescriptor::new(Category::GrafanaOss, "grafana_team", org_scoped_int())
            .with_discover(list_teams)
            .with_preferred_name("name"),
        ResourceDescriptor::new(
            Category::GrafanaOss,
            "grafana_user",
            IdFormat::new(vec![IdField::int("id")]),
        )
        .with_discover(list_users)
        .with_preferred_name("login")
        .with_sensitive_required("password"),
    ])
}

/// Kinds managed through the Grafana Cloud API
pub fn cloud() -> Registry {
    Registry::new(vec![
        ResourceDescriptor::new(
            Category::Cloud,
            "grafana_cloud_access_policy",
            access_policy_id(),
        )
        .with_discover(list_access_policies),
        ResourceDescriptor::new(
            Category::Cloud,
            "grafana_cloud_stack",
            IdFormat::new(vec![IdField::string("stackSlugOrID")]),
        )
        .with_discover(list_stacks)
        .with_preferred_name("slug"),
    ])
}

/// Every built-in kind, for lookups that span scopes
pub fn all() -> Registry {
    cloud().merged(&grafana())
}

/// Identifier of an org-scoped resource; the org is only encoded when the
/// credentials can reach more than one organization
async fn org_scoped(ctx: &ListerContext, format: &IdFormat, part: IdPart) -> GenerateResult<String> {
    if ctx.single_org {
        format.make(&[part])
    } else {
        let org_id = ctx.org_id().await?;
        format.make(&[IdPart::Int(org_id), part])
    }
}

fn array<'a>(response: &'a JsonValue, path: &str) -> GenerateResult<&'a Vec<JsonValue>> {
    response
        .as_array()
        .ok_or_else(|| GenerateError::Api(format!("{}: expected a JSON array", path)))
}

fn field_str(item: &JsonValue, key: &str) -> GenerateResult<String> {
    item.get(key)
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| GenerateError::Api(format!("item without string field {:?}", key)))
}

fn field_i64(item: &JsonValue, key: &str) -> GenerateResult<i64> {
    item.get(key)
        .and_then(JsonValue::as_i64)
        .ok_or_else(|| GenerateError::Api(format!("item without integer field {:?}", key)))
}

/// Fetch every page of a paginated list endpoint. `extract` pulls the items
/// out of one page response.
async fn paged<F>(ctx: &ListerContext, base: &str, page_param: &str, extract: F) -> GenerateResult<Vec<JsonValue>>
where
    F: Fn(&JsonValue, &str) -> GenerateResult<Vec<JsonValue>>,
{
    let separator = if base.contains('?') { '&' } else { '?' };
    let mut items = Vec::new();
    let mut page = 1;
    loop {
        let path = format!("{}{}{}={}&page={}", base, separator, page_param, PAGE_SIZE, page);
        let response = ctx.client.get_json(&path).await?;
        let page_items = extract(&response, &path)?;
        let count = page_items.len();
        items.extend(page_items);
        if count < PAGE_SIZE {
            return Ok(items);
        }
        page += 1;
    }
}

async fn list_folders(ctx: Arc<ListerContext>) -> GenerateResult<Vec<String>> {
    let folders = paged(&ctx, "api/folders", "limit", |r, p| Ok(array(r, p)?.clone())).await?;
    let format = org_scoped_uid();

    let mut ids = Vec::with_capacity(folders.len());
    for folder in &folders {
        ids.push(org_scoped(&ctx, &format, IdPart::String(field_str(folder, "uid")?)).await?);
    }
    Ok(ids)
}

async fn list_dashboards(ctx: Arc<ListerContext>) -> GenerateResult<Vec<String>> {
    let dashboards =
        paged(&ctx, "api/search?type=dash-db", "limit", |r, p| Ok(array(r, p)?.clone())).await?;
    let format = org_scoped_uid();

    let mut ids = Vec::with_capacity(dashboards.len());
    for dashboard in &dashboards {
        ids.push(org_scoped(&ctx, &format, IdPart::String(field_str(dashboard, "uid")?)).await?);
    }
    Ok(ids)
}

async fn list_data_sources(ctx: Arc<ListerContext>) -> GenerateResult<Vec<String>> {
    let path = "api/datasources";
    let response = ctx.client.get_json(path).await?;
    let format = org_scoped_uid();

    let mut ids = Vec::new();
    for data_source in array(&response, path)? {
        ids.push(org_scoped(&ctx, &format, IdPart::String(field_str(data_source, "uid")?)).await?);
    }
    Ok(ids)
}

async fn list_teams(ctx: Arc<ListerContext>) -> GenerateResult<Vec<String>> {
    let teams = paged(&ctx, "api/teams/search", "perpage", |r, p| {
        r.get("teams")
            .and_then(JsonValue::as_array)
            .cloned()
            .ok_or_else(|| GenerateError::Api(format!("{}: response has no teams", p)))
    })
    .await?;
    let format = org_scoped_int();

    let mut ids = Vec::with_capacity(teams.len());
    for team in &teams {
        ids.push(org_scoped(&ctx, &format, IdPart::Int(field_i64(team, "id")?)).await?);
    }
    Ok(ids)
}

async fn list_users(ctx: Arc<ListerContext>) -> GenerateResult<Vec<String>> {
    let users = paged(&ctx, "api/users", "perpage", |r, p| Ok(array(r, p)?.clone())).await?;

    users
        .iter()
        .map(|user| field_i64(user, "id").map(|id| id.to_string()))
        .collect()
}

async fn list_organizations(ctx: Arc<ListerContext>) -> GenerateResult<Vec<String>> {
    // A token is bound to its organization; listing requires server admin basic auth
    if ctx.single_org {
        return Ok(Vec::new());
    }

    let orgs = paged(&ctx, "api/orgs", "perpage", |r, p| Ok(array(r, p)?.clone())).await?;
    orgs.iter()
        .map(|org| field_i64(org, "id").map(|id| id.to_string()))
        .collect()
}

async fn list_stacks(ctx: Arc<ListerContext>) -> GenerateResult<Vec<String>> {
    Ok(ctx.stacks().await?.iter().map(|s| s.slug.clone()).collect())
}

async fn list_access_policies(ctx: Arc<ListerContext>) -> GenerateResult<Vec<String>> {
    let regions: BTreeSet<String> = ctx
        .stacks()
        .await?
        .iter()
        .map(|s| s.region_slug.clone())
        .collect();
    let format = access_policy_id();

    let mut ids = Vec::new();
    for region in regions {
        let path = format!("api/v1/accesspolicies?region={}", region);
        let response = ctx.client.get_json(&path).await?;
        let items = response
            .get("items")
            .and_then(JsonValue::as_array)
            .ok_or_else(|| GenerateError::Api(format!("{}: response has no items", path)))?;
        for policy in items {
            ids.push(format.make(&[
                IdPart::String(region.clone()),
                IdPart::String(field_str(policy, "id")?),
            ])?);
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::client::MockApiClient;
    use serde_json::json;

    fn discover(registry: &Registry, kind: &str, ctx: Arc<ListerContext>) -> GenerateResult<Vec<String>> {
        let descriptor = registry.find(kind).unwrap();
        let discover = descriptor.discover.clone().unwrap();
        tokio::runtime::Runtime::new().unwrap().block_on(discover(ctx))
    }

    #[test]
    fn test_catalog_metadata() {
        let grafana = grafana();
        assert!(grafana.find("grafana_annotation").unwrap().discover.is_none());
        assert_eq!(
            grafana.find("grafana_user").unwrap().sensitive_required_fields,
            vec!["password"]
        );
        assert_eq!(
            cloud().find("grafana_cloud_stack").unwrap().preferred_name_field,
            Some("slug")
        );
        assert_eq!(all().list_kinds().len(), 9);
    }

    #[test]
    fn test_folders_single_org() {
        let client = MockApiClient::new().with(
            "api/folders?limit=1000&page=1",
            json!([{"uid": "a", "title": "A"}, {"uid": "b", "title": "B"}]),
        );
        let ctx = Arc::new(ListerContext::new(Arc::new(client), true, None));

        assert_eq!(discover(&grafana(), "grafana_folder", ctx).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_teams_multi_org_encode_org() {
        let client = MockApiClient::new()
            .with("api/org", json!({"id": 4}))
            .with("api/teams/search?perpage=1000&page=1", json!({"teams": [{"id": 12}]}));
        let ctx = Arc::new(ListerContext::new(Arc::new(client), false, None));

        assert_eq!(discover(&grafana(), "grafana_team", ctx).unwrap(), vec!["4:12"]);
    }

    #[test]
    fn test_access_policies_per_region() {
        let client = MockApiClient::new()
            .with(
                "api/instances?org=acme",
                json!({"items": [
                    {"id": 1, "slug": "one", "regionSlug": "eu", "url": "https://one.grafana.net"},
                    {"id": 2, "slug": "two", "regionSlug": "eu", "url": "https://two.grafana.net"},
                    {"id": 3, "slug": "three", "regionSlug": "us", "url": "https://three.grafana.net"}
                ]}),
            )
            .with("api/v1/accesspolicies?region=eu", json!({"items": [{"id": "p1"}]}))
            .with("api/v1/accesspolicies?region=us", json!({"items": [{"id": "p2"}]}));
        let ctx = Arc::new(ListerContext::new(Arc::new(client), true, Some("acme".to_string())));

        assert_eq!(
            discover(&cloud(), "grafana_cloud_access_policy", ctx).unwrap(),
            vec!["eu:p1", "us:p2"]
        );
    }

    #[test]
    fn test_organizations_skipped_for_tokens() {
        let ctx = Arc::new(ListerContext::new(Arc::new(MockApiClient::new()), true, None));
        assert!(discover(&grafana(), "grafana_organization", ctx).unwrap().is_empty());
    }

    #[test]
    fn test_api_error_propagates() {
        let ctx = Arc::new(ListerContext::new(Arc::new(MockApiClient::new()), true, None));
        assert!(matches!(
            discover(&grafana(), "grafana_data_source", ctx),
            Err(GenerateError::Api(_))
        ));
    }
}
