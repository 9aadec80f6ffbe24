//! Reference inference.
//!
//! Literal attribute values are replaced by a traversal to another resource's
//! attribute when the planned values of both are equal and the pair is a known
//! reference candidate. The planned state is the source of truth for values,
//! not the text of the file.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use hcl::{Body, Structure};
use lazy_static::lazy_static;

use crate::generate::error::{GenerateError, GenerateResult};
use crate::generate::state::PlannedState;
use crate::syntax;
use crate::traits::{FileSystem, Output};

const WILDCARD: &str = "*";

/// Curated `kind.attr=kind.attr` pairs
const DEFAULT_REFERENCES: &[&str] = &[
    "grafana_annotation.dashboard_uid=grafana_dashboard.uid",
    "grafana_annotation.org_id=grafana_organization.id",
    "grafana_cloud_access_policy.identifier=grafana_cloud_stack.id",
    "grafana_cloud_access_policy_token.access_policy_id=grafana_cloud_access_policy.policy_id",
    "grafana_cloud_plugin_installation.stack_slug=grafana_cloud_stack.slug",
    "grafana_cloud_private_data_source_connect_network.stack_identifier=grafana_cloud_stack.id",
    "grafana_cloud_private_data_source_connect_network_token.pdc_network_id=grafana_cloud_private_data_source_connect_network.pdc_network_id",
    "grafana_cloud_private_data_source_connect_network_token.region=grafana_cloud_private_data_source_connect_network.region",
    "grafana_cloud_provider_aws_cloudwatch_scrape_job.aws_account_resource_id=grafana_cloud_provider_aws_account.resource_id",
    "grafana_cloud_stack_service_account.stack_slug=grafana_cloud_stack.slug",
    "grafana_cloud_stack_service_account_token.auth=grafana_cloud_stack_service_account_token.key",
    "grafana_cloud_stack_service_account_token.service_account_id=grafana_cloud_stack_service_account.id",
    "grafana_cloud_stack_service_account_token.stack_slug=grafana_cloud_stack.slug",
    "grafana_cloud_stack_service_account_token.url=grafana_cloud_stack.url",
    "grafana_contact_point.org_id=grafana_organization.id",
    "grafana_dashboard.folder=grafana_folder.id",
    "grafana_dashboard.folder=grafana_folder.uid",
    "grafana_dashboard.name=grafana_library_panel.name",
    "grafana_dashboard.org_id=grafana_organization.id",
    "grafana_dashboard.org_id=grafana_organization.org_id",
    "grafana_dashboard.uid=grafana_library_panel.uid",
    "grafana_dashboard_permission.dashboard_uid=grafana_dashboard.uid",
    "grafana_dashboard_permission.team_id=grafana_team.id",
    "grafana_dashboard_permission.user_id=grafana_user.id",
    "grafana_dashboard_permission_item.dashboard_uid=grafana_dashboard.uid",
    "grafana_dashboard_permission_item.team=grafana_team.id",
    "grafana_dashboard_permission_item.user=grafana_service_account.id",
    "grafana_dashboard_permission_item.user=grafana_user.id",
    "grafana_dashboard_public.dashboard_uid=grafana_dashboard.uid",
    "grafana_dashboard_public.org_id=grafana_organization.org_id",
    "grafana_data_source.datasourceUid=grafana_data_source.uid",
    "grafana_data_source.org_id=grafana_organization.id",
    "grafana_data_source_config.datasourceUid=grafana_data_source.uid",
    "grafana_data_source_config.uid=grafana_data_source.uid",
    "grafana_data_source_config_lbac_rules.datasource_uid=grafana_data_source.uid",
    "grafana_data_source_permission.datasource_uid=grafana_data_source.uid",
    "grafana_data_source_permission.team_id=grafana_team.id",
    "grafana_data_source_permission.user_id=grafana_service_account.id",
    "grafana_data_source_permission.user_id=grafana_user.id",
    "grafana_data_source_permission_item.datasource_uid=grafana_data_source.uid",
    "grafana_data_source_permission_item.team=grafana_team.id",
    "grafana_data_source_permission_item.user=grafana_service_account.id",
    "grafana_data_source_permission_item.user=grafana_user.id",
    "grafana_folder.org_id=grafana_organization.id",
    "grafana_folder.org_id=grafana_organization.org_id",
    "grafana_folder.parent_folder_uid=grafana_folder.uid",
    "grafana_folder_permission.folder_uid=grafana_folder.uid",
    "grafana_folder_permission.team_id=grafana_team.id",
    "grafana_folder_permission.user_id=grafana_service_account.id",
    "grafana_folder_permission.user_id=grafana_user.id",
    "grafana_folder_permission_item.folder_uid=grafana_folder.uid",
    "grafana_folder_permission_item.team=grafana_team.id",
    "grafana_folder_permission_item.user=grafana_service_account.id",
    "grafana_folder_permission_item.user=grafana_user.id",
    "grafana_library_panel.folder_uid=grafana_folder.uid",
    "grafana_library_panel.org_id=grafana_organization.id",
    "grafana_machine_learning_alert.job_id=grafana_machine_learning_job.id",
    "grafana_machine_learning_alert.outlier_id=grafana_machine_learning_outlier_detector.id",
    "grafana_machine_learning_job.datasource_uid=grafana_data_source.uid",
    "grafana_message_template.org_id=grafana_organization.id",
    "grafana_mute_timing.org_id=grafana_organization.id",
    "grafana_notification_policy.contact_point=grafana_contact_point.name",
    "grafana_notification_policy.mute_timings=grafana_mute_timing.name",
    "grafana_notification_policy.org_id=grafana_organization.id",
    "grafana_oncall_escalation.escalation_chain_id=grafana_oncall_escalation_chain.id",
    "grafana_oncall_integration.escalation_chain_id=grafana_oncall_escalation_chain.id",
    "grafana_oncall_route.escalation_chain_id=grafana_oncall_escalation_chain.id",
    "grafana_oncall_route.integration_id=grafana_oncall_integration.id",
    "grafana_organization.org_id=grafana_organization.id",
    "grafana_organization_preferences.home_dashboard_uid=grafana_dashboard.uid",
    "grafana_organization_preferences.org_id=grafana_organization.id",
    "grafana_playlist.org_id=grafana_organization.id",
    "grafana_report.org_id=grafana_organization.id",
    "grafana_report.uid=grafana_dashboard.uid",
    "grafana_role.org_id=grafana_organization.id",
    "grafana_role_assignment.auth=grafana_cloud_stack_service_account_token.key",
    "grafana_role_assignment.org_id=grafana_organization.id",
    "grafana_role_assignment.role_uid=grafana_role.uid",
    "grafana_role_assignment.service_accounts=grafana_cloud_stack_service_account.id",
    "grafana_role_assignment.service_accounts=grafana_service_account.id",
    "grafana_role_assignment.teams=grafana_team.id",
    "grafana_role_assignment.url=grafana_cloud_stack.url",
    "grafana_role_assignment.users=grafana_user.id",
    "grafana_role_assignment_item.role_uid=grafana_role.uid",
    "grafana_role_assignment_item.service_account_id=grafana_service_account.id",
    "grafana_role_assignment_item.team_id=grafana_team.id",
    "grafana_role_assignment_item.user_id=grafana_user.id",
    "grafana_rule_group.contact_point=grafana_contact_point.name",
    "grafana_rule_group.folder_uid=grafana_folder.uid",
    "grafana_rule_group.org_id=grafana_organization.id",
    "grafana_service_account.org_id=grafana_organization.id",
    "grafana_service_account.role_uid=grafana_role.uid",
    "grafana_service_account.service_account_id=grafana_service_account.id",
    "grafana_service_account.team_id=grafana_team.id",
    "grafana_service_account.user_id=grafana_user.id",
    "grafana_service_account_permission.org_id=grafana_organization.id",
    "grafana_service_account_permission.service_account_id=grafana_cloud_stack_service_account.id",
    "grafana_service_account_permission.service_account_id=grafana_service_account.id",
    "grafana_service_account_permission.team_id=grafana_team.id",
    "grafana_service_account_permission.user_id=grafana_user.id",
    "grafana_service_account_permission_item.auth=grafana_cloud_stack_service_account_token.key",
    "grafana_service_account_permission_item.org_id=grafana_organization.id",
    "grafana_service_account_permission_item.service_account_id=grafana_cloud_stack_service_account.id",
    "grafana_service_account_permission_item.service_account_id=grafana_service_account.id",
    "grafana_service_account_permission_item.team=grafana_team.id",
    "grafana_service_account_permission_item.url=grafana_cloud_stack.url",
    "grafana_service_account_permission_item.user=grafana_user.id",
    "grafana_service_account_token.service_account_id=grafana_service_account.id",
    "grafana_slo.folder_uid=grafana_folder.uid",
    "grafana_synthetic_monitoring_installation.metrics_publisher_key=grafana_cloud_access_policy_token.token",
    "grafana_synthetic_monitoring_installation.sm_url=grafana_synthetic_monitoring_installation.stack_sm_api_url",
    "grafana_synthetic_monitoring_installation.stack_id=grafana_cloud_stack.id",
    "grafana_team.home_dashboard_uid=grafana_dashboard.uid",
    "grafana_team.org_id=grafana_organization.id",
    "grafana_team_external_group.team_id=grafana_team.id",
    "grafana_team_preferences.home_dashboard_uid=grafana_dashboard.uid",
    "grafana_team_preferences.team_id=grafana_team.id",
];

lazy_static! {
    static ref DEFAULT_CANDIDATES: Vec<ReferenceCandidate> = DEFAULT_REFERENCES
        .iter()
        .filter_map(|r| r.parse().ok())
        .collect();
}

/// `from_kind.from_attr` may point at `to_kind.to_attr`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceCandidate {
    pub from_kind: String,
    pub from_attr: String,
    pub to_kind: String,
    pub to_attr: String,
}

impl ReferenceCandidate {
    /// Whether this candidate applies to `attr` of a `kind` block
    pub fn applies_to(&self, kind: &str, attr: &str) -> bool {
        self.from_attr == attr && (self.from_kind == kind || self.from_kind == WILDCARD)
    }
}

fn split_address(text: &str, whole: &str) -> GenerateResult<(String, String)> {
    match text.trim().split_once('.') {
        Some((kind, attr)) if !kind.is_empty() && !attr.is_empty() && !attr.contains('.') => {
            Ok((kind.to_string(), attr.to_string()))
        }
        _ => Err(GenerateError::InvalidInput(format!(
            "invalid reference {:?}, expected kind.attr=kind.attr",
            whole
        ))),
    }
}

impl FromStr for ReferenceCandidate {
    type Err = GenerateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (from, to) = s.split_once('=').ok_or_else(|| {
            GenerateError::InvalidInput(format!(
                "invalid reference {:?}, expected kind.attr=kind.attr",
                s
            ))
        })?;
        let (from_kind, from_attr) = split_address(from, s)?;
        let (to_kind, to_attr) = split_address(to, s)?;
        if to_kind == WILDCARD {
            return Err(GenerateError::InvalidInput(format!(
                "invalid reference {:?}, the target kind cannot be a wildcard",
                s
            )));
        }

        Ok(Self {
            from_kind,
            from_attr,
            to_kind,
            to_attr,
        })
    }
}

impl fmt::Display for ReferenceCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}={}.{}",
            self.from_kind, self.from_attr, self.to_kind, self.to_attr
        )
    }
}

/// The curated candidate table
pub fn default_candidates() -> Vec<ReferenceCandidate> {
    DEFAULT_CANDIDATES.clone()
}

/// Rewrites literals into references, first matching candidate wins
#[derive(Debug, Clone, Default)]
pub struct ReferenceInference {
    candidates: Vec<ReferenceCandidate>,
}

impl ReferenceInference {
    pub fn new(candidates: Vec<ReferenceCandidate>) -> Self {
        Self { candidates }
    }

    /// Default table followed by `extra`
    pub fn with_defaults(extra: &[ReferenceCandidate]) -> Self {
        let mut candidates = default_candidates();
        candidates.extend(extra.iter().cloned());
        Self { candidates }
    }

    /// Rewrite `body` in place, returning how many attributes became references
    pub fn infer(&self, body: &mut Body, state: &PlannedState) -> GenerateResult<usize> {
        let mut replaced = 0;

        for block in syntax::blocks_mut(body) {
            let Some((kind, name)) = syntax::resource_address(block) else {
                continue;
            };
            let planned = state
                .find(&kind, &name)
                .ok_or_else(|| GenerateError::MissingPlannedResource {
                    kind: kind.clone(),
                    name: name.clone(),
                })?;

            for structure in block.body.0.iter_mut() {
                let Structure::Attribute(attr) = structure else {
                    continue;
                };
                let value = planned.attribute(attr.key.as_str());
                if value.is_null() {
                    continue;
                }

                let target = self
                    .candidates
                    .iter()
                    .filter(|c| c.applies_to(&kind, attr.key.as_str()))
                    .find_map(|candidate| {
                        state
                            .of_kind(&candidate.to_kind)
                            .filter(|r| !(r.kind == kind && r.name == name))
                            .find(|r| r.attribute(&candidate.to_attr) == value)
                            .map(|r| (r, candidate))
                    });

                if let Some((resource, candidate)) = target {
                    attr.expr = syntax::traversal(
                        &resource.kind,
                        &[resource.name.as_str(), candidate.to_attr.as_str()],
                    )?;
                    replaced += 1;
                }
            }
        }

        Ok(replaced)
    }
}

/// Run inference over one resources file
pub fn infer_file(
    fs: &dyn FileSystem,
    output: &dyn Output,
    path: &Path,
    inference: &ReferenceInference,
    state: &PlannedState,
) -> GenerateResult<bool> {
    syntax::postprocess_file(fs, output, path, |body| {
        inference.infer(body, state)?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::state::{PlannedResource, Value};

    fn string(s: &str) -> Value {
        Value::String(s.to_string())
    }

    fn folder_state() -> PlannedState {
        PlannedState::new(vec![
            PlannedResource::new("grafana_folder", "team_a")
                .with_attribute("uid", string("abc"))
                .with_attribute("title", string("Team A")),
            PlannedResource::new("grafana_folder", "child")
                .with_attribute("uid", string("def"))
                .with_attribute("parent_folder_uid", string("abc")),
            PlannedResource::new("grafana_dashboard", "home")
                .with_attribute("folder", string("abc"))
                .with_attribute("org_id", string("1")),
        ])
    }

    const FILE: &str = r#"
resource "grafana_folder" "team_a" {
  uid   = "abc"
  title = "Team A"
}

resource "grafana_folder" "child" {
  uid               = "def"
  parent_folder_uid = "abc"
}

resource "grafana_dashboard" "home" {
  folder = "abc"
  org_id = "1"
}
"#;

    #[test]
    fn test_default_candidates_parse() {
        assert_eq!(default_candidates().len(), DEFAULT_REFERENCES.len());
    }

    #[test]
    fn test_candidate_parse() {
        let candidate: ReferenceCandidate = "*.org_id=grafana_organization.id".parse().unwrap();
        assert!(candidate.applies_to("grafana_team", "org_id"));
        assert!(!candidate.applies_to("grafana_team", "name"));
        assert_eq!(candidate.to_string(), "*.org_id=grafana_organization.id");

        assert!("grafana_team.org_id".parse::<ReferenceCandidate>().is_err());
        assert!("a.b=*.c".parse::<ReferenceCandidate>().is_err());
        assert!("a=b.c".parse::<ReferenceCandidate>().is_err());
    }

    #[test]
    fn test_literals_become_references() {
        let mut body = hcl::parse(FILE).unwrap();
        let replaced = ReferenceInference::with_defaults(&[])
            .infer(&mut body, &folder_state())
            .unwrap();

        assert_eq!(replaced, 2);
        let rendered = syntax::squash(&hcl::format::to_string(&body).unwrap());
        assert!(rendered.contains("parent_folder_uid = grafana_folder.team_a.uid"));
        assert!(rendered.contains("folder = grafana_folder.team_a.uid"));
        // No organization resource to point at
        assert!(rendered.contains("org_id = \"1\""));
    }

    #[test]
    fn test_reference_resolves_to_replaced_literal() {
        let state = folder_state();
        let mut body = hcl::parse(FILE).unwrap();
        ReferenceInference::with_defaults(&[])
            .infer(&mut body, &state)
            .unwrap();

        let dashboard = body
            .blocks()
            .find(|b| syntax::resource_address(b).map(|(k, _)| k) == Some("grafana_dashboard".to_string()))
            .unwrap();
        let expr = &syntax::get_attribute(&dashboard.body, "folder").unwrap().expr;
        let path = syntax::traversal_path(expr).unwrap();

        let target = state.find(&path[0], &path[1]).unwrap();
        assert_eq!(target.attribute(&path[2]), state.find("grafana_dashboard", "home").unwrap().attribute("folder"));
    }

    #[test]
    fn test_extra_wildcard_candidate_and_first_match() {
        let state = PlannedState::new(vec![
            PlannedResource::new("grafana_organization", "main").with_attribute("id", string("1")),
            PlannedResource::new("grafana_organization", "other").with_attribute("id", string("1")),
            PlannedResource::new("grafana_team", "ops").with_attribute("org_id", string("1")),
        ]);
        let mut body = hcl::parse("resource \"grafana_team\" \"ops\" {\n  org_id = \"1\"\n}\n").unwrap();
        let extra = vec!["*.org_id=grafana_organization.id".parse().unwrap()];

        ReferenceInference::new(extra).infer(&mut body, &state).unwrap();

        let rendered = syntax::squash(&hcl::format::to_string(&body).unwrap());
        assert!(rendered.contains("org_id = grafana_organization.main.id"));
    }

    #[test]
    fn test_self_reference_is_skipped() {
        let state = PlannedState::new(vec![
            PlannedResource::new("grafana_folder", "a")
                .with_attribute("uid", string("x"))
                .with_attribute("parent_folder_uid", string("x")),
        ]);
        let mut body = hcl::parse("resource \"grafana_folder\" \"a\" {\n  parent_folder_uid = \"x\"\n}\n").unwrap();

        let replaced = ReferenceInference::with_defaults(&[]).infer(&mut body, &state).unwrap();
        assert_eq!(replaced, 0);
    }

    #[test]
    fn test_missing_planned_resource_is_critical() {
        let mut body = hcl::parse("resource \"grafana_folder\" \"ghost\" {\n  uid = \"x\"\n}\n").unwrap();
        let err = ReferenceInference::with_defaults(&[])
            .infer(&mut body, &PlannedState::default())
            .unwrap_err();

        assert!(matches!(err, GenerateError::MissingPlannedResource { .. }));
    }

    #[test]
    fn test_infer_is_idempotent() {
        let state = folder_state();
        let inference = ReferenceInference::with_defaults(&[]);
        let mut once = hcl::parse(FILE).unwrap();
        inference.infer(&mut once, &state).unwrap();
        let mut twice = once.clone();
        inference.infer(&mut twice, &state).unwrap();

        assert_eq!(once, twice);
    }
}
