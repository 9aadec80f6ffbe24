//! Settings of a generation run: command-line values merged with an optional
//! YAML settings file, validated before anything touches the network.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::convert::OutputFormat;
use crate::generate::discovery::IncludeFilter;
use crate::generate::error::{GenerateError, GenerateResult};
use crate::generate::references::ReferenceCandidate;
use crate::generate::workflow::GenerateOptions;
use crate::postprocessing::PostprocessOptions;
use crate::postprocessing::strip_defaults::DefaultRule;
use crate::traits::FileSystem;

pub const DEFAULT_PROVIDER_VERSION: &str = "3.0.0";
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Contents of the `--config` file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub include_resources: Vec<String>,
    pub extra_references: Vec<String>,
    pub strip_defaults: Vec<StripDefault>,
}

/// Attribute removed as a provider-side default
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StripDefault {
    pub attribute: String,
    /// Rendered value to match, e.g. `"1"` with the quotes. Without it the
    /// attribute is always removed.
    #[serde(default)]
    pub value: Option<String>,
}

impl StripDefault {
    pub fn to_rule(&self) -> DefaultRule {
        match &self.value {
            Some(value) => DefaultRule::equals(&self.attribute, value),
            None => DefaultRule::always(&self.attribute),
        }
    }
}

impl Settings {
    pub fn load(fs: &dyn FileSystem, path: &Path) -> GenerateResult<Self> {
        let text = fs.read_to_string(path)?;
        serde_yaml::from_str(&text).map_err(|e| {
            GenerateError::InvalidInput(format!("invalid settings file {}: {}", path.display(), e))
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GrafanaConfig {
    pub url: String,
    pub auth: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloudConfig {
    pub access_policy_token: String,
    pub org: String,
    pub api_url: String,
}

/// Fully merged run configuration
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    pub output_dir: PathBuf,
    pub clobber: bool,
    pub output_format: OutputFormat,
    pub provider_version: String,
    pub terraform_binary: String,
    pub include_resources: Vec<String>,
    pub output_credentials: bool,
    pub grafana: Option<GrafanaConfig>,
    pub cloud: Option<CloudConfig>,
    pub extra_references: Vec<String>,
    pub strip_defaults: Vec<StripDefault>,
    pub concurrency: usize,
    pub json_extract_threshold: usize,
}

impl GenerateConfig {
    /// Add the settings file's lists after the command-line ones
    pub fn merge_settings(&mut self, settings: Settings) {
        merge_list(&mut self.include_resources, settings.include_resources);
        merge_list(&mut self.extra_references, settings.extra_references);
        for entry in settings.strip_defaults {
            if !self.strip_defaults.contains(&entry) {
                self.strip_defaults.push(entry);
            }
        }
    }

    /// Validate everything and build the engine's options
    pub fn options(&self) -> GenerateResult<GenerateOptions> {
        if self.grafana.is_none() && self.cloud.is_none() {
            return Err(GenerateError::InvalidInput(
                "at least one of --grafana-url or --cloud-access-policy-token must be set"
                    .to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(GenerateError::InvalidInput(
                "--concurrency must be at least 1".to_string(),
            ));
        }

        let extra_references = self
            .extra_references
            .iter()
            .map(|r| r.parse::<ReferenceCandidate>())
            .collect::<GenerateResult<Vec<_>>>()?;

        Ok(GenerateOptions {
            output_dir: self.output_dir.clone(),
            clobber: self.clobber,
            output_format: self.output_format,
            provider_version: provider_version(&self.provider_version)?,
            filter: IncludeFilter::new(&self.include_resources)?,
            concurrency: self.concurrency,
            extra_references,
            postprocess: PostprocessOptions {
                strip_defaults: self.strip_defaults.iter().map(StripDefault::to_rule).collect(),
                output_credentials: self.output_credentials,
                json_extract_threshold: self.json_extract_threshold,
            },
        })
    }
}

fn merge_list(target: &mut Vec<String>, extra: Vec<String>) {
    for item in extra {
        if !target.contains(&item) {
            target.push(item);
        }
    }
}

/// Provider version without a leading `v`, validated as semver
pub fn provider_version(version: &str) -> GenerateResult<String> {
    let trimmed = version.trim().trim_start_matches('v');
    semver::Version::parse(trimmed).map_err(|e| {
        GenerateError::InvalidInput(format!("invalid provider version '{}': {}", version, e))
    })?;
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockFileSystem;

    fn config() -> GenerateConfig {
        GenerateConfig {
            output_dir: PathBuf::from("/out"),
            clobber: false,
            output_format: OutputFormat::Hcl,
            provider_version: "v3.1.0".to_string(),
            terraform_binary: "terraform".to_string(),
            include_resources: vec!["grafana_folder.*".to_string()],
            output_credentials: false,
            grafana: Some(GrafanaConfig {
                url: "http://localhost:3000".to_string(),
                auth: "admin:admin".to_string(),
            }),
            cloud: None,
            extra_references: Vec::new(),
            strip_defaults: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
            json_extract_threshold: 100,
        }
    }

    #[test]
    fn test_provider_version_trims_v() {
        assert_eq!(provider_version("v3.1.0").unwrap(), "3.1.0");
        assert_eq!(provider_version("3.0.0").unwrap(), "3.0.0");
        assert!(provider_version("latest").is_err());
    }

    #[test]
    fn test_settings_are_merged_after_cli_values() {
        let fs = MockFileSystem::new();
        let path = Path::new("/settings.yaml");
        fs.write(
            path,
            r#"
include_resources:
  - grafana_folder.*
  - grafana_team.*
extra_references:
  - grafana_team.home_dashboard_uid=grafana_dashboard.uid
strip_defaults:
  - attribute: theme
  - attribute: timezone
    value: '"browser"'
"#,
        )
        .unwrap();

        let mut config = config();
        config.merge_settings(Settings::load(&fs, path).unwrap());

        assert_eq!(config.include_resources, vec!["grafana_folder.*", "grafana_team.*"]);
        let options = config.options().unwrap();
        assert_eq!(options.provider_version, "3.1.0");
        assert_eq!(options.extra_references[0].to_kind, "grafana_dashboard");
        assert_eq!(
            options.postprocess.strip_defaults,
            vec![
                DefaultRule::always("theme"),
                DefaultRule::equals("timezone", "\"browser\"")
            ]
        );
    }

    #[test]
    fn test_unknown_settings_key_is_rejected() {
        let fs = MockFileSystem::new();
        let path = Path::new("/settings.yaml");
        fs.write(path, "include: [a]\n").unwrap();

        assert!(matches!(
            Settings::load(&fs, path),
            Err(GenerateError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_credentials_are_required() {
        let mut config = config();
        config.grafana = None;

        let err = config.options().unwrap_err();
        assert!(err.to_string().contains("--grafana-url"));
    }

    #[test]
    fn test_malformed_filter_fails_validation() {
        let mut config = config();
        config.include_resources = vec!["grafana_folder.[".to_string()];

        assert!(matches!(
            config.options(),
            Err(GenerateError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn test_malformed_reference_fails_validation() {
        let mut config = config();
        config.extra_references = vec!["nonsense".to_string()];

        assert!(matches!(
            config.options(),
            Err(GenerateError::InvalidInput(_))
        ));
    }
}
