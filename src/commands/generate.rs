use anyhow::{Context as _, Result, bail};
use clap::Args;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

use crate::config::{
    CloudConfig, DEFAULT_CONCURRENCY, DEFAULT_PROVIDER_VERSION, GenerateConfig, GrafanaConfig,
    Settings,
};
use crate::context::Context;
use crate::convert::OutputFormat;
use crate::generate::error::{GenerateError, GenerateResult};
use crate::generate::executor::{DEFAULT_BINARY, PlanExecutor, TerraformExecutor};
use crate::generate::imports::DEFAULT_CLOUD_API_URL;
use crate::generate::result::{GenerationError, GenerationResult};
use crate::generate::workflow::{Generator, Scope};
use crate::postprocessing::json_fields::DEFAULT_EXTRACT_THRESHOLD;
use crate::registry::client::{Credentials, HttpApiClient};
use crate::traits::{FileSystem, Output};

/// Generate Terraform configuration from existing Grafana resources
#[derive(Debug, Args)]
pub struct GenerateCommand {
    /// Directory the configuration is written to
    #[arg(long, env = "TFGEN_OUTPUT_DIR")]
    output_dir: PathBuf,

    /// Delete the output directory first if it already exists
    #[arg(long, env = "TFGEN_CLOBBER")]
    clobber: bool,

    /// Format of the generated files
    #[arg(long, env = "TFGEN_OUTPUT_FORMAT", value_enum, default_value_t = OutputFormat::Hcl)]
    output_format: OutputFormat,

    /// Version of the grafana/grafana provider to pin
    #[arg(long, env = "TFGEN_TERRAFORM_PROVIDER_VERSION", default_value = DEFAULT_PROVIDER_VERSION)]
    terraform_provider_version: String,

    /// Planning binary to run
    #[arg(long, env = "TFGEN_TERRAFORM_BINARY", default_value = DEFAULT_BINARY)]
    terraform_binary: String,

    /// Only generate matching resources (comma-separated globs of kind.id)
    #[arg(long, env = "TFGEN_INCLUDE_RESOURCES", value_delimiter = ',')]
    include_resources: Vec<String>,

    /// Keep discovered credentials instead of a placeholder
    #[arg(long, env = "TFGEN_OUTPUT_CREDENTIALS")]
    output_credentials: bool,

    /// URL of the Grafana instance
    #[arg(long, env = "TFGEN_GRAFANA_URL")]
    grafana_url: Option<String>,

    /// Service account token or user:password for the instance
    #[arg(long, env = "TFGEN_GRAFANA_AUTH", hide_env_values = true)]
    grafana_auth: Option<String>,

    /// Grafana Cloud access policy token
    #[arg(long, env = "TFGEN_CLOUD_ACCESS_POLICY_TOKEN", hide_env_values = true)]
    cloud_access_policy_token: Option<String>,

    /// Grafana Cloud organization slug
    #[arg(long, env = "TFGEN_CLOUD_ORG")]
    cloud_org: Option<String>,

    /// Grafana Cloud API URL
    #[arg(long, env = "TFGEN_CLOUD_API_URL", default_value = DEFAULT_CLOUD_API_URL)]
    cloud_api_url: String,

    /// Additional reference candidates (comma-separated kind.attr=kind.attr)
    #[arg(long, env = "TFGEN_EXTRA_REFERENCES", value_delimiter = ',')]
    extra_references: Vec<String>,

    /// Maximum number of concurrent API requests
    #[arg(long, env = "TFGEN_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// JSON documents at or above this node count are moved to files/
    #[arg(long, env = "TFGEN_JSON_EXTRACT_THRESHOLD", default_value_t = DEFAULT_EXTRACT_THRESHOLD)]
    json_extract_threshold: usize,

    /// YAML settings file
    #[arg(long, env = "TFGEN_CONFIG")]
    config: Option<PathBuf>,
}

impl GenerateCommand {
    pub fn execute(self, ctx: &Context) -> Result<()> {
        let config = self.config(ctx.fs.as_ref())?;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        ctrlc::set_handler(move || {
            let _ = cancel_tx.send(true);
        })
        .context("Failed to install the interrupt handler")?;

        generate(ctx, &config, cancel_rx)
    }

    /// Command-line values merged with the settings file
    fn config(&self, fs: &dyn FileSystem) -> GenerateResult<GenerateConfig> {
        let grafana = match (non_empty(&self.grafana_url), non_empty(&self.grafana_auth)) {
            (Some(url), Some(auth)) => Some(GrafanaConfig { url, auth }),
            (Some(_), None) => {
                return Err(GenerateError::InvalidInput(
                    "--grafana-auth is required with --grafana-url".to_string(),
                ));
            }
            (None, _) => None,
        };

        let cloud = match (
            non_empty(&self.cloud_access_policy_token),
            non_empty(&self.cloud_org),
        ) {
            (Some(access_policy_token), Some(org)) => Some(CloudConfig {
                access_policy_token,
                org,
                api_url: self.cloud_api_url.clone(),
            }),
            (Some(_), None) => {
                return Err(GenerateError::InvalidInput(
                    "--cloud-org is required with --cloud-access-policy-token".to_string(),
                ));
            }
            (None, _) => None,
        };

        let mut config = GenerateConfig {
            output_dir: self.output_dir.clone(),
            clobber: self.clobber,
            output_format: self.output_format,
            provider_version: self.terraform_provider_version.clone(),
            terraform_binary: self.terraform_binary.clone(),
            include_resources: self.include_resources.clone(),
            output_credentials: self.output_credentials,
            grafana,
            cloud,
            extra_references: self.extra_references.clone(),
            strip_defaults: Vec::new(),
            concurrency: self.concurrency,
            json_extract_threshold: self.json_extract_threshold,
        };

        if let Some(path) = &self.config {
            config.merge_settings(Settings::load(fs, path)?);
        }

        Ok(config)
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

/// Run a full generation for `config`, failing when any error was recorded
fn generate(ctx: &Context, config: &GenerateConfig, cancel: watch::Receiver<bool>) -> Result<()> {
    let started = ctx.clock.now();
    let options = config.options()?;
    let scopes = scopes(config)?;

    let executor: Arc<dyn PlanExecutor> = Arc::new(TerraformExecutor::new(
        &config.terraform_binary,
        ctx.command.clone(),
        ctx.fs.clone(),
    ));
    let generator = Generator::new(ctx.fs.clone(), ctx.output.clone(), executor);

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let result = runtime
        .block_on(generator.run(&options, &scopes, cancel))
        .with_context(|| format!("Failed to generate resources in {}", config.output_dir.display()))?;

    let elapsed = ctx.clock.now() - started;
    print_summary(ctx.output.as_ref(), &result, elapsed);

    if !result.is_success() {
        bail!("Generation finished with {} error(s)", result.errors.len());
    }
    Ok(())
}

/// Cloud scope first, then the instance
fn scopes(config: &GenerateConfig) -> GenerateResult<Vec<Scope>> {
    let mut scopes = Vec::new();

    if let Some(cloud) = &config.cloud {
        let client = HttpApiClient::new(
            &cloud.api_url,
            Credentials::Bearer(cloud.access_policy_token.clone()),
        )?;
        scopes.push(Scope::cloud(
            Arc::new(client),
            &cloud.access_policy_token,
            &cloud.api_url,
            Some(cloud.org.clone()),
        ));
    }

    if let Some(grafana) = &config.grafana {
        let client = HttpApiClient::new(&grafana.url, Credentials::parse(&grafana.auth))?;
        scopes.push(Scope::instance(Arc::new(client), &grafana.url, &grafana.auth)?);
    }

    Ok(scopes)
}

fn print_summary(output: &dyn Output, result: &GenerationResult, elapsed: chrono::Duration) {
    output.section("Summary");

    output.subsection("Blocks per resource kind");
    let mut blocks: BTreeMap<&str, usize> = BTreeMap::new();
    for success in &result.successes {
        *blocks.entry(success.kind.as_str()).or_default() += success.blocks;
    }
    for (kind, count) in &blocks {
        output.key_value(kind, &count.to_string());
    }
    output.key_value("Total blocks", &result.blocks().to_string());

    if !result.errors.is_empty() {
        output.subsection("Errors");
    }
    for error in &result.errors {
        match error {
            GenerationError::NonCritical { .. } => output.warning(&error.to_string()),
            GenerationError::Critical(_) => output.error(&error.to_string()),
        }
    }

    output.blank();
    output.dimmed(&format!(
        "Finished in {:.1}s",
        elapsed.num_milliseconds() as f64 / 1000.0
    ));
}
