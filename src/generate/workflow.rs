//! Generation run: discovery, imports, planning, inference and rewriting,
//! once per provider scope.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;
use url::Url;

use crate::convert::{self, OutputFormat};
use crate::generate::discovery::{self, DiscoveryOptions, IncludeFilter};
use crate::generate::error::{GenerateError, GenerateResult};
use crate::generate::executor::{PlanExecutor, PlanOutcome};
use crate::generate::imports::{
    self, CLOUD_SCOPE, ProviderSettings, imports_file, provider_file, resources_file,
};
use crate::generate::references::{ReferenceCandidate, ReferenceInference, infer_file};
use crate::generate::result::GenerationResult;
use crate::generate::state::PlannedState;
use crate::postprocessing::strip_defaults::DefaultRule;
use crate::postprocessing::{Pipeline, PostprocessOptions};
use crate::registry::client::{ApiClient, Credentials};
use crate::registry::{ListerContext, Registry, catalog};
use crate::traits::{FileSystem, Output};

/// One provider alias and everything needed to generate its files
pub struct Scope {
    pub name: String,
    pub registry: Registry,
    pub lister: Arc<ListerContext>,
    pub provider: ProviderSettings,
    /// Defaults stripped in addition to the run-wide ones
    pub strip_defaults: Vec<DefaultRule>,
    /// Reference candidates added to the run-wide table
    pub candidates: Vec<ReferenceCandidate>,
}

impl Scope {
    /// Organization-level resources reached with an access policy token
    pub fn cloud(
        client: Arc<dyn ApiClient>,
        access_policy_token: &str,
        api_url: &str,
        cloud_org: Option<String>,
    ) -> Self {
        Self {
            name: CLOUD_SCOPE.to_string(),
            registry: catalog::cloud(),
            lister: Arc::new(ListerContext::new(client, true, cloud_org)),
            provider: ProviderSettings::Cloud {
                access_policy_token: access_policy_token.to_string(),
                api_url: api_url.to_string(),
            },
            strip_defaults: Vec::new(),
            candidates: Vec::new(),
        }
    }

    /// Resources of one Grafana instance
    pub fn instance(client: Arc<dyn ApiClient>, url: &str, auth: &str) -> GenerateResult<Self> {
        let single_org = Credentials::parse(auth).is_single_org();

        let mut strip_defaults = vec![if single_org {
            DefaultRule::always("org_id")
        } else {
            DefaultRule::equals("org_id", "\"1\"")
        }];
        strip_defaults.push(DefaultRule::equals("missing_series_evals_to_resolve", "0"));

        Ok(Self {
            name: instance_scope_name(url)?,
            registry: catalog::grafana(),
            lister: Arc::new(ListerContext::new(client, single_org, None)),
            provider: ProviderSettings::Instance {
                url: url.to_string(),
                auth: auth.to_string(),
            },
            strip_defaults,
            candidates: vec!["*.org_id=grafana_organization.id".parse()?],
        })
    }
}

/// Scope name derived from an instance URL's host
pub fn instance_scope_name(url: &str) -> GenerateResult<String> {
    let parsed = Url::parse(url)
        .map_err(|e| GenerateError::InvalidInput(format!("invalid URL '{}': {}", url, e)))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| GenerateError::InvalidInput(format!("URL '{}' has no host", url)))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');

    if host.parse::<IpAddr>().is_ok() {
        return Ok(format!("ip_{}", host.replace(['.', ':'], "_")));
    }
    Ok(host.replace(['.', '-'], "_"))
}

/// Run-wide settings
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub output_dir: PathBuf,
    pub clobber: bool,
    pub output_format: OutputFormat,
    pub provider_version: String,
    pub filter: IncludeFilter,
    pub concurrency: usize,
    pub extra_references: Vec<ReferenceCandidate>,
    pub postprocess: PostprocessOptions,
}

/// Drives every scope of a run against one output directory
pub struct Generator {
    fs: Arc<dyn FileSystem>,
    output: Arc<dyn Output>,
    executor: Arc<dyn PlanExecutor>,
}

impl Generator {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        output: Arc<dyn Output>,
        executor: Arc<dyn PlanExecutor>,
    ) -> Self {
        Self {
            fs,
            output,
            executor,
        }
    }

    /// Generate every scope in order. Critical errors abort the scope they
    /// happen in; cancellation aborts the run.
    pub async fn run(
        &self,
        options: &GenerateOptions,
        scopes: &[Scope],
        cancel: watch::Receiver<bool>,
    ) -> GenerateResult<GenerationResult> {
        let dir = options.output_dir.as_path();

        self.output.section("Preparing output directory");
        self.prepare_output_dir(dir, options.clobber)?;
        self.write_provider_files(dir, &options.provider_version, scopes)?;

        self.output.info("Initializing the planning tool");
        let executor = self.executor.clone();
        let init_dir = dir.to_path_buf();
        blocking("init", move || executor.init(&init_dir)).await?;

        let mut result = GenerationResult::default();
        for scope in scopes {
            self.output.section(&format!("Generating {} resources", scope.name));
            let scope_result = self.run_scope(options, scope, cancel.clone()).await?;
            if scope_result.has_critical() {
                self.output
                    .error(&format!("Generation of scope {} failed", scope.name));
            } else {
                self.output.success(&format!(
                    "Generated {} block(s) for scope {}",
                    scope_result.blocks(),
                    scope.name
                ));
            }
            result.merge(scope_result);
        }

        if options.output_format != OutputFormat::Hcl {
            self.output.section("Converting output");
            if let Err(error) = self.convert(dir, options.output_format).await {
                result.push_critical(error);
            }
        }

        Ok(result)
    }

    /// Clear or create the output directory
    pub fn prepare_output_dir(&self, dir: &Path, clobber: bool) -> GenerateResult<()> {
        if self.fs.exists(dir) {
            if !clobber {
                return Err(GenerateError::OutputDirExists(dir.to_path_buf()));
            }
            self.output
                .dimmed(&format!("Deleting all files in {}", dir.display()));
            self.fs.remove_dir_all(dir)?;
        }

        self.output
            .info(&format!("Generating resources to {}", dir.display()));
        self.fs.create_dir_all(dir)?;
        Ok(())
    }

    fn write_provider_files(
        &self,
        dir: &Path,
        version: &str,
        scopes: &[Scope],
    ) -> GenerateResult<()> {
        self.fs.write(
            &dir.join("provider.tf"),
            &imports::render_required_providers(version)?,
        )?;
        for scope in scopes {
            self.fs.write(
                &dir.join(provider_file(&scope.name)),
                &imports::render_provider(&scope.name, &scope.provider)?,
            )?;
        }
        Ok(())
    }

    /// Generate one scope. Returns `Err` only when the run was cancelled;
    /// every other failure is recorded in the result.
    ///
    /// A cancelled scope leaves no files behind. A failed scope is reduced
    /// to placeholders so its imports cannot leak into the next scope's plan.
    pub async fn run_scope(
        &self,
        options: &GenerateOptions,
        scope: &Scope,
        cancel: watch::Receiver<bool>,
    ) -> GenerateResult<GenerationResult> {
        let dir = options.output_dir.as_path();

        match self.generate_scope(options, scope, cancel).await {
            Ok(result) => Ok(result),
            Err(GenerateError::Cancelled) => {
                if let Err(error) = self.discard_scope_files(dir, &scope.name) {
                    self.output
                        .warning(&format!("Could not remove files of scope {}: {}", scope.name, error));
                }
                Err(GenerateError::Cancelled)
            }
            Err(error) => {
                let mut result = GenerationResult::failure(error);
                self.output.dimmed(&format!(
                    "Replacing files of scope {} with placeholders",
                    scope.name
                ));
                if let Err(error) = imports::write_placeholders(self.fs.as_ref(), dir, &scope.name) {
                    result.push_critical(error);
                }
                Ok(result)
            }
        }
    }

    fn discard_scope_files(&self, dir: &Path, scope: &str) -> GenerateResult<()> {
        for file in [imports_file(scope), resources_file(scope)] {
            let path = dir.join(file);
            if self.fs.exists(&path) {
                self.output
                    .dimmed(&format!("Deleting file: {}", path.display()));
                self.fs.remove_file(&path)?;
            }
        }
        Ok(())
    }

    async fn generate_scope(
        &self,
        options: &GenerateOptions,
        scope: &Scope,
        cancel: watch::Receiver<bool>,
    ) -> GenerateResult<GenerationResult> {
        let dir = options.output_dir.as_path();

        self.output.info("Discovering resources");
        let discovered = discovery::discover_all(
            &scope.registry,
            scope.lister.clone(),
            DiscoveryOptions {
                filter: options.filter.clone(),
                concurrency: options.concurrency,
                cancel: cancel.clone(),
            },
        )
        .await?;

        if discovered.is_empty() {
            self.output.warning("No resources found");
            imports::write_placeholders(self.fs.as_ref(), dir, &scope.name)?;
            return Ok(discovered.result);
        }
        let mut result = discovered.result;

        let statements = imports::import_statements(&scope.name, &discovered.kinds);
        self.output
            .info(&format!("Writing {} import block(s)", statements.len()));
        imports::write_imports(self.fs.as_ref(), dir, &scope.name, &statements)?;
        check_cancelled(&cancel)?;

        self.output.info("Generating resource blocks");
        let resources = dir.join(resources_file(&scope.name));
        let executor = self.executor.clone();
        let plan_dir = dir.to_path_buf();
        let out_file = resources_file(&scope.name);
        let outcome = blocking("plan", move || {
            executor.plan_generate(&plan_dir, &out_file, &[])
        })
        .await?;
        check_cancelled(&cancel)?;
        if let PlanOutcome::Partial(error) = outcome {
            self.output
                .warning("The planning tool reported errors, continuing with its partial output");
            result.push_non_critical(&resources_file(&scope.name), error);
        }

        let postprocess = PostprocessOptions {
            strip_defaults: options
                .postprocess
                .strip_defaults
                .iter()
                .chain(&scope.strip_defaults)
                .cloned()
                .collect(),
            ..options.postprocess.clone()
        };
        let pipeline = Pipeline::new(
            self.fs.as_ref(),
            self.output.as_ref(),
            &scope.registry,
            &postprocess,
        );

        // A partial plan leaves imports without resources, which would fail the next plan
        pipeline.remove_orphaned_imports(&resources, &dir.join(imports_file(&scope.name)))?;

        self.output.info("Reading planned state");
        let state = self.planned_state(dir, &scope.name).await?;
        check_cancelled(&cancel)?;

        self.output.info("Inferring references");
        let mut candidates = scope.candidates.clone();
        candidates.extend(options.extra_references.iter().cloned());
        let inference = ReferenceInference::with_defaults(&candidates);
        infer_file(
            self.fs.as_ref(),
            self.output.as_ref(),
            &resources,
            &inference,
            &state,
        )?;
        check_cancelled(&cancel)?;

        pipeline.run(dir, &scope.name)?;

        Ok(result)
    }

    async fn planned_state(&self, dir: &Path, scope: &str) -> GenerateResult<PlannedState> {
        let executor = self.executor.clone();
        let dir = dir.to_path_buf();
        let scope = scope.to_string();
        blocking("show", move || executor.planned_state(&dir, &scope)).await
    }

    async fn convert(&self, dir: &Path, format: OutputFormat) -> GenerateResult<()> {
        match format {
            OutputFormat::Hcl => Ok(()),
            OutputFormat::Json => {
                convert::json::convert_dir(self.fs.as_ref(), self.output.as_ref(), dir)?;
                Ok(())
            }
            OutputFormat::Crossplane => {
                let state = self.planned_state(dir, "crossplane").await?;
                convert::manifest::convert_dir(
                    self.fs.as_ref(),
                    self.output.as_ref(),
                    dir,
                    &catalog::all(),
                    &state,
                )?;
                Ok(())
            }
        }
    }
}

fn check_cancelled(cancel: &watch::Receiver<bool>) -> GenerateResult<()> {
    if *cancel.borrow() {
        return Err(GenerateError::Cancelled);
    }
    Ok(())
}

/// Run a planning-tool call off the async workers
async fn blocking<T, F>(step: &str, f: F) -> GenerateResult<T>
where
    F: FnOnce() -> GenerateResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| GenerateError::ExecutorFailed {
            command: step.to_string(),
            message: format!("Task panicked: {}", e),
            exit_code: None,
        })?
}
