//! Boundary to the external planning tool.

use std::path::Path;
use std::sync::Arc;

use crate::generate::error::{GenerateError, GenerateResult};
use crate::generate::state::PlannedState;
use crate::traits::{CommandExecutor, FileSystem};

pub const DEFAULT_BINARY: &str = "terraform";

/// Outcome of a config-generating plan that did not fail outright
#[derive(Debug)]
pub enum PlanOutcome {
    Complete,
    /// The tool reported an error but still wrote usable output
    Partial(GenerateError),
}

/// Operations the generator needs from the planning tool
pub trait PlanExecutor: Send + Sync {
    /// Install providers into the working directory
    fn init(&self, dir: &Path) -> GenerateResult<()>;

    /// Plan the import blocks in `dir`, writing synthesized resource blocks to
    /// `out_file`. An empty `targets` plans everything.
    fn plan_generate(
        &self,
        dir: &Path,
        out_file: &str,
        targets: &[String],
    ) -> GenerateResult<PlanOutcome>;

    /// Resolved attribute values of every managed resource in `dir`
    fn planned_state(&self, dir: &Path, scope: &str) -> GenerateResult<PlannedState>;
}

/// Drives the `terraform` (or compatible) binary
pub struct TerraformExecutor {
    binary: String,
    command: Arc<dyn CommandExecutor>,
    fs: Arc<dyn FileSystem>,
}

impl TerraformExecutor {
    pub fn new(binary: &str, command: Arc<dyn CommandExecutor>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            binary: binary.to_string(),
            command,
            fs,
        }
    }

    /// Run the binary, returning stdout on success
    fn run(&self, args: &[&str], dir: &Path) -> GenerateResult<String> {
        let command_line = format!("{} {}", self.binary, args.join(" "));
        let output = self
            .command
            .execute(&self.binary, args, dir)
            .map_err(|e| GenerateError::ExecutorFailed {
                command: command_line.clone(),
                message: format!("{:#}", e),
                exit_code: None,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let message = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(GenerateError::ExecutorFailed {
                command: command_line,
                message: message.to_string(),
                exit_code: output.status.code(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl PlanExecutor for TerraformExecutor {
    fn init(&self, dir: &Path) -> GenerateResult<()> {
        self.run(&["init", "-input=false", "-no-color"], dir)?;
        Ok(())
    }

    fn plan_generate(
        &self,
        dir: &Path,
        out_file: &str,
        targets: &[String],
    ) -> GenerateResult<PlanOutcome> {
        // The tool refuses to overwrite an existing output file
        let out_path = dir.join(out_file);
        if self.fs.exists(&out_path) {
            self.fs.remove_file(&out_path)?;
        }

        let generate_arg = format!("-generate-config-out={}", out_file);
        let target_args: Vec<String> = targets.iter().map(|t| format!("-target={}", t)).collect();
        let mut args = vec!["plan", "-input=false", "-no-color", generate_arg.as_str()];
        args.extend(target_args.iter().map(String::as_str));

        match self.run(&args, dir) {
            Ok(_) => Ok(PlanOutcome::Complete),
            Err(error) => {
                let produced = self.fs.is_file(&out_path) && self.fs.file_len(&out_path)? > 0;
                if produced {
                    Ok(PlanOutcome::Partial(error))
                } else {
                    Err(error)
                }
            }
        }
    }

    fn planned_state(&self, dir: &Path, scope: &str) -> GenerateResult<PlannedState> {
        let plan_file = format!("{}.tfplan", scope);
        let out_arg = format!("-out={}", plan_file);
        self.run(&["plan", "-input=false", "-no-color", out_arg.as_str()], dir)?;

        let json = self.run(&["show", "-json", plan_file.as_str()], dir)?;
        let state = PlannedState::from_plan_json(&json)?;

        let plan_path = dir.join(&plan_file);
        if self.fs.exists(&plan_path) {
            self.fs.remove_file(&plan_path)?;
        }

        Ok(state)
    }
}
