use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Output};

/// Runs external programs, allowing the planning tool to be mocked in tests
pub trait CommandExecutor: Send + Sync {
    /// Execute a command with arguments in `working_dir` and capture its output
    fn execute(&self, command: &str, args: &[&str], working_dir: &Path) -> Result<Output>;
}

/// Real command executor using std::process::Command
pub struct RealCommandExecutor;

impl RealCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RealCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(&self, command: &str, args: &[&str], working_dir: &Path) -> Result<Output> {
        let output = Command::new(command)
            .args(args)
            .current_dir(working_dir)
            .output()
            .with_context(|| format!("Failed to execute {} {}", command, args.join(" ")))?;

        Ok(output)
    }
}

/// Scripted command executor for tests
///
/// Results are matched on `"<command> <first arg>"` (for example `"terraform plan"`)
/// and consumed in the order they were queued. Every call is recorded.
#[cfg(test)]
pub struct MockCommandExecutor {
    outputs: std::sync::Mutex<Vec<MockCommandResult>>,
    calls: std::sync::Mutex<Vec<Vec<String>>>,
}

#[cfg(test)]
#[derive(Clone, Debug)]
pub struct MockCommandResult {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[cfg(test)]
impl MockCommandResult {
    pub fn ok(command: &str, stdout: &str) -> Self {
        Self {
            command: command.to_string(),
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn failed(command: &str, exit_code: i32, stderr: &str) -> Self {
        Self {
            command: command.to_string(),
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}

#[cfg(test)]
impl MockCommandExecutor {
    pub fn new() -> Self {
        Self::with_outputs(Vec::new())
    }

    pub fn with_outputs(outputs: Vec<MockCommandResult>) -> Self {
        Self {
            outputs: std::sync::Mutex::new(outputs),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Every invocation as `[command, args...]`
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl CommandExecutor for MockCommandExecutor {
    fn execute(&self, command: &str, args: &[&str], _working_dir: &Path) -> Result<Output> {
        let mut call = vec![command.to_string()];
        call.extend(args.iter().map(|a| a.to_string()));
        self.calls.lock().unwrap().push(call);

        let key = match args.first() {
            Some(first) => format!("{} {}", command, first),
            None => command.to_string(),
        };

        let mut outputs = self.outputs.lock().unwrap();
        if let Some(index) = outputs.iter().position(|r| r.command == key) {
            let result = outputs.remove(index);
            return Ok(Output {
                status: create_exit_status(result.exit_code),
                stdout: result.stdout.into_bytes(),
                stderr: result.stderr.into_bytes(),
            });
        }

        Ok(Output {
            status: create_exit_status(0),
            stdout: Vec::new(),
            stderr: Vec::new(),
        })
    }
}

#[cfg(test)]
fn create_exit_status(code: i32) -> std::process::ExitStatus {
    // ExitStatus can't be constructed directly
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        // Raw wait status: the exit code lives in the high byte
        std::process::ExitStatus::from_raw(code << 8)
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(code as u32)
    }
}
