use std::fmt;
use std::path::PathBuf;

/// Errors raised while generating configuration
#[derive(Debug)]
pub enum GenerateError {
    /// Output directory exists and clobbering was not requested
    OutputDirExists(PathBuf),

    /// Include filter is not a valid glob
    InvalidFilter { pattern: String, message: String },

    /// Identifier does not fit the kind's codec
    InvalidIdentifier(String),

    /// A discovery function failed for one resource kind
    Discovery { resource: String, message: String },

    /// External planning tool failed
    ExecutorFailed {
        command: String,
        message: String,
        exit_code: Option<i32>,
    },

    /// Configuration text could not be parsed
    Parse { path: PathBuf, message: String },

    /// A resource block has no entry in the planned state
    MissingPlannedResource { kind: String, name: String },

    /// Run was cancelled before it finished
    Cancelled,

    /// Invalid CLI or settings input
    InvalidInput(String),

    /// Backend API error
    Api(String),

    /// File system operation failed
    FileSystem(String),

    /// Serialization error
    Serialization(String),

    /// General I/O error
    Io(std::io::Error),
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerateError::OutputDirExists(dir) => {
                write!(
                    f,
                    "output dir {:?} already exists. Use --clobber to delete it",
                    dir.display().to_string()
                )
            }
            GenerateError::InvalidFilter { pattern, message } => {
                write!(f, "Invalid include pattern '{}': {}", pattern, message)
            }
            GenerateError::InvalidIdentifier(msg) => write!(f, "{}", msg),
            GenerateError::Discovery { resource, message } => {
                write!(f, "Failed to discover {} resources: {}", resource, message)
            }
            GenerateError::ExecutorFailed {
                command,
                message,
                exit_code,
            } => {
                write!(f, "Command '{}' failed", command)?;

                if let Some(code) = exit_code {
                    write!(f, " (exit code {})", code)?;
                }

                write!(f, ": {}", message.trim())
            }
            GenerateError::Parse { path, message } => {
                write!(f, "Failed to parse {}: {}", path.display(), message)
            }
            GenerateError::MissingPlannedResource { kind, name } => {
                write!(f, "resource {}.{} not found in planned state", kind, name)
            }
            GenerateError::Cancelled => write!(f, "Generation cancelled"),
            GenerateError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            GenerateError::Api(msg) => write!(f, "API error: {}", msg),
            GenerateError::FileSystem(msg) => write!(f, "File system error: {}", msg),
            GenerateError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            GenerateError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for GenerateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GenerateError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GenerateError {
    fn from(err: std::io::Error) -> Self {
        GenerateError::Io(err)
    }
}

impl From<serde_json::Error> for GenerateError {
    fn from(err: serde_json::Error) -> Self {
        GenerateError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for GenerateError {
    fn from(err: serde_yaml::Error) -> Self {
        GenerateError::Serialization(err.to_string())
    }
}

impl From<hcl::Error> for GenerateError {
    fn from(err: hcl::Error) -> Self {
        GenerateError::Serialization(err.to_string())
    }
}

impl From<glob::PatternError> for GenerateError {
    fn from(err: glob::PatternError) -> Self {
        GenerateError::InvalidFilter {
            pattern: String::new(),
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for GenerateError {
    fn from(err: anyhow::Error) -> Self {
        GenerateError::FileSystem(format!("{:#}", err))
    }
}

/// Result type for generation operations
pub type GenerateResult<T> = Result<T, GenerateError>;
