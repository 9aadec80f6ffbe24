use crate::generate::error::GenerateError;

/// How an error affects the run it was raised in
#[derive(Debug)]
pub enum GenerationError {
    /// Aborts the provider scope
    Critical(GenerateError),

    /// One resource kind failed, siblings still produced output
    NonCritical {
        resource: String,
        error: GenerateError,
    },
}

impl GenerationError {
    pub fn is_critical(&self) -> bool {
        matches!(self, GenerationError::Critical(_))
    }
}

impl std::fmt::Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationError::Critical(err) => write!(f, "{}", err),
            GenerationError::NonCritical { resource, error } => {
                write!(f, "{}: {}", resource, error)
            }
        }
    }
}

/// Blocks produced for one resource kind
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSuccess {
    pub kind: String,
    pub blocks: usize,
}

/// Outcome of one or more generation runs
#[derive(Debug, Default)]
pub struct GenerationResult {
    pub successes: Vec<ResourceSuccess>,
    pub errors: Vec<GenerationError>,
}

impl GenerationResult {
    /// Result holding a single critical error
    pub fn failure(error: GenerateError) -> Self {
        Self {
            successes: Vec::new(),
            errors: vec![GenerationError::Critical(error)],
        }
    }

    /// Total import blocks across kinds
    pub fn blocks(&self) -> usize {
        self.successes.iter().map(|s| s.blocks).sum()
    }

    pub fn has_critical(&self) -> bool {
        self.errors.iter().any(GenerationError::is_critical)
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push_critical(&mut self, error: GenerateError) {
        self.errors.push(GenerationError::Critical(error));
    }

    pub fn push_non_critical(&mut self, resource: &str, error: GenerateError) {
        self.errors.push(GenerationError::NonCritical {
            resource: resource.to_string(),
            error,
        });
    }

    pub fn merge(&mut self, other: GenerationResult) {
        self.successes.extend(other.successes);
        self.errors.extend(other.errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_and_criticality() {
        let mut result = GenerationResult::default();
        result.successes.push(ResourceSuccess {
            kind: "grafana_folder".to_string(),
            blocks: 3,
        });
        result.successes.push(ResourceSuccess {
            kind: "grafana_team".to_string(),
            blocks: 2,
        });
        result.push_non_critical(
            "grafana_user",
            GenerateError::Api("403 Forbidden".to_string()),
        );

        assert_eq!(result.blocks(), 5);
        assert!(!result.has_critical());
        assert!(!result.is_success());

        result.merge(GenerationResult::failure(GenerateError::Cancelled));
        assert!(result.has_critical());
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_non_critical_display() {
        let error = GenerationError::NonCritical {
            resource: "grafana_user".to_string(),
            error: GenerateError::Api("403 Forbidden".to_string()),
        };
        assert_eq!(error.to_string(), "grafana_user: API error: 403 Forbidden");
    }
}
