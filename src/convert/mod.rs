//! Terminal projections of the generated configuration into other formats.

pub mod json;
pub mod manifest;

use std::fmt;

use clap::ValueEnum;

/// Format the output directory ends up in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Native configuration syntax
    #[default]
    Hcl,
    /// `.tf.json` files with the same structure
    Json,
    /// Crossplane manifests built from the planned state
    Crossplane,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Hcl => "hcl",
            OutputFormat::Json => "json",
            OutputFormat::Crossplane => "crossplane",
        };
        write!(f, "{}", name)
    }
}
