//! Ordered, idempotent rewrites of the generated configuration.
//!
//! Every pass parses its file, transforms the tree and only writes the file
//! back when the rendered bytes changed. A file that does not parse aborts
//! the pipeline.

pub mod json_fields;
pub mod orphans;
pub mod preferred_names;
pub mod sensitive;
pub mod sort;
pub mod strip_defaults;

use std::path::Path;

use crate::generate::error::GenerateResult;
use crate::generate::imports::{imports_file, resources_file};
use crate::registry::Registry;
use crate::syntax::{self, Document};
use crate::traits::{FileSystem, Output};
use strip_defaults::DefaultRule;

/// Knobs of one pipeline run
#[derive(Debug, Clone)]
pub struct PostprocessOptions {
    /// Provider-side defaults removed in addition to empty values
    pub strip_defaults: Vec<DefaultRule>,
    /// Keep discovered secrets instead of the placeholder
    pub output_credentials: bool,
    pub json_extract_threshold: usize,
}

impl Default for PostprocessOptions {
    fn default() -> Self {
        Self {
            strip_defaults: Vec::new(),
            output_credentials: false,
            json_extract_threshold: json_fields::DEFAULT_EXTRACT_THRESHOLD,
        }
    }
}

/// The passes of one provider scope, in order
pub struct Pipeline<'a> {
    fs: &'a dyn FileSystem,
    output: &'a dyn Output,
    registry: &'a Registry,
    options: &'a PostprocessOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        fs: &'a dyn FileSystem,
        output: &'a dyn Output,
        registry: &'a Registry,
        options: &'a PostprocessOptions,
    ) -> Self {
        Self {
            fs,
            output,
            registry,
            options,
        }
    }

    pub fn run(&self, dir: &Path, scope: &str) -> GenerateResult<()> {
        let resources = dir.join(resources_file(scope));
        let imports = dir.join(imports_file(scope));

        self.output.info("Stripping default values");
        self.strip_defaults(&resources)?;

        if !self.options.output_credentials {
            self.output.info("Replacing sensitive values");
            self.replace_sensitive(&resources)?;
        }

        self.output.info("Removing orphaned imports");
        self.remove_orphaned_imports(&resources, &imports)?;

        self.output.info("Applying preferred resource names");
        self.apply_preferred_names(&resources, &imports, scope)?;

        self.output.info("Wrapping JSON fields");
        self.wrap_json_fields(&resources)?;

        self.output.info("Extracting large JSON documents");
        self.extract_large_json(dir, &resources)?;

        self.output.info("Sorting resources");
        self.sort(&resources)?;

        Ok(())
    }

    pub fn strip_defaults(&self, resources: &Path) -> GenerateResult<bool> {
        syntax::postprocess_file(self.fs, self.output, resources, |body| {
            strip_defaults::strip_defaults(body, &self.options.strip_defaults);
            Ok(())
        })
    }

    pub fn replace_sensitive(&self, resources: &Path) -> GenerateResult<bool> {
        syntax::postprocess_file(self.fs, self.output, resources, |body| {
            sensitive::replace_sensitive(body, self.registry);
            Ok(())
        })
    }

    pub fn remove_orphaned_imports(&self, resources: &Path, imports: &Path) -> GenerateResult<bool> {
        let text = self.fs.read_to_string(resources)?;
        let addresses = orphans::resource_addresses(&Document::parse(resources, &text)?.body);

        syntax::postprocess_file(self.fs, self.output, imports, |body| {
            let removed = orphans::remove_orphaned_imports(body, &addresses);
            if removed > 0 {
                self.output
                    .dimmed(&format!("Removed {} import(s) without a resource", removed));
            }
            Ok(())
        })
    }

    /// Both files are parsed and transformed before either is written
    pub fn apply_preferred_names(
        &self,
        resources: &Path,
        imports: &Path,
        scope: &str,
    ) -> GenerateResult<bool> {
        let resources_text = self.fs.read_to_string(resources)?;
        let imports_text = self.fs.read_to_string(imports)?;
        let mut resources_doc = Document::parse(resources, &resources_text)?;
        let mut imports_doc = Document::parse(imports, &imports_text)?;

        let renamed = preferred_names::apply_preferred_names(
            &mut resources_doc.body,
            &mut imports_doc.body,
            self.registry,
            scope,
        )?;
        if renamed == 0 {
            return Ok(false);
        }

        // Render both up front so a failure leaves neither file touched
        resources_doc.render()?;
        imports_doc.render()?;

        let resources_changed =
            syntax::write_if_changed(self.fs, self.output, resources, &resources_text, &resources_doc)?;
        let imports_changed =
            syntax::write_if_changed(self.fs, self.output, imports, &imports_text, &imports_doc)?;
        Ok(resources_changed || imports_changed)
    }

    pub fn wrap_json_fields(&self, resources: &Path) -> GenerateResult<bool> {
        syntax::postprocess_file(self.fs, self.output, resources, |body| {
            json_fields::wrap_json_fields(body, self.options.json_extract_threshold);
            Ok(())
        })
    }

    /// Side files are written before the configuration that points at them
    pub fn extract_large_json(&self, dir: &Path, resources: &Path) -> GenerateResult<bool> {
        let text = self.fs.read_to_string(resources)?;
        let mut document = Document::parse(resources, &text)?;

        let files =
            json_fields::extract_large_json(&mut document.body, self.options.json_extract_threshold)?;
        if files.is_empty() {
            return Ok(false);
        }

        for file in &files {
            let path = dir.join(&file.relative_path);
            self.output.dimmed(&format!("Writing file: {}", path.display()));
            self.fs.write(&path, &file.contents)?;
        }

        syntax::write_if_changed(self.fs, self.output, resources, &text, &document)
    }

    pub fn sort(&self, resources: &Path) -> GenerateResult<bool> {
        syntax::postprocess_file(self.fs, self.output, resources, |body| {
            sort::sort_resources(body);
            Ok(())
        })
    }
}
