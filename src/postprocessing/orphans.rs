use std::collections::BTreeSet;

use hcl::{Body, Structure};

use crate::syntax;

/// `(kind, name)` of every resource block
pub fn resource_addresses(resources: &Body) -> BTreeSet<(String, String)> {
    resources
        .blocks()
        .filter_map(syntax::resource_address)
        .collect()
}

/// Drop import blocks whose target has no resource block. Returns how many
/// were removed.
pub fn remove_orphaned_imports(imports: &mut Body, resources: &BTreeSet<(String, String)>) -> usize {
    let before = imports.0.len();

    imports.0.retain(|structure| {
        let Structure::Block(block) = structure else {
            return true;
        };
        if block.identifier.as_str() != "import" {
            return true;
        }
        let Some(to) = syntax::get_attribute(&block.body, "to") else {
            return true;
        };
        match syntax::traversal_path(&to.expr).as_deref() {
            Some([kind, name]) => resources.contains(&(kind.clone(), name.clone())),
            _ => true,
        }
    });

    before - imports.0.len()
}
