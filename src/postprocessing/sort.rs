use hcl::{Body, Structure};

use crate::syntax;

/// Order resource blocks by kind then name. Everything that is not a resource
/// block keeps its relative order ahead of them.
pub fn sort_resources(body: &mut Body) {
    let structures = std::mem::take(&mut body.0);
    let (mut resources, others): (Vec<Structure>, Vec<Structure>) =
        structures.into_iter().partition(|s| match s {
            Structure::Block(block) => syntax::resource_address(block).is_some(),
            Structure::Attribute(_) => false,
        });

    resources.sort_by_cached_key(|s| match s {
        Structure::Block(block) => syntax::resource_address(block),
        Structure::Attribute(_) => None,
    });

    body.0 = others;
    body.0.extend(resources);
}
