//! Hierarchical machine ids.
//!
//! A top-level machine has a bare id (`3`). A container nested inside a
//! machine appends `/{container-type}/{number}` to its host's id, so
//! `3/lxc/1/kvm/0` is a kvm container inside lxc container `3/lxc/1`.

const SEPARATOR: char = '/';

/// Returns the id of the machine hosting `id`, or `None` for a top-level machine.
pub fn parent_id(id: &str) -> Option<&str> {
    let (rest, _number) = id.rsplit_once(SEPARATOR)?;
    let (parent, _kind) = rest.rsplit_once(SEPARATOR)?;
    Some(parent)
}

/// Returns the id of the top-level machine at the root of `id`'s tree.
pub fn top_parent_id(id: &str) -> &str {
    id.split(SEPARATOR).next().unwrap_or(id)
}

/// Number of container levels below the top-level machine (0 for a host).
pub fn nesting_level(id: &str) -> usize {
    id.matches(SEPARATOR).count() / 2
}

/// Iterates `id` followed by each of its ancestors, ending at the top-level machine.
pub fn ancestors(id: &str) -> impl Iterator<Item = &str> {
    std::iter::successors(Some(id), |current| parent_id(*current))
}

/// Agent tag for a machine id (`machine-3-lxc-1`).
pub fn machine_tag(id: &str) -> String {
    format!("machine-{}", id.replace(SEPARATOR, "-"))
}

/// Agent tag for a unit name (`unit-mysql-0`).
pub fn unit_tag(name: &str) -> String {
    format!("unit-{}", name.replace(SEPARATOR, "-"))
}

/// Service part of a unit name (`mysql` for `mysql/0`).
pub fn unit_service(name: &str) -> &str {
    name.split(SEPARATOR).next().unwrap_or(name)
}
