//! Machine containment hierarchy.
//!
//! Rebuilds the forest of hosts and nested containers from the flat machine
//! listing. Machines are indexed by id into an arena; each node then owns
//! the list of its direct children, so any nesting depth is handled the
//! same way.

use std::collections::{BTreeMap, HashMap};

use fleet_state::Machine;
use tracing::error;

use crate::error::{StatusError, StatusResult};

/// A machine and the containers it directly hosts.
#[derive(Debug)]
pub struct MachineNode<'a> {
    pub machine: &'a Machine,
    /// Direct children, in listing order.
    pub children: Vec<MachineNode<'a>>,
}

impl MachineNode<'_> {
    /// Number of machines in this subtree, including the root.
    pub fn machine_count(&self) -> usize {
        1 + self.children.iter().map(MachineNode::machine_count).sum::<usize>()
    }
}

/// Builds one tree per top-level machine, keyed by the top-level id.
///
/// Every container's parent must be present in `machines`; a missing parent
/// means the listing is inconsistent and the whole build fails.
pub fn build_forest(machines: &[Machine]) -> StatusResult<BTreeMap<String, MachineNode<'_>>> {
    let index: HashMap<&str, usize> = machines
        .iter()
        .enumerate()
        .map(|(i, m)| (m.id.as_str(), i))
        .collect();

    let mut roots = Vec::new();
    let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
    for (i, machine) in machines.iter().enumerate() {
        match machine.parent_id() {
            None => roots.push(i),
            Some(parent) => {
                let Some(&parent_idx) = index.get(parent) else {
                    error!(id = %machine.id, %parent, "machine listed without its parent");
                    return Err(StatusError::Inconsistent(format!(
                        "unexpected machine id {:?}: parent {parent:?} not found",
                        machine.id
                    )));
                };
                children.entry(parent_idx).or_default().push(i);
            }
        }
    }

    Ok(roots
        .into_iter()
        .map(|root| (machines[root].id.clone(), build_node(machines, &children, root)))
        .collect())
}

fn build_node<'a>(
    machines: &'a [Machine],
    children: &HashMap<usize, Vec<usize>>,
    idx: usize,
) -> MachineNode<'a> {
    MachineNode {
        machine: &machines[idx],
        children: children
            .get(&idx)
            .map(|kids| {
                kids.iter()
                    .map(|&kid| build_node(machines, children, kid))
                    .collect()
            })
            .unwrap_or_default(),
    }
}
