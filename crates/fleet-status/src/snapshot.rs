//! Status snapshot, the engine's output.
//!
//! One consistent, immutable read of the deployment: top-level machines
//! with their nested containers, and services with their units (and the
//! units' subordinates). Field names serialize in kebab-case and empty
//! fields are omitted, ready for a CLI formatter or API encoder.

use std::collections::BTreeMap;

use fleet_state::AgentStatus;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct StatusSnapshot {
    pub environment: String,
    /// Keyed by top-level machine id.
    pub machines: BTreeMap<String, MachineStatus>,
    pub services: BTreeMap<String, ServiceStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct MachineStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_state: Option<AgentStatus>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub agent_state_info: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub agent_version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub dns_name: String,
    /// Provider instance id, or "pending"/"error" when none is available.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub instance_id: String,
    /// Provider state, or "missing" when the provider doesn't know the instance.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub instance_state: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub life: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub series: String,
    pub id: String,
    /// Direct children, keyed by container id.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub containers: BTreeMap<String, MachineStatus>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub hardware: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServiceStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
    pub charm: String,
    pub exposed: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub life: String,
    /// Related service names grouped by relation name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub relations: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subordinate_to: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub units: BTreeMap<String, UnitStatus>,
    #[serde(rename = "upgrade-status", skip_serializing_if = "String::is_empty")]
    pub revision_status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnitStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_state: Option<AgentStatus>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub agent_state_info: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub agent_version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub life: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub machine: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub open_ports: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub public_address: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub subordinates: BTreeMap<String, UnitStatus>,
    #[serde(rename = "upgrade-status", skip_serializing_if = "String::is_empty")]
    pub revision_status: String,
}

impl StatusSnapshot {
    /// Finds a machine or container anywhere in the hierarchy.
    pub fn machine(&self, id: &str) -> Option<&MachineStatus> {
        let top = self.machines.get(fleet_state::ids::top_parent_id(id))?;
        top.find(id)
    }

    /// Finds a unit by name, including units nested as subordinates.
    pub fn unit(&self, name: &str) -> Option<&UnitStatus> {
        self.services
            .values()
            .flat_map(|svc| svc.units.iter())
            .find_map(|(unit_name, unit)| {
                if unit_name == name {
                    Some(unit)
                } else {
                    unit.subordinates.get(name)
                }
            })
    }
}

impl MachineStatus {
    fn find(&self, id: &str) -> Option<&MachineStatus> {
        if self.id == id {
            return Some(self);
        }
        self.containers.values().find_map(|child| child.find(id))
    }
}
