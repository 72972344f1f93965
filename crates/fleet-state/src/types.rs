//! Domain types for the fleet state store.
//!
//! These types represent the persisted state of machines, services, units,
//! relations, and agents. All types are serializable to/from JSON for
//! storage in redb tables.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::charm::CharmUrl;
use crate::error::{StateError, StateResult};
use crate::ids;

// ── Life ──────────────────────────────────────────────────────────

/// Lifecycle stage of a machine, service, or unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Life {
    #[default]
    Alive,
    Dying,
    Dead,
}

impl fmt::Display for Life {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Life::Alive => "alive",
            Life::Dying => "dying",
            Life::Dead => "dead",
        })
    }
}

// ── Agent ─────────────────────────────────────────────────────────

/// Status reported by a machine or unit agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Pending,
    Installed,
    Started,
    Stopped,
    Error,
    Down,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AgentStatus::Pending => "pending",
            AgentStatus::Installed => "installed",
            AgentStatus::Started => "started",
            AgentStatus::Stopped => "stopped",
            AgentStatus::Error => "error",
            AgentStatus::Down => "down",
        })
    }
}

/// Agent bookkeeping for one machine or unit, keyed by agent tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentRecord {
    /// `machine-0`, `unit-mysql-0`.
    pub tag: String,
    /// Tools version the agent runs, once it has reported one.
    pub version: Option<String>,
    pub status: AgentStatus,
    /// Free-form detail accompanying `status`.
    pub status_info: String,
    /// Unix timestamp of the last presence ping.
    pub last_heartbeat: u64,
}

impl AgentRecord {
    /// True if the agent pinged within `window_secs` of `now`.
    pub fn is_alive(&self, now: u64, window_secs: u64) -> bool {
        self.last_heartbeat > 0 && now.saturating_sub(self.last_heartbeat) <= window_secs
    }
}

// ── Machine ───────────────────────────────────────────────────────

/// Hardware characteristics reported for a provisioned machine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HardwareCharacteristics {
    pub arch: Option<String>,
    pub mem_mb: Option<u64>,
    pub root_disk_mb: Option<u64>,
    pub cpu_cores: Option<u64>,
    pub cpu_power: Option<u64>,
}

impl fmt::Display for HardwareCharacteristics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(arch) = &self.arch {
            parts.push(format!("arch={arch}"));
        }
        if let Some(cores) = self.cpu_cores {
            parts.push(format!("cpu-cores={cores}"));
        }
        if let Some(power) = self.cpu_power {
            parts.push(format!("cpu-power={power}"));
        }
        if let Some(mem) = self.mem_mb {
            parts.push(format!("mem={mem}M"));
        }
        if let Some(disk) = self.root_disk_mb {
            parts.push(format!("root-disk={disk}M"));
        }
        f.write_str(&parts.join(" "))
    }
}

/// A machine or (nested) container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Machine {
    /// Hierarchical id: `3`, `3/lxc/1`, `3/lxc/1/kvm/0`.
    pub id: String,
    pub life: Life,
    pub series: String,
    /// Cloud instance backing this machine, once provisioned.
    pub instance_id: Option<String>,
    pub hardware: Option<HardwareCharacteristics>,
}

impl Machine {
    pub fn parent_id(&self) -> Option<&str> {
        ids::parent_id(&self.id)
    }

    pub fn tag(&self) -> String {
        ids::machine_tag(&self.id)
    }

    /// The provider instance id, or `NotProvisioned`.
    pub fn instance_id(&self) -> StateResult<&str> {
        self.instance_id
            .as_deref()
            .ok_or_else(|| StateError::NotProvisioned(self.id.clone()))
    }

    /// Hardware characteristics, or `NotFound` if none were recorded.
    pub fn hardware(&self) -> StateResult<&HardwareCharacteristics> {
        self.hardware
            .as_ref()
            .ok_or_else(|| StateError::NotFound(format!("hardware characteristics for machine {}", self.id)))
    }
}

// ── Service ───────────────────────────────────────────────────────

/// A deployed service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub name: String,
    pub charm_url: CharmUrl,
    pub exposed: bool,
    pub life: Life,
    /// False for services whose units run as subordinates.
    pub principal: bool,
}

// ── Unit ──────────────────────────────────────────────────────────

/// An opened port on a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub protocol: String,
    pub number: u16,
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.number, self.protocol)
    }
}

/// A single unit of a service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Unit {
    /// `{service}/{number}`.
    pub name: String,
    pub service: String,
    pub life: Life,
    /// Name of the principal unit this subordinate is attached to.
    /// `None` means the unit is itself a principal.
    pub principal: Option<String>,
    /// Assigned machine, principals only.
    pub machine_id: Option<String>,
    /// Names of subordinate units attached to this principal.
    pub subordinates: Vec<String>,
    /// Charm the unit reported running, if any.
    pub charm_url: Option<CharmUrl>,
    pub ports: Vec<Port>,
    pub public_address: Option<String>,
}

impl Unit {
    pub fn is_principal(&self) -> bool {
        self.principal.is_none()
    }

    pub fn principal_name(&self) -> Option<&str> {
        self.principal.as_deref()
    }

    pub fn tag(&self) -> String {
        ids::unit_tag(&self.name)
    }

    /// The machine this unit is assigned to, or `NotAssigned`.
    pub fn assigned_machine_id(&self) -> StateResult<&str> {
        self.machine_id
            .as_deref()
            .ok_or_else(|| StateError::NotAssigned(self.name.clone()))
    }
}

// ── Relation ──────────────────────────────────────────────────────

/// Role an endpoint plays in a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationRole {
    Provider,
    Requirer,
    Peer,
}

impl RelationRole {
    /// The role an endpoint must have to pair with this one.
    pub fn counterpart(self) -> Self {
        match self {
            RelationRole::Provider => RelationRole::Requirer,
            RelationRole::Requirer => RelationRole::Provider,
            RelationRole::Peer => RelationRole::Peer,
        }
    }
}

/// Whether a relation spans the whole environment or a single container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationScope {
    #[default]
    Global,
    Container,
}

/// Charm-declared relation an endpoint exposes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CharmRelation {
    pub name: String,
    pub role: RelationRole,
    pub interface: String,
    pub scope: RelationScope,
}

/// One side of a relation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Endpoint {
    pub service_name: String,
    pub relation: CharmRelation,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.service_name, self.relation.name)
    }
}

/// An established relation between service endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relation {
    pub id: u32,
    pub endpoints: Vec<Endpoint>,
}

impl Relation {
    /// Space-separated endpoint names, used as the table key.
    pub fn key(&self) -> String {
        self.endpoints
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn involves(&self, service: &str) -> bool {
        self.endpoints.iter().any(|ep| ep.service_name == service)
    }

    /// The endpoint `service` participates through.
    pub fn endpoint(&self, service: &str) -> StateResult<&Endpoint> {
        self.endpoints
            .iter()
            .find(|ep| ep.service_name == service)
            .ok_or_else(|| {
                StateError::Relation(format!(
                    "service {service:?} is not a member of {:?}",
                    self.key()
                ))
            })
    }

    /// Endpoints that pair with `service`'s endpoint. A peer relation
    /// returns the service's own endpoint.
    pub fn related_endpoints(&self, service: &str) -> StateResult<Vec<&Endpoint>> {
        let own = self.endpoint(service)?;
        let role = own.relation.role.counterpart();
        let related: Vec<&Endpoint> = self
            .endpoints
            .iter()
            .filter(|ep| ep.relation.role == role)
            .collect();
        if related.is_empty() {
            return Err(StateError::Relation(format!(
                "no endpoints of {:?} relate to service {service:?}",
                self.key()
            )));
        }
        Ok(related)
    }
}
