//! Collaborators the status engine reads from.
//!
//! - [`StateSource`]: the state store (machines, services, units,
//!   relations, agent records). Implemented for [`StateStore`].
//! - [`InstanceProvider`]: the cloud provider's view of running instances.

use async_trait::async_trait;
use fleet_state::{
    AgentStatus, HardwareCharacteristics, Machine, Relation, Service, StateResult, StateStore,
    Unit,
};

/// Read access to the state store for one status query.
pub trait StateSource: Send + Sync {
    /// All machines, sorted by id.
    fn all_machines(&self) -> StateResult<Vec<Machine>>;

    fn all_services(&self) -> StateResult<Vec<Service>>;

    fn service_units(&self, service: &str) -> StateResult<Vec<Unit>>;

    fn service_relations(&self, service: &str) -> StateResult<Vec<Relation>>;

    fn agent_alive(&self, tag: &str) -> StateResult<bool>;

    fn agent_version(&self, tag: &str) -> StateResult<String>;

    fn agent_status(&self, tag: &str) -> StateResult<(AgentStatus, String)>;

    fn machine_instance_id(&self, machine: &Machine) -> StateResult<String> {
        machine.instance_id().map(str::to_string)
    }

    fn machine_hardware(&self, machine: &Machine) -> StateResult<HardwareCharacteristics> {
        machine.hardware().cloned()
    }
}

impl StateSource for StateStore {
    fn all_machines(&self) -> StateResult<Vec<Machine>> {
        self.list_machines()
    }

    fn all_services(&self) -> StateResult<Vec<Service>> {
        self.list_services()
    }

    fn service_units(&self, service: &str) -> StateResult<Vec<Unit>> {
        self.list_units_for_service(service)
    }

    fn service_relations(&self, service: &str) -> StateResult<Vec<Relation>> {
        self.list_relations_for_service(service)
    }

    fn agent_alive(&self, tag: &str) -> StateResult<bool> {
        StateStore::agent_alive(self, tag)
    }

    fn agent_version(&self, tag: &str) -> StateResult<String> {
        StateStore::agent_version(self, tag)
    }

    fn agent_status(&self, tag: &str) -> StateResult<(AgentStatus, String)> {
        StateStore::agent_status(self, tag)
    }
}

/// A cloud instance as seen by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub id: String,
    /// Public DNS name, once the provider has assigned one.
    pub dns_name: Option<String>,
    /// Provider-specific state string ("running", "pending", ...).
    pub status: String,
}

/// The environment's cloud provider.
#[async_trait]
pub trait InstanceProvider: Send + Sync {
    fn environment_name(&self) -> String;

    async fn all_instances(&self) -> anyhow::Result<Vec<Instance>>;
}
