//! Status aggregator: assembles one snapshot per query.
//!
//! ```text
//! status(patterns)
//!   ├── UnitMatcher::new         (invalid pattern → error, nothing fetched)
//!   ├── Topology::fetch          (services, units, machines, instances)
//!   ├── build_forest             (machine containment trees)
//!   ├── machine statuses         (agent state + instance cross-reference)
//!   ├── service statuses         (relations, units, subordinates)
//!   └── revisions                (bulk freshness queries, then annotation)
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use fleet_state::{CharmUrl, Machine, Service, Unit, ids};
use tracing::{Instrument, Span, debug, info};

use crate::agent::{MachineAgent, UnitAgent, derive_agent_state, life_annotation};
use crate::config::StatusConfig;
use crate::error::StatusResult;
use crate::hierarchy::{MachineNode, build_forest};
use crate::matcher::UnitMatcher;
use crate::relations::process_relations;
use crate::revisions::{RepositoryResolver, ServiceRevision, annotate_revisions, resolve_revisions};
use crate::snapshot::{MachineStatus, ServiceStatus, StatusSnapshot, UnitStatus};
use crate::source::{InstanceProvider, StateSource};
use crate::topology::Topology;

/// Produces status snapshots from the state store, the provider, and the
/// charm repositories.
pub struct StatusAggregator {
    source: Arc<dyn StateSource>,
    provider: Arc<dyn InstanceProvider>,
    repositories: Arc<dyn RepositoryResolver>,
    config: StatusConfig,
    /// Parent span for every event a query emits.
    span: Span,
}

impl StatusAggregator {
    pub fn new(
        source: Arc<dyn StateSource>,
        provider: Arc<dyn InstanceProvider>,
        repositories: Arc<dyn RepositoryResolver>,
    ) -> Self {
        Self {
            source,
            provider,
            repositories,
            config: StatusConfig::default(),
            span: Span::none(),
        }
    }

    /// Uses `config` for revision checks. The `[presence]` section is not
    /// read here: liveness comes from the state store, configured through
    /// [`PresenceConfig::apply`](crate::config::PresenceConfig::apply).
    pub fn with_config(mut self, config: StatusConfig) -> Self {
        self.config = config;
        self
    }

    /// Attribute this aggregator's log events to `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Takes a snapshot of the units matching `patterns` (all units if empty)
    /// and the machines, services, and relations around them.
    ///
    /// Fails only on invalid patterns, on state store listing failures, or
    /// on an inconsistent machine listing. Provider and repository failures
    /// degrade the affected annotations instead.
    pub async fn status<S: AsRef<str>>(&self, patterns: &[S]) -> StatusResult<StatusSnapshot> {
        let matcher = UnitMatcher::new(patterns)?;
        self.snapshot(&matcher).instrument(self.span.clone()).await
    }

    async fn snapshot(&self, matcher: &UnitMatcher) -> StatusResult<StatusSnapshot> {
        let topology = Topology::fetch(self.source.as_ref(), self.provider.as_ref(), matcher).await?;
        let forest = build_forest(&topology.machines)?;
        debug!(
            hosts = forest.len(),
            machines = forest.values().map(MachineNode::machine_count).sum::<usize>(),
            depth = topology
                .machines
                .iter()
                .map(|m| ids::nesting_level(&m.id))
                .max()
                .unwrap_or(0),
            "machine forest built"
        );

        let ctx = QueryContext {
            source: self.source.as_ref(),
            topology: &topology,
        };
        let machines = forest
            .iter()
            .map(|(id, node)| (id.clone(), ctx.machine_tree_status(node)))
            .collect();
        let mut services: BTreeMap<String, ServiceStatus> = topology
            .services
            .values()
            .map(|svc| (svc.name.clone(), ctx.service_status(svc)))
            .collect();

        if self.config.revisions.enabled {
            let deployed = ctx.deployed_revisions();
            let charms: BTreeSet<CharmUrl> = deployed.values().map(|r| r.base.clone()).collect();
            let latest = resolve_revisions(
                self.repositories.as_ref(),
                &charms,
                self.config.revisions.concurrency,
            )
            .await;
            annotate_revisions(&mut services, &deployed, &latest);
        } else {
            debug!("revision checks disabled");
        }

        info!(
            machines = topology.machines.len(),
            services = services.len(),
            "status snapshot assembled"
        );
        Ok(StatusSnapshot {
            environment: self.provider.environment_name(),
            machines,
            services,
        })
    }
}

/// Read-only view shared by the per-entity status builders of one query.
struct QueryContext<'a> {
    source: &'a dyn StateSource,
    topology: &'a Topology,
}

impl QueryContext<'_> {
    fn machine_tree_status(&self, node: &MachineNode<'_>) -> MachineStatus {
        let mut status = self.machine_status(node.machine);
        status.containers = node
            .children
            .iter()
            .map(|child| (child.machine.id.clone(), self.machine_tree_status(child)))
            .collect();
        status
    }

    fn machine_status(&self, machine: &Machine) -> MachineStatus {
        let agent = derive_agent_state(&MachineAgent::new(self.source, machine));
        let mut status = MachineStatus {
            id: machine.id.clone(),
            life: agent.life,
            agent_version: agent.version,
            agent_state: agent.status,
            agent_state_info: agent.info,
            err: agent.err,
            series: machine.series.clone(),
            ..MachineStatus::default()
        };

        match self.source.machine_instance_id(machine) {
            Ok(instance_id) => {
                match self.topology.instances.get(&instance_id) {
                    Some(inst) => {
                        status.dns_name = inst.dns_name.clone().unwrap_or_default();
                        status.instance_state = inst.status.clone();
                    }
                    // Recorded in state, yet unknown to the provider.
                    None => status.instance_state = "missing".to_string(),
                }
                status.instance_id = instance_id;
            }
            Err(e) => {
                status.instance_id = if e.is_not_provisioned() {
                    "pending".to_string()
                } else {
                    "error".to_string()
                };
                // Unprovisioned machines have no agent state worth showing.
                status.agent_state = None;
            }
        }

        match self.source.machine_hardware(machine) {
            Ok(hc) => status.hardware = hc.to_string(),
            Err(e) if e.is_not_found() => {}
            Err(_) => status.hardware = "error".to_string(),
        }
        status
    }

    fn service_status(&self, service: &Service) -> ServiceStatus {
        let mut status = ServiceStatus {
            charm: service.charm_url.to_string(),
            exposed: service.exposed,
            life: life_annotation(service.life),
            ..ServiceStatus::default()
        };
        match process_relations(self.source, service) {
            Ok(summary) => {
                status.relations = summary.related;
                status.subordinate_to = summary.subordinate_to;
            }
            Err(e) => {
                status.err = Some(e.to_string());
                return status;
            }
        }
        if service.principal {
            status.units = self
                .topology
                .units
                .get(&service.name)
                .into_iter()
                .flat_map(BTreeMap::values)
                .map(|unit| (unit.name.clone(), self.unit_status(unit)))
                .collect();
        }
        status
    }

    fn unit_status(&self, unit: &Unit) -> UnitStatus {
        let agent = derive_agent_state(&UnitAgent::new(self.source, unit));
        UnitStatus {
            err: agent.err,
            agent_state: agent.status,
            agent_state_info: agent.info,
            agent_version: agent.version,
            life: agent.life,
            machine: if unit.is_principal() {
                unit.assigned_machine_id().unwrap_or_default().to_string()
            } else {
                String::new()
            },
            open_ports: unit.ports.iter().map(ToString::to_string).collect(),
            public_address: unit.public_address.clone().unwrap_or_default(),
            // Subordinates filtered out of the query are left out here too.
            subordinates: unit
                .subordinates
                .iter()
                .filter_map(|name| self.topology.unit_by_name(name))
                .map(|sub| (sub.name.clone(), self.unit_status(sub)))
                .collect(),
            revision_status: String::new(),
        }
    }

    /// Deployed charm revisions of every kept service and its kept units.
    fn deployed_revisions(&self) -> BTreeMap<String, ServiceRevision> {
        self.topology
            .services
            .values()
            .map(|svc| {
                let units = self
                    .topology
                    .units
                    .get(&svc.name)
                    .into_iter()
                    .flat_map(BTreeMap::values)
                    .filter_map(|u| Some((u.name.clone(), u.charm_url.as_ref()?.revision_or_zero())))
                    .collect();
                let revision = ServiceRevision {
                    base: svc.charm_url.base(),
                    revision: svc.charm_url.revision_or_zero(),
                    units,
                };
                (svc.name.clone(), revision)
            })
            .collect()
    }
}
