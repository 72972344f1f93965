//! Raw entity sets for one status query.
//!
//! Services and units are filtered through the [`UnitMatcher`]; when a
//! filter is active only the machines hosting kept principal units (and
//! those machines' ancestors) are read. Instances come from the provider,
//! whose failure leaves the instance map empty instead of failing the query.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use fleet_state::{Machine, Service, Unit, ids};
use tracing::{debug, warn};

use crate::error::StatusResult;
use crate::matcher::UnitMatcher;
use crate::source::{Instance, InstanceProvider, StateSource};

/// Everything one query reads, fetched once and then only borrowed.
#[derive(Debug, Default)]
pub struct Topology {
    pub services: BTreeMap<String, Service>,
    /// Kept units: service name → unit name → unit.
    pub units: BTreeMap<String, BTreeMap<String, Unit>>,
    /// Kept machines, sorted by id.
    pub machines: Vec<Machine>,
    /// Provider instances by instance id.
    pub instances: HashMap<String, Instance>,
}

impl Topology {
    /// Reads services, units, machines, and instances for `matcher`.
    pub async fn fetch(
        source: &dyn StateSource,
        provider: &dyn InstanceProvider,
        matcher: &UnitMatcher,
    ) -> StatusResult<Self> {
        let (services, units) = fetch_services_and_units(source, matcher)?;
        let machine_ids = (!matcher.matches_any()).then(|| required_machine_ids(&units));
        let machines = fetch_machines(source, machine_ids.as_ref())?;
        let instances = fetch_instances(provider).await;
        debug!(
            services = services.len(),
            machines = machines.len(),
            instances = instances.len(),
            "topology fetched"
        );
        Ok(Self {
            services,
            units,
            machines,
            instances,
        })
    }

    /// A kept unit by name; `None` if it was filtered out.
    pub fn unit_by_name(&self, name: &str) -> Option<&Unit> {
        self.units.get(ids::unit_service(name))?.get(name)
    }
}

/// Kept services and their kept units. A service is kept if nothing is
/// filtered or at least one of its units matched.
pub fn fetch_services_and_units(
    source: &dyn StateSource,
    matcher: &UnitMatcher,
) -> StatusResult<(BTreeMap<String, Service>, BTreeMap<String, BTreeMap<String, Unit>>)> {
    let mut services = BTreeMap::new();
    let mut units = BTreeMap::new();
    for service in source.all_services()? {
        let kept: BTreeMap<String, Unit> = source
            .service_units(&service.name)?
            .into_iter()
            .filter(|u| matcher.match_unit(u))
            .map(|u| (u.name.clone(), u))
            .collect();
        if matcher.matches_any() || !kept.is_empty() {
            units.insert(service.name.clone(), kept);
            services.insert(service.name.clone(), service);
        }
    }
    Ok((services, units))
}

/// Machines hosting kept principal units, plus all their ancestors.
/// Unassigned principals occupy no machine and are skipped.
pub fn required_machine_ids(units: &BTreeMap<String, BTreeMap<String, Unit>>) -> BTreeSet<String> {
    units
        .values()
        .flat_map(BTreeMap::values)
        .filter(|u| u.is_principal())
        .filter_map(|u| u.assigned_machine_id().ok())
        .flat_map(ids::ancestors)
        .map(str::to_string)
        .collect()
}

/// All machines, or only those in `wanted`, in listing order.
pub fn fetch_machines(
    source: &dyn StateSource,
    wanted: Option<&BTreeSet<String>>,
) -> StatusResult<Vec<Machine>> {
    let mut machines = source.all_machines()?;
    if let Some(wanted) = wanted {
        machines.retain(|m| wanted.contains(&m.id));
    }
    Ok(machines)
}

/// Provider instances by id. A listing failure is logged and yields an
/// empty map; machines then show their instance as missing.
pub async fn fetch_instances(provider: &dyn InstanceProvider) -> HashMap<String, Instance> {
    match provider.all_instances().await {
        Ok(instances) => instances
            .into_iter()
            .map(|inst| (inst.id.clone(), inst))
            .collect(),
        Err(e) => {
            warn!(error = %e, "listing provider instances failed; instance states degraded");
            HashMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use fleet_state::{Life, StateStore};

    use super::*;

    struct StaticProvider(Option<Vec<Instance>>);

    #[async_trait]
    impl InstanceProvider for StaticProvider {
        fn environment_name(&self) -> String {
            "test".to_string()
        }

        async fn all_instances(&self) -> anyhow::Result<Vec<Instance>> {
            self.0
                .clone()
                .ok_or_else(|| anyhow::anyhow!("provider unavailable"))
        }
    }

    fn machine(id: &str) -> Machine {
        Machine {
            id: id.to_string(),
            life: Life::Alive,
            series: "precise".to_string(),
            instance_id: None,
            hardware: None,
        }
    }

    fn service(name: &str, principal: bool) -> Service {
        Service {
            name: name.to_string(),
            charm_url: format!("cs:precise/{name}-1").parse().unwrap(),
            exposed: false,
            life: Life::Alive,
            principal,
        }
    }

    fn unit(name: &str, machine: Option<&str>, principal: Option<&str>, subs: &[&str]) -> Unit {
        Unit {
            name: name.to_string(),
            service: ids::unit_service(name).to_string(),
            life: Life::Alive,
            principal: principal.map(str::to_string),
            machine_id: machine.map(str::to_string),
            subordinates: subs.iter().map(|s| s.to_string()).collect(),
            charm_url: None,
            ports: Vec::new(),
            public_address: None,
        }
    }

    /// wordpress/0 on 0/lxc/0 with logging/0; mysql/0 on 1/lxc/0/kvm/0; 2 idle.
    fn fixture() -> StateStore {
        let store = StateStore::open_in_memory().unwrap();
        for id in ["0", "0/lxc/0", "0/lxc/1", "1", "1/lxc/0", "1/lxc/0/kvm/0", "2"] {
            store.put_machine(&machine(id)).unwrap();
        }
        store.put_service(&service("wordpress", true)).unwrap();
        store.put_service(&service("mysql", true)).unwrap();
        store.put_service(&service("logging", false)).unwrap();
        store
            .put_unit(&unit("wordpress/0", Some("0/lxc/0"), None, &["logging/0"]))
            .unwrap();
        store.put_unit(&unit("mysql/0", Some("1/lxc/0/kvm/0"), None, &[])).unwrap();
        store.put_unit(&unit("mysql/1", None, None, &[])).unwrap();
        store
            .put_unit(&unit("logging/0", None, Some("wordpress/0"), &[]))
            .unwrap();
        store
    }

    #[tokio::test]
    async fn unfiltered_reads_everything() {
        let store = fixture();
        let provider = StaticProvider(Some(vec![Instance {
            id: "i-0".to_string(),
            dns_name: None,
            status: "running".to_string(),
        }]));
        let topology = Topology::fetch(&store, &provider, &UnitMatcher::default())
            .await
            .unwrap();

        assert_eq!(topology.services.len(), 3);
        assert_eq!(topology.units["mysql"].len(), 2);
        assert_eq!(topology.machines.len(), 7);
        assert!(topology.instances.contains_key("i-0"));
        assert!(topology.unit_by_name("logging/0").is_some());
    }

    #[tokio::test]
    async fn filter_restricts_services_and_machines() {
        let store = fixture();
        let provider = StaticProvider(Some(Vec::new()));
        let matcher = UnitMatcher::new(&["mysql/0"]).unwrap();
        let topology = Topology::fetch(&store, &provider, &matcher).await.unwrap();

        assert_eq!(topology.services.keys().collect::<Vec<_>>(), vec!["mysql"]);
        assert_eq!(topology.units["mysql"].keys().collect::<Vec<_>>(), vec!["mysql/0"]);
        let ids: Vec<&str> = topology.machines.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "1/lxc/0", "1/lxc/0/kvm/0"]);
    }

    #[tokio::test]
    async fn subordinate_pattern_keeps_principal_machine() {
        let store = fixture();
        let provider = StaticProvider(Some(Vec::new()));
        let matcher = UnitMatcher::new(&["logging"]).unwrap();
        let topology = Topology::fetch(&store, &provider, &matcher).await.unwrap();

        assert_eq!(
            topology.services.keys().collect::<Vec<_>>(),
            vec!["logging", "wordpress"]
        );
        let ids: Vec<&str> = topology.machines.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["0", "0/lxc/0"]);
    }

    #[tokio::test]
    async fn provider_failure_is_not_fatal() {
        let store = fixture();
        let provider = StaticProvider(None);
        let topology = Topology::fetch(&store, &provider, &UnitMatcher::default())
            .await
            .unwrap();

        assert!(topology.instances.is_empty());
        assert_eq!(topology.machines.len(), 7);
    }

    #[test]
    fn required_ids_skip_subordinates_and_unassigned() {
        let units = BTreeMap::from([
            (
                "mysql".to_string(),
                BTreeMap::from([
                    ("mysql/0".to_string(), unit("mysql/0", Some("3/lxc/2"), None, &[])),
                    ("mysql/1".to_string(), unit("mysql/1", None, None, &[])),
                ]),
            ),
            (
                "logging".to_string(),
                BTreeMap::from([(
                    "logging/0".to_string(),
                    unit("logging/0", Some("9"), Some("mysql/0"), &[]),
                )]),
            ),
        ]);
        let ids: Vec<String> = required_machine_ids(&units).into_iter().collect();
        assert_eq!(ids, vec!["3", "3/lxc/2"]);
    }
}
