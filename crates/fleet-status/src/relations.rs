//! Per-service relation summary.

use std::collections::{BTreeMap, BTreeSet};

use fleet_state::{RelationScope, Service, StateResult};

use crate::source::StateSource;

/// Related services grouped by relation name, and the principals a
/// subordinate service is attached to. All lists are sorted and unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationSummary {
    pub related: BTreeMap<String, Vec<String>>,
    pub subordinate_to: Vec<String>,
}

/// Summarizes `service`'s relations. Any failure reading a relation or its
/// endpoints abandons the summary for this service.
pub fn process_relations(
    source: &dyn StateSource,
    service: &Service,
) -> StateResult<RelationSummary> {
    let mut related: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut subordinate_to = BTreeSet::new();

    for relation in source.service_relations(&service.name)? {
        let own = relation.endpoint(&service.name)?;
        for ep in relation.related_endpoints(&service.name)? {
            if ep.relation.scope == RelationScope::Container && !service.principal {
                subordinate_to.insert(ep.service_name.clone());
            }
            related
                .entry(own.relation.name.clone())
                .or_default()
                .insert(ep.service_name.clone());
        }
    }

    Ok(RelationSummary {
        related: related
            .into_iter()
            .map(|(name, services)| (name, services.into_iter().collect()))
            .collect(),
        subordinate_to: subordinate_to.into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_state::{
        CharmRelation, Endpoint, Life, Relation, RelationRole, StateStore,
    };

    fn service(name: &str, principal: bool) -> Service {
        Service {
            name: name.to_string(),
            charm_url: format!("cs:precise/{name}-1").parse().unwrap(),
            exposed: false,
            life: Life::Alive,
            principal,
        }
    }

    fn endpoint(service: &str, name: &str, role: RelationRole, scope: RelationScope) -> Endpoint {
        Endpoint {
            service_name: service.to_string(),
            relation: CharmRelation {
                name: name.to_string(),
                role,
                interface: "iface".to_string(),
                scope,
            },
        }
    }

    fn relation(id: u32, endpoints: Vec<Endpoint>) -> Relation {
        Relation { id, endpoints }
    }

    #[test]
    fn groups_related_services_by_relation_name() {
        let store = StateStore::open_in_memory().unwrap();
        for client in ["wordpress", "mediawiki", "drupal"] {
            store
                .put_relation(&relation(
                    0,
                    vec![
                        endpoint(client, "db", RelationRole::Requirer, RelationScope::Global),
                        endpoint("mysql", "server", RelationRole::Provider, RelationScope::Global),
                    ],
                ))
                .unwrap();
        }
        store
            .put_relation(&relation(
                1,
                vec![endpoint("mysql", "cluster", RelationRole::Peer, RelationScope::Global)],
            ))
            .unwrap();

        let summary = process_relations(&store, &service("mysql", true)).unwrap();
        assert_eq!(
            summary.related["server"],
            vec!["drupal", "mediawiki", "wordpress"]
        );
        assert_eq!(summary.related["cluster"], vec!["mysql"]);
        assert!(summary.subordinate_to.is_empty());
    }

    #[test]
    fn container_scope_marks_subordinate_service() {
        let store = StateStore::open_in_memory().unwrap();
        for principal in ["wordpress", "mysql"] {
            store
                .put_relation(&relation(
                    0,
                    vec![
                        endpoint(principal, "juju-info", RelationRole::Provider, RelationScope::Container),
                        endpoint("logging", "info", RelationRole::Requirer, RelationScope::Container),
                    ],
                ))
                .unwrap();
        }

        let logging = process_relations(&store, &service("logging", false)).unwrap();
        assert_eq!(logging.subordinate_to, vec!["mysql", "wordpress"]);
        assert_eq!(logging.related["info"], vec!["mysql", "wordpress"]);

        // The principal side never becomes subordinate.
        let wordpress = process_relations(&store, &service("wordpress", true)).unwrap();
        assert!(wordpress.subordinate_to.is_empty());
        assert_eq!(wordpress.related["juju-info"], vec!["logging"]);
    }

    #[test]
    fn unrelated_service_has_empty_summary() {
        let store = StateStore::open_in_memory().unwrap();
        let summary = process_relations(&store, &service("varnish", true)).unwrap();
        assert_eq!(summary, RelationSummary::default());
    }

    #[test]
    fn broken_relation_aborts_summary() {
        let store = StateStore::open_in_memory().unwrap();
        // Two requirers and no provider: nothing relates to either side.
        store
            .put_relation(&relation(
                0,
                vec![
                    endpoint("wordpress", "db", RelationRole::Requirer, RelationScope::Global),
                    endpoint("mysql", "db", RelationRole::Requirer, RelationScope::Global),
                ],
            ))
            .unwrap();

        let err = process_relations(&store, &service("wordpress", true)).unwrap_err();
        assert!(err.to_string().contains("relate to service"));
    }
}
