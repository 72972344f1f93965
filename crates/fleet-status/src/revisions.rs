//! Charm freshness.
//!
//! Deployed charm references are grouped by the repository they came from,
//! each repository answers one bulk query for its latest revisions, and the
//! results are folded back into service and unit statuses as
//! "out of date" annotations. A failing repository only degrades the
//! annotations of its own charms.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use fleet_state::{CharmUrl, ids};
use futures_util::stream::{self, StreamExt};
use tracing::{debug, error};

use crate::snapshot::{ServiceStatus, UnitStatus};

/// Latest-revision answer for one charm in a bulk query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharmInfo {
    pub revision: i64,
    /// Lookup problems for this charm; the first one is reported.
    pub errors: Vec<String>,
}

/// A source of charms that can report their latest revisions.
#[async_trait]
pub trait CharmRepository: Send + Sync {
    /// Returns one info per requested charm, in request order.
    async fn infos(&self, charms: &[CharmUrl]) -> anyhow::Result<Vec<CharmInfo>>;
}

/// A repository together with the identity charms are grouped by.
#[derive(Clone)]
pub struct RepositoryHandle {
    pub key: String,
    pub repository: Arc<dyn CharmRepository>,
}

/// Infers which repository a charm reference comes from.
pub trait RepositoryResolver: Send + Sync {
    fn infer(&self, charm: &CharmUrl) -> anyhow::Result<RepositoryHandle>;
}

/// Resolves repositories by charm URL schema (`cs`, `local`).
#[derive(Default, Clone)]
pub struct RepositoryRegistry {
    by_schema: HashMap<String, Arc<dyn CharmRepository>>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repository(
        mut self,
        schema: impl Into<String>,
        repository: Arc<dyn CharmRepository>,
    ) -> Self {
        self.by_schema.insert(schema.into(), repository);
        self
    }
}

impl RepositoryResolver for RepositoryRegistry {
    fn infer(&self, charm: &CharmUrl) -> anyhow::Result<RepositoryHandle> {
        let repository = self
            .by_schema
            .get(&charm.schema)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no repository for charm schema {:?}", charm.schema))?;
        Ok(RepositoryHandle {
            key: charm.schema.clone(),
            repository,
        })
    }
}

/// Latest known revision of a base charm, or why it is unknown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RevisionInfo {
    pub revision: i64,
    pub err: Option<String>,
}

impl RevisionInfo {
    fn failed(err: impl ToString) -> Self {
        Self {
            revision: 0,
            err: Some(err.to_string()),
        }
    }
}

/// Latest revisions keyed by base charm reference.
pub type RepoRevisions = BTreeMap<CharmUrl, RevisionInfo>;

/// Deployed revisions of a service and of its units, keyed by unit name.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRevision {
    pub base: CharmUrl,
    pub revision: i64,
    pub units: BTreeMap<String, i64>,
}

/// Looks up the latest revision of every base charm in `charms`.
///
/// One bulk query per repository, up to `concurrency` in flight. Results
/// are merged here, after all queries finish.
pub async fn resolve_revisions(
    resolver: &dyn RepositoryResolver,
    charms: &BTreeSet<CharmUrl>,
    concurrency: usize,
) -> RepoRevisions {
    let mut revisions = RepoRevisions::new();
    let mut groups: BTreeMap<String, (Arc<dyn CharmRepository>, Vec<CharmUrl>)> = BTreeMap::new();

    for charm in charms {
        let base = charm.base();
        match resolver.infer(&base) {
            Ok(handle) => groups
                .entry(handle.key)
                .or_insert_with(|| (handle.repository, Vec::new()))
                .1
                .push(base),
            Err(e) => {
                revisions.insert(base, RevisionInfo::failed(e));
            }
        }
    }

    let results: Vec<_> = stream::iter(groups)
        .map(|(key, (repository, charms))| async move {
            let result = repository.infos(&charms).await;
            (key, charms, result)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    for (key, charms, result) in results {
        let infos = match result {
            Ok(infos) if infos.len() == charms.len() => infos,
            Ok(infos) => {
                let e = anyhow::anyhow!(
                    "repository returned {} results for {} charms",
                    infos.len(),
                    charms.len()
                );
                error!(repository = %key, error = %e, "finding charm revision info");
                record_failure(&mut revisions, charms, &e);
                continue;
            }
            Err(e) => {
                // A bad repository must not take the whole status down.
                error!(repository = %key, error = %e, "finding charm revision info");
                record_failure(&mut revisions, charms, &e);
                continue;
            }
        };
        debug!(repository = %key, charms = charms.len(), "charm revisions resolved");
        for (charm, info) in charms.into_iter().zip(infos) {
            let entry = match info.errors.first() {
                Some(first) => RevisionInfo::failed(first),
                None => RevisionInfo {
                    revision: info.revision,
                    err: None,
                },
            };
            revisions.insert(charm, entry);
        }
    }
    revisions
}

fn record_failure(revisions: &mut RepoRevisions, charms: Vec<CharmUrl>, err: &anyhow::Error) {
    for charm in charms {
        revisions.insert(charm, RevisionInfo::failed(err));
    }
}

/// Annotates services and their units with revision status.
///
/// A service is out of date when its repository has a newer revision. A
/// unit is only annotated separately when it runs a revision other than
/// its service's and that revision is behind the repository; a unit that
/// never reported a revision is "unknown".
pub fn annotate_revisions(
    services: &mut BTreeMap<String, ServiceStatus>,
    deployed: &BTreeMap<String, ServiceRevision>,
    latest: &RepoRevisions,
) {
    for (name, status) in services.iter_mut() {
        let Some(service) = deployed.get(name) else {
            continue;
        };
        let repo = latest.get(&service.base).cloned().unwrap_or_default();
        if let Some(err) = &repo.err {
            status.revision_status = format!("unknown: {err}");
            continue;
        }
        if repo.revision > service.revision {
            status.revision_status = out_of_date(repo.revision);
        }
        annotate_units(&mut status.units, deployed, latest);
    }
}

fn annotate_units(
    units: &mut BTreeMap<String, UnitStatus>,
    deployed: &BTreeMap<String, ServiceRevision>,
    latest: &RepoRevisions,
) {
    for (name, unit) in units.iter_mut() {
        if let Some(service) = deployed.get(ids::unit_service(name)) {
            let repo = latest.get(&service.base).cloned().unwrap_or_default();
            let revision = service.units.get(name).copied().unwrap_or(0);
            if revision <= 0 {
                unit.revision_status = "unknown".to_string();
            } else if revision != service.revision && repo.revision > revision {
                unit.revision_status = out_of_date(repo.revision);
            }
        }
        annotate_units(&mut unit.subordinates, deployed, latest);
    }
}

fn out_of_date(available: i64) -> String {
    format!("out of date (available: {available})")
}
