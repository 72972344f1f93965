//! StateStore — redb-backed state persistence for the fleet.
//!
//! Provides typed CRUD operations over machines, services, units,
//! relations, and agent records. All values are JSON-serialized into
//! redb's `&[u8]` value columns. The store supports both on-disk and
//! in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Default window within which an agent heartbeat counts as alive.
pub const DEFAULT_PRESENCE_WINDOW: Duration = Duration::from_secs(60);

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
    presence_window: Duration,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self::from_database(db);
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self::from_database(db);
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn from_database(db: Database) -> Self {
        Self {
            db: Arc::new(db),
            presence_window: DEFAULT_PRESENCE_WINDOW,
        }
    }

    /// Override how recent a heartbeat must be for an agent to count as alive.
    pub fn with_presence_window(mut self, window: Duration) -> Self {
        self.presence_window = window;
        self
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        for table in [MACHINES, SERVICES, UNITS, RELATIONS, AGENTS] {
            txn.open_table(table).map_err(map_err!(Table))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Generic JSON table access ──────────────────────────────────

    fn put<T: Serialize>(&self, table: JsonTable, key: &str, value: &T) -> StateResult<()> {
        let value = serde_json::to_vec(value).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, table: JsonTable, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let value: T =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// List values in key order, keeping those whose key passes `filter`.
    fn list<T: DeserializeOwned>(
        &self,
        table: JsonTable,
        filter: impl Fn(&str) -> bool,
    ) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if filter(key.value()) {
                let value: T =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(value);
            }
        }
        Ok(results)
    }

    fn delete(&self, table: JsonTable, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    // ── Machines ───────────────────────────────────────────────────

    /// Insert or update a machine.
    pub fn put_machine(&self, machine: &Machine) -> StateResult<()> {
        self.put(MACHINES, &machine.id, machine)?;
        debug!(id = %machine.id, "machine stored");
        Ok(())
    }

    pub fn get_machine(&self, id: &str) -> StateResult<Option<Machine>> {
        self.get(MACHINES, id)
    }

    /// List all machines sorted by id. Every container follows its host.
    pub fn list_machines(&self) -> StateResult<Vec<Machine>> {
        self.list(MACHINES, |_| true)
    }

    /// Delete a machine by id. Returns true if it existed.
    pub fn delete_machine(&self, id: &str) -> StateResult<bool> {
        let existed = self.delete(MACHINES, id)?;
        debug!(%id, existed, "machine deleted");
        Ok(existed)
    }

    // ── Services ───────────────────────────────────────────────────

    /// Insert or update a service.
    pub fn put_service(&self, service: &Service) -> StateResult<()> {
        self.put(SERVICES, &service.name, service)?;
        debug!(name = %service.name, "service stored");
        Ok(())
    }

    pub fn get_service(&self, name: &str) -> StateResult<Option<Service>> {
        self.get(SERVICES, name)
    }

    pub fn list_services(&self) -> StateResult<Vec<Service>> {
        self.list(SERVICES, |_| true)
    }

    pub fn delete_service(&self, name: &str) -> StateResult<bool> {
        self.delete(SERVICES, name)
    }

    // ── Units ──────────────────────────────────────────────────────

    /// Insert or update a unit.
    pub fn put_unit(&self, unit: &Unit) -> StateResult<()> {
        self.put(UNITS, &unit.name, unit)
    }

    pub fn get_unit(&self, name: &str) -> StateResult<Option<Unit>> {
        self.get(UNITS, name)
    }

    /// List all units of a service (by `{service}/` key prefix).
    pub fn list_units_for_service(&self, service: &str) -> StateResult<Vec<Unit>> {
        let prefix = format!("{service}/");
        self.list(UNITS, |key| key.starts_with(&prefix))
    }

    pub fn delete_unit(&self, name: &str) -> StateResult<bool> {
        self.delete(UNITS, name)
    }

    // ── Relations ──────────────────────────────────────────────────

    /// Insert or update a relation.
    pub fn put_relation(&self, relation: &Relation) -> StateResult<()> {
        let key = relation.key();
        self.put(RELATIONS, &key, relation)?;
        debug!(%key, "relation stored");
        Ok(())
    }

    pub fn list_relations(&self) -> StateResult<Vec<Relation>> {
        self.list(RELATIONS, |_| true)
    }

    /// List relations that have an endpoint on `service`.
    pub fn list_relations_for_service(&self, service: &str) -> StateResult<Vec<Relation>> {
        Ok(self
            .list_relations()?
            .into_iter()
            .filter(|rel| rel.involves(service))
            .collect())
    }

    pub fn delete_relation(&self, key: &str) -> StateResult<bool> {
        self.delete(RELATIONS, key)
    }

    // ── Agents ─────────────────────────────────────────────────────

    /// Insert or update an agent record.
    pub fn put_agent(&self, agent: &AgentRecord) -> StateResult<()> {
        self.put(AGENTS, &agent.tag, agent)
    }

    pub fn get_agent(&self, tag: &str) -> StateResult<Option<AgentRecord>> {
        self.get(AGENTS, tag)
    }

    fn require_agent(&self, tag: &str) -> StateResult<AgentRecord> {
        self.get_agent(tag)?
            .ok_or_else(|| StateError::NotFound(format!("agent {tag}")))
    }

    /// Whether the agent's last heartbeat falls within the presence window.
    /// An agent that never reported is not alive.
    pub fn agent_alive(&self, tag: &str) -> StateResult<bool> {
        let now = epoch_secs();
        Ok(self
            .get_agent(tag)?
            .is_some_and(|agent| agent.is_alive(now, self.presence_window.as_secs())))
    }

    /// The version the agent last reported running.
    pub fn agent_version(&self, tag: &str) -> StateResult<String> {
        self.require_agent(tag)?
            .version
            .ok_or_else(|| StateError::NotFound(format!("agent tools for {tag}")))
    }

    /// The agent's status and status info.
    pub fn agent_status(&self, tag: &str) -> StateResult<(AgentStatus, String)> {
        let agent = self.require_agent(tag)?;
        Ok((agent.status, agent.status_info))
    }
}

fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
