//! redb table definitions for the fleet state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).

use redb::TableDefinition;

/// Machines keyed by hierarchical id (`0`, `0/lxc/1`, `0/lxc/1/kvm/0`).
pub const MACHINES: TableDefinition<&str, &[u8]> = TableDefinition::new("machines");

/// Services keyed by name.
pub const SERVICES: TableDefinition<&str, &[u8]> = TableDefinition::new("services");

/// Units keyed by `{service}/{number}`.
pub const UNITS: TableDefinition<&str, &[u8]> = TableDefinition::new("units");

/// Relations keyed by their endpoint key (`wordpress:db mysql:server`).
pub const RELATIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("relations");

/// Agent records keyed by agent tag (`machine-0`, `unit-mysql-0`).
pub const AGENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("agents");
