//! fleet-status — status aggregation for a deployed fleet.
//!
//! Answers "what is the state of my deployment?" with one immutable
//! [`StatusSnapshot`]: machines nested into their containers, services with
//! their units and subordinates, agent health, relations, and whether the
//! deployed charms are behind their repositories.
//!
//! # Architecture
//!
//! ```text
//! StatusAggregator::status(patterns)
//!   ├── UnitMatcher        (service[/unit] globs → unit filter)
//!   ├── Topology           (services, units, machines, provider instances)
//!   ├── build_forest       (machine id hierarchy → MachineNode trees)
//!   ├── derive_agent_state (life + reported status + presence → display)
//!   ├── process_relations  (related services, subordinate_to)
//!   └── resolve_revisions  (one bulk query per charm repository)
//!         └── annotate_revisions
//! ```
//!
//! The state store is read through [`StateSource`], the cloud through
//! [`InstanceProvider`], and charm repositories through
//! [`RepositoryResolver`]. Provider and repository failures degrade the
//! affected fields; only invalid patterns and state store failures fail the
//! whole query.

pub mod agent;
pub mod aggregator;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod matcher;
pub mod relations;
pub mod revisions;
pub mod snapshot;
pub mod source;
pub mod topology;

pub use aggregator::StatusAggregator;
pub use config::StatusConfig;
pub use error::{StatusError, StatusResult};
pub use matcher::UnitMatcher;
pub use revisions::{CharmInfo, CharmRepository, RepositoryHandle, RepositoryRegistry, RepositoryResolver};
pub use snapshot::{MachineStatus, ServiceStatus, StatusSnapshot, UnitStatus};
pub use source::{Instance, InstanceProvider, StateSource};
