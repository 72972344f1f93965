//! Agent health derivation.
//!
//! Machines and units both run an agent. Their displayed status combines
//! the entity's life, the status the agent last reported, and whether the
//! agent is still sending heartbeats: an agent that should be running but
//! has gone quiet is shown as `down`, with the status it last reported
//! folded into the info string.

use fleet_state::{AgentStatus, Life, Machine, StateResult, Unit};

use crate::source::StateSource;

/// Anything with a life cycle and an agent that can be probed.
pub trait LifecycleEntity {
    fn life(&self) -> Life;

    fn agent_alive(&self) -> StateResult<bool>;

    fn agent_version(&self) -> StateResult<String>;

    /// Raw status and info as last reported by the agent.
    fn status(&self) -> StateResult<(AgentStatus, String)>;
}

/// Display fields derived for one entity's agent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentState {
    /// Empty for alive entities.
    pub life: String,
    /// Empty if the version could not be read.
    pub version: String,
    /// `None` if the status could not be read.
    pub status: Option<AgentStatus>,
    pub info: String,
    pub err: Option<String>,
}

/// Life annotation: empty for the common `alive` case.
pub fn life_annotation(life: Life) -> String {
    match life {
        Life::Alive => String::new(),
        other => other.to_string(),
    }
}

/// Derives the agent fields for `entity`.
///
/// A status or liveness lookup failure ends the derivation and is reported
/// in `err`; fields computed before the failure are kept.
pub fn derive_agent_state(entity: &dyn LifecycleEntity) -> AgentState {
    let mut state = AgentState {
        life: life_annotation(entity.life()),
        version: entity.agent_version().unwrap_or_default(),
        ..AgentState::default()
    };

    let (status, info) = match entity.status() {
        Ok(raw) => raw,
        Err(e) => {
            state.err = Some(e.to_string());
            return state;
        }
    };
    state.status = Some(status);
    state.info = info;

    // An entity that hasn't started has no agent to ask about.
    if status == AgentStatus::Pending {
        return state;
    }

    let alive = match entity.agent_alive() {
        Ok(alive) => alive,
        Err(e) => {
            state.err = Some(e.to_string());
            return state;
        }
    };
    if entity.life() != Life::Dead && !alive {
        state.info = if state.info.is_empty() {
            format!("({status})")
        } else {
            format!("({status}: {})", state.info)
        };
        state.status = Some(AgentStatus::Down);
    }
    state
}

/// A machine's agent, read through the state source.
pub struct MachineAgent<'a> {
    source: &'a dyn StateSource,
    machine: &'a Machine,
    tag: String,
}

impl<'a> MachineAgent<'a> {
    pub fn new(source: &'a dyn StateSource, machine: &'a Machine) -> Self {
        Self {
            source,
            machine,
            tag: machine.tag(),
        }
    }
}

impl LifecycleEntity for MachineAgent<'_> {
    fn life(&self) -> Life {
        self.machine.life
    }

    fn agent_alive(&self) -> StateResult<bool> {
        self.source.agent_alive(&self.tag)
    }

    fn agent_version(&self) -> StateResult<String> {
        self.source.agent_version(&self.tag)
    }

    fn status(&self) -> StateResult<(AgentStatus, String)> {
        self.source.agent_status(&self.tag)
    }
}

/// A unit's agent, read through the state source.
pub struct UnitAgent<'a> {
    source: &'a dyn StateSource,
    unit: &'a Unit,
    tag: String,
}

impl<'a> UnitAgent<'a> {
    pub fn new(source: &'a dyn StateSource, unit: &'a Unit) -> Self {
        Self {
            source,
            unit,
            tag: unit.tag(),
        }
    }
}

impl LifecycleEntity for UnitAgent<'_> {
    fn life(&self) -> Life {
        self.unit.life
    }

    fn agent_alive(&self) -> StateResult<bool> {
        self.source.agent_alive(&self.tag)
    }

    fn agent_version(&self) -> StateResult<String> {
        self.source.agent_version(&self.tag)
    }

    fn status(&self) -> StateResult<(AgentStatus, String)> {
        self.source.agent_status(&self.tag)
    }
}
