//! Status engine configuration, loaded from TOML.
//!
//! ```toml
//! [revisions]
//! enabled = true
//! concurrency = 4
//!
//! [presence]
//! timeout = "60s"
//! ```

use std::path::Path;
use std::time::Duration;

use fleet_state::StateStore;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub revisions: RevisionsConfig,
    pub presence: PresenceConfig,
}

/// Controls the charm freshness lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevisionsConfig {
    /// Query repositories for the latest charm revisions at all.
    pub enabled: bool,
    /// Repository bulk queries allowed in flight at once.
    pub concurrency: usize,
}

impl Default for RevisionsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            concurrency: 4,
        }
    }
}

/// Agent liveness settings handed to the state store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Heartbeat age beyond which an agent is down (e.g. "60s", "500ms").
    pub timeout: String,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            timeout: "60s".to_string(),
        }
    }
}

impl PresenceConfig {
    /// The parsed heartbeat window; fails on an unparseable timeout.
    pub fn window(&self) -> anyhow::Result<Duration> {
        parse_duration(&self.timeout)
            .ok_or_else(|| anyhow::anyhow!("invalid presence timeout {:?}", self.timeout))
    }

    /// Agent liveness is decided by the state store, so the window is
    /// applied there rather than read by the aggregator.
    pub fn apply(&self, store: StateStore) -> anyhow::Result<StateStore> {
        Ok(store.with_presence_window(self.window()?))
    }
}

impl StatusConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: StatusConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.presence.window()?;
        if self.revisions.concurrency == 0 {
            anyhow::bail!("revisions.concurrency must be at least 1");
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok()?.checked_mul(60).map(Duration::from_secs)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_empty() {
        let config = StatusConfig::from_toml_str("").unwrap();
        assert_eq!(config, StatusConfig::default());
        assert!(config.revisions.enabled);
        assert_eq!(config.revisions.concurrency, 4);
        assert_eq!(config.presence.window().unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn parses_partial_sections() {
        let config = StatusConfig::from_toml_str(
            r#"
[revisions]
enabled = false

[presence]
timeout = "90s"
"#,
        )
        .unwrap();
        assert!(!config.revisions.enabled);
        assert_eq!(config.revisions.concurrency, 4);
        assert_eq!(config.presence.window().unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn duration_units() {
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration(&format!("{}m", u64::MAX)), None);
        let bad = PresenceConfig {
            timeout: "soon".to_string(),
        };
        assert!(bad.window().is_err());
    }

    #[test]
    fn rejects_bad_settings_on_load() {
        let err = StatusConfig::from_toml_str("[presence]\ntimeout = \"soon\"\n").unwrap_err();
        assert!(err.to_string().contains("invalid presence timeout"));

        let overflow = format!("[presence]\ntimeout = \"{}m\"\n", u64::MAX);
        assert!(StatusConfig::from_toml_str(&overflow).is_err());

        let err = StatusConfig::from_toml_str("[revisions]\nconcurrency = 0\n").unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn presence_window_reaches_the_store() {
        use fleet_state::{AgentRecord, AgentStatus};

        let config = StatusConfig::from_toml_str("[presence]\ntimeout = \"10s\"\n").unwrap();
        let store = config
            .presence
            .apply(StateStore::open_in_memory().unwrap())
            .unwrap();
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();
        store
            .put_agent(&AgentRecord {
                tag: "machine-0".to_string(),
                version: None,
                status: AgentStatus::Started,
                status_info: String::new(),
                last_heartbeat: now - 30,
            })
            .unwrap();

        // Alive under the default 60s window, down under the configured 10s.
        assert!(!store.agent_alive("machine-0").unwrap());
        let default_store = StateStore::open_in_memory().unwrap();
        default_store.put_agent(&store.get_agent("machine-0").unwrap().unwrap()).unwrap();
        assert!(default_store.agent_alive("machine-0").unwrap());
    }

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.toml");
        let mut config = StatusConfig::default();
        config.revisions.concurrency = 1;
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        assert_eq!(StatusConfig::from_file(&path).unwrap(), config);
    }
}
