//! Layered configuration.
//!
//! Sources, later wins:
//!
//! | Layer                | Example                                        |
//! |----------------------|------------------------------------------------|
//! | built-in defaults    | `heartbeat_period_secs = 5`                    |
//! | optional file        | `vos-sync.toml` (any format `config` reads)    |
//! | environment          | `VOS_SYNC__SERVICE__HEARTBEAT_TIMEOUT_SECS=60` |
//!
//! Command-line flags are applied on top by the binary.
//!
//! ```toml
//! [service]
//! heartbeat_period_secs = 5
//! heartbeat_timeout_secs = 250
//! sessions = [{ id = "6ef7b1d0", tag = "lobby" }]
//!
//! [bus]
//! endpoint = "nats://localhost:4222"
//! ```

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::bus::BusConfig;
use crate::types::SyncServiceConfig;

pub const ENV_PREFIX: &str = "VOS_SYNC";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub service: SyncServiceConfig,
    pub bus: BusConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.heartbeat_period_secs == 0 {
            return Err(ConfigError::Message(
                "service.heartbeat_period_secs must be at least 1".into(),
            ));
        }
        if self.service.heartbeat_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "service.heartbeat_timeout_secs must be at least 1".into(),
            ));
        }
        if let Some(dup) = first_duplicate(self.service.sessions.iter().map(|s| s.id.as_str())) {
            return Err(ConfigError::Message(format!(
                "service.sessions lists id {} more than once",
                dup
            )));
        }
        Ok(())
    }
}

/// Load settings from defaults, `path` (if given) and the environment.
pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    let settings: Settings = builder.build()?.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}

fn first_duplicate<'a>(mut ids: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = std::collections::HashSet::new();
    ids.find(|id| !seen.insert(*id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn toml_file(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    #[test]
    fn defaults_without_file() {
        let s = load(None).unwrap();
        assert_eq!(s.service.heartbeat_period_secs, 5);
        assert_eq!(s.service.heartbeat_timeout_secs, 250);
        assert_eq!(s.bus.endpoint, "nats://localhost:4222");
    }

    #[test]
    fn file_overrides_defaults_and_seeds_sessions() {
        let f = toml_file(
            r#"
            [service]
            heartbeat_timeout_secs = 30
            sessions = [{ id = "s1", tag = "lobby" }, { id = "s2", tag = "arena" }]

            [bus]
            endpoint = "nats://bus:4222"
            "#,
        );
        let s = load(Some(f.path())).unwrap();
        assert_eq!(s.service.heartbeat_period_secs, 5);
        assert_eq!(s.service.heartbeat_timeout_secs, 30);
        assert_eq!(s.service.sessions.len(), 2);
        assert_eq!(s.service.sessions[1].tag, "arena");
        assert_eq!(s.bus.endpoint, "nats://bus:4222");
        assert_eq!(s.bus.client_name, "vos-sync");
    }

    #[test]
    fn zero_period_is_rejected() {
        let f = toml_file("[service]\nheartbeat_period_secs = 0\n");
        assert!(load(Some(f.path())).is_err());
    }

    #[test]
    fn duplicate_static_sessions_are_rejected() {
        let f = toml_file(
            "[service]\nsessions = [{ id = \"s1\", tag = \"a\" }, { id = \"s1\", tag = \"b\" }]\n",
        );
        assert!(load(Some(f.path())).is_err());
    }
}
