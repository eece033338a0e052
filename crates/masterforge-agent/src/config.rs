//! Agent configuration.

use std::ops::RangeInclusive;
use std::path::PathBuf;

use masterforge_protocol::SpawnerOptions;

/// Configuration for one spawner agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Address of the master server ("host:port").
    pub master_addr: String,

    /// Region tag this agent registers under. Empty = serves any.
    pub region: String,

    /// Max concurrent room processes. 0 = unlimited.
    pub max_processes: u32,

    /// Publicly visible IP of this machine, passed to spawned rooms so
    /// they can advertise themselves.
    pub machine_ip: String,

    /// Path to the room-server executable to launch.
    pub executable: PathBuf,

    /// Pass a `--headless` flag to spawned processes (dedicated servers
    /// don't render).
    pub headless: bool,

    /// Ports handed out to spawned rooms, one per live process.
    pub port_range: RangeInclusive<u16>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            master_addr: "127.0.0.1:5000".to_string(),
            region: String::new(),
            max_processes: 5,
            machine_ip: "127.0.0.1".to_string(),
            executable: PathBuf::new(),
            headless: true,
            port_range: 1500..=2000,
        }
    }
}

impl AgentConfig {
    /// The registration packet this config describes.
    pub fn spawner_options(&self) -> SpawnerOptions {
        SpawnerOptions {
            region: self.region.clone(),
            max_processes: self.max_processes,
            machine_ip: self.machine_ip.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_config_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.master_addr, "127.0.0.1:5000");
        assert_eq!(config.max_processes, 5);
        assert!(config.headless);
        assert_eq!(config.port_range, 1500..=2000);
    }

    #[test]
    fn test_spawner_options_mirror_config() {
        let config = AgentConfig {
            region: "eu".into(),
            max_processes: 2,
            machine_ip: "203.0.113.9".into(),
            ..AgentConfig::default()
        };
        let options = config.spawner_options();
        assert_eq!(options.region, "eu");
        assert_eq!(options.max_processes, 2);
        assert_eq!(options.machine_ip, "203.0.113.9");
    }
}
