use serde::{Deserialize, Serialize};

/// Top-level configuration for an ACIP deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcipConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub ring: RingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// TCP port (spec constant DEFAULT_PORT = 27225).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Payload cap enforced by the codec (spec floor: at least 16 MiB).
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: u32,
    /// Idle socket read timeout.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Depth of each connection's bounded outbound queue.
    #[serde(default = "default_outbound_queue_depth")]
    pub outbound_queue_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Replay window `W` for signed requests (spec §4.4).
    #[serde(default = "default_replay_window_secs")]
    pub replay_window_secs: u64,
    /// Wall-clock ceiling on an Argon2id verify before it is aborted and the
    /// join fails with `InvalidPassword`.
    #[serde(default = "default_password_verify_timeout_secs")]
    pub password_verify_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingConfig {
    /// Period between ring rounds (spec constant RING_TICK = 5 min).
    #[serde(default = "default_ring_tick_secs")]
    pub tick_secs: u64,
    /// Per-round deadline for the quorum leader to collect reports.
    #[serde(default = "default_round_deadline_secs")]
    pub round_deadline_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            max_payload_bytes: default_max_payload_bytes(),
            idle_timeout_secs: default_idle_timeout_secs(),
            outbound_queue_depth: default_outbound_queue_depth(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            replay_window_secs: default_replay_window_secs(),
            password_verify_timeout_secs: default_password_verify_timeout_secs(),
        }
    }
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_ring_tick_secs(),
            round_deadline_secs: default_round_deadline_secs(),
        }
    }
}

impl AcipConfig {
    /// Validate the configuration, returning a list of issues found.
    ///
    /// Issues are prefixed with "ERROR:" (fatal, server should not start) or
    /// "WARNING:" (advisory, server can start but the config is likely wrong).
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut issues = Vec::new();

        if self.server.port == 0 {
            issues.push("ERROR: server.port must be between 1 and 65535, got 0.".to_string());
        }

        if self.server.max_payload_bytes < crate::constants::MAX_PAYLOAD_SIZE {
            issues.push(format!(
                "ERROR: server.max_payload_bytes must be at least {} (the 16 MiB floor), got {}.",
                crate::constants::MAX_PAYLOAD_SIZE,
                self.server.max_payload_bytes
            ));
        }

        if self.server.idle_timeout_secs > 0 && self.server.idle_timeout_secs < 5 {
            issues.push(format!(
                "WARNING: server.idle_timeout_secs is {}, unusually aggressive — \
                 slow clients may be disconnected mid-handshake.",
                self.server.idle_timeout_secs
            ));
        }

        if self.server.outbound_queue_depth == 0 {
            issues.push(
                "ERROR: server.outbound_queue_depth must be >= 1.".to_string(),
            );
        }

        if self.auth.replay_window_secs == 0 {
            issues.push(
                "ERROR: auth.replay_window_secs must be >= 1; a zero window rejects every request."
                    .to_string(),
            );
        }
        if self.auth.replay_window_secs > 3600 {
            issues.push(format!(
                "WARNING: auth.replay_window_secs is {}, over an hour — widens the replay attack surface.",
                self.auth.replay_window_secs
            ));
        }

        if self.auth.password_verify_timeout_secs == 0 {
            issues.push(
                "ERROR: auth.password_verify_timeout_secs must be >= 1.".to_string(),
            );
        }

        if self.ring.tick_secs == 0 {
            issues.push("ERROR: ring.tick_secs must be >= 1.".to_string());
        }
        if self.ring.round_deadline_secs >= self.ring.tick_secs {
            issues.push(format!(
                "ERROR: ring.round_deadline_secs ({}) must be less than ring.tick_secs ({}) — \
                 a round cannot outlive the tick that starts the next one.",
                self.ring.round_deadline_secs, self.ring.tick_secs
            ));
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    crate::constants::DEFAULT_PORT
}
fn default_max_payload_bytes() -> u32 {
    crate::constants::MAX_PAYLOAD_SIZE
}
fn default_idle_timeout_secs() -> u64 {
    90
}
fn default_outbound_queue_depth() -> usize {
    64
}
fn default_replay_window_secs() -> u64 {
    crate::constants::DEFAULT_REPLAY_WINDOW_SECS
}
fn default_password_verify_timeout_secs() -> u64 {
    2
}
fn default_ring_tick_secs() -> u64 {
    crate::constants::RING_TICK_SECS
}
fn default_round_deadline_secs() -> u64 {
    150
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_from_empty_string() {
        let config: AcipConfig =
            toml::from_str("").expect("empty string should deserialize to default config");

        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.port, 27225);
        assert_eq!(config.server.max_payload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.server.idle_timeout_secs, 90);
        assert_eq!(config.server.outbound_queue_depth, 64);

        assert_eq!(config.auth.replay_window_secs, 300);
        assert_eq!(config.auth.password_verify_timeout_secs, 2);

        assert_eq!(config.ring.tick_secs, 300);
        assert_eq!(config.ring.round_deadline_secs, 150);
    }

    #[test]
    fn partial_config_only_auth_section() {
        let toml_str = r#"
[auth]
replay_window_secs = 120
"#;
        let config: AcipConfig =
            toml::from_str(toml_str).expect("partial config should deserialize");
        assert_eq!(config.auth.replay_window_secs, 120);
        assert_eq!(config.auth.password_verify_timeout_secs, 2);
        assert_eq!(config.server.port, 27225);
        assert_eq!(config.ring.tick_secs, 300);
    }

    #[test]
    fn default_trait_matches_toml_defaults() {
        let from_toml: AcipConfig = toml::from_str("").expect("default config");
        let server = ServerConfig::default();
        assert_eq!(server.bind, from_toml.server.bind);
        assert_eq!(server.port, from_toml.server.port);
        assert_eq!(server.max_payload_bytes, from_toml.server.max_payload_bytes);

        let auth = AuthConfig::default();
        assert_eq!(auth.replay_window_secs, from_toml.auth.replay_window_secs);

        let ring = RingConfig::default();
        assert_eq!(ring.tick_secs, from_toml.ring.tick_secs);
    }

    fn valid_config() -> AcipConfig {
        toml::from_str("").expect("default config")
    }

    fn validate_issues(config: &AcipConfig) -> Vec<String> {
        match config.validate() {
            Ok(()) => vec![],
            Err(issues) => issues,
        }
    }

    fn has_error(issues: &[String], substring: &str) -> bool {
        issues
            .iter()
            .any(|i| i.starts_with("ERROR:") && i.contains(substring))
    }

    fn has_warning(issues: &[String], substring: &str) -> bool {
        issues
            .iter()
            .any(|i| i.starts_with("WARNING:") && i.contains(substring))
    }

    #[test]
    fn validate_default_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn validate_port_zero_is_error() {
        let mut config = valid_config();
        config.server.port = 0;
        let issues = validate_issues(&config);
        assert!(has_error(&issues, "port"));
    }

    #[test]
    fn validate_payload_cap_below_floor_is_error() {
        let mut config = valid_config();
        config.server.max_payload_bytes = 1024;
        let issues = validate_issues(&config);
        assert!(has_error(&issues, "max_payload_bytes"));
    }

    #[test]
    fn validate_small_idle_timeout_is_warning() {
        let mut config = valid_config();
        config.server.idle_timeout_secs = 3;
        let issues = validate_issues(&config);
        assert!(has_warning(&issues, "idle_timeout_secs"));
    }

    #[test]
    fn validate_zero_queue_depth_is_error() {
        let mut config = valid_config();
        config.server.outbound_queue_depth = 0;
        let issues = validate_issues(&config);
        assert!(has_error(&issues, "outbound_queue_depth"));
    }

    #[test]
    fn validate_zero_replay_window_is_error() {
        let mut config = valid_config();
        config.auth.replay_window_secs = 0;
        let issues = validate_issues(&config);
        assert!(has_error(&issues, "replay_window_secs"));
    }

    #[test]
    fn validate_large_replay_window_is_warning() {
        let mut config = valid_config();
        config.auth.replay_window_secs = 7200;
        let issues = validate_issues(&config);
        assert!(has_warning(&issues, "replay_window_secs"));
    }

    #[test]
    fn validate_round_deadline_must_be_shorter_than_tick() {
        let mut config = valid_config();
        config.ring.round_deadline_secs = config.ring.tick_secs;
        let issues = validate_issues(&config);
        assert!(has_error(&issues, "round_deadline_secs"));
    }

    #[test]
    fn validate_multiple_errors_collected() {
        let mut config = valid_config();
        config.server.port = 0;
        config.auth.replay_window_secs = 0;
        config.ring.tick_secs = 0;
        let issues = validate_issues(&config);
        assert!(issues.len() >= 3, "got {:?}", issues);
    }
}
