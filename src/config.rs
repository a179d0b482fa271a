//! Daemon configuration.
//!
//! The config file is TOML: one `[daemon]` table for the RPC socket and
//! shutdown behavior, and one `[programs.<name>]` table per supervised
//! program. Programs are keyed in a `BTreeMap`, so every iteration over the
//! set is name-sorted and deterministic.
//!
//! Loading happens once at startup; the resulting [`Program`] set is
//! immutable for the life of the daemon. Commands change a program's
//! running state, never the set.
//!
//! ```toml
//! [daemon]
//! socket_path = "/run/chayd.sock"
//!
//! [programs.web]
//! command = "/usr/bin/web-server"
//! args = ["--port", "8080"]
//! restart = "always"
//!
//! [programs.worker]
//! command = "/usr/bin/worker"
//! autostart = false
//! max_attempts = 8
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::policies::{BackoffPolicy, JitterPolicy, RestartPolicy};
use crate::process::StopSignal;
use crate::program::Program;

/// Parsed config file.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    /// Program definitions, sorted by name.
    pub programs: BTreeMap<String, ProgramConfig>,
}

/// Daemon-level settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    /// Unix socket the RPC server listens on.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Per-subscriber queue depth for status streams. A subscriber that
    /// falls this far behind is dropped rather than blocking the rest.
    #[serde(default = "default_status_queue_depth")]
    pub status_queue_depth: usize,

    /// Grace window for stopping all programs on daemon shutdown.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            status_queue_depth: default_status_queue_depth(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl DaemonConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// One program definition as written in the config file.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgramConfig {
    /// Executable to run.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Start as soon as the daemon comes up.
    #[serde(default = "default_autostart")]
    pub autostart: bool,
    /// When to respawn after an exit the daemon did not request.
    #[serde(default)]
    pub restart: RestartPolicy,

    /// Delay before the first retry of a failed start.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Cap on any single retry delay.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Random perturbation applied to retry delays, as a ratio (0 disables).
    #[serde(default = "default_backoff_jitter")]
    pub backoff_jitter: f64,
    /// Consecutive failures tolerated before the program is parked in Exited.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Uptime after which the failure count resets.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Signal sent for a graceful stop.
    #[serde(default)]
    pub stop_signal: StopSignal,
    /// Window the child gets after the stop signal before SIGKILL.
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

/// Reads and parses the config file.
pub fn read_from_file(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl Config {
    /// Validates every definition and renders the immutable program set,
    /// sorted by name.
    pub fn programs(&self) -> Result<Vec<Program>, ConfigError> {
        self.programs
            .iter()
            .map(|(name, pc)| render_program(name, pc))
            .collect()
    }
}

fn render_program(name: &str, pc: &ProgramConfig) -> Result<Program, ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        program: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name must not be empty"));
    }
    // Reserved words and glob metacharacters would shadow expression syntax.
    if name == "all" {
        return Err(invalid("'all' is reserved for the match-all expression"));
    }
    if name.contains(['*', '?']) || name.chars().any(char::is_whitespace) {
        return Err(invalid("name must not contain wildcards or whitespace"));
    }
    if pc.command.is_empty() {
        return Err(invalid("command must not be empty"));
    }
    if pc.backoff_base_ms == 0 {
        return Err(invalid("backoff_base_ms must be positive"));
    }
    if pc.backoff_max_ms < pc.backoff_base_ms {
        return Err(invalid("backoff_max_ms must be >= backoff_base_ms"));
    }
    if !(0.0..=1.0).contains(&pc.backoff_jitter) {
        return Err(invalid("backoff_jitter must be within [0, 1]"));
    }

    let jitter = if pc.backoff_jitter == 0.0 {
        JitterPolicy::None
    } else {
        JitterPolicy::Bounded {
            ratio: pc.backoff_jitter,
        }
    };

    Ok(Program {
        name: name.to_string(),
        command: pc.command.clone(),
        args: pc.args.clone(),
        cwd: pc.cwd.clone(),
        env: pc.env.clone(),
        autostart: pc.autostart,
        restart: pc.restart,
        backoff: BackoffPolicy {
            base: Duration::from_millis(pc.backoff_base_ms),
            max: Duration::from_millis(pc.backoff_max_ms),
            max_attempts: pc.max_attempts,
            jitter,
        },
        settle: Duration::from_millis(pc.settle_ms),
        stop_signal: pc.stop_signal,
        stop_timeout: Duration::from_millis(pc.stop_timeout_ms),
    })
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/chayd.sock")
}

fn default_status_queue_depth() -> usize {
    16
}

fn default_shutdown_grace_ms() -> u64 {
    30_000
}

fn default_autostart() -> bool {
    true
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_backoff_jitter() -> f64 {
    0.2
}

fn default_max_attempts() -> u32 {
    4
}

fn default_settle_ms() -> u64 {
    3_000
}

fn default_stop_timeout_ms() -> u64 {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Config {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn minimal_program_gets_defaults() {
        let cfg = parse(
            r#"
            [programs.web]
            command = "/bin/web"
            "#,
        );
        let programs = cfg.programs().unwrap();
        assert_eq!(programs.len(), 1);
        let web = &programs[0];
        assert_eq!(web.name, "web");
        assert!(web.autostart);
        assert_eq!(web.restart, RestartPolicy::OnFailure);
        assert_eq!(web.backoff.base, Duration::from_secs(1));
        assert_eq!(web.backoff.max, Duration::from_secs(30));
        assert_eq!(web.backoff.max_attempts, 4);
        assert_eq!(web.stop_signal, StopSignal::Term);
        assert_eq!(web.stop_timeout, Duration::from_secs(10));
    }

    #[test]
    fn programs_are_sorted_by_name() {
        let cfg = parse(
            r#"
            [programs.zeta]
            command = "/bin/z"
            [programs.alpha]
            command = "/bin/a"
            "#,
        );
        let names: Vec<String> = cfg.programs().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn rejects_reserved_name() {
        let cfg = parse(
            r#"
            [programs.all]
            command = "/bin/x"
            "#,
        );
        assert!(matches!(
            cfg.programs(),
            Err(ConfigError::Invalid { program, .. }) if program == "all"
        ));
    }

    #[test]
    fn rejects_wildcard_in_name() {
        let cfg = parse(
            r#"
            [programs."web*"]
            command = "/bin/x"
            "#,
        );
        assert!(cfg.programs().is_err());
    }

    #[test]
    fn rejects_empty_command() {
        let cfg = parse(
            r#"
            [programs.web]
            command = ""
            "#,
        );
        assert!(cfg.programs().is_err());
    }

    #[test]
    fn rejects_backoff_cap_below_base() {
        let cfg = parse(
            r#"
            [programs.web]
            command = "/bin/web"
            backoff_base_ms = 5000
            backoff_max_ms = 1000
            "#,
        );
        assert!(cfg.programs().is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let res: Result<Config, _> = toml::from_str(
            r#"
            [programs.web]
            command = "/bin/web"
            restrat = "always"
            "#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn zero_jitter_disables_randomization() {
        let cfg = parse(
            r#"
            [programs.web]
            command = "/bin/web"
            backoff_jitter = 0.0
            "#,
        );
        let web = &cfg.programs().unwrap()[0];
        assert_eq!(web.backoff.jitter, JitterPolicy::None);
    }
}
