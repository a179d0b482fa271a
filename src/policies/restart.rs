//! Restart policies for supervised programs.
//!
//! [`RestartPolicy`] determines whether a program is respawned after its
//! child process exits *on its own* (a manual Stop always suppresses the
//! respawn for that cycle, whatever the policy).
//!
//! - [`RestartPolicy::Never`] the program settles in `Exited`/`Stopped`.
//! - [`RestartPolicy::OnFailure`] respawn only on a non-zero or abnormal exit (default).
//! - [`RestartPolicy::Always`] respawn on any exit, clean or not.

use serde::Deserialize;

/// Policy controlling whether a program is respawned after an unexpected exit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    /// Never respawn automatically.
    Never,
    /// Respawn only when the exit was a failure (default).
    #[default]
    OnFailure,
    /// Respawn on any exit, expected or not.
    Always,
}

impl RestartPolicy {
    /// Whether an exit with the given success flag warrants a respawn.
    pub fn should_respawn(&self, exit_ok: bool) -> bool {
        match self {
            RestartPolicy::Never => false,
            RestartPolicy::OnFailure => !exit_ok,
            RestartPolicy::Always => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_ignores_outcome() {
        assert!(!RestartPolicy::Never.should_respawn(true));
        assert!(!RestartPolicy::Never.should_respawn(false));
    }

    #[test]
    fn on_failure_respawns_only_on_failure() {
        assert!(!RestartPolicy::OnFailure.should_respawn(true));
        assert!(RestartPolicy::OnFailure.should_respawn(false));
    }

    #[test]
    fn always_respawns_on_any_exit() {
        assert!(RestartPolicy::Always.should_respawn(true));
        assert!(RestartPolicy::Always.should_respawn(false));
    }

    #[test]
    fn deserializes_kebab_case() {
        #[derive(Deserialize)]
        struct Holder {
            restart: RestartPolicy,
        }
        let h: Holder = toml::from_str(r#"restart = "on-failure""#).unwrap();
        assert_eq!(h.restart, RestartPolicy::OnFailure);
        let h: Holder = toml::from_str(r#"restart = "never""#).unwrap();
        assert_eq!(h.restart, RestartPolicy::Never);
    }
}
