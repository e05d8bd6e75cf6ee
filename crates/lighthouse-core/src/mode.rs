//! # Mode Dispatch
//!
//! Decides which phases of a run execute, from the two run-mode flags.
//!
//! | gatherMode | auditMode | collect | evaluate |
//! |------------|-----------|---------|----------|
//! | off        | off       | yes     | yes      |
//! | on / path  | off       | yes     | no       |
//! | off        | on / path | no      | yes      |
//! | on / path  | on / path | yes     | yes      |
//!
//! Two equal flags always mean a full run. Pure decision logic; the
//! orchestrator consults it before any I/O.

use crate::types::Settings;
use std::path::{Path, PathBuf};

/// Directory used for artifacts when neither mode flag names one.
pub const DEFAULT_ARTIFACTS_DIR: &str = "latest-run";

/// Whether the collection phase runs.
#[must_use]
pub fn should_gather(settings: &Settings) -> bool {
    settings.gather_mode.is_truthy() || settings.gather_mode == settings.audit_mode
}

/// Whether the evaluation phase runs.
#[must_use]
pub fn should_audit(settings: &Settings) -> bool {
    settings.audit_mode.is_truthy() || settings.gather_mode == settings.audit_mode
}

/// Both phase decisions for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPhases {
    pub gather: bool,
    pub audit: bool,
}

impl RunPhases {
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            gather: should_gather(settings),
            audit: should_audit(settings),
        }
    }

    /// Collect and persist only.
    #[must_use]
    pub fn is_gather_only(&self) -> bool {
        self.gather && !self.audit
    }

    /// Evaluate previously persisted artifacts only.
    #[must_use]
    pub fn is_audit_only(&self) -> bool {
        self.audit && !self.gather
    }
}

/// Resolve the artifact directory for a run.
///
/// `auditMode` wins over `gatherMode` when both name a path; relative paths
/// resolve against `cwd`.
#[must_use]
pub fn resolve_artifacts_path(settings: &Settings, cwd: &Path) -> PathBuf {
    let dir = settings
        .audit_mode
        .path()
        .or_else(|| settings.gather_mode.path())
        .unwrap_or(DEFAULT_ARTIFACTS_DIR);
    cwd.join(dir)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModeFlag;

    fn settings(gather: ModeFlag, audit: ModeFlag) -> Settings {
        Settings {
            gather_mode: gather,
            audit_mode: audit,
            ..Settings::default()
        }
    }

    #[test]
    fn unset_flags_run_everything() {
        let phases = RunPhases::from_settings(&Settings::default());
        assert_eq!(
            phases,
            RunPhases {
                gather: true,
                audit: true
            }
        );
    }

    #[test]
    fn gather_path_alone_is_gather_only() {
        let s = settings(ModeFlag::Path("./out".into()), ModeFlag::Off);
        assert!(should_gather(&s));
        assert!(!should_audit(&s));
        assert!(RunPhases::from_settings(&s).is_gather_only());
    }

    #[test]
    fn audit_flag_alone_is_audit_only() {
        let s = settings(ModeFlag::Off, ModeFlag::On);
        assert!(!should_gather(&s));
        assert!(should_audit(&s));
        assert!(RunPhases::from_settings(&s).is_audit_only());
    }

    #[test]
    fn different_truthy_flags_run_both() {
        let s = settings(ModeFlag::On, ModeFlag::Path("./saved".into()));
        assert!(should_gather(&s));
        assert!(should_audit(&s));
    }

    #[test]
    fn path_resolution_prefers_audit_mode() {
        let cwd = Path::new("/work");
        let s = settings(ModeFlag::Path("g".into()), ModeFlag::Path("a".into()));
        assert_eq!(resolve_artifacts_path(&s, cwd), PathBuf::from("/work/a"));

        let s = settings(ModeFlag::Path("g".into()), ModeFlag::On);
        assert_eq!(resolve_artifacts_path(&s, cwd), PathBuf::from("/work/g"));

        let s = settings(ModeFlag::On, ModeFlag::Off);
        assert_eq!(
            resolve_artifacts_path(&s, cwd),
            PathBuf::from("/work/latest-run")
        );
    }

    #[test]
    fn absolute_paths_are_kept() {
        let s = settings(ModeFlag::Off, ModeFlag::Path("/tmp/run".into()));
        assert_eq!(
            resolve_artifacts_path(&s, Path::new("/work")),
            PathBuf::from("/tmp/run")
        );
    }
}
