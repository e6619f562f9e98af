//! Executes matched rules against the filesystem capability.

use std::path::{Path, PathBuf};

use crate::fsops::FileSystemOps;
use crate::rules::{ActionKind, ActionRule};

/// Result of executing one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Action completed. For move/copy, carries the destination path.
    Success { destination: Option<PathBuf> },
    /// Action failed; the source record must stay unprocessed so a
    /// later event can retry.
    Failed { reason: String },
}

/// Executes rules through an injected [`FileSystemOps`].
pub struct ActionExecutor<F: FileSystemOps> {
    fs: F,
}

impl<F: FileSystemOps> ActionExecutor<F> {
    pub fn new(fs: F) -> Self {
        Self { fs }
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    /// Run one rule against a source path.
    pub fn execute(&self, rule: &ActionRule, src: &Path) -> ActionOutcome {
        match rule.action {
            ActionKind::Log => {
                crate::log_event!(
                    "action",
                    "action_executed",
                    "log {} ({} {:?})",
                    src.display(),
                    rule.file_type,
                    rule.event
                );
                ActionOutcome::Success { destination: None }
            }
            ActionKind::Move | ActionKind::Copy => self.transfer(rule, src),
        }
    }

    fn transfer(&self, rule: &ActionRule, src: &Path) -> ActionOutcome {
        let Some(dest_dir) = rule.destination.as_deref() else {
            return ActionOutcome::Failed {
                reason: format!("rule for {} has no destination", rule.file_type),
            };
        };
        let Some(name) = self.fs.file_name(src) else {
            return ActionOutcome::Failed {
                reason: format!("cannot derive file name from {}", src.display()),
            };
        };
        let dest = dest_dir.join(name);

        let (verb, ok) = match rule.action {
            ActionKind::Move => ("move", self.fs.move_file(src, &dest)),
            ActionKind::Copy => ("copy", self.fs.copy_file(src, &dest)),
            ActionKind::Log => unreachable!("handled by execute"),
        };

        if ok {
            crate::log_event!(
                "action",
                "action_executed",
                "{verb} {} -> {}",
                src.display(),
                dest.display()
            );
            ActionOutcome::Success {
                destination: Some(dest),
            }
        } else {
            ActionOutcome::Failed {
                reason: format!("{verb} {} -> {} failed", src.display(), dest.display()),
            }
        }
    }
}
