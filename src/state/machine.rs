use crate::utils::{CsvImportError, Result};
use serde::{Deserialize, Serialize};

/// Lifecycle of one import attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    Idle,
    FileSelected,
    Validated { valid: bool },
    Submitting,
    Completed { success: bool },
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::FileSelected => write!(f, "file_selected"),
            Phase::Validated { valid: true } => write!(f, "validated"),
            Phase::Validated { valid: false } => write!(f, "invalid"),
            Phase::Submitting => write!(f, "submitting"),
            Phase::Completed { success: true } => write!(f, "completed"),
            Phase::Completed { success: false } => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    SelectFile,
    Validated { valid: bool },
    Submit,
    Finish { success: bool },
}

impl Transition {
    fn action(&self) -> &'static str {
        match self {
            Transition::SelectFile => "select a file",
            Transition::Validated { .. } => "record validation",
            Transition::Submit => "submit an import",
            Transition::Finish { .. } => "finish an import",
        }
    }
}

/// Phase plus the one policy knob that changes the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportMachine {
    phase: Phase,
    reupload_after_failure: bool,
}

impl ImportMachine {
    pub fn new(reupload_after_failure: bool) -> Self {
        Self {
            phase: Phase::Idle,
            reupload_after_failure,
        }
    }

    /// Starts from host-supplied flags. A completed import is terminal; an
    /// initial validity flag is kept for reporting but there is no content
    /// to submit until a file is chosen.
    pub fn resume(reupload_after_failure: bool, import_complete: bool) -> Self {
        let phase = if import_complete {
            Phase::Completed { success: true }
        } else {
            Phase::Idle
        };
        Self {
            phase,
            reupload_after_failure,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn can(&self, transition: Transition) -> bool {
        self.next(transition).is_some()
    }

    /// Fails the same way [`apply`](Self::apply) would, without moving.
    pub fn ensure(&self, transition: Transition) -> Result<Phase> {
        self.next(transition)
            .ok_or(CsvImportError::InvalidTransition {
                from: self.phase,
                action: transition.action(),
            })
    }

    pub fn apply(&mut self, transition: Transition) -> Result<Phase> {
        let next = self.ensure(transition)?;
        tracing::debug!(from = %self.phase, to = %next, "Importer phase transition");
        self.phase = next;
        Ok(next)
    }

    fn next(&self, transition: Transition) -> Option<Phase> {
        use Phase::*;

        match (self.phase, transition) {
            (Idle | FileSelected | Validated { .. }, Transition::SelectFile) => Some(FileSelected),
            (Completed { success: false }, Transition::SelectFile)
                if self.reupload_after_failure =>
            {
                Some(FileSelected)
            }
            (FileSelected, Transition::Validated { valid }) => Some(Validated { valid }),
            (Validated { valid: true } | Completed { success: false }, Transition::Submit) => {
                Some(Submitting)
            }
            (Submitting, Transition::Finish { success }) => Some(Completed { success }),
            _ => None,
        }
    }

    pub fn upload_enabled(&self) -> bool {
        self.can(Transition::SelectFile)
    }

    pub fn submit_enabled(&self) -> bool {
        self.can(Transition::Submit)
    }

    pub fn in_progress(&self) -> bool {
        self.phase == Phase::Submitting
    }

    pub fn complete(&self) -> bool {
        self.phase == Phase::Completed { success: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validated(valid: bool) -> ImportMachine {
        let mut machine = ImportMachine::new(false);
        machine.apply(Transition::SelectFile).unwrap();
        machine.apply(Transition::Validated { valid }).unwrap();
        machine
    }

    #[test]
    fn happy_path_reaches_completed() {
        let mut machine = validated(true);
        assert!(machine.submit_enabled());
        machine.apply(Transition::Submit).unwrap();
        assert!(machine.in_progress());
        assert!(!machine.upload_enabled());
        assert!(!machine.submit_enabled());
        machine.apply(Transition::Finish { success: true }).unwrap();
        assert!(machine.complete());
        assert!(!machine.upload_enabled());
        assert!(!machine.submit_enabled());
    }

    #[test]
    fn invalid_file_allows_another_selection_but_not_submit() {
        let mut machine = validated(false);
        assert!(!machine.submit_enabled());
        assert!(matches!(
            machine.apply(Transition::Submit),
            Err(CsvImportError::InvalidTransition { .. })
        ));
        assert_eq!(machine.apply(Transition::SelectFile).unwrap(), Phase::FileSelected);
    }

    #[test]
    fn failed_import_reenables_submit_and_keeps_upload_disabled() {
        let mut machine = validated(true);
        machine.apply(Transition::Submit).unwrap();
        machine.apply(Transition::Finish { success: false }).unwrap();
        assert!(!machine.in_progress());
        assert!(machine.submit_enabled());
        assert!(!machine.upload_enabled());
    }

    #[test]
    fn reupload_after_failure_is_opt_in() {
        let mut machine = ImportMachine::new(true);
        machine.apply(Transition::SelectFile).unwrap();
        machine.apply(Transition::Validated { valid: true }).unwrap();
        machine.apply(Transition::Submit).unwrap();
        machine.apply(Transition::Finish { success: false }).unwrap();
        assert!(machine.upload_enabled());
    }

    #[test]
    fn finish_requires_submitting() {
        let mut machine = validated(true);
        let err = machine
            .apply(Transition::Finish { success: true })
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot finish an import while importer is validated"
        );
    }

    #[test]
    fn resumed_complete_import_is_terminal() {
        let machine = ImportMachine::resume(true, true);
        assert!(machine.complete());
        assert!(!machine.upload_enabled());
        assert!(!machine.submit_enabled());
    }
}
