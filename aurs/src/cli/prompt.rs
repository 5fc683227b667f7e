// aurs/src/cli/prompt.rs
//! Interactive questions. Every prompt has a non-interactive answer used
//! with `--noconfirm`.
use aurs_common::error::{AursError, Result};
use aurs_core::pipeline::{CloneRecovery, CloneRecoveryAction};
use dialoguer::{Confirm, Select};
use tracing::warn;

/// Yes/no question; `noconfirm` answers `default` without asking.
pub fn confirm(question: &str, default: bool, noconfirm: bool) -> Result<bool> {
    if noconfirm {
        return Ok(default);
    }
    Confirm::new()
        .with_prompt(question)
        .default(default)
        .interact()
        .map_err(|e| AursError::Generic(format!("Could not read answer: {e}")))
}

const RECOVERY_CHOICES: [(&str, CloneRecoveryAction); 4] = [
    ("Reset local changes and retry", CloneRecoveryAction::Reset),
    ("Delete the checkout and clone again", CloneRecoveryAction::Reclone),
    ("Skip this package", CloneRecoveryAction::Skip),
    ("Abort", CloneRecoveryAction::Abort),
];

/// Asks what to do with a base whose repository could not be fetched.
pub struct PromptRecovery {
    noconfirm: bool,
}

impl PromptRecovery {
    pub fn new(noconfirm: bool) -> Self {
        Self { noconfirm }
    }
}

impl CloneRecovery for PromptRecovery {
    fn recover(&self, package_base: &str, error: &AursError) -> CloneRecoveryAction {
        if self.noconfirm {
            return CloneRecoveryAction::Skip;
        }
        eprintln!("{error}");
        let labels: Vec<&str> = RECOVERY_CHOICES.iter().map(|(label, _)| *label).collect();
        match Select::new()
            .with_prompt(format!("How should '{package_base}' be recovered?"))
            .items(&labels)
            .default(0)
            .interact()
        {
            Ok(choice) => RECOVERY_CHOICES
                .get(choice)
                .map(|(_, action)| *action)
                .unwrap_or(CloneRecoveryAction::Abort),
            Err(e) => {
                warn!("Could not read answer ({}); aborting", e);
                CloneRecoveryAction::Abort
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noconfirm_takes_defaults() {
        assert!(confirm("Proceed?", true, true).unwrap());
        assert!(!confirm("Remove?", false, true).unwrap());
        let error = AursError::CloneError {
            package_base: "yay".into(),
            message: "network".into(),
        };
        assert_eq!(
            PromptRecovery::new(true).recover("yay", &error),
            CloneRecoveryAction::Skip
        );
    }
}
