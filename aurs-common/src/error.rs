// aurs-common/src/error.rs
use std::sync::Arc;

use thiserror::Error;

use crate::model::PackageSource;

/// Exit code for a generic failure or a declined confirmation.
pub const EXIT_GENERIC: i32 = 1;
/// Exit code when requested packages do not exist in the AUR.
pub const EXIT_PACKAGES_NOT_FOUND: i32 = 6;
/// Exit code for failures that need a decision from the user.
pub const EXIT_NEEDS_DECISION: i32 = 125;
/// Exit code for unresolved package conflicts.
pub const EXIT_CONFLICT: i32 = 131;

#[derive(Error, Debug, Clone)]
pub enum AursError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP Request Error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("Git Error: {0}")]
    Git(#[from] Arc<git2::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("API Error: {0}")]
    Api(String),

    #[error("HttpError: {0}")]
    HttpError(String),

    #[error("Resource Not Found: {0}")]
    NotFound(String),

    #[error("Installation Error: {0}")]
    InstallError(String),

    #[error("Generic Error: {0}")]
    Generic(String),

    #[error("Validation Error: {0}")]
    ValidationError(String),

    #[error("Parsing Error in {0}: {1}")]
    ParseError(&'static str, String),

    #[error("Failed to execute command: {0}")]
    CommandExecError(String),

    #[error("IoError: {0}")]
    IoError(String),

    #[error("{}", describe_not_found(.packages, .wanted_by))]
    PackagesNotFoundInRegistry {
        packages: Vec<String>,
        wanted_by: Vec<String>,
    },

    #[error(
        "Dependency '{dependency_line}' of '{who_depends}' is not satisfied: found {depends_on} {} in {location}",
        .found_versions.join(", ")
    )]
    DependencyVersionMismatch {
        dependency_line: String,
        found_versions: Vec<String>,
        who_depends: String,
        depends_on: String,
        location: PackageSource,
    },

    #[error("Dependency cycle detected between: {}", .units.join(", "))]
    DependencyCycle { units: Vec<String> },

    #[error("Failed to clone or update '{package_base}': {message}")]
    CloneError {
        package_base: String,
        message: String,
    },

    #[error("Failed to build '{package_base}': {message}")]
    BuildError {
        package_base: String,
        message: String,
    },

    #[error("Dependency Error: {0}")]
    DependencyError(String),

    #[error("'{package_base}' is waiting for {} to be built", .waiting_on.join(", "))]
    DependencyNotBuiltYet {
        package_base: String,
        waiting_on: Vec<String>,
    },

    #[error("Unresolved conflicts: {0}")]
    Conflict(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),
}

fn describe_not_found(packages: &[String], wanted_by: &[String]) -> String {
    let mut message = format!("Packages not found in the AUR: {}", packages.join(", "));
    if !wanted_by.is_empty() {
        message.push_str(&format!(" (required by {})", wanted_by.join(", ")));
    }
    message
}

impl AursError {
    /// Process exit code the CLI reports for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            AursError::PackagesNotFoundInRegistry { .. } => EXIT_PACKAGES_NOT_FOUND,
            AursError::Conflict(_) => EXIT_CONFLICT,
            AursError::DependencyVersionMismatch { .. }
            | AursError::DependencyCycle { .. }
            | AursError::CloneError { .. }
            | AursError::BuildError { .. }
            | AursError::DependencyError(_) => EXIT_NEEDS_DECISION,
            _ => EXIT_GENERIC,
        }
    }

    /// Transport-level failures that may succeed when repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AursError::Http(_) | AursError::HttpError(_) | AursError::Json(_)
        )
    }
}

impl From<std::io::Error> for AursError {
    fn from(err: std::io::Error) -> Self {
        AursError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for AursError {
    fn from(err: reqwest::Error) -> Self {
        AursError::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for AursError {
    fn from(err: serde_json::Error) -> Self {
        AursError::Json(Arc::new(err))
    }
}

impl From<git2::Error> for AursError {
    fn from(err: git2::Error) -> Self {
        AursError::Git(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, AursError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_follow_taxonomy() {
        let not_found = AursError::PackagesNotFoundInRegistry {
            packages: vec!["nope".into()],
            wanted_by: vec![],
        };
        assert_eq!(not_found.exit_code(), EXIT_PACKAGES_NOT_FOUND);
        assert_eq!(AursError::Conflict("a".into()).exit_code(), EXIT_CONFLICT);
        assert_eq!(
            AursError::DependencyCycle { units: vec!["x".into(), "y".into()] }.exit_code(),
            EXIT_NEEDS_DECISION
        );
        assert_eq!(AursError::Generic("boom".into()).exit_code(), EXIT_GENERIC);
    }

    #[test]
    fn test_not_found_message_names_requesters() {
        let err = AursError::PackagesNotFoundInRegistry {
            packages: vec!["libfoo".into()],
            wanted_by: vec!["bar".into()],
        };
        assert_eq!(
            err.to_string(),
            "Packages not found in the AUR: libfoo (required by bar)"
        );
    }

    #[test]
    fn test_mismatch_message_carries_location() {
        let err = AursError::DependencyVersionMismatch {
            dependency_line: "foo>=2".into(),
            found_versions: vec!["1.0-1".into()],
            who_depends: "bar".into(),
            depends_on: "foo".into(),
            location: PackageSource::Local,
        };
        let message = err.to_string();
        assert!(message.contains("foo>=2"));
        assert!(message.contains("1.0-1"));
        assert!(message.contains("installed packages"));
    }

    #[test]
    fn test_transport_errors_are_retryable() {
        assert!(AursError::HttpError("timeout".into()).is_retryable());
        assert!(!AursError::NotFound("x".into()).is_retryable());
    }
}
