//! Custom error types for the release orchestration engine.

use thiserror::Error;

/// Main error type for release orchestration.
#[derive(Error, Debug)]
pub enum ReleaseError {
    // Setup errors
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // External process errors
    #[error("Command `{command}` failed with exit code {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{0}")]
    UnsupportedTool(String),

    // Workspace errors
    #[error("Invalid changeset {path}: {reason}")]
    InvalidChangeset { path: String, reason: String },

    #[error("Invalid package manifest {path}: {reason}")]
    InvalidManifest { path: String, reason: String },

    #[error("Could not find changelog entry for {name}@{version}")]
    MissingChangelogEntry { name: String, version: String },

    #[error(
        "Publish output reported package \"{identifier}\" but no workspace package with that name exists"
    )]
    PublishOutputMismatch { identifier: String },

    // Forge/Git errors
    #[error("Forge operation failed: {0}")]
    ForgeError(String),

    #[error("Git URL parse error: {0}")]
    GitUrlError(#[from] git_url_parse::GitUrlParseError),

    #[error("Git operation failed: {0}")]
    GitError(#[from] git2::Error),

    // Parsing / rendering errors
    #[error("JSON parse error: {0}")]
    JsonParseError(#[from] serde_json::Error),

    #[error("Regular expression error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("Template rendering failed: {0}")]
    TemplateError(#[from] tera::Error),

    #[error("Invalid workspace glob: {0}")]
    GlobPatternError(#[from] glob::PatternError),

    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] log::SetLoggerError),

    // Generic wrapper for other errors
    #[error(transparent)]
    Other(#[from] color_eyre::Report),
}

/// Result type alias using ReleaseError
pub type Result<T> = std::result::Result<T, ReleaseError>;

impl ReleaseError {
    /// Create a forge error with context
    pub fn forge(msg: impl Into<String>) -> Self {
        Self::ForgeError(msg.into())
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a missing credential error
    pub fn missing_credential(msg: impl Into<String>) -> Self {
        Self::MissingCredential(msg.into())
    }

    pub fn invalid_manifest(
        path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidManifest {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_changeset(
        path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidChangeset {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_changelog_entry(
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self::MissingChangelogEntry {
            name: name.into(),
            version: version.into(),
        }
    }
}

// Implement From for std::io::Error - wraps in Other variant for generic I/O errors
impl From<std::io::Error> for ReleaseError {
    fn from(err: std::io::Error) -> Self {
        Self::Other(color_eyre::Report::from(err))
    }
}

// Implement From for octocrab errors (GitHub API)
impl From<octocrab::Error> for ReleaseError {
    fn from(err: octocrab::Error) -> Self {
        match &err {
            octocrab::Error::GitHub { source, .. } => Self::ForgeError(format!(
                "GitHub API error ({}): {}",
                source.status_code, source.message
            )),
            _ => Self::ForgeError(format!("GitHub API error: {}", err)),
        }
    }
}
