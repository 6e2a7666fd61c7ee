//! Hosting API used to maintain the release pull request and publish
//! GitHub releases.

/// Connection configuration for the hosting API.
pub mod config;

/// GitHub API client implementation for GitHub.com and Enterprise.
pub mod github;

/// Request and response types shared by forge implementations.
pub mod request;

/// Common traits for forge platform abstraction.
pub mod traits;
