//! Configuration for the hosting API connection.
use secrecy::SecretString;

/// Prefix of the long-lived branch holding the pending version bump.
pub const RELEASE_BRANCH_PREFIX: &str = "changeset-release";

/// Remote repository connection configuration for authenticating and
/// interacting with the forge.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Remote forge host (e.g., "github.com").
    pub host: String,
    /// URL scheme (http or https).
    pub scheme: String,
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Access token for authentication.
    pub token: SecretString,
    /// Override for the API base url (GitHub Enterprise).
    pub api_url: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: "".to_string(),
            scheme: "".to_string(),
            owner: "".to_string(),
            repo: "".to_string(),
            token: SecretString::from("".to_string()),
            api_url: None,
        }
    }
}

impl RemoteConfig {
    /// `owner/repo` slug.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    pub fn api_base_uri(&self) -> String {
        match &self.api_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("{}://api.{}", self.scheme, self.host),
        }
    }
}

/// Release branch name for a base branch.
pub fn release_branch(base_branch: &str) -> String {
    format!("{RELEASE_BRANCH_PREFIX}/{base_branch}")
}
