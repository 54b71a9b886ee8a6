use std::fmt;
use std::str::FromStr;

use crate::config::AppConfig;

/// The closed set of authentication strategies. There is no runtime
/// provider registration; the list is fixed at compile time and configured
/// at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    GitHub,
    Google,
    Credentials,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::GitHub, Provider::Google, Provider::Credentials];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::GitHub => "github",
            Provider::Google => "google",
            Provider::Credentials => "credentials",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(Provider::GitHub),
            "google" => Ok(Provider::Google),
            "credentials" => Ok(Provider::Credentials),
            _ => Err(()),
        }
    }
}

/// Full OAuth configuration for one delegated-identity provider: client
/// credentials plus the provider's fixed protocol endpoints.
#[derive(Debug, Clone)]
pub struct OAuthProvider {
    pub provider: Provider,
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub scopes: Vec<String>,
}

/// Static composition of the configured providers, built once at startup.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    github: OAuthProvider,
    google: OAuthProvider,
}

impl ProviderRegistry {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            github: OAuthProvider {
                provider: Provider::GitHub,
                client_id: config.github.client_id.clone(),
                client_secret: config.github.client_secret.clone(),
                auth_url: "https://github.com/login/oauth/authorize".into(),
                token_url: "https://github.com/login/oauth/access_token".into(),
                userinfo_url: "https://api.github.com/user".into(),
                scopes: vec!["read:user".into(), "user:email".into()],
            },
            google: OAuthProvider {
                provider: Provider::Google,
                client_id: config.google.client_id.clone(),
                client_secret: config.google.client_secret.clone(),
                auth_url: "https://accounts.google.com/o/oauth2/v2/auth".into(),
                token_url: "https://oauth2.googleapis.com/token".into(),
                userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo".into(),
                scopes: vec!["openid".into(), "email".into(), "profile".into()],
            },
        }
    }

    /// The OAuth configuration for a provider, or None for the credentials
    /// strategy, which has no delegated endpoints.
    pub fn oauth(&self, provider: Provider) -> Option<&OAuthProvider> {
        match provider {
            Provider::GitHub => Some(&self.github),
            Provider::Google => Some(&self.google),
            Provider::Credentials => None,
        }
    }
}
