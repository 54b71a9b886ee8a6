use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Client credentials for one delegated-identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub github: OAuthClientConfig,
    pub google: OAuthClientConfig,
    /// Externally reachable base URL, used to build OAuth callback URLs.
    pub public_url: String,
    pub debug: bool,
}

impl AppConfig {
    /// Read the full configuration once at startup. A missing secret is a
    /// startup failure, never a per-request one.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is required")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is required")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "homestay".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "homestay-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 30),
        };
        let github = OAuthClientConfig {
            client_id: std::env::var("GITHUB_ID").context("GITHUB_ID is required")?,
            client_secret: std::env::var("GITHUB_SECRET").context("GITHUB_SECRET is required")?,
        };
        let google = OAuthClientConfig {
            client_id: std::env::var("GOOGLE_CLIENT_ID").context("GOOGLE_CLIENT_ID is required")?,
            client_secret: std::env::var("GOOGLE_CLIENT_SECRET")
                .context("GOOGLE_CLIENT_SECRET is required")?,
        };
        let public_url = std::env::var("PUBLIC_URL").unwrap_or_else(|_| {
            format!(
                "http://{}:{}",
                std::env::var("APP_HOST").unwrap_or_else(|_| "localhost".into()),
                std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
            )
        });
        let debug = std::env::var("APP_ENV")
            .map(|v| v == "development")
            .unwrap_or(false);
        Ok(Self {
            database_url,
            jwt,
            github,
            google,
            public_url,
            debug,
        })
    }
}
