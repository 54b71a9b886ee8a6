use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::auth::providers::OAuthProvider;
use crate::error::AuthError;

/// Verified identity assertion obtained from a delegated provider after a
/// completed handshake. This is all the auth layer needs to upsert a user.
#[derive(Debug, Clone)]
pub struct OAuthIdentity {
    pub provider_account_id: String,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: i64,
    email: Option<String>,
    name: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

#[derive(Debug, Deserialize)]
struct GoogleUser {
    id: String,
    email: String,
    name: Option<String>,
    picture: Option<String>,
}

/// Build the URL the user is redirected to for authorization. The `state`
/// parameter is a signed token checked again on the callback.
pub fn build_authorize_url(
    provider: &OAuthProvider,
    redirect_uri: &str,
    state: &str,
) -> Result<String, AuthError> {
    let mut url = Url::parse(&provider.auth_url)
        .map_err(|e| AuthError::Provider(format!("invalid auth url: {e}")))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("client_id", &provider.client_id);
        query.append_pair("redirect_uri", redirect_uri);
        query.append_pair("response_type", "code");
        query.append_pair("scope", &provider.scopes.join(" "));
        query.append_pair("state", state);
    }
    debug!(provider = %provider.provider, "built authorization url");
    Ok(url.to_string())
}

/// Exchange an authorization code for an access token at the provider's
/// token endpoint.
pub async fn exchange_code(
    http: &reqwest::Client,
    provider: &OAuthProvider,
    redirect_uri: &str,
    code: &str,
) -> Result<String, AuthError> {
    let params = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("client_id", &provider.client_id),
        ("client_secret", &provider.client_secret),
    ];

    let response = http
        .post(&provider.token_url)
        // GitHub defaults to form-encoded responses without this
        .header(reqwest::header::ACCEPT, "application/json")
        .form(&params)
        .send()
        .await
        .map_err(|e| AuthError::Provider(format!("token request failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        warn!(provider = %provider.provider, %status, error = %body, "token exchange failed");
        return Err(AuthError::Provider(format!(
            "token endpoint returned {status}"
        )));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| AuthError::Provider(format!("bad token response: {e}")))?;
    Ok(token.access_token)
}

/// Fetch the authenticated user's profile from the provider's userinfo
/// endpoint and normalize it into an identity assertion.
pub async fn fetch_identity(
    http: &reqwest::Client,
    provider: &OAuthProvider,
    access_token: &str,
) -> Result<OAuthIdentity, AuthError> {
    use crate::auth::providers::Provider;

    let response = http
        .get(&provider.userinfo_url)
        .bearer_auth(access_token)
        .header(reqwest::header::USER_AGENT, "homestay")
        .send()
        .await
        .map_err(|e| AuthError::Provider(format!("userinfo request failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        warn!(provider = %provider.provider, %status, "userinfo fetch failed");
        return Err(AuthError::Provider(format!(
            "userinfo endpoint returned {status}"
        )));
    }

    match provider.provider {
        Provider::GitHub => {
            let user: GitHubUser = response
                .json()
                .await
                .map_err(|e| AuthError::Provider(format!("bad userinfo response: {e}")))?;
            let email = match user.email {
                Some(email) => email,
                // The profile email is often hidden; the emails endpoint
                // still lists the verified primary address.
                None => fetch_github_primary_email(http, access_token).await?,
            };
            Ok(OAuthIdentity {
                provider_account_id: user.id.to_string(),
                email,
                name: user.name,
                image: user.avatar_url,
            })
        }
        Provider::Google => {
            let user: GoogleUser = response
                .json()
                .await
                .map_err(|e| AuthError::Provider(format!("bad userinfo response: {e}")))?;
            Ok(OAuthIdentity {
                provider_account_id: user.id,
                email: user.email,
                name: user.name,
                image: user.picture,
            })
        }
        Provider::Credentials => Err(AuthError::Provider(
            "credentials provider has no userinfo endpoint".into(),
        )),
    }
}

async fn fetch_github_primary_email(
    http: &reqwest::Client,
    access_token: &str,
) -> Result<String, AuthError> {
    let emails: Vec<GitHubEmail> = http
        .get("https://api.github.com/user/emails")
        .bearer_auth(access_token)
        .header(reqwest::header::USER_AGENT, "homestay")
        .send()
        .await
        .map_err(|e| AuthError::Provider(format!("emails request failed: {e}")))?
        .json()
        .await
        .map_err(|e| AuthError::Provider(format!("bad emails response: {e}")))?;

    emails
        .into_iter()
        .find(|e| e.primary && e.verified)
        .map(|e| e.email)
        .ok_or_else(|| AuthError::Provider("no verified primary email on account".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::providers::Provider;
    use crate::state::AppState;

    fn github() -> OAuthProvider {
        let state = AppState::fake();
        state.providers.oauth(Provider::GitHub).unwrap().clone()
    }

    #[tokio::test]
    async fn authorize_url_carries_client_id_state_and_scopes() {
        let url = build_authorize_url(&github(), "http://localhost:8080/auth/github/callback", "opaque-state")
            .expect("build url");
        let parsed = Url::parse(&url).unwrap();
        let pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("client_id".into(), "gh-id".into())));
        assert!(pairs.contains(&("state".into(), "opaque-state".into())));
        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.iter().any(|(k, v)| k == "scope" && v.contains("user:email")));
    }

    #[tokio::test]
    async fn authorize_url_never_leaks_the_client_secret() {
        let url = build_authorize_url(&github(), "http://localhost/cb", "s").unwrap();
        assert!(!url.contains("gh-secret"));
    }

    #[tokio::test]
    async fn google_authorize_url_targets_the_google_endpoint() {
        let state = AppState::fake();
        let google = state.providers.oauth(Provider::Google).unwrap();
        let url = build_authorize_url(google, "http://localhost/cb", "s").unwrap();
        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.host_str(), Some("accounts.google.com"));
        assert!(parsed
            .query_pairs()
            .any(|(k, v)| k == "scope" && v.contains("email")));
    }
}
