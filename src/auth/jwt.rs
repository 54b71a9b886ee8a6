use std::time::Duration;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::repo::User;
use crate::config::JwtConfig;
use crate::state::AppState;

/// State tokens only need to survive one redirect round trip.
const OAUTH_STATE_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Session,
    OauthState,
}

/// Claims of a stateless session token. Minimal identity only; invalidation
/// relies on `exp`, there is no revocation list.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

/// Claims of the short-lived CSRF state minted before an OAuth redirect and
/// checked on the callback.
#[derive(Debug, Serialize, Deserialize)]
pub struct StateClaims {
    pub provider: String,
    pub nonce: String,
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

#[derive(Clone)]
pub struct SessionKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub session_ttl: Duration,
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            issuer,
            audience,
            ttl_minutes,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            session_ttl: Duration::from_secs((ttl_minutes as u64) * 60),
        }
    }
}

impl SessionKeys {
    /// Mint a session token for a successfully authenticated identity,
    /// regardless of which provider produced it.
    pub fn sign_session(&self, user: &User) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.session_ttl.as_secs() as i64);
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind: TokenKind::Session,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user.id, "session token signed");
        Ok(token)
    }

    pub fn verify_session(&self, token: &str) -> anyhow::Result<Claims> {
        let claims: Claims = self.decode_with_validation(token)?;
        if claims.kind != TokenKind::Session {
            anyhow::bail!("not a session token");
        }
        debug!(user_id = %claims.sub, "session token verified");
        Ok(claims)
    }

    /// Mint the self-validating `state` parameter for an OAuth redirect.
    pub fn sign_state(&self, provider: &str) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(OAUTH_STATE_TTL.as_secs() as i64);
        let claims = StateClaims {
            provider: provider.to_string(),
            nonce: Uuid::new_v4().to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind: TokenKind::OauthState,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Check the callback's `state` parameter: signature, expiry, and that
    /// it was minted for the same provider the callback claims.
    pub fn verify_state(&self, token: &str, provider: &str) -> anyhow::Result<StateClaims> {
        let claims: StateClaims = self.decode_with_validation(token)?;
        if claims.kind != TokenKind::OauthState {
            anyhow::bail!("not an oauth state token");
        }
        if claims.provider != provider {
            anyhow::bail!(
                "state was minted for provider {}, callback is for {}",
                claims.provider,
                provider
            );
        }
        Ok(claims)
    }

    fn decode_with_validation<C: serde::de::DeserializeOwned>(
        &self,
        token: &str,
    ) -> anyhow::Result<C> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<C>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

/// Extracts and validates the bearer session token, yielding the user ID.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    SessionKeys: FromRef<S>,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = SessionKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "Missing Authorization header".to_string(),
            ))?;

        let token = auth_header.strip_prefix("Bearer ").ok_or((
            StatusCode::UNAUTHORIZED,
            "Invalid Authorization header".to_string(),
        ))?;

        match keys.verify_session(token) {
            Ok(claims) => Ok(AuthUser(claims.sub)),
            Err(_) => {
                warn!("invalid or expired session token");
                Err((
                    StatusCode::UNAUTHORIZED,
                    "Invalid or expired token".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys() -> SessionKeys {
        let state = AppState::fake();
        SessionKeys::from_ref(&state)
    }

    fn make_user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "guest@example.com".into(),
            password_hash: None,
            name: None,
            image: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn sign_and_verify_session_token() {
        let keys = make_keys();
        let user = make_user();
        let token = keys.sign_session(&user).expect("sign session");
        let claims = keys.verify_session(&token).expect("verify session");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Session);
    }

    #[tokio::test]
    async fn state_token_round_trip_checks_provider() {
        let keys = make_keys();
        let token = keys.sign_state("github").expect("sign state");
        let claims = keys.verify_state(&token, "github").expect("verify state");
        assert_eq!(claims.provider, "github");

        let err = keys.verify_state(&token, "google").unwrap_err();
        assert!(err.to_string().contains("minted for provider"));
    }

    #[tokio::test]
    async fn state_token_is_not_a_session() {
        let keys = make_keys();
        let token = keys.sign_state("github").expect("sign state");
        assert!(keys.verify_session(&token).is_err());
    }

    #[tokio::test]
    async fn verify_rejects_token_signed_with_other_secret() {
        let keys = make_keys();
        let other = SessionKeys {
            encoding: EncodingKey::from_secret(b"other-secret"),
            decoding: DecodingKey::from_secret(b"other-secret"),
            issuer: keys.issuer.clone(),
            audience: keys.audience.clone(),
            session_ttl: keys.session_ttl,
        };
        let token = other.sign_session(&make_user()).expect("sign");
        assert!(keys.verify_session(&token).is_err());
    }
}
