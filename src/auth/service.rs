use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument};

use crate::auth::oauth::OAuthIdentity;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::providers::Provider;
use crate::auth::repo::{Account, User};
use crate::error::{AuthError, RejectReason};
use crate::state::AppState;

/// Hash with valid parameters that matches no password. Verified when a
/// login attempt has no stored hash to check against, so the "unknown
/// email" and "OAuth-only account" paths do the same argon2 work as a
/// real mismatch instead of returning early.
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// First transition of a login attempt. Runs before any store lookup so
/// malformed attempts never touch the database.
pub fn validate_credentials_input(email: &str, password: &str) -> Result<(), AuthError> {
    if email.trim().is_empty() || password.is_empty() {
        // One reason for both fields; the response must not reveal which
        // field was absent.
        return Err(AuthError::InvalidCredentials(RejectReason::MissingFields));
    }
    Ok(())
}

/// Decide a login attempt against the (possibly absent) stored user.
/// CPU-bound through argon2; callers on the async runtime should run this
/// under `spawn_blocking`.
///
/// Every rejection carries a distinct internal reason but collapses to the
/// same caller-visible error.
pub fn check_credentials(user: Option<User>, password: &str) -> Result<User, AuthError> {
    let Some(user) = user else {
        let _ = verify_password(password, DUMMY_HASH);
        return Err(AuthError::InvalidCredentials(RejectReason::UnknownEmail));
    };
    let Some(hash) = user.password_hash.clone() else {
        let _ = verify_password(password, DUMMY_HASH);
        return Err(AuthError::InvalidCredentials(RejectReason::NoPasswordSet));
    };

    if verify_password(password, &hash)
        .map_err(|e| AuthError::Internal(e.context("password verification")))?
    {
        Ok(user)
    } else {
        Err(AuthError::InvalidCredentials(RejectReason::WrongPassword))
    }
}

/// Full credentials authentication: one store lookup by email, then the
/// verification transition on the blocking pool.
#[instrument(skip(state, password))]
pub async fn authenticate(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<User, AuthError> {
    validate_credentials_input(email, password)?;
    let email = email.trim().to_lowercase();

    let user = User::find_by_email(&state.db, &email).await?;

    let password = password.to_owned();
    let user = tokio::task::spawn_blocking(move || check_credentials(user, &password))
        .await
        .map_err(|e| AuthError::Internal(anyhow::anyhow!("verification task failed: {e}")))??;

    info!(user_id = %user.id, "credentials login succeeded");
    Ok(user)
}

/// Register a new user with an email and password. Unlike login, the
/// failure modes here are distinct on purpose; registration is not an
/// authentication oracle.
#[instrument(skip(state, password))]
pub async fn register(
    state: &AppState,
    email: &str,
    name: Option<&str>,
    password: &str,
) -> Result<User, AuthError> {
    let email = email.trim().to_lowercase();

    if !is_valid_email(&email) {
        return Err(AuthError::BadRequest("Invalid email".into()));
    }
    if password.len() < 8 {
        return Err(AuthError::BadRequest("Password too short".into()));
    }
    if User::find_by_email(&state.db, &email).await?.is_some() {
        return Err(AuthError::EmailTaken);
    }

    let plain = password.to_owned();
    let hash = tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|e| AuthError::Internal(anyhow::anyhow!("hashing task failed: {e}")))?
        .map_err(AuthError::Internal)?;

    let user = User::create_with_password(&state.db, &email, &hash, name).await?;
    info!(user_id = %user.id, "user registered");
    Ok(user)
}

/// Upsert a user from a verified delegated-identity assertion: reuse the
/// linked account if the provider was seen before, otherwise attach the
/// provider to an existing user with the same email, otherwise create a
/// fresh passwordless user.
#[instrument(skip(state, identity), fields(provider = %provider))]
pub async fn oauth_sign_in(
    state: &AppState,
    provider: Provider,
    identity: &OAuthIdentity,
) -> Result<User, AuthError> {
    let email = identity.email.trim().to_lowercase();

    let user = match Account::find(
        &state.db,
        provider.as_str(),
        &identity.provider_account_id,
    )
    .await?
    {
        Some(account) => User::find_by_id(&state.db, account.user_id)
            .await?
            .ok_or_else(|| {
                AuthError::Internal(anyhow::anyhow!("account row without user row"))
            })?,
        None => {
            let user = match User::find_by_email(&state.db, &email).await? {
                Some(user) => user,
                None => {
                    User::create_from_oauth(
                        &state.db,
                        &email,
                        identity.name.as_deref(),
                        identity.image.as_deref(),
                    )
                    .await?
                }
            };
            Account::link(
                &state.db,
                user.id,
                provider.as_str(),
                &identity.provider_account_id,
            )
            .await?;
            user
        }
    };

    let user = User::update_profile(
        &state.db,
        user.id,
        identity.name.as_deref(),
        identity.image.as_deref(),
    )
    .await?;

    info!(user_id = %user.id, "oauth login succeeded");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn user_with_hash(email: &str, hash: Option<String>) -> User {
        User {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: hash,
            name: None,
            image: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn assert_rejected(result: Result<User, AuthError>, expected: RejectReason) {
        match result {
            Err(AuthError::InvalidCredentials(reason)) => assert_eq!(reason, expected),
            other => panic!("expected invalid-credentials rejection, got {other:?}"),
        }
    }

    #[test]
    fn empty_email_or_password_rejects_before_lookup() {
        for (email, password) in [("", "secret1"), ("a@x.com", ""), ("   ", "secret1"), ("", "")] {
            match validate_credentials_input(email, password) {
                Err(AuthError::InvalidCredentials(RejectReason::MissingFields)) => {}
                other => panic!("expected missing-fields rejection, got {other:?}"),
            }
        }
        assert!(validate_credentials_input("a@x.com", "secret1").is_ok());
    }

    #[test]
    fn unknown_email_rejects() {
        assert_rejected(check_credentials(None, "anything"), RejectReason::UnknownEmail);
    }

    #[test]
    fn oauth_only_account_rejects_any_password() {
        for password in ["", "secret1", "hunter2", "ThisIsAVeryLongPassword!"] {
            let user = user_with_hash("oauth@x.com", None);
            assert_rejected(
                check_credentials(Some(user), password),
                RejectReason::NoPasswordSet,
            );
        }
    }

    #[test]
    fn correct_password_authenticates_wrong_password_rejects() {
        let hash = hash_password("secret1").expect("hash");
        let user = user_with_hash("a@x.com", Some(hash.clone()));

        let authenticated =
            check_credentials(Some(user.clone()), "secret1").expect("should authenticate");
        assert_eq!(authenticated.email, "a@x.com");

        assert_rejected(
            check_credentials(Some(user), "wrong"),
            RejectReason::WrongPassword,
        );
    }

    #[test]
    fn authentication_is_deterministic() {
        let hash = hash_password("secret1").expect("hash");
        let user = user_with_hash("a@x.com", Some(hash));

        for _ in 0..2 {
            assert!(check_credentials(Some(user.clone()), "secret1").is_ok());
        }
        for _ in 0..2 {
            assert_rejected(
                check_credentials(Some(user.clone()), "wrong"),
                RejectReason::WrongPassword,
            );
        }
    }

    #[test]
    fn rejections_share_the_same_external_error() {
        let no_user = check_credentials(None, "x").unwrap_err();
        let no_hash =
            check_credentials(Some(user_with_hash("a@x.com", None)), "x").unwrap_err();
        assert_eq!(no_user.to_string(), no_hash.to_string());
    }

    #[test]
    fn email_validation_basics() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a @x.com"));
        assert!(!is_valid_email("a@x"));
    }
}
