use axum::{
    extract::{FromRef, Path, Query, State},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{LoginRequest, OAuthCallback, PublicUser, RegisterRequest, SessionResponse},
        jwt::{AuthUser, SessionKeys},
        oauth,
        providers::Provider,
        repo::User,
        service,
    },
    error::AuthError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/:provider", get(oauth_authorize))
        .route("/auth/:provider/callback", get(oauth_callback))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn session_response(state: &AppState, user: User) -> Result<Json<SessionResponse>, AuthError> {
    let keys = SessionKeys::from_ref(state);
    let token = keys.sign_session(&user).map_err(AuthError::Internal)?;
    Ok(Json(SessionResponse {
        token,
        user: PublicUser::from(user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<SessionResponse>, AuthError> {
    let user = service::register(
        &state,
        &payload.email,
        payload.name.as_deref(),
        &payload.password,
    )
    .await?;
    session_response(&state, user)
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, AuthError> {
    let user = service::authenticate(&state, &payload.email, &payload.password).await?;
    session_response(&state, user)
}

fn oauth_provider(name: &str) -> Result<Provider, AuthError> {
    match name.parse::<Provider>() {
        Ok(Provider::Credentials) | Err(()) => {
            Err(AuthError::BadRequest(format!("Unknown provider: {name}")))
        }
        Ok(provider) => Ok(provider),
    }
}

fn callback_url(state: &AppState, provider: Provider) -> String {
    format!("{}/auth/{}/callback", state.config.public_url, provider)
}

/// Start a delegated-identity handshake: mint a signed state and redirect
/// the user to the provider's authorize endpoint.
#[instrument(skip(state))]
pub async fn oauth_authorize(
    State(state): State<AppState>,
    Path(provider_name): Path<String>,
) -> Result<Redirect, AuthError> {
    let provider = oauth_provider(&provider_name)?;
    let oauth_config = state
        .providers
        .oauth(provider)
        .ok_or_else(|| AuthError::BadRequest(format!("Unknown provider: {provider_name}")))?;

    let keys = SessionKeys::from_ref(&state);
    let csrf_state = keys
        .sign_state(provider.as_str())
        .map_err(AuthError::Internal)?;

    let url = oauth::build_authorize_url(oauth_config, &callback_url(&state, provider), &csrf_state)?;
    info!(provider = %provider, "redirecting to provider");
    Ok(Redirect::temporary(&url))
}

/// Finish the handshake: check the CSRF state, exchange the code, fetch the
/// identity assertion and sign the user in.
#[instrument(skip(state, params))]
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider_name): Path<String>,
    Query(params): Query<OAuthCallback>,
) -> Result<Json<SessionResponse>, AuthError> {
    let provider = oauth_provider(&provider_name)?;
    let oauth_config = state
        .providers
        .oauth(provider)
        .ok_or_else(|| AuthError::BadRequest(format!("Unknown provider: {provider_name}")))?;

    let keys = SessionKeys::from_ref(&state);
    keys.verify_state(&params.state, provider.as_str())
        .map_err(|e| AuthError::BadRequest(format!("Invalid state: {e}")))?;

    let access_token = oauth::exchange_code(
        &state.http,
        oauth_config,
        &callback_url(&state, provider),
        &params.code,
    )
    .await?;
    let identity = oauth::fetch_identity(&state.http, oauth_config, &access_token).await?;

    let user = service::oauth_sign_in(&state, provider, &identity).await?;
    session_response(&state, user)
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AuthError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(AuthError::BadRequest("User not found".into()))?;
    Ok(Json(PublicUser::from(user)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_is_not_a_redirect_provider() {
        assert!(oauth_provider("credentials").is_err());
        assert!(oauth_provider("facebook").is_err());
        assert!(matches!(oauth_provider("github"), Ok(Provider::GitHub)));
        assert!(matches!(oauth_provider("google"), Ok(Provider::Google)));
    }

    #[tokio::test]
    async fn callback_url_is_rooted_at_public_url() {
        let state = AppState::fake();
        assert_eq!(
            callback_url(&state, Provider::GitHub),
            "http://localhost:8080/auth/github/callback"
        );
    }
}
