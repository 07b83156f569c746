//! Discord ↔ Lichess account linking flow.
//!
//! Authorization code flow with PKCE:
//! 1. The bot's button sends the user to GET /?id=<discord id> → session cookie set
//! 2. User clicks "Link" on the landing page → GET /login
//! 3. Redirect to Lichess /oauth with the S256 challenge
//! 4. User authorizes; Lichess redirects to GET /callback?code=...
//! 5. Exchange code + stored verifier for a token, fetch the account,
//!    store the encrypted token
//! 6. Browser is sent back to the Discord entry point

pub mod exchange;
pub mod provider;
pub mod session;

pub use session::{run_session_cleanup, SessionStore};

use crate::credentials::{LinkStore, LinkedAccount};
use crate::pkce;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use chrono::{Duration, Utc};
use exchange::LichessApi;
use provider::LichessConfig;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tower_http::services::ServeDir;
use tracing::{debug, error, info, warn};

/// Name of the browser session cookie.
const SESSION_COOKIE: &str = "chesslink_sid";

/// Landing page served to users arriving from the bot.
const INDEX_HTML: &str = include_str!("../../../static/index.html");

/// User-recoverable failures of the linking flow.
///
/// Every variant renders as the same alert-and-redirect page; none of them
/// terminate the process. The display strings are shown verbatim in the
/// browser alert.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Failed getting your Discord ID.\\nMake sure you click the button on the bot's message.")]
    MissingCallerIdentity,

    #[error("Your linking session has expired. Please start again from Discord.")]
    SessionExpired,

    #[error("Failed getting access token.")]
    TokenExchangeFailed,

    #[error("Failed fetching your Lichess profile.")]
    ProfileFetchFailed,

    #[error("Failed linking your account.")]
    PersistenceFailed,
}

/// Shared application state for the linking flow
#[derive(Clone)]
pub struct LinkAppState {
    pub sessions: SessionStore,
    pub links: Arc<LinkStore>,
    pub lichess: Arc<dyn LichessApi>,
    pub lichess_config: LichessConfig,
    /// Public base URL of this service; `/callback` is appended to form the
    /// redirect URI sent to Lichess
    pub public_base_url: String,
    /// Where the notification page sends the browser afterwards
    pub done_redirect_url: String,
}

/// Landing request query parameters
#[derive(Deserialize)]
pub struct LandingParams {
    id: Option<String>,
}

/// OAuth callback query parameters
#[derive(Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

/// Create the linking flow router
pub fn create_link_router(state: LinkAppState) -> Router {
    Router::new()
        .route("/", get(landing))
        .route("/login", get(login))
        .route("/callback", get(callback))
        .nest_service("/static", ServeDir::new("static"))
        .with_state(Arc::new(state))
}

/// GET /
///
/// Entry point from the bot's message. Stores the Discord id in the browser
/// session; without an id the user is told to retry via the bot.
async fn landing(
    State(state): State<Arc<LinkAppState>>,
    headers: HeaderMap,
    Query(params): Query<LandingParams>,
) -> Response {
    let discord_id = params.id.filter(|id| !id.is_empty());
    let token = ensure_session(&state, &headers, discord_id.clone());

    let Some(discord_id) = discord_id else {
        warn!("Landing request without a Discord id");
        return with_session_cookie(
            notice_page(
                &FlowError::MissingCallerIdentity.to_string(),
                &state.done_redirect_url,
            ),
            &token,
            state.sessions.ttl_seconds(),
        );
    };

    debug!(discord_id = %discord_id, "Linking session started");
    with_session_cookie(Html(INDEX_HTML), &token, state.sessions.ttl_seconds())
}

/// GET /login
///
/// Generates a PKCE pair, stores the verifier in the session, and redirects
/// the browser to the Lichess authorization endpoint.
async fn login(State(state): State<Arc<LinkAppState>>, headers: HeaderMap) -> Response {
    let token = ensure_session(&state, &headers, None);

    let verifier = pkce::generate_verifier();
    let challenge = pkce::compute_challenge(&verifier);
    state.sessions.set_verifier(&token, &verifier);

    let redirect_uri = callback_uri(&state);
    let auth_url = state.lichess_config.build_auth_url(&challenge, &redirect_uri);

    debug!("Redirecting to Lichess authorization endpoint");
    with_session_cookie(
        Redirect::temporary(&auth_url),
        &token,
        state.sessions.ttl_seconds(),
    )
}

/// GET /callback
///
/// Lichess redirects here after the user authorizes. Runs the rest of the
/// flow (exchange → profile → encrypt → persist) and notifies the user.
async fn callback(
    State(state): State<Arc<LinkAppState>>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Html<String> {
    match complete_link(&state, &headers, params).await {
        Ok(username) => {
            info!(lichess_username = %username, "Account linked");
            notice_page("Successfully linked your account!", &state.done_redirect_url)
        }
        Err(err) => {
            warn!(error = %err, "Linking flow failed");
            notice_page(&err.to_string(), &state.done_redirect_url)
        }
    }
}

/// The callback side of the flow: resolve the session, exchange the code,
/// fetch the account, encrypt and persist.
///
/// Each fallible step maps to exactly one `FlowError` variant, so every
/// failure transition is observable on its own. Nothing is persisted unless
/// every prior step succeeded, and the storage connection is only acquired
/// inside the final upsert.
async fn complete_link(
    state: &LinkAppState,
    headers: &HeaderMap,
    params: CallbackParams,
) -> Result<String, FlowError> {
    if let Some(error) = params.error {
        warn!(error = %error, "Lichess denied the authorization request");
        return Err(FlowError::TokenExchangeFailed);
    }

    let token = session_token(headers).ok_or(FlowError::SessionExpired)?;
    let session = state
        .sessions
        .resolve(&token)
        .ok_or(FlowError::SessionExpired)?;
    let verifier = session.code_verifier.ok_or(FlowError::SessionExpired)?;
    let discord_id = session
        .discord_id
        .filter(|id| !id.is_empty())
        .ok_or(FlowError::MissingCallerIdentity)?;

    let code = params
        .code
        .filter(|code| !code.is_empty())
        .ok_or(FlowError::TokenExchangeFailed)?;

    let token_response = state
        .lichess
        .exchange_code(&code, &verifier, &callback_uri(state))
        .await
        .map_err(|e| {
            warn!(error = %e, "Token exchange failed");
            FlowError::TokenExchangeFailed
        })?;
    let access_token = token_response
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or(FlowError::TokenExchangeFailed)?;

    let account = state.lichess.fetch_account(&access_token).await.map_err(|e| {
        warn!(error = %e, "Account fetch failed");
        FlowError::ProfileFetchFailed
    })?;

    let expires_at = Utc::now() + Duration::seconds(token_response.expires_in.unwrap_or(0));

    state
        .links
        .upsert(&LinkedAccount {
            discord_id: discord_id.clone(),
            lichess_username: account.username.clone(),
            access_token,
            expires_at,
        })
        .map_err(|e| {
            error!(discord_id = %discord_id, error = %e, "Failed to store linked account");
            FlowError::PersistenceFailed
        })?;

    // The pending authorization is consumed; a new link starts from scratch
    state.sessions.remove(&token);

    Ok(account.username)
}

/// Reuse the browser's session when its cookie still resolves, otherwise
/// start a fresh one.
fn ensure_session(
    state: &LinkAppState,
    headers: &HeaderMap,
    discord_id: Option<String>,
) -> String {
    if let Some(token) = session_token(headers) {
        if state.sessions.resolve(&token).is_some() {
            if let Some(id) = &discord_id {
                state.sessions.set_discord_id(&token, id);
            }
            return token;
        }
    }
    state.sessions.begin(discord_id)
}

fn callback_uri(state: &LinkAppState) -> String {
    format!("{}/callback", state.public_base_url)
}

/// Pull the session token out of the Cookie header, if present.
fn session_token(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

/// Attach the session cookie to a response.
fn with_session_cookie(response: impl IntoResponse, token: &str, max_age: i64) -> Response {
    let mut response = response.into_response();
    let cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}"
    );
    if let Ok(value) = cookie.parse() {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

/// Render the uniform notification page: a browser alert followed by a
/// redirect back to the Discord entry point.
fn notice_page(message: &str, redirect_url: &str) -> Html<String> {
    let message = message.replace('"', "\\\"");
    Html(format!(
        r#"<script>
  window.alert("{message}");
  window.location.href = "{redirect_url}";
</script>"#
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_params_deserialization() {
        // Success case
        let params: CallbackParams = serde_urlencoded::from_str("code=auth_code_123").unwrap();
        assert_eq!(params.code, Some("auth_code_123".to_string()));
        assert_eq!(params.error, None);

        // Denied case
        let params: CallbackParams = serde_urlencoded::from_str("error=access_denied").unwrap();
        assert_eq!(params.error, Some("access_denied".to_string()));
        assert_eq!(params.code, None);

        // Missing everything
        let params: CallbackParams = serde_urlencoded::from_str("").unwrap();
        assert!(params.code.is_none());
    }

    #[test]
    fn test_landing_params_deserialization() {
        let params: LandingParams = serde_urlencoded::from_str("id=123456789").unwrap();
        assert_eq!(params.id, Some("123456789".to_string()));

        let params: LandingParams = serde_urlencoded::from_str("").unwrap();
        assert!(params.id.is_none());
    }

    #[test]
    fn test_session_token_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            "other=1; chesslink_sid=abc-123; theme=dark".parse().unwrap(),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("abc-123"));

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "other=1".parse().unwrap());
        assert!(session_token(&headers).is_none());

        assert!(session_token(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_notice_page_escapes_quotes() {
        let Html(body) = notice_page(r#"a "quoted" message"#, "https://example.com");
        assert!(body.contains(r#"window.alert("a \"quoted\" message");"#));
        assert!(body.contains(r#"window.location.href = "https://example.com";"#));
    }

    #[test]
    fn test_flow_error_messages_are_user_facing() {
        assert!(FlowError::TokenExchangeFailed
            .to_string()
            .contains("access token"));
        assert!(FlowError::PersistenceFailed
            .to_string()
            .contains("linking your account"));
    }
}
