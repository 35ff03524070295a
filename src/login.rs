#![cfg(feature = "web")]

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use lazy_static::lazy_static;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::app::AppState;
use crate::config::ConfiguredUser;
use crate::error::{DashboardError, Result};
use crate::view::render_login;

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "session";

/// User session data
///
/// Represents an authenticated user session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Username of the authenticated user
    pub user_id: String,

    /// Time when the session expires
    pub expires_at: SystemTime,
}

/// Global sessions storage
///
/// Stores all active user sessions in a thread-safe map.
lazy_static! {
    static ref SESSIONS: RwLock<HashMap<String, Session>> = RwLock::new(HashMap::new());
}

/// Credential data for login
///
/// Used to receive the login form data from the client.
#[derive(Debug, Deserialize)]
pub struct UserCredentials {
    /// Username for login
    pub username: String,

    /// Password in plaintext (only transmitted, never stored)
    pub password: String,
}

/// Query string of the login page.
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub error: Option<String>,
}

/// Argon2 hashes of the configured users
///
/// Plain-text passwords from the configuration are hashed once at startup
/// and dropped; only the hashes stay in memory.
#[derive(Debug, Default)]
pub struct CredentialStore {
    hashes: HashMap<String, String>,
}

impl CredentialStore {
    /// Hash every configured password
    ///
    /// # Errors
    /// * `DashboardError::Config` if a password cannot be hashed
    pub fn from_users(users: &[ConfiguredUser]) -> Result<Self> {
        let mut hashes = HashMap::new();
        for user in users {
            hashes.insert(user.username.clone(), hash_password(&user.password)?);
        }
        Ok(CredentialStore { hashes })
    }

    /// Check a username/password pair against the stored hashes
    ///
    /// # Examples
    /// ```
    /// use benefits_dashboard::config::ConfiguredUser;
    /// use benefits_dashboard::login::CredentialStore;
    ///
    /// let store = CredentialStore::from_users(&[ConfiguredUser {
    ///     username: "ana".into(),
    ///     password: "segredo".into(),
    /// }])
    /// .unwrap();
    /// assert!(store.verify("ana", "segredo"));
    /// assert!(!store.verify("ana", "errado"));
    /// ```
    pub fn verify(&self, username: &str, password: &str) -> bool {
        match self.hashes.get(username) {
            Some(hash) => verify_password(password, hash),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

/// Hash a password using Argon2
///
/// Creates a cryptographically secure hash of a password using Argon2id.
///
/// # Arguments
/// * `password` - The plaintext password to hash
///
/// # Returns
/// * `Result<String>` - The password hash in PHC string format
fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    match argon2.hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(e) => Err(DashboardError::Config(format!("password hashing failed: {}", e))),
    }
}

/// Verify a password against a stored hash
///
/// A malformed hash never verifies.
fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(hash) => hash,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Create a new user session
///
/// Creates and stores a new session for an authenticated user.
///
/// # Arguments
/// * `username` - The username to create a session for
/// * `lifetime` - How long the session stays valid
///
/// # Returns
/// * `String` - A unique session ID
pub fn create_session(username: &str, lifetime: Duration) -> String {
    let session_id = Uuid::new_v4().to_string();
    let session = Session {
        user_id: username.to_string(),
        expires_at: SystemTime::now() + lifetime,
    };

    let mut sessions = SESSIONS.write().unwrap_or_else(|e| e.into_inner());
    sessions.retain(|_, s| s.expires_at > SystemTime::now());
    sessions.insert(session_id.clone(), session);

    session_id
}

/// Validate a session
///
/// Checks if a session is valid and not expired.
///
/// # Arguments
/// * `session_id` - The session ID to validate
///
/// # Returns
/// * `Option<String>` - The username for the session if valid, None otherwise
pub fn validate_session(session_id: &str) -> Option<String> {
    let sessions = SESSIONS.read().unwrap_or_else(|e| e.into_inner());

    sessions
        .get(session_id)
        .filter(|session| session.expires_at > SystemTime::now())
        .map(|session| session.user_id.clone())
}

/// Forget a session; unknown ids are ignored.
pub fn end_session(session_id: &str) {
    let mut sessions = SESSIONS.write().unwrap_or_else(|e| e.into_inner());
    sessions.remove(session_id);
}

/// Serve the login page HTML
///
/// A failed attempt comes back here with `?error=...`, shown above the form.
pub async fn serve_login_page(Query(query): Query<LoginQuery>) -> Html<String> {
    Html(render_login(query.error.as_deref()))
}

/// Handle a login attempt
///
/// # Arguments
/// * `state` - Shared application state holding the credential store
/// * `jar` - Cookie jar for storing the session cookie
/// * `credentials` - Form data containing username and password
///
/// # Returns
/// * `Response` - Redirect to the dashboard with a session cookie if
///   successful, or back to the login page with an error message
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(credentials): Form<UserCredentials>,
) -> Response {
    let username = credentials.username.trim();

    if state.credentials.verify(username, &credentials.password) {
        log::info!("User `{}` logged in", username);
        let lifetime = Duration::from_secs(state.config.session_hours * 60 * 60);
        let session_id = create_session(username, lifetime);

        let mut cookie = Cookie::new(SESSION_COOKIE, session_id);
        cookie.set_path("/");
        cookie.set_http_only(true);

        (jar.add(cookie), Redirect::to("/")).into_response()
    } else {
        log::warn!("Failed login attempt for `{}`", username);
        let message = urlencoding::encode("Usuário ou senha inválidos");
        Redirect::to(&format!("/login?error={}", message)).into_response()
    }
}

/// Handle user logout
///
/// Ends the session and clears the session cookie before redirecting to the
/// login page.
pub async fn handle_logout(jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        end_session(cookie.value());
    }

    let mut cookie = Cookie::new(SESSION_COOKIE, "");
    cookie.set_path("/");

    (jar.remove(cookie), Redirect::to("/login"))
}

/// Authentication middleware
///
/// Lets requests with a valid session through, with the username stored in
/// the request extensions. Otherwise API calls get `401` and pages are
/// redirected to the login form.
///
/// # Arguments
/// * `jar` - Cookie jar containing session information
/// * `request` - The incoming request
/// * `next` - Next middleware in the chain
pub async fn require_auth(
    jar: CookieJar,
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    if let Some(session_cookie) = jar.get(SESSION_COOKIE) {
        if let Some(username) = validate_session(session_cookie.value()) {
            request.extensions_mut().insert(username);
            return next.run(request).await;
        }
    }

    if request.uri().path().starts_with("/api/") {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }

    Redirect::to("/login").into_response()
}
