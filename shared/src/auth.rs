use lambda_http::{Body, Error, Request, RequestPayloadExt, Response};
use serde::Deserialize;
use std::collections::BTreeSet;

use crate::accounts::AccountService;
use crate::error::{RegistryError, Result};
use crate::tokens;
use crate::types::Role;
use crate::views::{self, LISTING_PATH};
use crate::AppState;

pub const ROLE_PREFIX: &str = "ROLE_";
pub const ADMIN_AUTHORITY: &str = "ROLE_ADMIN";

/// Map a stored role to the authorization grant checked at request time.
pub fn authority_for(role: &Role) -> String {
    format!("{}{}", ROLE_PREFIX, role.role)
}

/// What the access layer knows about a signed-in caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSubject {
    pub username: String,
    pub password_hash: String,
    pub authorities: BTreeSet<String>,
}

impl CredentialSubject {
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }

    pub fn is_admin(&self) -> bool {
        self.has_authority(ADMIN_AUTHORITY)
    }
}

/// Hash a plain password with argon2id.
pub fn hash_password(password: &str) -> Result<String> {
    use argon2::Argon2;
    use password_hash::rand_core::OsRng;
    use password_hash::{PasswordHasher, SaltString};

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| RegistryError::Hashing(e.to_string()))
}

/// Verify a password against an argon2id hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::Argon2;
    use password_hash::{PasswordHash, PasswordVerifier};

    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

pub async fn load_credential_subject(accounts: &AccountService, username: &str) -> Result<CredentialSubject> {
    let account = accounts
        .load_user_by_username(username)
        .await?
        .ok_or_else(|| RegistryError::UserNotFound(username.to_string()))?;

    Ok(CredentialSubject {
        username: account.username,
        password_hash: account.password,
        authorities: account.roles.iter().map(authority_for).collect(),
    })
}

/// Check a username/password pair. Unknown users and wrong passwords are
/// indistinguishable to the caller.
pub async fn authenticate(accounts: &AccountService, username: &str, password: &str) -> Result<CredentialSubject> {
    let subject = match load_credential_subject(accounts, username).await {
        Ok(subject) => subject,
        Err(RegistryError::UserNotFound(_)) => return Err(RegistryError::BadCredentials),
        Err(e) => return Err(e),
    };

    if !verify_password(password, &subject.password_hash) {
        return Err(RegistryError::BadCredentials);
    }
    Ok(subject)
}

// ========== HANDLERS ==========

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(rename = "remember-me")]
    pub remember_me: Option<String>,
}

/// GET /login
pub fn login_page(state: &AppState, error: bool, logged_out: bool) -> std::result::Result<Response<Body>, Error> {
    let mut context = views::base_context(None);
    context.insert("error", &error);
    context.insert("logout", &logged_out);
    state.views.page("login.html", &context)
}

/// POST /login
pub async fn login(state: &AppState, event: &Request) -> std::result::Result<Response<Body>, Error> {
    let form: LoginRequest = match event.payload::<LoginRequest>() {
        Ok(Some(form)) => form,
        Ok(None) => LoginRequest::default(),
        Err(e) => {
            tracing::warn!("Failed to parse login form: {}", e);
            LoginRequest::default()
        }
    };

    let username = form.username.unwrap_or_default();
    let password = form.password.unwrap_or_default();
    tracing::info!("Login attempt for user: {}", username);

    let subject = match authenticate(&state.accounts, &username, &password).await {
        Ok(subject) => subject,
        Err(RegistryError::BadCredentials) => {
            tracing::warn!("Authentication failed for user: {}", username);
            return views::redirect(&format!("{}?error", views::LOGIN_PATH));
        }
        Err(e) => return Err(e.into()),
    };

    let now = chrono::Utc::now().timestamp();
    let mut cookies = vec![tokens::session_cookie(
        &state.config,
        &tokens::issue_session(&state.config, &subject.username, now),
    )];
    if form.remember_me.is_some() {
        cookies.push(tokens::remember_me_cookie(
            &state.config,
            &tokens::issue_remember_me(&state.config, &subject, now),
        ));
    }

    tracing::info!("Authentication successful for user: {}", subject.username);
    views::redirect_with_cookies(LISTING_PATH, cookies)
}

/// GET|POST /logout
pub fn logout(state: &AppState) -> std::result::Result<Response<Body>, Error> {
    views::redirect_with_cookies(
        &format!("{}?logout", views::LOGIN_PATH),
        tokens::expired_cookies(&state.config),
    )
}
