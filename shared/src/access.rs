//! Per-request access control.
//!
//! Every request is classified by path, the caller is resolved from the
//! session cookie (or, failing that, the remember-me cookie), and the pair is
//! reduced to a [`Decision`].

use lambda_http::http::HeaderMap;

use crate::auth::{self, CredentialSubject};
use crate::error::{RegistryError, Result};
use crate::tokens::{self, REMEMBER_ME_COOKIE, SESSION_COOKIE};
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Admin,
}

const PUBLIC_ROUTES: &[&str] = &["login", "logout", "notAuthorized", "favicon.ico"];
const PUBLIC_PREFIXES: &[&str] = &["webjars", "static"];
const ADMIN_ROUTES: &[&str] = &["patientForm", "save", "delete"];
const ADMIN_PREFIXES: &[&str] = &["admin", "edit"];

/// Non-empty path segments. The router matches on exactly this list, so
/// `/delete/` and `//delete` classify the same as `/delete`.
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Route classification. Anything not listed needs a signed-in caller.
pub fn required_access(segments: &[&str]) -> Access {
    match segments {
        [route] if PUBLIC_ROUTES.contains(route) => Access::Public,
        [prefix, _, ..] if PUBLIC_PREFIXES.contains(prefix) => Access::Public,
        [route] if ADMIN_ROUTES.contains(route) => Access::Admin,
        [prefix, ..] if ADMIN_PREFIXES.contains(prefix) => Access::Admin,
        _ => Access::Authenticated,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    RedirectToLogin,
    AccessDenied,
}

pub fn authorize(access: Access, subject: Option<&CredentialSubject>) -> Decision {
    match (access, subject) {
        (Access::Public, _) => Decision::Proceed,
        (_, None) => Decision::RedirectToLogin,
        (Access::Authenticated, Some(_)) => Decision::Proceed,
        (Access::Admin, Some(s)) if s.is_admin() => Decision::Proceed,
        (Access::Admin, Some(_)) => Decision::AccessDenied,
    }
}

/// The signed-in caller. `renewed_session` is set when the session was
/// re-established from a remember-me cookie and must be sent back.
#[derive(Debug, Clone)]
pub struct Principal {
    pub subject: CredentialSubject,
    pub renewed_session: Option<String>,
}

/// Find a cookie value across every `Cookie` header.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all("Cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value)
}

pub async fn resolve_principal(state: &AppState, headers: &HeaderMap, now: i64) -> Result<Option<Principal>> {
    if let Some(username) = cookie_value(headers, SESSION_COOKIE)
        .and_then(|token| tokens::verify_session(&state.config, token, now))
    {
        if let Some(subject) = current_subject(state, &username).await? {
            return Ok(Some(Principal {
                subject,
                renewed_session: None,
            }));
        }
    }

    let Some(parts) = cookie_value(headers, REMEMBER_ME_COOKIE).and_then(tokens::decode) else {
        return Ok(None);
    };
    let Some(subject) = current_subject(state, &parts.username).await? else {
        return Ok(None);
    };
    if !tokens::verify_remember_me(&state.config, &parts, &subject, now) {
        tracing::warn!("Rejected remember-me token for user: {}", parts.username);
        return Ok(None);
    }

    tracing::info!("Session restored from remember-me for user: {}", subject.username);
    let session = tokens::issue_session(&state.config, &subject.username, now);
    Ok(Some(Principal {
        subject,
        renewed_session: Some(tokens::session_cookie(&state.config, &session)),
    }))
}

/// Re-reads the account so role changes take effect on the next request.
async fn current_subject(state: &AppState, username: &str) -> Result<Option<CredentialSubject>> {
    match auth::load_credential_subject(&state.accounts, username).await {
        Ok(subject) => Ok(Some(subject)),
        Err(RegistryError::UserNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
