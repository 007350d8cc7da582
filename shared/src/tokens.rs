//! Signed cookie tokens.
//!
//! Both tokens are `base64url(username:expires:signature)` where the signature
//! is an HMAC-SHA256 keyed with the shared remember-me secret. The remember-me
//! signature also covers the stored password hash, so changing a password
//! invalidates every outstanding remember-me cookie.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::auth::CredentialSubject;
use crate::config::Config;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "SESSION";
pub const REMEMBER_ME_COOKIE: &str = "remember-me";

/// The decoded (but not yet verified) parts of a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenParts {
    pub username: String,
    pub expires: i64,
    signature: Vec<u8>,
}

fn mac(key: &str, message: &str) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    mac
}

fn session_message(username: &str, expires: i64) -> String {
    format!("session:{}:{}", username, expires)
}

fn remember_me_message(username: &str, expires: i64, password_hash: &str) -> String {
    format!("{}:{}:{}", username, expires, password_hash)
}

fn encode(username: &str, expires: i64, signature: &[u8]) -> String {
    let raw = format!("{}:{}:{}", username, expires, URL_SAFE_NO_PAD.encode(signature));
    URL_SAFE_NO_PAD.encode(raw.as_bytes())
}

/// Split a cookie value into its parts. Usernames may contain ':' so the
/// expiry and signature are taken from the right.
pub fn decode(token: &str) -> Option<TokenParts> {
    let raw = URL_SAFE_NO_PAD.decode(token.trim().as_bytes()).ok()?;
    let raw = String::from_utf8(raw).ok()?;

    let mut parts = raw.rsplitn(3, ':');
    let signature = URL_SAFE_NO_PAD.decode(parts.next()?).ok()?;
    let expires = parts.next()?.parse().ok()?;
    let username = parts.next()?.to_string();
    if username.is_empty() {
        return None;
    }

    Some(TokenParts {
        username,
        expires,
        signature,
    })
}

pub fn issue_session(config: &Config, username: &str, now: i64) -> String {
    let expires = now + config.session_ttl_secs;
    let signature = mac(&config.remember_me_key, &session_message(username, expires))
        .finalize()
        .into_bytes();
    encode(username, expires, &signature)
}

/// Returns the username carried by a valid, unexpired session token.
pub fn verify_session(config: &Config, token: &str, now: i64) -> Option<String> {
    let parts = decode(token)?;
    if parts.expires <= now {
        return None;
    }
    mac(&config.remember_me_key, &session_message(&parts.username, parts.expires))
        .verify_slice(&parts.signature)
        .ok()?;
    Some(parts.username)
}

pub fn issue_remember_me(config: &Config, subject: &CredentialSubject, now: i64) -> String {
    let expires = now + config.remember_me_ttl_secs;
    let message = remember_me_message(&subject.username, expires, &subject.password_hash);
    let signature = mac(&config.remember_me_key, &message).finalize().into_bytes();
    encode(&subject.username, expires, &signature)
}

/// Check a decoded remember-me token against the subject it names.
pub fn verify_remember_me(config: &Config, parts: &TokenParts, subject: &CredentialSubject, now: i64) -> bool {
    if parts.expires <= now || parts.username != subject.username {
        return false;
    }
    let message = remember_me_message(&parts.username, parts.expires, &subject.password_hash);
    mac(&config.remember_me_key, &message)
        .verify_slice(&parts.signature)
        .is_ok()
}

// ========== COOKIE HEADERS ==========

fn cookie_header(name: &str, value: &str, max_age: Option<i64>, secure: bool) -> String {
    let max_age = max_age.map(|s| format!("; Max-Age={}", s)).unwrap_or_default();
    let secure_flag = if secure { "; Secure" } else { "" };
    format!("{}={}; Path=/{}; HttpOnly{}; SameSite=Lax", name, value, max_age, secure_flag)
}

/// Browser-session cookie; the token itself carries the expiry.
pub fn session_cookie(config: &Config, token: &str) -> String {
    cookie_header(SESSION_COOKIE, token, None, config.secure_cookies)
}

pub fn remember_me_cookie(config: &Config, token: &str) -> String {
    cookie_header(
        REMEMBER_ME_COOKIE,
        token,
        Some(config.remember_me_ttl_secs),
        config.secure_cookies,
    )
}

pub fn expired_cookies(config: &Config) -> Vec<String> {
    vec![
        cookie_header(SESSION_COOKIE, "", Some(0), config.secure_cookies),
        cookie_header(REMEMBER_ME_COOKIE, "", Some(0), config.secure_cookies),
    ]
}
