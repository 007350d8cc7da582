use thiserror::Error;

/// Errors raised by the registry services and stores.
///
/// Authorization failures are not represented here: the access layer turns
/// them into redirects before any service is called.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("invalid patient: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("User {0} already exists")]
    DuplicateUsername(String),

    #[error("Email {0} already exists")]
    DuplicateEmail(String),

    #[error("Role {0} already exists")]
    DuplicateRole(String),

    #[error("Password and confirmation do not match")]
    PasswordMismatch,

    #[error("{0} cannot be empty")]
    InvalidInput(&'static str),

    #[error("User {0} not found")]
    UserNotFound(String),

    #[error("Role {0} not found")]
    RoleNotFound(String),

    #[error("Bad credentials")]
    BadCredentials,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("template error: {0}")]
    Template(#[from] tera::Error),
}

impl RegistryError {
    /// True for the uniqueness violations (username, email, role).
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            RegistryError::DuplicateUsername(_)
                | RegistryError::DuplicateEmail(_)
                | RegistryError::DuplicateRole(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RegistryError::NotFound(_) | RegistryError::UserNotFound(_) | RegistryError::RoleNotFound(_)
        )
    }
}

/// Wrap any AWS SDK failure (or other debuggable error) as a storage error.
pub(crate) fn storage<E: std::fmt::Debug>(e: E) -> RegistryError {
    RegistryError::Storage(format!("{:?}", e))
}

pub type Result<T> = std::result::Result<T, RegistryError>;
