//! Password hashing and the session-backed faculty guard.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::Faculty;

/// The session key holding the signed-in faculty's ID.
const FACULTY_KEY: &str = "faculty_id";

/// The faculty making the current request.
///
/// Extracting this from a request without a signed-in faculty rejects it with
/// [`AppError::Unauthenticated`], which redirects to the login page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentFaculty {
    pub id: i32,
}

impl<S> FromRequestParts<S> for CurrentFaculty
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, message)| AppError::Internal(message.to_string()))?;

        match session.get::<i32>(FACULTY_KEY).await? {
            Some(id) => Ok(Self { id }),
            None => Err(AppError::Unauthenticated),
        }
    }
}

/// Records `faculty` as signed in for the rest of the session.
pub async fn sign_in(session: &Session, faculty: &Faculty) -> AppResult<()> {
    session.cycle_id().await?;
    session.insert(FACULTY_KEY, faculty.id).await?;

    info!(faculty = faculty.id, "Faculty '{}' signed in", faculty.username);
    Ok(())
}

pub async fn sign_out(session: &Session, faculty: CurrentFaculty) -> AppResult<()> {
    session.remove::<i32>(FACULTY_KEY).await?;

    info!(faculty = faculty.id, "Faculty signed out");
    Ok(())
}

/// Hashes a password with argon2id and a random salt, producing a PHC string.
pub fn hash_password(raw_password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(raw_password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// Checks a password against a stored PHC string. A malformed hash never verifies.
pub fn verify_password(raw_password: &str, password_hash: &str) -> bool {
    PasswordHash::new(password_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(raw_password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}
