use crate::error::AppResult;

/// Hash a password for storage. bcrypt embeds the salt in its output.
pub fn hash(password: &str) -> AppResult<String> {
    Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
}

/// Verify a password against a stored hash. An unparseable hash counts
/// as a failed login, not an error surfaced to the caller.
pub fn verify(password: &str, stored_hash: &str) -> bool {
    bcrypt::verify(password, stored_hash).unwrap_or(false)
}
