//! Session tokens
//!
//! Tokens are HMAC-signed and minted by the identity provider, which shares
//! the session secret. No server-side session storage needed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Signed session payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Identity provider user ID
    pub uid: String,
    pub email: Option<String>,
    /// `admin` custom claim
    #[serde(default)]
    pub admin: bool,
    /// When session was created
    pub created_at: DateTime<Utc>,
    /// When session expires
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// New session valid for `max_age_secs`
    pub fn new(uid: impl Into<String>, email: Option<String>, admin: bool, max_age_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            uid: uid.into(),
            email,
            admin,
            created_at: now,
            expires_at: now + Duration::seconds(max_age_secs),
        }
    }

    /// Check if session is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Create a signed session token
///
/// Token format: base64(payload).base64(hmac_sha256(payload))
///
/// # Arguments
/// * `session` - Session data to encode
/// * `secret` - HMAC secret key
///
/// # Returns
/// Signed token string
pub fn create_session_token(
    session: &Session,
    secret: &str,
) -> Result<String, crate::error::AppError> {
    use base64::{Engine as _, engine::general_purpose};

    let payload =
        serde_json::to_string(session).map_err(|e| crate::error::AppError::Internal(e.into()))?;
    let payload_b64 = general_purpose::URL_SAFE_NO_PAD.encode(payload.as_bytes());
    let signature = sign(&payload_b64, secret)?;
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);

    Ok(format!("{}.{}", payload_b64, signature_b64))
}

fn sign(payload_b64: &str, secret: &str) -> Result<Vec<u8>, crate::error::AppError> {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| crate::error::AppError::Encryption(e.to_string()))?;
    mac.update(payload_b64.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Verify and decode a session token
///
/// # Errors
/// Returns error if signature is invalid, token is malformed or expired
pub fn verify_session_token(token: &str, secret: &str) -> Result<Session, crate::error::AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let (payload_b64, signature_b64) = token
        .split_once('.')
        .ok_or(crate::error::AppError::Unauthorized)?;

    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| crate::error::AppError::Encryption(e.to_string()))?;
    mac.update(payload_b64.as_bytes());

    let expected_signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| crate::error::AppError::Unauthorized)?;

    mac.verify_slice(&expected_signature)
        .map_err(|_| crate::error::AppError::InvalidSignature)?;

    let payload_bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| crate::error::AppError::Unauthorized)?;

    let session: Session =
        serde_json::from_slice(&payload_bytes).map_err(|_| crate::error::AppError::Unauthorized)?;

    if session.is_expired() {
        return Err(crate::error::AppError::Unauthorized);
    }

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    const SECRET: &str = "test-secret-that-is-at-least-32-bytes";

    #[test]
    fn token_roundtrip_keeps_claims() {
        let session = Session::new("admin-1", Some("a@example.com".to_string()), true, 60);
        let token = create_session_token(&session, SECRET).unwrap();

        let verified = verify_session_token(&token, SECRET).unwrap();
        assert_eq!(verified.uid, "admin-1");
        assert!(verified.admin);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let session = Session::new("admin-1", None, false, 60);
        let token = create_session_token(&session, SECRET).unwrap();

        let result = verify_session_token(&token, "another-secret-that-is-32-bytes-long");
        assert!(matches!(result, Err(AppError::InvalidSignature)));
    }

    #[test]
    fn expired_session_is_rejected() {
        let session = Session::new("admin-1", None, false, -1);
        let token = create_session_token(&session, SECRET).unwrap();

        assert!(matches!(
            verify_session_token(&token, SECRET),
            Err(AppError::Unauthorized)
        ));
    }
}
