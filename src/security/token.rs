//! Bearer token issuance and verification.
//!
//! Tokens are opaque to clients: a signed payload of user id, expiry, and a
//! random nonce, MACed with HMAC-SHA256 under the configured secret. There is
//! no server-side session table; expiry is carried in the token itself.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Token verification errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

/// Issue a bearer token for `user_id` valid for `ttl_minutes` from now.
pub fn issue(secret: &str, user_id: &str, ttl_minutes: i64) -> String {
    let expires_at = chrono::Utc::now().timestamp() + ttl_minutes * 60;
    let nonce = rand::thread_rng().next_u64();
    let payload = format!("{user_id}|{expires_at}|{nonce:016x}");

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(payload.as_bytes());
    let sig = mac.finalize().into_bytes();

    format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(payload.as_bytes()),
        URL_SAFE_NO_PAD.encode(sig)
    )
}

/// Verify a bearer token and return the user id it was issued for.
pub fn verify(secret: &str, token: &str) -> Result<String, TokenError> {
    let (payload_b64, sig_b64) = token.split_once('.').ok_or(TokenError::Malformed)?;

    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| TokenError::Malformed)?;
    let sig = URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|_| TokenError::Malformed)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(&payload);
    mac.verify_slice(&sig).map_err(|_| TokenError::BadSignature)?;

    let payload = String::from_utf8(payload).map_err(|_| TokenError::Malformed)?;
    let mut parts = payload.split('|');
    let user_id = parts.next().ok_or(TokenError::Malformed)?;
    let expires_at: i64 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or(TokenError::Malformed)?;

    if chrono::Utc::now().timestamp() >= expires_at {
        return Err(TokenError::Expired);
    }

    Ok(user_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-0123456789abcdef";

    #[test]
    fn issue_and_verify() {
        let token = issue(SECRET, "user-1", 30);
        assert_eq!(verify(SECRET, &token).unwrap(), "user-1");
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = issue(SECRET, "user-1", 30);
        assert_eq!(
            verify("another-secret-0123456789", &token),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn expired_token_rejected() {
        let token = issue(SECRET, "user-1", -1);
        assert_eq!(verify(SECRET, &token), Err(TokenError::Expired));
    }

    #[test]
    fn tampered_payload_rejected() {
        let token = issue(SECRET, "user-1", 30);
        let (payload_b64, sig_b64) = token.split_once('.').unwrap();
        let forged_payload = URL_SAFE_NO_PAD.encode("user-2|9999999999|0000000000000000");
        let forged = format!("{forged_payload}.{sig_b64}");
        assert_eq!(verify(SECRET, &forged), Err(TokenError::BadSignature));

        let garbage = format!("{payload_b64}.!!!");
        assert_eq!(verify(SECRET, &garbage), Err(TokenError::Malformed));
    }
}
