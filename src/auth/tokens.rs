use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::Config;
use crate::models::user::User;

type HmacSha256 = Hmac<Sha256>;

/// What a one-time token is allowed to do. A token minted for one purpose
/// never verifies for the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    Activation,
    PasswordReset,
}

impl TokenPurpose {
    fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::Activation => "activation",
            TokenPurpose::PasswordReset => "password-reset",
        }
    }

    fn ttl_secs(&self, config: &Config) -> i64 {
        match self {
            TokenPurpose::Activation => config.activation_token_ttl_secs,
            TokenPurpose::PasswordReset => config.reset_token_ttl_secs,
        }
    }
}

/// Internal verification outcome. The HTTP boundary collapses all three
/// into one opaque invalid-or-expired error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Malformed,
    Expired,
    Mismatch,
}

/// Mint a one-time token bound to the user's current credential state.
///
/// Format: `{issued_at_hex}-{hmac_hex}`. The MAC covers the user id, the
/// purpose, the password hash, the active flag and the timestamp, so
/// changing the password or flipping `is_active` invalidates every token
/// issued before the change. Nothing is stored.
pub fn make_token(user: &User, purpose: TokenPurpose, config: &Config) -> String {
    let stamp = Utc::now().timestamp();
    token_at(user, purpose, stamp, config)
}

/// Verify `token` for `user` and `purpose` against the user's current state.
pub fn check_token(
    user: &User,
    purpose: TokenPurpose,
    token: &str,
    config: &Config,
) -> Result<(), TokenError> {
    let (stamp_hex, mac_hex) = token.split_once('-').ok_or(TokenError::Malformed)?;
    let stamp = i64::from_str_radix(stamp_hex, 16).map_err(|_| TokenError::Malformed)?;
    let given = hex::decode(mac_hex).map_err(|_| TokenError::Malformed)?;

    // Signature first: a tampered timestamp is a mismatch, not an expiry.
    let mac = state_mac(user, purpose, stamp, config);
    if mac.verify_slice(&given).is_err() {
        return Err(TokenError::Mismatch);
    }

    if Utc::now().timestamp() - stamp > purpose.ttl_secs(config) {
        return Err(TokenError::Expired);
    }

    Ok(())
}

fn token_at(user: &User, purpose: TokenPurpose, stamp: i64, config: &Config) -> String {
    let mac = state_mac(user, purpose, stamp, config);
    format!("{:x}-{}", stamp, hex::encode(mac.finalize().into_bytes()))
}

/// HMAC over the state fingerprint `{id, purpose, password_hash, is_active, stamp}`.
fn state_mac(user: &User, purpose: TokenPurpose, stamp: i64, config: &Config) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(config.secret_key.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(user.id.as_bytes());
    mac.update(b"\n");
    mac.update(purpose.as_str().as_bytes());
    mac.update(b"\n");
    mac.update(user.password_hash.as_bytes());
    mac.update(b"\n");
    mac.update(if user.is_active { b"1" } else { b"0" });
    mac.update(b"\n");
    mac.update(stamp.to_string().as_bytes());
    mac
}
