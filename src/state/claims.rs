//! Unverified JWT claim extraction.
//!
//! The signature is never checked: the token came from same-origin storage
//! and is only read for its expiry and subject. Every authorization decision
//! is re-made by the backend on each request.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Deserializer};

#[derive(Debug, thiserror::Error)]
pub enum ClaimsError {
    #[error("token is not a decodable JWT: {0}")]
    Malformed(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    /// Expiry in Unix seconds.
    #[serde(default, deserialize_with = "deserialize_opt_secs")]
    pub exp: Option<i64>,
}

impl Claims {
    /// Expired when `exp` lies strictly before `now_secs`. A token without
    /// `exp` never expires locally.
    #[must_use]
    pub fn is_expired_at(&self, now_secs: i64) -> bool {
        self.exp.is_some_and(|exp| exp < now_secs)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_secs())
    }
}

/// Decode the claims of `token` without checking its signature or any
/// registered claim. Expiry is left to [`Claims::is_expired_at`].
///
/// # Errors
///
/// Returns an error when the token is not three segments, the header is not
/// a JWT header, or the payload is not base64url-encoded JSON claims.
pub fn decode_unverified(token: &str) -> Result<Claims, ClaimsError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    let data = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims)
}

#[must_use]
pub fn now_secs() -> i64 {
    let Ok(duration) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

#[allow(clippy::cast_possible_truncation)]
fn deserialize_opt_secs<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(number)) => {
            if let Some(int) = number.as_i64() {
                return Ok(Some(int));
            }
            match number.as_f64() {
                Some(float) if float.is_finite() => Ok(Some(float.floor() as i64)),
                _ => Err(D::Error::custom("exp out of range")),
            }
        }
        Some(_) => Err(D::Error::custom("exp must be a number")),
    }
}

#[cfg(test)]
#[path = "claims_test.rs"]
mod claims_test;
