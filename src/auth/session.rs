//! Session management
//!
//! Uses HMAC-signed tokens stored in cookies.
//! No server-side session storage needed: the login nonce and the signed-in
//! identity both travel in the cookie, so any instance can serve any request.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::keys::SigningKeySet;
use crate::error::AppError;
use crate::metrics::SESSION_DECODE_TOTAL;

/// Verified identity returned by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProfile {
    /// Provider-scoped stable identifier (Google `sub`)
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Where a browser is in the login cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Anonymous,
    /// Redirected to the provider; waiting for the callback carrying `nonce`
    LoginPending { nonce: String },
    Authenticated { identity: IdentityProfile },
}

/// Authenticated state attached to one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub state: SessionState,
    pub issued_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self {
            state: SessionState::Anonymous,
            issued_at: Utc::now(),
        }
    }

    pub fn login_pending(nonce: String) -> Self {
        Self {
            state: SessionState::LoginPending { nonce },
            issued_at: Utc::now(),
        }
    }

    pub fn authenticated(identity: IdentityProfile) -> Self {
        Self {
            state: SessionState::Authenticated { identity },
            issued_at: Utc::now(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated { .. })
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self.state, SessionState::Anonymous)
    }

    pub fn identity(&self) -> Option<&IdentityProfile> {
        match &self.state {
            SessionState::Authenticated { identity } => Some(identity),
            _ => None,
        }
    }

    pub fn pending_nonce(&self) -> Option<&str> {
        match &self.state {
            SessionState::LoginPending { nonce } => Some(nonce),
            _ => None,
        }
    }
}

/// Signed cookie value plus its absolute expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub value: String,
    /// Same instant as the signed `expires_at`; the `Max-Age` attribute is
    /// derived from it
    pub expires_at: DateTime<Utc>,
}

/// Why a cookie was discarded
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CookieDecodeError {
    #[error("cookie is not a signed token")]
    Malformed,
    #[error("cookie signature does not match any key")]
    BadSignature,
    #[error("cookie payload is not a session")]
    Payload,
    #[error("cookie has expired")]
    Expired,
}

impl CookieDecodeError {
    fn label(&self) -> &'static str {
        match self {
            CookieDecodeError::Malformed => "malformed",
            CookieDecodeError::BadSignature => "bad_signature",
            CookieDecodeError::Payload => "payload",
            CookieDecodeError::Expired => "expired",
        }
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    session: &'a SessionContext,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct Envelope {
    session: SessionContext,
    expires_at: DateTime<Utc>,
}

/// Turns a `SessionContext` into a cookie value and back
///
/// Token format: base64(payload).base64(hmac_sha256(payload))
#[derive(Debug, Clone)]
pub struct SessionCodec {
    keys: Arc<SigningKeySet>,
    max_age: Duration,
}

impl SessionCodec {
    pub fn new(keys: Arc<SigningKeySet>, max_age: Duration) -> Self {
        Self { keys, max_age }
    }

    /// Create a signed session cookie expiring `max_age` from now
    pub fn encode(&self, context: &SessionContext) -> Result<SessionCookie, AppError> {
        self.encode_at(context, Utc::now())
    }

    pub fn encode_at(
        &self,
        context: &SessionContext,
        now: DateTime<Utc>,
    ) -> Result<SessionCookie, AppError> {
        let expires_at = now + self.max_age;
        let payload = serde_json::to_vec(&EnvelopeRef {
            session: context,
            expires_at,
        })
        .map_err(|e| AppError::Internal(e.into()))?;

        let payload_b64 = URL_SAFE_NO_PAD.encode(payload);
        let signature = self.keys.sign(payload_b64.as_bytes())?;
        let signature_b64 = URL_SAFE_NO_PAD.encode(signature);

        Ok(SessionCookie {
            value: format!("{}.{}", payload_b64, signature_b64),
            expires_at,
        })
    }

    /// Decode a raw cookie value
    ///
    /// Anything that does not verify yields an anonymous context; this never
    /// fails and never grants access to an unverified cookie.
    pub fn decode(&self, raw: Option<&str>) -> SessionContext {
        self.decode_at(raw, Utc::now())
    }

    pub fn decode_at(&self, raw: Option<&str>, now: DateTime<Utc>) -> SessionContext {
        let Some(raw) = raw else {
            SESSION_DECODE_TOTAL.with_label_values(&["absent"]).inc();
            return SessionContext::anonymous();
        };

        match self.try_decode_at(raw, now) {
            Ok(context) => {
                SESSION_DECODE_TOTAL.with_label_values(&["valid"]).inc();
                context
            }
            Err(error) => {
                tracing::debug!(%error, "Discarding session cookie");
                SESSION_DECODE_TOTAL
                    .with_label_values(&[error.label()])
                    .inc();
                SessionContext::anonymous()
            }
        }
    }

    /// Verify and decode a cookie value, reporting why it was rejected
    pub fn try_decode_at(
        &self,
        raw: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionContext, CookieDecodeError> {
        // 1. Split token into payload and signature
        let (payload_b64, signature_b64) =
            raw.split_once('.').ok_or(CookieDecodeError::Malformed)?;

        // 2. Verify HMAC signature against every key
        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| CookieDecodeError::Malformed)?;
        let key_index = self
            .keys
            .verify(payload_b64.as_bytes(), &signature)
            .ok_or(CookieDecodeError::BadSignature)?;
        if key_index > 0 {
            tracing::debug!(key_index, "Session cookie verified with a rotated key");
        }

        // 3. Decode and deserialize payload
        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| CookieDecodeError::Malformed)?;
        let envelope: Envelope =
            serde_json::from_slice(&payload).map_err(|_| CookieDecodeError::Payload)?;

        // 4. Check expiry
        if envelope.expires_at <= now {
            return Err(CookieDecodeError::Expired);
        }

        Ok(envelope.session)
    }
}
