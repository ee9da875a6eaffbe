//! Caller identity resolution.
//!
//! Both transports funnel into the same model: a request either carries no
//! credential, a raw bearer token (HTTP, verified per operation), or an
//! identity already verified at WebSocket connection establishment. Every
//! operation resolves through [`RequestAuth::resolve`], so the
//! authentication rules cannot drift between transports.

use serde_json::Value;

use crate::auth::token::TokenManager;
use crate::error::{ApiError, Result};

/// A resolved caller: the authenticated user's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity(pub i64);

/// Credential state attached to one request or connection.
#[derive(Debug, Clone)]
pub enum RequestAuth {
    /// No credential presented.
    Anonymous,
    /// Raw bearer token from the `Authorization` header; verified when an
    /// operation asks for the identity.
    Bearer(String),
    /// Identity verified once at WebSocket connection init and held for
    /// the connection's lifetime.
    Connection(Identity),
}

impl RequestAuth {
    /// Build from an HTTP `Authorization` header value. A missing header is
    /// anonymous; anything present is treated as a bearer token (the scheme
    /// prefix is stripped if it is there) and judged at verification time.
    pub fn from_authorization_header(value: Option<&str>) -> Self {
        match value {
            None => RequestAuth::Anonymous,
            Some(raw) => {
                let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
                RequestAuth::Bearer(token.to_string())
            }
        }
    }

    /// Build from the `graphql-transport-ws` `connection_init` payload.
    /// The token travels as `accessToken`; an invalid one fails here, which
    /// refuses the whole connection.
    pub fn from_connection_params(payload: &Value, tokens: &TokenManager) -> Result<Self> {
        match payload.get("accessToken").and_then(|v| v.as_str()) {
            Some(token) => Ok(RequestAuth::Connection(tokens.verify(token)?)),
            None => Ok(RequestAuth::Anonymous),
        }
    }

    /// Resolve the caller's identity.
    ///
    /// With no credential: `None` if the operation tolerates anonymity,
    /// `AuthenticationRequired` if not. With a credential: verification
    /// failure is `InvalidCredential` even for operations that do not
    /// require auth — presenting a bad token is never the same as
    /// presenting none.
    pub fn resolve(&self, tokens: &TokenManager, require: bool) -> Result<Option<Identity>> {
        match self {
            RequestAuth::Anonymous => {
                if require {
                    Err(ApiError::AuthenticationRequired)
                } else {
                    Ok(None)
                }
            }
            RequestAuth::Bearer(token) => tokens.verify(token).map(Some),
            RequestAuth::Connection(identity) => Ok(Some(*identity)),
        }
    }
}
