//! Custom Axum extractors.
//!
//! Identity arrives from the upstream identity collaborator as trusted
//! headers set by the gateway:
//!
//! - `x-requester-id`: verified requester UUID
//! - `x-requester-email`: verified email (optional)
//! - `x-requester-roles`: comma-separated role names (optional)
//!
//! The extractor never rejects a request. A missing or malformed identity
//! yields `Identity(None)`, and operations that need a caller surface
//! `Unauthenticated` through the ledger's own validator, keeping the error
//! taxonomy in one place.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use slotbook_ledger::{Caller, CapabilitySet, RequesterId, Role};
use uuid::Uuid;

/// The caller identity resolved from trusted gateway headers, if any.
#[derive(Debug, Clone)]
pub struct Identity(pub Option<Caller>);

impl Identity {
    /// Borrow the caller, if one was resolved.
    #[must_use]
    pub const fn caller(&self) -> Option<&Caller> {
        self.0.as_ref()
    }
}

fn caller_from_headers(headers: &HeaderMap) -> Option<Caller> {
    let requester_id = headers
        .get("x-requester-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .map(RequesterId::from_uuid)?;

    let email = headers
        .get("x-requester-email")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let roles: Vec<Role> = headers
        .get("x-requester-roles")
        .and_then(|v| v.to_str().ok())
        .map(|s| {
            s.split(',')
                .filter(|part| !part.trim().is_empty())
                .map(Role::parse)
                .collect()
        })
        .unwrap_or_default();

    Some(Caller {
        requester_id,
        email,
        capabilities: CapabilitySet::resolve(&roles),
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(caller_from_headers(&parts.headers)))
    }
}
