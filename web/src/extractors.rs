//! Caller identity extractors.
//!
//! Authentication happens upstream. By the time a request reaches these
//! handlers the auth layer has stamped it with:
//!
//! - `X-Participant-Id`: stable account id of an authenticated caller
//!   (absent for anonymous callers)
//! - `X-Participant-Role`: `operator` for privileged callers
//!
//! # Examples
//!
//! ```ignore
//! async fn handler(caller: Caller) -> String {
//!     match caller.participant_id {
//!         Some(id) => format!("hello {id}"),
//!         None => "hello stranger".to_string(),
//!     }
//! }
//! ```

use crate::error::AppError;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use turnstile_core::ParticipantId;

/// Header carrying the authenticated participant id.
pub const PARTICIPANT_ID_HEADER: &str = "x-participant-id";

/// Header carrying the caller's role.
pub const PARTICIPANT_ROLE_HEADER: &str = "x-participant-role";

/// Caller role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    /// Ordinary participant, authenticated or not
    #[default]
    Participant,
    /// May promote, inspect and complete on behalf of others
    Operator,
}

/// Identity of whoever sent the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Authenticated participant id, `None` for anonymous callers
    pub participant_id: Option<ParticipantId>,
    /// Caller role
    pub role: Role,
}

impl Caller {
    /// Whether the caller holds the operator role.
    #[must_use]
    pub fn is_operator(&self) -> bool {
        self.role == Role::Operator
    }

    /// Whether the caller may act for `participant_id`: operators act for
    /// anyone, everybody else only for themselves.
    #[must_use]
    pub fn may_act_for(&self, participant_id: &ParticipantId) -> bool {
        self.is_operator() || self.participant_id.as_ref() == Some(participant_id)
    }

    fn from_headers(headers: &HeaderMap) -> Result<Self, AppError> {
        let participant_id = header_str(headers, PARTICIPANT_ID_HEADER)?
            .filter(|raw| !raw.trim().is_empty())
            .map(ParticipantId::new)
            .transpose()?;

        let role = match header_str(headers, PARTICIPANT_ROLE_HEADER)? {
            Some(raw) if raw.trim().eq_ignore_ascii_case("operator") => Role::Operator,
            _ => Role::Participant,
        };

        Ok(Self {
            participant_id,
            role,
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, AppError> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| AppError::bad_request(format!("{name} header is not valid text")))
        })
        .transpose()
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers)
    }
}

/// A caller holding the operator role. Rejects everyone else with 403.
#[derive(Debug, Clone)]
pub struct Operator(pub Caller);

#[async_trait]
impl<S> FromRequestParts<S> for Operator
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let caller = Caller::from_request_parts(parts, state).await?;
        if caller.is_operator() {
            Ok(Self(caller))
        } else {
            tracing::debug!(participant_id = ?caller.participant_id, "Operator role required");
            Err(AppError::forbidden("Operator role required"))
        }
    }
}
