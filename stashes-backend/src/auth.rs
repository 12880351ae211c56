//! Caller identity.
//!
//! Authentication happens in front of this service; the proxy forwards the
//! authenticated user's id in the [`USER_HEADER`] header.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use stashes_shared::USER_HEADER;
use tracing::debug;
use uuid::Uuid;

use crate::stash::WebError;

/// The user making the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrentUser(pub Uuid);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_HEADER)
            .ok_or_else(|| WebError::unauthorized(format!("missing {USER_HEADER} header")))?;

        let value = value.to_str().map_err(|err| {
            debug!(error = ?err, "Non-ascii user header");
            WebError::unauthorized(format!("invalid {USER_HEADER} header"))
        })?;

        Uuid::parse_str(value.trim()).map(CurrentUser).map_err(|err| {
            debug!(error = ?err, "Unparseable user header");
            WebError::unauthorized(format!("invalid {USER_HEADER} header"))
        })
    }
}
