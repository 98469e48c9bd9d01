// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for the request owner.
//!
//! Use the `Owner` extractor in handlers to require an owner identity:
//!
//! ```rust,ignore
//! async fn my_handler(Owner(owner): Owner) -> impl IntoResponse {
//!     // owner is OwnerId
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};

use super::AuthError;
use crate::models::OwnerId;
use crate::state::AppState;

/// Extractor for the verified owner of a request.
///
/// Reads the header named by `ServerConfig::owner_header`.
pub struct Owner(pub OwnerId);

impl FromRequestParts<AppState> for Owner {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let owner = owner_from_headers(&parts.headers, &state.config.owner_header)?;
        Ok(Owner(owner))
    }
}

/// Read and validate the owner id from `headers`.
pub fn owner_from_headers(headers: &HeaderMap, header_name: &str) -> Result<OwnerId, AuthError> {
    let value = headers
        .get(header_name)
        .ok_or(AuthError::MissingOwner)?
        .to_str()
        .map_err(|_| AuthError::InvalidOwner)?;

    OwnerId::new(value.trim()).map_err(|_| AuthError::InvalidOwner)
}
