use crate::api::ApiError;
use axum::extract::FromRequestParts;
use http::request::Parts;
use orders::model::ModelId;
use orders::validation::parse_id;

/// Header carrying the customer id verified by the upstream session layer.
pub const CUSTOMER_ID_HEADER: &str = "x-customer-id";

/// The caller's customer id. Requests without a valid id are rejected with 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedCustomer(pub ModelId);

impl<S> FromRequestParts<S> for AuthenticatedCustomer
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(CUSTOMER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        parse_id("customer id", raw)
            .map(AuthenticatedCustomer)
            .map_err(|_| ApiError::Unauthorized)
    }
}
