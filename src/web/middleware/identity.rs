//! # Identity Middleware
//!
//! Materializes the opaque current-user capability supplied by the upstream
//! auth layer (`x-user-id` / `x-department-id` headers) into a
//! [`UserIdentity`] request extension. The authentication protocol itself is
//! out of scope; requests without an identity are refused.

use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use crate::resolver::UserIdentity;
use crate::web::response_types::ApiError;

pub async fn identify(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let user_id = header_i64(request.headers(), "x-user-id")?;
    let department_id = header_i64(request.headers(), "x-department-id")?;

    let identity = UserIdentity {
        user_id,
        department_id,
    };
    debug!(user_id, department_id, "identified request");
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

fn header_i64(headers: &HeaderMap, name: &str) -> Result<i64, ApiError> {
    headers
        .get(name)
        .ok_or(ApiError::Unauthorized)?
        .to_str()
        .map_err(|_| ApiError::Unauthorized)?
        .parse()
        .map_err(|_| ApiError::Unauthorized)
}
