//! Principal extraction.
//!
//! Sessions are terminated upstream; the session layer forwards the caller as
//! `x-user-id`, `x-user-role` and (for vendors) `x-vendor-id`.

use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use kudimall_auth::{Principal, Role};
use kudimall_core::{UserId, VendorId};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const VENDOR_ID_HEADER: &str = "x-vendor-id";

pub async fn principal_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let principal = extract_principal(req.headers())?;
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

fn extract_principal(headers: &HeaderMap) -> Result<Principal, StatusCode> {
    let user_id: UserId = header(headers, USER_ID_HEADER)?
        .parse()
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let role: Role = header(headers, USER_ROLE_HEADER)?
        .parse()
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let vendor_id = match headers.get(VENDOR_ID_HEADER) {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| StatusCode::UNAUTHORIZED)?
                .trim()
                .parse::<VendorId>()
                .map_err(|_| StatusCode::UNAUTHORIZED)?,
        ),
        None => None,
    };

    match (role, vendor_id) {
        (Role::Vendor, Some(vendor_id)) => Ok(Principal::vendor(user_id, vendor_id)),
        (Role::Vendor, None) => Err(StatusCode::UNAUTHORIZED),
        (Role::Customer, _) => Ok(Principal::customer(user_id)),
        (Role::Admin, _) => Ok(Principal::admin(user_id)),
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, StatusCode> {
    let value = headers
        .get(name)
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_str()
        .map_err(|_| StatusCode::UNAUTHORIZED)?
        .trim();
    if value.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(value)
}
