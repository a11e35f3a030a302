//! Authentication middleware
//!
//! Extracts and validates JWT tokens from requests.

use crate::auth::{decode_token, TokenType, Viewer};
use crate::error::AppError;
use crate::state::SharedState;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

/// Admin routes: a valid access token of a staff user is required
pub async fn require_staff(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();
    let viewer = Viewer::from_request_parts(&mut parts, &state).await?;
    request = Request::from_parts(parts, body);

    let claims = viewer
        .0
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;
    if !claims.is_staff {
        return Err(AppError::Forbidden("Staff access required".to_string()));
    }

    // Insert claims into request extensions for handlers to use
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

impl FromRequestParts<SharedState> for Viewer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        match TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state).await {
            Ok(TypedHeader(Authorization(bearer))) => {
                let claims = decode_token(bearer.token(), &state.jwt_secret)?;
                if claims.token_type != TokenType::Access {
                    return Err(AppError::Unauthorized(
                        "Refresh tokens cannot be used for requests".to_string(),
                    ));
                }
                Ok(Viewer(Some(claims)))
            }
            Err(rejection) if rejection.is_missing() => Ok(Viewer::anonymous()),
            Err(_) => Err(AppError::Unauthorized(
                "Invalid authorization format".to_string(),
            )),
        }
    }
}
