use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, StatusCode, request::Parts},
};
use settlement::domain::value_objects::request_context::{AuthenticatedUser, RequestContext};
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// Request context built from the identity headers set by the upstream
/// authentication proxy. Requests without `x-user-id` are anonymous.
#[derive(Debug, Clone)]
pub struct Caller(pub RequestContext);

pub fn context_from_headers(headers: &HeaderMap) -> Result<RequestContext, (StatusCode, String)> {
    let user_id = match header_value(headers, USER_ID_HEADER)? {
        Some(raw) => Some(Uuid::parse_str(raw).map_err(|_| {
            (
                StatusCode::BAD_REQUEST,
                format!("Invalid {USER_ID_HEADER} header"),
            )
        })?),
        None => None,
    };

    let email = header_value(headers, USER_EMAIL_HEADER)?.map(str::to_string);
    let locale = header_value(headers, axum::http::header::ACCEPT_LANGUAGE.as_str())?
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    Ok(RequestContext {
        user: user_id.map(|id| AuthenticatedUser { id, email }),
        locale,
    })
}

fn header_value<'a>(
    headers: &'a HeaderMap,
    name: &str,
) -> Result<Option<&'a str>, (StatusCode, String)> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| (StatusCode::BAD_REQUEST, format!("Invalid {name} header")))?
        .trim();

    Ok((!value.is_empty()).then_some(value))
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        context_from_headers(&parts.headers).map(Caller)
    }
}
