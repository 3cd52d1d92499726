use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Redirect, Response};

use crate::error::AppError;
use crate::state::AppState;

/// Represents the currently authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
}

/// Extractor that requires authentication.
/// Returns 401 if no valid session found.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_session_token(parts, &state.config.auth.cookie_name)
            .ok_or(AppError::Unauthorized)?;

        match state.sessions.resolve(token)? {
            Some(user) => Ok(CurrentUser {
                id: user.id,
                email: user.email,
            }),
            None => Err(AppError::Unauthorized),
        }
    }
}

/// Optional user extractor: `None` instead of 401 when not authenticated.
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(AppError::Unauthorized) => Ok(MaybeUser(None)),
            Err(e) => Err(e),
        }
    }
}

/// Page guard: like [`CurrentUser`] but unauthenticated visitors are sent to `/login`.
pub struct RequireUser(pub CurrentUser);

pub enum GuardRejection {
    Login,
    Error(AppError),
}

impl IntoResponse for GuardRejection {
    fn into_response(self) -> Response {
        match self {
            GuardRejection::Login => Redirect::to("/login").into_response(),
            GuardRejection::Error(e) => e.into_response(),
        }
    }
}

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = GuardRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(RequireUser(user)),
            Err(AppError::Unauthorized) => Err(GuardRejection::Login),
            Err(e) => Err(GuardRejection::Error(e)),
        }
    }
}

/// Session token from `Authorization: Bearer`, else from the session cookie.
pub fn extract_session_token<'a>(parts: &'a Parts, cookie_name: &str) -> Option<&'a str> {
    let bearer = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    bearer.or_else(|| cookie_value(parts, cookie_name))
}

pub fn cookie_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name && !val.is_empty() {
                Some(val)
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut req = Request::builder().uri("/");
        for (k, v) in headers {
            req = req.header(*k, *v);
        }
        req.body(()).unwrap().into_parts().0
    }

    #[test]
    fn finds_cookie_among_others() {
        let p = parts(&[("cookie", "theme=dark; plaza_session=abc123; x=y")]);
        assert_eq!(cookie_value(&p, "plaza_session"), Some("abc123"));
        assert_eq!(cookie_value(&p, "missing"), None);
    }

    #[test]
    fn empty_cookie_value_is_absent() {
        let p = parts(&[("cookie", "plaza_session=")]);
        assert_eq!(extract_session_token(&p, "plaza_session"), None);
    }

    #[test]
    fn bearer_wins_over_cookie() {
        let p = parts(&[
            ("authorization", "Bearer tok"),
            ("cookie", "plaza_session=abc"),
        ]);
        assert_eq!(extract_session_token(&p, "plaza_session"), Some("tok"));

        let p = parts(&[("authorization", "Basic xyz"), ("cookie", "plaza_session=abc")]);
        assert_eq!(extract_session_token(&p, "plaza_session"), Some("abc"));
    }
}
