use askama::Template;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;

use crate::auth::store::{AuthError, Session};
use crate::error::{AppError, AppResult};
use crate::extractors::{extract_session_token, MaybeUser};
use crate::routes::home::Html;
use crate::state::AppState;

// -- Templates --

#[derive(Template, Default)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub email: String,
    pub error: Option<String>,
}

#[derive(Template, Default)]
#[template(path = "pages/register.html")]
pub struct RegisterTemplate {
    pub email: String,
    pub username: String,
    pub min_password_len: usize,
    pub error: Option<String>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub username: Option<String>,
}

// -- Cookie helpers --

fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", name)
}

fn signed_in(state: &AppState, session: &Session) -> Response {
    let cookie = session_cookie(
        &state.config.auth.cookie_name,
        &session.token,
        state.config.auth.session_hours,
    );
    (
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, "/".to_string()),
            (header::SET_COOKIE, cookie),
        ],
    )
        .into_response()
}

/// Status for an error shown inline on a form; `None` for server failures.
fn form_error_status(e: &AuthError) -> Option<StatusCode> {
    match e {
        AuthError::InvalidCredentials => Some(StatusCode::UNAUTHORIZED),
        AuthError::EmailTaken => Some(StatusCode::CONFLICT),
        AuthError::InvalidEmail | AuthError::WeakPassword(_) | AuthError::InvalidUsername(_) => {
            Some(StatusCode::BAD_REQUEST)
        }
        AuthError::Database(_)
        | AuthError::Pool(_)
        | AuthError::Hash(_)
        | AuthError::Task(_) => None,
    }
}

// -- Login --

/// GET /login
pub async fn login_page(MaybeUser(user): MaybeUser) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }
    Html(LoginTemplate::default()).into_response()
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    match state.sessions.sign_in(&form.email, &form.password).await {
        Ok(session) => Ok(signed_in(&state, &session)),
        Err(e) => match form_error_status(&e) {
            Some(status) => {
                let page = LoginTemplate {
                    email: form.email,
                    error: Some(e.to_string()),
                };
                Ok((status, Html(page)).into_response())
            }
            None => Err(e.into()),
        },
    }
}

// -- Register --

/// GET /register
pub async fn register_page(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }
    Html(RegisterTemplate {
        min_password_len: state.config.auth.min_password_len,
        ..Default::default()
    })
    .into_response()
}

/// POST /register
pub async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> AppResult<Response> {
    let result = state
        .sessions
        .sign_up(&form.email, &form.password, form.username.as_deref())
        .await;

    match result {
        Ok(session) => Ok(signed_in(&state, &session)),
        Err(e) => match form_error_status(&e) {
            Some(status) => {
                let page = RegisterTemplate {
                    email: form.email,
                    username: form.username.unwrap_or_default(),
                    min_password_len: state.config.auth.min_password_len,
                    error: Some(e.to_string()),
                };
                Ok((status, Html(page)).into_response())
            }
            None => Err(AppError::from(e)),
        },
    }
}

// -- Logout --

/// POST /logout: delete session and redirect
pub async fn logout(
    State(state): State<AppState>,
    request: axum::http::Request<axum::body::Body>,
) -> AppResult<Response> {
    let (parts, _body) = request.into_parts();
    let cookie_name = &state.config.auth.cookie_name;

    if let Some(token) = extract_session_token(&parts, cookie_name) {
        state.sessions.sign_out(token)?;
    }

    Ok((
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, "/login".to_string()),
            (header::SET_COOKIE, clear_session_cookie(cookie_name)),
        ],
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_shapes() {
        assert_eq!(
            session_cookie("plaza_session", "abc", 1),
            "plaza_session=abc; HttpOnly; SameSite=Strict; Path=/; Max-Age=3600"
        );
        assert!(clear_session_cookie("plaza_session").contains("Max-Age=0"));
    }

    #[test]
    fn form_errors_are_inline_but_server_errors_are_not() {
        assert_eq!(
            form_error_status(&AuthError::InvalidCredentials),
            Some(StatusCode::UNAUTHORIZED)
        );
        assert_eq!(
            form_error_status(&AuthError::WeakPassword(6)),
            Some(StatusCode::BAD_REQUEST)
        );
        assert_eq!(
            form_error_status(&AuthError::Database(rusqlite::Error::QueryReturnedNoRows)),
            None
        );
    }
}
