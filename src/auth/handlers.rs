//! Login, registration, logout and the member dashboard.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Form, Json};
use axum_extra::extract::cookie::SignedCookieJar;
use mongodb::bson::DateTime as BsonDateTime;
use serde::{Deserialize, Serialize};

use crate::auth::models::{Role, SessionUser};
use crate::auth::password::{constant_time_eq, hash_password, verify_password, MIN_PASSWORD_LEN};
use crate::auth::session::{end_session, start_session, MaybeUser, RequireUser};
use crate::db::models::{User, UserView};
use crate::db::user_repository::UserRepository;
use crate::error::AppError;
use crate::state::{AdminCredentials, AppState};
use crate::util::text::{sanitize_input, validate_email};

/// User id stored in the session of the built-in administrator.
pub const ADMIN_USER_ID: &str = "admin";

pub const ADMIN_DASHBOARD: &str = "/admin/dashboard";
pub const USER_DASHBOARD: &str = "/dashboard";

/// Login form body.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Registration form body.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub college: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Body returned after a successful login or registration.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub message: String,
    pub user: SessionUser,
    pub redirect: String,
}

/// Where a logged-in user lands.
pub fn dashboard_for(user: &SessionUser) -> &'static str {
    if user.is_admin() {
        ADMIN_DASHBOARD
    } else {
        USER_DASHBOARD
    }
}

/// Accept `next` only when it is a path on this site.
pub fn safe_next(next: Option<&str>) -> Option<String> {
    let next = next?.trim();
    (next.starts_with('/') && !next.starts_with("//") && !next.contains('\\'))
        .then(|| next.to_string())
}

/// Check credentials: the built-in admin first, then stored accounts.
pub async fn process_login(
    users: &dyn UserRepository,
    admin: &AdminCredentials,
    form: &LoginForm,
) -> Result<SessionUser, AppError> {
    let email = sanitize_input(form.email.trim());

    if email == admin.username && constant_time_eq(&form.password, &admin.password) {
        tracing::info!("built-in admin logged in");
        return Ok(SessionUser {
            user_id: ADMIN_USER_ID.to_string(),
            username: "Admin".to_string(),
            role: Role::Admin,
        });
    }

    let invalid = || AppError::Auth("Invalid email or password".into());

    let user = users
        .find_by_email(&email.to_lowercase())
        .await?
        .ok_or_else(invalid)?;

    let matches = verify_password(&form.password, &user.password).unwrap_or_else(|e| {
        tracing::warn!(email = %user.email, error = %e, "stored password hash is unreadable");
        false
    });
    if !matches {
        return Err(invalid());
    }

    let user_id = user
        .id
        .map(|id| id.to_hex())
        .ok_or_else(|| AppError::Internal("Stored user has no id".into()))?;

    tracing::info!(user_id = %user_id, "user logged in");
    Ok(SessionUser {
        user_id,
        username: user.name,
        role: user.role,
    })
}

/// Validate and store a new account.
pub async fn process_register(
    users: &dyn UserRepository,
    form: &RegisterForm,
) -> Result<SessionUser, AppError> {
    let name = sanitize_input(form.name.trim());
    let email = sanitize_input(&form.email.trim().to_lowercase());
    let college = sanitize_input(form.college.trim());
    let phone = sanitize_input(form.phone.trim());

    if name.is_empty() || email.is_empty() || form.password.is_empty() || college.is_empty() {
        return Err(AppError::BadRequest("All fields are required".into()));
    }
    if !validate_email(&email) {
        return Err(AppError::BadRequest("Invalid email format".into()));
    }
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if users.find_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let user = User {
        id: None,
        name: name.clone(),
        email,
        password: hash_password(&form.password)?,
        college,
        phone,
        role: Role::User,
        created_at: BsonDateTime::now(),
        profile_picture: None,
    };

    // The unique index still guards against a concurrent registration.
    let id = users.insert(user).await?;
    tracing::info!(user_id = %id, "user registered");

    Ok(SessionUser {
        user_id: id.to_hex(),
        username: name,
        role: Role::User,
    })
}

/// `GET /login` and `GET /register`
pub async fn auth_page_handler(MaybeUser(user): MaybeUser) -> Response {
    match user {
        Some(user) => Redirect::to(dashboard_for(&user)).into_response(),
        None => Json(serde_json::json!({ "authenticated": false })).into_response(),
    }
}

/// `POST /login`
pub async fn login_handler(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Query(query): Query<NextQuery>,
    Form(form): Form<LoginForm>,
) -> Result<(SignedCookieJar, Json<AuthResponse>), AppError> {
    let user = process_login(state.users.as_ref(), &state.admin, &form).await?;

    let redirect = if user.is_admin() {
        ADMIN_DASHBOARD.to_string()
    } else {
        safe_next(query.next.as_deref()).unwrap_or_else(|| USER_DASHBOARD.to_string())
    };
    let message = if user.user_id == ADMIN_USER_ID {
        "Admin login successful!"
    } else {
        "Login successful!"
    };

    let jar = start_session(jar, &user)?;
    Ok((
        jar,
        Json(AuthResponse {
            message: message.to_string(),
            user,
            redirect,
        }),
    ))
}

/// `POST /register`
pub async fn register_handler(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Form(form): Form<RegisterForm>,
) -> Result<(StatusCode, SignedCookieJar, Json<AuthResponse>), AppError> {
    let user = process_register(state.users.as_ref(), &form).await?;

    let jar = start_session(jar, &user)?;
    Ok((
        StatusCode::CREATED,
        jar,
        Json(AuthResponse {
            message: "Registration successful!".to_string(),
            user,
            redirect: USER_DASHBOARD.to_string(),
        }),
    ))
}

/// `GET /logout`
pub async fn logout_handler(jar: SignedCookieJar) -> (SignedCookieJar, Redirect) {
    (end_session(jar), Redirect::to("/"))
}

/// `GET /dashboard`
pub async fn user_dashboard_handler(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Response, AppError> {
    if user.is_admin() {
        return Ok(Redirect::to(ADMIN_DASHBOARD).into_response());
    }

    let id = crate::api::listings::parse_object_id(&user.user_id)?;
    let profile = state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    Ok(Json(serde_json::json!({
        "user": UserView::from(&profile),
        "session": user,
    }))
    .into_response())
}
