use aide::axum::IntoApiResponse;
use axum::{
	extract::State,
	http::{header, StatusCode},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use macros::route;
use uuid::Uuid;

use crate::{
	extract::{Json, MaybeSession, Session},
	notify,
	openapi::tag,
	route::model::Notice,
	session, token, AppState, Database,
};

use super::{hash_password, model, verify_password, Error, RouteError};

/// How long a password reset link stays valid, in seconds.
pub const RESET_TOKEN_MAX_AGE: i64 = 60 * 60;

/// Generic reply to reset requests, identical whether or not the account exists.
const RESET_REQUESTED: &str = "If an account with that email exists, a reset link has been sent.";

/// The purpose a reset token is signed for.
///
/// It contains a fingerprint of the current password hash, so that a token
/// stops working once the password has been changed with it.
fn reset_purpose(user: &model::User) -> String {
	let fingerprint = &user.password[..user.password.len().min(8)];

	format!("password-reset:{}", URL_SAFE_NO_PAD.encode(fingerprint))
}

async fn create_session(
	executor: impl sqlx::SqliteExecutor<'_>,
	user_id: Uuid,
) -> Result<model::Session, sqlx::Error> {
	sqlx::query_as::<_, model::Session>(
		r#"
			INSERT INTO session (id, user_id, created_at) VALUES ($1, $2, $3)
			RETURNING *
		"#,
	)
	.bind(Uuid::new_v4())
	.bind(user_id)
	.bind(Utc::now())
	.fetch_one(executor)
	.await
}

/// Maps a unique constraint violation on the email column to [`Error::EmailTaken`].
fn email_taken(error: sqlx::Error) -> RouteError {
	match error {
		sqlx::Error::Database(ref e) if e.is_unique_violation() => Error::EmailTaken.into(),
		e => RouteError::from(e),
	}
}

/// Log in
/// Logs in to an account, returning an associated session cookie.
#[route(tag = tag::AUTH, response(status = 200, description = "Logged in successfully.", shape = "Json<model::Session>"))]
pub async fn login(
	State(state): State<AppState>,
	Json(auth): Json<model::LoginInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	let user = sqlx::query_as::<_, model::User>(r#"SELECT * FROM "user" WHERE email = $1"#)
		.bind(&auth.email)
		.fetch_optional(&state.database)
		.await?;

	let Some(user) = user else {
		// Hash anyway, so unknown emails take as long as wrong passwords
		hash_password(&state.hasher, &auth.password, &Uuid::nil()).map_err(Error::Argon)?;

		tracing::debug!("login attempt for unknown email");
		return Err(Error::InvalidEmailOrPassword.into());
	};

	if !verify_password(&state.hasher, &auth.password, &user.id, &user.password)
		.map_err(Error::Argon)?
	{
		tracing::debug!(user = %user.id, "login attempt with wrong password");
		return Err(Error::InvalidEmailOrPassword.into());
	}

	let session = create_session(&state.database, user.id).await?;
	let cookie = session::create_cookie(session.id);

	Ok(([(header::SET_COOKIE, cookie.to_string())], Json(session)))
}

/// Log out
/// Logs out of the authenticated account. Succeeds even if there is no session.
#[route(tag = tag::AUTH, response(status = 204, description = "Logged out successfully."))]
pub async fn logout(
	State(database): State<Database>,
	MaybeSession(session): MaybeSession,
) -> Result<impl IntoApiResponse, RouteError> {
	if let Some(session) = session {
		sqlx::query("DELETE FROM session WHERE id = $1")
			.bind(session.id)
			.execute(&database)
			.await?;
	}

	// Clear the session cookie
	Ok((
		[(header::SET_COOKIE, session::clear_cookie().to_string())],
		StatusCode::NO_CONTENT,
	))
}

/// Register account
/// Registers a new account, returning an associated session cookie.
/// The very first account becomes the admin.
#[route(tag = tag::AUTH, response(status = 200, description = "Registered successfully.", shape = "Json<model::Session>"))]
pub async fn register(
	State(state): State<AppState>,
	Json(auth): Json<model::RegisterInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	let user_id = Uuid::new_v4();
	let hashed = hash_password(&state.hasher, &auth.password, &user_id).map_err(Error::Argon)?;

	let mut tx = state.database.begin().await?;

	// The admin check is part of the insert, so two concurrent first
	// registrations cannot both become admin.
	let is_admin = sqlx::query_scalar::<_, bool>(
		r#"
			INSERT INTO "user" (id, name, email, password, is_admin, notify_by_email, created_at)
			SELECT $1, $2, $3, $4, NOT EXISTS (SELECT 1 FROM "user"), TRUE, $5
			RETURNING is_admin
		"#,
	)
	.bind(user_id)
	.bind(&auth.name)
	.bind(&auth.email)
	.bind(hashed.as_slice())
	.bind(Utc::now())
	.fetch_one(&mut *tx)
	.await
	.map_err(email_taken)?;

	let session = create_session(&mut *tx, user_id).await?;

	tx.commit().await?;

	tracing::info!(user = %user_id, is_admin, "registered new user");

	let cookie = session::create_cookie(session.id);

	Ok(([(header::SET_COOKIE, cookie.to_string())], Json(session)))
}

/// Get user
/// Returns the authenticated user.
#[route(tag = tag::AUTH)]
pub async fn get_me(session: Session) -> Json<model::User> {
	Json(session.user)
}

/// Update user
/// Updates the name, email or notification preference of the authenticated user.
#[route(tag = tag::AUTH)]
pub async fn update_me(
	State(database): State<Database>,
	session: Session,
	Json(input): Json<model::UpdateUserInput>,
) -> Result<Json<model::User>, RouteError> {
	let user = sqlx::query_as::<_, model::User>(
		r#"
			UPDATE "user"
			SET name = COALESCE($1, name),
				email = COALESCE($2, email),
				notify_by_email = COALESCE($3, notify_by_email)
			WHERE id = $4
			RETURNING *
		"#,
	)
	.bind(input.name)
	.bind(input.email)
	.bind(input.notify_by_email)
	.bind(session.user.id)
	.fetch_one(&database)
	.await
	.map_err(email_taken)?;

	Ok(Json(user))
}

/// Delete user
/// Deletes the authenticated user. Their posts and comments are kept without an author.
#[route(tag = tag::AUTH)]
pub async fn delete_me(
	State(database): State<Database>,
	session: Session,
) -> Result<impl IntoApiResponse, RouteError> {
	sqlx::query(r#"DELETE FROM "user" WHERE id = $1"#)
		.bind(session.user.id)
		.execute(&database)
		.await?;

	tracing::info!(user = %session.user.id, "deleted user");

	// Clear the session cookie
	Ok((
		[(header::SET_COOKIE, session::clear_cookie().to_string())],
		StatusCode::NO_CONTENT,
	))
}

/// Request password reset
/// Emails a link to reset the password, valid for one hour. The response is the same
/// whether or not an account with the email exists.
#[route(tag = tag::AUTH, response(status = 202, description = "The request was received.", shape = "Json<Notice>"))]
pub async fn request_reset(
	State(state): State<AppState>,
	Json(input): Json<model::ResetRequestInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	let user = sqlx::query_as::<_, model::User>(r#"SELECT * FROM "user" WHERE email = $1"#)
		.bind(&input.email)
		.fetch_optional(&state.database)
		.await?;

	if let Some(user) = user {
		let token = state.signer.sign(&user.email, &reset_purpose(&user));
		let link = state.config.link(&format!("/reset-password?token={token}"));

		state.notifier.email(
			user.email,
			notify::PASSWORD_RESET_SUBJECT,
			format!(
				"Someone requested a password reset for your account.\n\n\
				Use the following link to choose a new password:\n{link}\n\n\
				This link will expire in 1 hour. If you did not request this, you can ignore this email."
			),
		);
	}

	Ok((
		StatusCode::ACCEPTED,
		Json(Notice {
			message: RESET_REQUESTED,
		}),
	))
}

/// Complete password reset
/// Sets a new password using the token from a reset email, and logs out all sessions.
#[route(tag = tag::AUTH, response(status = 204, description = "The password was changed."))]
pub async fn complete_reset(
	State(state): State<AppState>,
	Json(input): Json<model::ResetCompleteInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	let email = token::unverified_payload(&input.token).map_err(Error::Token)?;

	let user = sqlx::query_as::<_, model::User>(r#"SELECT * FROM "user" WHERE email = $1"#)
		.bind(&email)
		.fetch_optional(&state.database)
		.await?
		.ok_or(Error::Token(token::Error::Invalid))?;

	state
		.signer
		.verify(
			&input.token,
			&reset_purpose(&user),
			Duration::seconds(RESET_TOKEN_MAX_AGE),
		)
		.map_err(Error::Token)?;

	if input.password != input.confirm {
		return Err(Error::PasswordMismatch.into());
	}

	let hashed = hash_password(&state.hasher, &input.password, &user.id).map_err(Error::Argon)?;

	let mut tx = state.database.begin().await?;

	sqlx::query(r#"UPDATE "user" SET password = $1 WHERE id = $2"#)
		.bind(hashed.as_slice())
		.bind(user.id)
		.execute(&mut *tx)
		.await?;

	sqlx::query("DELETE FROM session WHERE user_id = $1")
		.bind(user.id)
		.execute(&mut *tx)
		.await?;

	tx.commit().await?;

	tracing::info!(user = %user.id, "password was reset");

	Ok(StatusCode::NO_CONTENT)
}
