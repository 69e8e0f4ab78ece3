use aide::OperationInput;
use axum::{
	extract::{FromRef, FromRequestParts},
	http::{header, request},
};
use uuid::Uuid;

use crate::{error::RouteError, openapi::SECURITY_SCHEME_SESSION, route::auth, session, Database};

/// Extracts the session and related user from the request.
///
/// If it does not exist, a [`auth::Error::NoSessionCookie`] is returned.
/// If the session is invalid, a [`auth::Error::InvalidSessionCookie`] is returned.
///
/// ```rust,ignore
/// async fn route(session: Session) {
///   println!("{:?}", session.user);
/// }
/// ```
#[derive(Debug)]
pub struct Session {
	pub id: Uuid,
	pub user: auth::model::User,
}

impl Session {
	/// Succeeds if the authenticated user is an admin.
	///
	/// Must be called at the top of every route that creates, edits or deletes posts.
	pub fn require_admin(&self) -> Result<(), auth::Error> {
		if self.user.is_admin {
			Ok(())
		} else {
			Err(auth::Error::Forbidden)
		}
	}

	/// Succeeds if the authenticated user is `author_id` or an admin.
	pub fn require_author_or_admin(&self, author_id: Option<Uuid>) -> Result<(), auth::Error> {
		if self.user.is_admin || author_id == Some(self.user.id) {
			Ok(())
		} else {
			Err(auth::Error::Forbidden)
		}
	}

	async fn load(database: &Database, session_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
		let user = sqlx::query_as::<_, auth::model::User>(
			r#"
				SELECT "user".* FROM "user"
				JOIN session ON session.user_id = "user".id
				WHERE session.id = $1
			"#,
		)
		.bind(session_id)
		.fetch_optional(database)
		.await?;

		Ok(user.map(|user| Self {
			id: session_id,
			user,
		}))
	}
}

fn cookie_headers(parts: &request::Parts) -> impl Iterator<Item = &str> {
	parts
		.headers
		.get_all(header::COOKIE)
		.into_iter()
		.filter_map(|value| value.to_str().ok())
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Session
where
	Database: FromRef<S>,
	S: Sync + Send,
{
	type Rejection = RouteError<auth::Error>;

	/// Extracts the session from the request using the session cookie.
	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		let session_id = session::find_session_id(cookie_headers(parts))
			.ok_or(auth::Error::NoSessionCookie)?
			.map_err(|_| auth::Error::InvalidSessionCookie)?;

		let database = Database::from_ref(state);

		Ok(Self::load(&database, session_id)
			.await?
			.ok_or(auth::Error::InvalidSessionCookie)?)
	}
}

impl OperationInput for Session {
	/// Operation input for the session extractor.
	///
	/// This adds a session cookie requirement to the `OpenAPI` operation.
	fn operation_input(_ctx: &mut aide::gen::GenContext, operation: &mut aide::openapi::Operation) {
		operation.security.push(
			[(SECURITY_SCHEME_SESSION.to_string(), Vec::new())]
				.into_iter()
				.collect(),
		);
	}
}

/// Like [`Session`], but yields `None` instead of rejecting anonymous requests
/// or requests with a stale session cookie.
#[derive(Debug)]
pub struct MaybeSession(pub Option<Session>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for MaybeSession
where
	Database: FromRef<S>,
	S: Sync + Send,
{
	type Rejection = RouteError<auth::Error>;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		let Some(Ok(session_id)) = session::find_session_id(cookie_headers(parts)) else {
			return Ok(Self(None));
		};

		let database = Database::from_ref(state);

		Ok(Self(Session::load(&database, session_id).await?))
	}
}

impl OperationInput for MaybeSession {}
