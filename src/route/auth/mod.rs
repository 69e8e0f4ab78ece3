use aide::axum::{
	routing::{get_with, post_with},
	ApiRouter,
};
use argon2::Argon2;
use axum::http::StatusCode;
use uuid::Uuid;

use crate::{error, token, AppState};

pub mod model;
pub mod route;

pub const KEY_LENGTH: usize = 32;

/// An error that can occur during authentication.
///
/// Note that the messages are presented to the client, so they should not contain
/// sensitive information.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("invalid email or password")]
	InvalidEmailOrPassword,
	#[error("password validation error")]
	Argon(#[from] argon2::Error),
	#[error("no session cookie")]
	NoSessionCookie,
	#[error("invalid session cookie")]
	InvalidSessionCookie,
	#[error("email already taken")]
	EmailTaken,
	#[error("you are not allowed to do that")]
	Forbidden,
	#[error(transparent)]
	Token(#[from] token::Error),
	#[error("passwords do not match")]
	PasswordMismatch,
}

pub type RouteError = error::RouteError<Error>;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route("/login", post_with(login, login_docs))
		.api_route("/logout", get_with(logout, logout_docs))
		.api_route("/register", post_with(register, register_docs))
		.api_route(
			"/me",
			get_with(get_me, get_me_docs)
				.put_with(update_me, update_me_docs)
				.delete_with(delete_me, delete_me_docs),
		)
		.api_route("/reset", post_with(request_reset, request_reset_docs))
		.api_route(
			"/reset/complete",
			post_with(complete_reset, complete_reset_docs),
		)
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::InvalidEmailOrPassword | Self::NoSessionCookie | Self::InvalidSessionCookie => {
				StatusCode::UNAUTHORIZED
			}
			Self::Argon(..) => StatusCode::INTERNAL_SERVER_ERROR,
			Self::EmailTaken => StatusCode::CONFLICT,
			Self::Forbidden => StatusCode::FORBIDDEN,
			Self::Token(..) | Self::PasswordMismatch => StatusCode::BAD_REQUEST,
		}
	}

	fn into_errors(self) -> Vec<error::Message> {
		let message = error::Message::new(self.to_string());

		match self {
			Self::PasswordMismatch => message.field("confirm").into_vec(),
			_ => message.into_vec(),
		}
	}
}

/// Hashes a password with Argon2, using the user's id as a salt.
pub fn hash_password(
	hasher: &Argon2,
	password: &str,
	id: &Uuid,
) -> Result<[u8; KEY_LENGTH], argon2::Error> {
	let mut hash = [0; KEY_LENGTH];

	hasher.hash_password_into(password.as_bytes(), id.as_bytes(), &mut hash)?;
	Ok(hash)
}

/// Checks a password against the stored hash of the user with the given id.
pub fn verify_password(
	hasher: &Argon2,
	password: &str,
	id: &Uuid,
	hash: &[u8],
) -> Result<bool, argon2::Error> {
	Ok(hash_password(hasher, password, id)?.as_slice() == hash)
}
