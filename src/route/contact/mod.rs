use aide::axum::{routing::post_with, ApiRouter};
use axum::http::StatusCode;

use crate::{error, AppState};

pub mod model;
pub mod route;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("contact_unavailable")]
	Unavailable,
}

pub type RouteError = error::RouteError<Error>;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new().api_route("/", post_with(send_message, send_message_docs))
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
		}
	}

	fn into_errors(self) -> Vec<error::Message> {
		match self {
			Self::Unavailable => error::Message::new("contact_unavailable").into_vec(),
		}
	}
}
