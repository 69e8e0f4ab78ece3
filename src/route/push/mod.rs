use aide::axum::{
	routing::{get_with, post_with},
	ApiRouter,
};
use axum::http::StatusCode;

use crate::{error, notify, AppState};

pub mod model;
pub mod route;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("failed to encode subscription: {0}")]
	Encode(#[from] serde_json::Error),
	#[error("push_disabled")]
	Disabled,
	#[error("invalid vapid key: {0}")]
	Key(notify::push::Error),
}

pub type RouteError = error::RouteError<Error>;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route("/key", get_with(get_key, get_key_docs))
		.api_route(
			"/subscription",
			post_with(subscribe, subscribe_docs).delete_with(unsubscribe, unsubscribe_docs),
		)
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::Encode(..) | Self::Key(..) => StatusCode::INTERNAL_SERVER_ERROR,
			Self::Disabled => StatusCode::NOT_FOUND,
		}
	}

	fn into_errors(self) -> Vec<error::Message> {
		match self {
			Self::Disabled => error::Message::new("push_disabled").into_vec(),
			Self::Encode(..) | Self::Key(..) => Vec::new(),
		}
	}
}
