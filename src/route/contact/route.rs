use aide::axum::IntoApiResponse;
use axum::{extract::State, http::StatusCode};
use macros::route;

use crate::{extract::Json, openapi::tag, route::model::Notice, AppState};

use super::{model, Error, RouteError};

const MESSAGE_SENT: &str = "Thanks! Your note is on its way.";

/// Contact the owner
/// Emails a message to the owner of the blog. No account is needed.
#[route(tag = tag::CONTACT, response(status = 202, description = "The message was queued.", shape = "Json<Notice>"))]
pub async fn send_message(
	State(state): State<AppState>,
	Json(input): Json<model::ContactInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	let to = state.config.contact_address().ok_or(Error::Unavailable)?;
	let phone = input.phone.as_deref().map_or("not given", str::trim);

	state.notifier.email(
		to,
		format!("Message from {} <{}>", input.name.trim(), input.email),
		format!(
			"{}\n\n--\nName: {}\nEmail: {}\nPhone: {phone}",
			input.message,
			input.name.trim(),
			input.email,
		),
	);

	tracing::info!("queued contact message");

	Ok((StatusCode::ACCEPTED, Json(Notice { message: MESSAGE_SENT })))
}
