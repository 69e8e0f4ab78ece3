use std::sync::Arc;

use aide::{
	axum::{
		routing::{get, get_with},
		ApiRouter, IntoApiResponse,
	},
	openapi::OpenApi,
	scalar::Scalar,
};
use axum::{response::IntoResponse, Extension};

use crate::extract::Json;

/// Where the generated `OpenAPI` document is served.
pub const SPEC_URL: &str = "/docs/private/api.json";

pub fn routes() -> ApiRouter {
	ApiRouter::new()
		.api_route(
			"/",
			get_with(
				Scalar::new(SPEC_URL).with_title("Blog API").axum_handler(),
				|op| op.description("This documentation page."),
			),
		)
		.route("/private/api.json", get(serve_docs))
}

async fn serve_docs(Extension(api): Extension<Arc<OpenApi>>) -> impl IntoApiResponse {
	Json(api.as_ref()).into_response()
}

#[cfg(test)]
mod test {
	use crate::test::*;

	#[tokio::test]
	async fn test_docs_are_served() {
		let app = app().await;

		let response = app.server.get("/docs/private/api.json").await;
		assert_eq!(response.status_code(), 200);

		let api = response.json::<serde_json::Value>();
		assert_eq!(api["info"]["title"], "Blog API");
		assert!(api["paths"]["/posts/{id}/comments"].is_object());
		assert!(api["paths"]["/auth/reset/complete"].is_object());

		let response = app.server.get("/docs").await;
		assert_eq!(response.status_code(), 200);
	}
}
