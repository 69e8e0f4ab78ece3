use aide::{
	openapi::{ApiKeyLocation, SecurityScheme, Tag},
	transform::TransformOpenApi,
};

use crate::{error, extract::Json, session};

pub const SECURITY_SCHEME_SESSION: &str = "Session";

pub mod tag {
	pub const AUTH: &str = "Auth";
	pub const POST: &str = "Post";
	pub const COMMENT: &str = "Comment";
	pub const PUSH: &str = "Push";
	pub const CONTACT: &str = "Contact";
}

pub fn docs(api: TransformOpenApi) -> TransformOpenApi {
	api.title("Blog API")
		.summary("A multi-user blog with threaded comments")
		.description(include_str!("../README.md"))
		.tag(Tag {
			name: tag::AUTH.into(),
			description: Some("Accounts, sessions and password resets".into()),
			..Default::default()
		})
		.tag(Tag {
			name: tag::POST.into(),
			description: Some("Blog posts, managed by admins".into()),
			..Default::default()
		})
		.tag(Tag {
			name: tag::COMMENT.into(),
			description: Some("Threaded comments on posts".into()),
			..Default::default()
		})
		.tag(Tag {
			name: tag::PUSH.into(),
			description: Some("Browser push subscriptions".into()),
			..Default::default()
		})
		.tag(Tag {
			name: tag::CONTACT.into(),
			description: Some("Messages to the owner of the blog".into()),
			..Default::default()
		})
		.security_scheme(
			SECURITY_SCHEME_SESSION,
			SecurityScheme::ApiKey {
				location: ApiKeyLocation::Cookie,
				name: session::COOKIE_NAME.into(),
				description: Some("A user session cookie".into()),
				extensions: Default::default(),
			},
		)
		.default_response_with::<Json<error::ErrorResponse>, _>(|res| {
			res.example(error::ErrorResponse::new(
				error::Message::new("unknown_post")
					.detail("post", "00000000-0000-0000-0000-000000000000")
					.into_vec(),
			))
		})
}
