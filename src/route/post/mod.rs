use aide::axum::{routing::get_with, ApiRouter};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::{
	error::{self, ErrorShape},
	route::auth,
	AppState,
};

pub mod model;
pub mod route;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("unknown_post")]
	UnknownPost(Uuid),
	#[error("title_taken")]
	TitleTaken,
	#[error(transparent)]
	Auth(#[from] auth::Error),
}

pub type RouteError = error::RouteError<Error>;

pub fn routes() -> ApiRouter<AppState> {
	use super::comment::route::{create_comment, create_comment_docs, get_comments, get_comments_docs};
	use route::*;

	ApiRouter::new()
		.api_route(
			"/",
			get_with(get_posts, get_posts_docs).post_with(create_post, create_post_docs),
		)
		.api_route(
			"/:id",
			get_with(get_post, get_post_docs)
				.put_with(update_post, update_post_docs)
				.delete_with(delete_post, delete_post_docs),
		)
		.api_route(
			"/:id/comments",
			get_with(get_comments, get_comments_docs).post_with(create_comment, create_comment_docs),
		)
}

impl ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::UnknownPost(..) => StatusCode::NOT_FOUND,
			Self::TitleTaken => StatusCode::CONFLICT,
			Self::Auth(error) => error.status(),
		}
	}

	fn into_errors(self) -> Vec<error::Message> {
		match self {
			Self::UnknownPost(post) => error::Message::new("unknown_post")
				.detail("post", post.to_string())
				.into_vec(),
			Self::TitleTaken => error::Message::new("title_taken").field("title").into_vec(),
			Self::Auth(error) => error.into_errors(),
		}
	}
}

/// Maps a unique constraint violation on the title column to [`Error::TitleTaken`].
pub(crate) fn title_taken(error: sqlx::Error) -> RouteError {
	match error {
		sqlx::Error::Database(ref e) if e.is_unique_violation() => Error::TitleTaken.into(),
		e => RouteError::from(e),
	}
}

#[cfg(test)]
mod test {
	use serde_json::Value;

	use crate::{notify::Delivery, test::*};

	#[tokio::test]
	async fn test_create_and_get_post() {
		let mut app = app().await;

		let admin = app.register("Alice", "alice@example.com").await;
		let post = app.create_post(admin, "Hello").await;

		let response = app.server.get(&format!("/posts/{post}")).await;
		assert_eq!(response.status_code(), 200);

		let body = response.json::<Value>();
		assert_eq!(body["title"], "Hello");
		assert_eq!(body["subtitle"], "A subtitle");

		let response = app.server.get("/posts").await;
		assert_eq!(response.status_code(), 200);
		assert_eq!(response.json::<Value>().as_array().map(Vec::len), Some(1));

		app.drain_outbox();
	}

	#[tokio::test]
	async fn test_posts_newest_first() {
		let mut app = app().await;

		let admin = app.register("Alice", "alice@example.com").await;
		app.create_post(admin.clone(), "First").await;
		app.create_post(admin, "Second").await;

		let posts = app.server.get("/posts").await.json::<Value>();

		assert_eq!(posts[0]["title"], "Second");
		assert_eq!(posts[1]["title"], "First");

		let page = app.server.get("/posts?page=2&size=1").await.json::<Value>();

		assert_eq!(page[0]["title"], "First");

		app.drain_outbox();
	}

	#[tokio::test]
	async fn test_unknown_post() {
		let app = app().await;

		let response = app
			.server
			.get("/posts/00000000-0000-0000-0000-000000000000")
			.await;

		assert_eq!(response.status_code(), 404);
		assert_eq!(
			response.json::<Value>()["errors"][0]["content"],
			"unknown_post"
		);

		let response = app.server.get("/posts/not-a-uuid").await;
		assert_eq!(response.status_code(), 400);
	}

	#[tokio::test]
	async fn test_only_admins_manage_posts() {
		let mut app = app().await;

		let admin = app.register("Alice", "alice@example.com").await;
		let user = app.register("Bob", "bob@example.com").await;
		let post = app.create_post(admin, "Hello").await;

		let response = app
			.server
			.post("/posts")
			.add_cookie(user.clone())
			.json(&post_body("Mine"))
			.await;
		assert_eq!(response.status_code(), 403);

		let response = app
			.server
			.put(&format!("/posts/{post}"))
			.add_cookie(user.clone())
			.json(&json!({ "title": "Taken over" }))
			.await;
		assert_eq!(response.status_code(), 403);

		let response = app
			.server
			.delete(&format!("/posts/{post}"))
			.add_cookie(user)
			.await;
		assert_eq!(response.status_code(), 403);

		let response = app.server.post("/posts").json(&post_body("Anonymous")).await;
		assert_eq!(response.status_code(), 401);

		let response = app.server.get(&format!("/posts/{post}")).await;
		assert_eq!(response.json::<Value>()["title"], "Hello");

		app.drain_outbox();
	}

	#[tokio::test]
	async fn test_duplicate_title() {
		let mut app = app().await;

		let admin = app.register("Alice", "alice@example.com").await;
		let post = app.create_post(admin.clone(), "Hello").await;

		let mut body = post_body("Hello");
		body["body"] = json!("Something else entirely");

		let response = app
			.server
			.post("/posts")
			.add_cookie(admin.clone())
			.json(&body)
			.await;
		assert_eq!(response.status_code(), 409);

		let other = app.create_post(admin.clone(), "Other").await;
		let response = app
			.server
			.put(&format!("/posts/{other}"))
			.add_cookie(admin)
			.json(&json!({ "title": "Hello" }))
			.await;
		assert_eq!(response.status_code(), 409);

		// The original is untouched
		let original = app.server.get(&format!("/posts/{post}")).await.json::<Value>();
		assert_eq!(original["body"], "Some body text");

		let posts = app.server.get("/posts").await.json::<Value>();
		assert_eq!(posts.as_array().map(Vec::len), Some(2));

		app.drain_outbox();
	}

	#[tokio::test]
	async fn test_edit_reassigns_author() {
		let mut app = app().await;

		let admin = app.register("Alice", "alice@example.com").await;
		let editor = app.register("Bob", "bob@example.com").await;
		let post = app.create_post(admin, "Hello").await;

		sqlx::query(r#"UPDATE "user" SET is_admin = TRUE"#)
			.execute(&app.database)
			.await
			.unwrap();

		let editor_id = app.me(editor.clone()).await["id"].clone();
		app.drain_outbox();

		let response = app
			.server
			.put(&format!("/posts/{post}"))
			.add_cookie(editor)
			.json(&json!({ "subtitle": "Edited" }))
			.await;

		assert_eq!(response.status_code(), 200);

		let body = response.json::<Value>();
		assert_eq!(body["title"], "Hello");
		assert_eq!(body["subtitle"], "Edited");
		assert_eq!(body["author_id"], editor_id);

		// Editing does not notify anyone
		assert!(app.drain_outbox().is_empty());
	}

	#[tokio::test]
	async fn test_delete_post_removes_comment_tree() {
		let mut app = app().await;

		let admin = app.register("Alice", "alice@example.com").await;
		let user = app.register("Bob", "bob@example.com").await;
		let post = app.create_post(admin.clone(), "Hello").await;

		let root = app.comment(user.clone(), &post, "Root", None).await;
		let reply = app.comment(user.clone(), &post, "Reply", Some(&root)).await;
		app.comment(user, &post, "Nested", Some(&reply)).await;

		let response = app
			.server
			.delete(&format!("/posts/{post}"))
			.add_cookie(admin.clone())
			.await;
		assert_eq!(response.status_code(), 204);

		let comments = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comment")
			.fetch_one(&app.database)
			.await
			.unwrap();
		assert_eq!(comments, 0);

		let response = app
			.server
			.delete(&format!("/posts/{post}"))
			.add_cookie(admin)
			.await;
		assert_eq!(response.status_code(), 404);

		app.drain_outbox();
	}

	#[tokio::test]
	async fn test_delete_post_with_deep_thread() {
		let mut app = app().await;

		let admin = app.register("Alice", "alice@example.com").await;
		let post = app.create_post(admin.clone(), "Hello").await;
		let other = app.create_post(admin.clone(), "Other").await;

		app.reply_chain(&post, 1_100).await;
		app.reply_chain(&other, 2).await;

		let response = app
			.server
			.delete(&format!("/posts/{post}"))
			.add_cookie(admin)
			.await;
		assert_eq!(response.status_code(), 204);

		let comments = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comment")
			.fetch_one(&app.database)
			.await
			.unwrap();
		assert_eq!(comments, 2);

		let response = app.server.get(&format!("/posts/{post}")).await;
		assert_eq!(response.status_code(), 404);

		app.drain_outbox();
	}

	#[tokio::test]
	async fn test_new_post_notifies_opted_in_users() {
		let mut app = app().await;

		let admin = app.register("Alice", "alice@example.com").await;
		app.register("Bob", "bob@example.com").await;
		let carol = app.register("Carol", "carol@example.com").await;

		app.server
			.put("/auth/me")
			.add_cookie(carol)
			.json(&json!({ "notify_by_email": false }))
			.await;

		app.drain_outbox();
		app.create_post(admin, "Hello").await;

		let recipients = app
			.drain_outbox()
			.into_iter()
			.filter_map(|delivery| match delivery {
				Delivery::Email { to, subject, body } => {
					assert_eq!(subject, "New Blog Post");
					assert!(body.contains("Hello"));
					Some(to)
				}
				Delivery::Push { .. } => None,
			})
			.collect::<Vec<_>>();

		assert_eq!(recipients, ["bob@example.com"]);
	}
}
