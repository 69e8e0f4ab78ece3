use aide::axum::IntoApiResponse;
use axum::{extract::State, http::StatusCode};
use chrono::Utc;
use macros::route;
use uuid::Uuid;

use crate::{
	extract::{Json, Path, Query, Session},
	notify,
	openapi::tag,
	AppState, Database,
};

use super::{model, title_taken, Error, RouteError};

/// Get all posts
/// Returns a paginated response of all posts, newest first.
#[route(tag = tag::POST)]
pub async fn get_posts(
	State(database): State<Database>,
	Query(paginate): Query<model::PaginateInput>,
) -> Result<Json<Vec<model::Post>>, RouteError> {
	let posts = sqlx::query_as::<_, model::Post>(
		r#"
			SELECT * FROM post
			ORDER BY created_at DESC
			LIMIT $1 OFFSET $2
		"#,
	)
	.bind(paginate.limit())
	.bind(paginate.offset())
	.fetch_all(&database)
	.await?;

	Ok(Json(posts))
}

/// Get single post
/// Returns a single post by its unique id.
#[route(tag = tag::POST)]
pub async fn get_post(
	State(database): State<Database>,
	Path(post_id): Path<Uuid>,
) -> Result<Json<model::Post>, RouteError> {
	let post = sqlx::query_as::<_, model::Post>("SELECT * FROM post WHERE id = $1")
		.bind(post_id)
		.fetch_optional(&database)
		.await?;

	Ok(Json(post.ok_or(Error::UnknownPost(post_id))?))
}

/// Create post
/// Publishes a new post and notifies subscribers. Admin only.
#[route(tag = tag::POST)]
pub async fn create_post(
	State(state): State<AppState>,
	session: Session,
	Json(input): Json<model::CreatePostInput>,
) -> Result<Json<model::Post>, RouteError> {
	session.require_admin().map_err(Error::Auth)?;

	let post = sqlx::query_as::<_, model::Post>(
		r#"
			INSERT INTO post (id, author_id, title, subtitle, body, img_url, created_at)
			VALUES ($1, $2, $3, $4, $5, $6, $7)
			RETURNING *
		"#,
	)
	.bind(Uuid::new_v4())
	.bind(session.user.id)
	.bind(&input.title)
	.bind(&input.subtitle)
	.bind(&input.body)
	.bind(&input.img_url)
	.bind(Utc::now())
	.fetch_one(&state.database)
	.await
	.map_err(title_taken)?;

	tracing::info!(post = %post.id, author = %session.user.id, "published post");

	notify::on_new_post(&state.database, &state.notifier, &state.config, &post).await;

	Ok(Json(post))
}

/// Update post
/// Updates an existing post by its unique id. The editor becomes the author of the post. Admin only.
#[route(tag = tag::POST)]
pub async fn update_post(
	State(database): State<Database>,
	session: Session,
	Path(post_id): Path<Uuid>,
	Json(input): Json<model::UpdatePostInput>,
) -> Result<Json<model::Post>, RouteError> {
	session.require_admin().map_err(Error::Auth)?;

	let post = sqlx::query_as::<_, model::Post>(
		r#"
			UPDATE post
			SET title = COALESCE($1, title),
				subtitle = COALESCE($2, subtitle),
				body = COALESCE($3, body),
				img_url = COALESCE($4, img_url),
				author_id = $5
			WHERE id = $6
			RETURNING *
		"#,
	)
	.bind(input.title)
	.bind(input.subtitle)
	.bind(input.body)
	.bind(input.img_url)
	.bind(session.user.id)
	.bind(post_id)
	.fetch_optional(&database)
	.await
	.map_err(title_taken)?;

	Ok(Json(post.ok_or(Error::UnknownPost(post_id))?))
}

/// Delete post
/// Deletes an existing post and all of its comments. Admin only.
#[route(tag = tag::POST, response(status = 204, description = "The post was deleted."))]
pub async fn delete_post(
	State(database): State<Database>,
	session: Session,
	Path(post_id): Path<Uuid>,
) -> Result<impl IntoApiResponse, RouteError> {
	session.require_admin().map_err(Error::Auth)?;

	let mut transaction = database.begin().await?;

	// Comments go first in a single statement, so threads of any depth are removed
	let comments = sqlx::query("DELETE FROM comment WHERE post_id = $1")
		.bind(post_id)
		.execute(&mut *transaction)
		.await?;

	let result = sqlx::query("DELETE FROM post WHERE id = $1")
		.bind(post_id)
		.execute(&mut *transaction)
		.await?;

	if result.rows_affected() == 0 {
		return Err(Error::UnknownPost(post_id).into());
	}

	transaction.commit().await?;

	tracing::info!(post = %post_id, comments = comments.rows_affected(), "deleted post");

	Ok(StatusCode::NO_CONTENT)
}
