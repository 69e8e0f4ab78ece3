use aide::axum::IntoApiResponse;
use axum::{extract::State, http::StatusCode};
use chrono::Utc;
use macros::route;
use uuid::Uuid;

use crate::{
	extract::{Json, Path, Session},
	notify,
	openapi::tag,
	AppState, Database,
};

use super::{model, tree, Error, RouteError};

/// Deletes a comment together with every reply below it, returning the number
/// of deleted comments. Works for threads of any depth.
pub(crate) async fn delete_subtree(
	executor: impl sqlx::SqliteExecutor<'_>,
	comment_id: Uuid,
) -> Result<u64, sqlx::Error> {
	let result = sqlx::query(
		r#"
			WITH RECURSIVE subtree (id) AS (
				SELECT id FROM comment WHERE id = $1
				UNION ALL
				SELECT comment.id FROM comment
				JOIN subtree ON comment.parent_id = subtree.id
			)
			DELETE FROM comment WHERE id IN (SELECT id FROM subtree)
		"#,
	)
	.bind(comment_id)
	.execute(executor)
	.await?;

	Ok(result.rows_affected())
}

/// Finds out which row a comment referenced that no longer exists.
pub(crate) async fn vanished(
	database: &Database,
	post_id: Uuid,
	parent_id: Option<Uuid>,
) -> Result<Error, sqlx::Error> {
	if !post_exists(database, post_id).await? {
		return Ok(Error::UnknownPost(post_id));
	}

	Ok(match parent_id {
		Some(parent_id) => Error::UnknownComment(parent_id),
		None => Error::UnknownPost(post_id),
	})
}

async fn post_exists(database: &Database, post_id: Uuid) -> Result<bool, sqlx::Error> {
	sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM post WHERE id = $1)")
		.bind(post_id)
		.fetch_one(database)
		.await
}

/// Get comments
/// Returns the root comments of a post, newest first. Each carries all replies below it
/// as a flat list in thread order, which can be nested using `parent_id`.
#[route(tag = tag::COMMENT)]
pub async fn get_comments(
	State(database): State<Database>,
	Path(post_id): Path<Uuid>,
) -> Result<Json<Vec<model::Thread>>, RouteError> {
	if !post_exists(&database, post_id).await? {
		return Err(Error::UnknownPost(post_id).into());
	}

	let comments = sqlx::query_as::<_, model::Comment>(
		r#"
			SELECT * FROM comment
			WHERE post_id = $1
			ORDER BY created_at ASC
		"#,
	)
	.bind(post_id)
	.fetch_all(&database)
	.await?;

	Ok(Json(tree::build(comments)))
}

/// Create comment
/// Comments on a post, or replies to another comment on the same post.
/// The author of the post (or of the parent comment) is notified.
#[route(tag = tag::COMMENT)]
pub async fn create_comment(
	State(state): State<AppState>,
	session: Session,
	Path(post_id): Path<Uuid>,
	Json(input): Json<model::CreateCommentInput>,
) -> Result<Json<model::Comment>, RouteError> {
	if !post_exists(&state.database, post_id).await? {
		return Err(Error::UnknownPost(post_id).into());
	}

	if let Some(parent_id) = input.parent_id {
		let parent_post = sqlx::query_scalar::<_, Uuid>("SELECT post_id FROM comment WHERE id = $1")
			.bind(parent_id)
			.fetch_optional(&state.database)
			.await?
			.ok_or(Error::UnknownComment(parent_id))?;

		if parent_post != post_id {
			return Err(Error::ParentOnOtherPost.into());
		}
	}

	let result = sqlx::query_as::<_, model::Comment>(
		r#"
			INSERT INTO comment (id, post_id, parent_id, author_id, content, created_at)
			VALUES ($1, $2, $3, $4, $5, $6)
			RETURNING *
		"#,
	)
	.bind(Uuid::new_v4())
	.bind(post_id)
	.bind(input.parent_id)
	.bind(session.user.id)
	.bind(&input.content)
	.bind(Utc::now())
	.fetch_one(&state.database)
	.await;

	let comment = match result {
		Ok(comment) => comment,
		// The post or the parent was deleted after the checks above
		Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
			return Err(vanished(&state.database, post_id, input.parent_id)
				.await?
				.into());
		}
		Err(e) => return Err(e.into()),
	};

	tracing::debug!(comment = %comment.id, post = %post_id, "created comment");

	notify::on_new_comment(&state.database, &state.notifier, &state.config, &comment).await;

	Ok(Json(comment))
}

/// Get replies
/// Returns the direct replies of a comment, oldest first.
#[route(tag = tag::COMMENT)]
pub async fn get_replies(
	State(database): State<Database>,
	Path(comment_id): Path<Uuid>,
) -> Result<Json<Vec<model::Comment>>, RouteError> {
	let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM comment WHERE id = $1)")
		.bind(comment_id)
		.fetch_one(&database)
		.await?;

	if !exists {
		return Err(Error::UnknownComment(comment_id).into());
	}

	let replies = sqlx::query_as::<_, model::Comment>(
		r#"
			SELECT * FROM comment
			WHERE parent_id = $1
			ORDER BY created_at ASC
		"#,
	)
	.bind(comment_id)
	.fetch_all(&database)
	.await?;

	Ok(Json(replies))
}

/// Delete comment
/// Deletes a comment and all replies below it. Only the author of the comment or an admin may do this.
#[route(tag = tag::COMMENT, response(status = 204, description = "The comment was deleted."))]
pub async fn delete_comment(
	State(database): State<Database>,
	session: Session,
	Path(comment_id): Path<Uuid>,
) -> Result<impl IntoApiResponse, RouteError> {
	let author_id =
		sqlx::query_scalar::<_, Option<Uuid>>("SELECT author_id FROM comment WHERE id = $1")
			.bind(comment_id)
			.fetch_optional(&database)
			.await?
			.ok_or(Error::UnknownComment(comment_id))?;

	session
		.require_author_or_admin(author_id)
		.map_err(Error::Auth)?;

	let deleted = delete_subtree(&database, comment_id).await?;

	tracing::info!(comment = %comment_id, user = %session.user.id, deleted, "deleted comment");

	Ok(StatusCode::NO_CONTENT)
}
