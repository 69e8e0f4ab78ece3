use std::collections::HashMap;

use uuid::Uuid;

use super::model::{Comment, Thread};

/// Assembles the threads of a post from a flat list of its comments.
///
/// The input must be ordered oldest first. Threads are returned newest first,
/// and the replies of each thread are laid out depth first with siblings
/// oldest first. Walks with an explicit stack, so deep threads are fine.
pub fn build(comments: Vec<Comment>) -> Vec<Thread> {
	let mut roots = Vec::new();
	let mut children = HashMap::<Uuid, Vec<Comment>>::new();

	for comment in comments {
		match comment.parent_id {
			Some(parent_id) => children.entry(parent_id).or_default().push(comment),
			None => roots.push(comment),
		}
	}

	roots
		.into_iter()
		.rev()
		.map(|comment| {
			let mut replies = Vec::new();
			let mut stack = children.remove(&comment.id).unwrap_or_default();
			stack.reverse();

			while let Some(reply) = stack.pop() {
				if let Some(below) = children.remove(&reply.id) {
					stack.extend(below.into_iter().rev());
				}

				replies.push(reply);
			}

			Thread { comment, replies }
		})
		.collect()
}
