use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// These can be removed when [`serde`] supports
/// literal defaults: <https://github.com/serde-rs/serde/issues/368>
#[inline]
fn one() -> i64 {
	1
}

#[inline]
fn ten() -> i64 {
	10
}

/// A response that carries only a message for the user.
#[derive(Serialize, JsonSchema)]
pub struct Notice {
	pub message: &'static str,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct PaginateInput {
	/// The page number to return (1-indexed).
	#[validate(range(min = 1, max = 1000))]
	#[serde(default = "one")]
	pub page: i64,
	/// The number of items to return per page.
	#[validate(range(min = 1, max = 100))]
	#[serde(default = "ten")]
	pub size: i64,
}

impl PaginateInput {
	pub fn offset(&self) -> i64 {
		(self.page - 1) * self.size
	}

	pub fn limit(&self) -> i64 {
		self.size
	}
}
