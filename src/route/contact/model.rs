use schemars::JsonSchema;
use serde::Deserialize;
use validator::Validate;

/// A message for the owner of the blog.
#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct ContactInput {
	#[validate(length(min = 1, max = 100))]
	pub name: String,
	/// Where the owner can reply.
	#[validate(email)]
	pub email: String,
	#[validate(length(max = 32))]
	#[serde(default)]
	pub phone: Option<String>,
	#[validate(length(min = 1, max = 5000))]
	pub message: String,
}
