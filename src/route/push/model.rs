use schemars::JsonSchema;
use serde::Serialize;

#[derive(Serialize, JsonSchema)]
pub struct VapidKey {
	/// The base64url encoded key to pass as `applicationServerKey` to `PushManager.subscribe()`.
	pub public_key: String,
}
