// self
use crate::_prelude::*;

/// Platform-specific quirks that influence how flows behave.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformQuirks {
	/// Authorization requests must carry a PKCE S256 challenge.
	pub pkce_required: bool,
	/// Character used to join scopes when constructing `scope` parameters.
	pub scope_delimiter: char,
}
impl Default for PlatformQuirks {
	fn default() -> Self {
		Self { pkce_required: false, scope_delimiter: ' ' }
	}
}
