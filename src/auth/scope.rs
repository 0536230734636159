//! Scope sets requested from and granted by platforms.

// std
use std::collections::BTreeSet;
// crates.io
use serde::{Deserializer, Serializer, de::Error as DeError};
// self
use crate::_prelude::*;

/// Errors emitted when validating scopes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ScopeValidationError {
	/// Empty scope entries are not allowed.
	#[error("Scope entries cannot be empty.")]
	Empty,
	/// Scopes cannot contain embedded whitespace characters.
	#[error("Scope contains whitespace: {scope}.")]
	ContainsWhitespace {
		/// The offending scope string.
		scope: String,
	},
}

/// Deduplicated, sorted set of OAuth scopes.
///
/// Platforms disagree on the delimiter used on the wire (`twitter` uses spaces, `facebook`
/// accepts commas), so the set stores bare scope names and renders them through
/// [`join`](Self::join) with the descriptor's delimiter.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeSet {
	scopes: Arc<[String]>,
}
impl ScopeSet {
	/// Creates a normalized scope set from any iterator.
	pub fn new<I, S>(scopes: I) -> Result<Self, ScopeValidationError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut set = BTreeSet::new();

		for scope in scopes {
			let owned: String = scope.into();

			if owned.is_empty() {
				return Err(ScopeValidationError::Empty);
			}
			if owned.chars().any(char::is_whitespace) {
				return Err(ScopeValidationError::ContainsWhitespace { scope: owned });
			}

			set.insert(owned);
		}

		Ok(Self { scopes: Arc::from(set.into_iter().collect::<Vec<_>>()) })
	}

	/// Parses a provider-supplied scope string split on whitespace or `delimiter`.
	///
	/// Empty fragments are skipped because providers routinely emit trailing delimiters.
	pub fn parse_delimited(raw: &str, delimiter: char) -> Result<Self, ScopeValidationError> {
		Self::new(
			raw.split(|c: char| c == delimiter || c.is_whitespace())
				.filter(|s| !s.is_empty())
				.map(str::to_owned),
		)
	}

	/// Number of distinct scopes.
	pub fn len(&self) -> usize {
		self.scopes.len()
	}

	/// Returns true if no scopes are defined.
	pub fn is_empty(&self) -> bool {
		self.scopes.is_empty()
	}

	/// Returns true if the set contains the provided scope.
	pub fn contains(&self, scope: &str) -> bool {
		self.scopes.binary_search_by(|candidate| candidate.as_str().cmp(scope)).is_ok()
	}

	/// Iterator over normalized scopes.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.scopes.iter().map(String::as_str)
	}

	/// Renders the scopes joined by `delimiter`.
	pub fn join(&self, delimiter: char) -> String {
		let mut buf = [0_u8; 4];

		self.scopes.join(&*delimiter.encode_utf8(&mut buf))
	}

	/// Returns the underlying slice of scope strings.
	pub fn as_slice(&self) -> &[String] {
		&self.scopes
	}
}
impl Debug for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ScopeSet").field(&self.scopes).finish()
	}
}
impl Display for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.join(' '))
	}
}
impl FromStr for ScopeSet {
	type Err = ScopeValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.is_empty() {
			return Ok(Self::default());
		}
		if s.chars().all(char::is_whitespace) {
			return Err(ScopeValidationError::Empty);
		}

		Self::new(s.split_whitespace())
	}
}
impl TryFrom<Vec<String>> for ScopeSet {
	type Error = ScopeValidationError;

	fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl Serialize for ScopeSet {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.collect_seq(self.scopes.iter())
	}
}
impl<'de> Deserialize<'de> for ScopeSet {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let values = <Vec<String>>::deserialize(deserializer)?;

		ScopeSet::new(values).map_err(DeError::custom)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn scopes_deduplicate_and_sort() {
		let lhs = ScopeSet::new(["tweet.write", "tweet.read", "tweet.read"])
			.expect("Left-hand scope set should be valid.");
		let rhs = ScopeSet::new(["tweet.read", "tweet.write"])
			.expect("Right-hand scope set should be valid.");

		assert_eq!(lhs, rhs);
		assert_eq!(lhs.len(), 2);
		assert_eq!(lhs.to_string(), "tweet.read tweet.write");
	}

	#[test]
	fn join_uses_platform_delimiter() {
		let scopes = ScopeSet::new(["pages_manage_posts", "pages_read_engagement"])
			.expect("Scope fixture should be valid.");

		assert_eq!(scopes.join(','), "pages_manage_posts,pages_read_engagement");
		assert_eq!(scopes.join(' '), "pages_manage_posts pages_read_engagement");
	}

	#[test]
	fn parse_delimited_accepts_mixed_separators() {
		let scopes = ScopeSet::parse_delimited("email,public_profile, pages_show_list,", ',')
			.expect("Provider scope strings should parse.");

		assert_eq!(scopes.iter().collect::<Vec<_>>(), vec![
			"email",
			"pages_show_list",
			"public_profile"
		]);
	}

	#[test]
	fn invalid_scopes_error() {
		assert!(ScopeSet::new([""]).is_err());
		assert!(matches!(
			ScopeSet::new(["contains space"]),
			Err(ScopeValidationError::ContainsWhitespace { .. })
		));
		assert!(ScopeSet::from_str("").is_ok(), "Empty string represents an empty scope set.");
		assert!(ScopeSet::from_str("   ").is_err(), "Whitespace-only input must be rejected.");
	}

	#[test]
	fn serde_enforces_validation() {
		let scopes: ScopeSet = serde_json::from_str("[\"w_member_social\",\"r_liteprofile\"]")
			.expect("Scope array should deserialize.");

		assert!(scopes.contains("w_member_social"));
		assert!(serde_json::from_str::<ScopeSet>("[\"bad scope\"]").is_err());
		assert_eq!(
			serde_json::to_string(&scopes).expect("Scope set should serialize."),
			"[\"r_liteprofile\",\"w_member_social\"]"
		);
	}
}
