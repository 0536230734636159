//! Validated identifiers for platforms and the users connected to them.
//!
//! A [`PlatformId`] doubles as a storage key prefix, an environment variable prefix and a
//! metrics label, so it is restricted to a lowercase slug. A [`UserId`] is the host
//! application's opaque account reference and only has to be printable and bounded.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

/// Declares a `String` newtype checked by `$validate` on every construction path, including
/// deserialization.
macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal, $validate:path) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				$validate(view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				$validate(&value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const PLATFORM_MAX_LEN: usize = 64;
const USER_MAX_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (user, platform).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (user, platform).
		kind: &'static str,
	},
	/// The identifier contains a character outside its alphabet.
	#[error("{kind} identifier contains the disallowed character {character:?}.")]
	InvalidCharacter {
		/// Kind of identifier (user, platform).
		kind: &'static str,
		/// First offending character.
		character: char,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (user, platform).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! {
	UserId,
	"Host application's reference to the account on whose behalf credentials are held.",
	"User",
	validate_user
}
def_id! {
	PlatformId,
	"Lowercase slug naming a platform descriptor (for example `twitter` or `google-business`).",
	"Platform",
	validate_platform
}

fn validate_user(view: &str) -> Result<(), IdentifierError> {
	const KIND: &str = "User";

	validate_common(KIND, view, USER_MAX_LEN)?;

	if let Some(character) = view.chars().find(|c| c.is_control()) {
		return Err(IdentifierError::InvalidCharacter { kind: KIND, character });
	}

	Ok(())
}

fn validate_platform(view: &str) -> Result<(), IdentifierError> {
	const KIND: &str = "Platform";

	validate_common(KIND, view, PLATFORM_MAX_LEN)?;

	if let Some(character) = view
		.chars()
		.find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_')))
	{
		return Err(IdentifierError::InvalidCharacter { kind: KIND, character });
	}

	Ok(())
}

fn validate_common(kind: &'static str, view: &str, max: usize) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.chars().count() > max {
		return Err(IdentifierError::TooLong { kind, max });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_reject_padding_and_empty_values() {
		assert!(UserId::new(" u1").is_err(), "Leading whitespace must be rejected.");
		assert!(UserId::new("u1 ").is_err(), "Trailing whitespace must be rejected.");
		assert!(UserId::new("").is_err());
		assert!(PlatformId::new("with space").is_err());

		let user = UserId::new("u1").expect("User fixture should be considered valid.");

		assert_eq!(user.as_ref(), "u1");
		assert_eq!(format!("{user:?}"), "User(u1)");
	}

	#[test]
	fn deserialization_enforces_validation() {
		let platform: PlatformId =
			serde_json::from_str("\"twitter\"").expect("Platform should deserialize successfully.");

		assert_eq!(platform.to_string(), "twitter");
		assert!(serde_json::from_str::<PlatformId>("\"\"").is_err());
		assert!(serde_json::from_str::<UserId>("\" u1\"").is_err());
	}

	#[test]
	fn unicode_whitespace_and_length_limits() {
		let nbsp = format!("user{}id", '\u{00A0}');

		assert!(UserId::new(&nbsp).is_err());

		UserId::new("a".repeat(USER_MAX_LEN)).expect("Exact length should succeed.");

		let err = UserId::new("a".repeat(USER_MAX_LEN + 1))
			.expect_err("Overlong identifiers must be rejected.");

		assert_eq!(err, IdentifierError::TooLong { kind: "User", max: USER_MAX_LEN });
		assert!(PlatformId::new("p".repeat(PLATFORM_MAX_LEN + 1)).is_err());
	}

	#[test]
	fn platform_ids_are_lowercase_slugs() {
		PlatformId::new("google-business").expect("Hyphenated slug should be valid.");
		PlatformId::new("x_v2").expect("Underscored slug should be valid.");

		assert_eq!(
			PlatformId::new("Twitter"),
			Err(IdentifierError::InvalidCharacter { kind: "Platform", character: 'T' })
		);
		assert_eq!(
			PlatformId::new("acme:evil"),
			Err(IdentifierError::InvalidCharacter { kind: "Platform", character: ':' })
		);
		assert!(serde_json::from_str::<PlatformId>("\"LinkedIn\"").is_err());
	}

	#[test]
	fn user_ids_accept_opaque_references_but_not_control_characters() {
		UserId::new("acct:42@example.com").expect("Opaque account references should be valid.");
		UserId::new("Ünïcode-用户").expect("Non-ASCII user identifiers should be valid.");

		assert_eq!(
			UserId::new("u1\u{0007}"),
			Err(IdentifierError::InvalidCharacter { kind: "User", character: '\u{0007}' })
		);
	}

	#[test]
	fn borrow_supports_str_lookup() {
		let map: HashMap<PlatformId, u32> = HashMap::from_iter([(
			PlatformId::new("linkedin").expect("Platform used for lookup should be valid."),
			100_u32,
		)]);

		assert_eq!(map.get("linkedin"), Some(&100));
	}
}
