//! Strongly typed identifiers used in claims, records, and store keys.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

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
				validate_view($kind, &value)?;

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
	};
}

def_id!(UserId, "Identifier of an authenticated identity.", "user");
def_id!(ResourceId, "Identifier of a cacheable or deletable resource.", "resource");

/// Validation failures for identifier values.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum IdentifierError {
	/// Value was empty.
	#[error("{kind} identifier must not be empty.")]
	Empty {
		/// Identifier kind label.
		kind: &'static str,
	},
	/// Value exceeded the maximum supported length.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Identifier kind label.
		kind: &'static str,
		/// Maximum accepted length.
		max: usize,
	},
	/// Value contained a character that cannot appear in a store key.
	#[error("{kind} identifier contains the forbidden character {character:?}.")]
	ForbiddenCharacter {
		/// Identifier kind label.
		kind: &'static str,
		/// Offending character.
		character: char,
	},
}

const MAX_ID_LEN: usize = 128;

// Identifiers embed into colon-separated store keys, so the separator and
// whitespace/control characters are rejected at construction.
fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.len() > MAX_ID_LEN {
		return Err(IdentifierError::TooLong { kind, max: MAX_ID_LEN });
	}
	if let Some(character) =
		view.chars().find(|c| *c == ':' || c.is_whitespace() || c.is_control())
	{
		return Err(IdentifierError::ForbiddenCharacter { kind, character });
	}

	Ok(())
}
