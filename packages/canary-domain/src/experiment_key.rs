pub const MAX_KEY_CHARS: usize = 128;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyError {
	Empty,
	TooLong,
	InvalidCharacter(char),
}
impl std::fmt::Display for KeyError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Empty => write!(f, "experiment key must be non-empty"),
			Self::TooLong => write!(f, "experiment key must be at most {MAX_KEY_CHARS} characters"),
			Self::InvalidCharacter(ch) =>
				write!(f, "experiment key contains invalid character {ch:?}"),
		}
	}
}

/// Keys are ASCII letters, digits, `_`, `-`, and `.`.
pub fn validate_key(key: &str) -> Result<(), KeyError> {
	if key.is_empty() {
		return Err(KeyError::Empty);
	}
	if key.chars().count() > MAX_KEY_CHARS {
		return Err(KeyError::TooLong);
	}
	if let Some(ch) =
		key.chars().find(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.')))
	{
		return Err(KeyError::InvalidCharacter(ch));
	}

	Ok(())
}
