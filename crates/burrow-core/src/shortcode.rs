use crate::base58::ShortCodeBase58;
use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::hash::{Hash, Hasher};

/// A validated short code identifier for a shortened URL.
///
/// Short codes must be 3-32 characters long and contain only
/// alphanumeric characters, hyphens, or underscores.
///
/// Two codes are equal when their text is equal, whichever variant they
/// are. A generated code read back from storage comes back as `Custom`.
/// On the wire a code is a plain string, validated on the way in.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ShortCode {
    /// A system-generated short code (e.g. from random bytes).
    Generated(ShortCodeBase58),
    /// A code supplied from outside, or read back from storage.
    Custom(String),
}

const MIN_LENGTH: usize = 3;
const MAX_LENGTH: usize = 32;

impl ShortCode {
    /// Creates a `ShortCode` from a value that can be converted into [`ShortCodeBase58`].
    pub fn generated(code: impl Into<ShortCodeBase58>) -> Self {
        Self::Generated(code.into())
    }

    /// Creates a new `ShortCode` after validating the input.
    ///
    /// Valid codes are 3-32 characters and contain only `[a-zA-Z0-9_-]`.
    pub fn new(code: impl Into<String>) -> std::result::Result<Self, CoreError> {
        let code = code.into();
        Self::validate(&code)?;
        Ok(Self::Custom(code))
    }

    /// Creates a `ShortCode` without validation.
    ///
    /// Use this only for codes produced by trusted internal sources
    /// (e.g. generators that are guaranteed to produce valid output).
    pub fn new_unchecked(code: impl Into<String>) -> Self {
        Self::Custom(code.into())
    }

    /// Generates the full shortened URL based on the provided base URL.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self)
    }

    /// Returns the short code as a string slice.
    pub fn as_str(&self) -> &str {
        match self {
            ShortCode::Generated(code) => code.as_str(),
            ShortCode::Custom(s) => s.as_str(),
        }
    }

    fn validate(code: &str) -> std::result::Result<(), CoreError> {
        if code.len() < MIN_LENGTH || code.len() > MAX_LENGTH {
            return Err(CoreError::InvalidShortCode(format!(
                "length must be between {} and {}, got {}",
                MIN_LENGTH,
                MAX_LENGTH,
                code.len()
            )));
        }

        if !code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CoreError::InvalidShortCode(format!(
                "must contain only alphanumeric characters, hyphens, or underscores: '{}'",
                code
            )));
        }

        Ok(())
    }
}

impl PartialEq for ShortCode {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for ShortCode {}

impl Hash for ShortCode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl TryFrom<String> for ShortCode {
    type Error = CoreError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ShortCode> for String {
    fn from(value: ShortCode) -> Self {
        match value {
            ShortCode::Generated(code) => code.as_str().to_owned(),
            ShortCode::Custom(s) => s,
        }
    }
}

impl Display for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShortCode::Generated(code) => write!(f, "{}", code),
            ShortCode::Custom(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_codes() {
        assert!(ShortCode::new("abc").is_ok());
        assert!(ShortCode::new("Abc-123_xyz").is_ok());
        assert!(ShortCode::new("a".repeat(32)).is_ok());
    }

    #[test]
    fn too_short() {
        assert!(ShortCode::new("ab").is_err());
        assert!(ShortCode::new("").is_err());
    }

    #[test]
    fn too_long() {
        assert!(ShortCode::new("a".repeat(33)).is_err());
    }

    #[test]
    fn invalid_characters() {
        assert!(ShortCode::new("abc def").is_err());
        assert!(ShortCode::new("abc/def").is_err());
        assert!(ShortCode::new("abc!def").is_err());
    }

    #[test]
    fn display_generated() {
        let code = ShortCode::generated(ShortCodeBase58::new([1, 2, 3, 4, 5, 6]));
        assert!(!code.to_string().is_empty());
        assert_eq!(code.to_string(), code.as_str());
    }

    #[test]
    fn generated_and_custom_with_same_text_share_the_key() {
        use std::collections::HashSet;

        let generated = ShortCode::generated(ShortCodeBase58::new([1, 2, 3, 4, 5, 6]));
        let custom = ShortCode::new_unchecked(generated.as_str());
        assert_eq!(generated, custom);

        let keys: HashSet<ShortCode> = [generated, custom].into_iter().collect();
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn different_text_is_not_equal() {
        assert_ne!(
            ShortCode::new_unchecked("abc123"),
            ShortCode::new_unchecked("abc124")
        );
    }

    #[test]
    fn serializes_as_plain_string() {
        let generated = ShortCode::generated(ShortCodeBase58::new([1, 2, 3, 4, 5, 6]));
        let json = serde_json::to_string(&generated).unwrap();
        assert_eq!(json, format!("\"{}\"", generated.as_str()));

        let back: ShortCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, generated);
    }

    #[test]
    fn deserialize_goes_through_validation() {
        assert!(serde_json::from_str::<ShortCode>("\"ab\"").is_err());
        assert!(serde_json::from_str::<ShortCode>("\"abc/def\"").is_err());
        assert_eq!(
            serde_json::from_str::<ShortCode>("\"abc123\"").unwrap(),
            ShortCode::new_unchecked("abc123")
        );
    }

    #[test]
    fn to_url_trims_trailing_slash() {
        let code = ShortCode::new("abc123").unwrap();
        assert_eq!(
            code.to_url("http://localhost:8080"),
            "http://localhost:8080/abc123"
        );
        assert_eq!(
            code.to_url("http://localhost:8080/"),
            "http://localhost:8080/abc123"
        );
    }
}
