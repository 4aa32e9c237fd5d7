use crate::error::CoreError;
use crate::shortcode::ShortCode;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use typed_builder::TypedBuilder;

/// Identifies the user that owns a record.
///
/// Always non-empty. Anonymous writes are modelled as `Option<OwnerId>::None`
/// rather than an empty owner.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> std::result::Result<Self, CoreError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CoreError::InvalidOwner("owner id cannot be empty".to_string()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for OwnerId {
    type Error = CoreError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<OwnerId> for String {
    fn from(value: OwnerId) -> Self {
        value.0
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A URL mapping as handed to a backend for insertion.
#[derive(Debug, Clone, PartialEq, TypedBuilder)]
pub struct Record {
    /// The identifier used as the redirect key.
    pub short_code: ShortCode,
    /// The original URL that was shortened. Unique within a backend.
    #[builder(setter(into))]
    pub original_url: String,
    /// The full short link (`{base_url}/{short_code}`).
    #[builder(setter(into))]
    pub short_url: String,
    /// The user that created the record, `None` for anonymous writes.
    #[builder(default)]
    pub owner: Option<OwnerId>,
    /// Soft-delete flag. Flips false -> true only, via the delete pipeline.
    #[builder(default = false)]
    pub deleted: bool,
    /// Only used to pair batch requests with batch responses. Never persisted.
    #[builder(default)]
    pub correlation_id: Option<String>,
}

/// A record as read back from a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredLink {
    pub short_code: ShortCode,
    pub original_url: String,
    pub short_url: String,
    pub owner: Option<OwnerId>,
    pub deleted: bool,
}

/// Outcome of resolving a short code for a redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The code maps to a live record.
    Found(String),
    /// The code exists but the record has been soft-deleted.
    Gone,
    /// Nothing is stored under the code.
    Missing,
}

/// Lookup key for [`Storage::get`](crate::storage::Storage::get).
///
/// A record matches when its short code equals `code` OR its original URL
/// equals `original_url`. An empty side never matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lookup {
    pub code: Option<ShortCode>,
    pub original_url: Option<String>,
}

impl Lookup {
    pub fn by_code(code: ShortCode) -> Self {
        Self {
            code: Some(code),
            original_url: None,
        }
    }

    pub fn by_url(original_url: impl Into<String>) -> Self {
        Self {
            code: None,
            original_url: Some(original_url.into()),
        }
    }

    pub fn either(code: ShortCode, original_url: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            original_url: Some(original_url.into()),
        }
    }

    /// The short code side, with empty strings treated as absent.
    pub fn code_str(&self) -> Option<&str> {
        self.code.as_ref().map(ShortCode::as_str).filter(|s| !s.is_empty())
    }

    /// The URL side, with empty strings treated as absent.
    pub fn url_str(&self) -> Option<&str> {
        self.original_url.as_deref().filter(|s| !s.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.code_str().is_none() && self.url_str().is_none()
    }

    /// Picks the row this lookup resolves to: a code match first, then a
    /// URL match. `key` yields the `(code, url)` pair of a row.
    pub fn pick<'a, T>(&self, rows: &'a [T], key: impl Fn(&T) -> (&str, &str)) -> Option<&'a T> {
        let by_code = self
            .code_str()
            .and_then(|code| rows.iter().find(|&row| key(row).0 == code));

        by_code.or_else(|| {
            self.url_str()
                .and_then(|url| rows.iter().find(|&row| key(row).1 == url))
        })
    }
}

impl Display for Lookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code_str(), self.url_str()) {
            (Some(code), Some(url)) => write!(f, "code '{code}' or url '{url}'"),
            (Some(code), None) => write!(f, "code '{code}'"),
            (None, Some(url)) => write!(f, "url '{url}'"),
            (None, None) => f.write_str("an empty lookup"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_rejects_blank() {
        assert!(OwnerId::new("").is_err());
        assert!(OwnerId::new("  ").is_err());
        assert_eq!(OwnerId::new("42").unwrap().as_str(), "42");
    }

    #[test]
    fn owner_deserialize_goes_through_validation() {
        let owner: OwnerId = serde_json::from_str("\"user-1\"").unwrap();
        assert_eq!(owner.as_str(), "user-1");
        assert!(serde_json::from_str::<OwnerId>("\"\"").is_err());
    }

    #[test]
    fn record_builder_defaults() {
        let record = Record::builder()
            .short_code(ShortCode::new_unchecked("abc123"))
            .original_url("https://a.example")
            .short_url("http://localhost:8080/abc123")
            .build();

        assert!(!record.deleted);
        assert!(record.owner.is_none());
        assert!(record.correlation_id.is_none());
    }

    fn rows() -> Vec<(&'static str, &'static str)> {
        vec![
            ("aaa111", "https://b.example"),
            ("bbb222", "https://a.example"),
        ]
    }

    #[test]
    fn lookup_prefers_code_over_url() {
        let rows = rows();
        let lookup = Lookup::either(ShortCode::new_unchecked("bbb222"), "https://b.example");

        assert_eq!(lookup.pick(&rows, |r| (r.0, r.1)), Some(&rows[1]));
    }

    #[test]
    fn lookup_falls_back_to_url() {
        let rows = rows();
        let lookup = Lookup::either(ShortCode::new_unchecked("zzz999"), "https://b.example");
        assert_eq!(lookup.pick(&rows, |r| (r.0, r.1)), Some(&rows[0]));

        let lookup = Lookup::either(ShortCode::new_unchecked("zzz999"), "https://z.example");
        assert_eq!(lookup.pick(&rows, |r| (r.0, r.1)), None);
    }

    #[test]
    fn empty_sides_never_match() {
        let rows = vec![("", "")];
        let lookup = Lookup::by_url("");
        assert!(lookup.is_empty());
        assert_eq!(lookup.pick(&rows, |r| (r.0, r.1)), None);

        let rows = self::rows();
        assert_eq!(Lookup::default().pick(&rows, |r| (r.0, r.1)), None);
    }
}
