//! URL shortener facade.
//!
//! [`ShortenerService`] is what an HTTP layer calls: it generates codes,
//! builds short links from the configured base URL, and dispatches to the
//! storage backend chosen at startup.

pub mod service;

pub use service::ShortenerService;
