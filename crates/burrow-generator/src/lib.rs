pub mod random;
pub mod seq;

use burrow_core::ShortCode;

pub use random::RandomGenerator;
pub use seq::SeqGenerator;

/// Trait for generating short codes.
///
/// Implementations are pure generators that don't interact with storage.
/// Collisions are not retried anywhere, so a generator must carry enough
/// entropy (or ordering) that a collision is a non-event.
pub trait Generator: Send + Sync + 'static {
    type Output: Into<ShortCode>;
    /// Generates a value that can be converted into a short code.
    fn generate(&self) -> Self::Output;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generators_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SeqGenerator>();
        assert_send_sync::<RandomGenerator>();
    }
}
