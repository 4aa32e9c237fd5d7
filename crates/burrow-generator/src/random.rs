use crate::Generator;
use burrow_core::base58::ShortCodeBase58;
use burrow_core::ShortCode;

const DEFAULT_BYTES: usize = 6;
const MIN_BYTES: usize = 3;
const MAX_BYTES: usize = 16;

/// Draws short codes from the thread-local RNG and encodes them as base58.
///
/// Six random bytes give 48 bits of entropy and 8-9 character codes.
#[derive(Debug, Clone)]
pub struct RandomGenerator {
    bytes: usize,
}

impl RandomGenerator {
    pub fn new() -> Self {
        Self {
            bytes: DEFAULT_BYTES,
        }
    }

    /// Uses `bytes` random bytes per code, clamped to `3..=16`.
    pub fn with_bytes(bytes: usize) -> Self {
        Self {
            bytes: bytes.clamp(MIN_BYTES, MAX_BYTES),
        }
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for RandomGenerator {
    type Output = ShortCode;

    fn generate(&self) -> ShortCode {
        let buf: [u8; MAX_BYTES] = rand::random();
        ShortCode::generated(ShortCodeBase58::new(&buf[..self.bytes]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn produces_valid_codes() {
        let generator = RandomGenerator::new();

        for _ in 0..100 {
            let code = generator.generate();
            assert!(matches!(code, ShortCode::Generated(_)));
            assert!(ShortCode::new(code.as_str()).is_ok());
        }
    }

    #[test]
    fn codes_are_distinct() {
        let generator = RandomGenerator::new();
        let codes: HashSet<String> = (0..1000)
            .map(|_| generator.generate().as_str().to_owned())
            .collect();

        assert_eq!(codes.len(), 1000);
    }

    #[test]
    fn byte_count_is_clamped() {
        assert_eq!(RandomGenerator::with_bytes(0).bytes, MIN_BYTES);
        assert_eq!(RandomGenerator::with_bytes(64).bytes, MAX_BYTES);
        assert!(ShortCode::new(RandomGenerator::with_bytes(64).generate().as_str()).is_ok());
    }
}
