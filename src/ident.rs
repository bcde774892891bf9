//! Random identifier generation
//!
//! Produces fixed-length lowercase hex names for stored uploads. The names
//! avoid collisions through entropy alone (128 bits), they are not secrets.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::sync::{Mutex, PoisonError};

/// Symbols an identifier is drawn from
pub const ID_ALPHABET: &[u8; 16] = b"0123456789abcdef";

/// Number of symbols in every identifier
pub const ID_LENGTH: usize = 32;

/// Shared generator of random hexadecimal identifiers
///
/// The random source is owned by the generator and guarded by a mutex, so a
/// single instance can be handed to every upload handler and used from
/// concurrent requests.
pub struct IdGenerator<R = StdRng> {
    rng: Mutex<R>,
}

impl IdGenerator<StdRng> {
    /// Create a generator seeded from the operating system
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }
}

impl Default for IdGenerator<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RngCore> IdGenerator<R> {
    /// Create a generator over an explicit random source
    ///
    /// # Examples
    /// ```
    /// use rand::{rngs::StdRng, SeedableRng};
    /// use upserve::ident::{IdGenerator, ID_LENGTH};
    ///
    /// let ids = IdGenerator::with_rng(StdRng::seed_from_u64(7));
    /// assert_eq!(ids.generate().len(), ID_LENGTH);
    /// ```
    pub const fn with_rng(rng: R) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }

    /// Generate a new identifier
    pub fn generate(&self) -> String {
        // A poisoned rng is still a valid rng
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        (0..ID_LENGTH)
            .map(|_| char::from(ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn seeded() -> IdGenerator {
        IdGenerator::with_rng(StdRng::seed_from_u64(0x5eed))
    }

    #[test]
    fn test_identifier_shape() {
        let ids = seeded();
        for _ in 0..1_000 {
            let id = ids.generate();
            assert_eq!(id.len(), ID_LENGTH);
            assert!(id.bytes().all(|b| ID_ALPHABET.contains(&b)), "bad id: {id}");
        }
    }

    #[test]
    fn test_os_seeded_shape() {
        let id = IdGenerator::new().generate();
        assert_eq!(id.len(), ID_LENGTH);
        assert!(id.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let a = seeded();
        let b = seeded();
        for _ in 0..10 {
            assert_eq!(a.generate(), b.generate());
        }
    }

    #[test]
    fn test_no_duplicates_and_uniform_symbols() {
        let ids = seeded();
        let mut seen = HashSet::new();
        let mut counts = [0usize; 16];

        for _ in 0..10_000 {
            let id = ids.generate();
            for b in id.bytes() {
                let idx = ID_ALPHABET.iter().position(|&c| c == b).unwrap();
                counts[idx] += 1;
            }
            seen.insert(id);
        }

        assert_eq!(seen.len(), 10_000);

        // 320_000 symbols, 20_000 expected per bucket; 5% is many sigmas wide.
        for (idx, count) in counts.iter().enumerate() {
            assert!(
                (19_000..=21_000).contains(count),
                "symbol {} appeared {count} times",
                char::from(ID_ALPHABET[idx])
            );
        }
    }

    #[test]
    fn test_concurrent_generation() {
        let ids = Arc::new(seeded());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..500).map(|_| ids.generate()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate identifier across threads");
            }
        }
        assert_eq!(seen.len(), 4_000);
    }
}
