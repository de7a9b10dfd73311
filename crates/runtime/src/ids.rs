//! Call-id suffix generation.
//!
//! Each engine owns its own generator rather than reaching for hidden
//! global state, so multiple concurrent links stay independent and tests
//! can substitute a deterministic sequence.

use rand::Rng;
use rand::distributions::Alphanumeric;
use std::sync::atomic::{AtomicU64, Ordering};

/// Produces the random trailing segment of a call id.
pub trait CallIdSuffix: Send + Sync {
    fn suffix(&self) -> String;
}

/// Default generator: 8 alphanumeric characters per call.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSuffix;

impl CallIdSuffix for RandomSuffix {
    fn suffix(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect()
    }
}

/// Deterministic generator for tests: `c0000000`, `c0000001`, ...
#[derive(Debug, Default)]
pub struct SequentialSuffix {
    next: AtomicU64,
}

impl CallIdSuffix for SequentialSuffix {
    fn suffix(&self) -> String {
        format!("c{:07}", self.next.fetch_add(1, Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_suffix_shape() {
        let s = RandomSuffix.suffix();
        assert_eq!(s.len(), 8);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn sequential_suffix_increments() {
        let g = SequentialSuffix::default();
        assert_eq!(g.suffix(), "c0000000");
        assert_eq!(g.suffix(), "c0000001");
    }
}
