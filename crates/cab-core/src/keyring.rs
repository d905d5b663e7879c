use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{domain::ApiKey, errors::Error, Result};

/// Round-robin pool of gateway credentials.
///
/// `next()` never fails: the pool is validated non-empty at construction,
/// and rotation is fair round-robin with no health awareness. A key that
/// the remote API rate-limits is still handed out on its next rotation;
/// surfacing that failure is the dispatcher's job.
pub struct KeyRing {
    pool: Vec<ApiKey>,
    cursor: AtomicUsize,
}

impl KeyRing {
    /// Build a ring from raw secrets, trimming empties.
    ///
    /// An empty pool is a fatal configuration error, not a runtime one.
    pub fn new(secrets: Vec<String>) -> Result<Self> {
        let pool: Vec<ApiKey> = secrets
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .enumerate()
            .map(|(index, secret)| ApiKey { secret, index })
            .collect();

        if pool.is_empty() {
            return Err(Error::Config(
                "at least one gateway API key is required".to_string(),
            ));
        }

        Ok(Self {
            pool,
            cursor: AtomicUsize::new(0),
        })
    }

    /// The i-th completed call (1-indexed, ordered by the atomic increment)
    /// returns `pool[(i - 1) % len]`.
    pub fn next(&self) -> ApiKey {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.pool[i % self.pool.len()].clone()
    }

    pub fn size(&self) -> usize {
        self.pool.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn ring(n: usize) -> KeyRing {
        KeyRing::new((0..n).map(|i| format!("key-{i}")).collect()).unwrap()
    }

    #[test]
    fn empty_pool_is_a_config_error() {
        assert!(matches!(
            KeyRing::new(vec![]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            KeyRing::new(vec!["  ".to_string(), String::new()]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn blank_secrets_are_dropped_before_indexing() {
        let ring = KeyRing::new(vec![
            " a ".to_string(),
            String::new(),
            "b".to_string(),
        ])
        .unwrap();
        assert_eq!(ring.size(), 2);
        assert_eq!(ring.next(), ApiKey { secret: "a".to_string(), index: 0 });
        assert_eq!(ring.next(), ApiKey { secret: "b".to_string(), index: 1 });
    }

    #[test]
    fn sequential_rotation_is_round_robin() {
        let ring = ring(3);
        let got: Vec<usize> = (0..7).map(|_| ring.next().index).collect();
        assert_eq!(got, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn concurrent_rotation_keeps_the_round_robin_multiset() {
        let ring = Arc::new(ring(3));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ring = ring.clone();
            handles.push(std::thread::spawn(move || {
                (0..30).map(|_| ring.next().index).collect::<Vec<_>>()
            }));
        }

        let mut counts: HashMap<usize, usize> = HashMap::new();
        for h in handles {
            for idx in h.join().unwrap() {
                *counts.entry(idx).or_default() += 1;
            }
        }

        // 240 calls over 3 keys: exactly 80 each under any interleaving.
        assert_eq!(counts.len(), 3);
        for idx in 0..3 {
            assert_eq!(counts[&idx], 80);
        }
    }
}
