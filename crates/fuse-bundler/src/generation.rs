//! Build generations.
//!
//! Every rebuild attempt begins a new generation. Work started under an older
//! generation may still finish, but [`BuildGeneration::commit`] refuses to
//! publish it once a newer generation has begun. Beginning a generation waits
//! for an in-flight publish, so a commit never overlaps a newer generation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Generation a piece of work was started under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenerationToken(u64);

impl GenerationToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct BuildGeneration {
    current: AtomicU64,
    /// Held while a generation begins or a commit publishes.
    publish_lock: Mutex<()>,
}

impl BuildGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        match self.publish_lock.lock() {
            Ok(guard) => guard,
            Err(e) => e.into_inner(),
        }
    }

    /// Start a new generation, superseding every earlier token.
    pub fn begin(&self) -> GenerationToken {
        let _guard = self.lock();
        let value = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(generation = value, "build generation started");
        GenerationToken(value)
    }

    pub fn current(&self) -> GenerationToken {
        GenerationToken(self.current.load(Ordering::Acquire))
    }

    pub fn is_current(&self, token: GenerationToken) -> bool {
        self.current.load(Ordering::Acquire) == token.0
    }

    /// Run `publish` only if `token` is still the latest generation. No
    /// generation can begin until `publish` returns. Returns whether it ran.
    pub fn commit(&self, token: GenerationToken, publish: impl FnOnce()) -> bool {
        let _guard = self.lock();
        if !self.is_current(token) {
            debug!(
                generation = token.0,
                current = self.current.load(Ordering::Acquire),
                "discarding superseded build"
            );
            return false;
        }
        publish();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_begin_supersedes_earlier_tokens() {
        let generation = BuildGeneration::new();
        let first = generation.begin();
        let second = generation.begin();
        assert!(second > first);
        assert!(!generation.is_current(first));
        assert!(generation.is_current(second));
        assert_eq!(generation.current(), second);
    }

    #[test]
    fn test_commit_discards_stale_work() {
        let generation = BuildGeneration::new();
        let stale = generation.begin();
        let fresh = generation.begin();
        let mut published = Vec::new();
        assert!(!generation.commit(stale, || published.push(stale.value())));
        assert!(generation.commit(fresh, || published.push(fresh.value())));
        assert_eq!(published, vec![fresh.value()]);
    }

    #[test]
    fn test_begin_waits_for_publish() {
        let generation = Arc::new(BuildGeneration::new());
        let token = generation.begin();
        let mut pending = None;
        let committed = generation.commit(token, || {
            let racing = Arc::clone(&generation);
            pending = Some(std::thread::spawn(move || racing.begin()));
            std::thread::sleep(Duration::from_millis(50));
            assert!(generation.is_current(token));
        });
        assert!(committed);

        let next = pending.unwrap().join().unwrap();
        assert!(next > token);
        assert!(!generation.is_current(token));
    }
}
