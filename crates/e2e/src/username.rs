//! Unique usernames for created test users
//!
//! Usernames look like `user_<millis>_<suffix>` with a random suffix in
//! `0..10000`. The millisecond component never repeats within a generator:
//! when the clock has not advanced since the previous call it is bumped by
//! one, so two calls cannot collide even inside the same millisecond.

use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;

const SUFFIX_SPACE: u32 = 10_000;

static GLOBAL: Lazy<UsernameGenerator> = Lazy::new(UsernameGenerator::new);

static PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^user_\d+_\d+$").expect("username pattern is valid"));

type Clock = Box<dyn Fn() -> u64 + Send + Sync>;

pub struct UsernameGenerator {
    clock: Clock,
    rng: Mutex<StdRng>,
    last_millis: AtomicU64,
}

impl UsernameGenerator {
    /// Generator backed by the wall clock and an entropy-seeded RNG
    pub fn new() -> Self {
        Self::with_source(
            || chrono::Utc::now().timestamp_millis().max(0) as u64,
            StdRng::from_entropy(),
        )
    }

    /// Generator with an explicit clock and RNG
    pub fn with_source<F>(clock: F, rng: StdRng) -> Self
    where
        F: Fn() -> u64 + Send + Sync + 'static,
    {
        Self {
            clock: Box::new(clock),
            rng: Mutex::new(rng),
            last_millis: AtomicU64::new(0),
        }
    }

    /// The process-wide generator used by page objects by default
    pub fn global() -> &'static UsernameGenerator {
        &GLOBAL
    }

    pub fn generate(&self) -> String {
        let now = (self.clock)();
        let prev = self
            .last_millis
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        let millis = now.max(prev + 1);
        let suffix = self.rng.lock().gen_range(0..SUFFIX_SPACE);

        format!("user_{}_{}", millis, suffix)
    }
}

impl Default for UsernameGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UsernameGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsernameGenerator")
            .field("last_millis", &self.last_millis.load(Ordering::Relaxed))
            .finish()
    }
}

/// Whether `s` has the shape of a generated username
pub fn is_generated_username(s: &str) -> bool {
    PATTERN.is_match(s)
}
