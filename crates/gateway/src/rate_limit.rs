use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

const MAX_TRACKED_KEYS: usize = 16_384;

/// Sliding-window limiter for login attempts, keyed by normalized email.
#[derive(Clone)]
pub struct LoginRateLimiter {
    attempts: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    window: Duration,
    limit: u32,
    max_keys: usize,
}

impl LoginRateLimiter {
    /// A `limit` of zero disables limiting.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self::with_max_keys(limit, window, MAX_TRACKED_KEYS)
    }

    /// Never tracks more than `max_keys` emails at once.
    pub fn with_max_keys(limit: u32, window: Duration, max_keys: usize) -> Self {
        Self {
            attempts: Arc::new(Mutex::new(HashMap::new())),
            window,
            limit,
            max_keys: max_keys.max(1),
        }
    }

    pub fn key_for(email: &str) -> String {
        format!("login:{}", email.trim().to_lowercase())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        match self.attempts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Records an attempt; `false` once the window is full.
    pub fn allow(&self, key: &str) -> bool {
        if self.limit == 0 {
            return true;
        }

        let now = Instant::now();
        let mut attempts = self.lock();

        let queue = attempts.entry(key.to_string()).or_default();
        prune(queue, now, self.window);
        if queue.len() >= self.limit as usize {
            return false;
        }
        queue.push_back(now);

        if attempts.len() > self.max_keys {
            evict(&mut attempts, key, now, self.window, self.max_keys);
        }

        true
    }

    pub fn tracked_keys(&self) -> usize {
        self.lock().len()
    }

    /// Forgets earlier attempts after a successful sign-in.
    pub fn reset(&self, key: &str) {
        self.lock().remove(key);
    }
}

/// Drops idle keys, then the least recently used ones, down to three
/// quarters of `max_keys` so the sweep runs once per batch of new keys.
fn evict(
    attempts: &mut HashMap<String, VecDeque<Instant>>,
    current: &str,
    now: Instant,
    window: Duration,
    max_keys: usize,
) {
    attempts.retain(|_, events| {
        prune(events, now, window);
        !events.is_empty()
    });

    let low_water = (max_keys - max_keys / 4).max(1);
    if attempts.len() <= low_water {
        return;
    }

    let mut by_age = attempts
        .iter()
        .filter(|(key, _)| key.as_str() != current)
        .filter_map(|(key, events)| events.back().map(|last| (*last, key.clone())))
        .collect::<Vec<_>>();
    by_age.sort_unstable_by_key(|(last, _)| *last);

    let overflow = attempts.len() - low_water;
    for (_, key) in by_age.into_iter().take(overflow) {
        attempts.remove(&key);
    }
}

fn prune(queue: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while queue
        .front()
        .is_some_and(|front| now.duration_since(*front) > window)
    {
        queue.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn rejects_once_the_window_is_full() {
        let limiter = LoginRateLimiter::new(2, Duration::from_secs(60));
        let key = LoginRateLimiter::key_for("Admin@Kemenkeu.go.id");
        assert!(limiter.allow(&key));
        assert!(limiter.allow(&key));
        assert!(!limiter.allow(&key));
        assert!(limiter.allow(&LoginRateLimiter::key_for("staf@kemenkeu.go.id")));
    }

    #[test]
    fn allows_again_after_window_or_reset() {
        let limiter = LoginRateLimiter::new(1, Duration::from_millis(5));
        assert!(limiter.allow("k"));
        assert!(!limiter.allow("k"));
        thread::sleep(Duration::from_millis(10));
        assert!(limiter.allow("k"));

        limiter.reset("k");
        assert!(limiter.allow("k"));
    }

    #[test]
    fn zero_limit_disables() {
        let limiter = LoginRateLimiter::new(0, Duration::from_secs(60));
        for _ in 0..100 {
            assert!(limiter.allow("k"));
        }
    }

    #[test]
    fn tracked_keys_stay_bounded_under_distinct_emails() {
        let limiter = LoginRateLimiter::with_max_keys(10, Duration::from_secs(60), 64);
        for idx in 0..1_000 {
            let key = LoginRateLimiter::key_for(&format!("user{}@kemenkeu.go.id", idx));
            assert!(limiter.allow(&key));
            assert!(limiter.tracked_keys() <= 64, "tracked {}", limiter.tracked_keys());
        }
    }

    #[test]
    fn default_cap_holds_for_a_flood_of_emails() {
        let limiter = LoginRateLimiter::new(10, Duration::from_secs(60));
        for idx in 0..(MAX_TRACKED_KEYS * 2) {
            limiter.allow(&format!("login:flood{}@example.com", idx));
        }
        assert!(limiter.tracked_keys() <= MAX_TRACKED_KEYS);
    }

    #[test]
    fn eviction_keeps_the_key_that_triggered_it() {
        let limiter = LoginRateLimiter::with_max_keys(1, Duration::from_secs(60), 4);
        assert!(limiter.allow("login:target"));
        for idx in 0..3 {
            assert!(limiter.allow(&format!("login:other{}", idx)));
        }
        assert!(limiter.allow("login:fresh"));
        assert!(!limiter.allow("login:fresh"));
        assert!(limiter.tracked_keys() <= 4);
    }

    #[test]
    fn keys_are_case_and_space_insensitive() {
        assert_eq!(
            LoginRateLimiter::key_for(" A@B.C "),
            LoginRateLimiter::key_for("a@b.c")
        );
    }
}
