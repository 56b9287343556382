//! Outbound message rate limiting.
//!
//! Every rate-limited send takes one slot, which is given back after
//! [`RateLimit::release`]. The number of slots is the moderator ceiling
//! if the bot is a moderator in every joined channel, and the user ceiling
//! otherwise.

use super::channel::Channels;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Rate limit settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct RateLimit {
  /// Maximum outstanding messages while not a moderator everywhere.
  pub user: u32,
  /// Maximum outstanding messages while a moderator in every joined channel.
  pub moderator: u32,
  /// How long a sent message counts against the limit.
  pub release: Duration,
}

impl Default for RateLimit {
  fn default() -> Self {
    Self {
      user: 20,
      moderator: 100,
      release: Duration::from_secs(20),
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
  /// The ceiling is configured as `0`, nothing could ever be sent.
  #[error("rate limit ceiling is zero")]
  ZeroCeiling,

  /// The bot is shutting down.
  #[error("rate limiter closed")]
  Closed,
}

/// Counts outstanding messages and holds back senders at the ceiling.
///
/// Cheap to clone, all clones share the same count.
#[derive(Clone)]
pub struct RateLimiter(Arc<Inner>);

struct Inner {
  limits: RateLimit,
  count: Mutex<u32>,
  released: Notify,
  channels: Channels,
  tasks: TaskTracker,
  stop: CancellationToken,
}

impl RateLimiter {
  /// Deferred releases are spawned on `tasks` and abandoned once `stop` is cancelled.
  pub fn new(
    limits: RateLimit,
    channels: Channels,
    tasks: TaskTracker,
    stop: CancellationToken,
  ) -> Self {
    Self(Arc::new(Inner {
      limits,
      count: Mutex::new(0),
      released: Notify::new(),
      channels,
      tasks,
      stop,
    }))
  }

  /// Number of messages currently counted against the limit.
  pub fn count(&self) -> u32 {
    *self.0.count.lock()
  }

  /// The current ceiling.
  pub fn ceiling(&self) -> u32 {
    self.0.ceiling()
  }

  pub fn limits(&self) -> RateLimit {
    self.0.limits
  }

  /// Take a slot, waiting until one is free.
  ///
  /// The slot is given back automatically after [`RateLimit::release`].
  pub async fn acquire(&self) -> Result<(), RateLimitError> {
    loop {
      let released = self.0.released.notified();
      tokio::pin!(released);
      released.as_mut().enable();

      if self.0.stop.is_cancelled() {
        return Err(RateLimitError::Closed);
      }

      {
        let mut count = self.0.count.lock();
        let ceiling = self.0.ceiling();
        if ceiling == 0 {
          return Err(RateLimitError::ZeroCeiling);
        }
        if *count < ceiling {
          *count += 1;
          drop(count);
          self.schedule_release();
          return Ok(());
        }
        trace!(count = *count, ceiling, "rate limited");
      }

      tokio::select! {
        _ = &mut released => {}
        _ = self.0.stop.cancelled() => return Err(RateLimitError::Closed),
      }
    }
  }

  /// Wake every waiter so it re-reads the ceiling.
  ///
  /// Call after the bot's moderator status changed.
  pub fn ceiling_changed(&self) {
    self.0.released.notify_waiters();
  }

  fn schedule_release(&self) {
    let inner = self.0.clone();
    self.0.tasks.spawn(async move {
      tokio::select! {
        _ = tokio::time::sleep(inner.limits.release) => {
          {
            let mut count = inner.count.lock();
            *count = count.saturating_sub(1);
          }
          inner.released.notify_one();
        }
        _ = inner.stop.cancelled() => {}
      }
    });
  }
}

impl Inner {
  fn ceiling(&self) -> u32 {
    if self.channels.all_moderated() {
      self.limits.moderator
    } else {
      self.limits.user
    }
  }
}

impl std::fmt::Debug for RateLimiter {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RateLimiter")
      .field("limits", &self.0.limits)
      .field("count", &self.count())
      .finish_non_exhaustive()
  }
}

static_assert_send!(RateLimiter);
static_assert_sync!(RateLimiter);

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use tokio::time::Instant;

  fn limiter(limits: RateLimit, channels: &Channels) -> (RateLimiter, TaskTracker, CancellationToken) {
    let tasks = TaskTracker::new();
    let stop = CancellationToken::new();
    let limiter = RateLimiter::new(limits, channels.clone(), tasks.clone(), stop.clone());
    (limiter, tasks, stop)
  }

  fn small() -> RateLimit {
    RateLimit {
      user: 2,
      moderator: 4,
      release: Duration::from_secs(20),
    }
  }

  #[tokio::test(start_paused = true)]
  async fn slots_are_released_after_delay() {
    let channels = Channels::new();
    channels.insert("forsen");
    let (limiter, _, _) = limiter(RateLimit::default(), &channels);

    limiter.acquire().await.unwrap();
    limiter.acquire().await.unwrap();
    assert_eq!(limiter.count(), 2);

    tokio::time::sleep(Duration::from_secs(19)).await;
    assert_eq!(limiter.count(), 2);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(limiter.count(), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn waits_at_ceiling() {
    let channels = Channels::new();
    channels.insert("forsen");
    let (limiter, _, _) = limiter(small(), &channels);

    limiter.acquire().await.unwrap();
    limiter.acquire().await.unwrap();
    assert_eq!(limiter.count(), limiter.ceiling());

    let start = Instant::now();
    limiter.acquire().await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(20));
    assert!(limiter.count() <= limiter.ceiling());
  }

  #[tokio::test(start_paused = true)]
  async fn ceiling_follows_moderator_status() {
    let channels = Channels::new();
    let (limiter, _, _) = limiter(small(), &channels);
    assert_eq!(limiter.ceiling(), 4);

    channels.insert("forsen");
    channels.insert("pajlada");
    assert_eq!(limiter.ceiling(), 2);

    channels.set_moderator("forsen", true);
    assert_eq!(limiter.ceiling(), 2);
    channels.set_moderator("pajlada", true);
    assert_eq!(limiter.ceiling(), 4);
  }

  #[tokio::test(start_paused = true)]
  async fn raised_ceiling_wakes_waiters() {
    let channels = Channels::new();
    channels.insert("forsen");
    let (limiter, _, _) = limiter(small(), &channels);
    limiter.acquire().await.unwrap();
    limiter.acquire().await.unwrap();

    let pending = tokio::spawn({
      let limiter = limiter.clone();
      async move { limiter.acquire().await }
    });
    tokio::task::yield_now().await;

    let start = Instant::now();
    channels.set_moderator("forsen", true);
    limiter.ceiling_changed();
    pending.await.unwrap().unwrap();
    assert!(start.elapsed() < Duration::from_secs(20));
    assert_eq!(limiter.count(), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn concurrent_callers_never_exceed_ceiling() {
    let channels = Channels::new();
    channels.insert("forsen");
    let (limiter, _, _) = limiter(small(), &channels);
    let acquired = Arc::new(AtomicU32::new(0));

    let callers: Vec<_> = (0..5)
      .map(|_| {
        let limiter = limiter.clone();
        let acquired = acquired.clone();
        tokio::spawn(async move {
          limiter.acquire().await.unwrap();
          assert!(limiter.count() <= limiter.ceiling());
          acquired.fetch_add(1, Ordering::SeqCst);
        })
      })
      .collect();

    tokio::time::sleep(Duration::from_secs(19)).await;
    assert_eq!(acquired.load(Ordering::SeqCst), 2);
    assert_eq!(limiter.count(), 2);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(acquired.load(Ordering::SeqCst), 4);
    assert_eq!(limiter.count(), 2);

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(acquired.load(Ordering::SeqCst), 5);
    assert!(limiter.count() <= limiter.ceiling());

    for caller in callers {
      caller.await.unwrap();
    }
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn concurrent_callers_on_many_threads() {
    let channels = Channels::new();
    channels.insert("forsen");
    let limits = RateLimit {
      user: 10,
      moderator: 10,
      release: Duration::from_secs(3600),
    };
    let (limiter, _, stop) = limiter(limits, &channels);
    let acquired = Arc::new(AtomicU32::new(0));

    let callers: Vec<_> = (0..50)
      .map(|_| {
        let limiter = limiter.clone();
        let acquired = acquired.clone();
        tokio::spawn(async move {
          let result = limiter.acquire().await;
          if result.is_ok() {
            acquired.fetch_add(1, Ordering::SeqCst);
          }
          result
        })
      })
      .collect();

    while acquired.load(Ordering::SeqCst) < 10 {
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(acquired.load(Ordering::SeqCst), 10);
    assert_eq!(limiter.count(), 10);

    stop.cancel();
    let mut closed = 0;
    for caller in callers {
      if caller.await.unwrap() == Err(RateLimitError::Closed) {
        closed += 1;
      }
    }
    assert_eq!(closed, 40);
    assert_eq!(limiter.count(), 10);
  }

  #[tokio::test]
  async fn zero_ceiling_is_an_error() {
    let channels = Channels::new();
    channels.insert("forsen");
    let limits = RateLimit {
      user: 0,
      ..Default::default()
    };
    let (limiter, _, _) = limiter(limits, &channels);
    assert_eq!(limiter.acquire().await, Err(RateLimitError::ZeroCeiling));
  }

  #[tokio::test(start_paused = true)]
  async fn stop_fails_waiters_and_abandons_releases() {
    let channels = Channels::new();
    channels.insert("forsen");
    let limits = RateLimit {
      user: 1,
      ..Default::default()
    };
    let (limiter, tasks, stop) = limiter(limits, &channels);
    limiter.acquire().await.unwrap();

    let pending = tokio::spawn({
      let limiter = limiter.clone();
      async move { limiter.acquire().await }
    });
    tokio::task::yield_now().await;

    stop.cancel();
    assert_eq!(pending.await.unwrap(), Err(RateLimitError::Closed));

    tasks.close();
    tasks.wait().await;
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(limiter.count(), 1);
    assert_eq!(limiter.acquire().await, Err(RateLimitError::Closed));
  }
}
