// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-identity failed-login throttling.
//!
//! A fixed-window counter with lockout. Within one window, the failure that
//! brings the count to `max_failures` locks the key for `lockout`; once the
//! lockout elapses the bucket starts over from zero. A window that expires
//! without a lockout also starts over.
//!
//! Buckets live in a sharded [`DashMap`], so concurrent failures for the same
//! key serialize on that key's shard and unrelated keys rarely contend. Each
//! transition happens under one entry guard, which is what makes the
//! threshold crossing happen exactly once.
//!
//! Every operation has an `_at` variant taking the current [`Instant`] so
//! tests can drive time explicitly.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bastion_server_auth::normalize_username;
use bastion_server_config::{RateLimitConfig, MAX_PERIOD_SECS};
use dashmap::DashMap;
use tokio::task::JoinHandle;

/// Failures recorded between opportunistic prunes.
const PRUNE_EVERY: u64 = 1024;

/// What a limiter bucket is keyed by: the normalized identity, prefixed
/// with the client origin when one is known.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey(String);

impl RateLimitKey {
	pub fn new(identity: &str, origin: Option<&str>) -> Self {
		let identity = normalize_username(identity);
		match origin.map(str::trim).filter(|o| !o.is_empty()) {
			Some(origin) => Self(format!("{origin}|{identity}")),
			None => Self(identity),
		}
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for RateLimitKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
	Allowed,
	/// Locked; retry after the given wait.
	Locked(Duration),
}

impl Decision {
	pub fn is_allowed(&self) -> bool {
		matches!(self, Decision::Allowed)
	}
}

/// Result of [`RateLimiter::record_failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
	/// Failures counted in the current window, this one included.
	pub failures: u32,
	/// True only for the failure that crossed the threshold.
	pub newly_locked: bool,
	/// Remaining lockout, if the key is locked after this failure.
	pub locked_for: Option<Duration>,
}

#[derive(Debug, Clone)]
struct Bucket {
	failures: u32,
	window_started: Instant,
	locked_until: Option<Instant>,
	last_seen: Instant,
}

impl Bucket {
	fn new(now: Instant) -> Self {
		Self {
			failures: 0,
			window_started: now,
			locked_until: None,
			last_seen: now,
		}
	}

	fn reset(&mut self, now: Instant) {
		self.failures = 0;
		self.window_started = now;
		self.locked_until = None;
	}

	fn locked_for(&self, now: Instant) -> Option<Duration> {
		self.locked_until
			.filter(|until| now < *until)
			.map(|until| until - now)
	}

	fn is_live(&self, now: Instant, idle_ttl: Duration) -> bool {
		self.locked_for(now).is_some() || now.saturating_duration_since(self.last_seen) < idle_ttl
	}
}

pub struct RateLimiter {
	buckets: DashMap<RateLimitKey, Bucket>,
	max_failures: u32,
	window: Duration,
	lockout: Duration,
	idle_ttl: Duration,
	ops: AtomicU64,
}

/// Durations above [`MAX_PERIOD_SECS`] are clamped so `now + period`
/// cannot overflow.
fn period(secs: u64) -> Duration {
	Duration::from_secs(secs.min(MAX_PERIOD_SECS))
}

impl RateLimiter {
	pub fn new(config: &RateLimitConfig) -> Self {
		Self {
			buckets: DashMap::new(),
			max_failures: config.max_failures.max(1),
			window: period(config.window_secs),
			lockout: period(config.lockout_secs),
			idle_ttl: period(config.idle_ttl_secs),
			ops: AtomicU64::new(0),
		}
	}

	pub fn check(&self, key: &RateLimitKey) -> Decision {
		self.check_at(key, Instant::now())
	}

	/// Read-only unless the key's lockout has elapsed, in which case the
	/// bucket is dropped so the next window starts clean.
	pub fn check_at(&self, key: &RateLimitKey, now: Instant) -> Decision {
		let locked_for = match self.buckets.get(key) {
			None => return Decision::Allowed,
			Some(bucket) => match bucket.locked_until {
				None => return Decision::Allowed,
				Some(_) => bucket.locked_for(now),
			},
		};

		match locked_for {
			Some(wait) => Decision::Locked(wait),
			None => {
				self.buckets.remove_if(key, |_, b| {
					b.locked_until.is_some_and(|until| now >= until)
				});
				Decision::Allowed
			}
		}
	}

	pub fn record_failure(&self, key: &RateLimitKey) -> FailureOutcome {
		self.record_failure_at(key, Instant::now())
	}

	/// Count one failure. Failures that arrive while locked are counted but
	/// neither extend nor re-trigger the lockout.
	pub fn record_failure_at(&self, key: &RateLimitKey, now: Instant) -> FailureOutcome {
		let outcome = {
			let mut bucket = self
				.buckets
				.entry(key.clone())
				.or_insert_with(|| Bucket::new(now));

			let locked_until = bucket.locked_until;
			match locked_until {
				Some(until) if now >= until => bucket.reset(now),
				Some(_) => {}
				None if now.saturating_duration_since(bucket.window_started) >= self.window => {
					bucket.reset(now)
				}
				None => {}
			}

			bucket.failures = bucket.failures.saturating_add(1);
			bucket.last_seen = now;

			let newly_locked = bucket.locked_until.is_none() && bucket.failures >= self.max_failures;
			if newly_locked {
				bucket.locked_until = Some(now + self.lockout);
			}

			FailureOutcome {
				failures: bucket.failures,
				newly_locked,
				locked_for: bucket.locked_for(now),
			}
		};

		if outcome.newly_locked {
			tracing::info!(
				failures = outcome.failures,
				lockout_secs = self.lockout.as_secs(),
				"login lockout engaged"
			);
		} else {
			tracing::debug!(failures = outcome.failures, "login failure recorded");
		}

		if self.ops.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
			self.prune_at(now);
		}

		outcome
	}

	/// Clear the key after a successful login.
	pub fn record_success(&self, key: &RateLimitKey) {
		self.buckets.remove(key);
	}

	/// Failures counted in the key's current bucket.
	pub fn failure_count(&self, key: &RateLimitKey) -> u32 {
		self.buckets.get(key).map_or(0, |b| b.failures)
	}

	pub fn tracked_keys(&self) -> usize {
		self.buckets.len()
	}

	pub fn prune(&self) -> usize {
		self.prune_at(Instant::now())
	}

	/// Drop buckets that are neither locked nor recently used. Returns how
	/// many were dropped.
	pub fn prune_at(&self, now: Instant) -> usize {
		let before = self.buckets.len();
		self.buckets.retain(|_, b| b.is_live(now, self.idle_ttl));
		let pruned = before.saturating_sub(self.buckets.len());
		if pruned > 0 {
			tracing::debug!(pruned, "pruned idle rate limit buckets");
		}
		pruned
	}

	/// Prune on a fixed interval until the handle is aborted.
	pub fn spawn_cleanup(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
		let limiter = Arc::clone(self);
		tokio::spawn(async move {
			let mut interval_timer = tokio::time::interval(interval.max(Duration::from_millis(1)));
			loop {
				interval_timer.tick().await;
				limiter.prune();
			}
		})
	}
}
