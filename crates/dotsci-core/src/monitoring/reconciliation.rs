//! Bounded, cancellable polling of ledger read state.

use dotsci_config::{BackoffConfig, ReconciliationConfig};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Delay growth between attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
	/// Every gap equals the base interval.
	Fixed,
	/// Each gap is the previous one times `factor`, capped at `max_interval`.
	Exponential { factor: f64, max_interval: Duration },
}

/// How often and how long to poll.
#[derive(Debug, Clone, PartialEq)]
pub struct PollSettings {
	pub interval: Duration,
	pub max_attempts: u32,
	pub backoff: Backoff,
}

impl PollSettings {
	pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
		Self {
			interval,
			max_attempts,
			backoff: Backoff::Fixed,
		}
	}

	pub fn from_config(config: &ReconciliationConfig) -> Self {
		let backoff = match &config.backoff {
			BackoffConfig::Fixed => Backoff::Fixed,
			BackoffConfig::Exponential {
				factor,
				max_interval_ms,
			} => Backoff::Exponential {
				factor: *factor,
				max_interval: Duration::from_millis(*max_interval_ms),
			},
		};
		Self {
			interval: Duration::from_millis(config.interval_ms),
			max_attempts: config.max_attempts,
			backoff,
		}
	}

	/// Sleep that follows attempt number `attempt` (1-based).
	pub fn delay_after(&self, attempt: u32) -> Duration {
		match &self.backoff {
			Backoff::Fixed => self.interval,
			Backoff::Exponential {
				factor,
				max_interval,
			} => {
				let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
				let scaled = self.interval.as_secs_f64() * factor.powi(exponent);
				Duration::try_from_secs_f64(scaled)
					.map(|delay| delay.min(*max_interval))
					.unwrap_or(*max_interval)
			},
		}
	}
}

impl Default for PollSettings {
	fn default() -> Self {
		Self::from_config(&ReconciliationConfig::default())
	}
}

/// How a poll ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
	Found(T),
	/// The predicate never matched within the attempt budget.
	TimedOut { attempts: u32 },
	/// [`ReconciliationPoller::stop`] was called while polling.
	Cancelled,
}

/// Re-evaluates a read-side predicate until it matches.
///
/// The poller never tells "will never appear" apart from "not yet": read
/// errors inside the predicate count as a miss, and running out of attempts
/// is reported as [`PollOutcome::TimedOut`], not as an error.
pub struct ReconciliationPoller {
	settings: PollSettings,
	stop: watch::Sender<bool>,
}

impl ReconciliationPoller {
	pub fn new(settings: PollSettings) -> Self {
		let (stop, _) = watch::channel(false);
		Self { settings, stop }
	}

	pub fn settings(&self) -> &PollSettings {
		&self.settings
	}

	/// Cancels in-flight polls and every poll started afterwards.
	pub fn stop(&self) {
		self.stop.send_replace(true);
	}

	pub fn is_stopped(&self) -> bool {
		*self.stop.borrow()
	}

	/// Evaluates `predicate` up to `max_attempts` times.
	///
	/// Attempts are separated by the configured delay; there is no sleep after
	/// the last one.
	pub async fn poll_until<T, E, F, Fut>(&self, mut predicate: F) -> PollOutcome<T>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<Option<T>, E>>,
		E: Display,
	{
		let mut stop = self.stop.subscribe();
		let max_attempts = self.settings.max_attempts;

		for attempt in 1..=max_attempts {
			let result = tokio::select! {
				biased;
				_ = stopped(&mut stop) => return self.cancelled(attempt),
				result = predicate() => result,
			};

			match result {
				Ok(Some(found)) => {
					info!(attempt, "Write observed in read state");
					return PollOutcome::Found(found);
				},
				Ok(None) => debug!(attempt, max_attempts, "Not visible yet"),
				Err(e) => warn!(attempt, error = %e, "Read failed, treating as not visible yet"),
			}

			if attempt == max_attempts {
				break;
			}

			let delay = self.settings.delay_after(attempt);
			tokio::select! {
				biased;
				_ = stopped(&mut stop) => return self.cancelled(attempt),
				_ = tokio::time::sleep(delay) => {},
			}
		}

		warn!(attempts = max_attempts, "Write not observed before the deadline");
		PollOutcome::TimedOut {
			attempts: max_attempts,
		}
	}

	fn cancelled<T>(&self, attempt: u32) -> PollOutcome<T> {
		info!(attempt, "Reconciliation cancelled");
		PollOutcome::Cancelled
	}
}

/// Resolves once the stop flag is set.
async fn stopped(rx: &mut watch::Receiver<bool>) {
	while !*rx.borrow_and_update() {
		if rx.changed().await.is_err() {
			// Sender gone; nothing can stop us anymore.
			std::future::pending::<()>().await;
		}
	}
}
