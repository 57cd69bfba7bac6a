//! Pausable countdown used for conversion deadlines.
//!
//! A [`CountdownTimer`] tracks a remaining duration across pause/resume
//! cycles and exposes expiry as an awaitable signal. Expiry does not abort
//! anything by itself; blocking operations that accept a timer select on
//! [`CountdownTimer::expired`] and fail themselves when it completes.
//!
//! Pausing exists because an overall deadline may need to be suspended while
//! a sub-wait runs under its own independent budget: the two deadlines nest,
//! they do not add. Remaining time is frozen at `pause()` and the paused
//! interval is excluded from the accounting.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::error::{Error, Result};

/// Observable state of a [`CountdownTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
	/// Never started.
	Idle,
	/// Counting down.
	Running,
	/// Frozen with remaining time preserved.
	Paused,
	/// Ran out of time.
	Elapsed,
	/// Forced to completion by [`CountdownTimer::cancel`].
	Cancelled,
}

#[derive(Clone, Copy)]
enum State {
	Idle,
	Running { resumed_at: Instant },
	Paused,
	Elapsed,
	Cancelled,
}

struct Inner {
	state: State,
	remaining: Duration,
	duration: Duration,
}

/// Cancellable countdown with pause/resume and an awaitable expiry signal.
///
/// All methods take `&self`; the timer is shared by reference between the
/// operation being bounded and the code driving it.
pub struct CountdownTimer {
	inner: Mutex<Inner>,
	notify: Notify,
}

impl Default for CountdownTimer {
	fn default() -> Self {
		Self::new()
	}
}

impl CountdownTimer {
	/// Creates an idle timer.
	pub fn new() -> Self {
		Self {
			inner: Mutex::new(Inner {
				state: State::Idle,
				remaining: Duration::ZERO,
				duration: Duration::ZERO,
			}),
			notify: Notify::new(),
		}
	}

	/// Creates a timer and immediately starts it.
	pub fn started(duration: Duration) -> Result<Self> {
		let timer = Self::new();
		timer.start(duration)?;
		Ok(timer)
	}

	/// Begins counting down from `duration`, or resumes a paused countdown.
	///
	/// Starting a [`Paused`](TimerState::Paused) timer continues with the
	/// remaining (not the original) duration; `duration` is ignored. A
	/// finished ([`Elapsed`](TimerState::Elapsed) or
	/// [`Cancelled`](TimerState::Cancelled)) timer restarts from scratch.
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidArgument`] for a zero duration or a timer
	/// that is already running.
	pub fn start(&self, duration: Duration) -> Result<()> {
		if duration.is_zero() {
			return Err(Error::InvalidArgument(
				"timer duration must be positive".to_string(),
			));
		}

		{
			let mut inner = self.inner.lock();
			match inner.state {
				State::Running { .. } => {
					return Err(Error::InvalidArgument("timer already running".to_string()));
				}
				State::Paused => {
					inner.state = State::Running {
						resumed_at: Instant::now(),
					};
				}
				State::Idle | State::Elapsed | State::Cancelled => {
					inner.state = State::Running {
						resumed_at: Instant::now(),
					};
					inner.remaining = duration;
					inner.duration = duration;
				}
			}
		}

		self.notify.notify_waiters();
		Ok(())
	}

	/// Freezes the countdown, preserving the remaining duration.
	///
	/// Pausing a timer that already finished is a no-op; the terminal state
	/// is kept.
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidArgument`] for a timer that was never started.
	pub fn pause(&self) -> Result<()> {
		let expire = {
			let mut inner = self.inner.lock();
			match inner.state {
				State::Idle => {
					return Err(Error::InvalidArgument("timer not started".to_string()));
				}
				State::Paused | State::Elapsed | State::Cancelled => false,
				State::Running { resumed_at } => {
					let spent = resumed_at.elapsed();
					if spent >= inner.remaining {
						inner.state = State::Elapsed;
						inner.remaining = Duration::ZERO;
						true
					} else {
						inner.state = State::Paused;
						inner.remaining -= spent;
						false
					}
				}
			}
		};

		if expire {
			self.notify.notify_waiters();
		}
		Ok(())
	}

	/// Continues a paused countdown with the remaining (not original)
	/// duration, like [`start`](Self::start) on a paused timer but without
	/// needing a duration. No-op on a finished or already-running timer.
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidArgument`] for a timer that was never started.
	pub fn resume(&self) -> Result<()> {
		{
			let mut inner = self.inner.lock();
			match inner.state {
				State::Idle => {
					return Err(Error::InvalidArgument("timer not started".to_string()));
				}
				State::Running { .. } | State::Elapsed | State::Cancelled => return Ok(()),
				State::Paused => {
					inner.state = State::Running {
						resumed_at: Instant::now(),
					};
				}
			}
		}

		self.notify.notify_waiters();
		Ok(())
	}

	/// Forces immediate completion, equivalent to the countdown elapsing.
	///
	/// Idempotent; safe to call in any state, including after natural
	/// expiry (which is left as [`TimerState::Elapsed`]).
	pub fn cancel(&self) {
		{
			let mut inner = self.inner.lock();
			match inner.state {
				State::Elapsed | State::Cancelled => return,
				_ => {
					inner.state = State::Cancelled;
					inner.remaining = Duration::ZERO;
				}
			}
		}

		self.notify.notify_waiters();
	}

	/// Current state.
	pub fn state(&self) -> TimerState {
		match self.inner.lock().state {
			State::Idle => TimerState::Idle,
			State::Running { .. } => TimerState::Running,
			State::Paused => TimerState::Paused,
			State::Elapsed => TimerState::Elapsed,
			State::Cancelled => TimerState::Cancelled,
		}
	}

	/// Remaining time on the countdown. Zero for idle and finished timers.
	pub fn remaining(&self) -> Duration {
		let inner = self.inner.lock();
		match inner.state {
			State::Running { resumed_at } => {
				inner.remaining.saturating_sub(resumed_at.elapsed())
			}
			State::Paused => inner.remaining,
			State::Idle | State::Elapsed | State::Cancelled => Duration::ZERO,
		}
	}

	/// The duration the current countdown was started with.
	pub fn duration(&self) -> Duration {
		self.inner.lock().duration
	}

	/// Returns true once the timer has elapsed or been cancelled.
	pub fn is_expired(&self) -> bool {
		let inner = self.inner.lock();
		match inner.state {
			State::Elapsed | State::Cancelled => true,
			State::Running { resumed_at } => resumed_at.elapsed() >= inner.remaining,
			State::Idle | State::Paused => false,
		}
	}

	/// Completes once the timer expires or is cancelled.
	///
	/// Waits through pauses: a paused timer holds this future pending until
	/// the countdown is resumed and runs out. An idle timer holds it pending
	/// until started.
	pub async fn expired(&self) {
		loop {
			// Register for wakeups before reading state so a notification
			// between the check and the wait cannot be lost.
			let notified = self.notify.notified();
			tokio::pin!(notified);
			notified.as_mut().enable();

			let deadline = {
				let inner = self.inner.lock();
				match inner.state {
					State::Elapsed | State::Cancelled => return,
					State::Running { resumed_at } => Some(resumed_at + inner.remaining),
					State::Idle | State::Paused => None,
				}
			};

			match deadline {
				Some(deadline) => {
					tokio::select! {
						_ = &mut notified => {}
						_ = tokio::time::sleep_until(deadline) => {
							self.mark_elapsed_if_due();
						}
					}
				}
				None => notified.await,
			}
		}
	}

	fn mark_elapsed_if_due(&self) {
		let expired = {
			let mut inner = self.inner.lock();
			match inner.state {
				State::Running { resumed_at } if resumed_at.elapsed() >= inner.remaining => {
					inner.state = State::Elapsed;
					inner.remaining = Duration::ZERO;
					true
				}
				_ => false,
			}
		};

		if expired {
			self.notify.notify_waiters();
		}
	}
}

impl std::fmt::Debug for CountdownTimer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CountdownTimer")
			.field("state", &self.state())
			.field("remaining", &self.remaining())
			.finish()
	}
}
