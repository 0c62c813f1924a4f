//! Virtual clock plus the queue of one-shot continuations.
//!
//! Nothing here knows about real time. The owner decides what `now` is and
//! pulls due steps out with [`Timeline::pop_due`]. Every entry is stamped with
//! the generation it was scheduled in; [`Timeline::invalidate`] bumps the
//! generation so everything queued before it is skipped.

use std::{collections::BTreeMap, time::Duration};

#[derive(Debug)]
struct Scheduled<S> {
	generation: u64,
	step: S,
}

#[derive(Debug)]
pub struct Timeline<S> {
	now: Duration,
	generation: u64,
	seq: u64,
	// (deadline, insertion order) keeps ties FIFO
	pending: BTreeMap<(Duration, u64), Scheduled<S>>,
}

impl<S> Default for Timeline<S> {
	fn default() -> Self {
		Self::new()
	}
}

impl<S> Timeline<S> {
	pub fn new() -> Self {
		Self {
			now: Duration::ZERO,
			generation: 0,
			seq: 0,
			pending: BTreeMap::new(),
		}
	}

	pub fn now(&self) -> Duration {
		self.now
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// Queue `step` to run `delay` after the current time.
	pub fn schedule(&mut self, delay: Duration, step: S) {
		let due = self.now.saturating_add(delay);
		self.pending.insert((due, self.seq), Scheduled {
			generation: self.generation,
			step,
		});
		self.seq += 1;
	}

	/// Drop everything scheduled so far. Returns how many live steps were
	/// discarded.
	pub fn invalidate(&mut self) -> usize {
		let dropped = self.len();
		self.generation += 1;
		// stale entries are discarded lazily by pop_due
		dropped
	}

	/// Pop the earliest live step due at or before `until`, moving the clock
	/// to its deadline.
	pub fn pop_due(&mut self, until: Duration) -> Option<S> {
		loop {
			let (&(due, seq), _) = self.pending.first_key_value()?;
			if due > until {
				return None;
			}
			let entry = self.pending.remove(&(due, seq))?;
			if entry.generation != self.generation {
				continue;
			}
			self.now = self.now.max(due);
			return Some(entry.step);
		}
	}

	/// Move the clock forward without running anything.
	pub fn settle(&mut self, until: Duration) {
		self.now = self.now.max(until);
	}

	pub fn next_deadline(&self) -> Option<Duration> {
		self.pending
			.iter()
			.find(|(_, entry)| entry.generation == self.generation)
			.map(|(&(due, _), _)| due)
	}

	pub fn len(&self) -> usize {
		self.pending.values().filter(|entry| entry.generation == self.generation).count()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
