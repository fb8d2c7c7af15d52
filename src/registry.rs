use std::cell::RefCell;
use std::rc::Weak;

use smallvec::SmallVec;

use crate::addr::WeakAddr;
use crate::{Error, Observer};

/// Insertion-ordered set of weakly held observers.
///
/// Order matters: notifications are delivered in subscription order, and
/// an observer that re-subscribes keeps its original position.
pub struct Subscribers {
	items: SmallVec<[WeakAddr<dyn Observer>; 4]>,
}

impl Subscribers {
	pub fn new() -> Self {
		Subscribers {
			items: SmallVec::new(),
		}
	}

	pub fn add(&mut self, observer: Weak<dyn Observer>) {
		let addr = WeakAddr::new(observer);
		if self.items.iter().any(|item| *item == addr) {
			return;
		}
		self.items.push(addr);
	}

	pub fn remove(&mut self, observer: &Weak<dyn Observer>) {
		let addr = WeakAddr::new(observer.clone());
		self.items.retain(|item| *item != addr);
	}

	/// Observers that are still alive.
	pub fn live(&self) -> usize {
		self.items
			.iter()
			.filter(|item| item.strong_count() > 0)
			.count()
	}

	fn prune(&mut self) {
		self.items.retain(|item| item.strong_count() > 0);
	}

	fn snapshot(&self) -> SmallVec<[Weak<dyn Observer>; 4]> {
		self.items.iter().map(|item| (**item).clone()).collect()
	}
}

/// Delivers one change notification to every live subscriber, in
/// insertion order. `skip` exempts the observer whose own read
/// triggered this notification.
///
/// Iteration runs over a snapshot, so an observer may subscribe or
/// unsubscribe (itself included) while being notified. Failures do not
/// stop delivery; they are collected into one composite error for the
/// writer.
pub(crate) fn notify(
	subscribers: &RefCell<Subscribers>,
	skip: Option<&Weak<dyn Observer>>,
) -> Result<(), Error> {
	let snapshot = {
		let mut subscribers = subscribers.borrow_mut();
		subscribers.prune();
		subscribers.snapshot()
	};
	let skip = skip.map(|observer| WeakAddr::new(observer.clone()));

	let mut failures = Vec::new();
	for observer in snapshot {
		if let Some(skip) = &skip {
			if WeakAddr::new(observer.clone()) == *skip {
				continue;
			}
		}
		if let Some(observer) = observer.upgrade() {
			if let Err(error) = observer.dependency_changed() {
				failures.push(error);
			}
		}
	}

	if failures.is_empty() {
		Ok(())
	} else {
		Err(Error::Observers(failures))
	}
}
