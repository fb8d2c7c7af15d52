use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use crate::dependencies::Dependencies;
use crate::detect::{self, Changed};
use crate::error::BoxError;
use crate::hooks::{self, Node, NodeId, NodeKind};
use crate::registry::{self, Subscribers};
use crate::track;
use crate::value::{Access, Ref};
use crate::{Error, NodeState, Observable, Observer};

/// A lazily evaluated derived value.
///
/// Construction does not run the thunk. The first read evaluates it
/// under a fresh tracking frame, which discovers the dependency set by
/// observation; every later evaluation re-collects the set from
/// scratch, because control flow inside the thunk may change what it
/// reads. A dependency change only marks the node stale; recomputation
/// waits for the next read, and a recomputation whose result is
/// unchanged does not propagate further.
pub struct Computed<T>
where
	T: Changed + 'static,
{
	body: Rc<ComputedBody<T>>,
}

impl<T> Clone for Computed<T>
where
	T: Changed + 'static,
{
	fn clone(&self) -> Self {
		Computed {
			body: self.body.clone(),
		}
	}
}

pub(crate) struct ComputedBody<T>
where
	T: Changed + 'static,
{
	value: RefCell<Option<T>>,
	version: Cell<u64>,
	state: Cell<NodeState>,
	// a dependency changed in the middle of our own evaluation
	dirtied: Cell<bool>,
	// set by invalidate(); defeats the version fast path once
	forced: Cell<bool>,
	subscribers: RefCell<Subscribers>,
	name: RefCell<Option<Rc<str>>>,
	inner: RefCell<ComputedInner<T>>,
	this: Weak<ComputedBody<T>>,
}

struct ComputedInner<T> {
	thunk: Box<dyn Fn() -> Result<T, BoxError>>,
	dependencies: Dependencies,
}

impl<T> Drop for ComputedBody<T>
where
	T: Changed + 'static,
{
	fn drop(&mut self) {
		let this = self.this.clone() as Weak<dyn Observer>;
		self.inner.get_mut().dependencies.clear(&this);
	}
}

impl<T> Computed<T>
where
	T: Changed + 'static,
{
	pub fn new(func: impl Fn() -> T + 'static) -> Self {
		Self::try_new(move || Ok(func()))
	}

	/// Fallible thunk. An `Err` leaves the node stale with its previous
	/// value and edges intact; the next read retries.
	pub fn try_new(func: impl Fn() -> Result<T, BoxError> + 'static) -> Self {
		let body = Rc::new_cyclic(|this| ComputedBody {
			value: RefCell::new(None),
			version: Cell::new(0),
			state: Cell::new(NodeState::Stale),
			dirtied: Cell::new(false),
			forced: Cell::new(false),
			subscribers: RefCell::new(Subscribers::new()),
			name: RefCell::new(None),
			inner: RefCell::new(ComputedInner {
				thunk: Box::new(func),
				dependencies: Dependencies::new(),
			}),
			this: this.clone(),
		});
		hooks::emit(|hook| hook.created(&*body));
		Computed { body }
	}

	/// Attaches a display name. No semantic effect.
	pub fn named(self, name: impl Into<String>) -> Self {
		self.body.set_name(name.into());
		self
	}

	pub fn name(&self) -> Option<Rc<str>> {
		self.body.name.borrow().clone()
	}

	/// Tracked read. Recomputes iff the node is stale.
	#[inline]
	pub fn get(&self) -> Result<Ref<'_, T>, Error> {
		self.body.get(true)
	}

	/// Read without registering a dependency.
	#[inline]
	pub fn get_untracked(&self) -> Result<Ref<'_, T>, Error> {
		self.body.get(false)
	}

	/// Forces re-evaluation on the next read. Use when a dependency was
	/// rewired through a channel the engine cannot observe, e.g. a
	/// plain field was reseated to point at a different signal.
	///
	/// Does not bump the version: value propagation stays lazy and
	/// happens on the next read, like everywhere else.
	pub fn invalidate(&self) -> Result<(), Error> {
		self.body.invalidate()
	}

	pub fn state(&self) -> NodeState {
		self.body.state.get()
	}

	pub fn version(&self) -> u64 {
		self.body.version.get()
	}

	pub fn subscribe(&self, observer: Weak<dyn Observer>) {
		self.body.subscribe(observer)
	}

	pub fn unsubscribe(&self, observer: &Weak<dyn Observer>) {
		self.body.unsubscribe(observer)
	}

	/// Live subscribers; collected observers do not count.
	pub fn subscriber_count(&self) -> usize {
		self.body.subscribers.borrow().live()
	}

	/// Current dependency edges. Zero until the first read.
	pub fn dependency_count(&self) -> usize {
		self.body.inner.borrow().dependencies.len()
	}

	pub(crate) fn into_access(self) -> Rc<dyn Access<T>> {
		self.body
	}
}

impl<T> ComputedBody<T>
where
	T: Changed + 'static,
{
	fn get(&self, tracked: bool) -> Result<Ref<'_, T>, Error> {
		self.refresh_value()?;
		hooks::emit(|hook| hook.read(self));
		if tracked {
			if let Some(this) = self.this.upgrade() {
				track::register(&(this as Rc<dyn Observable>), self.version.get());
			}
		}
		Ok(Ref::Cell(std::cell::Ref::map(
			self.value.borrow(),
			|value| value.as_ref().unwrap(),
		)))
	}

	fn refresh_value(&self) -> Result<(), Error> {
		match self.state.get() {
			NodeState::Fresh => return Ok(()),
			NodeState::Evaluating => {
				return Err(Error::Cycle(self.label().to_string()));
			}
			NodeState::Stale => {}
		}

		// Guards against re-entry from here on; every exit below must
		// leave a settled state behind.
		self.state.set(NodeState::Evaluating);
		self.dirtied.set(false);

		// Fast path: if every dependency still reports the version we
		// recorded last time, the stale mark was spurious and the thunk
		// need not run. The check runs under our own frame so that a
		// dependency brought current here skips us when it notifies.
		if self.value.borrow().is_some() && !self.forced.get() {
			let this = self.this.clone() as Weak<dyn Observer>;
			let (current, _) =
				track::evaluating(this, || self.inner.borrow().dependencies.all_current());
			if current {
				self.state.set(NodeState::Fresh);
				tracing::trace!(computed = %self.label(), "stale mark was spurious");
				return Ok(());
			}
		}

		let this = self.this.clone() as Weak<dyn Observer>;
		let (result, collected) = {
			let inner = self.inner.borrow();
			track::evaluating(this.clone(), || (inner.thunk)())
		};

		match result {
			Ok(next) => {
				self.inner.borrow_mut().dependencies.swap(collected, &this);
				self.forced.set(false);

				let changed = {
					let value = self.value.borrow();
					match &*value {
						Some(current) => detect::changed_or_panicked(current, &next),
						None => true,
					}
				};

				if changed {
					*self.value.borrow_mut() = Some(next);
					self.version.set(self.version.get() + 1);
					hooks::emit(|hook| hook.updated(self));
				}

				self.state.set(if self.dirtied.get() {
					NodeState::Stale
				} else {
					NodeState::Fresh
				});
				self.dirtied.set(false);

				tracing::trace!(
					computed = %self.label(),
					version = self.version.get(),
					changed,
					"evaluated"
				);

				if changed {
					// Value and state stay updated even if an observer
					// fails; the failure surfaces to whoever triggered
					// this refresh. The evaluator that asked for the
					// refresh already holds the fresh version, so only
					// everyone else is told.
					let skip = track::current_observer();
					registry::notify(&self.subscribers, skip.as_ref())?;
				}
				Ok(())
			}
			Err(source) => {
				// Keep the previous edges; drop only the subscriptions
				// the failed run managed to install.
				self.inner
					.borrow()
					.dependencies
					.rollback(collected, &this);
				self.state.set(NodeState::Stale);
				self.dirtied.set(false);
				tracing::debug!(computed = %self.label(), "thunk failed");
				Err(Error::Thunk(source))
			}
		}
	}

	fn invalidate(&self) -> Result<(), Error> {
		self.forced.set(true);
		match self.state.get() {
			NodeState::Fresh => {
				self.state.set(NodeState::Stale);
				tracing::debug!(computed = %self.label(), "invalidated");
				registry::notify(&self.subscribers, None)
			}
			NodeState::Evaluating => {
				self.dirtied.set(true);
				Ok(())
			}
			NodeState::Stale => Ok(()),
		}
	}

	fn set_name(&self, name: String) {
		*self.name.borrow_mut() = Some(Rc::from(name));
		hooks::emit(|hook| hook.named(self));
	}

	fn label(&self) -> Rc<str> {
		self.name
			.borrow()
			.clone()
			.unwrap_or_else(|| Rc::from("<unnamed>"))
	}

	fn subscribe(&self, observer: Weak<dyn Observer>) {
		self.subscribers.borrow_mut().add(observer);
	}

	fn unsubscribe(&self, observer: &Weak<dyn Observer>) {
		self.subscribers.borrow_mut().remove(observer);
	}
}

impl<T> Observer for ComputedBody<T>
where
	T: Changed + 'static,
{
	fn dependency_changed(&self) -> Result<(), Error> {
		match self.state.get() {
			NodeState::Fresh => {
				// Bookkeeping only: mark stale and pass the wave on.
				// Recomputation waits for the next read.
				self.state.set(NodeState::Stale);
				registry::notify(&self.subscribers, None)
			}
			NodeState::Evaluating => {
				self.dirtied.set(true);
				Ok(())
			}
			// Already stale: the wave has passed through here before.
			NodeState::Stale => Ok(()),
		}
	}
}

impl<T> Observable for ComputedBody<T>
where
	T: Changed + 'static,
{
	fn refresh(&self) -> Result<u64, Error> {
		self.refresh_value()?;
		Ok(self.version.get())
	}

	fn version(&self) -> u64 {
		self.version.get()
	}

	fn subscribe(&self, observer: Weak<dyn Observer>) {
		ComputedBody::subscribe(self, observer)
	}

	fn unsubscribe(&self, observer: &Weak<dyn Observer>) {
		ComputedBody::unsubscribe(self, observer)
	}
}

impl<T> Access<T> for ComputedBody<T>
where
	T: Changed + 'static,
{
	fn get(&self) -> Result<Ref<'_, T>, Error> {
		ComputedBody::get(self, true)
	}

	fn get_untracked(&self) -> Result<Ref<'_, T>, Error> {
		ComputedBody::get(self, false)
	}
}

impl<T> Node for ComputedBody<T>
where
	T: Changed + 'static,
{
	fn id(&self) -> NodeId {
		NodeId(self as *const Self as *const () as usize)
	}

	fn kind(&self) -> NodeKind {
		NodeKind::Computed
	}

	fn name(&self) -> Option<Rc<str>> {
		self.name.borrow().clone()
	}
}

impl<T> Debug for Computed<T>
where
	T: Changed + Debug + 'static,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Computed")
			.field("name", &self.body.label())
			.field("state", &self.body.state.get())
			.field("cached", &self.body.value.borrow())
			.finish()
	}
}
