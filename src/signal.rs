use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use crate::computed::Computed;
use crate::detect::{self, Changed};
use crate::hooks::{self, Node, NodeId, NodeKind};
use crate::registry::{self, Subscribers};
use crate::track;
use crate::value::{Access, Ref};
use crate::{Error, Observable, Observer};

/// A mutable reactive cell.
///
/// Reading under an active tracking context registers the signal as a
/// dependency of the evaluating node. Writing runs the change-detector:
/// an unchanged value is a complete no-op, a changed one bumps the
/// version and notifies subscribers before the write call returns.
pub struct Signal<T> {
	body: Rc<SignalBody<T>>,
}

pub(crate) struct SignalBody<T> {
	value: RefCell<T>,
	version: Cell<u64>,
	subscribers: RefCell<Subscribers>,
	name: RefCell<Option<Rc<str>>>,
	this: Weak<SignalBody<T>>,
}

impl<T> Clone for Signal<T> {
	fn clone(&self) -> Self {
		Signal {
			body: self.body.clone(),
		}
	}
}

impl<T> Default for Signal<T>
where
	T: Default + 'static,
{
	fn default() -> Self {
		Signal::new(Default::default())
	}
}

pub trait Toggle {
	fn toggle(&mut self);
}

impl Toggle for bool {
	fn toggle(&mut self) {
		*self = !*self
	}
}

impl<T: 'static> Signal<T> {
	pub fn new(value: T) -> Self {
		let body = Rc::new_cyclic(|this| SignalBody {
			value: RefCell::new(value),
			version: Cell::new(0),
			subscribers: RefCell::new(Subscribers::new()),
			name: RefCell::new(None),
			this: this.clone(),
		});
		hooks::emit(|hook| hook.created(&*body));
		Signal { body }
	}

	/// Attaches a display name. No semantic effect.
	pub fn named(self, name: impl Into<String>) -> Self {
		self.body.set_name(name.into());
		self
	}

	pub fn name(&self) -> Option<Rc<str>> {
		self.body.name.borrow().clone()
	}

	/// Tracked read.
	#[inline]
	pub fn get(&self) -> Ref<'_, T> {
		self.body.read(true)
	}

	/// Read without registering a dependency.
	#[inline]
	pub fn get_untracked(&self) -> Ref<'_, T> {
		self.body.read(false)
	}

	/// Writes through the change-detector. An unchanged value returns
	/// without side effects; a changed one bumps the version and
	/// notifies subscribers in insertion order.
	#[inline]
	pub fn set(&self, value: T) -> Result<(), Error>
	where
		T: Changed,
	{
		self.body.set(value)
	}

	/// Mutates the value in place. The mutation always counts as a
	/// change: the old value is gone by the time the closure returns,
	/// so there is nothing left to compare against.
	#[inline]
	pub fn update(&self, func: impl FnOnce(&mut T)) -> Result<(), Error> {
		self.body.update(func)
	}

	#[inline]
	pub fn toggle(&self) -> Result<(), Error>
	where
		T: Toggle,
	{
		self.update(T::toggle)
	}

	/// Temporarily overrides the value for the lifetime of the guard.
	/// Enter and exit both go through the normal write path; the exit
	/// restores the value captured here, overwriting any write that
	/// happened inside the scope.
	pub fn at(&self, value: T) -> Result<ScopedValue<'_, T>, Error>
	where
		T: Changed + Clone,
	{
		let previous = (*self.get_untracked()).clone();
		self.set(value)?;
		Ok(ScopedValue {
			signal: self,
			previous: Some(previous),
		})
	}

	/// Derives a value from this signal alone.
	pub fn map<F, R>(&self, func: F) -> Computed<R>
	where
		F: Fn(&T) -> R + 'static,
		R: Changed + 'static,
	{
		let body = self.body.clone();
		Computed::new(move || func(&body.read(true)))
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

	pub(crate) fn into_access(self) -> Rc<dyn Access<T>> {
		self.body
	}
}

/// Restores the signal to its previous value when dropped, on all exit
/// paths including unwinding.
pub struct ScopedValue<'a, T: Changed + 'static> {
	signal: &'a Signal<T>,
	previous: Option<T>,
}

impl<'a, T: Changed + 'static> Drop for ScopedValue<'a, T> {
	fn drop(&mut self) {
		if let Some(previous) = self.previous.take() {
			// Observer failures cannot surface from a destructor.
			let _ = self.signal.set(previous);
		}
	}
}

impl<T: 'static> SignalBody<T> {
	pub(crate) fn read(&self, tracked: bool) -> Ref<'_, T> {
		hooks::emit(|hook| hook.read(self));
		if tracked {
			if let Some(this) = self.this.upgrade() {
				track::register(&(this as Rc<dyn Observable>), self.version.get());
			}
		}
		Ref::Cell(self.value.borrow())
	}

	fn set(&self, value: T) -> Result<(), Error>
	where
		T: Changed,
	{
		{
			let current = self.value.borrow();
			if !detect::changed_or_panicked(&*current, &value) {
				tracing::trace!(signal = %self.label(), "write ignored: unchanged");
				return Ok(());
			}
		}
		*self.value.borrow_mut() = value;
		self.bump_and_notify()
	}

	fn update(&self, func: impl FnOnce(&mut T)) -> Result<(), Error> {
		func(&mut self.value.borrow_mut());
		self.bump_and_notify()
	}

	fn bump_and_notify(&self) -> Result<(), Error> {
		self.version.set(self.version.get() + 1);
		hooks::emit(|hook| hook.updated(self));
		tracing::trace!(
			signal = %self.label(),
			version = self.version.get(),
			"changed"
		);
		registry::notify(&self.subscribers, None)
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

impl<T: 'static> Observable for SignalBody<T> {
	fn refresh(&self) -> Result<u64, Error> {
		Ok(self.version.get())
	}

	fn version(&self) -> u64 {
		self.version.get()
	}

	fn subscribe(&self, observer: Weak<dyn Observer>) {
		SignalBody::subscribe(self, observer)
	}

	fn unsubscribe(&self, observer: &Weak<dyn Observer>) {
		SignalBody::unsubscribe(self, observer)
	}
}

impl<T: 'static> Access<T> for SignalBody<T> {
	fn get(&self) -> Result<Ref<'_, T>, Error> {
		Ok(self.read(true))
	}

	fn get_untracked(&self) -> Result<Ref<'_, T>, Error> {
		Ok(self.read(false))
	}
}

impl<T: 'static> Node for SignalBody<T> {
	fn id(&self) -> NodeId {
		NodeId(self as *const Self as *const () as usize)
	}

	fn kind(&self) -> NodeKind {
		NodeKind::Signal
	}

	fn name(&self) -> Option<Rc<str>> {
		self.name.borrow().clone()
	}
}

impl<T> Debug for Signal<T>
where
	T: Debug + 'static,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.get_untracked().fmt(f)
	}
}
