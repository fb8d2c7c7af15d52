use std::ops::Deref;
use std::rc::{Rc, Weak};

use crate::detect::Changed;
use crate::r#const::Const;
use crate::{Computed, Error, Observable, Observer, Signal};

/// Read guard over either a plain reference or a `RefCell` borrow.
///
/// Guards should be short-lived: writing to a node while one of its
/// read guards is alive panics, as with any `RefCell`.
pub enum Ref<'a, T> {
	Plain(&'a T),
	Cell(std::cell::Ref<'a, T>),
}

impl<'a, T> Deref for Ref<'a, T> {
	type Target = T;

	fn deref(&self) -> &Self::Target {
		match self {
			Ref::Plain(value) => value,
			Ref::Cell(guard) => guard.deref(),
		}
	}
}

impl<'a, T: std::fmt::Debug> std::fmt::Debug for Ref<'a, T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		(**self).fmt(f)
	}
}

/// The read capability every value-bearing node satisfies.
pub trait Access<T>: Observable {
	/// Tracked read: registers the node with the innermost evaluating
	/// derived node, if any.
	fn get(&self) -> Result<Ref<'_, T>, Error>;

	/// Read without dependency registration.
	fn get_untracked(&self) -> Result<Ref<'_, T>, Error>;
}

/// Type-erased handle over a constant, a signal or a computed.
///
/// Sugar layers accept `impl Into<Value<T>>` so a caller can pass a
/// plain value, a [`Signal`] or a [`Computed`] interchangeably; a plain
/// value wraps into a [`Const`] node.
pub struct Value<T> {
	access: Rc<dyn Access<T>>,
	reactive: bool,
}

impl<T> Clone for Value<T> {
	fn clone(&self) -> Self {
		Value {
			access: self.access.clone(),
			reactive: self.reactive,
		}
	}
}

impl<T: 'static> Value<T> {
	pub fn get(&self) -> Result<Ref<'_, T>, Error> {
		self.access.get()
	}

	pub fn get_untracked(&self) -> Result<Ref<'_, T>, Error> {
		self.access.get_untracked()
	}

	/// Clone of the current value, read without tracking.
	pub fn unref(&self) -> Result<T, Error>
	where
		T: Clone,
	{
		self.access.get_untracked().map(|value| (*value).clone())
	}

	/// Whether this handle is backed by a node that can still change.
	pub fn is_reactive(&self) -> bool {
		self.reactive
	}

	pub fn version(&self) -> u64 {
		self.access.version()
	}

	pub fn subscribe(&self, observer: Weak<dyn Observer>) {
		self.access.subscribe(observer)
	}

	pub fn unsubscribe(&self, observer: &Weak<dyn Observer>) {
		self.access.unsubscribe(observer)
	}
}

impl<T: Clone + 'static> Value<Value<T>> {
	/// Collapses one level of nesting.
	pub fn flatten(&self) -> Result<Value<T>, Error> {
		self.unref()
	}
}

impl<T: 'static> From<Signal<T>> for Value<T> {
	fn from(signal: Signal<T>) -> Self {
		Value {
			access: signal.into_access(),
			reactive: true,
		}
	}
}

impl<T: Changed + 'static> From<Computed<T>> for Value<T> {
	fn from(computed: Computed<T>) -> Self {
		Value {
			access: computed.into_access(),
			reactive: true,
		}
	}
}

impl<T: 'static> From<Const<T>> for Value<T> {
	fn from(konst: Const<T>) -> Self {
		Value {
			access: konst.into_access(),
			reactive: false,
		}
	}
}

impl<T: 'static> From<T> for Value<T> {
	fn from(value: T) -> Self {
		Const::new(value).into()
	}
}
