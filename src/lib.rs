pub mod macros;

mod addr;
mod computed;
mod r#const;
mod dependencies;
mod detect;
mod effect;
mod error;
mod hooks;
mod registry;
mod signal;
mod track;
mod unref;
mod value;

use std::rc::Weak;

pub use computed::Computed;
pub use detect::Changed;
pub use effect::Effect;
pub use error::{BoxError, Error};
pub use hooks::{add_hook, clear_hooks, Hook, Node, NodeId, NodeKind};
pub use r#const::Const;
pub use signal::{ScopedValue, Signal, Toggle};
pub use unref::{deep_unref, DeepUnref};
pub use value::{Access, Ref, Value};

/// A node that others can subscribe to.
///
/// Observers are held weakly: an observable never keeps its subscribers
/// alive, and collected observers are skipped during notification.
pub trait Observable: 'static {
	/// Bring this node up to date and return the resulting version.
	///
	/// For a source node this is a plain version read. For a derived
	/// node it revalidates first, so the returned version reflects the
	/// current dependency values.
	fn refresh(&self) -> Result<u64, Error>;

	/// The current version, without revalidating.
	fn version(&self) -> u64;

	/// Add `observer` to the subscriber set. Idempotent; an observer
	/// that is already present keeps its original position.
	fn subscribe(&self, observer: Weak<dyn Observer>);

	/// Remove `observer` from the subscriber set. Tolerates pairs that
	/// were never linked.
	fn unsubscribe(&self, observer: &Weak<dyn Observer>);
}

/// A node that can be told "something you depend on changed".
pub trait Observer: 'static {
	/// Delivered in subscription order. A notification may be spurious
	/// (the upstream recomputation can turn out unchanged) and the same
	/// logical change can be delivered more than once; implementations
	/// must tolerate both.
	///
	/// A failure does not stop delivery to the remaining subscribers;
	/// it is collected and surfaced to the writer as part of a
	/// composite [`Error::Observers`].
	fn dependency_changed(&self) -> Result<(), Error>;
}

/// Lifecycle of a derived node's cached value.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NodeState {
	/// The cached value is current for the last-seen dependency versions.
	Fresh,
	/// A dependency may have changed; the next read revalidates.
	Stale,
	/// Mid-evaluation. Reading a node in this state is a cycle.
	Evaluating,
}

/// Shorthand for [`Signal::new`].
pub fn signal<T: 'static>(value: T) -> Signal<T> {
	Signal::new(value)
}

/// Shorthand for [`Computed::new`].
pub fn computed<T, F>(func: F) -> Computed<T>
where
	T: Changed + 'static,
	F: Fn() -> T + 'static,
{
	Computed::new(func)
}

/// Shorthand for [`Effect::new`].
pub fn effect<F>(func: F) -> Result<Effect, Error>
where
	F: Fn() + 'static,
{
	Effect::new(func)
}
