use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::dependencies::Dependencies;
use crate::error::BoxError;
use crate::hooks::{self, Node, NodeId, NodeKind};
use crate::track;
use crate::{Error, NodeState, Observer};

/// An eager observer: runs its closure once at construction and re-runs
/// it synchronously when a dependency actually changed. A stale wave
/// that turns out to be spurious is absorbed by revalidating recorded
/// dependency versions, so the closure never re-runs for nothing.
///
/// Dependencies are re-collected on every run, exactly like a
/// [`Computed`](crate::Computed) thunk. The effect is held weakly by
/// its dependencies, so the caller must keep the handle alive for the
/// effect to keep firing.
pub struct Effect {
	body: Rc<EffectBody>,
}

impl Clone for Effect {
	fn clone(&self) -> Self {
		Effect {
			body: self.body.clone(),
		}
	}
}

pub(crate) struct EffectBody {
	state: Cell<NodeState>,
	dirtied: Cell<bool>,
	name: RefCell<Option<Rc<str>>>,
	inner: RefCell<EffectInner>,
	this: Weak<EffectBody>,
}

struct EffectInner {
	func: Box<dyn Fn() -> Result<(), BoxError>>,
	dependencies: Dependencies,
}

impl Drop for EffectBody {
	fn drop(&mut self) {
		let this = self.this.clone() as Weak<dyn Observer>;
		self.inner.get_mut().dependencies.clear(&this);
	}
}

impl Effect {
	/// Runs `func` once, immediately, under tracking.
	pub fn new(func: impl Fn() + 'static) -> Result<Self, Error> {
		Self::try_new(move || {
			func();
			Ok(())
		})
	}

	/// Fallible closure. A failing run keeps the previous dependency
	/// edges; the failure surfaces to the writer whose change triggered
	/// the run (or to the constructor for the first run).
	pub fn try_new(func: impl Fn() -> Result<(), BoxError> + 'static) -> Result<Self, Error> {
		let body = Rc::new_cyclic(|this| EffectBody {
			state: Cell::new(NodeState::Stale),
			dirtied: Cell::new(false),
			name: RefCell::new(None),
			inner: RefCell::new(EffectInner {
				func: Box::new(func),
				dependencies: Dependencies::new(),
			}),
			this: this.clone(),
		});
		hooks::emit(|hook| hook.created(&*body));
		body.run()?;
		Ok(Effect { body })
	}

	/// Attaches a display name. No semantic effect.
	pub fn named(self, name: impl Into<String>) -> Self {
		self.body.set_name(name.into());
		self
	}

	pub fn name(&self) -> Option<Rc<str>> {
		self.body.name.borrow().clone()
	}

	/// Re-runs the closure regardless of staleness.
	pub fn rerun(&self) -> Result<(), Error> {
		self.body.run()
	}
}

impl EffectBody {
	fn run(&self) -> Result<(), Error> {
		if self.state.get() == NodeState::Evaluating {
			return Err(Error::Cycle(self.label().to_string()));
		}

		// A write performed by the closure itself marks us dirty; keep
		// running until a run ends clean.
		loop {
			self.state.set(NodeState::Evaluating);
			self.dirtied.set(false);

			let this = self.this.clone() as Weak<dyn Observer>;
			let (result, collected) = {
				let inner = self.inner.borrow();
				track::evaluating(this.clone(), || (inner.func)())
			};

			match result {
				Ok(()) => {
					self.inner.borrow_mut().dependencies.swap(collected, &this);
					self.state.set(NodeState::Fresh);
					if self.dirtied.get() {
						continue;
					}
					return Ok(());
				}
				Err(source) => {
					self.inner
						.borrow()
						.dependencies
						.rollback(collected, &this);
					self.state.set(NodeState::Stale);
					tracing::debug!(effect = %self.label(), "effect closure failed");
					return Err(Error::Thunk(source));
				}
			}
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
}

impl Observer for EffectBody {
	fn dependency_changed(&self) -> Result<(), Error> {
		match self.state.get() {
			NodeState::Evaluating => {
				self.dirtied.set(true);
				Ok(())
			}
			// The previous run failed; any change is a reason to retry.
			NodeState::Stale => self.run(),
			NodeState::Fresh => {
				// The wave may be spurious. Revalidate the recorded
				// dependency versions before paying for a re-run; the
				// Evaluating guard absorbs re-entrant pings while
				// dependencies are brought current.
				self.state.set(NodeState::Evaluating);
				let this = self.this.clone() as Weak<dyn Observer>;
				let (current, _) = track::evaluating(this, || {
					let inner = self.inner.borrow();
					!inner.dependencies.is_empty() && inner.dependencies.all_current()
				});
				self.state.set(NodeState::Fresh);
				if current && !self.dirtied.get() {
					return Ok(());
				}
				self.run()
			}
		}
	}
}

impl Node for EffectBody {
	fn id(&self) -> NodeId {
		NodeId(self as *const Self as *const () as usize)
	}

	fn kind(&self) -> NodeKind {
		NodeKind::Effect
	}

	fn name(&self) -> Option<Rc<str>> {
		self.name.borrow().clone()
	}
}

impl std::fmt::Debug for Effect {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Effect")
			.field("name", &self.body.label())
			.finish()
	}
}
