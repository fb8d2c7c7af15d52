use std::cell::RefCell;
use std::rc::Rc;

/// Metadata every reactive node exposes to hooks.
pub trait Node {
	fn id(&self) -> NodeId;
	fn kind(&self) -> NodeKind;
	fn name(&self) -> Option<Rc<str>>;
}

/// Stable identity of a node for the lifetime of its allocation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(pub(crate) usize);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NodeKind {
	Signal,
	Computed,
	Effect,
	Const,
}

/// Observation points for plugins. Every method defaults to a no-op, so
/// a hook only implements what it cares about.
pub trait Hook {
	/// A node was constructed.
	fn created(&self, node: &dyn Node) {
		let _ = node;
	}

	/// A node received a display name.
	fn named(&self, node: &dyn Node) {
		let _ = node;
	}

	/// A node's value was read.
	fn read(&self, node: &dyn Node) {
		let _ = node;
	}

	/// A node's value actually changed.
	fn updated(&self, node: &dyn Node) {
		let _ = node;
	}
}

thread_local! {
	static HOOKS: RefCell<Vec<Rc<dyn Hook>>> = RefCell::new(Vec::new());
}

/// Installs a hook for the current thread.
pub fn add_hook(hook: Rc<dyn Hook>) {
	HOOKS.with(|hooks| hooks.borrow_mut().push(hook));
}

/// Removes every installed hook.
pub fn clear_hooks() {
	HOOKS.with(|hooks| hooks.borrow_mut().clear());
}

// Dispatch runs over a snapshot so a hook may install or remove hooks
// while being called.
pub(crate) fn emit(event: impl Fn(&dyn Hook)) {
	HOOKS.with(|hooks| {
		if hooks.borrow().is_empty() {
			return;
		}
		let snapshot: Vec<Rc<dyn Hook>> = hooks.borrow().clone();
		for hook in snapshot {
			event(&*hook);
		}
	});
}
