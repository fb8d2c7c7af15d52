use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::dependencies::Dependencies;
use crate::{Observable, Observer};

// The ambient tracking context: a stack of currently-evaluating derived
// nodes. The top frame accrues a dependency for every observable read
// while it is evaluating. Single-threaded by construction; a
// multi-threaded port only needs to keep this thread-local.
thread_local! {
	static STACK: RefCell<Vec<Frame>> = RefCell::new(Vec::new());
}

struct Frame {
	observer: Weak<dyn Observer>,
	dependencies: Dependencies,
}

struct PopGuard;

impl Drop for PopGuard {
	fn drop(&mut self) {
		let _ = STACK.try_with(|stack| stack.borrow_mut().pop());
	}
}

/// Runs `func` with `observer` on top of the tracking stack, returning
/// its result together with the dependencies it read. The stack is
/// restored on every exit path, including unwinding.
pub(crate) fn evaluating<R>(
	observer: Weak<dyn Observer>,
	func: impl FnOnce() -> R,
) -> (R, Dependencies) {
	STACK.with(|stack| {
		stack.borrow_mut().push(Frame {
			observer,
			dependencies: Dependencies::new(),
		})
	});

	let guard = PopGuard;
	let result = func();
	std::mem::forget(guard);

	let frame = STACK.with(|stack| stack.borrow_mut().pop()).unwrap();
	(result, frame.dependencies)
}

/// The innermost evaluating node, if any. A refresh triggered by a
/// tracked read notifies everyone but this node: the reader records the
/// fresh version itself, so the ping would only mark it dirty for
/// nothing.
pub(crate) fn current_observer() -> Option<Weak<dyn Observer>> {
	STACK.with(|stack| stack.borrow().last().map(|frame| frame.observer.clone()))
}

/// Registers `observable` as a dependency of the innermost evaluating
/// node, if any, and subscribes that node to it on the spot. A no-op
/// outside of evaluations.
pub(crate) fn register(observable: &Rc<dyn Observable>, version: u64) {
	let observer = STACK.with(|stack| {
		let mut stack = stack.borrow_mut();
		let top = stack.last_mut()?;
		top.dependencies.record(observable.clone(), version);
		Some(top.observer.clone())
	});

	if let Some(observer) = observer {
		observable.subscribe(observer);
	}
}
