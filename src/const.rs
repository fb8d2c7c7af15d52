use std::rc::{Rc, Weak};

use crate::hooks::{Node, NodeId, NodeKind};
use crate::value::{Access, Ref};
use crate::{Error, Observable, Observer};

/// An immutable node: its version never advances and subscriptions are
/// no-ops, so dependents never re-evaluate because of it.
pub struct Const<T> {
	body: Rc<ConstBody<T>>,
}

struct ConstBody<T> {
	value: T,
}

impl<T> Clone for Const<T> {
	fn clone(&self) -> Self {
		Const {
			body: self.body.clone(),
		}
	}
}

impl<T: 'static> Const<T> {
	pub fn new(value: T) -> Self {
		Const {
			body: Rc::new(ConstBody { value }),
		}
	}

	pub fn get(&self) -> &T {
		&self.body.value
	}

	pub(crate) fn into_access(self) -> Rc<dyn Access<T>> {
		self.body
	}
}

impl<T: 'static> Observable for ConstBody<T> {
	fn refresh(&self) -> Result<u64, Error> {
		Ok(0)
	}

	fn version(&self) -> u64 {
		0
	}

	fn subscribe(&self, _: Weak<dyn Observer>) {}

	fn unsubscribe(&self, _: &Weak<dyn Observer>) {}
}

impl<T: 'static> Access<T> for ConstBody<T> {
	fn get(&self) -> Result<Ref<'_, T>, Error> {
		Ok(Ref::Plain(&self.value))
	}

	fn get_untracked(&self) -> Result<Ref<'_, T>, Error> {
		Ok(Ref::Plain(&self.value))
	}
}

impl<T: 'static> Node for ConstBody<T> {
	fn id(&self) -> NodeId {
		NodeId(self as *const Self as *const () as usize)
	}

	fn kind(&self) -> NodeKind {
		NodeKind::Const
	}

	fn name(&self) -> Option<Rc<str>> {
		None
	}
}
