use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::rc::Rc;

use crate::detect::Changed;
use crate::r#const::Const;
use crate::value::Value;
use crate::{Computed, Error, Signal};

/// Recursive unwrapping through reactive nodes and known container
/// shapes (sequences, maps, options, tuples).
///
/// Only known shapes recurse; there is deliberately no blanket impl, so
/// unknown iterables are left alone. Reads are untracked: unwrapping a
/// whole structure inside a thunk would otherwise subscribe the thunk
/// to every leaf.
pub trait DeepUnref {
	type Target;

	fn deep_unref(&self) -> Result<Self::Target, Error>;
}

/// Free-function form of [`DeepUnref::deep_unref`].
pub fn deep_unref<T: DeepUnref>(value: &T) -> Result<T::Target, Error> {
	value.deep_unref()
}

macro_rules! deep_unref_leaf {
	($($ty:ty),* $(,)?) => {$(
		impl DeepUnref for $ty {
			type Target = $ty;

			fn deep_unref(&self) -> Result<Self::Target, Error> {
				Ok(self.clone())
			}
		}
	)*};
}

deep_unref_leaf!(
	(),
	bool,
	char,
	u8,
	u16,
	u32,
	u64,
	u128,
	usize,
	i8,
	i16,
	i32,
	i64,
	i128,
	isize,
	f32,
	f64,
	String,
	&'static str,
);

impl<T: DeepUnref + 'static> DeepUnref for Signal<T> {
	type Target = T::Target;

	fn deep_unref(&self) -> Result<Self::Target, Error> {
		self.get_untracked().deep_unref()
	}
}

impl<T: DeepUnref + Changed + 'static> DeepUnref for Computed<T> {
	type Target = T::Target;

	fn deep_unref(&self) -> Result<Self::Target, Error> {
		self.get_untracked()?.deep_unref()
	}
}

impl<T: DeepUnref + 'static> DeepUnref for Const<T> {
	type Target = T::Target;

	fn deep_unref(&self) -> Result<Self::Target, Error> {
		self.get().deep_unref()
	}
}

impl<T: DeepUnref + 'static> DeepUnref for Value<T> {
	type Target = T::Target;

	fn deep_unref(&self) -> Result<Self::Target, Error> {
		self.get_untracked()?.deep_unref()
	}
}

impl<T: DeepUnref> DeepUnref for Rc<T> {
	type Target = T::Target;

	fn deep_unref(&self) -> Result<Self::Target, Error> {
		(**self).deep_unref()
	}
}

impl<T: DeepUnref> DeepUnref for Option<T> {
	type Target = Option<T::Target>;

	fn deep_unref(&self) -> Result<Self::Target, Error> {
		self.as_ref().map(DeepUnref::deep_unref).transpose()
	}
}

impl<T: DeepUnref> DeepUnref for Vec<T> {
	type Target = Vec<T::Target>;

	fn deep_unref(&self) -> Result<Self::Target, Error> {
		self.iter().map(DeepUnref::deep_unref).collect()
	}
}

impl<T: DeepUnref, const N: usize> DeepUnref for [T; N] {
	type Target = [T::Target; N];

	fn deep_unref(&self) -> Result<Self::Target, Error> {
		let resolved = self
			.iter()
			.map(DeepUnref::deep_unref)
			.collect::<Result<Vec<_>, _>>()?;
		// length is exactly N
		Ok(resolved.try_into().unwrap_or_else(|_| unreachable!()))
	}
}

impl<K: Clone + Ord, V: DeepUnref> DeepUnref for BTreeMap<K, V> {
	type Target = BTreeMap<K, V::Target>;

	fn deep_unref(&self) -> Result<Self::Target, Error> {
		self.iter()
			.map(|(key, value)| Ok((key.clone(), value.deep_unref()?)))
			.collect()
	}
}

impl<K: Clone + Eq + Hash, V: DeepUnref> DeepUnref for HashMap<K, V> {
	type Target = HashMap<K, V::Target>;

	fn deep_unref(&self) -> Result<Self::Target, Error> {
		self.iter()
			.map(|(key, value)| Ok((key.clone(), value.deep_unref()?)))
			.collect()
	}
}

impl<A: DeepUnref, B: DeepUnref> DeepUnref for (A, B) {
	type Target = (A::Target, B::Target);

	fn deep_unref(&self) -> Result<Self::Target, Error> {
		Ok((self.0.deep_unref()?, self.1.deep_unref()?))
	}
}

impl<A: DeepUnref, B: DeepUnref, C: DeepUnref> DeepUnref for (A, B, C) {
	type Target = (A::Target, B::Target, C::Target);

	fn deep_unref(&self) -> Result<Self::Target, Error> {
		Ok((
			self.0.deep_unref()?,
			self.1.deep_unref()?,
			self.2.deep_unref()?,
		))
	}
}
