pub use enclose::*;

/// Builds a [`Computed`](crate::Computed) from an expression, cloning
/// the listed captures into the thunk.
///
/// ```ignore
/// let x = Signal::new(2);
/// let doubled = computed!((x) => *x.get() * 2);
/// ```
#[macro_export]
macro_rules! computed {
	(( $($capture:tt)* ) => $($body:tt)*) => {
		$crate::Computed::new($crate::macros::enclose!(( $($capture)* ) move || { $($body)* }))
	};
	(=> $($body:tt)*) => {
		$crate::Computed::new(move || { $($body)* })
	};
}

/// Builds an [`Effect`](crate::Effect), cloning the listed captures
/// into the closure.
#[macro_export]
macro_rules! effect {
	(( $($capture:tt)* ) => $($body:tt)*) => {
		$crate::Effect::new($crate::macros::enclose!(( $($capture)* ) move || { $($body)* }))
	};
	(=> $($body:tt)*) => {
		$crate::Effect::new(move || { $($body)* })
	};
}
