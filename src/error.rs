/// User-side failure carried through thunks and observers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// A thunk tried to read a node that is currently evaluating,
	/// either directly or through a longer dependency chain.
	#[error("cyclic evaluation: `{0}` was read while computing itself")]
	Cycle(String),

	/// The thunk of a derived node failed. The node stays stale with
	/// its previous value and edges; the next read retries.
	#[error("computed thunk failed")]
	Thunk(#[source] BoxError),

	/// One or more observers failed while a change was delivered. The
	/// write itself has happened: value and version are updated, and
	/// every remaining subscriber was still notified in order.
	#[error("{} observer(s) failed during notification", .0.len())]
	Observers(Vec<Error>),
}

impl Error {
	/// True when a cyclic evaluation is anywhere in the error chain.
	pub fn is_cycle(&self) -> bool {
		match self {
			Error::Cycle(_) => true,
			Error::Thunk(source) => source
				.downcast_ref::<Error>()
				.map_or(false, Error::is_cycle),
			Error::Observers(errors) => errors.iter().any(Error::is_cycle),
		}
	}
}
