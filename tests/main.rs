use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use signet::{
	computed, deep_unref, signal, Computed, Effect, Error, NodeState, Observer, Signal, Value,
};


use mock::{Probe, SharedProbe};

#[test]
fn recomputes_only_after_actual_change() {
	let runs = Rc::new(Cell::new(0));
	let x = Signal::new(2_i64);
	let doubled = Computed::new({
		let x = x.clone();
		let runs = runs.clone();
		move || {
			runs.set(runs.get() + 1);
			2 * *x.get()
		}
	});

	assert_eq!(*doubled.get().unwrap(), 4);
	assert_eq!(*doubled.get().unwrap(), 4);
	x.set(5).unwrap();
	assert_eq!(*doubled.get().unwrap(), 10);
	assert_eq!(*doubled.get().unwrap(), 10);
	assert_eq!(runs.get(), 2);
}

#[test]
fn unchanged_write_short_circuits_the_chain() {
	let y_runs = Rc::new(Cell::new(0));
	let z_runs = Rc::new(Cell::new(0));

	let x = Signal::new(3_i64);
	let y = Computed::new({
		let x = x.clone();
		let y_runs = y_runs.clone();
		move || {
			y_runs.set(y_runs.get() + 1);
			*x.get() * *x.get()
		}
	});
	let z = Computed::new({
		let y = y.clone();
		let z_runs = z_runs.clone();
		move || {
			z_runs.set(z_runs.get() + 1);
			*y.get().unwrap() + 1
		}
	});

	assert_eq!(*z.get().unwrap(), 10);

	// Same value: the detector stops the write before any propagation.
	x.set(3).unwrap();
	assert_eq!(*z.get().unwrap(), 10);
	assert_eq!(y_runs.get(), 1);
	assert_eq!(z_runs.get(), 1);
}

#[test]
fn unchanged_recompute_does_not_propagate() {
	let y_runs = Rc::new(Cell::new(0));
	let z_runs = Rc::new(Cell::new(0));

	let x = Signal::new(3_i64);
	let y = Computed::new({
		let x = x.clone();
		let y_runs = y_runs.clone();
		move || {
			y_runs.set(y_runs.get() + 1);
			*x.get() * *x.get()
		}
	});
	let z = Computed::new({
		let y = y.clone();
		let z_runs = z_runs.clone();
		move || {
			z_runs.set(z_runs.get() + 1);
			*y.get().unwrap() + 1
		}
	});

	assert_eq!(*z.get().unwrap(), 10);

	// The write changes x but not x*x: y re-evaluates once, sees an
	// unchanged result and the wave dies there.
	x.set(-3).unwrap();
	assert_eq!(*z.get().unwrap(), 10);
	assert_eq!(y_runs.get(), 2);
	assert_eq!(z_runs.get(), 1);
}

#[test]
fn nan_write_is_a_noop() {
	let x = Signal::new(f64::NAN);
	let seen = Computed::new({
		let x = x.clone();
		move || x.get().to_bits()
	});
	let _ = seen.get().unwrap();
	assert_eq!(seen.state(), NodeState::Fresh);

	x.set(f64::NAN).unwrap();
	assert_eq!(x.version(), 0);
	assert_eq!(seen.state(), NodeState::Fresh);
}

#[test]
fn optional_values_flow_through() {
	let user = Signal::new(None::<String>);
	let greeting = Computed::new({
		let user = user.clone();
		move || match &*user.get() {
			Some(name) => format!("hi {name}"),
			None => String::from("nope"),
		}
	});

	assert_eq!(*greeting.get().unwrap(), "nope");
	user.set(Some(String::from("bob"))).unwrap();
	assert_eq!(*greeting.get().unwrap(), "hi bob");
}

#[test]
fn in_place_mutation_counts_as_change() {
	let nums = Signal::new(vec![1_i64, 2, 3]);
	let total = Computed::new({
		let nums = nums.clone();
		move || nums.get().iter().sum::<i64>()
	});

	assert_eq!(*total.get().unwrap(), 6);
	nums.update(|nums| nums[0] = 9).unwrap();
	assert_eq!(*total.get().unwrap(), 14);
}

#[test]
fn same_array_contents_is_a_noop() {
	let nums = Signal::new(vec![1_i64, 2, 3]);
	let total = Computed::new({
		let nums = nums.clone();
		move || nums.get().iter().sum::<i64>()
	});
	let _ = total.get().unwrap();

	nums.set(vec![1, 2, 3]).unwrap();
	assert_eq!(nums.version(), 0);
	assert_eq!(total.state(), NodeState::Fresh);

	nums.set(vec![1, 2]).unwrap();
	assert_eq!(nums.version(), 1);
	assert_eq!(total.state(), NodeState::Stale);
	assert_eq!(*total.get().unwrap(), 3);
}

#[test]
fn indirect_cycle_is_detected() {
	let a_slot: Rc<RefCell<Option<Computed<i64>>>> = Rc::new(RefCell::new(None));

	let b = Computed::try_new({
		let a_slot = a_slot.clone();
		move || {
			let slot = a_slot.borrow();
			let a = slot.as_ref().unwrap();
			let value = *a.get()?;
			Ok(value)
		}
	});
	let a = Computed::try_new({
		let b = b.clone();
		move || Ok(*b.get()?)
	});
	*a_slot.borrow_mut() = Some(a.clone());

	let error = a.get().unwrap_err();
	assert!(error.is_cycle());
	assert_eq!(a.state(), NodeState::Stale);
	assert_eq!(b.state(), NodeState::Stale);
}

#[test]
fn self_referential_thunk_fails_without_poisoning() {
	let slot: Rc<RefCell<Option<Computed<i64>>>> = Rc::new(RefCell::new(None));
	let c = Computed::try_new({
		let slot = slot.clone();
		move || match &*slot.borrow() {
			Some(me) => Ok(*me.get()?),
			None => Ok(42),
		}
	});
	*slot.borrow_mut() = Some(c.clone());

	let error = c.get().unwrap_err();
	assert!(error.is_cycle());
	assert_eq!(c.state(), NodeState::Stale);

	// Not poisoned: the next read retries.
	*slot.borrow_mut() = None;
	assert_eq!(*c.get().unwrap(), 42);
}

#[test]
fn failing_thunk_keeps_previous_value_and_retries() {
	let fail = Rc::new(Cell::new(false));
	let x = Signal::new(1_i64);
	let c = Computed::try_new({
		let fail = fail.clone();
		let x = x.clone();
		move || {
			let value = *x.get();
			if fail.get() {
				return Err("boom".into());
			}
			Ok(value * 10)
		}
	});

	assert_eq!(*c.get().unwrap(), 10);

	fail.set(true);
	x.set(2).unwrap();
	assert!(matches!(c.get().unwrap_err(), Error::Thunk(_)));
	assert_eq!(c.state(), NodeState::Stale);

	fail.set(false);
	assert_eq!(*c.get().unwrap(), 20);
}

#[test]
fn staleness_propagates_without_recomputation() {
	let y_runs = Rc::new(Cell::new(0));
	let z_runs = Rc::new(Cell::new(0));

	let x = Signal::new(2_i64);
	let y = Computed::new({
		let x = x.clone();
		let y_runs = y_runs.clone();
		move || {
			y_runs.set(y_runs.get() + 1);
			*x.get() + 1
		}
	});
	let z = Computed::new({
		let y = y.clone();
		let z_runs = z_runs.clone();
		move || {
			z_runs.set(z_runs.get() + 1);
			*y.get().unwrap() * 2
		}
	});

	assert_eq!(*z.get().unwrap(), 6);
	let y_version = y.version();
	let z_version = z.version();

	x.set(5).unwrap();

	// The wave is bookkeeping only.
	assert_eq!(y.state(), NodeState::Stale);
	assert_eq!(z.state(), NodeState::Stale);
	assert_eq!(y.version(), y_version);
	assert_eq!(z.version(), z_version);
	assert_eq!(y_runs.get(), 1);
	assert_eq!(z_runs.get(), 1);

	assert_eq!(*z.get().unwrap(), 12);
	assert_eq!(y_runs.get(), 2);
	assert_eq!(z_runs.get(), 2);
}

#[test]
fn diamond_recomputes_each_node_once() {
	let b_runs = Rc::new(Cell::new(0));
	let c_runs = Rc::new(Cell::new(0));
	let d_runs = Rc::new(Cell::new(0));

	let a = Signal::new(1_i64);
	let b = Computed::new({
		let a = a.clone();
		let b_runs = b_runs.clone();
		move || {
			b_runs.set(b_runs.get() + 1);
			*a.get() + 1
		}
	});
	let c = Computed::new({
		let a = a.clone();
		let c_runs = c_runs.clone();
		move || {
			c_runs.set(c_runs.get() + 1);
			*a.get() + 2
		}
	});
	let d = Computed::new({
		let b = b.clone();
		let c = c.clone();
		let d_runs = d_runs.clone();
		move || {
			d_runs.set(d_runs.get() + 1);
			*b.get().unwrap() + *c.get().unwrap()
		}
	});

	assert_eq!(*d.get().unwrap(), 5);
	a.set(10).unwrap();
	assert_eq!(*d.get().unwrap(), 23);
	assert_eq!(b_runs.get(), 2);
	assert_eq!(c_runs.get(), 2);
	assert_eq!(d_runs.get(), 2);
}

#[test]
fn dependencies_are_recollected_each_evaluation() {
	let use_left = Signal::new(true);
	let left = Signal::new(1_i64);
	let right = Signal::new(100_i64);
	let pick = Computed::new({
		let use_left = use_left.clone();
		let left = left.clone();
		let right = right.clone();
		move || {
			if *use_left.get() {
				*left.get()
			} else {
				*right.get()
			}
		}
	});

	assert_eq!(*pick.get().unwrap(), 1);
	assert_eq!(pick.dependency_count(), 2);
	assert_eq!(left.subscriber_count(), 1);
	assert_eq!(right.subscriber_count(), 0);

	use_left.set(false).unwrap();
	assert_eq!(*pick.get().unwrap(), 100);
	assert_eq!(left.subscriber_count(), 0);
	assert_eq!(right.subscriber_count(), 1);

	// A write to the abandoned branch no longer disturbs the node.
	left.set(2).unwrap();
	assert_eq!(pick.state(), NodeState::Fresh);
}

#[test]
fn invalidate_picks_up_rewired_dependencies() {
	let slot: Rc<RefCell<Signal<i64>>> = Rc::new(RefCell::new(Signal::new(1)));
	let through = Computed::new({
		let slot = slot.clone();
		move || *slot.borrow().get()
	});

	assert_eq!(*through.get().unwrap(), 1);

	// The reseat happens through a channel the engine cannot observe.
	*slot.borrow_mut() = Signal::new(10);
	assert_eq!(*through.get().unwrap(), 1);

	through.invalidate().unwrap();
	assert_eq!(*through.get().unwrap(), 10);
}

#[test]
fn invalidate_defeats_the_fast_path() {
	let runs = Rc::new(Cell::new(0));
	let x = Signal::new(7_i64);
	let c = Computed::new({
		let x = x.clone();
		let runs = runs.clone();
		move || {
			runs.set(runs.get() + 1);
			*x.get()
		}
	});

	assert_eq!(*c.get().unwrap(), 7);
	let version = c.version();

	c.invalidate().unwrap();
	assert_eq!(*c.get().unwrap(), 7);

	// The thunk ran again, but the unchanged result did not bump the
	// version.
	assert_eq!(runs.get(), 2);
	assert_eq!(c.version(), version);
}

#[test]
fn scoped_override_restores_on_all_exit_paths() {
	let x = Signal::new(1_i64);

	{
		let _guard = x.at(5).unwrap();
		assert_eq!(*x.get_untracked(), 5);
	}
	assert_eq!(*x.get_untracked(), 1);

	// The exit restores the value captured at enter, overwriting any
	// intervening write.
	{
		let _guard = x.at(5).unwrap();
		x.set(99).unwrap();
	}
	assert_eq!(*x.get_untracked(), 1);

	let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
		let _guard = x.at(7).unwrap();
		panic!("boom");
	}));
	assert!(result.is_err());
	assert_eq!(*x.get_untracked(), 1);
}

#[test]
fn scoped_override_notifies_dependents_twice() {
	let x = Signal::new(1_i64);
	let mirror = x.map(|value| *value);
	let _ = mirror.get().unwrap();
	let before = x.version();

	{
		let _guard = x.at(2).unwrap();
		assert_eq!(*mirror.get().unwrap(), 2);
	}

	assert_eq!(*mirror.get().unwrap(), 1);
	assert_eq!(x.version(), before + 2);
}

#[test]
fn notifies_in_subscription_order() {
	let order: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
	let x = Signal::new(0_i64);

	let _first = Effect::new({
		let x = x.clone();
		let order = order.clone();
		move || {
			let _ = x.get();
			order.borrow_mut().push("first");
		}
	})
	.unwrap();
	let _second = Effect::new({
		let x = x.clone();
		let order = order.clone();
		move || {
			let _ = x.get();
			order.borrow_mut().push("second");
		}
	})
	.unwrap();

	order.borrow_mut().clear();
	x.set(1).unwrap();
	assert_eq!(*order.borrow(), ["first", "second"]);
}

struct FailingObserver;

impl Observer for FailingObserver {
	fn dependency_changed(&self) -> Result<(), Error> {
		Err(Error::Thunk("observer failure".into()))
	}
}

struct CountingObserver {
	seen: Cell<usize>,
}

impl Observer for CountingObserver {
	fn dependency_changed(&self) -> Result<(), Error> {
		self.seen.set(self.seen.get() + 1);
		Ok(())
	}
}

#[test]
fn observer_failures_compose_and_do_not_stop_delivery() {
	let x = Signal::new(0_i64);
	let failing = Rc::new(FailingObserver);
	let counting = Rc::new(CountingObserver {
		seen: Cell::new(0),
	});

	x.subscribe(Rc::downgrade(&failing) as Weak<dyn Observer>);
	x.subscribe(Rc::downgrade(&counting) as Weak<dyn Observer>);

	let error = x.set(1).unwrap_err();
	match error {
		Error::Observers(failures) => assert_eq!(failures.len(), 1),
		other => panic!("expected a composite error, got {other:?}"),
	}

	// The later subscriber was still notified, and the write happened.
	assert_eq!(counting.seen.get(), 1);
	assert_eq!(x.version(), 1);
	assert_eq!(*x.get_untracked(), 1);
}

struct OneShot {
	source: Signal<i64>,
	fired: Cell<usize>,
	this: Weak<OneShot>,
}

impl Observer for OneShot {
	fn dependency_changed(&self) -> Result<(), Error> {
		self.fired.set(self.fired.get() + 1);
		self.source
			.unsubscribe(&(self.this.clone() as Weak<dyn Observer>));
		Ok(())
	}
}

#[test]
fn observer_may_unsubscribe_itself_during_notification() {
	let x = Signal::new(0_i64);
	let one_shot = Rc::new_cyclic(|this| OneShot {
		source: x.clone(),
		fired: Cell::new(0),
		this: this.clone(),
	});
	x.subscribe(Rc::downgrade(&one_shot) as Weak<dyn Observer>);

	x.set(1).unwrap();
	x.set(2).unwrap();
	assert_eq!(one_shot.fired.get(), 1);
}

#[test]
fn effect_reruns_once_per_change() {
	let probe = SharedProbe::new();
	let a = Signal::new(10_i64);
	let b = Computed::new({
		let a = a.clone();
		move || *a.get() + 10
	});

	probe
		.get()
		.expect_trigger()
		.with(mockall::predicate::eq(20))
		.times(1)
		.return_const(());
	let watcher = Effect::new({
		let b = b.clone();
		let probe = probe.clone();
		move || {
			probe.get().trigger(*b.get().unwrap());
		}
	})
	.unwrap();
	probe.get().checkpoint();

	probe
		.get()
		.expect_trigger()
		.with(mockall::predicate::eq(30))
		.times(1)
		.return_const(());
	a.set(20).unwrap();
	probe.get().checkpoint();

	// An unchanged write never reaches the effect.
	probe.get().expect_trigger().times(0).return_const(());
	a.set(20).unwrap();
	probe.get().checkpoint();

	drop(watcher);
}

#[test]
fn effect_failure_surfaces_to_the_writer() {
	let x = Signal::new(0_i64);
	let fail = Rc::new(Cell::new(false));
	let _watcher = Effect::try_new({
		let x = x.clone();
		let fail = fail.clone();
		move || {
			let _ = x.get();
			if fail.get() {
				return Err("effect failure".into());
			}
			Ok(())
		}
	})
	.unwrap();

	fail.set(true);
	let error = x.set(1).unwrap_err();
	assert!(matches!(error, Error::Observers(_)));
	assert_eq!(x.version(), 1);
}

#[test]
fn erased_handles_collapse() {
	let x = Signal::new(5_i64);
	let reactive: Value<i64> = x.clone().into();
	assert!(reactive.is_reactive());
	assert_eq!(reactive.unref().unwrap(), 5);

	let plain: Value<i64> = 7.into();
	assert!(!plain.is_reactive());
	assert_eq!(plain.unref().unwrap(), 7);

	let inner: Value<i64> = Value::from(x.clone());
	let nested: Value<Value<i64>> = Value::<Value<i64>>::from(inner);
	let flat = nested.flatten().unwrap();
	assert_eq!(flat.unref().unwrap(), 5);

	x.set(6).unwrap();
	assert_eq!(flat.unref().unwrap(), 6);
	assert_eq!(nested.flatten().unwrap().unref().unwrap(), 6);
}

#[test]
fn deep_unref_resolves_known_containers() {
	let items = vec![Signal::new(1_i64), Signal::new(2), Signal::new(3)];
	assert_eq!(deep_unref(&items).unwrap(), vec![1, 2, 3]);

	let nested = Signal::new(vec![Signal::new(4_i64), Signal::new(5)]);
	assert_eq!(deep_unref(&nested).unwrap(), vec![4, 5]);

	let fixed = [Signal::new(7_i64), Signal::new(8)];
	assert_eq!(deep_unref(&fixed).unwrap(), [7, 8]);

	let pair = (Signal::new(1_i64), Some(Signal::new(2_i64)));
	assert_eq!(deep_unref(&pair).unwrap(), (1, Some(2)));
}

#[test]
fn map_toggle_and_naming() {
	let flag = Signal::new(false).named("flag");
	let inverted = flag.map(|flag| !*flag).named("inverted");

	assert!(*inverted.get().unwrap());
	flag.toggle().unwrap();
	assert!(!*inverted.get().unwrap());

	assert_eq!(flag.name().as_deref(), Some("flag"));
	assert_eq!(inverted.name().as_deref(), Some("inverted"));
	assert_eq!(format!("{flag:?}"), "true");
}

#[test]
fn free_constructors_and_macros() {
	let x = signal(2_i64);
	let doubled = computed({
		let x = x.clone();
		move || *x.get() * 2
	});
	assert_eq!(*doubled.get().unwrap(), 4);

	let tripled = signet::computed!((x) => *x.get() * 3);
	assert_eq!(*tripled.get().unwrap(), 6);

	let seen = Rc::new(Cell::new(0_i64));
	let _watcher = signet::effect!((x, seen) => seen.set(*x.get())).unwrap();
	x.set(9).unwrap();
	assert_eq!(seen.get(), 9);
	assert_eq!(*tripled.get().unwrap(), 27);
}

#[derive(Default)]
struct CountingHook {
	created: Cell<usize>,
	named: Cell<usize>,
	reads: Cell<usize>,
	updates: Cell<usize>,
}

impl signet::Hook for CountingHook {
	fn created(&self, _: &dyn signet::Node) {
		self.created.set(self.created.get() + 1);
	}

	fn named(&self, node: &dyn signet::Node) {
		assert_eq!(node.name().as_deref(), Some("x"));
		self.named.set(self.named.get() + 1);
	}

	fn read(&self, _: &dyn signet::Node) {
		self.reads.set(self.reads.get() + 1);
	}

	fn updated(&self, _: &dyn signet::Node) {
		self.updates.set(self.updates.get() + 1);
	}
}

#[test]
fn hooks_observe_the_node_lifecycle() {
	signet::clear_hooks();
	let hook = Rc::new(CountingHook::default());
	signet::add_hook(hook.clone());

	let x = Signal::new(1_i64).named("x");
	assert_eq!(hook.created.get(), 1);
	assert_eq!(hook.named.get(), 1);

	let _ = x.get_untracked();
	assert_eq!(hook.reads.get(), 1);

	x.set(2).unwrap();
	assert_eq!(hook.updates.get(), 1);

	// An unchanged write is invisible to hooks too.
	x.set(2).unwrap();
	assert_eq!(hook.updates.get(), 1);

	let doubled = Computed::new({
		let x = x.clone();
		move || *x.get() * 2
	});
	assert_eq!(hook.created.get(), 2);
	let _ = doubled.get().unwrap();
	assert_eq!(hook.updates.get(), 2);

	signet::clear_hooks();
	x.set(3).unwrap();
	assert_eq!(hook.updates.get(), 2);
}

#[derive(Clone)]
struct Incomparable(i64);

impl signet::Changed for Incomparable {
	fn changed(&self, _: &Self) -> bool {
		panic!("no comparison defined");
	}
}

#[test]
fn panicking_detector_counts_as_changed() {
	let x = Signal::new(Incomparable(1));
	let counter = Rc::new(CountingObserver {
		seen: Cell::new(0),
	});
	x.subscribe(Rc::downgrade(&counter) as Weak<dyn Observer>);

	// The comparison panic is swallowed; the write conservatively
	// counts as a change and propagates.
	x.set(Incomparable(2)).unwrap();
	assert_eq!(x.version(), 1);
	assert_eq!(counter.seen.get(), 1);
	assert_eq!(x.get_untracked().0, 2);
}
