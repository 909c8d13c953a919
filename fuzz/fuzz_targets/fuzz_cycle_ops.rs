#![no_main]

use std::cell::Cell;
use std::rc::Rc;

use arbitrary::Arbitrary;
use cyclekit_cache::{CacheSpec, Refresh};
use cyclekit_options::{OptionsDecl, Rule};
use cyclekit_runtime::{Lifecycle, Update};
use libfuzzer_sys::fuzz_target;
use serde_json::json;

#[derive(Debug, Arbitrary)]
enum Op {
    Mode(u8),
    Delay(i16),
    Measure(u8, i8),
    Refresh(Vec<u8>),
    Update(bool),
}

fuzz_target!(|ops: Vec<Op>| {
    let values: Rc<[Cell<i8>; 4]> = Rc::new(Default::default());
    let spec = (0u8..4).fold(CacheSpec::new(), |spec, key| {
        let values = Rc::clone(&values);
        spec.key(key, move |_, _| values[usize::from(key)].get())
    });
    let notified = Rc::new(Cell::new(0u64));
    let sink = Rc::clone(&notified);
    let mut lc = Lifecycle::builder(
        OptionsDecl::new()
            .option("mode", "a", Rule::one_of(["a", "b", "c"]))
            .option("delay", 0, Rule::range(-100.0, 100.0)),
        spec,
    )
    .build(move |update: &Update<'_, u8, i8>| {
        assert!(update.options.anything_changed() || update.cache.anything_changed());
        sink.set(sink.get() + 1);
    })
    .expect("static lifecycle");

    for op in ops {
        let cycles = lc.cycles();
        match op {
            Op::Mode(m) => {
                let mode = ["a", "b", "c", "d"][usize::from(m % 4)];
                lc.set_options(json!({ "mode": mode }));
            }
            Op::Delay(d) => {
                lc.set_options(json!({ "delay": d }));
            }
            Op::Measure(key, value) => {
                values[usize::from(key % 4)].set(value);
                continue;
            }
            Op::Refresh(keys) => {
                let keys: Vec<u8> = keys.into_iter().map(|k| k % 4).collect();
                lc.update_cache(Refresh::Keys(keys)).expect("declared keys");
            }
            Op::Update(force) => lc.update(force).expect("infallible computes"),
        }
        assert_eq!(lc.cycles(), cycles + 1);
        assert!(notified.get() <= lc.cycles());
        assert_eq!(lc.options().len(), 2);
    }
});
