#![no_main]

use cyclekit_options::{Options, OptionsDecl, Rule, ValueKinds, revalidate};
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    let Ok(Value::Object(candidate)) = serde_json::from_slice::<Value>(data) else {
        return;
    };
    let resolved = OptionsDecl::new()
        .option("mode", "auto", Rule::one_of(["auto", "on", "off"]))
        .option("delay", 800, Rule::range(0.0, 5000.0))
        .group(
            "inner",
            OptionsDecl::new()
                .value("enabled", true)
                .nullable("extra", Rule::kinds(ValueKinds::OBJECT | ValueKinds::NULL)),
        )
        .resolve()
        .expect("static template");

    let (mut options, _) = Options::initialize(&candidate, &resolved);
    assert!(resolved.template.matches_shape(options.as_map()));

    let delta = revalidate(&candidate, &resolved.template, options.as_map());
    options.apply(&delta);
    assert!(resolved.template.matches_shape(options.as_map()));

    let again = revalidate(&candidate, &resolved.template, options.as_map());
    assert!(again.is_empty(), "revalidating an applied candidate must be a no-op");
});
