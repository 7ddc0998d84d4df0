#![no_main]

use frankenengine_intercept::{
    DispatchConfig, HandlerNameOverrides, InterceptableClass, JsValue, ObjectHeap, Operation,
    PropertyDescriptor, PropertyKey, TrapOutcome,
};
use libfuzzer_sys::fuzz_target;

const MAX_STEPS: usize = 128;
const KEYS: [&str; 4] = ["a", "b", "0", "length"];

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let config = if byte(data, 0) & 1 == 0 {
        DispatchConfig::default()
    } else {
        DispatchConfig::strict()
    };
    let Ok(mut heap) = ObjectHeap::with_config(config) else {
        return;
    };

    // Each op's handler forwards, swallows, or raises depending on one mask bit.
    let mask = u16::from_le_bytes([byte(data, 0), byte(data, 1)]);
    let mut builder = InterceptableClass::builder("Fuzzed");
    for (i, op) in Operation::ALL.into_iter().enumerate() {
        if mask & (1 << i) == 0 {
            continue;
        }
        builder = builder.on(op, move |heap, trap, default| match trap.operation {
            Operation::OwnKeys | Operation::Apply | Operation::Construct => default.invoke(heap),
            _ if i % 3 == 0 => default.invoke(heap),
            _ if i % 3 == 1 => Ok(TrapOutcome::Unit),
            _ => Ok(true.into()),
        });
    }
    let class = builder.build();

    let overrides = if byte(data, 1) & 0x80 != 0 {
        HandlerNameOverrides::new().rename(Operation::Get, "__set__")
    } else {
        HandlerNameOverrides::new()
    };
    let Ok(instance) = heap.instantiate(&class, &overrides, &[]) else {
        return;
    };
    let h = instance.handle();
    let proto = heap.alloc_plain();

    for step in data[2..].iter().take(MAX_STEPS) {
        let key = PropertyKey::from(KEYS[usize::from(step >> 4) % KEYS.len()]);
        let _ = match step & 0x0f {
            0 => heap.get_property(h, &key).map(|_| ()),
            1 => heap.set_property(h, key, JsValue::Int(i64::from(*step))).map(|_| ()),
            2 => heap.has_property(h, &key).map(|_| ()),
            3 => heap.delete_property(h, &key).map(|_| ()),
            4 => heap
                .define_property(h, key, PropertyDescriptor::data_frozen(JsValue::Null))
                .map(|_| ()),
            5 => heap.get_own_property_descriptor(h, &key).map(|_| ()),
            6 => heap.own_keys(h).map(|_| ()),
            7 => heap.get_prototype_of(h).map(|_| ()),
            8 => heap.set_prototype_of(h, Some(proto)).map(|_| ()),
            9 => heap.is_extensible(h).map(|_| ()),
            10 => heap.prevent_extensions(h).map(|_| ()),
            11 => heap.call(&instance.value(), &JsValue::Undefined, &[]).map(|_| ()),
            12 => heap.construct(&instance.value(), &[], None).map(|_| ()),
            13 => heap.keys(h).map(|_| ()),
            _ => heap.instance_of(&instance.value(), proto).map(|_| ()),
        };
    }

    let _ = heap.events().to_json_lines();
});

fn byte(data: &[u8], idx: usize) -> u8 {
    data.get(idx).copied().unwrap_or(0)
}
