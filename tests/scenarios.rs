use std::rc::Rc;

use shadowcache::anchor;
use shadowcache::config::CacheConfig;
use shadowcache::eval_state::EvalState;
use shadowcache::resolver::ClassifyRequest;
use shadowcache::testkit::{FixedDescriptor, HeapInt, InfallibleIntAllocator, SplitKeys, TestDict, TestInstance, TestSplitDict, TestType};
use shadowcache::value::{self, Value};

#[test]
fn scenario_tagged_int_round_trip() {
    let v = Value::from_int(42);
    assert!(v.is_int());
    assert!(!v.is_object());
    assert_eq!(v.as_int(), 42);

    let alloc = InfallibleIntAllocator;
    let boxed = unsafe { value::box_value::<HeapInt>(v, &alloc) }.unwrap();
    assert_eq!(boxed.0, 42);
    assert_eq!(value::unbox(boxed), v);
}

#[test]
fn repeated_miss_against_one_type_refreshes_in_place() {
    // A genuinely-absent slot attribute accessed repeatedly against a
    // single type must not append a fresh duplicate entry each time: the
    // installer should recognize the site already has an entry for this
    // type and refresh it, not grow the polymorphic array until it
    // permanently degrades after only one type was ever observed.
    let ty = TestType::new();
    // A plain instance dict that never gets the requested name bound.
    let instance = TestInstance { dict: Some(TestDict::new()), ..Default::default() };

    let eval = EvalState::init(vec![0u8; 2], 1, CacheConfig::default());
    let anchor = anchor::get_cache(&*ty);
    let name: Rc<str> = Rc::from("never_bound");
    let req = ClassifyRequest {
        owner_type: ty.id(),
        layout: &instance,
        split: None,
        descriptor: None,
        has_custom_getattr: false,
        is_method_call: false,
    };

    for _ in 0..8 {
        let result = eval.get_instance_attr(0, Value::NULL, &req, &name, &anchor).unwrap();
        assert_eq!(result, None);
    }

    assert_eq!(eval.shadow().site_entries(0).len(), 1, "one type must never grow past a single entry");
    assert!(!eval.shadow().is_degraded(0), "a single repeatedly-missing type must never degrade the site");
}

#[test]
fn scenario_monomorphic_attr_then_invalidation() {
    let ty = TestType::new();
    let instance = TestInstance::default();
    instance.define_slot("x", Value::from_int(7));

    let eval = EvalState::init(vec![0u8; 4], 1, CacheConfig::default());
    let anchor = anchor::get_cache(&*ty);
    let name: Rc<str> = Rc::from("x");
    let req = ClassifyRequest {
        owner_type: ty.id(),
        layout: &instance,
        split: None,
        descriptor: None,
        has_custom_getattr: false,
        is_method_call: false,
    };

    let first = eval.get_instance_attr(0, Value::NULL, &req, &name, &anchor).unwrap();
    assert_eq!(first, Some(Value::from_int(7)));

    let second = eval.get_instance_attr(0, Value::NULL, &req, &name, &anchor).unwrap();
    assert_eq!(second, Some(Value::from_int(7)));
    assert!(eval.shadow().monomorphic_attr(0).is_some());

    ty.mutate();

    let entry_before = eval.shadow().monomorphic_attr(0).unwrap();
    assert_eq!(
        entry_before.load_attr(Value::NULL, ty.id(), &instance, None),
        shadowcache::specialization::LoadOutcome::Miss,
        "entry must not hit after its type was mutated"
    );

    let third = eval.get_instance_attr(0, Value::NULL, &req, &name, &anchor).unwrap();
    assert_eq!(third, Some(Value::from_int(7)), "miss path must re-resolve successfully");
}

#[test]
fn scenario_split_dict_negative_hit_without_rescan() {
    let ty = TestType::new();
    let eval = EvalState::init(vec![0u8; 4], 1, CacheConfig::default());
    let anchor = anchor::get_cache(&*ty);
    let name: Rc<str> = Rc::from("foo");

    let keys_a = Rc::new(SplitKeys::default());
    let a_split = TestSplitDict::new(keys_a);
    a_split.set("foo", Value::from_int(1));
    let a = TestInstance { split: Some(a_split), ..Default::default() };

    let keys_b = Rc::new(SplitKeys::default());
    let b_split = TestSplitDict::new(keys_b);
    let b = TestInstance { split: Some(b_split), ..Default::default() };

    let req_b = ClassifyRequest {
        owner_type: ty.id(),
        layout: &b,
        split: b.split.as_ref().map(|s| s as &dyn shadowcache::object_model::SplitDictShape),
        descriptor: None,
        has_custom_getattr: false,
        is_method_call: false,
    };

    let first = eval.get_instance_attr(0, Value::NULL, &req_b, &name, &anchor).unwrap();
    assert_eq!(first, None, "foo was never defined on b");

    let entry = eval.shadow().monomorphic_attr(0).expect("entry installed even on a negative hit");
    let second = entry.load_attr(Value::NULL, ty.id(), &b, req_b.split);
    assert_eq!(
        second,
        shadowcache::specialization::LoadOutcome::Absent,
        "unchanged key table must trust the poisoned negative-hit without rescanning"
    );

    // Driving the same access through `EvalState` a second time must reuse
    // the installed entry rather than re-resolving and appending a
    // duplicate: the site stays monomorphic with exactly one entry.
    let repeated = eval.get_instance_attr(0, Value::NULL, &req_b, &name, &anchor).unwrap();
    assert_eq!(repeated, None, "repeated negative hit must not need full re-resolution");
    assert_eq!(eval.shadow().site_entries(0).len(), 1, "a repeated miss against the same type must not duplicate the entry");
    assert!(!eval.shadow().is_degraded(0));

    // Sanity: a's own access (different instance, different key table) hits normally.
    let req_a = ClassifyRequest {
        owner_type: ty.id(),
        layout: &a,
        split: a.split.as_ref().map(|s| s as &dyn shadowcache::object_model::SplitDictShape),
        descriptor: None,
        has_custom_getattr: false,
        is_method_call: false,
    };
    let a_value = eval.get_instance_attr(1, Value::NULL, &req_a, &name, &anchor).unwrap();
    assert_eq!(a_value, Some(Value::from_int(1)));
}

#[test]
fn scenario_polymorphic_promotion_then_permanent_degradation() {
    let eval = EvalState::init(vec![0u8; 4], 1, CacheConfig::default());
    let name: Rc<str> = Rc::from("name");

    // Five distinct types, each with its own instance, all hitting the
    // same bytecode site.
    let types: Vec<_> = (0..5).map(|_| TestType::new()).collect();
    let instances: Vec<_> = types
        .iter()
        .map(|_| {
            let inst = TestInstance::default();
            inst.define_slot("name", Value::from_int(1));
            inst
        })
        .collect();
    let anchors: Vec<_> = types.iter().map(|t| anchor::get_cache(&**t)).collect();

    for i in 0..4 {
        let req = ClassifyRequest {
            owner_type: types[i].id(),
            layout: &instances[i],
            split: None,
            descriptor: None,
            has_custom_getattr: false,
            is_method_call: false,
        };
        let result = eval.get_instance_attr(0, Value::NULL, &req, &name, &anchors[i]).unwrap();
        assert_eq!(result, Some(Value::from_int(1)));
    }
    assert_eq!(eval.shadow().site_entries(0).len(), 4);
    assert!(!eval.shadow().is_degraded(0));

    let req4 = ClassifyRequest {
        owner_type: types[4].id(),
        layout: &instances[4],
        split: None,
        descriptor: None,
        has_custom_getattr: false,
        is_method_call: false,
    };
    let fifth = eval.get_instance_attr(0, Value::NULL, &req4, &name, &anchors[4]);
    assert!(fifth.is_err(), "a fifth distinct type must force permanent degradation");
    assert!(eval.shadow().is_degraded(0));
    assert!(eval.shadow().site_entries(0).is_empty());

    let retry = eval.get_instance_attr(0, Value::NULL, &req4, &name, &anchors[4]);
    assert!(retry.is_err(), "a degraded site never caches again");
}

#[test]
fn field_cache_and_cast_type_round_trip_through_eval_state() {
    use shadowcache::specialization::{FieldCache, FieldTypeTag};

    let eval = EvalState::init(vec![0u8; 2], 0, CacheConfig::default());

    assert_eq!(eval.get_field_cache(0), None);
    eval.set_field_cache(0, FieldCache::new(16, FieldTypeTag::Int));
    assert_eq!(eval.get_field_cache(0), Some(FieldCache::new(16, FieldTypeTag::Int)));

    assert_eq!(eval.get_cast_type(0), None);
    eval.set_cast_type(0, 42);
    assert_eq!(eval.get_cast_type(0), Some(42));
}

#[test]
fn scenario_module_attribute_rebind_bumps_version() {
    let module = TestDict::new();
    module.set("f", Value::from_int(1));
    let eval = EvalState::init(vec![0u8; 2], 0, CacheConfig::default());
    let name: Rc<str> = Rc::from("f");

    assert_eq!(eval.get_module_attr(0, &name, &module), Some(Value::from_int(1)));
    assert_eq!(eval.get_module_attr(0, &name, &module), Some(Value::from_int(1)));

    module.set("f", Value::from_int(2));
    assert_eq!(eval.get_module_attr(0, &name, &module), Some(Value::from_int(2)));
}

#[test]
fn scenario_globals_and_builtins_merged_version() {
    let globals = TestDict::new();
    let builtins = TestDict::new();
    builtins.set("len", Value::from_int(99));

    let eval = EvalState::init(vec![0u8; 2], 0, CacheConfig::default());
    let name: Rc<str> = Rc::from("len");

    assert_eq!(eval.get_global(0, &name, &globals, &builtins), Some(Value::from_int(99)));

    // Mutating an unrelated global name still bumps globals' version and
    // must force a miss at the merged-version check, even though the
    // resolved binding (from builtins) is unchanged.
    globals.set("unrelated", Value::from_int(0));
    assert_eq!(eval.get_global(0, &name, &globals, &builtins), Some(Value::from_int(99)));
}

#[test]
fn no_dict_descriptor_shape_defers_to_descr_get() {
    // A type with no instance dict and no slots at all (e.g. a pure
    // `@property`): the only cacheable shape is "call the descriptor".
    let ty = TestType::new();
    let instance = TestInstance::default();
    let eval = EvalState::init(vec![0u8; 2], 1, CacheConfig::default());
    let anchor = anchor::get_cache(&*ty);
    let name: Rc<str> = Rc::from("area");
    let descriptor: Rc<dyn shadowcache::object_model::Descriptor> = Rc::new(FixedDescriptor(Value::from_int(42)));

    let req = ClassifyRequest {
        owner_type: ty.id(),
        layout: &instance,
        split: None,
        descriptor: Some((descriptor, "area")),
        has_custom_getattr: false,
        is_method_call: false,
    };

    let first = eval.get_instance_attr(0, Value::NULL, &req, &name, &anchor).unwrap();
    assert_eq!(first, Some(Value::from_int(42)));
    assert_eq!(
        eval.shadow().monomorphic_attr(0).unwrap().kind(),
        shadowcache::specialization::SpecializationKind::NoDictDescr
    );
}

#[test]
fn class_attr_hits_on_type_identity() {
    // A class-level load (`C.x`, not `c.x`) passes the type object itself
    // as `owner`. The hit check is always
    // `entry.type == type_of(owner)`; when `owner` is a type, its own
    // identity is both the cache key and the comparison target, so no
    // special-casing is needed for this to work out.
    let ty = TestType::new();
    ty.define_slot("x", Value::from_int(5));
    let eval = EvalState::init(vec![0u8; 2], 1, CacheConfig::default());
    let anchor = anchor::get_cache(&*ty);
    let name: Rc<str> = Rc::from("x");
    let req = ClassifyRequest {
        owner_type: ty.id(),
        layout: &*ty,
        split: None,
        descriptor: None,
        has_custom_getattr: false,
        is_method_call: false,
    };

    let first = eval.get_instance_attr(0, Value::NULL, &req, &name, &anchor).unwrap();
    assert_eq!(first, Some(Value::from_int(5)));
    let second = eval.get_instance_attr(0, Value::NULL, &req, &name, &anchor).unwrap();
    assert_eq!(second, Some(Value::from_int(5)));
    assert_eq!(
        eval.shadow().monomorphic_attr(0).unwrap().kind(),
        shadowcache::specialization::SpecializationKind::Slot
    );
}
