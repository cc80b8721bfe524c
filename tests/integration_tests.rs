//! End-to-end tests over the simulated foreign library.
//!
//! Tests always release explicitly and assert on call counts; the Drop-based
//! safety net is covered separately and never relied on for correctness.


use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use test_harness::harness;

use tether::ir::IrDocument;
use tether::{BindError, CallArg, Generator, RawValue, resolve_references};
use tether_core::{AccessError, EntityKind, TypeDefinition};
use tether_ffi::read_cstring;

const POLL: Duration = Duration::from_millis(1);

// ===== generation pipeline =====

#[test]
fn generation_emits_one_unit_per_entity() {
    let units = Generator::default()
        .generate(test_harness::documents())
        .unwrap();
    assert_eq!(units.len(), 3);

    let point = units
        .iter()
        .find(|u| u.signature.to_string() == "geo::Point")
        .unwrap();
    assert!(point.source.contains("public class Point"));
    assert!(point.source.contains("geo_point_new"));
    assert!(point.source.contains("geo_point_property_label_string_get"));
    assert!(point.source.contains("public suspend fun fetch_label(): String"));
    // Resolution rewrote the short Vec2 reference before emission.
    assert!(point.source.contains("public val inner: Vec2"));
}

#[test]
fn duplicate_short_names_fail_generation_with_both_candidates() {
    let mut docs = test_harness::documents();
    docs.push(IrDocument::with_entities(
        "ui",
        vec![TypeDefinition::new(
            EntityKind::Struct,
            "ui",
            "Vec2",
            "ui_vec2",
        )],
    ));
    let err = resolve_references(&mut docs).unwrap_err();
    let text = err.to_string();
    assert!(text.contains("ambiguous type 'Vec2'"));
    assert!(text.contains("geo::Vec2"));
    assert!(text.contains("ui::Vec2"));
}

// ===== layout =====

#[test]
fn probed_layout_matches_the_foreign_report() {
    let h = harness();
    let entity = h.catalog.get("geo::Point").unwrap();
    let layout = entity.layout(&*h.library).unwrap();

    assert_eq!(layout.total_size, 48);
    assert_eq!(layout.field("x"), Some((0, 8)));
    assert_eq!(layout.field("hits"), Some((16, 8)));
    assert_eq!(layout.field("inner"), Some((24, 16)));
    assert_eq!(layout.field("label"), Some((40, 8)));
    // The probe report buffer was freed through the shared entry point.
    assert_eq!(h.counters.live_strings.load(Ordering::SeqCst), 0);
}

// ===== ownership =====

#[test]
fn release_is_idempotent_across_n_calls() {
    let h = harness();
    let point = h.construct_point();
    assert!(point.release().unwrap());
    for _ in 0..4 {
        assert!(!point.release().unwrap());
    }
    assert_eq!(h.counters.point_destroyed.load(Ordering::SeqCst), 1);
    assert_eq!(h.counters.live_strings.load(Ordering::SeqCst), 0);
}

#[test]
fn invalidating_the_parent_invalidates_derived_wrappers() {
    let h = harness();
    let point = h.construct_point();
    let inner = point.field_object("inner").unwrap();
    assert!(inner.is_valid());

    point.release().unwrap();
    assert!(!inner.is_valid());
    assert!(matches!(
        inner.read_field::<f64>("x"),
        Err(BindError::Access(AccessError::InvalidHandle { .. }))
    ));
    // The derived wrapper never frees: only the owner's destroy ran.
    assert_eq!(h.counters.point_destroyed.load(Ordering::SeqCst), 1);
    assert_eq!(h.counters.vec2_destroyed.load(Ordering::SeqCst), 0);
}

#[test]
fn releasing_a_derived_wrapper_leaves_the_owner_alive() {
    let h = harness();
    let point = h.construct_point();
    let inner = point.field_object("inner").unwrap();
    inner.release().unwrap();
    assert!(!inner.is_valid());
    assert!(point.is_valid());
    assert_eq!(h.counters.vec2_destroyed.load(Ordering::SeqCst), 0);
    point.release().unwrap();
}

#[test]
fn derived_wrappers_are_weakly_cached() {
    let h = harness();
    let point = h.construct_point();

    let first = point.field_object("inner").unwrap();
    let second = point.field_object("inner").unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    // Once unreachable, the cache entry silently falls away.
    drop(first);
    drop(second);
    let third = point.field_object("inner").unwrap();
    assert!(third.is_valid());
    point.release().unwrap();
}

#[test]
fn inline_field_views_share_the_parents_memory() {
    let h = harness();
    let point = h.construct_point();
    let inner = point.field_object("inner").unwrap();

    inner.write_field("x", 4.0f64).unwrap();
    inner.write_field("y", 3.0f64).unwrap();
    // inner occupies bytes 24..40 of the parent block; norm() reads x/y at
    // 0..16, so the parent's own fields are untouched.
    assert_eq!(point.read_field::<f64>("x").unwrap(), 0.0);
    assert_eq!(inner.read_field::<f64>("x").unwrap(), 4.0);
    point.release().unwrap();
}

// ===== fields and strings =====

#[test]
fn scalar_fields_round_trip() {
    let h = harness();
    let point = h.construct_point();
    point.write_field("x", 3.0f64).unwrap();
    point.write_field("y", 4.0f64).unwrap();
    assert_eq!(point.read_field::<f64>("x").unwrap(), 3.0);

    let norm = point.call("norm", Vec::new()).unwrap();
    assert_eq!(norm.float(), Some(5.0));
    point.release().unwrap();
}

#[test]
fn string_fields_copy_and_free_foreign_buffers() {
    let h = harness();
    let point = h.construct_point();
    assert_eq!(point.read_string_field("label").unwrap(), "");

    point.write_string_field("label", "origin").unwrap();
    assert_eq!(point.read_string_field("label").unwrap(), "origin");

    point.release().unwrap();
    // Every foreign buffer (probe reports, getter copies, stored label) is
    // back with the foreign side.
    assert_eq!(h.counters.live_strings.load(Ordering::SeqCst), 0);
}

#[test]
fn atomic_field_updates_lose_nothing_under_contention() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 500;

    let h = harness();
    let point = h.construct_point();

    std::thread::scope(|s| {
        for _ in 0..THREADS {
            let point = Arc::clone(&point);
            s.spawn(move || {
                for _ in 0..PER_THREAD {
                    point.update_atomic_field("hits", |v| v + 1).unwrap();
                }
            });
        }
    });

    assert_eq!(
        point.read_atomic_field("hits").unwrap(),
        (THREADS * PER_THREAD) as u64
    );
    point.release().unwrap();
}

#[test]
fn locked_fields_never_tear_under_concurrent_writers() {
    const A: f64 = 0.0;
    const B: f64 = f64::MIN_POSITIVE;

    let h = harness();
    let point = h.construct_point();
    let stop = std::sync::atomic::AtomicBool::new(false);

    std::thread::scope(|s| {
        let writer = Arc::clone(&point);
        let stop_ref = &stop;
        s.spawn(move || {
            for i in 0..2000 {
                let value = if i % 2 == 0 { A } else { B };
                writer.write_field("y", value).unwrap();
            }
            stop_ref.store(true, Ordering::SeqCst);
        });
        for _ in 0..3 {
            let reader = Arc::clone(&point);
            let stop_ref = &stop;
            s.spawn(move || {
                while !stop_ref.load(Ordering::SeqCst) {
                    let seen = reader.read_field::<f64>("y").unwrap();
                    assert!(seen == A || seen == B, "torn read: {seen}");
                }
            });
        }
    });
    point.release().unwrap();
}

#[test]
fn named_constructors_build_owned_instances() {
    let h = harness();
    let point = tether::NativeInstance::construct_via(
        h.catalog.get("geo::Point").unwrap(),
        Arc::clone(&h.catalog),
        Arc::clone(&h.library),
        "at",
        vec![
            CallArg::Value(RawValue::Float(3.0)),
            CallArg::Value(RawValue::Float(4.0)),
        ],
    )
    .unwrap();
    assert_eq!(point.read_field::<f64>("x").unwrap(), 3.0);
    let norm = point.call("norm", Vec::new()).unwrap();
    assert_eq!(norm.float(), Some(5.0));
    point.release().unwrap();
    assert_eq!(h.counters.point_destroyed.load(Ordering::SeqCst), 1);
}

#[test]
fn object_arguments_are_locked_and_not_consumed_when_borrowed() {
    let h = harness();
    let point = h.construct_point();
    let vec2 = tether::NativeInstance::construct(
        h.catalog.get("geo::Vec2").unwrap(),
        Arc::clone(&h.catalog),
        Arc::clone(&h.library),
        Vec::new(),
    )
    .unwrap();
    vec2.write_field("x", 1.5f64).unwrap();
    vec2.write_field("y", 2.5f64).unwrap();

    point
        .call("add", vec![CallArg::Object(Arc::clone(&vec2))])
        .unwrap();
    assert_eq!(point.read_field::<f64>("x").unwrap(), 1.5);
    assert_eq!(point.read_field::<f64>("y").unwrap(), 2.5);
    // Borrowed arguments stay alive and usable after the call.
    assert!(vec2.is_valid());

    vec2.release().unwrap();
    point.release().unwrap();
    assert_eq!(h.counters.vec2_destroyed.load(Ordering::SeqCst), 1);
}

// ===== panic propagation =====

#[test]
fn panic_envelopes_surface_the_foreign_message() {
    let h = harness();
    let point = h.construct_point();
    point.write_field("x", 1.0f64).unwrap();

    let err = point
        .call("scale_by", vec![CallArg::Value(RawValue::Float(0.0))])
        .unwrap_err();
    match err {
        BindError::Foreign(foreign) => {
            assert!(foreign.message.contains("non-zero"));
        }
        other => panic!("expected foreign error, got {other:?}"),
    }
    // The failed call left the instance usable.
    assert!(point.is_valid());

    point
        .call("scale_by", vec![CallArg::Value(RawValue::Float(2.0))])
        .unwrap();
    assert_eq!(point.read_field::<f64>("x").unwrap(), 2.0);

    point.release().unwrap();
    assert_eq!(h.counters.live_strings.load(Ordering::SeqCst), 0);
}

// ===== borrow views =====

#[test]
fn borrow_views_are_derivative_and_never_destroy() {
    let h = harness();
    let point = h.construct_point();
    let view = point.borrow_view().unwrap();
    point.write_field("x", 7.0f64).unwrap();
    assert_eq!(view.read_field::<f64>("x").unwrap(), 7.0);

    view.release().unwrap();
    assert_eq!(h.counters.point_destroyed.load(Ordering::SeqCst), 0);
    assert!(point.is_valid());

    point.release().unwrap();
    assert_eq!(h.counters.point_destroyed.load(Ordering::SeqCst), 1);
}

// ===== async bridge =====

#[tokio::test]
async fn async_calls_poll_to_completion() {
    let h = harness();
    let point = h.construct_point();
    point.write_string_field("label", "origin").unwrap();

    let raw = point.call_async("fetch_label", Vec::new(), POLL).await.unwrap();
    let payload = raw.ptr().unwrap();
    assert_eq!(read_cstring(payload).unwrap(), "origin");
    // Copy done; release the foreign buffer like generated code would.
    let free = tether_ffi::Handle::new(
        tether_ffi::STRING_FREE_SYMBOL,
        tether_ffi::CallConvention::empty(),
        h.library.entry_point(tether_ffi::STRING_FREE_SYMBOL).unwrap(),
    );
    free.invoke(vec![RawValue::Ptr(payload)]).unwrap();

    assert_eq!(h.counters.task_dropped.load(Ordering::SeqCst), 1);
    point.release().unwrap();
    assert_eq!(h.counters.live_strings.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn abandoned_async_calls_still_run_the_drop_entry_point() {
    let h = harness();
    let point = h.construct_point();

    let task_point = Arc::clone(&point);
    let join = tokio::spawn(async move {
        let _ = task_point.call_async("hang", Vec::new(), POLL).await;
    });

    // Abandon the call only once the foreign task is demonstrably polling.
    while h.counters.hang_polls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
    join.abort();
    let _ = join.await;

    assert_eq!(h.counters.task_dropped.load(Ordering::SeqCst), 1);
    point.release().unwrap();
}

// ===== free functions =====

#[test]
fn free_functions_call_without_instances() {
    let h = harness();
    let entity = h.catalog.get("geo::version").unwrap();
    let raw = tether::runtime::call_free(&entity, &*h.library, "version", Vec::new()).unwrap();
    assert_eq!(raw.word(), Some(0x0001_0203));
}
