//! Tests for the synthetic-children hooks and session caches

mod common;

use std::rc::Rc;

use common::{tag, FakeHeap};
use heapscope_core::inspect::Provider;
use heapscope_core::prelude::*;

fn triple() -> (FakeHeap, TypeInfoAddress, ObjectAddress, ObjectAddress)
{
    let mut heap = FakeHeap::new();
    let ty = heap.define_type("demo.Triple", &[("a", tag::INT32), ("b", tag::INT32), ("c", tag::OBJECT)]);
    let first = heap.new_object(ty);
    let second = heap.new_object(ty);
    heap.set_field(first, 0, 1);
    heap.set_field(first, 1, 2);
    heap.set_field(first, 2, second.address().value());
    (heap, ty, first, second)
}

#[test]
fn test_object_children_hooks()
{
    let (heap, _, first, second) = triple();
    let mut session = common::session(heap);

    assert_eq!(session.num_children(first).unwrap(), 3);
    assert!(session.has_children(first).unwrap());
    assert_eq!(session.child_index(first, "b").unwrap(), Some(1));
    assert_eq!(session.child_index(first, "missing").unwrap(), None);

    let child = session.child_at(first, 1).unwrap().unwrap();
    assert_eq!(child.name, "b");
    assert_eq!(child.kind, FieldKind::Int32);
    assert_eq!(child.value, FieldValue::Int32(2));
    assert_eq!(child.address, first.address() + 16);

    let reference = session.child_at(first, 2).unwrap().unwrap();
    assert_eq!(reference.value, FieldValue::Reference(second));
    assert_eq!(session.child_at(first, 3).unwrap(), None);
}

#[test]
fn test_reference_children_are_read_on_first_access()
{
    let (heap, _, first, _) = triple();
    let mut session = common::session(heap);

    session.num_children(first).unwrap();
    session.host().reset_counts();

    session.child_at(first, 2).unwrap();
    assert_eq!(session.host().reads(), 1);
    session.child_at(first, 2).unwrap();
    assert_eq!(session.host().reads(), 1);
}

#[test]
fn test_strings_have_no_children()
{
    let mut heap = FakeHeap::new();
    let text = heap.new_string("hi");
    let mut session = common::session(heap);

    assert_eq!(session.num_children(text).unwrap(), 0);
    assert_eq!(session.child_index(text, "0").unwrap(), None);
    assert_eq!(session.child_at(text, 0).unwrap(), None);
}

#[test]
fn test_providers_are_cached_by_address()
{
    let (heap, _, first, _) = triple();
    let mut session = common::session(heap);

    let a = session.provider(first).unwrap();
    let b = session.provider(first).unwrap();
    assert!(Rc::ptr_eq(&a, &b));
    assert_eq!(a.borrow().shape(), Shape::Object);
    assert_eq!(session.objects().len(), 1);
}

#[test]
fn test_instances_of_a_type_share_one_layout()
{
    let (heap, ty, first, second) = triple();
    let mut session = common::session(heap);

    let first = session.provider(first).unwrap();
    let second = session.provider(second).unwrap();
    let (first, second) = (first.borrow(), second.borrow());
    let (Provider::Object(a), Provider::Object(b)) = (&*first, &*second) else {
        panic!("expected object providers");
    };
    assert!(Rc::ptr_eq(a.layout(), b.layout()));
    assert_eq!(a.type_info(), ty);
    assert_eq!(a.num_fields(), 3);
    assert_eq!(a.field(1).map(|field| field.name()), Some("b"));
    assert_eq!(a.layout().len(), 3);
    let offsets: Vec<u64> = a.layout().iter().map(|field| field.offset()).collect();
    assert_eq!(offsets, [8, 16, 24]);
    assert_eq!(session.layouts().len(), 1);
    assert!(session.layouts().contains(ty));
}

#[test]
fn test_clear_caches_forces_layout_rebuild()
{
    let (heap, ty, first, _) = triple();
    let mut session = common::session(heap);

    session.summary(first).unwrap();
    session.clear_caches();
    assert!(session.layouts().is_empty());
    assert!(session.objects().is_empty());

    session.host().reset_counts();
    session.summary(first).unwrap();
    assert_eq!(session.host().calls("Konan_DebugGetFieldCount"), 1);
    assert!(session.layouts().contains(ty));
}

#[test]
fn test_invalidate_objects_keeps_layouts()
{
    let (heap, _, first, _) = triple();
    let mut session = common::session(heap);

    session.summary(first).unwrap();
    session.invalidate_objects();
    assert!(session.objects().is_empty());
    assert_eq!(session.layouts().len(), 1);

    session.host().reset_counts();
    session.summary(first).unwrap();
    // Both objects are resolved again; the shared layout is not rebuilt
    assert_eq!(session.host().calls("resolve"), 2);
    assert_eq!(session.host().calls("Konan_DebugGetFieldCount"), 0);
}

#[test]
fn test_failed_construction_is_not_cached()
{
    let mut heap = FakeHeap::new();
    // Allocated last, so its elements lie past the end of mapped memory
    let array = heap.new_array_claiming(tag::INT32, &[], 4);
    let mut session = common::session(heap);

    assert!(matches!(session.summary(array), Err(InspectError::MemoryReadFailure { .. })));
    assert!(!session.objects().contains(array));
}

#[test]
fn test_sessions_do_not_share_state()
{
    let (heap, _, first, _) = triple();
    let (other_heap, _, other_first, _) = triple();
    let mut session = common::session(heap);
    let other = common::session(other_heap);

    session.summary(first).unwrap();
    assert_eq!(session.layouts().len(), 1);
    assert!(other.layouts().is_empty());
    assert!(!other.objects().contains(other_first));
}
