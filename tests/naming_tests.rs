mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use tolc_synth::NameAllocator;

#[test]
fn test_concurrent_allocation_never_repeats() {
    common::init_logging();
    let allocator = Arc::new(NameAllocator::with_root("concurrent"));

    let names: Vec<String> = thread::scope(|scope| {
        let workers: Vec<_> = (0..50)
            .map(|_| {
                let allocator = allocator.clone();
                scope.spawn(move || {
                    (0..1000)
                        .map(|_| allocator.create_class_name("demo.Greeter").fully_qualified_name().to_string())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        workers.into_iter().flat_map(|worker| worker.join().unwrap()).collect()
    });

    assert_eq!(names.len(), 50_000);
    let unique: HashSet<&String> = names.iter().collect();
    assert_eq!(unique.len(), 50_000);
    assert!(names.iter().all(|name| name.starts_with("generated.concurrent.demo.Greeter")));
}

#[test]
fn test_shared_allocator_is_process_wide() {
    let first = NameAllocator::shared();
    let second = NameAllocator::shared();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.root(), "tolc");

    let a = first.create_class_name("demo.Api");
    let b = second.create_class_name("demo.Api");
    assert_ne!(a, b);
    assert_eq!(a.package_name(), "generated.tolc.demo");
}

#[test]
fn test_nested_and_unpackaged_hints() {
    let allocator = NameAllocator::with_root("shape");
    let nested = allocator.create_class_name("demo.Outer$Inner");
    assert_eq!(nested.to_string(), "generated.shape.demo.Outer.Inner1");

    let bare = allocator.create_class_name("Task");
    assert_eq!(bare.package_name(), "generated.shape");
    assert_eq!(bare.simple_name(), "Task2");
}
