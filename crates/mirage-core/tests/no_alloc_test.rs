//! Hot-path allocation accounting.
//!
//! Query-mode lookups must not touch the heap for inputs that fit the
//! stack buffer. A counting allocator wraps the system one for this test
//! binary; the assertion is a straight before/after comparison around a
//! batch of queries.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};

use mirage_core::RedirectionManager;

struct CountingAllocator;

static ALLOCATION_COUNT: AtomicU64 = AtomicU64::new(0);

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        ALLOCATION_COUNT.fetch_add(1, Ordering::Relaxed);
        System.alloc(layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        ALLOCATION_COUNT.fetch_add(1, Ordering::Relaxed);
        System.realloc(ptr, layout, new_size)
    }
}

#[global_allocator]
static GLOBAL: CountingAllocator = CountingAllocator;

fn allocations() -> u64 {
    ALLOCATION_COUNT.load(Ordering::Relaxed)
}

#[test]
fn test_query_mode_lookups_do_not_allocate() {
    let manager = RedirectionManager::new();
    manager
        .add_redirect("C:\\game\\data\\a.bin", "C:\\mod\\a.bin")
        .unwrap();
    manager
        .add_redirect("C:\\game\\data\\sub\\b.bin", "C:\\mod\\sub\\b.bin")
        .unwrap();
    manager.optimise();

    // Warm up so lazily initialized state is out of the way.
    manager.resolve_file("C:\\GAME\\DATA\\A.BIN", |t| assert!(t.is_some()));
    manager.resolve_file("C:\\GAME\\DATA\\MISS.BIN", |t| assert!(t.is_none()));

    let before = allocations();
    for _ in 0..1000 {
        manager.resolve_file("C:\\GAME\\DATA\\A.BIN", |t| assert!(t.is_some()));
        manager.resolve_file("c:\\game\\data\\sub\\b.bin", |t| assert!(t.is_some()));
        manager.resolve_file("C:\\GAME\\DATA\\MISS.BIN", |t| assert!(t.is_none()));
        manager.resolve_file("D:\\ELSEWHERE\\X.BIN", |t| assert!(t.is_none()));
        manager.resolve_folder("C:\\GAME\\DATA", |f| assert!(f.is_some()));
    }
    let after = allocations();

    assert_eq!(after, before, "hot-path queries must not allocate");
}

#[test]
fn test_long_paths_may_fall_back_to_heap() {
    let manager = RedirectionManager::new();
    manager
        .add_redirect("C:\\game\\data\\a.bin", "C:\\mod\\a.bin")
        .unwrap();
    manager.optimise();

    // Longer than the stack buffer: still answers correctly, allocation
    // allowed.
    let long = format!("C:\\GAME\\{}\\A.BIN", "LONG\\".repeat(200));
    manager.resolve_file(&long, |t| assert!(t.is_none()));
}
