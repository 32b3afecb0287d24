//! Full hook-layer lifecycle: open decision, handle registration,
//! enumeration, deferred close.

use mirage_config::testing::TestEnvironment;
use mirage_core::{path, RedirectionManager};
use mirage_hooks::close_queue::ClosedHandleQueue;
use mirage_hooks::guard::ReentrancyGuard;
use mirage_hooks::{
    register_directory_handle, resolve_open, HandleRegistry, OpenDisposition,
};

fn manager_from_env(env: &TestEnvironment) -> RedirectionManager {
    env.create_overlay("mod-a").unwrap();
    env.create_overlay_file("mod-a", "a.bin", b"mod").unwrap();
    env.create_overlay_file("mod-a", "sub/b.bin", b"mod").unwrap();

    let manager = RedirectionManager::new();
    manager
        .add_redirect_folder(
            env.base_dir.to_str().unwrap(),
            env.overlays_dir.join("mod-a").to_str().unwrap(),
        )
        .unwrap();
    manager.optimise();
    manager
}

#[test]
fn test_open_redirects_into_overlay() {
    let env = TestEnvironment::new().unwrap();
    let manager = manager_from_env(&env);
    let guard = ReentrancyGuard::new();

    let base_upper = path::normalize(env.base_dir.to_str().unwrap());
    let overlay_upper = path::normalize(env.overlays_dir.join("mod-a").to_str().unwrap());

    let disposition = resolve_open(&manager, &guard, &format!("{base_upper}\\A.BIN"));
    assert_eq!(
        disposition,
        OpenDisposition::Redirect(format!("{overlay_upper}\\A.BIN"))
    );

    let miss = resolve_open(&manager, &guard, &format!("{base_upper}\\MISSING.BIN"));
    assert_eq!(miss, OpenDisposition::Passthrough);
}

#[test]
fn test_handle_registration_only_for_overlaid_directories() {
    let env = TestEnvironment::new().unwrap();
    let manager = manager_from_env(&env);
    let registry = HandleRegistry::new();

    let base = env.base_dir.to_str().unwrap().to_string();
    register_directory_handle(&manager, &registry, 0x40, &base);
    assert!(registry.contains(0x40));

    register_directory_handle(&manager, &registry, 0x44, "C:\\SOMEWHERE\\ELSE");
    assert!(!registry.contains(0x44));
}

#[test]
fn test_close_is_deferred_until_drain() {
    let env = TestEnvironment::new().unwrap();
    let manager = manager_from_env(&env);
    let registry = HandleRegistry::new();
    let queue = ClosedHandleQueue::new();

    let base = env.base_dir.to_str().unwrap().to_string();
    register_directory_handle(&manager, &registry, 0x40, &base);

    // The close interceptor only queues; the entry survives until the next
    // hook entry drains.
    queue.push(0x40);
    assert!(registry.contains(0x40));

    registry.drain_closed(&queue);
    assert!(!registry.contains(0x40));
    assert!(queue.is_empty());
}

#[test]
fn test_loading_event_fires_on_open() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let env = TestEnvironment::new().unwrap();
    let manager = manager_from_env(&env);
    let guard = ReentrancyGuard::new();

    let loads = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&loads);
    manager.events().on_loading(move |_| {
        seen.fetch_add(1, Ordering::Relaxed);
    });

    let base_upper = path::normalize(env.base_dir.to_str().unwrap());
    let _ = resolve_open(&manager, &guard, &format!("{base_upper}\\A.BIN"));
    let _ = resolve_open(&manager, &guard, &format!("{base_upper}\\MISSING.BIN"));

    // Loading fires on every intercepted open, hit or miss.
    assert_eq!(loads.load(Ordering::Relaxed), 2);
}
