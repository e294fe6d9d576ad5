//! Driver pool tests
//!
//! Reservation across several simulated NPUs, including concurrent callers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ethosu_driver::{Driver, DriverConfig, DriverPool, PayloadBuilder, SimConfig, SimulatedNpu};

fn pool_of(n: usize) -> (Arc<DriverPool>, Vec<(SimulatedNpu, Arc<Driver>)>) {
    let pool = Arc::new(DriverPool::new());
    let npus: Vec<_> = (0..n)
        .map(|_| {
            let sim = SimulatedNpu::new(SimConfig::default());
            let drv = sim.connect(DriverConfig::default()).expect("driver init");
            pool.register(Arc::clone(&drv)).expect("register");
            (sim, drv)
        })
        .collect();
    (pool, npus)
}

// ── Scenario C ───────────────────────────────────────────────────────────────

#[test]
fn third_reserve_blocks_until_release() {
    let (pool, _npus) = pool_of(2);

    let first = pool.reserve();
    let second = pool.reserve();
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(first.is_reserved());
    assert!(second.is_reserved());

    let reserved = Arc::new(AtomicUsize::new(0));
    let waiter = {
        let pool = Arc::clone(&pool);
        let reserved = Arc::clone(&reserved);
        thread::spawn(move || {
            let drv = pool.reserve();
            reserved.fetch_add(1, Ordering::SeqCst);
            drv
        })
    };
    thread::sleep(Duration::from_millis(50));
    assert_eq!(reserved.load(Ordering::SeqCst), 0);

    pool.release(&first);
    let third = waiter.join().unwrap();
    assert!(Arc::ptr_eq(&third, &first));
    assert_eq!(reserved.load(Ordering::SeqCst), 1);
}

#[test]
fn one_release_wakes_one_waiter() {
    let (pool, _npus) = pool_of(1);
    let held = pool.reserve();

    let done = Arc::new(AtomicUsize::new(0));
    let waiters: Vec<_> = (0..2)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let drv = pool.reserve();
                done.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(50));
                pool.release(&drv);
            })
        })
        .collect();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(done.load(Ordering::SeqCst), 0);

    pool.release(&held);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(done.load(Ordering::SeqCst), 1);

    for w in waiters {
        w.join().unwrap();
    }
    assert_eq!(done.load(Ordering::SeqCst), 2);
}

#[test]
fn concurrent_invokes_share_pool() {
    let (pool, npus) = pool_of(2);
    let payload = PayloadBuilder::new().command_stream(&[0; 8]).build();

    let callers: Vec<_> = (0..6)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let payload = payload.clone();
            thread::spawn(move || pool.invoke(payload.as_bytes(), &[]))
        })
        .collect();
    for c in callers {
        c.join().unwrap().unwrap();
    }

    let runs: usize = npus.iter().map(|(sim, _)| sim.run_count()).sum();
    assert_eq!(runs, 6);
    assert!(npus.iter().all(|(_, drv)| !drv.is_reserved()));
}

#[test]
fn deregistered_driver_is_not_reserved() {
    let (pool, npus) = pool_of(2);
    let (_, gone) = &npus[1];
    pool.deregister(gone).unwrap();

    let drv = pool.try_reserve().unwrap();
    assert!(Arc::ptr_eq(&drv, &npus[0].1));
    assert!(pool.try_reserve().is_none());
}
