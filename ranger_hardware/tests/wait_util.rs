use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use ranger_hardware::error::HwError;
use ranger_hardware::util::wait_until_with_timeout;

#[test]
fn wait_until_ready_success_path() {
    let ready = Arc::new(AtomicBool::new(false));
    let ready_bg = ready.clone();
    // Raise the line after a short delay
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(3));
        ready_bg.store(true, Ordering::Relaxed);
    });

    let res = wait_until_with_timeout(
        || ready.load(Ordering::Relaxed),
        Duration::from_millis(50),
        Duration::from_micros(200),
    );
    assert!(res.is_ok(), "expected success, got {res:?}");
}

#[test]
fn wait_until_ready_timeout_path() {
    let ready = Arc::new(AtomicBool::new(false));

    let err = wait_until_with_timeout(
        || ready.load(Ordering::Relaxed),
        Duration::from_millis(5),
        Duration::from_micros(200),
    )
    .expect_err("expected timeout error");

    match err {
        HwError::InterruptTimeout => {}
        other => panic!("unexpected error: {other:?}"),
    }
}
