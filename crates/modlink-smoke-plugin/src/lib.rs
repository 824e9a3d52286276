//! The smoke plugin: a minimal but complete Modlink module.
//!
//! Exercises every part of the contract a real plugin touches: assignment,
//! lifecycle hooks, an event handler, a signal handler, and publishing plus
//! surviving the retraction of an interface. Useful both as a template for
//! plugin authors and as the artifact integration setups load for real.

use std::ffi::c_void;
use std::sync::atomic::{AtomicU64, Ordering};

use modlink_plugin_sdk::prelude::*;

modlink_plugin! {
    name: "smoke",
}

static FRAMES_SEEN: AtomicU64 = AtomicU64::new(0);

/// The interface this plugin publishes as `smoke-api` v1. Consumers cast
/// the acquired pointer to this shape; the (name, version) pair is the
/// agreement that makes that cast sound.
#[repr(C)]
pub struct SmokeApi {
    pub frames_seen: extern "C" fn() -> u64,
}

extern "C" fn frames_seen() -> u64 {
    FRAMES_SEEN.load(Ordering::Relaxed)
}

static SMOKE_API: SmokeApi = SmokeApi { frames_seen };

#[no_mangle]
pub extern "C" fn modlink_register_interfaces() {
    let Some(host) = host() else { return };
    let outcome = host.register_interface(
        "smoke-api",
        1,
        &SMOKE_API as *const SmokeApi as *mut c_void,
    );
    if outcome != RegisterOutcome::Registered {
        host.warn("smoke-api v1 was already taken");
    }
}

#[no_mangle]
pub extern "C" fn modlink_post_init() {
    if let Some(host) = host() {
        host.info("smoke plugin initialized");
    }
}

#[no_mangle]
pub extern "C" fn modlink_on_frame() {
    FRAMES_SEEN.fetch_add(1, Ordering::Relaxed);
}

#[no_mangle]
pub extern "C" fn modlink_ev_killed(unit: ObjectRef, killer: ObjectRef) {
    if let Some(host) = host() {
        host.debug(&format!("unit {:?} killed by {:?}", unit, killer));
    }
}

#[no_mangle]
pub extern "C" fn modlink_on_interface_unload(name: StrRef, version: u32) {
    // SAFETY: the host guarantees the name is valid for this call.
    let name = unsafe { name.as_str() };
    if let Some(host) = host() {
        host.info(&format!("dropping cached interface {name} v{version}"));
    }
}

#[no_mangle]
pub extern "C" fn modlink_signal_ping(_value: ValueRef) {
    if let Some(host) = host() {
        host.info("pong");
    }
}

#[no_mangle]
pub extern "C" fn modlink_on_unload() {
    if let Some(host) = host() {
        host.info("smoke plugin shutting down");
    }
}
