//! Binary-boundary types shared by the host and every plugin.
//!
//! Everything in this module crosses the dynamic-library boundary and is
//! therefore `repr(C)` with a frozen shape: the layout of [`HostFunctions`]
//! and of every argument type must never change within one major API
//! version. Plugins compiled against an older revision of the same major
//! version must keep working against a newer host.

use std::ffi::c_void;

/// A borrowed, non-owning string reference that is safe to pass across the
/// module boundary.
///
/// The pointed-to bytes are only guaranteed valid for the duration of the
/// call the reference is passed to; the receiver must copy the contents
/// before returning if it wants to keep them.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct StrRef {
    ptr: *const u8,
    len: usize,
}

impl StrRef {
    /// The empty string.
    pub const EMPTY: StrRef = StrRef {
        ptr: std::ptr::null(),
        len: 0,
    };

    /// Build a reference from a `'static` string.
    pub const fn from_static(s: &'static str) -> Self {
        Self {
            ptr: s.as_ptr(),
            len: s.len(),
        }
    }

    /// Borrow an arbitrary string for the duration of one call.
    pub fn new(s: &str) -> Self {
        Self {
            ptr: s.as_ptr(),
            len: s.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0 || self.ptr.is_null()
    }

    /// View the referenced bytes as a `&str`.
    ///
    /// # Safety
    /// The pointer must still be valid and the bytes must be UTF-8; the
    /// caller chooses the result lifetime and must not outlive the call
    /// this reference arrived in.
    pub unsafe fn as_str<'a>(self) -> &'a str {
        if self.is_empty() {
            return "";
        }
        let bytes = unsafe { std::slice::from_raw_parts(self.ptr, self.len) };
        std::str::from_utf8(bytes).unwrap_or("")
    }

    /// Copy the referenced bytes into an owned `String`.
    ///
    /// # Safety
    /// Same contract as [`StrRef::as_str`].
    pub unsafe fn to_owned_string(self) -> String {
        unsafe { self.as_str().to_string() }
    }
}

/// Opaque handle to an engine-side scripting object (unit, vehicle,
/// container). The host never gives meaning to the value beyond identity.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectRef(pub u64);

impl ObjectRef {
    /// The null object.
    pub const NONE: ObjectRef = ObjectRef(0);
}

/// Opaque handle to a scripting-runtime value, passed to signal handlers.
#[repr(transparent)]
#[derive(Clone, Copy, Debug)]
pub struct ValueRef(*mut c_void);

impl ValueRef {
    pub const fn null() -> Self {
        Self(std::ptr::null_mut())
    }

    pub fn new(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.0
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }
}

/// Outcome of an interface registration call, stable across the boundary.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The interface is now published.
    Registered = 0,
    /// An interface with the same name and version already exists.
    Duplicate = 1,
    /// The claimed owning module is not loaded.
    UnknownModule = 2,
}

/// Log severity accepted by the host's log sink.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
}

impl LogLevel {
    /// Decode a raw level, clamping unknown values to `Debug`.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }
}

/// Required export: report the plugin's API version. Called before anything
/// else; a version outside the host's supported range aborts the load.
pub type ApiVersionFn = unsafe extern "C" fn() -> u32;

/// Required export: receive the host call table and return the module's
/// self-declared name. The returned reference must point into plugin static
/// storage.
pub type AssignFn = unsafe extern "C" fn(host: HostFunctions) -> StrRef;

/// Optional argument-less lifecycle export (pre-start, per-frame, ...).
pub type LifecycleFn = unsafe extern "C" fn();

/// Optional export invoked once for every interface this module had
/// acquired whose owner is unloading, before the owner's code is released.
pub type OnInterfaceUnloadFn = unsafe extern "C" fn(name: StrRef, version: u32);

/// A named signal handler, exported as `modlink_signal_<name>`.
pub type SignalFn = unsafe extern "C" fn(value: ValueRef);

/// The host capability table handed to every module at assignment time.
///
/// `ctx` must be passed back unchanged as the first argument of every entry;
/// it identifies the host instance and carries no other meaning. The shape
/// of this struct is the host-side half of the ABI contract.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct HostFunctions {
    /// Host instance context, opaque to plugins.
    pub ctx: *mut c_void,

    /// Report the API version the host itself speaks.
    pub host_api_version: unsafe extern "C" fn(ctx: *mut c_void) -> u32,

    /// Publish an interface owned by `module` under (`name`, `version`).
    pub register_interface: unsafe extern "C" fn(
        ctx: *mut c_void,
        module: StrRef,
        name: StrRef,
        version: u32,
        payload: *mut c_void,
    ) -> RegisterOutcome,

    /// Write the available versions of `name` into `out` (up to `cap`
    /// entries) and return the total number available.
    pub list_interface_versions:
        unsafe extern "C" fn(ctx: *mut c_void, name: StrRef, out: *mut u32, cap: usize) -> usize,

    /// Acquire (`name`, `version`) on behalf of `module`; null means absent.
    pub request_interface: unsafe extern "C" fn(
        ctx: *mut c_void,
        module: StrRef,
        name: StrRef,
        version: u32,
    ) -> *mut c_void,

    /// Ask the host to unload `module` (usually the caller itself). Returns
    /// false if no such module is loaded. The module's code stays mapped
    /// until the host reaches its next safe point.
    pub request_unload: unsafe extern "C" fn(ctx: *mut c_void, module: StrRef) -> bool,

    /// Flag a full unload/reload cycle for the host's next safe point.
    pub request_reload: unsafe extern "C" fn(ctx: *mut c_void),

    /// Forward a message into the host's log.
    pub log: unsafe extern "C" fn(ctx: *mut c_void, level: u32, message: StrRef),
}

/// Names of the exported symbols the host resolves.
pub mod symbols {
    pub const API_VERSION: &[u8] = b"modlink_api_version";
    pub const ASSIGN: &[u8] = b"modlink_assign";
    pub const PRE_START: &[u8] = b"modlink_pre_start";
    pub const PRE_INIT: &[u8] = b"modlink_pre_init";
    pub const POST_INIT: &[u8] = b"modlink_post_init";
    pub const ON_FRAME: &[u8] = b"modlink_on_frame";
    pub const MISSION_END: &[u8] = b"modlink_mission_end";
    pub const MISSION_STOPPED: &[u8] = b"modlink_mission_stopped";
    pub const ON_UNLOAD: &[u8] = b"modlink_on_unload";
    pub const ON_INTERFACE_UNLOAD: &[u8] = b"modlink_on_interface_unload";
    pub const REGISTER_INTERFACES: &[u8] = b"modlink_register_interfaces";

    /// Signal handlers are exported as `modlink_signal_<name>`.
    pub const SIGNAL_PREFIX: &str = "modlink_signal_";
    /// Event handlers are exported as `modlink_ev_<event>`.
    pub const EVENT_PREFIX: &str = "modlink_ev_";
}
