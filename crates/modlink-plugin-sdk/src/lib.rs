//! Modlink Plugin SDK
//!
//! The ABI contract between the Modlink host and its native plugins, plus
//! the plugin-side helpers for speaking it. Both the host core and every
//! plugin depend on this crate and nothing else of each other, which is
//! what keeps independently compiled modules loadable into one host.
//!
//! # Quick Start
//!
//! ```rust
//! use modlink_plugin_sdk::prelude::*;
//!
//! modlink_plugin! {
//!     name: "my-plugin",
//! }
//!
//! #[no_mangle]
//! pub extern "C" fn modlink_on_frame() {
//!     // per-frame work
//! }
//! ```

pub mod abi;
pub mod events;
pub mod host;
#[macro_use]
pub mod macros;

/// The API version this SDK revision speaks. The host accepts a configured
/// range of versions; a module reporting anything outside that range is
/// never activated.
pub const API_VERSION: u32 = 1;

pub use abi::{
    ApiVersionFn, AssignFn, HostFunctions, LifecycleFn, LogLevel, ObjectRef,
    OnInterfaceUnloadFn, RegisterOutcome, SignalFn, StrRef, ValueRef,
};
pub use host::{Host, HostCell};

/// Re-exports commonly used by plugin code.
pub mod prelude {
    pub use crate::abi::{
        HostFunctions, LogLevel, ObjectRef, RegisterOutcome, StrRef, ValueRef,
    };
    pub use crate::host::{Host, HostCell};
    pub use crate::API_VERSION;
    pub use crate::modlink_plugin;
}
