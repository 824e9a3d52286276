//! Modlink host core.
//!
//! The host side of the Modlink plugin system: loading and unloading native
//! modules, negotiating API versions, resolving exported function and
//! event-handler tables, brokering the inter-plugin interface registry, and
//! fanning lifecycle/event/signal dispatch out across loaded modules.
//!
//! The entry point is [`PluginHost`]; everything else hangs off it. The ABI
//! half of the contract lives in `modlink-plugin-sdk`, which plugins depend
//! on instead of this crate.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod interfaces;
pub mod loader;
pub mod registry;
pub mod reload;
pub mod tables;
pub mod testing;

pub use config::{HostConfig, SignalScope};
pub use error::{ConfigError, LoadError, PublishError, UnloadError, VersionError};
pub use host::PluginHost;
pub use interfaces::{InterfaceId, InterfacePtr, InterfaceRegistry};
pub use registry::{ModuleRegistry, ModuleState, ModuleSummary};
pub use reload::ReloadReport;

/// Re-exports commonly used together.
pub mod prelude {
    pub use crate::config::{HostConfig, SignalScope};
    pub use crate::error::{LoadError, PublishError, UnloadError};
    pub use crate::host::PluginHost;
    pub use crate::interfaces::{InterfaceId, InterfacePtr};
    pub use crate::registry::ModuleSummary;
    pub use crate::reload::ReloadReport;
    pub use modlink_plugin_sdk::abi::{ObjectRef, StrRef, ValueRef};
}
