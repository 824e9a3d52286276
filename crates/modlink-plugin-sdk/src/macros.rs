//! Declarative macros for plugin authors.

/// Generate the required exports of a Modlink plugin.
///
/// Expands to `modlink_api_version` and `modlink_assign`, a private
/// [`HostCell`](crate::host::HostCell) holding the received call table, and
/// a `host()` accessor for the rest of the plugin to call through.
///
/// Optional exports (lifecycle hooks, event handlers, signal handlers) are
/// written as plain `#[no_mangle] extern "C"` functions using the names in
/// [`symbols`](crate::abi::symbols), for example
/// `modlink_ev_killed(unit, killer)` or `modlink_signal_ping(value)`.
///
/// # Example
///
/// ```rust
/// use modlink_plugin_sdk::prelude::*;
///
/// modlink_plugin! {
///     name: "sample",
/// }
///
/// #[no_mangle]
/// pub extern "C" fn modlink_post_init() {
///     if let Some(host) = host() {
///         host.info("sample plugin is up");
///     }
/// }
/// ```
#[macro_export]
macro_rules! modlink_plugin {
    ( name: $name:expr $(,)? ) => {
        $crate::modlink_plugin! {
            name: $name,
            api_version: $crate::API_VERSION,
        }
    };
    ( name: $name:expr, api_version: $version:expr $(,)? ) => {
        static __MODLINK_HOST: $crate::host::HostCell = $crate::host::HostCell::new();

        /// Handle to the host, available once assignment has happened.
        pub fn host() -> Option<$crate::host::Host> {
            __MODLINK_HOST.host()
        }

        #[no_mangle]
        pub extern "C" fn modlink_api_version() -> u32 {
            $version
        }

        /// # Safety
        /// Called exactly once by the host, before any other entry point.
        #[no_mangle]
        pub unsafe extern "C" fn modlink_assign(
            funcs: $crate::abi::HostFunctions,
        ) -> $crate::abi::StrRef {
            __MODLINK_HOST.assign(funcs, $name);
            $crate::abi::StrRef::from_static($name)
        }
    };
}
