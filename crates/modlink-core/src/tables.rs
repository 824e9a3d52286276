//! Export resolution and the API-version handshake.
//!
//! Given a freshly loaded handle, this module resolves the fixed set of
//! required and optional entry points into typed tables. The version query
//! runs first; a module reporting a version outside the host's supported
//! range is never activated and its handle is released immediately by the
//! caller. Optional entry points resolve to explicit `None`: dispatch
//! skips them, it never null-checks at call time.

use std::ops::RangeInclusive;

use modlink_plugin_sdk::abi::{
    symbols, ApiVersionFn, AssignFn, LifecycleFn, ObjectRef, OnInterfaceUnloadFn, StrRef,
};
use modlink_plugin_sdk::events::*;
use modlink_plugin_sdk::for_each_event;

use crate::error::{LoadError, VersionError};
use crate::loader::ModuleHandle;

/// Resolved optional lifecycle entry points of one module.
#[derive(Clone, Copy, Default, Debug)]
pub struct HookTable {
    pub pre_start: Option<LifecycleFn>,
    pub pre_init: Option<LifecycleFn>,
    pub post_init: Option<LifecycleFn>,
    pub on_frame: Option<LifecycleFn>,
    pub mission_end: Option<LifecycleFn>,
    pub mission_stopped: Option<LifecycleFn>,
    pub on_unload: Option<LifecycleFn>,
    pub on_interface_unload: Option<OnInterfaceUnloadFn>,
    pub register_interfaces: Option<LifecycleFn>,
}

macro_rules! event_table {
    ( $( { name: $name:ident, ty: $ty:ident, args: ( $( $arg:ident : $argty:ty ),* ) } )+ ) => {
        /// Resolved optional event handlers of one module, one present-or-absent
        /// slot per catalogue entry.
        #[derive(Clone, Copy, Default, Debug)]
        pub struct EventTable {
            $( pub $name: Option<$ty>, )+
        }

        impl EventTable {
            /// Resolve every `modlink_ev_*` export of `handle`.
            ///
            /// # Safety
            /// `handle` must expose the catalogue's frozen argument shapes for
            /// any symbol it exports under these names.
            pub(crate) unsafe fn resolve(handle: &ModuleHandle) -> Self {
                Self {
                    $( $name: unsafe {
                        handle.symbol::<$ty>(concat!("modlink_ev_", stringify!($name)).as_bytes())
                    }, )+
                }
            }
        }
    };
}

for_each_event!(event_table);

/// Everything resolved from one module image.
#[derive(Debug)]
pub struct ResolvedModule {
    /// The version the module reported, inside the supported range.
    pub api_version: u32,
    /// The table-assignment entry point; called once, then discarded.
    pub assign: AssignFn,
    pub hooks: HookTable,
    pub events: EventTable,
}

fn sym_name(symbol: &[u8]) -> String {
    String::from_utf8_lossy(symbol).into_owned()
}

/// Resolve `handle` against the host's supported API version range.
pub fn resolve(
    handle: &ModuleHandle,
    supported: &RangeInclusive<u32>,
) -> Result<ResolvedModule, LoadError> {
    let api_version: ApiVersionFn = unsafe { handle.symbol(symbols::API_VERSION) }
        .ok_or_else(|| LoadError::SymbolMissing(sym_name(symbols::API_VERSION)))?;

    // The handshake happens before anything else is resolved or called.
    let reported = unsafe { api_version() };
    if !supported.contains(&reported) {
        return Err(VersionError::Unsupported {
            reported,
            min: *supported.start(),
            max: *supported.end(),
        }
        .into());
    }

    let assign: AssignFn = unsafe { handle.symbol(symbols::ASSIGN) }
        .ok_or_else(|| LoadError::SymbolMissing(sym_name(symbols::ASSIGN)))?;

    let hooks = HookTable {
        pre_start: unsafe { handle.symbol(symbols::PRE_START) },
        pre_init: unsafe { handle.symbol(symbols::PRE_INIT) },
        post_init: unsafe { handle.symbol(symbols::POST_INIT) },
        on_frame: unsafe { handle.symbol(symbols::ON_FRAME) },
        mission_end: unsafe { handle.symbol(symbols::MISSION_END) },
        mission_stopped: unsafe { handle.symbol(symbols::MISSION_STOPPED) },
        on_unload: unsafe { handle.symbol(symbols::ON_UNLOAD) },
        on_interface_unload: unsafe { handle.symbol(symbols::ON_INTERFACE_UNLOAD) },
        register_interfaces: unsafe { handle.symbol(symbols::REGISTER_INTERFACES) },
    };

    let events = unsafe { EventTable::resolve(handle) };

    Ok(ResolvedModule {
        api_version: reported,
        assign,
        hooks,
        events,
    })
}
