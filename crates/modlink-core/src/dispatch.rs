//! Lifecycle, event, and signal fan-out.
//!
//! Every dispatcher iterates a stable snapshot of the load-order module
//! list taken at dispatch start, then revalidates each module just before
//! its call. A handler that unloads its own module (or any other) mid-call
//! therefore cannot corrupt the remainder of the fan-out: removed modules
//! are skipped, and their code stays mapped until the next safe point.
//! Absent handlers are skipped silently; absence is not an error.

use modlink_plugin_sdk::abi::{symbols, ObjectRef, SignalFn, StrRef, ValueRef};
use modlink_plugin_sdk::events::*;
use modlink_plugin_sdk::for_each_event;

use crate::config::SignalScope;
use crate::host::PluginHost;
use crate::registry::ModuleRecord;

macro_rules! lifecycle_dispatchers {
    ( $( ($method:ident, $field:ident) ),+ $(,)? ) => {
        impl PluginHost {
            $(
                #[doc = concat!("Invoke the `", stringify!($field), "` hook on every loaded module that exports it, in load order.")]
                pub fn $method(&self) {
                    let targets: Vec<(String, _)> = {
                        self.shared()
                            .state
                            .lock()
                            .modules
                            .iter()
                            .filter(|r| r.is_loaded())
                            .filter_map(|r| r.hooks.$field.map(|hook| (r.name.clone(), hook)))
                            .collect()
                    };
                    for (name, hook) in targets {
                        if !self.shared().is_dispatchable(&name) {
                            continue;
                        }
                        self.shared().guarded_call(|| unsafe { hook() });
                    }
                }
            )+
        }
    };
}

lifecycle_dispatchers! {
    (dispatch_pre_start, pre_start),
    (dispatch_pre_init, pre_init),
    (dispatch_post_init, post_init),
    (dispatch_on_frame, on_frame),
    (dispatch_mission_end, mission_end),
    (dispatch_mission_stopped, mission_stopped),
}

macro_rules! event_dispatchers {
    ( $( { name: $name:ident, ty: $ty:ident, args: ( $( $arg:ident : $argty:ty ),* ) } )+ ) => {
        impl PluginHost {
            $(
                #[doc = concat!("Fan the `", stringify!($name), "` event out to every loaded module exporting `modlink_ev_", stringify!($name), "`.")]
                pub fn $name(&self, $( $arg: $argty ),* ) {
                    let targets: Vec<(String, $ty)> = {
                        self.shared()
                            .state
                            .lock()
                            .modules
                            .iter()
                            .filter(|r| r.is_loaded())
                            .filter_map(|r| r.events.$name.map(|handler| (r.name.clone(), handler)))
                            .collect()
                    };
                    for (name, handler) in targets {
                        if !self.shared().is_dispatchable(&name) {
                            continue;
                        }
                        self.shared().guarded_call(|| unsafe { handler( $( $arg ),* ) });
                    }
                }
            )+
        }
    };
}

for_each_event!(event_dispatchers);

impl PluginHost {
    /// Route a named signal to its single handler.
    ///
    /// Under [`SignalScope::Global`] the first module in load order that
    /// exports `modlink_signal_<name>` owns the name; under
    /// [`SignalScope::PerModule`] the name must be qualified as
    /// `module:signal`. Returns whether a handler ran; no handler is a
    /// no-op, not an error.
    pub fn dispatch_signal(&self, name: &str, value: ValueRef) -> bool {
        match self.config().signal_scope {
            SignalScope::Global => {
                let found = {
                    let mut guard = self.shared().state.lock();
                    let mut found = None;
                    for record in guard.modules.iter_mut() {
                        if !record.is_loaded() {
                            continue;
                        }
                        if let Some(handler) = resolve_signal(record, name) {
                            found = Some((record.name.clone(), handler));
                            break;
                        }
                    }
                    found
                };
                self.run_signal(found, name, value)
            }
            SignalScope::PerModule => {
                let Some((module, signal)) = name.split_once(':') else {
                    tracing::warn!(
                        "signal `{}` is not `module:signal`-qualified under per-module scope",
                        name
                    );
                    return false;
                };
                self.dispatch_signal_to(module, signal, value)
            }
        }
    }

    /// Route a signal to one specific module's handler.
    pub fn dispatch_signal_to(&self, module: &str, name: &str, value: ValueRef) -> bool {
        let found = {
            let mut guard = self.shared().state.lock();
            guard
                .modules
                .get_mut(module)
                .filter(|r| r.is_loaded())
                .and_then(|record| {
                    resolve_signal(record, name).map(|handler| (record.name.clone(), handler))
                })
        };
        self.run_signal(found, name, value)
    }

    fn run_signal(&self, found: Option<(String, SignalFn)>, name: &str, value: ValueRef) -> bool {
        match found {
            Some((module, handler)) => {
                tracing::debug!("signal `{}` routed to {}", name, module);
                self.shared().guarded_call(|| unsafe { handler(value) });
                true
            }
            None => {
                tracing::debug!("signal `{}` has no handler", name);
                false
            }
        }
    }
}

/// Look `name` up in the record's signal cache, probing the module's
/// exports on first sight. Misses are cached too, so an absent export is
/// probed at most once.
fn resolve_signal(record: &mut ModuleRecord, name: &str) -> Option<SignalFn> {
    if let Some(cached) = record.signals.get(name) {
        return *cached;
    }
    let symbol = format!("{}{}", symbols::SIGNAL_PREFIX, name);
    let resolved = record
        .handle
        .as_ref()
        .and_then(|handle| unsafe { handle.symbol::<SignalFn>(symbol.as_bytes()) });
    record.signals.insert(name.to_string(), resolved);
    resolved
}
