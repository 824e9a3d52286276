//! Plugin-side access to the host.
//!
//! At assignment time the host hands every module a [`HostFunctions`] table.
//! [`HostCell`] is the static slot the [`modlink_plugin!`] macro stores it
//! in, and [`Host`] is the safe wrapper plugins call through afterwards.

use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::OnceLock;

use crate::abi::{HostFunctions, LogLevel, RegisterOutcome, StrRef};

/// Write-once storage for the host call table.
///
/// Written exactly once, from `modlink_assign`, before any other entry point
/// of the module runs; read-only afterwards.
pub struct HostCell {
    inner: OnceLock<(HostFunctions, &'static str)>,
}

// SAFETY: the cell is written once during assignment and only read after;
// the contained context pointer is never dereferenced by the plugin side,
// only passed back to the host.
unsafe impl Sync for HostCell {}

impl HostCell {
    pub const fn new() -> Self {
        Self {
            inner: OnceLock::new(),
        }
    }

    /// Store the table and the module's own name. A second call is ignored.
    pub fn assign(&self, funcs: HostFunctions, module: &'static str) {
        let _ = self.inner.set((funcs, module));
    }

    /// Get a handle to the host, if assignment has happened.
    pub fn host(&self) -> Option<Host> {
        self.inner.get().map(|(funcs, module)| Host {
            funcs: *funcs,
            module,
        })
    }
}

impl Default for HostCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Safe wrapper over the host call table, bound to the owning module's name.
#[derive(Clone, Copy)]
pub struct Host {
    funcs: HostFunctions,
    module: &'static str,
}

impl Host {
    /// The name this module registered under.
    pub fn module_name(&self) -> &'static str {
        self.module
    }

    /// The API version the host speaks.
    pub fn api_version(&self) -> u32 {
        unsafe { (self.funcs.host_api_version)(self.funcs.ctx) }
    }

    /// Publish an interface owned by this module.
    pub fn register_interface(
        &self,
        name: &str,
        version: u32,
        payload: *mut c_void,
    ) -> RegisterOutcome {
        unsafe {
            (self.funcs.register_interface)(
                self.funcs.ctx,
                StrRef::new(self.module),
                StrRef::new(name),
                version,
                payload,
            )
        }
    }

    /// All published versions of `name`, ascending.
    pub fn interface_versions(&self, name: &str) -> Vec<u32> {
        let mut buf = vec![0u32; 16];
        loop {
            let total = unsafe {
                (self.funcs.list_interface_versions)(
                    self.funcs.ctx,
                    StrRef::new(name),
                    buf.as_mut_ptr(),
                    buf.len(),
                )
            };
            if total <= buf.len() {
                buf.truncate(total);
                return buf;
            }
            buf.resize(total, 0);
        }
    }

    /// Acquire (`name`, `version`) on behalf of this module.
    ///
    /// The returned pointer stays valid until this module receives an
    /// interface-unload notification for the same identifier.
    pub fn request_interface(&self, name: &str, version: u32) -> Option<NonNull<c_void>> {
        let ptr = unsafe {
            (self.funcs.request_interface)(
                self.funcs.ctx,
                StrRef::new(self.module),
                StrRef::new(name),
                version,
            )
        };
        NonNull::new(ptr)
    }

    /// Ask the host to unload this module. The module's code remains mapped
    /// until the host's next safe point, so returning normally from the
    /// current entry point is fine.
    pub fn request_self_unload(&self) -> bool {
        unsafe { (self.funcs.request_unload)(self.funcs.ctx, StrRef::new(self.module)) }
    }

    /// Ask the host to unload another module by name.
    pub fn request_unload(&self, module: &str) -> bool {
        unsafe { (self.funcs.request_unload)(self.funcs.ctx, StrRef::new(module)) }
    }

    /// Flag a full reload for the host's next safe point.
    pub fn request_reload(&self) {
        unsafe { (self.funcs.request_reload)(self.funcs.ctx) }
    }

    /// Forward a message into the host's log.
    pub fn log(&self, level: LogLevel, message: &str) {
        unsafe { (self.funcs.log)(self.funcs.ctx, level as u32, StrRef::new(message)) }
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_starts_empty() {
        let cell = HostCell::new();
        assert!(cell.host().is_none());
    }
}
