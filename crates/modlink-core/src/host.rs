//! The plugin host: one explicitly owned object tying the loader, the two
//! registries, and the reload coordinator together.
//!
//! All loading, unloading, dispatch, and registry mutation run on the one
//! control thread the host driver calls in from. The concurrency model is
//! reentrancy: a dispatched handler may call back into load, unload,
//! publish, acquire, or retract before it returns. One rule keeps that
//! safe: the state lock is never held across a cross-boundary call. Every
//! plugin call happens on a snapshot taken under the lock, with the lock
//! released.

use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use modlink_plugin_sdk::abi::{HostFunctions, LogLevel, RegisterOutcome, StrRef};
use parking_lot::Mutex;

use crate::config::HostConfig;
use crate::error::{LoadError, PublishError, UnloadError};
use crate::interfaces::{InterfaceId, InterfacePtr, InterfaceRegistry};
use crate::loader::{self, ModuleHandle};
use crate::registry::{ModuleRecord, ModuleRegistry, ModuleState, ModuleSummary};
use crate::reload::{ReloadCoordinator, ReloadReport};
use crate::tables;

pub(crate) struct HostState {
    pub(crate) modules: ModuleRegistry,
    pub(crate) interfaces: InterfaceRegistry,
    pub(crate) reload: ReloadCoordinator,
    /// Handles whose teardown finished while plugin code was still on the
    /// call stack; the code stays mapped until the next safe point.
    pub(crate) retired: Vec<ModuleHandle>,
    /// Depth of in-progress cross-boundary calls. Zero means no plugin
    /// code is executing and structural changes may take effect fully.
    pub(crate) dispatch_depth: u32,
}

pub(crate) struct HostShared {
    pub(crate) config: HostConfig,
    // One mutex guards both registries together: interface retraction must
    // be atomic with respect to module unload.
    pub(crate) state: Mutex<HostState>,
}

/// The plugin lifecycle manager.
///
/// Cheap to clone; clones share one host instance. Construct isolated
/// hosts freely in tests; there is no process-wide singleton.
#[derive(Clone)]
pub struct PluginHost {
    shared: Arc<HostShared>,
}

impl PluginHost {
    pub fn new(config: HostConfig) -> Self {
        Self {
            shared: Arc::new(HostShared {
                config,
                state: Mutex::new(HostState {
                    modules: ModuleRegistry::new(),
                    interfaces: InterfaceRegistry::new(),
                    reload: ReloadCoordinator::new(),
                    retired: Vec::new(),
                    dispatch_depth: 0,
                }),
            }),
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.shared.config
    }

    pub(crate) fn shared(&self) -> &HostShared {
        &self.shared
    }

    /// Load, version-negotiate, and activate the module at `path`.
    ///
    /// Returns the name the module declared for itself. On any failure the
    /// fresh handle is released and nothing is registered.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<String, LoadError> {
        self.shared.load(path.as_ref())
    }

    /// Discover and load every candidate module in the configured
    /// directories. Fail-soft: each path reports its own outcome.
    pub fn load_all(&self) -> Vec<(PathBuf, Result<String, LoadError>)> {
        loader::discover(&self.shared.config.module_dirs)
            .into_iter()
            .map(|path| {
                let outcome = self.shared.load(&path);
                (path, outcome)
            })
            .collect()
    }

    /// Unload `name`: retract its interfaces (notifying every surviving
    /// consumer), run its unload hook, release its handle, erase its record.
    pub fn unload(&self, name: &str) -> Result<(), UnloadError> {
        self.shared.unload(name)
    }

    /// Read-only snapshot of the loaded modules, in load order.
    pub fn list(&self) -> Vec<ModuleSummary> {
        self.shared.state.lock().modules.summaries()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.shared.is_dispatchable(name)
    }

    pub fn module_count(&self) -> usize {
        self.shared.state.lock().modules.len()
    }

    /// Publish an interface owned by `module`.
    pub fn register_interface(
        &self,
        module: &str,
        name: &str,
        version: u32,
        payload: *mut c_void,
    ) -> Result<InterfaceId, PublishError> {
        self.shared
            .register_interface(module, name, version, payload)
    }

    /// Discovery: owner and ascending versions published under `name`.
    pub fn list_interfaces(&self, name: &str) -> Option<(String, Vec<u32>)> {
        self.shared.list_interface_versions(name)
    }

    /// The modules currently consuming the exact (`name`, `version`).
    pub fn interface_consumers(&self, name: &str, version: u32) -> Option<Vec<String>> {
        self.shared
            .state
            .lock()
            .interfaces
            .consumers(name, version)
            .map(<[String]>::to_vec)
    }

    /// Acquire (`name`, `version`) on behalf of `module`; `None` means
    /// absent, which callers are expected to handle.
    pub fn request_interface(
        &self,
        module: &str,
        name: &str,
        version: u32,
    ) -> Option<InterfacePtr> {
        self.shared.request_interface(module, name, version)
    }

    /// Flag a full unload/reload cycle for the next safe point. Callable
    /// from anywhere, including from inside dispatch.
    pub fn request_reload(&self) {
        self.shared.request_reload();
    }

    pub fn reload_pending(&self) -> bool {
        self.shared.state.lock().reload.is_pending()
    }

    /// The host driver's once-per-cycle safe point: releases retired
    /// handles and, if a reload is pending, executes it. Returns the
    /// reload's report when one ran.
    pub fn safe_point(&self) -> Option<ReloadReport> {
        self.shared.safe_point()
    }

    /// Unload every remaining module, newest first. The proper teardown at
    /// host shutdown.
    pub fn shutdown(&self) {
        let names = self.shared.state.lock().modules.names();
        for name in names.iter().rev() {
            if let Err(err) = self.shared.unload(name) {
                tracing::warn!("shutdown: failed to unload {}: {}", name, err);
            }
        }
        let retired = std::mem::take(&mut self.shared.state.lock().retired);
        for handle in retired {
            handle.release();
        }
    }
}

impl HostShared {
    /// The call table handed to modules; `ctx` is this instance.
    pub(crate) fn host_functions(&self) -> HostFunctions {
        HostFunctions {
            ctx: self as *const HostShared as *mut c_void,
            host_api_version: trampoline_host_api_version,
            register_interface: trampoline_register_interface,
            list_interface_versions: trampoline_list_interface_versions,
            request_interface: trampoline_request_interface,
            request_unload: trampoline_request_unload,
            request_reload: trampoline_request_reload,
            log: trampoline_log,
        }
    }

    /// Run one cross-boundary call with the dispatch depth held.
    pub(crate) fn guarded_call<R>(&self, call: impl FnOnce() -> R) -> R {
        self.state.lock().dispatch_depth += 1;
        let result = call();
        self.state.lock().dispatch_depth -= 1;
        result
    }

    pub(crate) fn is_dispatchable(&self, name: &str) -> bool {
        self.state
            .lock()
            .modules
            .get(name)
            .map(ModuleRecord::is_loaded)
            .unwrap_or(false)
    }

    /// Release a handle now if no plugin code is on the stack, otherwise
    /// park it for the next safe point.
    fn dispose_handle(&self, handle: ModuleHandle) {
        {
            let mut state = self.state.lock();
            if state.dispatch_depth != 0 {
                state.retired.push(handle);
                return;
            }
        }
        handle.release();
    }

    fn load(&self, path: &Path) -> Result<String, LoadError> {
        let handle = loader::load(path)?;

        let resolved = match tables::resolve(&handle, &self.config.supported_versions()) {
            Ok(resolved) => resolved,
            Err(err) => {
                // Never activated; the handle was not shared with anyone.
                handle.release();
                return Err(err);
            }
        };

        let funcs = self.host_functions();
        let name = {
            let name_ref = self.guarded_call(|| unsafe { (resolved.assign)(funcs) });
            unsafe { name_ref.to_owned_string() }
        };
        if name.is_empty() {
            self.dispose_handle(handle);
            return Err(LoadError::InvalidImage {
                path: path.to_path_buf(),
                reason: "module declared an empty name".to_string(),
            });
        }

        let register_interfaces = resolved.hooks.register_interfaces;
        {
            let mut state = self.state.lock();
            if state.modules.contains(&name) {
                drop(state);
                self.dispose_handle(handle);
                return Err(LoadError::DuplicateName(name));
            }
            state.modules.insert(ModuleRecord::new(
                name.clone(),
                path.to_path_buf(),
                resolved.api_version,
                resolved.hooks,
                resolved.events,
                handle,
            ))?;
        }

        // Interface registration happens once the record exists, so the
        // registry can attribute ownership.
        if let Some(hook) = register_interfaces {
            self.guarded_call(|| unsafe { hook() });
        }

        tracing::info!(
            "module loaded: {} (api v{}) from {}",
            name,
            resolved.api_version,
            path.display()
        );
        Ok(name)
    }

    fn unload(&self, name: &str) -> Result<(), UnloadError> {
        // Phase 1, atomically: mark the module as unloading and pull every
        // interface it owns out of the registry, collecting the consumers
        // that must hear about it. From here on no acquire can hand out a
        // pointer into the dying module.
        let (notify_plan, on_unload) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let record = state
                .modules
                .get_mut(name)
                .filter(|r| r.is_loaded())
                .ok_or_else(|| UnloadError::NotFound(name.to_string()))?;
            record.state = ModuleState::Unloading;
            let on_unload = record.hooks.on_unload;

            let retractions = state.interfaces.retract(name);
            let mut plan = Vec::new();
            for retraction in &retractions {
                for consumer in &retraction.consumers {
                    let Some(consumer_record) = state.modules.get(consumer) else {
                        continue;
                    };
                    if !consumer_record.is_loaded() {
                        continue;
                    }
                    match consumer_record.hooks.on_interface_unload {
                        Some(hook) => plan.push((
                            hook,
                            retraction.id.name.clone(),
                            retraction.id.version,
                        )),
                        None => tracing::debug!(
                            "consumer {} has no interface-unload handler for {}",
                            consumer,
                            retraction.id
                        ),
                    }
                }
            }
            (plan, on_unload)
        };

        // Phase 2: tell every surviving consumer, synchronously, while the
        // owner's code is still mapped.
        for (hook, iface_name, version) in notify_plan {
            self.guarded_call(|| unsafe { hook(StrRef::new(&iface_name), version) });
        }

        // Phase 3: the module's own goodbye.
        if let Some(hook) = on_unload {
            self.guarded_call(|| unsafe { hook() });
        }

        // Phase 4: erase the record and release (or park) the handle.
        let handle = {
            let mut state = self.state.lock();
            state
                .modules
                .remove(name)
                .and_then(|mut record| record.handle.take())
        };
        if let Some(handle) = handle {
            self.dispose_handle(handle);
        }

        tracing::info!("module unloaded: {}", name);
        Ok(())
    }

    fn register_interface(
        &self,
        module: &str,
        name: &str,
        version: u32,
        payload: *mut c_void,
    ) -> Result<InterfaceId, PublishError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let record = state
            .modules
            .get_mut(module)
            .filter(|r| r.is_loaded())
            .ok_or_else(|| PublishError::UnknownModule(module.to_string()))?;

        let id = state
            .interfaces
            .publish(module, name, version, InterfacePtr(payload))?;
        record.interfaces.push(id.clone());
        Ok(id)
    }

    fn list_interface_versions(&self, name: &str) -> Option<(String, Vec<u32>)> {
        self.state.lock().interfaces.list(name)
    }

    fn request_interface(
        &self,
        module: &str,
        name: &str,
        version: u32,
    ) -> Option<InterfacePtr> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        // Only a loaded module can be tracked as a consumer. An untrackable
        // holder could never be notified before the pointer dangles, so it
        // does not get the pointer at all.
        if !state
            .modules
            .get(module)
            .map(ModuleRecord::is_loaded)
            .unwrap_or(false)
        {
            tracing::warn!(
                "interface request from unknown module {} for {} v{}",
                module,
                name,
                version
            );
            return None;
        }
        state.interfaces.acquire(module, name, version)
    }

    fn request_reload(&self) {
        tracing::debug!("reload requested");
        self.state.lock().reload.request();
    }

    fn safe_point(&self) -> Option<ReloadReport> {
        let retired = {
            let mut state = self.state.lock();
            if state.dispatch_depth != 0 {
                tracing::warn!("safe point reached with dispatch in progress; skipping");
                return None;
            }
            std::mem::take(&mut state.retired)
        };
        for handle in retired {
            handle.release();
        }

        if !self.state.lock().reload.take() {
            return None;
        }
        Some(self.reload_all())
    }

    /// Unload everything, then re-load every recorded path in the original
    /// load order. Per-module failures are reported, never fatal.
    fn reload_all(&self) -> ReloadReport {
        let targets: Vec<(String, PathBuf)> = {
            self.state
                .lock()
                .modules
                .iter()
                .map(|r| (r.name.clone(), r.path.clone()))
                .collect()
        };
        tracing::info!("reloading {} modules", targets.len());

        for (name, _) in &targets {
            if let Err(err) = self.unload(name) {
                tracing::warn!("reload: failed to unload {}: {}", name, err);
            }
        }

        let mut report = ReloadReport::default();
        for (name, path) in targets {
            match self.load(&path) {
                Ok(loaded) => report.reloaded.push(loaded),
                Err(err) => {
                    tracing::warn!(
                        "reload: {} did not come back from {}: {}",
                        name,
                        path.display(),
                        err
                    );
                    report.failed.push((path, err));
                }
            }
        }
        report
    }
}

impl Drop for HostShared {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if !state.modules.is_empty() {
            tracing::warn!(
                "host dropped with {} modules still loaded; call shutdown() for orderly teardown",
                state.modules.len()
            );
        }
    }
}

unsafe fn shared_from_ctx<'a>(ctx: *mut c_void) -> Option<&'a HostShared> {
    unsafe { (ctx as *const HostShared).as_ref() }
}

unsafe extern "C" fn trampoline_host_api_version(ctx: *mut c_void) -> u32 {
    match unsafe { shared_from_ctx(ctx) } {
        Some(shared) => *shared.config.supported_versions().end(),
        None => 0,
    }
}

unsafe extern "C" fn trampoline_register_interface(
    ctx: *mut c_void,
    module: StrRef,
    name: StrRef,
    version: u32,
    payload: *mut c_void,
) -> RegisterOutcome {
    let Some(shared) = (unsafe { shared_from_ctx(ctx) }) else {
        return RegisterOutcome::UnknownModule;
    };
    let module = unsafe { module.as_str() };
    let name = unsafe { name.as_str() };
    match shared.register_interface(module, name, version, payload) {
        Ok(_) => RegisterOutcome::Registered,
        Err(PublishError::AlreadyExists { .. }) => RegisterOutcome::Duplicate,
        Err(PublishError::UnknownModule(_)) => RegisterOutcome::UnknownModule,
    }
}

unsafe extern "C" fn trampoline_list_interface_versions(
    ctx: *mut c_void,
    name: StrRef,
    out: *mut u32,
    cap: usize,
) -> usize {
    let Some(shared) = (unsafe { shared_from_ctx(ctx) }) else {
        return 0;
    };
    let versions = shared
        .list_interface_versions(unsafe { name.as_str() })
        .map(|(_, versions)| versions)
        .unwrap_or_default();
    if !out.is_null() {
        let filled = versions.len().min(cap);
        unsafe { std::ptr::copy_nonoverlapping(versions.as_ptr(), out, filled) };
    }
    versions.len()
}

unsafe extern "C" fn trampoline_request_interface(
    ctx: *mut c_void,
    module: StrRef,
    name: StrRef,
    version: u32,
) -> *mut c_void {
    let Some(shared) = (unsafe { shared_from_ctx(ctx) }) else {
        return std::ptr::null_mut();
    };
    let module = unsafe { module.as_str() };
    let name = unsafe { name.as_str() };
    match shared.request_interface(module, name, version) {
        Some(InterfacePtr(ptr)) => ptr,
        None => std::ptr::null_mut(),
    }
}

unsafe extern "C" fn trampoline_request_unload(ctx: *mut c_void, module: StrRef) -> bool {
    let Some(shared) = (unsafe { shared_from_ctx(ctx) }) else {
        return false;
    };
    shared.unload(unsafe { module.as_str() }).is_ok()
}

unsafe extern "C" fn trampoline_request_reload(ctx: *mut c_void) {
    if let Some(shared) = unsafe { shared_from_ctx(ctx) } {
        shared.request_reload();
    }
}

unsafe extern "C" fn trampoline_log(ctx: *mut c_void, level: u32, message: StrRef) {
    if unsafe { shared_from_ctx(ctx) }.is_none() {
        return;
    }
    let message = unsafe { message.as_str() };
    match LogLevel::from_raw(level) {
        LogLevel::Error => tracing::error!(target: "modlink::plugin", "{}", message),
        LogLevel::Warn => tracing::warn!(target: "modlink::plugin", "{}", message),
        LogLevel::Info => tracing::info!(target: "modlink::plugin", "{}", message),
        LogLevel::Debug => tracing::debug!(target: "modlink::plugin", "{}", message),
    }
}
