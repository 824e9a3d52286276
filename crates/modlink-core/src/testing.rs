//! Test support: in-process modules.
//!
//! Registry, dispatch, and teardown semantics are exercised without
//! building a dynamic library by installing modules whose tables are built
//! from plain `extern "C"` functions inside the host binary. An in-process
//! module goes through the same version check, duplicate-name check,
//! assignment, record bookkeeping, and unload protocol as a native one;
//! only symbol resolution and image mapping are skipped.

use std::path::PathBuf;

use modlink_plugin_sdk::abi::{HostFunctions, SignalFn};

use crate::error::{LoadError, VersionError};
use crate::host::PluginHost;
use crate::loader::ModuleHandle;
use crate::registry::ModuleRecord;
use crate::tables::{EventTable, HookTable};

/// Receives the host call table at installation, like `modlink_assign`
/// does for native modules (minus the name, which the builder carries).
pub type AssignHook = extern "C" fn(funcs: HostFunctions);

/// Builder for a module that lives inside the host binary.
pub struct InProcessModule {
    name: String,
    api_version: u32,
    path: PathBuf,
    assign: Option<AssignHook>,
    hooks: HookTable,
    events: EventTable,
    signals: Vec<(String, SignalFn)>,
}

impl InProcessModule {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let path = PathBuf::from(format!("in-process/{name}"));
        Self {
            name,
            api_version: modlink_plugin_sdk::API_VERSION,
            path,
            assign: None,
            hooks: HookTable::default(),
            events: EventTable::default(),
            signals: Vec::new(),
        }
    }

    /// Override the reported API version, e.g. to exercise rejection.
    pub fn with_api_version(mut self, version: u32) -> Self {
        self.api_version = version;
        self
    }

    /// Override the synthetic source path recorded for reload.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Capture the host call table at installation time.
    pub fn on_assign(mut self, assign: AssignHook) -> Self {
        self.assign = Some(assign);
        self
    }

    /// Populate lifecycle hooks.
    pub fn with_hooks(mut self, build: impl FnOnce(&mut HookTable)) -> Self {
        build(&mut self.hooks);
        self
    }

    /// Populate event handlers.
    pub fn with_events(mut self, build: impl FnOnce(&mut EventTable)) -> Self {
        build(&mut self.events);
        self
    }

    /// Pre-register a signal handler (in-process modules have no exports to
    /// probe lazily).
    pub fn with_signal(mut self, name: impl Into<String>, handler: SignalFn) -> Self {
        self.signals.push((name.into(), handler));
        self
    }
}

impl PluginHost {
    /// Install an in-process module, applying the same activation rules as
    /// [`load`](PluginHost::load).
    pub fn install_in_process(&self, module: InProcessModule) -> Result<String, LoadError> {
        let shared = self.shared();
        let supported = shared.config.supported_versions();
        if !supported.contains(&module.api_version) {
            return Err(VersionError::Unsupported {
                reported: module.api_version,
                min: *supported.start(),
                max: *supported.end(),
            }
            .into());
        }

        if let Some(assign) = module.assign {
            let funcs = shared.host_functions();
            shared.guarded_call(|| assign(funcs));
        }

        let register_interfaces = module.hooks.register_interfaces;
        let name = module.name.clone();
        {
            let mut state = shared.state.lock();
            if state.modules.contains(&name) {
                return Err(LoadError::DuplicateName(name));
            }
            let mut record = ModuleRecord::new(
                name.clone(),
                module.path,
                module.api_version,
                module.hooks,
                module.events,
                ModuleHandle::InProcess,
            );
            for (signal, handler) in module.signals {
                record.signals.insert(signal, Some(handler));
            }
            state.modules.insert(record)?;
        }

        if let Some(hook) = register_interfaces {
            shared.guarded_call(|| unsafe { hook() });
        }

        tracing::info!("in-process module installed: {}", name);
        Ok(name)
    }
}
