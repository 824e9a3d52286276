//! Integration tests for the inter-plugin interface flow: publish,
//! discover, acquire, and retraction with consumer notification, driven
//! end to end through the host call table the way real plugins drive it.

use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use modlink_core::prelude::*;
use modlink_core::testing::InProcessModule;
use modlink_plugin_sdk::abi::{HostFunctions, RegisterOutcome, StrRef};
use modlink_plugin_sdk::HostCell;

static MATH_PAYLOAD: u64 = 0x5eed;

fn math_ptr() -> *mut c_void {
    &MATH_PAYLOAD as *const u64 as *mut c_void
}

mod alpha_beta {
    use super::*;

    static ALPHA: HostCell = HostCell::new();
    static BETA: HostCell = HostCell::new();
    static NOTIFICATIONS: Mutex<Vec<(String, u32)>> = Mutex::new(Vec::new());

    extern "C" fn alpha_assign(funcs: HostFunctions) {
        ALPHA.assign(funcs, "alpha");
    }

    extern "C" fn alpha_register() {
        let host = ALPHA.host().expect("assigned before registration");
        assert_eq!(
            host.register_interface("math", 1, super::math_ptr()),
            RegisterOutcome::Registered
        );
    }

    extern "C" fn beta_assign(funcs: HostFunctions) {
        BETA.assign(funcs, "beta");
    }

    extern "C" fn beta_interface_unloading(name: StrRef, version: u32) {
        // SAFETY: the host guarantees the name is valid for this call.
        let name = unsafe { name.as_str() }.to_string();
        NOTIFICATIONS.lock().unwrap().push((name, version));
    }

    #[test]
    fn publish_acquire_unload_notify() {
        let host = PluginHost::new(HostConfig::default());

        host.install_in_process(
            InProcessModule::new("alpha")
                .on_assign(alpha_assign)
                .with_hooks(|hooks| hooks.register_interfaces = Some(alpha_register)),
        )
        .unwrap();

        let (owner, versions) = host.list_interfaces("math").unwrap();
        assert_eq!(owner, "alpha");
        assert_eq!(versions, vec![1]);

        host.install_in_process(
            InProcessModule::new("beta")
                .on_assign(beta_assign)
                .with_hooks(|hooks| {
                    hooks.on_interface_unload = Some(beta_interface_unloading)
                }),
        )
        .unwrap();

        // Beta discovers and acquires through the call table, like a real
        // plugin would.
        let beta = BETA.host().unwrap();
        assert_eq!(beta.interface_versions("math"), vec![1]);
        let acquired = beta.request_interface("math", 1).unwrap();
        assert_eq!(acquired.as_ptr(), super::math_ptr());
        assert_eq!(
            host.interface_consumers("math", 1).unwrap(),
            vec!["beta".to_string()]
        );

        host.unload("alpha").unwrap();

        assert_eq!(
            NOTIFICATIONS.lock().unwrap().as_slice(),
            &[("math".to_string(), 1)]
        );
        assert!(host.list_interfaces("math").is_none());
        assert!(beta.request_interface("math", 1).is_none());
        assert!(host.is_loaded("beta"));
        assert!(!host.is_loaded("alpha"));
    }
}

mod duplicate_publish {
    use super::*;

    static ALPHA: HostCell = HostCell::new();
    static BETA: HostCell = HostCell::new();

    extern "C" fn alpha_assign(funcs: HostFunctions) {
        ALPHA.assign(funcs, "alpha");
    }

    extern "C" fn beta_assign(funcs: HostFunctions) {
        BETA.assign(funcs, "beta");
    }

    #[test]
    fn second_claim_of_same_identifier_is_rejected() {
        let host = PluginHost::new(HostConfig::default());
        host.install_in_process(InProcessModule::new("alpha").on_assign(alpha_assign))
            .unwrap();
        host.install_in_process(InProcessModule::new("beta").on_assign(beta_assign))
            .unwrap();

        let alpha = ALPHA.host().unwrap();
        let beta = BETA.host().unwrap();

        assert_eq!(
            alpha.register_interface("math", 1, super::math_ptr()),
            RegisterOutcome::Registered
        );
        // Another module claiming the same (name, version) is a conflict,
        // never a silent overwrite.
        assert_eq!(
            beta.register_interface("math", 1, super::math_ptr()),
            RegisterOutcome::Duplicate
        );

        // The failed call changed nothing.
        let (owner, versions) = host.list_interfaces("math").unwrap();
        assert_eq!(owner, "alpha");
        assert_eq!(versions, vec![1]);

        // A different version of the same name is fine.
        assert_eq!(
            beta.register_interface("math", 2, super::math_ptr()),
            RegisterOutcome::Registered
        );
        let (_, versions) = host.list_interfaces("math").unwrap();
        assert_eq!(versions, vec![1, 2]);
    }
}

mod teardown_order {
    use super::*;

    static ALPHA: HostCell = HostCell::new();
    static BETA: HostCell = HostCell::new();
    static SEQUENCE: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

    extern "C" fn alpha_assign(funcs: HostFunctions) {
        ALPHA.assign(funcs, "alpha");
    }

    extern "C" fn alpha_register() {
        ALPHA
            .host()
            .unwrap()
            .register_interface("math", 1, super::math_ptr());
    }

    extern "C" fn alpha_on_unload() {
        SEQUENCE.lock().unwrap().push("alpha-unload-hook");
    }

    extern "C" fn beta_assign(funcs: HostFunctions) {
        BETA.assign(funcs, "beta");
    }

    extern "C" fn beta_interface_unloading(_name: StrRef, _version: u32) {
        SEQUENCE.lock().unwrap().push("beta-notified");
        // The interface is already gone by the time the consumer hears
        // about it; re-acquiring the dying pointer must be impossible.
        assert!(BETA.host().unwrap().request_interface("math", 1).is_none());
    }

    #[test]
    fn consumers_hear_before_the_owner_goes_down() {
        let host = PluginHost::new(HostConfig::default());
        host.install_in_process(
            InProcessModule::new("alpha")
                .on_assign(alpha_assign)
                .with_hooks(|hooks| {
                    hooks.register_interfaces = Some(alpha_register);
                    hooks.on_unload = Some(alpha_on_unload);
                }),
        )
        .unwrap();
        host.install_in_process(
            InProcessModule::new("beta")
                .on_assign(beta_assign)
                .with_hooks(|hooks| {
                    hooks.on_interface_unload = Some(beta_interface_unloading)
                }),
        )
        .unwrap();

        BETA.host().unwrap().request_interface("math", 1).unwrap();
        host.unload("alpha").unwrap();

        assert_eq!(
            SEQUENCE.lock().unwrap().as_slice(),
            &["beta-notified", "alpha-unload-hook"]
        );
    }
}

mod acquire_miss {
    use super::*;

    static ALPHA: HostCell = HostCell::new();
    static BETA: HostCell = HostCell::new();

    extern "C" fn alpha_assign(funcs: HostFunctions) {
        ALPHA.assign(funcs, "alpha");
    }

    extern "C" fn beta_assign(funcs: HostFunctions) {
        BETA.assign(funcs, "beta");
    }

    #[test]
    fn unknown_identifier_is_absent_not_an_error() {
        let host = PluginHost::new(HostConfig::default());
        host.install_in_process(InProcessModule::new("alpha").on_assign(alpha_assign))
            .unwrap();
        host.install_in_process(InProcessModule::new("beta").on_assign(beta_assign))
            .unwrap();

        ALPHA
            .host()
            .unwrap()
            .register_interface("math", 1, super::math_ptr());

        let beta = BETA.host().unwrap();
        assert!(beta.request_interface("math", 2).is_none());
        assert!(beta.request_interface("matrix", 1).is_none());
        assert!(beta.interface_versions("matrix").is_empty());

        // The misses tracked nothing.
        assert!(host.interface_consumers("math", 1).unwrap().is_empty());
    }
}

mod notified_once_each {
    use super::*;

    static ALPHA: HostCell = HostCell::new();
    static BETA: HostCell = HostCell::new();
    static GAMMA: HostCell = HostCell::new();
    static BETA_NOTICES: AtomicUsize = AtomicUsize::new(0);
    static GAMMA_NOTICES: AtomicUsize = AtomicUsize::new(0);

    extern "C" fn alpha_assign(funcs: HostFunctions) {
        ALPHA.assign(funcs, "alpha");
    }

    extern "C" fn alpha_register() {
        let host = ALPHA.host().unwrap();
        host.register_interface("math", 1, super::math_ptr());
        host.register_interface("vector", 1, super::math_ptr());
    }

    extern "C" fn beta_assign(funcs: HostFunctions) {
        BETA.assign(funcs, "beta");
    }

    extern "C" fn beta_interface_unloading(_name: StrRef, _version: u32) {
        BETA_NOTICES.fetch_add(1, Ordering::SeqCst);
    }

    extern "C" fn gamma_assign(funcs: HostFunctions) {
        GAMMA.assign(funcs, "gamma");
    }

    extern "C" fn gamma_interface_unloading(_name: StrRef, _version: u32) {
        GAMMA_NOTICES.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn one_notification_per_acquired_interface() {
        let host = PluginHost::new(HostConfig::default());
        host.install_in_process(
            InProcessModule::new("alpha")
                .on_assign(alpha_assign)
                .with_hooks(|hooks| hooks.register_interfaces = Some(alpha_register)),
        )
        .unwrap();
        host.install_in_process(
            InProcessModule::new("beta")
                .on_assign(beta_assign)
                .with_hooks(|hooks| {
                    hooks.on_interface_unload = Some(beta_interface_unloading)
                }),
        )
        .unwrap();
        host.install_in_process(
            InProcessModule::new("gamma")
                .on_assign(gamma_assign)
                .with_hooks(|hooks| {
                    hooks.on_interface_unload = Some(gamma_interface_unloading)
                }),
        )
        .unwrap();

        let beta = BETA.host().unwrap();
        let gamma = GAMMA.host().unwrap();
        // Beta uses both interfaces (acquiring one twice, still one
        // consumer entry); gamma only one.
        beta.request_interface("math", 1).unwrap();
        beta.request_interface("math", 1).unwrap();
        beta.request_interface("vector", 1).unwrap();
        gamma.request_interface("vector", 1).unwrap();

        host.unload("alpha").unwrap();

        assert_eq!(BETA_NOTICES.load(Ordering::SeqCst), 2);
        assert_eq!(GAMMA_NOTICES.load(Ordering::SeqCst), 1);
        assert!(host.list_interfaces("math").is_none());
        assert!(host.list_interfaces("vector").is_none());
    }
}
