//! Integration tests for module lifecycle, dispatch fan-out, reentrant
//! self-unload, signal routing, and the deferred reload cycle.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use modlink_core::prelude::*;
use modlink_core::testing::InProcessModule;
use modlink_plugin_sdk::abi::{HostFunctions, ObjectRef, ValueRef};
use modlink_plugin_sdk::HostCell;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

mod version_gate {
    use super::*;

    #[test]
    fn unsupported_version_never_registers() {
        super::init_tracing();
        let host = PluginHost::new(HostConfig::default());

        let err = host
            .install_in_process(InProcessModule::new("relic").with_api_version(99))
            .unwrap_err();
        assert!(matches!(err, LoadError::Version(_)));
        assert!(host.list().is_empty());
        assert!(!host.is_loaded("relic"));
    }

    #[test]
    fn uniqueness_holds_across_load_unload_sequences() {
        let host = PluginHost::new(HostConfig::default());

        host.install_in_process(InProcessModule::new("alpha")).unwrap();
        host.install_in_process(InProcessModule::new("beta")).unwrap();
        assert!(matches!(
            host.install_in_process(InProcessModule::new("beta")),
            Err(LoadError::DuplicateName(_))
        ));

        host.unload("alpha").unwrap();
        // The name is free again after unload.
        host.install_in_process(InProcessModule::new("alpha")).unwrap();

        let names: Vec<String> = host.list().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["beta", "alpha"]);
    }
}

mod event_fan_out {
    use super::*;

    static CALLS: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

    extern "C" fn first_killed(_unit: ObjectRef, _killer: ObjectRef) {
        CALLS.lock().unwrap().push("first");
    }

    extern "C" fn third_killed(_unit: ObjectRef, _killer: ObjectRef) {
        CALLS.lock().unwrap().push("third");
    }

    #[test]
    fn handlers_run_in_load_order_and_absence_is_skipped() {
        let host = PluginHost::new(HostConfig::default());
        host.install_in_process(
            InProcessModule::new("first").with_events(|ev| ev.killed = Some(first_killed)),
        )
        .unwrap();
        // No handler at all: skipped, not an error.
        host.install_in_process(InProcessModule::new("second")).unwrap();
        host.install_in_process(
            InProcessModule::new("third").with_events(|ev| ev.killed = Some(third_killed)),
        )
        .unwrap();

        host.killed(ObjectRef(7), ObjectRef(9));
        assert_eq!(CALLS.lock().unwrap().as_slice(), &["first", "third"]);
    }
}

mod self_unload {
    use super::*;

    static QUITTER: HostCell = HostCell::new();
    static SURVIVOR_FRAMES: AtomicUsize = AtomicUsize::new(0);

    extern "C" fn quitter_assign(funcs: HostFunctions) {
        QUITTER.assign(funcs, "quitter");
    }

    extern "C" fn quitter_frame() {
        // Unloading the module whose handler is currently executing: the
        // full teardown runs now, the code image stays mapped until the
        // next safe point.
        assert!(QUITTER.host().unwrap().request_self_unload());
    }

    extern "C" fn survivor_frame() {
        SURVIVOR_FRAMES.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn mid_dispatch_self_unload_spares_later_modules() {
        let host = PluginHost::new(HostConfig::default());
        host.install_in_process(
            InProcessModule::new("quitter")
                .on_assign(quitter_assign)
                .with_hooks(|hooks| hooks.on_frame = Some(quitter_frame)),
        )
        .unwrap();
        host.install_in_process(
            InProcessModule::new("survivor")
                .with_hooks(|hooks| hooks.on_frame = Some(survivor_frame)),
        )
        .unwrap();

        host.dispatch_on_frame();

        assert!(!host.is_loaded("quitter"));
        assert!(host.is_loaded("survivor"));
        assert_eq!(SURVIVOR_FRAMES.load(Ordering::SeqCst), 1);

        // The next frame only reaches the survivor.
        host.dispatch_on_frame();
        assert_eq!(SURVIVOR_FRAMES.load(Ordering::SeqCst), 2);
    }
}

mod deferred_reload {
    use super::*;

    static ALPHA: HostCell = HostCell::new();

    extern "C" fn alpha_assign(funcs: HostFunctions) {
        ALPHA.assign(funcs, "alpha");
    }

    extern "C" fn alpha_frame() {
        ALPHA.host().unwrap().request_reload();
    }

    #[test]
    fn reload_runs_only_at_the_safe_point_in_load_order() {
        super::init_tracing();
        let host = PluginHost::new(HostConfig::default());
        host.install_in_process(
            InProcessModule::new("alpha")
                .on_assign(alpha_assign)
                .with_hooks(|hooks| hooks.on_frame = Some(alpha_frame)),
        )
        .unwrap();
        host.install_in_process(InProcessModule::new("beta")).unwrap();

        host.dispatch_on_frame();

        // Requested from inside dispatch, not executed there.
        assert!(host.reload_pending());
        assert!(host.is_loaded("alpha"));
        assert!(host.is_loaded("beta"));

        // In-process modules have no image on disk, so the reload pass
        // reports each of them failed, in original load order, which is
        // exactly the observable we need.
        let report = host.safe_point().expect("reload was pending");
        assert!(report.reloaded.is_empty());
        let failed: Vec<PathBuf> = report.failed.into_iter().map(|(path, _)| path).collect();
        assert_eq!(
            failed,
            vec![
                PathBuf::from("in-process/alpha"),
                PathBuf::from("in-process/beta"),
            ]
        );
        assert!(host.list().is_empty());
        assert!(!host.reload_pending());
    }
}

mod signals {
    use super::*;

    static ROUTED: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

    extern "C" fn early_ping(_value: ValueRef) {
        ROUTED.lock().unwrap().push("early");
    }

    extern "C" fn late_ping(_value: ValueRef) {
        ROUTED.lock().unwrap().push("late");
    }

    #[test]
    fn global_scope_routes_to_first_registrant() {
        let host = PluginHost::new(HostConfig::default());
        host.install_in_process(
            InProcessModule::new("early").with_signal("ping", early_ping),
        )
        .unwrap();
        host.install_in_process(InProcessModule::new("late").with_signal("ping", late_ping))
            .unwrap();

        assert!(host.dispatch_signal("ping", ValueRef::null()));
        assert_eq!(ROUTED.lock().unwrap().as_slice(), &["early"]);

        // Unknown signal: a no-op, not an error.
        assert!(!host.dispatch_signal("silence", ValueRef::null()));
    }
}

mod per_module_signals {
    use super::*;

    static ROUTED: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

    extern "C" fn alpha_ping(_value: ValueRef) {
        ROUTED.lock().unwrap().push("alpha");
    }

    extern "C" fn beta_ping(_value: ValueRef) {
        ROUTED.lock().unwrap().push("beta");
    }

    #[test]
    fn qualified_names_route_to_the_named_module() {
        let config = HostConfig::default().with_signal_scope(SignalScope::PerModule);
        let host = PluginHost::new(config);
        host.install_in_process(InProcessModule::new("alpha").with_signal("ping", alpha_ping))
            .unwrap();
        host.install_in_process(InProcessModule::new("beta").with_signal("ping", beta_ping))
            .unwrap();

        assert!(host.dispatch_signal("beta:ping", ValueRef::null()));
        assert_eq!(ROUTED.lock().unwrap().as_slice(), &["beta"]);

        // Unqualified names do not resolve under per-module scope.
        assert!(!host.dispatch_signal("ping", ValueRef::null()));
        assert!(!host.dispatch_signal("gamma:ping", ValueRef::null()));
    }
}

mod shutdown {
    use super::*;

    static GOODBYES: AtomicUsize = AtomicUsize::new(0);

    extern "C" fn goodbye() {
        GOODBYES.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn shutdown_unloads_every_module_with_its_hook() {
        let host = PluginHost::new(HostConfig::default());
        for name in ["alpha", "beta", "gamma"] {
            host.install_in_process(
                InProcessModule::new(name).with_hooks(|hooks| hooks.on_unload = Some(goodbye)),
            )
            .unwrap();
        }

        host.shutdown();

        assert_eq!(GOODBYES.load(Ordering::SeqCst), 3);
        assert!(host.list().is_empty());
    }
}

mod lifecycle_phases {
    use super::*;

    static PHASES: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

    extern "C" fn saw_pre_init() {
        PHASES.lock().unwrap().push("pre_init");
    }

    extern "C" fn saw_post_init() {
        PHASES.lock().unwrap().push("post_init");
    }

    extern "C" fn saw_mission_end() {
        PHASES.lock().unwrap().push("mission_end");
    }

    #[test]
    fn phase_dispatchers_reach_their_hooks() {
        let host = PluginHost::new(HostConfig::default());
        host.install_in_process(InProcessModule::new("tracker").with_hooks(|hooks| {
            hooks.pre_init = Some(saw_pre_init);
            hooks.post_init = Some(saw_post_init);
            hooks.mission_end = Some(saw_mission_end);
        }))
        .unwrap();

        host.dispatch_pre_start();
        host.dispatch_pre_init();
        host.dispatch_post_init();
        host.dispatch_mission_end();
        host.dispatch_mission_stopped();

        assert_eq!(
            PHASES.lock().unwrap().as_slice(),
            &["pre_init", "post_init", "mission_end"]
        );
    }
}
