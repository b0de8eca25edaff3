//! End-to-end lifecycle tests: dependency-gated launch, reverse-topological
//! stop order, idempotent shutdown triggers, restart bounds.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use printvisor::{
    Config, EventKind, InitError, Orchestrator, RuntimeError, Subsystem, SubsystemContext,
    SubsystemSpec,
};

/// Test subsystem that counts lifecycle calls and records stop order.
struct Probe {
    name: &'static str,
    init_calls: Arc<AtomicU32>,
    shutdown_calls: Arc<AtomicU32>,
    stop_order: Arc<Mutex<Vec<&'static str>>>,
    fail_init: bool,
}

impl Probe {
    fn new(name: &'static str, stop_order: &Arc<Mutex<Vec<&'static str>>>) -> Arc<Self> {
        Arc::new(Self {
            name,
            init_calls: Arc::new(AtomicU32::new(0)),
            shutdown_calls: Arc::new(AtomicU32::new(0)),
            stop_order: Arc::clone(stop_order),
            fail_init: false,
        })
    }

    fn failing(name: &'static str, stop_order: &Arc<Mutex<Vec<&'static str>>>) -> Arc<Self> {
        Arc::new(Self {
            name,
            init_calls: Arc::new(AtomicU32::new(0)),
            shutdown_calls: Arc::new(AtomicU32::new(0)),
            stop_order: Arc::clone(stop_order),
            fail_init: true,
        })
    }
}

#[async_trait]
impl Subsystem for Probe {
    fn name(&self) -> &str {
        self.name
    }

    async fn init(&self, ctx: SubsystemContext) -> Result<(), InitError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_init {
            return Err(InitError::failed("synthetic init failure"));
        }
        let cancel = ctx.cancel_token();
        let workers = ctx.workers();
        ctx.spawn_main(async move {
            workers.register_current();
            cancel.cancelled().await;
            workers.deregister_current();
        });
        Ok(())
    }

    async fn shutdown(&self) {
        self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        self.stop_order.lock().unwrap().push(self.name);
    }
}

fn quick_config() -> Config {
    Config {
        init_timeout: Duration::from_secs(1),
        stop_timeout: Duration::from_secs(1),
        settle_delay: Duration::from_millis(1),
        stop_pass_delay: Duration::from_millis(1),
        handle_os_signals: false,
        ..Config::default()
    }
}

async fn wait_until(limit: Duration, cond: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < limit {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

fn position(order: &[&str], name: &str) -> usize {
    order
        .iter()
        .position(|n| *n == name)
        .unwrap_or_else(|| panic!("'{name}' missing from stop order {order:?}"))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_order_is_reverse_topological() {
    let stop_order = Arc::new(Mutex::new(Vec::new()));
    let logging = Probe::new("Logging", &stop_order);
    let network = Probe::new("Network", &stop_order);
    let web_server = Probe::new("WebServer", &stop_order);
    let web_socket = Probe::new("WebSocket", &stop_order);

    let orchestrator = Orchestrator::builder(quick_config()).build();
    let mut events = orchestrator.bus().subscribe();

    let specs = vec![
        SubsystemSpec::new(logging.clone()).critical(),
        SubsystemSpec::new(network.clone())
            .with_dependency("Logging")
            .critical(),
        SubsystemSpec::new(web_server.clone())
            .with_dependency("Logging")
            .with_dependency("Network"),
        SubsystemSpec::new(web_socket.clone())
            .with_dependency("Logging")
            .with_dependency("Network"),
    ];

    let run = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.run(specs).await })
    };

    let state = Arc::clone(orchestrator.state());
    assert!(
        wait_until(Duration::from_secs(5), || state.is_running()).await,
        "host should come up"
    );
    for name in ["Logging", "Network", "WebServer", "WebSocket"] {
        assert!(
            orchestrator.registry().is_running_by_name(name),
            "'{name}' should be running"
        );
    }

    orchestrator.handle().request_shutdown();
    run.await.expect("run task").expect("clean shutdown");

    // Dependents stop strictly before their dependencies; Logging, which
    // everything depends on, stops last of all.
    let order = stop_order.lock().unwrap().clone();
    assert_eq!(order.len(), 4, "every subsystem stops exactly once");
    let net = position(&order, "Network");
    assert!(position(&order, "WebServer") < net);
    assert!(position(&order, "WebSocket") < net);
    assert!(net < position(&order, "Logging"));
    assert_eq!(order.last(), Some(&"Logging"));

    // Network stops strictly before process-level resource cleanup
    // (ShutdownComplete marks the tail of the cleanup step).
    let mut network_stopped_seq = None;
    let mut shutdown_complete_seq = None;
    while let Ok(ev) = events.try_recv() {
        match ev.kind {
            EventKind::SubsystemStopped if ev.subsystem.as_deref() == Some("Network") => {
                network_stopped_seq = Some(ev.seq);
            }
            EventKind::ShutdownComplete => shutdown_complete_seq = Some(ev.seq),
            _ => {}
        }
    }
    let (net_seq, done_seq) = (
        network_stopped_seq.expect("Network stop event"),
        shutdown_complete_seq.expect("shutdown complete event"),
    );
    assert!(net_seq < done_seq);

    // Worker sets are empty once shutdown hooks returned and workers joined.
    for name in ["Logging", "Network", "WebServer", "WebSocket"] {
        let id = orchestrator.registry().id_by_name(name).expect("registered");
        assert_eq!(
            orchestrator.registry().workers_of(id).unwrap().worker_count(),
            0,
            "'{name}' should have no workers left"
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dependency_gating_blocks_init_of_dependents() {
    let stop_order = Arc::new(Mutex::new(Vec::new()));
    let broken = Probe::failing("Network", &stop_order);
    let dependent = Probe::new("WebServer", &stop_order);

    let orchestrator = Orchestrator::builder(quick_config()).build();
    let specs = vec![
        SubsystemSpec::new(broken.clone()),
        SubsystemSpec::new(dependent.clone()).with_dependency("Network"),
    ];

    let run = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.run(specs).await })
    };
    let state = Arc::clone(orchestrator.state());
    assert!(wait_until(Duration::from_secs(5), || state.is_running()).await);

    // Network failed its init, so WebServer's launch readiness was No-Go and
    // its init never ran.
    assert_eq!(broken.init_calls.load(Ordering::SeqCst), 1);
    assert_eq!(dependent.init_calls.load(Ordering::SeqCst), 0);
    assert!(!orchestrator.registry().is_running_by_name("WebServer"));

    orchestrator.handle().request_shutdown();
    run.await.expect("run task").expect("clean shutdown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn duplicate_registration_fails_second_spec_only() {
    let stop_order = Arc::new(Mutex::new(Vec::new()));
    let first = Probe::new("Logging", &stop_order);
    let second = Probe::new("Logging", &stop_order);

    let orchestrator = Orchestrator::builder(quick_config()).build();
    let specs = vec![
        SubsystemSpec::new(first.clone()),
        SubsystemSpec::new(second.clone()),
    ];

    let run = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.run(specs).await })
    };
    let state = Arc::clone(orchestrator.state());
    assert!(wait_until(Duration::from_secs(5), || state.is_running()).await);

    assert_eq!(orchestrator.registry().len(), 1);
    assert_eq!(first.init_calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.init_calls.load(Ordering::SeqCst), 0);

    orchestrator.handle().request_shutdown();
    run.await.expect("run task").expect("clean shutdown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn repeated_shutdown_triggers_run_exactly_one_sequence() {
    let stop_order = Arc::new(Mutex::new(Vec::new()));
    let logging = Probe::new("Logging", &stop_order);
    let network = Probe::new("Network", &stop_order);

    let orchestrator = Orchestrator::builder(quick_config()).build();
    let specs = vec![
        SubsystemSpec::new(logging.clone()).critical(),
        SubsystemSpec::new(network.clone()).with_dependency("Logging"),
    ];

    let run = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.run(specs).await })
    };
    let state = Arc::clone(orchestrator.state());
    assert!(wait_until(Duration::from_secs(5), || state.is_running()).await);

    // Back-to-back triggers, as a double SIGTERM would deliver.
    let handle = orchestrator.handle();
    handle.request_shutdown();
    handle.request_shutdown();
    handle.request_shutdown();
    run.await.expect("run task").expect("clean shutdown");

    assert_eq!(logging.shutdown_calls.load(Ordering::SeqCst), 1);
    assert_eq!(network.shutdown_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn restart_relaunches_then_cap_degrades_to_shutdown() {
    let stop_order = Arc::new(Mutex::new(Vec::new()));
    let logging = Probe::new("Logging", &stop_order);

    let config = Config {
        max_restarts: 1,
        ..quick_config()
    };
    let orchestrator = Orchestrator::builder(config).build();
    let mut events = orchestrator.bus().subscribe();
    let specs = vec![SubsystemSpec::new(logging.clone()).critical()];

    let run = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.run(specs).await })
    };
    let state = Arc::clone(orchestrator.state());
    assert!(wait_until(Duration::from_secs(5), || state.is_running()).await);

    // First restart is within the cap: the host comes back up.
    orchestrator.handle().request_restart();
    let init_calls = Arc::clone(&logging.init_calls);
    assert!(
        wait_until(Duration::from_secs(5), || {
            init_calls.load(Ordering::SeqCst) == 2 && state.is_running()
        })
        .await,
        "host should relaunch after the first restart"
    );
    assert_eq!(state.restart_count(), 1);
    // The registry was reset and re-registered, never accumulated.
    assert_eq!(orchestrator.registry().len(), 1);

    // Second restart exceeds the cap and degrades to a normal shutdown.
    orchestrator.handle().request_restart();
    run.await.expect("run task").expect("clean shutdown");

    assert_eq!(logging.init_calls.load(Ordering::SeqCst), 2);
    assert!(!state.is_starting(), "host must not re-enter Starting");
    assert!(!state.is_running());

    let mut saw_limit = false;
    while let Ok(ev) = events.try_recv() {
        saw_limit |= ev.kind == EventKind::RestartLimitExceeded;
    }
    assert!(saw_limit, "cap refusal should publish RestartLimitExceeded");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_critical_launch_unwinds_started_subsystems() {
    let stop_order = Arc::new(Mutex::new(Vec::new()));
    let logging = Probe::new("Logging", &stop_order);
    let broken = Probe::failing("Network", &stop_order);

    let orchestrator = Orchestrator::builder(quick_config()).build();
    let specs = vec![
        SubsystemSpec::new(logging.clone()).critical(),
        SubsystemSpec::new(broken.clone()).with_dependency("Logging").critical(),
    ];

    let err = orchestrator.run(specs).await.expect_err("launch must fail");
    assert!(matches!(
        err,
        RuntimeError::LaunchFailed { ref subsystem } if subsystem == "Network"
    ));

    // Logging had already started and was stopped again during the unwind.
    assert_eq!(logging.init_calls.load(Ordering::SeqCst), 1);
    assert_eq!(logging.shutdown_calls.load(Ordering::SeqCst), 1);
    assert_eq!(orchestrator.registry().running_count(), 0);
}
