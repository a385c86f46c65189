mod cli;
mod dispatcher;
mod logging;
#[cfg(feature = "native")]
mod native;
mod options;
mod transport;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tabhost_common::{EventBus, TabhostError};
use tabhost_config::TabhostConfig;
use tabhost_webview::{
    spawn_activity_forwarder, HeadlessFactory, ShutdownReport, TracingActivityLog, ViewHost,
};
use tokio::io::BufReader;
use tokio::sync::mpsc;

/// Grace period for runtime tasks (stdin reader included) at exit.
const RUNTIME_SHUTDOWN: Duration = Duration::from_secs(2);

fn main() -> ExitCode {
    let args = cli::parse();

    // Config comes first: it carries the default log level.
    let loaded = tabhost_config::load_config(args.config.as_deref());
    let configured_level = loaded
        .as_ref()
        .map(|c| c.logging.level)
        .unwrap_or_default();
    logging::init(&logging::resolve_directive(
        args.log_level.as_deref(),
        configured_level,
    ));

    tracing::info!("tabhost v{} starting", env!("CARGO_PKG_VERSION"));
    let config = match loaded {
        Ok(config) => config,
        Err(e) if args.config.is_some() => {
            tracing::error!("config load failed: {e}");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            tracing::warn!("config load failed, using defaults: {e}");
            TabhostConfig::default()
        }
    };

    if args.print_config {
        println!("{}", tabhost_config::config_to_json(&config));
        return ExitCode::SUCCESS;
    }

    match run(&args, config) {
        Ok(()) => {
            tracing::info!("shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "native")]
fn run(args: &cli::Args, config: TabhostConfig) -> Result<(), TabhostError> {
    if args.headless {
        run_headless(config)
    } else {
        run_native(args, config)
    }
}

#[cfg(not(feature = "native"))]
fn run(args: &cli::Args, config: TabhostConfig) -> Result<(), TabhostError> {
    if args.data_dir.is_some() {
        tracing::warn!("--data-dir has no effect without native webviews");
    }
    run_headless(config)
}

fn log_report(report: &ShutdownReport) {
    tracing::info!(
        graceful = report.graceful,
        forced = report.forced,
        prefetched = report.prefetched,
        "views torn down"
    );
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("ctrl-c handler unavailable: {e}");
        std::future::pending::<()>().await;
    }
}

/// Views backed by the headless engine, driven over stdio.
fn run_headless(config: TabhostConfig) -> Result<(), TabhostError> {
    let runtime = tokio::runtime::Runtime::new()?;
    let tick = options::tick_interval(&config);
    let shutdown_timeout = options::shutdown_timeout(&config);
    let host_options = options::host_options(&config);

    let result = runtime.block_on(async move {
        let bus = Arc::new(EventBus::default());
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let activity = spawn_activity_forwarder(bus.subscribe(), Arc::new(TracingActivityLog));
        let events = bus.subscribe();

        let host_bus = Arc::clone(&bus);
        let (handle, control) = dispatcher::spawn_control_thread(
            move || ViewHost::new(HeadlessFactory::new(), host_options, host_bus, push_tx),
            tick,
            shutdown_timeout,
        )?;
        tracing::info!("headless host ready; reading commands from stdin");

        let report = transport::serve(
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
            handle,
            push_rx,
            events,
            ctrl_c(),
            shutdown_timeout,
        )
        .await?;
        log_report(&report);

        match tokio::task::spawn_blocking(move || control.join()).await {
            Ok(Ok(())) => {}
            _ => tracing::error!("control thread panicked"),
        }
        if tokio::time::timeout(Duration::from_secs(1), activity).await.is_err() {
            tracing::warn!("activity forwarder did not stop in time");
        }
        Ok::<(), TabhostError>(())
    });

    runtime.shutdown_timeout(RUNTIME_SHUTDOWN);
    result
}

#[cfg(feature = "native")]
fn run_native(args: &cli::Args, config: TabhostConfig) -> Result<(), TabhostError> {
    use winit::event_loop::EventLoop;

    let runtime = tokio::runtime::Runtime::new()?;
    let enter = runtime.enter();

    let bus = Arc::new(EventBus::default());
    let (push_tx, push_rx) = mpsc::unbounded_channel();
    let (handle, control_rx) = dispatcher::channel();
    let _activity = spawn_activity_forwarder(bus.subscribe(), Arc::new(TracingActivityLog));

    let serve_task = runtime.spawn(transport::serve(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        handle,
        push_rx,
        bus.subscribe(),
        ctrl_c(),
        options::shutdown_timeout(&config),
    ));

    let event_loop = EventLoop::new().map_err(|e| TabhostError::Other(e.to_string()))?;
    let mut app = native::NativeApp::new(&config, bus, push_tx, control_rx, data_root(args));

    tracing::info!("entering event loop");
    let result = event_loop
        .run_app(&mut app)
        .map_err(|e| TabhostError::Other(format!("event loop error: {e}")));
    drop(app);

    // The window closing first leaves the transport waiting on stdin.
    if serve_task.is_finished() {
        match runtime.block_on(serve_task) {
            Ok(Ok(report)) => log_report(&report),
            Ok(Err(e)) => tracing::warn!("transport ended with error: {e}"),
            Err(e) => tracing::warn!("transport task failed: {e}"),
        }
    } else {
        serve_task.abort();
    }
    drop(enter);
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN);
    result
}

#[cfg(feature = "native")]
fn data_root(args: &cli::Args) -> Option<std::path::PathBuf> {
    args.data_dir
        .clone()
        .or_else(|| dirs::data_dir().map(|d| d.join("tabhost").join("partitions")))
}
