//! Native window mode: one winit window whose child webviews are the hosted
//! views. The control loop runs on the event-loop thread because wry
//! webviews must stay on the thread that created them.

use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use tabhost_common::EventBus;
use tabhost_config::TabhostConfig;
use tabhost_webview::{HostOptions, StatePush, ViewHost, WryFactory};
use tokio::sync::mpsc as tokio_mpsc;
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow};
use winit::window::{Window, WindowId};

use crate::dispatcher::{ControlLoop, ControlMessage};
use crate::options;

/// Parts handed to the host once the window exists.
struct Pending {
    pushes: tokio_mpsc::UnboundedSender<StatePush>,
    control_rx: mpsc::Receiver<ControlMessage>,
}

pub struct NativeApp {
    options: HostOptions,
    bus: Arc<EventBus>,
    data_root: Option<PathBuf>,
    tick: Duration,
    shutdown_timeout: Duration,
    window_size: LogicalSize<f64>,
    pending: Option<Pending>,
    // Field order matters: views are dropped before their parent window.
    control: Option<ControlLoop<WryFactory<Window>>>,
    window: Option<Arc<Window>>,
}

impl NativeApp {
    pub fn new(
        config: &TabhostConfig,
        bus: Arc<EventBus>,
        pushes: tokio_mpsc::UnboundedSender<StatePush>,
        control_rx: mpsc::Receiver<ControlMessage>,
        data_root: Option<PathBuf>,
    ) -> Self {
        Self {
            options: options::host_options(config),
            bus,
            data_root,
            tick: options::tick_interval(config),
            shutdown_timeout: options::shutdown_timeout(config),
            window_size: LogicalSize::new(config.views.default_width, config.views.default_height),
            pending: Some(Pending { pushes, control_rx }),
            control: None,
            window: None,
        }
    }

    fn initialize_window(&mut self, event_loop: &ActiveEventLoop) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };
        let attributes = Window::default_attributes()
            .with_title("tabhost")
            .with_inner_size(self.window_size);
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                error!(error = %e, "failed to create window");
                return false;
            }
        };

        let factory = WryFactory::new(Arc::clone(&window), self.data_root.clone());
        let host = ViewHost::new(
            factory,
            self.options.clone(),
            Arc::clone(&self.bus),
            pending.pushes,
        );
        self.control = Some(ControlLoop::new(
            host,
            pending.control_rx,
            self.tick,
            self.shutdown_timeout,
        ));
        self.window = Some(window);
        info!("native window ready");
        true
    }

    fn shutdown(&mut self) {
        if let Some(mut control) = self.control.take() {
            let report = control.shutdown(self.shutdown_timeout);
            info!(
                graceful = report.graceful,
                forced = report.forced,
                prefetched = report.prefetched,
                "native views released"
            );
        }
        self.window = None;
    }
}

impl ApplicationHandler for NativeApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if !self.initialize_window(event_loop) {
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let WindowEvent::CloseRequested = event {
            info!("window close requested");
            self.shutdown();
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(control) = self.control.as_mut() else {
            return;
        };
        if !control.pump(Duration::ZERO) {
            // Shut down over IPC; the views are already gone.
            self.control = None;
            self.window = None;
            event_loop.exit();
            return;
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + self.tick));
    }
}
