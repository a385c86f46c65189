//! Control thread.
//!
//! The `ViewHost` lives on exactly one thread. Everything else talks to it
//! through a [`DispatcherHandle`]: each message carries a oneshot reply, and
//! the loop ticks the host between messages so engine events are applied and
//! coalesced patches flushed on schedule.

use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tabhost_common::{HostEvent, TabhostError, ViewError};
use tabhost_webview::{CommandReply, HostCommand, ShutdownReport, SurfaceFactory, ViewHost};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

pub enum ControlMessage {
    Command {
        command: HostCommand,
        reply: oneshot::Sender<Result<CommandReply, ViewError>>,
    },
    Shutdown {
        timeout: Duration,
        reply: oneshot::Sender<ShutdownReport>,
    },
}

fn disconnected() -> TabhostError {
    TabhostError::Ipc("control thread is gone".into())
}

// =============================================================================
// HANDLE
// =============================================================================

/// Cloneable sender side of the control thread.
#[derive(Clone)]
pub struct DispatcherHandle {
    sender: mpsc::Sender<ControlMessage>,
}

/// A handle plus the receiver a [`ControlLoop`] is later built from.
pub fn channel() -> (DispatcherHandle, mpsc::Receiver<ControlMessage>) {
    let (sender, rx) = mpsc::channel();
    (DispatcherHandle { sender }, rx)
}

impl DispatcherHandle {
    /// Run `command` on the control thread and wait for its result.
    pub async fn execute(&self, command: HostCommand) -> Result<CommandReply, TabhostError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(ControlMessage::Command { command, reply })
            .map_err(|_| disconnected())?;
        let result = rx.await.map_err(|_| disconnected())?;
        Ok(result?)
    }

    /// Tear every view down and stop the control loop.
    pub async fn shutdown(&self, timeout: Duration) -> Result<ShutdownReport, TabhostError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(ControlMessage::Shutdown { timeout, reply })
            .map_err(|_| disconnected())?;
        rx.await.map_err(|_| disconnected())
    }
}

// =============================================================================
// LOOP
// =============================================================================

pub struct ControlLoop<F: SurfaceFactory> {
    host: ViewHost<F>,
    rx: mpsc::Receiver<ControlMessage>,
    tick: Duration,
    last_tick: Instant,
    /// Used when every handle is dropped without an explicit shutdown.
    shutdown_timeout: Duration,
    finished: bool,
}

impl<F: SurfaceFactory> ControlLoop<F> {
    pub fn new(
        host: ViewHost<F>,
        rx: mpsc::Receiver<ControlMessage>,
        tick: Duration,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            host,
            rx,
            tick,
            last_tick: Instant::now(),
            shutdown_timeout,
            finished: false,
        }
    }

    /// Handle at most the messages that arrive within `wait`, ticking the
    /// host when a tick is due. Returns `false` once the loop has shut down.
    pub fn pump(&mut self, wait: Duration) -> bool {
        if self.finished {
            return false;
        }

        let wait = wait.min(self.until_next_tick());
        match self.rx.recv_timeout(wait) {
            Ok(message) => {
                self.handle(message);
                while !self.finished {
                    match self.rx.try_recv() {
                        Ok(message) => self.handle(message),
                        Err(_) => break,
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                info!("all dispatcher handles dropped; shutting down");
                self.shutdown(self.shutdown_timeout);
            }
        }

        if !self.finished && self.last_tick.elapsed() >= self.tick {
            self.tick_host();
        }
        !self.finished
    }

    /// Pump until shutdown.
    pub fn run(mut self) {
        debug!(tick_ms = self.tick.as_millis() as u64, "control loop running");
        while self.pump(self.tick) {}
        debug!("control loop finished");
    }

    /// Flush pending state, destroy everything and announce `Shutdown`.
    pub fn shutdown(&mut self, timeout: Duration) -> ShutdownReport {
        if self.finished {
            return ShutdownReport::default();
        }
        self.tick_host();
        let report = self.host.destroy_all_views(timeout);
        self.host.bus().publish(HostEvent::Shutdown);
        self.finished = true;
        report
    }

    fn until_next_tick(&self) -> Duration {
        self.tick.saturating_sub(self.last_tick.elapsed())
    }

    fn tick_host(&mut self) {
        let applied = self.host.tick();
        if applied > 0 {
            debug!(applied, "engine events applied");
        }
        self.last_tick = Instant::now();
    }

    fn handle(&mut self, message: ControlMessage) {
        match message {
            ControlMessage::Command { command, reply } => {
                let kind = command.kind();
                let result = self.host.execute(command);
                if let Err(e) = &result {
                    debug!(kind, error = %e, "command failed");
                }
                if reply.send(result).is_err() {
                    debug!(kind, "caller went away before the reply");
                }
            }
            ControlMessage::Shutdown { timeout, reply } => {
                let report = self.shutdown(timeout);
                if reply.send(report).is_err() {
                    warn!("shutdown requester went away");
                }
            }
        }
    }
}

/// Start the control thread. `build` runs on that thread, so the host and
/// its factory never cross threads.
pub fn spawn_control_thread<F, B>(
    build: B,
    tick: Duration,
    shutdown_timeout: Duration,
) -> Result<(DispatcherHandle, JoinHandle<()>), TabhostError>
where
    F: SurfaceFactory + 'static,
    B: FnOnce() -> ViewHost<F> + Send + 'static,
{
    let (handle, rx) = channel();
    let thread = std::thread::Builder::new()
        .name("tabhost-control".into())
        .spawn(move || ControlLoop::new(build(), rx, tick, shutdown_timeout).run())?;
    Ok((handle, thread))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tabhost_common::{EventBus, Rect, ViewId};
    use tabhost_webview::{
        HeadlessFactory, HeadlessProbe, HostOptions, InitialPayload, NavAction, StatePush,
    };
    use tokio::sync::{broadcast, mpsc as tokio_mpsc};

    struct Harness {
        handle: DispatcherHandle,
        thread: JoinHandle<()>,
        probe: HeadlessProbe,
        events: broadcast::Receiver<HostEvent>,
        _pushes: tokio_mpsc::UnboundedReceiver<StatePush>,
    }

    fn start() -> Harness {
        let factory = HeadlessFactory::new();
        let probe = factory.probe();
        let bus = Arc::new(EventBus::new(64));
        let events = bus.subscribe();
        let (push_tx, pushes) = tokio_mpsc::unbounded_channel();
        let (handle, thread) = spawn_control_thread(
            move || ViewHost::new(factory, HostOptions::default(), bus, push_tx),
            Duration::from_millis(5),
            Duration::from_secs(1),
        )
        .unwrap();
        Harness {
            handle,
            thread,
            probe,
            events,
            _pushes: pushes,
        }
    }

    fn create(id: &str, url: &str) -> HostCommand {
        HostCommand::CreateView {
            window_id: ViewId::from(id),
            bounds: Rect::new(0.0, 0.0, 800.0, 600.0),
            initial_payload: InitialPayload::with_url(url),
        }
    }

    #[tokio::test]
    async fn commands_run_on_the_control_thread() {
        let h = start();
        h.handle.execute(create("w1", "https://a.com")).await.unwrap();
        h.handle.execute(create("w2", "https://b.com")).await.unwrap();

        let reply = h.handle.execute(HostCommand::ListViews).await.unwrap();
        assert_eq!(
            reply,
            CommandReply::Views(vec![ViewId::from("w1"), ViewId::from("w2")])
        );

        let report = h.handle.shutdown(Duration::from_secs(1)).await.unwrap();
        assert_eq!(report.graceful, 2);
        h.thread.join().unwrap();
    }

    #[tokio::test]
    async fn view_errors_come_back_as_view_errors() {
        let h = start();
        let err = h
            .handle
            .execute(HostCommand::CreateTab {
                window_id: ViewId::from("nope"),
                url: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TabhostError::View(ViewError::ViewNotFound(_))));
        h.handle.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_destroy_tears_down_once() {
        let h = start();
        h.handle.execute(create("w1", "https://a.com")).await.unwrap();

        let destroy = || HostCommand::DestroyView {
            window_id: ViewId::from("w1"),
        };
        let (a, b) = tokio::join!(h.handle.execute(destroy()), h.handle.execute(destroy()));
        let mut results = vec![a.unwrap(), b.unwrap()];
        results.sort_by_key(|r| matches!(r, CommandReply::Destroyed(true)));
        assert_eq!(
            results,
            vec![CommandReply::Destroyed(false), CommandReply::Destroyed(true)]
        );

        let surface = h.probe.created()[0];
        assert_eq!(h.probe.journal(surface).unwrap().destroys, 1);
        assert_eq!(h.probe.live_count(), 0);
        h.handle.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_publishes_event_and_closes_the_handle() {
        let mut h = start();
        h.handle.execute(create("w1", "https://a.com")).await.unwrap();
        h.handle.shutdown(Duration::from_secs(1)).await.unwrap();
        h.thread.join().unwrap();

        let mut saw_shutdown = false;
        while let Ok(event) = h.events.try_recv() {
            saw_shutdown |= event == HostEvent::Shutdown;
        }
        assert!(saw_shutdown);

        let err = h
            .handle
            .execute(HostCommand::Navigate {
                window_id: ViewId::from("w1"),
                action: NavAction::Reload,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TabhostError::Ipc(_)));
    }

    #[test]
    fn dropping_every_handle_destroys_all_views() {
        let h = start();
        let (reply, rx) = oneshot::channel();
        h.handle
            .sender
            .send(ControlMessage::Command {
                command: create("w1", "https://a.com"),
                reply,
            })
            .unwrap();
        rx.blocking_recv().unwrap().unwrap();

        drop(h.handle);
        h.thread.join().unwrap();
        assert_eq!(h.probe.live_count(), 0);
    }

    #[test]
    fn pump_reports_finished_after_shutdown() {
        let bus = Arc::new(EventBus::new(16));
        let (push_tx, _pushes) = tokio_mpsc::unbounded_channel();
        let host = ViewHost::new(HeadlessFactory::new(), HostOptions::default(), bus, push_tx);
        let (handle, rx) = channel();
        let mut control = ControlLoop::new(host, rx, Duration::from_millis(5), Duration::from_secs(1));

        assert!(control.pump(Duration::ZERO));
        let (reply, mut report_rx) = oneshot::channel();
        handle
            .sender
            .send(ControlMessage::Shutdown {
                timeout: Duration::from_secs(1),
                reply,
            })
            .unwrap();
        assert!(!control.pump(Duration::ZERO));
        assert!(!control.pump(Duration::ZERO));
        assert_eq!(report_rx.try_recv().unwrap(), ShutdownReport::default());
    }
}
