//! Newline-delimited JSON over a byte stream (stdin/stdout in the binary).
//!
//! Requests are executed one at a time in arrival order. State pushes and
//! host events are interleaved into the same output stream by forwarder
//! tasks; a single writer task owns the output.

use std::future::Future;
use std::time::Duration;

use tabhost_common::{HostEvent, TabhostError, ViewError};
use tabhost_webview::{CommandReply, IpcRequest, OutboundMessage, ShutdownReport, StatePush};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::dispatcher::DispatcherHandle;

/// Request kind that ends the session.
pub const SHUTDOWN_KIND: &str = "shutdown";

/// How long forwarders get to drain after the control loop has stopped.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

enum Flow {
    Continue,
    Stop,
}

/// Serve requests from `reader` until it closes, a `shutdown` request
/// arrives or `shutdown_signal` resolves. Then shut the control loop down,
/// bounded by `shutdown_timeout`.
pub async fn serve<R, W, S>(
    reader: R,
    writer: W,
    handle: DispatcherHandle,
    pushes: mpsc::UnboundedReceiver<StatePush>,
    events: broadcast::Receiver<HostEvent>,
    shutdown_signal: S,
    shutdown_timeout: Duration,
) -> Result<ShutdownReport, TabhostError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
    S: Future<Output = ()>,
{
    let (out, out_rx) = mpsc::unbounded_channel::<OutboundMessage>();
    let writer_task = tokio::spawn(write_lines(writer, out_rx));
    let push_task = spawn_push_forwarder(pushes, out.clone());
    let event_task = spawn_event_forwarder(events, out.clone());

    let mut lines = reader.lines();
    tokio::pin!(shutdown_signal);
    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("shutdown signal received");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Flow::Stop = handle_line(&line, &handle, &out).await {
                        break;
                    }
                }
                Ok(None) => {
                    info!("input closed");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "input read failed");
                    break;
                }
            },
        }
    }

    let report = match tokio::time::timeout(
        shutdown_timeout + DRAIN_TIMEOUT,
        handle.shutdown(shutdown_timeout),
    )
    .await
    {
        Ok(report) => report,
        Err(_) => {
            warn!(
                timeout_ms = shutdown_timeout.as_millis() as u64,
                "control loop did not confirm shutdown in time"
            );
            Ok(ShutdownReport::default())
        }
    };

    join_bounded("push forwarder", push_task).await;
    join_bounded("event forwarder", event_task).await;
    drop(out);
    join_bounded("writer", writer_task).await;
    report
}

async fn handle_line(
    line: &str,
    handle: &DispatcherHandle,
    out: &mpsc::UnboundedSender<OutboundMessage>,
) -> Flow {
    let line = line.trim();
    if line.is_empty() {
        return Flow::Continue;
    }

    let request = match IpcRequest::from_json(line) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "unparseable request");
            send(out, OutboundMessage::reply(None, Err(e)));
            return Flow::Continue;
        }
    };

    if request.kind == SHUTDOWN_KIND {
        info!("shutdown requested");
        send(out, OutboundMessage::reply::<ViewError>(request.id, Ok(CommandReply::Ack)));
        return Flow::Stop;
    }

    let command = match request.command() {
        Ok(command) => command,
        Err(e) => {
            warn!(kind = %request.kind, error = %e, "rejected request");
            send(out, OutboundMessage::reply(request.id, Err(e)));
            return Flow::Continue;
        }
    };

    debug!(id = ?request.id, kind = command.kind(), "request");
    match handle.execute(command).await {
        Err(e @ TabhostError::Ipc(_)) => {
            error!(error = %e, "control loop unavailable");
            send(out, OutboundMessage::reply(request.id, Err(e)));
            Flow::Stop
        }
        result => {
            send(out, OutboundMessage::reply(request.id, result));
            Flow::Continue
        }
    }
}

fn send(out: &mpsc::UnboundedSender<OutboundMessage>, message: OutboundMessage) {
    if out.send(message).is_err() {
        debug!("output closed; message dropped");
    }
}

// =============================================================================
// TASKS
// =============================================================================

async fn write_lines<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<OutboundMessage>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let mut line = match message.encode() {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "failed to encode outbound message");
                continue;
            }
        };
        line.push('\n');
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            error!(error = %e, "output write failed");
            return;
        }
        if let Err(e) = writer.flush().await {
            error!(error = %e, "output flush failed");
            return;
        }
    }
    if let Err(e) = writer.shutdown().await {
        debug!(error = %e, "output shutdown failed");
    }
}

fn spawn_push_forwarder(
    mut pushes: mpsc::UnboundedReceiver<StatePush>,
    out: mpsc::UnboundedSender<OutboundMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(push) = pushes.recv().await {
            if out.send(OutboundMessage::Push(push)).is_err() {
                break;
            }
        }
    })
}

fn spawn_event_forwarder(
    mut events: broadcast::Receiver<HostEvent>,
    out: mpsc::UnboundedSender<OutboundMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let last = event == HostEvent::Shutdown;
                    if out.send(OutboundMessage::Event { event }).is_err() || last {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("event forwarder lagged by {n} events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn join_bounded(name: &str, task: JoinHandle<()>) {
    let abort = task.abort_handle();
    match tokio::time::timeout(DRAIN_TIMEOUT, task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(task = name, error = %e, "task failed"),
        Err(_) => {
            warn!(task = name, "task did not finish in time; aborting");
            abort.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::sync::Arc;
    use tabhost_common::EventBus;
    use tabhost_webview::{HeadlessFactory, HostOptions, ViewHost};
    use tokio::io::{AsyncReadExt, BufReader, DuplexStream};

    use crate::dispatcher::spawn_control_thread;

    struct Session {
        input: DuplexStream,
        output: DuplexStream,
        server: JoinHandle<Result<ShutdownReport, TabhostError>>,
    }

    fn start_with_signal<S>(signal: S) -> Session
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let bus = Arc::new(EventBus::new(64));
        let events = bus.subscribe();
        let (push_tx, pushes) = mpsc::unbounded_channel();
        let (handle, _thread) = spawn_control_thread(
            move || ViewHost::new(HeadlessFactory::new(), HostOptions::default(), bus, push_tx),
            Duration::from_millis(5),
            Duration::from_secs(1),
        )
        .unwrap();

        let (input, server_in) = tokio::io::duplex(64 * 1024);
        let (server_out, output) = tokio::io::duplex(256 * 1024);
        let server = tokio::spawn(serve(
            BufReader::new(server_in),
            server_out,
            handle,
            pushes,
            events,
            signal,
            Duration::from_secs(1),
        ));
        Session {
            input,
            output,
            server,
        }
    }

    fn start() -> Session {
        start_with_signal(std::future::pending())
    }

    async fn finish(
        server: JoinHandle<Result<ShutdownReport, TabhostError>>,
        mut output: DuplexStream,
    ) -> (ShutdownReport, Vec<Value>) {
        let report = server.await.unwrap().unwrap();
        let mut raw = String::new();
        output.read_to_string(&mut raw).await.unwrap();
        let lines = raw
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        (report, lines)
    }

    fn reply_for(lines: &[Value], id: u64) -> &Value {
        lines
            .iter()
            .find(|l| l["channel"] == "reply" && l["id"] == id)
            .unwrap_or_else(|| panic!("no reply for {id}"))
    }

    #[tokio::test]
    async fn commands_get_replies_pushes_and_events() {
        let Session {
            mut input,
            output,
            server,
        } = start();
        input
            .write_all(
                concat!(
                    r#"{"id":1,"kind":"createView","payload":{"windowId":"w1","bounds":{"x":0,"y":0,"width":800,"height":600},"initialPayload":{"url":"https://a.com"}}}"#,
                    "\n",
                    r#"{"id":2,"kind":"listViews"}"#,
                    "\n",
                    r#"{"id":3,"kind":"shutdown"}"#,
                    "\n",
                )
                .as_bytes(),
            )
            .await
            .unwrap();

        let (report, lines) = finish(server, output).await;
        assert_eq!(report.graceful, 1);

        assert_eq!(reply_for(&lines, 1)["result"]["kind"], "viewCreated");
        assert_eq!(reply_for(&lines, 1)["result"]["value"], "created");
        assert_eq!(reply_for(&lines, 2)["result"]["value"][0], "w1");
        assert_eq!(reply_for(&lines, 3)["result"]["kind"], "ack");

        assert!(lines
            .iter()
            .any(|l| l["channel"] == "push" && l["windowId"] == "w1"));
        assert!(lines
            .iter()
            .any(|l| l["channel"] == "event" && l["event"]["type"] == "ViewCreated"));
        assert!(lines
            .iter()
            .any(|l| l["channel"] == "event" && l["event"]["type"] == "Shutdown"));
    }

    #[tokio::test]
    async fn bad_requests_get_error_replies() {
        let Session {
            mut input,
            output,
            server,
        } = start();
        input
            .write_all(
                concat!(
                    "not json\n",
                    "\n",
                    r#"{"id":7,"kind":"frobnicate"}"#,
                    "\n",
                    r#"{"id":8,"kind":"closeTab","payload":{"windowId":"w9","tabId":"t1"}}"#,
                    "\n",
                )
                .as_bytes(),
            )
            .await
            .unwrap();
        drop(input);
        let (report, lines) = finish(server, output).await;
        assert_eq!(report.graceful, 0);

        let anonymous = lines
            .iter()
            .find(|l| l["channel"] == "reply" && l["id"].is_null())
            .unwrap();
        assert!(anonymous["error"]
            .as_str()
            .unwrap()
            .starts_with("malformed input"));
        assert!(reply_for(&lines, 7)["error"]
            .as_str()
            .unwrap()
            .contains("frobnicate"));
        assert!(reply_for(&lines, 8)["error"]
            .as_str()
            .unwrap()
            .contains("view not found"));
    }

    #[tokio::test]
    async fn signal_ends_the_session() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let s = start_with_signal(async move {
            let _ = rx.await;
        });
        tx.send(()).unwrap();
        let (report, lines) = finish(s.server, s.output).await;
        assert_eq!(report, ShutdownReport::default());
        assert!(lines
            .iter()
            .any(|l| l["channel"] == "event" && l["event"]["type"] == "Shutdown"));
    }
}
