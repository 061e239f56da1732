/*!
# Control Runtime

Unix stream socket in front of [`ControlChannel`](crate::ControlChannel).

One command per connection: the client writes the encoded command and shuts
down its write half; the server answers with one status byte (`0` applied,
`1` rejected) followed by a UTF-8 message, then closes. A client that does not
finish its write within the configured read timeout is rejected.

On shutdown the listener stops accepting, and every connection already
accepted is served to completion before [`serve_control`] returns.
*/

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use grindvakt_config::{ControlConfig, GrindvaktConfig};
use grindvakt_prevention::{Command, COMMAND_WIRE_SIZE};
use grindvakt_telemetry::EventLogger;
use opentelemetry::KeyValue;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn, Instrument};

use crate::engine::{EngineError, FilterEngine};

const STATUS_OK: u8 = 0;
const STATUS_REJECTED: u8 = 1;

// One byte past a full command so oversize writes are seen as such.
const READ_LIMIT: u64 = COMMAND_WIRE_SIZE as u64 + 1;

/// Runs the engine with its control endpoint until Ctrl-C, then flushes
/// both chains.
#[instrument(level = "info", name = "run_service", skip(config))]
pub async fn run_service(config: &GrindvaktConfig) -> Result<(), EngineError> {
    let engine = Arc::new(FilterEngine::new(config)?);

    let result = serve_control(Arc::clone(&engine), &config.control, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl-C");
        }
    })
    .await;

    engine.shutdown();
    result
}

/// Accepts control connections on the configured socket until `shutdown`
/// resolves, then waits for the connections in flight.
/// A stale socket file left at the path is replaced.
pub async fn serve_control<F>(
    engine: Arc<FilterEngine>,
    control: &ControlConfig,
    shutdown: F,
) -> Result<(), EngineError>
where
    F: Future<Output = ()>,
{
    let socket_path = control.socket_path.as_path();
    let read_timeout = control.read_timeout();
    if let Some(parent) = socket_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if tokio::fs::try_exists(socket_path).await? {
        tokio::fs::remove_file(socket_path).await?;
    }

    let listener = UnixListener::bind(socket_path)?;
    info!(path = %socket_path.display(), "Control socket listening");

    let mut connections = JoinSet::new();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                connection_reap(joined);
            }
            accepted = listener.accept() => {
                let stream = match accepted {
                    Ok((stream, _)) => stream,
                    Err(err) => {
                        error!(error = %err, "Control socket accept failed");
                        continue;
                    }
                };
                let engine = Arc::clone(&engine);
                connections.spawn(
                    async move {
                        if let Err(err) = connection_handle(&engine, stream, read_timeout).await {
                            error!(error = %err, "Control connection failed");
                        }
                    }
                    .instrument(tracing::info_span!("control_connection")),
                );
            }
        }
    }

    drop(listener);
    if !connections.is_empty() {
        info!(pending = connections.len(), "Waiting for control connections");
    }
    while let Some(joined) = connections.join_next().await {
        connection_reap(joined);
    }

    tokio::fs::remove_file(socket_path).await?;
    info!("Control socket closed");
    Ok(())
}

fn connection_reap(joined: Result<(), tokio::task::JoinError>) {
    if let Err(err) = joined {
        error!(error = %err, "Control connection task failed");
    }
}

async fn connection_handle(
    engine: &FilterEngine,
    mut stream: UnixStream,
    read_timeout: Duration,
) -> Result<(), EngineError> {
    let mut request = Vec::with_capacity(READ_LIMIT as usize);
    let read = tokio::time::timeout(
        read_timeout,
        (&mut stream).take(READ_LIMIT).read_to_end(&mut request),
    )
    .await;

    let (status, message) = match read {
        Ok(read) => {
            read?;
            command_handle(engine, &request).await
        }
        Err(_) => {
            warn!(
                timeout_ms = read_timeout.as_millis() as u64,
                received = request.len(),
                "Control client did not finish its command in time"
            );
            engine.inc_control_rejected();
            (STATUS_REJECTED, String::from("timed out waiting for the command"))
        }
    };

    let mut reply = Vec::with_capacity(1 + message.len());
    reply.push(status);
    reply.extend_from_slice(message.as_bytes());
    stream.write_all(&reply).await?;
    stream.shutdown().await?;
    Ok(())
}

async fn command_handle(engine: &FilterEngine, request: &[u8]) -> (u8, String) {
    match engine.control().command_write(request) {
        Ok(command) => {
            command_audit(&command).await;
            (STATUS_OK, String::from("ok"))
        }
        Err(err) => {
            EventLogger::log_event(
                "command_rejected",
                vec![
                    KeyValue::new("error", err.to_string()),
                    KeyValue::new("bytes", request.len() as i64),
                ],
            )
            .await;
            (STATUS_REJECTED, err.to_string())
        }
    }
}

async fn command_audit(command: &Command) {
    match command {
        Command::Add { chain, rule } => {
            EventLogger::log_event(
                "rule_add",
                vec![
                    KeyValue::new("chain", chain.as_str()),
                    KeyValue::new("rule", format!("{rule:?}")),
                    KeyValue::new("action", rule.action.as_str()),
                ],
            )
            .await
        }
        Command::Flush { chain } => {
            EventLogger::log_event("chain_flush", vec![KeyValue::new("chain", chain.as_str())])
                .await
        }
    }
}

/// Sends one command to a running engine. Returns the engine's message.
pub async fn control_send(socket_path: &Path, command: &Command) -> Result<String, EngineError> {
    let mut stream = UnixStream::connect(socket_path).await?;
    stream.write_all(&command.encode()).await?;
    stream.shutdown().await?;

    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await?;

    let Some((&status, message)) = reply.split_first() else {
        return Err(EngineError::Protocol("empty reply".into()));
    };
    let message = String::from_utf8_lossy(message).into_owned();
    match status {
        STATUS_OK => Ok(message),
        STATUS_REJECTED => Err(EngineError::Rejected(message)),
        other => Err(EngineError::Protocol(format!("unknown status byte {other}"))),
    }
}
