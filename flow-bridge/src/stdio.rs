//! Newline-delimited JSON transport between a session and a UI process.
//!
//! Each inbound line is either a UI intent (`{"type":"execute",...}`) or a
//! host command (`{"type":"runAll"}`); each outbound line is one
//! `SessionMessage`.

use anyhow::{Context, Result};
use flow_core::{SessionHandle, SessionMessage, UiMessage};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

/// Editor-level commands that are not part of the UI protocol.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostCommand {
    RunAll,
    StopAll,
    ClearOutput,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Inbound {
    Host(HostCommand),
    Ui(UiMessage),
}

pub fn decode_line(line: &str) -> Result<Inbound> {
    serde_json::from_str(line).with_context(|| format!("Unrecognized message: {}", line))
}

pub fn dispatch(session: &SessionHandle, inbound: Inbound) {
    match inbound {
        Inbound::Host(HostCommand::RunAll) => session.run_all(),
        Inbound::Host(HostCommand::StopAll) => session.stop_all(),
        Inbound::Host(HostCommand::ClearOutput) => session.clear_output(),
        Inbound::Ui(message) => session.send(message),
    }
}

/// Pump `input` into the session and session messages into `output` until
/// the input ends. The session is disposed on EOF; returns once every
/// message it produced has been written.
pub async fn serve<R, W>(
    input: R,
    output: W,
    session: SessionHandle,
    messages: mpsc::UnboundedReceiver<SessionMessage>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let writer = tokio::spawn(write_messages(output, messages));

    let mut lines = BufReader::new(input).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match decode_line(line) {
            Ok(inbound) => dispatch(&session, inbound),
            Err(e) => tracing::warn!("{:#}", e),
        }
    }

    tracing::info!("Input closed; shutting down {}", session.uri());
    session.dispose();
    writer.await.context("Writer task failed")?
}

async fn write_messages<W>(
    mut output: W,
    mut messages: mpsc::UnboundedReceiver<SessionMessage>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = messages.recv().await {
        let mut frame = serde_json::to_string(&message).context("Failed to encode message")?;
        frame.push('\n');
        output
            .write_all(frame.as_bytes())
            .await
            .context("Failed to write message")?;
        output.flush().await.context("Failed to flush output")?;
    }
    Ok(())
}
