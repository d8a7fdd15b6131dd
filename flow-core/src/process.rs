//! Per-block process execution.
//!
//! Every block id owns at most one live child process. Each `execute` bumps
//! the block's generation; events carry the generation they were produced
//! under, and [`ProcessManager::accept`] drops anything from an older one.
//! That keeps a killed process's late output or exit from being attributed
//! to the block's next run.
//!
//! Events flow through an unbounded channel to whoever owns the manager
//! (the session task), which must pass each one through `accept` before
//! acting on it.

use std::collections::{BTreeMap, HashMap};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, oneshot};

use crate::config::FlowConfig;
use crate::document::{BlockStatus, ExecutionContext};
use crate::protocol::SessionMessage;
use crate::shell::ShellInvocation;
use crate::BlockId;

/// Exit code reported when a process could not be started or waited on.
pub const FAILED_EXIT_CODE: i32 = 1;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to wait for process: {0}")]
    Wait(#[source] std::io::Error),
}

/// Lifecycle events of one execution, tagged with the block's generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionEvent {
    Started {
        block_id: BlockId,
        generation: u64,
    },
    Output {
        block_id: BlockId,
        generation: u64,
        data: String,
    },
    Ended {
        block_id: BlockId,
        generation: u64,
        exit_code: i32,
    },
}

impl ExecutionEvent {
    pub fn block_id(&self) -> &str {
        match self {
            ExecutionEvent::Started { block_id, .. }
            | ExecutionEvent::Output { block_id, .. }
            | ExecutionEvent::Ended { block_id, .. } => block_id,
        }
    }

    pub fn generation(&self) -> u64 {
        match self {
            ExecutionEvent::Started { generation, .. }
            | ExecutionEvent::Output { generation, .. }
            | ExecutionEvent::Ended { generation, .. } => *generation,
        }
    }
}

impl From<ExecutionEvent> for SessionMessage {
    fn from(event: ExecutionEvent) -> Self {
        match event {
            ExecutionEvent::Started { block_id, .. } => SessionMessage::ExecutionStart { block_id },
            ExecutionEvent::Output { block_id, data, .. } => {
                SessionMessage::ExecutionOutput { block_id, data }
            }
            ExecutionEvent::Ended {
                block_id,
                exit_code,
                ..
            } => SessionMessage::ExecutionEnd {
                block_id,
                exit_code,
            },
        }
    }
}

/// Handle to one `execute` call. Resolves exactly once with the exit code
/// that is also carried by the execution's `Ended` event.
#[derive(Debug)]
pub struct Execution {
    generation: Option<u64>,
    outcome: Outcome,
}

#[derive(Debug)]
enum Outcome {
    Done(i32),
    Pending(oneshot::Receiver<i32>),
}

impl Execution {
    fn finished(exit_code: i32) -> Self {
        Self {
            generation: None,
            outcome: Outcome::Done(exit_code),
        }
    }

    /// Generation the execution runs under; `None` for skipped (empty) commands.
    pub fn generation(&self) -> Option<u64> {
        self.generation
    }

    pub async fn wait(self) -> i32 {
        match self.outcome {
            Outcome::Done(code) => code,
            Outcome::Pending(rx) => rx.await.unwrap_or(FAILED_EXIT_CODE),
        }
    }
}

#[derive(Debug)]
struct RunningProcess {
    kill: Option<oneshot::Sender<()>>,
    stdin: mpsc::UnboundedSender<Vec<u8>>,
}

impl RunningProcess {
    /// Best-effort, does not wait for the process to die.
    fn kill(mut self) {
        if let Some(tx) = self.kill.take() {
            let _ = tx.send(());
        }
    }
}

#[derive(Debug)]
struct BlockSlot {
    generation: u64,
    state: BlockStatus,
    process: Option<RunningProcess>,
}

impl Default for BlockSlot {
    fn default() -> Self {
        Self {
            generation: 0,
            state: BlockStatus::Idle,
            process: None,
        }
    }
}

#[derive(Debug)]
pub struct ProcessManager {
    events: mpsc::UnboundedSender<ExecutionEvent>,
    slots: HashMap<BlockId, BlockSlot>,
    force_color: bool,
    read_buffer_size: usize,
}

impl ProcessManager {
    pub fn new(events: mpsc::UnboundedSender<ExecutionEvent>, config: &FlowConfig) -> Self {
        Self {
            events,
            slots: HashMap::new(),
            force_color: config.force_color,
            read_buffer_size: config.read_buffer_size.max(1),
        }
    }

    /// Run `command` for `block_id` in `context`. Any process still running
    /// for the block is killed first. Empty commands are skipped entirely.
    pub fn execute(
        &mut self,
        block_id: &str,
        command: &str,
        context: &ExecutionContext,
        variables: &BTreeMap<String, String>,
    ) -> Execution {
        if command.trim().is_empty() {
            tracing::warn!("Empty command for block {}, skipping execution", block_id);
            return Execution::finished(0);
        }

        self.stop(block_id);

        let slot = self.slots.entry(block_id.to_string()).or_default();
        slot.generation += 1;
        slot.state = BlockStatus::Running;
        let generation = slot.generation;

        tracing::info!("Executing block {} (gen {}): {}", block_id, generation, command);
        let _ = self.events.send(ExecutionEvent::Started {
            block_id: block_id.to_string(),
            generation,
        });

        let (done_tx, done_rx) = oneshot::channel();
        let execution = Execution {
            generation: Some(generation),
            outcome: Outcome::Pending(done_rx),
        };

        let child = match spawn_shell(command, context, variables, self.force_color) {
            Ok(child) => child,
            Err(e) => {
                tracing::error!("Block {}: {}", block_id, e);
                let _ = self.events.send(ExecutionEvent::Output {
                    block_id: block_id.to_string(),
                    generation,
                    data: format!("\r\nError: {}\r\n", e),
                });
                let _ = self.events.send(ExecutionEvent::Ended {
                    block_id: block_id.to_string(),
                    generation,
                    exit_code: FAILED_EXIT_CODE,
                });
                let _ = done_tx.send(FAILED_EXIT_CODE);
                return execution;
            }
        };

        let (kill_tx, kill_rx) = oneshot::channel();
        let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();
        slot.process = Some(RunningProcess {
            kill: Some(kill_tx),
            stdin: stdin_tx,
        });

        let supervisor = Supervisor {
            block_id: block_id.to_string(),
            generation,
            events: self.events.clone(),
            read_buffer_size: self.read_buffer_size,
        };
        tokio::spawn(supervisor.run(child, kill_rx, stdin_rx, done_tx));

        execution
    }

    /// Terminate and deregister the block's process. Silent if there is none.
    pub fn stop(&mut self, block_id: &str) {
        if let Some(process) = self.slots.get_mut(block_id).and_then(|s| s.process.take()) {
            tracing::info!("Stopping process for block {}", block_id);
            process.kill();
        }
    }

    /// Write to the block's stdin. Ignored when nothing is running or the
    /// process already closed its input.
    pub fn send_input(&self, block_id: &str, data: &str) {
        match self.slots.get(block_id).and_then(|s| s.process.as_ref()) {
            Some(process) => {
                if process.stdin.send(data.as_bytes().to_vec()).is_err() {
                    tracing::debug!("stdin of block {} is closed", block_id);
                }
            }
            None => tracing::warn!("No running process for block {}", block_id),
        }
    }

    /// Kill every running process. Unlike [`kill_all`](Self::kill_all) the
    /// generations stay current, so each block still reports its end.
    pub fn stop_all(&mut self) {
        let mut stopped = 0;
        for slot in self.slots.values_mut() {
            if let Some(process) = slot.process.take() {
                process.kill();
                stopped += 1;
            }
        }
        if stopped > 0 {
            tracing::info!("Stopped {} processes", stopped);
        }
    }

    /// Kill every process and retire every generation, so nothing produced
    /// by those processes is accepted afterwards.
    pub fn kill_all(&mut self) {
        let running = self.running_count();
        if running > 0 {
            tracing::info!("Killing {} processes", running);
        }
        for slot in self.slots.values_mut() {
            if let Some(process) = slot.process.take() {
                process.kill();
            }
            slot.generation += 1;
            if slot.state == BlockStatus::Running {
                slot.state = BlockStatus::Idle;
            }
        }
    }

    /// Gate for incoming events: `true` when the event belongs to the
    /// block's current generation and should be acted upon.
    pub fn accept(&mut self, event: &ExecutionEvent) -> bool {
        let Some(slot) = self.slots.get_mut(event.block_id()) else {
            return false;
        };
        if slot.generation != event.generation() {
            tracing::debug!(
                "Discarding stale event for block {} (gen {} != {})",
                event.block_id(),
                event.generation(),
                slot.generation
            );
            return false;
        }
        if let ExecutionEvent::Ended { exit_code, .. } = event {
            slot.process = None;
            slot.state = BlockStatus::from_exit_code(*exit_code);
        }
        true
    }

    pub fn status(&self, block_id: &str) -> BlockStatus {
        self.slots
            .get(block_id)
            .map(|s| s.state)
            .unwrap_or(BlockStatus::Idle)
    }

    pub fn generation(&self, block_id: &str) -> Option<u64> {
        self.slots.get(block_id).map(|s| s.generation)
    }

    pub fn is_running(&self, block_id: &str) -> bool {
        self.slots
            .get(block_id)
            .is_some_and(|s| s.process.is_some())
    }

    pub fn running_count(&self) -> usize {
        self.slots.values().filter(|s| s.process.is_some()).count()
    }
}

fn spawn_shell(
    command: &str,
    context: &ExecutionContext,
    variables: &BTreeMap<String, String>,
    force_color: bool,
) -> Result<Child, ProcessError> {
    let invocation = ShellInvocation::new(&context.shell, command);

    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .current_dir(&context.cwd)
        .envs(variables)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if force_color {
        cmd.env("FORCE_COLOR", "1");
    }

    cmd.spawn().map_err(|source| ProcessError::Spawn {
        program: invocation.program,
        source,
    })
}

/// Owns one child for its whole life: pumps its pipes, feeds stdin, waits
/// for exit (or a kill request) and reports the end.
struct Supervisor {
    block_id: BlockId,
    generation: u64,
    events: mpsc::UnboundedSender<ExecutionEvent>,
    read_buffer_size: usize,
}

impl Supervisor {
    async fn run(
        self,
        mut child: Child,
        kill_rx: oneshot::Receiver<()>,
        stdin_rx: mpsc::UnboundedReceiver<Vec<u8>>,
        done_tx: oneshot::Sender<i32>,
    ) {
        let stdout = child
            .stdout
            .take()
            .map(|out| tokio::spawn(self.pump(out)));
        let stderr = child
            .stderr
            .take()
            .map(|err| tokio::spawn(self.pump(err)));
        let stdin = child
            .stdin
            .take()
            .map(|input| tokio::spawn(feed_stdin(input, stdin_rx)));

        // A dropped kill sender (manager gone) counts as a kill request.
        let (status, killed) = tokio::select! {
            status = child.wait() => (status, false),
            _ = kill_rx => {
                if let Err(e) = child.start_kill() {
                    tracing::debug!("Kill of block {} failed: {}", self.block_id, e);
                }
                (child.wait().await, true)
            }
        };

        if let Some(task) = stdin {
            task.abort();
        }
        for task in [stdout, stderr].into_iter().flatten() {
            if killed {
                task.abort();
            } else {
                let _ = task.await;
            }
        }

        let exit_code = match status.map_err(ProcessError::Wait) {
            Ok(status) => status.code().unwrap_or(0),
            Err(e) => {
                tracing::error!("Block {}: {}", self.block_id, e);
                self.send_output(format!("\r\nError: {}\r\n", e));
                FAILED_EXIT_CODE
            }
        };

        tracing::info!("Block {} exited with {}", self.block_id, exit_code);
        let _ = self.events.send(ExecutionEvent::Ended {
            block_id: self.block_id.clone(),
            generation: self.generation,
            exit_code,
        });
        let _ = done_tx.send(exit_code);
    }

    /// Future that forwards one pipe as output events until EOF.
    fn pump<R>(&self, mut reader: R) -> impl std::future::Future<Output = ()> + Send + 'static
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let block_id = self.block_id.clone();
        let generation = self.generation;
        let events = self.events.clone();
        let size = self.read_buffer_size;

        async move {
            let mut buf = vec![0u8; size];
            let mut pending = Vec::new();
            loop {
                match reader.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        let data = decode_chunk(&mut pending, &buf[..n]);
                        if data.is_empty() {
                            continue;
                        }
                        let event = ExecutionEvent::Output {
                            block_id: block_id.clone(),
                            generation,
                            data,
                        };
                        if events.send(event).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::debug!("Read from block {} failed: {}", block_id, e);
                        break;
                    }
                }
            }
            if !pending.is_empty() {
                let _ = events.send(ExecutionEvent::Output {
                    block_id,
                    generation,
                    data: String::from_utf8_lossy(&pending).to_string(),
                });
            }
        }
    }

    fn send_output(&self, data: String) {
        let _ = self.events.send(ExecutionEvent::Output {
            block_id: self.block_id.clone(),
            generation: self.generation,
            data,
        });
    }
}

async fn feed_stdin(mut stdin: ChildStdin, mut rx: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(data) = rx.recv().await {
        if stdin.write_all(&data).await.is_err() || stdin.flush().await.is_err() {
            break;
        }
    }
}

/// Decode as much of `pending + bytes` as is complete UTF-8, keeping a
/// trailing partial character for the next read.
fn decode_chunk(pending: &mut Vec<u8>, bytes: &[u8]) -> String {
    pending.extend_from_slice(bytes);
    match std::str::from_utf8(pending) {
        Ok(text) => {
            let out = text.to_string();
            pending.clear();
            out
        }
        Err(e) if e.error_len().is_none() => {
            let valid = e.valid_up_to();
            let out = String::from_utf8_lossy(&pending[..valid]).to_string();
            pending.drain(..valid);
            out
        }
        Err(_) => {
            let out = String::from_utf8_lossy(pending).to_string();
            pending.clear();
            out
        }
    }
}
