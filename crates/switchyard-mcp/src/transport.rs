//! Stdio transport for provider processes.
//!
//! Spawns a child process and exchanges newline-delimited JSON-RPC messages
//! over its stdin/stdout. Exchanges are strictly sequential: one request is
//! written, then exactly one response line is read, before the next request
//! may start.

use crate::error::McpError;
use crate::jsonrpc::{JsonRpcNotification, JsonRpcRequest, is_provider_initiated};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Upper bound on waiting for a killed child to be reaped.
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

struct Channel {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// Line-delimited JSON-RPC channel to one child process.
pub(crate) struct StdioTransport {
    provider: String,
    next_id: AtomicU64,
    channel: Mutex<Option<Channel>>,
    child: std::sync::Mutex<Option<Child>>,
    open: AtomicBool,
    timeout: Duration,
    pid: Option<u32>,
}

/// Marks the transport failed if an exchange is abandoned halfway.
///
/// Once a request line has gone out, the next line on stdout belongs to it.
/// If the exchange future is dropped before that line is consumed the channel
/// is out of step, so the child is killed and the transport closed.
struct InFlight<'a> {
    transport: &'a StdioTransport,
    armed: bool,
}

impl InFlight<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!(
                "Exchange with provider '{}' abandoned mid-flight; killing process",
                self.transport.provider
            );
            self.transport.open.store(false, Ordering::SeqCst);
            let mut child = self
                .transport
                .child
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(child) = child.as_mut() {
                let _ = child.start_kill();
            }
        }
    }
}

impl StdioTransport {
    /// Spawn a child process with piped stdin/stdout.
    pub fn spawn(
        provider: &str,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        timeout_ms: u64,
    ) -> Result<Self, McpError> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| McpError::Connect {
            provider: provider.to_string(),
            source,
        })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.start_kill();
            return Err(McpError::Connect {
                provider: provider.to_string(),
                source: std::io::Error::other("child stdio was not captured"),
            });
        };

        let pid = child.id();
        tracing::debug!("Spawned provider '{}' ({} {:?}, pid {:?})", provider, command, args, pid);

        Ok(Self {
            provider: provider.to_string(),
            next_id: AtomicU64::new(1),
            channel: Mutex::new(Some(Channel {
                stdin,
                stdout: BufReader::new(stdout),
            })),
            child: std::sync::Mutex::new(Some(child)),
            open: AtomicBool::new(true),
            timeout: Duration::from_millis(timeout_ms),
            pid,
        })
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    /// Send a request and return the next response message.
    ///
    /// Blank lines and provider-initiated messages are skipped. The response
    /// id is not checked. Any failure here closes the transport.
    pub async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
        cancel: Option<&CancellationToken>,
    ) -> Result<serde_json::Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let line = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;

        let mut guard = match cancel {
            Some(token) => tokio::select! {
                guard = self.channel.lock() => guard,
                _ = token.cancelled() => return Err(self.cancelled()),
            },
            None => self.channel.lock().await,
        };
        let channel = match guard.as_mut() {
            Some(channel) if self.is_open() => channel,
            _ => return Err(self.unavailable(method)),
        };

        tracing::debug!("-> {}: {}", self.provider, line);
        let mut in_flight = InFlight {
            transport: self,
            armed: true,
        };
        let exchange = async {
            self.write_line(&mut channel.stdin, &line).await?;
            self.read_response(&mut channel.stdout).await
        };
        let outcome = self.bounded(exchange, cancel).await;
        in_flight.disarm();

        match outcome {
            Ok(message) => Ok(message),
            Err(e) => {
                self.open.store(false, Ordering::SeqCst);
                guard.take();
                drop(guard);
                if let Err(close_err) = self.kill_and_reap().await {
                    tracing::warn!("Failed to stop provider '{}': {}", self.provider, close_err);
                }
                Err(e)
            }
        }
    }

    /// Send a notification; no response is read.
    pub async fn notify(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), McpError> {
        let line = serde_json::to_string(&JsonRpcNotification::new(method, params))?;
        let mut guard = self.channel.lock().await;
        let channel = match guard.as_mut() {
            Some(channel) if self.is_open() => channel,
            _ => return Err(self.unavailable(method)),
        };

        tracing::debug!("-> {}: {}", self.provider, line);
        let outcome = self
            .bounded(self.write_line(&mut channel.stdin, &line), None)
            .await;
        if outcome.is_err() {
            self.open.store(false, Ordering::SeqCst);
            guard.take();
            drop(guard);
            if let Err(close_err) = self.kill_and_reap().await {
                tracing::warn!("Failed to stop provider '{}': {}", self.provider, close_err);
            }
        }
        outcome
    }

    /// Close both stream halves, then kill and reap the child. Idempotent.
    pub async fn close(&self) -> Result<(), McpError> {
        self.open.store(false, Ordering::SeqCst);

        // With an exchange in progress the halves are held by it; killing the
        // child first makes that exchange fail and release them.
        let halves_closed = match self.channel.try_lock() {
            Ok(mut channel) => {
                channel.take();
                true
            }
            Err(_) => false,
        };

        let result = self.kill_and_reap().await;

        if !halves_closed {
            self.channel.lock().await.take();
        }
        result
    }

    async fn bounded<T>(
        &self,
        work: impl Future<Output = Result<T, McpError>>,
        cancel: Option<&CancellationToken>,
    ) -> Result<T, McpError> {
        let timed = async {
            tokio::time::timeout(self.timeout, work)
                .await
                .unwrap_or_else(|_| {
                    Err(McpError::Timeout {
                        provider: self.provider.clone(),
                        timeout_ms: self.timeout_ms(),
                    })
                })
        };
        match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(self.cancelled()),
                result = timed => result,
            },
            None => timed.await,
        }
    }

    async fn write_line(&self, stdin: &mut ChildStdin, line: &str) -> Result<(), McpError> {
        let io_err = |source| McpError::Io {
            provider: self.provider.clone(),
            source,
        };
        stdin.write_all(line.as_bytes()).await.map_err(io_err)?;
        stdin.write_all(b"\n").await.map_err(io_err)?;
        stdin.flush().await.map_err(io_err)
    }

    async fn read_response(
        &self,
        stdout: &mut BufReader<ChildStdout>,
    ) -> Result<serde_json::Value, McpError> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = stdout
                .read_until(b'\n', &mut buf)
                .await
                .map_err(|source| McpError::Io {
                    provider: self.provider.clone(),
                    source,
                })?;
            if read == 0 {
                return Err(self.protocol("provider closed its output stream"));
            }

            let line = buf.trim_ascii();
            if line.is_empty() {
                continue;
            }
            tracing::debug!("<- {}: {}", self.provider, String::from_utf8_lossy(line));

            // Bytes that are not UTF-8 fail here too
            let message: serde_json::Value = serde_json::from_slice(line)
                .map_err(|e| self.protocol(format!("invalid JSON line: {e}")))?;
            if is_provider_initiated(&message) {
                // Notifications and requests from the provider are not answered
                continue;
            }
            return Ok(message);
        }
    }

    async fn kill_and_reap(&self) -> Result<(), McpError> {
        let child = self
            .child
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut child) = child else {
            return Ok(());
        };

        if let Err(e) = child.start_kill() {
            tracing::debug!("Kill of provider '{}' reported: {}", self.provider, e);
        }
        match tokio::time::timeout(REAP_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!("Provider '{}' exited: {}", self.provider, status);
                Ok(())
            }
            Ok(Err(source)) => Err(McpError::Io {
                provider: self.provider.clone(),
                source,
            }),
            Err(_) => Err(McpError::Timeout {
                provider: self.provider.clone(),
                timeout_ms: REAP_TIMEOUT.as_millis() as u64,
            }),
        }
    }

    fn protocol(&self, reason: impl Into<String>) -> McpError {
        McpError::Protocol {
            provider: self.provider.clone(),
            reason: reason.into(),
        }
    }

    fn cancelled(&self) -> McpError {
        McpError::Cancelled {
            provider: self.provider.clone(),
        }
    }

    fn unavailable(&self, subject: &str) -> McpError {
        McpError::Unavailable {
            provider: self.provider.clone(),
            tool: subject.to_string(),
        }
    }
}
