//! Ownership of the external browser process.
//!
//! A [`ProcessSupervisor`] owns at most one browser instance end-to-end:
//! it assembles the frozen launch arguments, spawns the process with its
//! diagnostic stream piped, blocks start callers until the endpoint
//! announcement line appears (or the process dies, or the startup timer
//! runs out), and tears the process tree down on [`stop`].
//!
//! The supervisor is shared: many conversions hold one supervisor and each
//! opens its own session against the announced endpoint. Only the
//! check-then-start sequence is a critical section; liveness checks and
//! endpoint reads are safe to call concurrently once started.
//!
//! Every launched process carries a supervisor-unique marker in its
//! environment. Teardown sweeps surviving processes by that marker, so a
//! crashed launch's orphaned children are found without ever touching
//! unrelated processes that share the executable name.
//!
//! [`stop`]: ProcessSupervisor::stop

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{Mutex, oneshot, watch};
use tracing::{debug, warn};
use url::Url;

use crate::chrome;
use crate::error::{Error, Result};
use crate::launch::{LaunchArguments, PROCESS_MARKER_ENV, WindowSize};
use crate::timer::CountdownTimer;

/// Prefix of the diagnostic line announcing the debugging endpoint.
pub const ENDPOINT_LINE_PREFIX: &str = "DevTools listening on ";

/// How long a graceful terminate may take before the hard kill.
const GRACEFUL_EXIT_WINDOW: Duration = Duration::from_secs(2);

static MARKER_SEQ: AtomicU64 = AtomicU64::new(0);

/// Extracts the endpoint URL from one diagnostic line, if it is the
/// announcement line.
pub fn parse_endpoint_line(line: &str) -> Option<Url> {
	let suffix = line.trim().strip_prefix(ENDPOINT_LINE_PREFIX)?;
	Url::parse(suffix.trim()).ok()
}

/// Configuration for the browser process. Write-once: the supervisor reads
/// it at launch and nothing can change the argument set afterwards.
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
	/// Explicit browser executable; discovery runs when unset.
	pub executable: Option<PathBuf>,
	/// Browser window size.
	pub window_size: WindowSize,
	/// Profile directory (`--user-data-dir`); must exist.
	pub user_data_dir: Option<PathBuf>,
	/// `--proxy-server` value.
	pub proxy_server: Option<String>,
	/// `--proxy-bypass-list` value.
	pub proxy_bypass_list: Option<String>,
	/// `--proxy-pac-url` value.
	pub proxy_pac_url: Option<String>,
	/// `--user-agent` value.
	pub user_agent: Option<String>,
	/// How long to wait for the endpoint announcement.
	pub startup_timeout: Duration,
}

impl Default for SupervisorOptions {
	fn default() -> Self {
		Self {
			executable: None,
			window_size: WindowSize::default(),
			user_data_dir: None,
			proxy_server: None,
			proxy_bypass_list: None,
			proxy_pac_url: None,
			user_agent: None,
			startup_timeout: Duration::from_secs(30),
		}
	}
}

/// What the diagnostic-line parser reports back to the launch sequence.
enum StartupSignal {
	/// The endpoint announcement, parsed.
	Endpoint(Url),
	/// The stream ended first; carries the captured diagnostic tail.
	Eof(String),
}

struct ProcessHandle {
	pid: u32,
	endpoint: Url,
	args: Vec<String>,
	/// Flips to true when the waiter task observes the process exit.
	exited: watch::Receiver<bool>,
	/// Hard-kill trigger consumed by the waiter task.
	kill_tx: Option<oneshot::Sender<()>>,
}

/// Owns one external browser process and its lifecycle.
pub struct ProcessSupervisor {
	options: SupervisorOptions,
	marker: String,
	state: Mutex<Option<ProcessHandle>>,
}

impl ProcessSupervisor {
	/// Creates a supervisor. Nothing is launched until
	/// [`start`](Self::start) or [`ensure_running`](Self::ensure_running).
	pub fn new(options: SupervisorOptions) -> Self {
		let marker = format!(
			"pj-{}-{}",
			std::process::id(),
			MARKER_SEQ.fetch_add(1, Ordering::SeqCst)
		);
		Self {
			options,
			marker,
			state: Mutex::new(None),
		}
	}

	/// The marker value stamped into every launched process's environment.
	pub fn marker(&self) -> &str {
		&self.marker
	}

	/// Launches the browser and waits for its endpoint announcement.
	///
	/// Safe to call concurrently: the running check and the launch are one
	/// critical section, so exactly one OS launch happens no matter how
	/// many callers race. A call while the process is already alive is a
	/// cheap no-op; a call after the process died relaunches.
	///
	/// # Errors
	///
	/// [`Error::ExecutableNotFound`] when no browser binary exists,
	/// [`Error::LaunchFailed`] when the process exits before announcing its
	/// endpoint or the startup timeout elapses.
	pub async fn start(&self) -> Result<()> {
		let mut state = self.state.lock().await;

		if let Some(handle) = state.as_ref() {
			if !*handle.exited.borrow() {
				return Ok(());
			}
			warn!(target: "pj", pid = handle.pid, "browser process died; relaunching");
			*state = None;
		}

		let handle = self.launch().await?;
		debug!(target: "pj", pid = handle.pid, endpoint = %handle.endpoint, "browser ready");
		*state = Some(handle);
		Ok(())
	}

	/// Idempotent convenience: starts the browser if it is not running.
	pub async fn ensure_running(&self) -> Result<()> {
		self.start().await
	}

	/// Whether the process is currently alive.
	///
	/// Backed by a waiter task blocked in the OS `wait` on the child, so
	/// an asynchronous death is reflected here promptly rather than a
	/// stale launch-time flag.
	pub async fn is_running(&self) -> bool {
		let state = self.state.lock().await;
		match state.as_ref() {
			Some(handle) => !*handle.exited.borrow(),
			None => false,
		}
	}

	/// The debugging endpoint announced at startup.
	///
	/// # Errors
	///
	/// [`Error::InvalidArgument`] when the browser was never started,
	/// [`Error::BrowserLost`] when it has died since.
	pub async fn endpoint(&self) -> Result<Url> {
		let state = self.state.lock().await;
		match state.as_ref() {
			Some(handle) if !*handle.exited.borrow() => Ok(handle.endpoint.clone()),
			Some(_) => Err(Error::BrowserLost),
			None => Err(Error::InvalidArgument("browser not started".to_string())),
		}
	}

	/// The argument list the running process was launched with.
	pub async fn arguments(&self) -> Option<Vec<String>> {
		self.state.lock().await.as_ref().map(|h| h.args.clone())
	}

	/// Process id of the running browser, if any.
	pub async fn pid(&self) -> Option<u32> {
		let state = self.state.lock().await;
		state
			.as_ref()
			.filter(|handle| !*handle.exited.borrow())
			.map(|handle| handle.pid)
	}

	/// Stops the browser: graceful terminate, bounded wait, hard kill,
	/// then a marker sweep for surviving children. Always clears the
	/// handle and tolerates a process that is already gone.
	pub async fn stop(&self) {
		let handle = self.state.lock().await.take();

		if let Some(mut handle) = handle {
			if !*handle.exited.borrow() {
				graceful_terminate(handle.pid);

				if wait_for_exit(&mut handle.exited, GRACEFUL_EXIT_WINDOW)
					.await
					.is_err()
				{
					debug!(target: "pj", pid = handle.pid, "graceful close timed out; killing");
					if let Some(kill) = handle.kill_tx.take() {
						let _ = kill.send(());
					}
					let _ = wait_for_exit(&mut handle.exited, Duration::from_secs(5)).await;
				}
			}
		}

		// Sweep regardless: a crashed or half-started launch can leave
		// marked children behind without a live handle.
		sweep_marked_processes(&self.marker).await;
	}

	fn build_arguments(&self) -> Result<LaunchArguments> {
		let mut args = LaunchArguments::headless(self.options.window_size)?;

		if let Some(dir) = &self.options.user_data_dir {
			args.set_user_data_dir(dir)?;
		}
		if let Some(proxy) = &self.options.proxy_server {
			args.set_value("--proxy-server", proxy);
		}
		if let Some(bypass) = &self.options.proxy_bypass_list {
			args.set_value("--proxy-bypass-list", bypass);
		}
		if let Some(pac) = &self.options.proxy_pac_url {
			args.set_value("--proxy-pac-url", pac);
		}
		if let Some(agent) = &self.options.user_agent {
			args.set_value("--user-agent", agent);
		}

		Ok(args)
	}

	async fn launch(&self) -> Result<ProcessHandle> {
		let executable = chrome::resolve_executable(self.options.executable.as_deref())?;
		let args = self.build_arguments()?.to_vec();

		let mut command = Command::new(&executable);
		command
			.args(&args)
			.env(PROCESS_MARKER_ENV, &self.marker)
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::piped());

		let mut child = command.spawn().map_err(|error| {
			Error::LaunchFailed(format!(
				"failed to spawn {}: {error}",
				executable.display()
			))
		})?;
		let pid = child.id().ok_or_else(|| {
			Error::LaunchFailed("process exited before it could be observed".to_string())
		})?;
		let stderr = child.stderr.take().ok_or_else(|| {
			Error::LaunchFailed("diagnostic stream unavailable".to_string())
		})?;

		debug!(target: "pj", pid, exe = %executable.display(), "browser process spawned");

		// Diagnostic-line parser: announces the endpoint once, keeps
		// draining so the pipe never backs up into the browser.
		let (signal_tx, signal_rx) = oneshot::channel::<StartupSignal>();
		tokio::spawn(async move {
			let mut signal_tx = Some(signal_tx);
			let mut tail: VecDeque<String> = VecDeque::new();
			let mut lines = BufReader::new(stderr).lines();
			loop {
				match lines.next_line().await {
					Ok(Some(line)) => {
						debug!(target: "pj::browser", "{line}");
						if let Some(endpoint) = parse_endpoint_line(&line) {
							if let Some(tx) = signal_tx.take() {
								let _ = tx.send(StartupSignal::Endpoint(endpoint));
							}
						} else if signal_tx.is_some() {
							tail.push_back(line);
							if tail.len() > 10 {
								tail.pop_front();
							}
						}
					}
					Ok(None) | Err(_) => {
						if let Some(tx) = signal_tx.take() {
							let tail = tail.into_iter().collect::<Vec<_>>().join("\n");
							let _ = tx.send(StartupSignal::Eof(tail));
						}
						return;
					}
				}
			}
		});

		// Exit observer: publishes process death on the watch channel and
		// doubles as the hard-kill executor. Dropping the handle's kill
		// trigger also lands here, so an abandoned handle cannot leak a
		// running process.
		let (exited_tx, exited_rx) = watch::channel(false);
		let (kill_tx, mut kill_rx) = oneshot::channel::<()>();
		tokio::spawn(async move {
			tokio::select! {
				status = child.wait() => match status {
					Ok(status) => debug!(target: "pj", pid, %status, "browser process exited"),
					Err(error) => warn!(target: "pj", pid, %error, "waiting on browser process failed"),
				},
				_ = &mut kill_rx => {
					if let Err(error) = child.start_kill() {
						debug!(target: "pj", pid, %error, "kill failed (process already gone)");
					}
					let _ = child.wait().await;
				}
			}
			let _ = exited_tx.send(true);
		});

		let timer = CountdownTimer::started(self.options.startup_timeout)?;
		tokio::select! {
			signal = signal_rx => match signal {
				Ok(StartupSignal::Endpoint(endpoint)) => Ok(ProcessHandle {
					pid,
					endpoint,
					args,
					exited: exited_rx,
					kill_tx: Some(kill_tx),
				}),
				Ok(StartupSignal::Eof(tail)) => {
					sweep_marked_processes(&self.marker).await;
					Err(Error::LaunchFailed(format!(
						"browser exited before announcing its endpoint: {tail}"
					)))
				}
				Err(_) => {
					let _ = kill_tx.send(());
					sweep_marked_processes(&self.marker).await;
					Err(Error::LaunchFailed(
						"diagnostic stream reader vanished".to_string(),
					))
				}
			},
			_ = timer.expired() => {
				let _ = kill_tx.send(());
				sweep_marked_processes(&self.marker).await;
				Err(Error::LaunchFailed(format!(
					"no endpoint announcement within {:?}",
					self.options.startup_timeout
				)))
			}
		}
	}
}

async fn wait_for_exit(
	exited: &mut watch::Receiver<bool>,
	window: Duration,
) -> std::result::Result<(), tokio::time::error::Elapsed> {
	tokio::time::timeout(window, async {
		while !*exited.borrow() {
			if exited.changed().await.is_err() {
				return;
			}
		}
	})
	.await
}

#[cfg(unix)]
fn graceful_terminate(pid: u32) {
	debug!(target: "pj", pid, "sending SIGTERM");
	if let Err(error) = std::process::Command::new("kill")
		.args(["-TERM", &pid.to_string()])
		.status()
	{
		debug!(target: "pj", pid, %error, "SIGTERM failed");
	}
}

#[cfg(windows)]
fn graceful_terminate(pid: u32) {
	debug!(target: "pj", pid, "requesting termination");
	if let Err(error) = std::process::Command::new("taskkill")
		.args(["/PID", &pid.to_string()])
		.status()
	{
		debug!(target: "pj", pid, %error, "taskkill failed");
	}
}

/// Kills every process whose environment carries `marker`.
///
/// Linux reads `/proc/<pid>/environ` directly; there is no portable OS API
/// for this, so other platforms rely on the direct child kill alone.
#[cfg(target_os = "linux")]
pub(crate) async fn sweep_marked_processes(marker: &str) {
	let needle = format!("{PROCESS_MARKER_ENV}={marker}");

	let pids = tokio::task::spawn_blocking(move || {
		let mut pids = Vec::new();
		let Ok(entries) = std::fs::read_dir("/proc") else {
			return pids;
		};
		for entry in entries.flatten() {
			let name = entry.file_name();
			let Some(pid) = name.to_str().and_then(|s| s.parse::<u32>().ok()) else {
				continue;
			};
			// Unreadable environs belong to other users; skip them.
			let Ok(environ) = std::fs::read(entry.path().join("environ")) else {
				continue;
			};
			if environ.split(|b| *b == 0).any(|var| var == needle.as_bytes()) {
				pids.push(pid);
			}
		}
		pids
	})
	.await
	.unwrap_or_default();

	for pid in pids {
		debug!(target: "pj", pid, "killing marked browser process");
		let _ = std::process::Command::new("kill")
			.args(["-9", &pid.to_string()])
			.status();
	}
}

#[cfg(not(target_os = "linux"))]
pub(crate) async fn sweep_marked_processes(_marker: &str) {}

#[cfg(test)]
mod tests {
	use std::path::Path;

	use super::*;

	#[test]
	fn parses_endpoint_announcement_line() {
		let line = "DevTools listening on ws://127.0.0.1:33225/devtools/browser/7ab3-11";
		let endpoint = parse_endpoint_line(line).unwrap();
		assert_eq!(endpoint.scheme(), "ws");
		assert_eq!(endpoint.port(), Some(33225));
		assert_eq!(endpoint.path(), "/devtools/browser/7ab3-11");

		assert!(parse_endpoint_line("[1108/123456:ERROR:gpu_init.cc] oops").is_none());
		assert!(parse_endpoint_line("").is_none());
		assert!(parse_endpoint_line("DevTools listening on not a url \u{0}").is_none());
	}

	#[test]
	fn markers_are_unique_per_supervisor() {
		let a = ProcessSupervisor::new(SupervisorOptions::default());
		let b = ProcessSupervisor::new(SupervisorOptions::default());
		assert_ne!(a.marker(), b.marker());
	}

	#[cfg(unix)]
	fn write_mock_browser(path: &Path, body: &str) {
		use std::os::unix::fs::PermissionsExt;

		let script = format!("#!/bin/sh\n{body}\n");
		std::fs::write(path, script).unwrap();
		let mut perms = std::fs::metadata(path).unwrap().permissions();
		perms.set_mode(0o755);
		std::fs::set_permissions(path, perms).unwrap();
	}

	#[cfg(unix)]
	fn supervisor_for(script: &Path) -> ProcessSupervisor {
		ProcessSupervisor::new(SupervisorOptions {
			executable: Some(script.to_path_buf()),
			startup_timeout: Duration::from_secs(5),
			..SupervisorOptions::default()
		})
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn start_blocks_until_endpoint_announcement() {
		let dir = tempfile::tempdir().unwrap();
		let script = dir.path().join("mock-browser");
		write_mock_browser(
			&script,
			"echo 'DevTools listening on ws://127.0.0.1:9222/devtools/browser/mock' >&2\nexec sleep 30",
		);

		let supervisor = supervisor_for(&script);
		supervisor.start().await.unwrap();

		assert!(supervisor.is_running().await);
		let endpoint = supervisor.endpoint().await.unwrap();
		assert_eq!(endpoint.path(), "/devtools/browser/mock");

		let args = supervisor.arguments().await.unwrap();
		assert!(args.contains(&"--headless".to_string()));
		assert!(args.contains(&"--remote-debugging-port=0".to_string()));

		supervisor.stop().await;
		assert!(!supervisor.is_running().await);
		assert!(matches!(
			supervisor.endpoint().await,
			Err(Error::InvalidArgument(_))
		));
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn premature_exit_fails_launch_with_diagnostics() {
		let dir = tempfile::tempdir().unwrap();
		let script = dir.path().join("mock-browser");
		write_mock_browser(&script, "echo 'cannot open display' >&2\nexit 3");

		let supervisor = supervisor_for(&script);
		let error = supervisor.start().await.unwrap_err();
		match error {
			Error::LaunchFailed(message) => {
				assert!(message.contains("cannot open display"), "{message}")
			}
			other => panic!("expected LaunchFailed, got {other:?}"),
		}
		assert!(!supervisor.is_running().await);
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn startup_timeout_fails_launch_and_kills_the_process() {
		let dir = tempfile::tempdir().unwrap();
		let script = dir.path().join("mock-browser");
		write_mock_browser(&script, "exec sleep 30");

		let supervisor = ProcessSupervisor::new(SupervisorOptions {
			executable: Some(script.clone()),
			startup_timeout: Duration::from_millis(200),
			..SupervisorOptions::default()
		});

		let before = std::time::Instant::now();
		let error = supervisor.start().await.unwrap_err();
		assert!(matches!(error, Error::LaunchFailed(_)));
		assert!(before.elapsed() < Duration::from_secs(3));
		assert!(!supervisor.is_running().await);
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn concurrent_ensure_running_launches_exactly_once() {
		let dir = tempfile::tempdir().unwrap();
		let log = dir.path().join("launches.log");
		let script = dir.path().join("mock-browser");
		write_mock_browser(
			&script,
			&format!(
				"echo launch >> {}\necho 'DevTools listening on ws://127.0.0.1:9222/devtools/browser/mock' >&2\nexec sleep 30",
				log.display()
			),
		);

		let supervisor = std::sync::Arc::new(supervisor_for(&script));

		let mut tasks = Vec::new();
		for _ in 0..8 {
			let supervisor = std::sync::Arc::clone(&supervisor);
			tasks.push(tokio::spawn(async move {
				supervisor.ensure_running().await
			}));
		}
		for task in tasks {
			task.await.unwrap().unwrap();
		}

		let launches = std::fs::read_to_string(&log).unwrap();
		assert_eq!(launches.lines().count(), 1, "expected a single OS launch");

		supervisor.stop().await;
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn start_relaunches_after_process_death() {
		let dir = tempfile::tempdir().unwrap();
		let log = dir.path().join("launches.log");
		let script = dir.path().join("mock-browser");
		write_mock_browser(
			&script,
			&format!(
				"echo launch >> {}\necho 'DevTools listening on ws://127.0.0.1:9222/devtools/browser/mock' >&2\nexit 0",
				log.display()
			),
		);

		let supervisor = supervisor_for(&script);
		supervisor.start().await.unwrap();

		// The mock exits right after announcing; wait for the exit to land.
		let deadline = std::time::Instant::now() + Duration::from_secs(5);
		while supervisor.is_running().await {
			assert!(std::time::Instant::now() < deadline, "mock never exited");
			tokio::time::sleep(Duration::from_millis(20)).await;
		}

		supervisor.start().await.unwrap();
		let launches = std::fs::read_to_string(&log).unwrap();
		assert_eq!(launches.lines().count(), 2);

		supervisor.stop().await;
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn stop_without_start_is_a_no_op() {
		let supervisor = ProcessSupervisor::new(SupervisorOptions::default());
		supervisor.stop().await;
		supervisor.stop().await;
		assert!(!supervisor.is_running().await);
	}

	#[cfg(target_os = "linux")]
	#[tokio::test]
	async fn marker_sweep_kills_tagged_processes() {
		let marker = format!("pj-sweep-test-{}", std::process::id());

		let mut child = std::process::Command::new("sleep")
			.arg("30")
			.env(PROCESS_MARKER_ENV, &marker)
			.spawn()
			.unwrap();

		sweep_marked_processes(&marker).await;

		// A killed child reports a signal, not an exit code.
		let status = child.wait().unwrap();
		assert!(!status.success());
		assert!(status.code().is_none(), "expected death by signal");
	}
}
