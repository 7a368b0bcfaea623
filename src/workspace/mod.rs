//! Scoped temporary directories for pipeline runs.
//!
//! [`with_temporary_workspace`] creates a fresh directory, hands its path to the body
//! and removes the tree afterwards, whether the body returns, panics, or the process
//! receives SIGINT/SIGTERM while the body is running.
//!
//! Signals are handled by one process-wide watcher. Once installed, the handlers stay
//! for the life of the process, so the watcher keeps the default outcome of a signal:
//! it removes every workspace still open and exits with `128 + signo`, also when no
//! workspace is open at all.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tempfile::TempDir;
use tokio::task::JoinHandle;

use crate::result::WithError;
use crate::InsightError;

pub const DEFAULT_PREFIX: &str = "video-insights-";

/// Workspaces currently open in this process
static OPEN: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());

/// The signal watcher, respawned when the runtime that owned it has shut down
static WATCHER: Mutex<Option<JoinHandle<()>>> = Mutex::new(None);

fn open_workspaces() -> MutexGuard<'static, Vec<PathBuf>> {
    OPEN.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns one directory and its entry in the open-workspace list.
///
/// Dropping the guard (including during unwinding) deregisters the path and lets
/// `TempDir` remove the tree.
struct WorkspaceGuard {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl WorkspaceGuard {
    fn acquire(prefix: &str) -> WithError<Self> {
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir()
            .map_err(|e| InsightError::Workspace(format!("could not create temporary directory: {}", e)))?;

        ensure_watcher();
        let path = dir.path().to_path_buf();
        open_workspaces().push(path.clone());

        Ok(Self { dir: Some(dir), path })
    }

    fn path(&self) -> PathBuf {
        self.path.clone()
    }

    /// Normal-path release: deregister and remove the tree, logging failures.
    fn release(mut self) {
        deregister(&self.path);
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                tracing::warn!("Could not remove temporary directory {}: {}", self.path.display(), e);
            } else {
                tracing::debug!("Removed temporary directory {}", self.path.display());
            }
        }
    }
}

impl Drop for WorkspaceGuard {
    fn drop(&mut self) {
        deregister(&self.path);
    }
}

fn deregister(path: &Path) {
    open_workspaces().retain(|open| open != path);
}

/// Start the watcher unless one is already running.
///
/// The signal streams are registered here, synchronously, so a signal delivered
/// right after `acquire` returns is already observed.
fn ensure_watcher() {
    let mut watcher = WATCHER.lock().unwrap_or_else(PoisonError::into_inner);
    if matches!(watcher.as_ref(), Some(handle) if !handle.is_finished()) {
        return;
    }

    let signals = match TerminationSignals::register() {
        Ok(signals) => signals,
        Err(e) => {
            tracing::warn!("Signal handlers unavailable, workspaces are only removed on normal exit: {}", e);
            return;
        }
    };

    *watcher = Some(tokio::spawn(async move {
        let exit_code = signals.recv().await;
        let open = std::mem::take(&mut *open_workspaces());
        for path in &open {
            tracing::warn!("Termination signal received, removing {}", path.display());
            remove_tree(path).await;
        }
        std::process::exit(exit_code);
    }));
}

/// Run `body` inside a freshly created temporary directory.
///
/// The body's output is returned unchanged. Only creating the directory can fail;
/// removal problems are logged and never replace the body's outcome.
pub async fn with_temporary_workspace<T, F, Fut>(prefix: Option<&str>, body: F) -> WithError<T>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = T>,
{
    let guard = WorkspaceGuard::acquire(prefix.unwrap_or(DEFAULT_PREFIX))?;
    let path = guard.path();
    tracing::debug!("Created temporary directory {}", path.display());

    let output = body(path).await;

    guard.release();
    Ok(output)
}

async fn remove_tree(path: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(path).await {
        tracing::warn!("Could not remove temporary directory {}: {}", path.display(), e);
    }
}

#[cfg(unix)]
struct TerminationSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl TerminationSignals {
    fn register() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Wait for the next signal and return the shell exit code for it
    async fn recv(mut self) -> i32 {
        tokio::select! {
            _ = self.interrupt.recv() => 130,
            _ = self.terminate.recv() => 143,
        }
    }
}

#[cfg(windows)]
struct TerminationSignals {
    ctrl_c: tokio::signal::windows::CtrlC,
}

#[cfg(windows)]
impl TerminationSignals {
    fn register() -> std::io::Result<Self> {
        Ok(Self {
            ctrl_c: tokio::signal::windows::ctrl_c()?,
        })
    }

    async fn recv(mut self) -> i32 {
        self.ctrl_c.recv().await;
        130
    }
}

#[cfg(not(any(unix, windows)))]
struct TerminationSignals;

#[cfg(not(any(unix, windows)))]
impl TerminationSignals {
    fn register() -> std::io::Result<Self> {
        Err(std::io::ErrorKind::Unsupported.into())
    }

    async fn recv(self) -> i32 {
        130
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use std::panic::AssertUnwindSafe;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_directory_removed_after_normal_return() {
        let result = with_temporary_workspace(Some("ws-test-"), |dir| async move {
            assert!(dir.is_dir());
            tokio::fs::write(dir.join("note.txt"), "hello").await.unwrap();
            dir
        })
        .await
        .unwrap();

        assert!(!result.exists());
    }

    #[tokio::test]
    async fn test_body_output_propagates_unchanged() {
        let result: WithError<WithError<u8, String>> =
            with_temporary_workspace(None, |_| async { Err::<u8, _>("stage failed".to_string()) }).await;

        assert_eq!(result, Ok(Err("stage failed".to_string())));
    }

    #[tokio::test]
    async fn test_directory_removed_when_body_panics() {
        let seen: Arc<Mutex<Option<PathBuf>>> = Arc::new(Mutex::new(None));
        let recorder = Arc::clone(&seen);

        let outcome = AssertUnwindSafe(with_temporary_workspace(None, move |dir| async move {
            *recorder.lock().unwrap() = Some(dir);
            panic!("body failed");
        }))
        .catch_unwind()
        .await;

        assert!(outcome.is_err());
        let dir = seen.lock().unwrap().clone().expect("body ran");
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_concurrent_scopes_get_distinct_directories() {
        let (a, b) = tokio::join!(
            with_temporary_workspace(None, |dir| async move { dir }),
            with_temporary_workspace(None, |dir| async move { dir }),
        );
        assert_ne!(a.unwrap(), b.unwrap());
    }

    #[tokio::test]
    async fn test_released_scope_is_no_longer_tracked() {
        let dir = with_temporary_workspace(Some("ws-track-"), |dir| async move {
            assert!(open_workspaces().contains(&dir));
            dir
        })
        .await
        .unwrap();

        assert!(!open_workspaces().contains(&dir));
    }

    #[cfg(unix)]
    mod signals {
        use super::*;
        use std::process::Command;
        use std::time::Duration;

        const CHILD_MODE: &str = "VIDEO_INSIGHTS_WORKSPACE_CHILD";
        const MARKER: &str = "WORKSPACE=";

        /// Re-run one test of this binary in a child process with `mode` set
        fn run_child(test: &str, mode: &str) -> (Option<i32>, String) {
            let output = Command::new(std::env::current_exe().unwrap())
                .args([test, "--exact", "--nocapture", "--test-threads=1", "--format=terse"])
                .env(CHILD_MODE, mode)
                .output()
                .unwrap();
            (output.status.code(), String::from_utf8_lossy(&output.stdout).into_owned())
        }

        fn child_mode() -> Option<String> {
            std::env::var(CHILD_MODE).ok()
        }

        fn send_to_self(signal: &str) {
            let status = Command::new("kill")
                .args([signal, &std::process::id().to_string()])
                .status()
                .unwrap();
            assert!(status.success());
        }

        fn reported_workspace(stdout: &str) -> PathBuf {
            stdout
                .lines()
                .find_map(|line| line.strip_prefix(MARKER))
                .map(PathBuf::from)
                .unwrap_or_else(|| panic!("child did not report its workspace:\n{stdout}"))
        }

        #[tokio::test]
        async fn test_interrupt_after_scope_still_terminates() {
            if child_mode().as_deref() == Some("after-scope") {
                with_temporary_workspace(None, |_| async {}).await.unwrap();
                send_to_self("-INT");
                tokio::time::sleep(Duration::from_secs(5)).await;
                println!("SURVIVED");
                return;
            }

            let (code, stdout) = run_child(
                "workspace::tests::signals::test_interrupt_after_scope_still_terminates",
                "after-scope",
            );
            assert_eq!(code, Some(130), "stdout:\n{stdout}");
            assert!(!stdout.contains("SURVIVED"));
        }

        #[tokio::test]
        async fn test_interrupt_early_in_body_removes_workspace() {
            if child_mode().as_deref() == Some("early-interrupt") {
                with_temporary_workspace(None, |dir| async move {
                    println!("{}{}", MARKER, dir.display());
                    send_to_self("-INT");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                })
                .await
                .unwrap();
                println!("SURVIVED");
                return;
            }

            let (code, stdout) = run_child(
                "workspace::tests::signals::test_interrupt_early_in_body_removes_workspace",
                "early-interrupt",
            );
            assert_eq!(code, Some(130), "stdout:\n{stdout}");
            assert!(!reported_workspace(&stdout).exists());
        }

        #[tokio::test]
        async fn test_terminate_removes_every_open_workspace() {
            if child_mode().as_deref() == Some("terminate") {
                let first = with_temporary_workspace(None, |dir| async move {
                    println!("{}{}", MARKER, dir.display());
                    tokio::time::sleep(Duration::from_secs(5)).await;
                });
                let second = with_temporary_workspace(None, |dir| async move {
                    println!("{}{}", MARKER, dir.display());
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    send_to_self("-TERM");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                });
                let _ = tokio::join!(first, second);
                println!("SURVIVED");
                return;
            }

            let (code, stdout) = run_child(
                "workspace::tests::signals::test_terminate_removes_every_open_workspace",
                "terminate",
            );
            assert_eq!(code, Some(143), "stdout:\n{stdout}");

            let workspaces: Vec<PathBuf> = stdout
                .lines()
                .filter_map(|line| line.strip_prefix(MARKER))
                .map(PathBuf::from)
                .collect();
            assert_eq!(workspaces.len(), 2, "stdout:\n{stdout}");
            assert!(workspaces.iter().all(|dir| !dir.exists()));
        }
    }
}
