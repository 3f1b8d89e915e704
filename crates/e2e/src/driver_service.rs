//! WebDriver service management - spawning and health checking chromedriver

use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::wait::{wait_until, WaitConfig};

/// How long a stopped service gets to exit after SIGTERM.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Handle to a running chromedriver process
pub struct DriverService {
    child: Option<Child>,
    url: String,
}

impl DriverService {
    /// Spawn chromedriver on a free local port and wait until it accepts sessions
    pub async fn spawn(binary: &Path, startup_timeout: Duration) -> E2eResult<Self> {
        let port = find_free_port()?;
        let url = format!("http://127.0.0.1:{}", port);

        info!("Spawning {} on port {}", binary.display(), port);

        let child = Command::new(binary)
            .arg(format!("--port={}", port))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                E2eError::DriverStartup(format!("Failed to spawn {}: {}", binary.display(), e))
            })?;

        let mut service = DriverService {
            child: Some(child),
            url,
        };

        if let Err(e) = wait_for_ready(&service.url, startup_timeout).await {
            service.stop().await;
            return Err(e);
        }

        info!("WebDriver service ready at {}", service.url);
        Ok(service)
    }

    /// Endpoint sessions should be created against
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stop the service, letting it exit on SIGTERM before killing it.
    /// Safe to call more than once.
    pub async fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        debug!("Stopping WebDriver service (pid: {})", child.id());

        // Try graceful shutdown first
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                let exited = wait_until(
                    WaitConfig::new(SHUTDOWN_GRACE, Duration::from_millis(20)),
                    "WebDriver service exit",
                    || {
                        // An error here means there is nothing left to wait for.
                        let done = child.try_wait().map_or(Some(()), |s| s.map(|_| ()));
                        async move { Ok(done) }
                    },
                )
                .await;
                if exited.is_ok() {
                    return;
                }
            }
        }

        force_kill(child);
    }
}

impl Drop for DriverService {
    fn drop(&mut self) {
        if let Some(child) = self.child.take() {
            force_kill(child);
        }
    }
}

fn force_kill(mut child: Child) {
    if let Err(e) = child.kill() {
        debug!("WebDriver service already exited: {}", e);
    }
    let _ = child.wait();
}

/// Poll a WebDriver endpoint's `/status` until it reports ready
pub async fn wait_for_ready(base_url: &str, timeout: Duration) -> E2eResult<()> {
    let status_url = format!("{}/status", base_url.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;

    let mut attempts = 0usize;
    let ready = wait_until(
        WaitConfig::new(timeout, Duration::from_millis(100)),
        "WebDriver service ready",
        || {
            attempts += 1;
            let first = attempts == 1;
            let request = client.get(&status_url).send();
            async move {
                match request.await {
                    Ok(resp) if resp.status().is_success() => Ok(Some(())),
                    Ok(resp) => {
                        warn!("WebDriver status returned {}", resp.status());
                        Ok(None)
                    }
                    Err(e) => {
                        if first {
                            info!("Waiting for WebDriver service to start...");
                        }
                        // Connection refused is expected while the service is starting
                        if !e.is_connect() {
                            warn!("WebDriver status error: {}", e);
                        }
                        Ok(None)
                    }
                }
            }
        },
    )
    .await;

    match ready {
        Err(E2eError::Timeout { .. }) => Err(E2eError::DriverHealthCheck(attempts)),
        other => other,
    }
}

/// Find a free port to use
fn find_free_port() -> E2eResult<u16> {
    use std::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
