//! Server supervisor: probe, start, stop.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use opencode_ctl_core::{Error, Result, ServerSettings};

use crate::launcher::{LaunchSpec, ServerLauncher, ServerProcess, ShellLauncher};
use crate::probe::HealthProbe;

/// Supervises the opencode server at the configured host and port.
///
/// The supervisor only ever terminates a process it launched itself. A
/// server found already running (started by someone else, or by a
/// concurrent controller racing for the same port) is used as-is.
pub struct ServerSupervisor {
    settings: ServerSettings,
    probe: HealthProbe,
    launcher: Box<dyn ServerLauncher>,
    process: Mutex<Option<Box<dyn ServerProcess>>>,
}

impl std::fmt::Debug for ServerSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSupervisor")
            .field("base_url", &self.settings.base_url())
            .field("launcher", &self.launcher.name())
            .field("pid", &self.pid())
            .finish_non_exhaustive()
    }
}

impl ServerSupervisor {
    /// Create a supervisor that launches through the platform shell.
    pub fn new(settings: ServerSettings) -> Self {
        Self::with_launcher(settings, Box::new(ShellLauncher::new()))
    }

    /// Create a supervisor with a custom launcher.
    pub fn with_launcher(settings: ServerSettings, launcher: Box<dyn ServerLauncher>) -> Self {
        let probe = HealthProbe::new(&settings.base_url(), settings.probe_timeout());
        Self {
            settings,
            probe,
            launcher,
            process: Mutex::new(None),
        }
    }

    /// Server settings in use.
    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    /// Base URL of the supervised server.
    pub fn base_url(&self) -> String {
        self.settings.base_url()
    }

    /// Check whether the server answers its health endpoint.
    pub fn probe(&self) -> bool {
        self.probe.check()
    }

    /// Start the server unless it is already healthy.
    ///
    /// Launches `<executable> serve --port P --hostname H` through the
    /// command interpreter and polls the health probe until it succeeds or
    /// the startup window passes. The server is left running on success.
    pub fn start(&self) -> Result<()> {
        if self.probe() {
            info!("Server already running at {}", self.base_url());
            return Ok(());
        }
        self.launch_and_wait()
    }

    /// Probe, and start the server if it is down.
    ///
    /// Returns true if a server was launched.
    pub fn ensure_running(&self) -> Result<bool> {
        if self.probe() {
            return Ok(false);
        }
        debug!("Server at {} unreachable, starting it", self.base_url());
        self.launch_and_wait()?;
        Ok(true)
    }

    /// Stop the server if this supervisor launched it and it is still alive.
    ///
    /// Returns true if a process was terminated.
    pub fn stop(&self) -> bool {
        let Some(mut process) = self.lock_process().take() else {
            return false;
        };
        if !process.is_alive() {
            debug!("Owned server pid={} already exited", process.pid());
            return false;
        }

        let pid = process.pid();
        info!("Stopping server pid={}", pid);
        if let Err(e) = process.terminate(self.settings.shutdown_grace()) {
            warn!("Failed to terminate server pid={}: {}", pid, e);
        }
        true
    }

    /// Give up ownership of the launched process so it outlives the supervisor.
    ///
    /// Returns the PID of the released process.
    pub fn detach(&self) -> Option<u32> {
        let process = self.lock_process().take()?;
        let pid = process.pid();
        info!("Detached server pid={}", pid);
        Some(pid)
    }

    /// PID of the launched process, if one is owned.
    pub fn pid(&self) -> Option<u32> {
        self.lock_process().as_ref().map(|process| process.pid())
    }

    /// Whether this supervisor owns a launched process.
    pub fn owns_process(&self) -> bool {
        self.lock_process().is_some()
    }

    fn lock_process(&self) -> MutexGuard<'_, Option<Box<dyn ServerProcess>>> {
        // A panic while holding the lock cannot leave the Option half-written.
        self.process
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn launch_and_wait(&self) -> Result<()> {
        let program = self.launcher.resolve(&self.settings.executable)?;

        std::fs::create_dir_all(&self.settings.working_dir)?;
        let spec = LaunchSpec::serve(
            program,
            &self.settings.host,
            self.settings.port,
            self.settings.working_dir.clone(),
        )
        .with_log_file(self.settings.log_file.clone());

        {
            let mut slot = self.lock_process();
            if let Some(mut stale) = slot.take() {
                if stale.is_alive() {
                    warn!(
                        "Owned server pid={} is unhealthy, replacing it",
                        stale.pid()
                    );
                    if let Err(e) = stale.terminate(self.settings.shutdown_grace()) {
                        warn!("Failed to terminate server pid={}: {}", stale.pid(), e);
                    }
                }
            }
            *slot = Some(self.launcher.launch(&spec)?);
        }

        info!(
            "Starting server on {}:{}...",
            self.settings.host, self.settings.port
        );
        self.wait_until_healthy()
    }

    fn wait_until_healthy(&self) -> Result<()> {
        let timeout = self.settings.startup_timeout();
        let interval = self.settings.probe_interval();
        let start = Instant::now();

        loop {
            if self.probe() {
                info!(
                    "Server started at {} after {}ms",
                    self.base_url(),
                    start.elapsed().as_millis()
                );
                return Ok(());
            }

            if let Some(status) = self.exited_process_status()? {
                return Err(Error::ServerExited(status));
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                warn!(
                    "Server at {} not healthy after {}s",
                    self.base_url(),
                    timeout.as_secs()
                );
                return Err(Error::StartupTimeout {
                    url: self.base_url(),
                    timeout_secs: self.settings.startup_timeout_secs,
                });
            }

            std::thread::sleep(interval.min(timeout - elapsed).max(Duration::from_millis(1)));
        }
    }

    /// Exit status of the owned process if it has died; the dead handle is dropped.
    fn exited_process_status(&self) -> Result<Option<String>> {
        let mut slot = self.lock_process();
        let status = match slot.as_mut() {
            Some(process) => process.exit_status()?,
            None => None,
        };
        if let Some(status) = &status {
            warn!("Server process exited during startup: {}", status);
            *slot = None;
        }
        Ok(status)
    }
}

impl Drop for ServerSupervisor {
    fn drop(&mut self) {
        if self.settings.keep_alive {
            if let Some(pid) = self.pid() {
                info!("Leaving server pid={} running", pid);
            }
            return;
        }
        self.stop();
    }
}
