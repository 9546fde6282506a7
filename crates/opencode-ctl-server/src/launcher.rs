//! Launching the server process.
//!
//! [`ServerLauncher`] is the seam between the supervisor and the operating
//! system: it resolves the executable and starts it. [`ShellLauncher`] is the
//! production implementation.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use opencode_ctl_core::{Error, Platform, Result};

/// Everything needed to launch one server process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Resolved path of the executable
    pub program: PathBuf,
    /// Arguments after the program
    pub args: Vec<String>,
    /// Working directory of the server
    pub working_dir: PathBuf,
    /// File receiving stdout and stderr
    pub log_file: Option<PathBuf>,
}

impl LaunchSpec {
    /// Spec for `serve --port P --hostname H`.
    pub fn serve(program: PathBuf, host: &str, port: u16, working_dir: PathBuf) -> Self {
        Self {
            program,
            args: vec![
                "serve".to_string(),
                "--port".to_string(),
                port.to_string(),
                "--hostname".to_string(),
                host.to_string(),
            ],
            working_dir,
            log_file: None,
        }
    }

    /// Redirect server output to a file.
    pub fn with_log_file(mut self, log_file: Option<PathBuf>) -> Self {
        self.log_file = log_file;
        self
    }
}

/// Handle to a launched server process.
pub trait ServerProcess: Send {
    /// Process ID.
    fn pid(&self) -> u32;

    /// Exit status description if the process has exited, `None` if running.
    fn exit_status(&mut self) -> Result<Option<String>>;

    /// Whether the process is still running.
    fn is_alive(&mut self) -> bool {
        matches!(self.exit_status(), Ok(None))
    }

    /// Stop the process, forcibly once `grace` has passed.
    fn terminate(&mut self, grace: Duration) -> Result<()>;
}

/// Starts server processes.
pub trait ServerLauncher: Send + Sync {
    /// Resolve the executable on the command search path.
    ///
    /// Fails with [`Error::ExecutableNotFound`] when it is missing.
    fn resolve(&self, executable: &str) -> Result<PathBuf>;

    /// Launch a detached server process.
    fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn ServerProcess>>;

    /// Launcher name for logging.
    fn name(&self) -> &'static str;
}

/// Launches the server through the platform command interpreter.
#[derive(Debug, Clone, Copy)]
pub struct ShellLauncher {
    platform: Platform,
}

impl ShellLauncher {
    /// Launcher for the current platform.
    pub fn new() -> Self {
        Self::for_platform(Platform::detect())
    }

    /// Launcher for a given platform.
    pub fn for_platform(platform: Platform) -> Self {
        Self { platform }
    }

    /// Build the interpreter command for a spec without spawning it.
    pub fn command(&self, spec: &LaunchSpec) -> Result<Command> {
        let program = spec.program.to_string_lossy();
        let line = self.platform.command_line(&program, &spec.args);
        let (shell, flag) = self.platform.interpreter();

        let mut cmd = Command::new(shell);
        cmd.arg(flag);
        Self::push_command_line(&mut cmd, &line);
        cmd.current_dir(&spec.working_dir).stdin(Stdio::null());

        match &spec.log_file {
            Some(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                let stderr = file.try_clone()?;
                cmd.stdout(Stdio::from(file)).stderr(Stdio::from(stderr));
            }
            None => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        Ok(cmd)
    }

    #[cfg(windows)]
    fn push_command_line(cmd: &mut Command, line: &str) {
        // cmd.exe does its own quote parsing; hand it the line untouched.
        use std::os::windows::process::CommandExt;
        cmd.raw_arg(line);
    }

    #[cfg(not(windows))]
    fn push_command_line(cmd: &mut Command, line: &str) {
        cmd.arg(line);
    }
}

impl Default for ShellLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerLauncher for ShellLauncher {
    fn resolve(&self, executable: &str) -> Result<PathBuf> {
        which::which(executable).map_err(|e| {
            debug!("Executable lookup for '{}' failed: {}", executable, e);
            Error::ExecutableNotFound(executable.to_string())
        })
    }

    fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn ServerProcess>> {
        info!(
            "Launching server: program={}, args={:?}, cwd={}, platform={}",
            spec.program.display(),
            spec.args,
            spec.working_dir.display(),
            self.platform
        );

        let child = self.command(spec)?.spawn().map_err(|e| {
            Error::Other(format!(
                "Failed to spawn {}: {e}",
                spec.program.display()
            ))
        })?;

        debug!("Server process spawned: pid={}", child.id());
        Ok(Box::new(ChildProcess::new(child)))
    }

    fn name(&self) -> &'static str {
        "shell"
    }
}

/// A server running as a child of this process.
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
}

impl ChildProcess {
    /// Wrap a spawned child.
    pub fn new(child: Child) -> Self {
        Self { child }
    }

    fn describe(status: ExitStatus) -> String {
        match status.code() {
            Some(code) => format!("exit code {code}"),
            None => status.to_string(),
        }
    }

    /// Ask the process to exit (SIGTERM).
    #[cfg(unix)]
    fn request_exit(&self) {
        unsafe {
            libc::kill(self.child.id() as i32, libc::SIGTERM);
        }
    }

    /// Kill the whole process tree; cmd.exe does not forward termination.
    #[cfg(windows)]
    fn request_exit(&self) {
        let result = Command::new("taskkill")
            .args(["/F", "/T", "/PID", &self.child.id().to_string()])
            .output();
        if let Err(e) = result {
            warn!("Failed to run taskkill: {}", e);
        }
    }

    #[cfg(not(any(unix, windows)))]
    fn request_exit(&self) {}
}

impl ServerProcess for ChildProcess {
    fn pid(&self) -> u32 {
        self.child.id()
    }

    fn exit_status(&mut self) -> Result<Option<String>> {
        Ok(self.child.try_wait()?.map(Self::describe))
    }

    fn terminate(&mut self, grace: Duration) -> Result<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }

        self.request_exit();

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if self.child.try_wait()?.is_some() {
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        warn!(
            "Server pid={} still running after {}ms, killing",
            self.child.id(),
            grace.as_millis()
        );
        self.child.kill()?;
        self.child.wait()?;
        Ok(())
    }
}
