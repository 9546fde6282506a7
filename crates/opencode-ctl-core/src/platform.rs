//! Command interpreter selection for launching the server.
//!
//! The server is installed through a package manager and ships as a shell
//! shim on some platforms, so it is launched through the platform's command
//! interpreter rather than exec'd directly.

/// Platform family, as far as launching a child through a shell goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Linux, macOS, WSL and other Unix-likes (`sh -c`)
    Unix,
    /// Native Windows (`cmd /C`)
    Windows,
}

impl Platform {
    /// Detect the current platform at compile time.
    ///
    /// # Examples
    ///
    /// ```
    /// use opencode_ctl_core::Platform;
    ///
    /// let platform = Platform::detect();
    /// println!("Running on: {}", platform);
    /// ```
    pub fn detect() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    /// Get the platform name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Unix => "unix",
            Platform::Windows => "windows",
        }
    }

    /// Command interpreter and the flag that makes it run one command line.
    pub fn interpreter(&self) -> (&'static str, &'static str) {
        match self {
            Platform::Unix => ("sh", "-c"),
            Platform::Windows => ("cmd", "/C"),
        }
    }

    /// Quote one argument for this platform's interpreter.
    ///
    /// Arguments made only of characters the shell leaves alone are returned
    /// unchanged.
    pub fn quote(&self, arg: &str) -> String {
        let plain = !arg.is_empty()
            && arg
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "-_./:=@,+\\".contains(c));
        if plain && !(matches!(self, Platform::Unix) && arg.contains('\\')) {
            return arg.to_string();
        }
        match self {
            Platform::Unix => format!("'{}'", arg.replace('\'', r"'\''")),
            Platform::Windows => format!("\"{}\"", arg.replace('"', "\"\"")),
        }
    }

    /// Full command line handed to the interpreter.
    ///
    /// On Unix the line starts with `exec` so the interpreter is replaced by
    /// the program and signals reach the server itself. On Windows the line
    /// is wrapped in an extra pair of quotes, which `cmd /C` strips.
    pub fn command_line(&self, program: &str, args: &[String]) -> String {
        let mut words = Vec::with_capacity(args.len() + 1);
        words.push(self.quote(program));
        words.extend(args.iter().map(|arg| self.quote(arg)));
        let line = words.join(" ");

        match self {
            Platform::Unix => format!("exec {line}"),
            Platform::Windows => format!("\"{line}\""),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
