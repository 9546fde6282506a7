//! Command line definition.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use opencode_ctl_core::ControllerConfig;

/// Start, supervise and drive a local opencode server.
#[derive(Debug, Parser)]
#[command(name = "opencode-ctl", version, about)]
pub struct Cli {
    /// YAML configuration file
    #[arg(long, global = true, env = "OPENCODE_CTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Server host (overrides the config file)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Server port (overrides the config file)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Working directory for the server (overrides the config file)
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,

    /// Never start a server; fail if none is running
    #[arg(long, global = true)]
    pub no_auto_start: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Check whether the server is healthy (never starts it)
    Health,

    /// Start the server and leave it running
    Serve,

    /// List sessions
    Sessions,

    /// Show one session
    Session {
        /// Session ID
        id: String,
    },

    /// Create a session
    Create {
        /// Session title
        #[arg(long)]
        title: Option<String>,

        /// Parent session ID
        #[arg(long)]
        parent: Option<String>,
    },

    /// Delete a session
    Delete {
        /// Session ID
        id: String,
    },

    /// Show session status, for one session or all of them
    Status {
        /// Session ID
        id: Option<String>,
    },

    /// Send a message to a session
    Send {
        /// Session ID
        id: String,

        /// Message text
        text: String,

        /// Agent handling the message
        #[arg(long)]
        agent: Option<String>,

        /// Model as provider/model
        #[arg(long)]
        model: Option<String>,

        /// Record the message without asking for a reply
        #[arg(long)]
        no_reply: bool,

        /// Queue the message and return immediately
        #[arg(long = "async")]
        async_send: bool,
    },

    /// List recent messages of a session
    Messages {
        /// Session ID
        id: String,

        /// Maximum number of messages
        #[arg(long, default_value_t = opencode_ctl_session::DEFAULT_MESSAGE_LIMIT)]
        limit: usize,
    },

    /// Show file changes made in a session
    Diff {
        /// Session ID
        id: String,

        /// Restrict to one message
        #[arg(long)]
        message: Option<String>,
    },

    /// Wait for a session to go idle and print the last reply
    Wait {
        /// Session ID
        id: String,

        /// Timeout in seconds (config default when omitted)
        #[arg(long)]
        timeout: Option<u64>,

        /// Poll interval in milliseconds (config default when omitted)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Abort a running session
    Abort {
        /// Session ID
        id: String,
    },

    /// Share a session
    Share {
        /// Session ID
        id: String,
    },

    /// Run a prompt in a new session and print the reply
    Run {
        /// Prompt text
        text: String,

        /// Agent handling the prompt
        #[arg(long)]
        agent: Option<String>,

        /// Model as provider/model
        #[arg(long)]
        model: Option<String>,

        /// Timeout in seconds (config default when omitted)
        #[arg(long)]
        timeout: Option<u64>,

        /// Leave a server started for this task running
        #[arg(long)]
        keep: bool,
    },
}

impl Cli {
    /// Load the config file, if any, and apply command line overrides.
    pub fn load_config(&self) -> anyhow::Result<ControllerConfig> {
        let mut config = match &self.config {
            Some(path) => ControllerConfig::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => ControllerConfig::default(),
        };

        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(dir) = &self.dir {
            config.server.working_dir = dir.clone();
        }
        if self.no_auto_start {
            config.server.auto_start = false;
        }
        if let Command::Run { keep: true, .. } = self.command {
            config.server.keep_alive = true;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}
