use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::model::Priority;

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskdesk",
    version,
    about = "Terminal client for a REST task tracker",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "taskdeskrc", global = true)]
    pub taskdeskrc: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List tasks, optionally narrowed by key:value filter terms
    /// (status, priority, owner, assigned, project, number, due.from, due.to).
    List {
        #[arg(value_name = "TERM")]
        terms: Vec<String>,
    },
    /// Show one task in detail.
    Show { id: i64 },
    /// Create a task.
    Add(TaskArgs),
    /// Change fields of an existing task.
    Modify {
        id: i64,
        #[command(flatten)]
        fields: TaskArgs,
    },
    /// Delete a task.
    Delete { id: i64 },
    /// Manage task statuses.
    #[command(subcommand)]
    Status(StatusCommand),
    /// Log in and store the session token.
    Login(CredentialArgs),
    /// Create an account and store the session token.
    Register(CredentialArgs),
    /// Forget the stored session.
    Logout,
}

#[derive(Subcommand, Debug, Clone)]
pub enum StatusCommand {
    List,
    Add { name: String },
    Rename { id: i64, name: String },
    Delete { id: i64 },
}

#[derive(Args, Debug, Clone, Default)]
pub struct TaskArgs {
    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Status id or name.
    #[arg(long)]
    pub status: Option<String>,

    #[arg(long, value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<Priority>()))]
    pub priority: Option<Priority>,

    #[arg(long)]
    pub owner: Option<String>,

    #[arg(long)]
    pub assigned: Option<String>,

    #[arg(long = "project")]
    pub project_name: Option<String>,

    #[arg(long = "number")]
    pub task_number: Option<String>,

    /// Due date: YYYY-MM-DD, today, tomorrow, +3d, RFC3339, ...
    #[arg(long)]
    pub due: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CredentialArgs {
    pub username: String,

    #[arg(long, env = "TASKDESK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Command, GlobalCli, StatusCommand};
    use crate::model::Priority;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = GlobalCli::parse_from([
            "taskdesk",
            "list",
            "owner:al",
            "-vv",
            "--rc",
            "color=off",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.rc_overrides.len(), 1);
        assert_eq!(cli.rc_overrides[0].key, "color");
        match cli.command {
            Some(Command::List { terms }) => assert_eq!(terms, vec!["owner:al"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_add_fields() {
        let cli = GlobalCli::parse_from([
            "taskdesk", "add", "--title", "Ship", "--status", "Open", "--priority", "HIGH",
            "--owner", "alice", "--project", "apollo", "--number", "AP-1", "--due", "+2d",
        ]);
        let Some(Command::Add(args)) = cli.command else {
            panic!("expected add");
        };
        assert_eq!(args.priority, Some(Priority::High));
        assert_eq!(args.project_name.as_deref(), Some("apollo"));
        assert_eq!(args.task_number.as_deref(), Some("AP-1"));
        assert_eq!(args.due.as_deref(), Some("+2d"));
    }

    #[test]
    fn parses_status_subcommands() {
        let cli = GlobalCli::parse_from(["taskdesk", "status", "rename", "3", "Done"]);
        match cli.command {
            Some(Command::Status(StatusCommand::Rename { id, name })) => {
                assert_eq!(id, 3);
                assert_eq!(name, "Done");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn missing_subcommand_is_allowed() {
        let cli = GlobalCli::parse_from(["taskdesk"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn rejects_unknown_priority() {
        assert!(
            GlobalCli::try_parse_from(["taskdesk", "add", "--priority", "urgent"]).is_err()
        );
    }
}
