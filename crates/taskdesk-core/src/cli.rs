use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use taskdesk_shared::{TaskId, TaskStatus, UserId};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::filter::{SortOption, StatusOption};

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
    about = "Terminal client for the task tracker API",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Override a config key, e.g. --set api.base_url=http://host:8000
    #[arg(
        long = "set",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub overrides: Vec<KeyVal>,

    #[arg(long = "rc-file", global = true)]
    pub rc_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone, Default)]
pub struct OrderArgs {
    /// newestCreate, oldestCreate, upcomingDeadline or latestDeadline
    #[arg(long)]
    pub sort: Option<SortOption>,

    /// all or a task status
    #[arg(long)]
    pub status: Option<StatusOption>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List every task visible to you
    List {
        #[command(flatten)]
        order: OrderArgs,
    },
    /// List tasks matching identity filters
    Filter {
        #[arg(long)]
        created_by_self: bool,
        #[arg(long)]
        assigned_to_self: bool,
        #[arg(long = "created-by")]
        created_by_user: Option<UserId>,
        #[arg(long = "assigned-to")]
        assigned_to_user: Option<UserId>,
        #[command(flatten)]
        order: OrderArgs,
    },
    /// Show comments on a task
    Comments { task_id: TaskId },
    /// Comment on a task
    Comment { task_id: TaskId, body: String },
    /// Search users by first or last name
    Users {
        #[arg(default_value = "")]
        query: String,
    },
    /// Create a task
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Local date and time, YYYY-MM-DDTHH:MM
        #[arg(long, default_value = "")]
        deadline: String,
        #[arg(long)]
        status: Option<TaskStatus>,
        /// Assign to the first user matching this search
        #[arg(long)]
        assignee_query: Option<String>,
        /// Print the title and description block before submitting
        #[arg(long)]
        copy: bool,
    },
    /// Edit fields of a task and save it
    Update {
        task_id: TaskId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        deadline: Option<String>,
        #[arg(long)]
        status: Option<TaskStatus>,
    },
    /// Delete a task you created or your report created
    Delete { task_id: TaskId },
    /// Show the signed-in user and their manager
    Whoami,
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
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
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

    use super::{Command, GlobalCli};
    use crate::filter::{SortOption, StatusOption};
    use taskdesk_shared::TaskStatus;

    #[test]
    fn parses_filter_with_order_and_overrides() {
        let cli = GlobalCli::try_parse_from([
            "taskdesk",
            "-vv",
            "--set",
            "api.base_url=http://host:9000",
            "filter",
            "--assigned-to-self",
            "--created-by",
            "4",
            "--sort",
            "latestDeadline",
            "--status",
            "pending",
        ])
        .expect("parse");

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.overrides[0].key, "api.base_url");
        assert_eq!(cli.overrides[0].value, "http://host:9000");
        match cli.command {
            Command::Filter {
                created_by_self,
                assigned_to_self,
                created_by_user,
                assigned_to_user,
                order,
            } => {
                assert!(!created_by_self);
                assert!(assigned_to_self);
                assert_eq!(created_by_user, Some(4));
                assert_eq!(assigned_to_user, None);
                assert_eq!(order.sort, Some(SortOption::LatestDeadline));
                assert_eq!(order.status, Some(StatusOption::Only(TaskStatus::Pending)));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn users_query_defaults_to_empty() {
        let cli = GlobalCli::try_parse_from(["taskdesk", "users"]).expect("parse");
        assert!(matches!(cli.command, Command::Users { query } if query.is_empty()));
    }

    #[test]
    fn malformed_override_is_rejected() {
        assert!(GlobalCli::try_parse_from(["taskdesk", "--set", "color", "whoami"]).is_err());
    }
}
