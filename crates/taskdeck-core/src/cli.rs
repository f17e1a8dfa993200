use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use taskdeck_shared::{
    CategoryId, Priority, ProjectFilters, ProjectId, ProjectStatus, TaskFilters, TaskId,
    TaskStatus,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::theme::Theme;

pub const PASSWORD_ENV: &str = "TASKDECK_PASSWORD";

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
    name = "taskdeck",
    version,
    about = "Taskdeck: terminal client for the Taskdeck task and project backend",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Config file; defaults to $TASKDECK_CONFIG or the per-user config.
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Override a config key, e.g. --set api_base_url=http://localhost:8000/api
    #[arg(
        long = "set",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub overrides: Vec<KeyVal>,

    /// Account to sign in with; the password is read from $TASKDECK_PASSWORD.
    #[arg(long = "email", global = true)]
    pub email: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show the signed-in user.
    Whoami,
    /// Project and task totals.
    Dashboard,
    Categories {
        #[command(subcommand)]
        command: CategoryCommand,
    },
    Projects {
        #[command(subcommand)]
        command: ProjectCommand,
    },
    Tasks {
        #[command(subcommand)]
        command: TaskCommand,
    },
    /// Show or set the local colour theme preference.
    Theme { theme: Option<Theme> },
}

#[derive(Subcommand, Debug, Clone)]
pub enum CategoryCommand {
    List {
        /// Only active categories.
        #[arg(long)]
        active: bool,
    },
    Show {
        id: CategoryId,
    },
    /// Projects filed under one category.
    Projects {
        id: CategoryId,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ProjectCommand {
    List(ProjectListArgs),
    /// Tasks of one project.
    Tasks {
        id: ProjectId,
        #[command(flatten)]
        filters: TaskListArgs,
    },
    SetStatus {
        id: ProjectId,
        #[arg(value_parser = parse_project_status)]
        status: ProjectStatus,
    },
    SetPriority {
        id: ProjectId,
        priority: Priority,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ProjectListArgs {
    #[arg(long, value_parser = parse_project_status)]
    pub status: Option<ProjectStatus>,
    #[arg(long)]
    pub priority: Option<Priority>,
    #[arg(long)]
    pub category: Option<CategoryId>,
    #[arg(long)]
    pub search: Option<String>,
}

impl ProjectListArgs {
    pub fn to_filters(&self) -> ProjectFilters {
        ProjectFilters {
            status: self.status,
            priority: self.priority,
            category: self.category,
            search: self.search.clone(),
            ..ProjectFilters::default()
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum TaskCommand {
    List(TaskListArgs),
    /// Mark a task completed, or reopen it if it already is.
    Toggle { id: TaskId },
    SetStatus {
        id: TaskId,
        status: TaskStatus,
    },
    SetPriority {
        id: TaskId,
        priority: Priority,
    },
    /// Set the completion percentage (0-100).
    Progress {
        id: TaskId,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: u8,
    },
    DueToday,
    Overdue,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TaskListArgs {
    #[arg(long)]
    pub project: Option<ProjectId>,
    #[arg(long)]
    pub status: Option<TaskStatus>,
    #[arg(long)]
    pub priority: Option<Priority>,
    #[arg(long)]
    pub search: Option<String>,
    #[arg(long)]
    pub overdue: bool,
    #[arg(long)]
    pub page: Option<u32>,
}

impl TaskListArgs {
    pub fn to_filters(&self) -> TaskFilters {
        TaskFilters {
            project: self.project,
            status: self.status,
            priority: self.priority,
            search: self.search.clone(),
            page: self.page,
            overdue: self.overdue,
            ..TaskFilters::default()
        }
    }
}

fn parse_project_status(s: &str) -> Result<ProjectStatus, String> {
    ProjectStatus::parse_lenient(s).map_err(|err| err.to_string())
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
    use super::*;

    fn parse(args: &[&str]) -> GlobalCli {
        GlobalCli::try_parse_from(args).expect("parse")
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let cli = parse(&[
            "taskdeck",
            "tasks",
            "list",
            "--status",
            "review",
            "-vv",
            "--set",
            "table_page_size = 20",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.overrides[0].key, "table_page_size");
        assert_eq!(cli.overrides[0].value, "20");
        match cli.command {
            Command::Tasks {
                command: TaskCommand::List(args),
            } => {
                let filters = args.to_filters();
                assert_eq!(filters.status, Some(TaskStatus::Review));
                assert_eq!(filters.to_query(), vec![("status", "review".to_string())]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn project_status_accepts_every_spelling() {
        for spelling in ["in progress", "in_progress", "active"] {
            let cli = parse(&["taskdeck", "projects", "list", "--status", spelling]);
            let Command::Projects {
                command: ProjectCommand::List(args),
            } = cli.command
            else {
                panic!("expected projects list");
            };
            assert_eq!(args.status, Some(ProjectStatus::InProgress));
        }
    }

    #[test]
    fn theme_takes_optional_value() {
        let cli = parse(&["taskdeck", "theme", "dark"]);
        assert!(matches!(
            cli.command,
            Command::Theme {
                theme: Some(Theme::Dark)
            }
        ));
        assert!(GlobalCli::try_parse_from(["taskdeck", "theme", "sepia"]).is_err());
    }

    #[test]
    fn progress_is_bounded() {
        let cli = parse(&["taskdeck", "tasks", "progress", "7", "100"]);
        assert!(matches!(
            cli.command,
            Command::Tasks {
                command: TaskCommand::Progress { id: 7, percent: 100 }
            }
        ));
        assert!(GlobalCli::try_parse_from(["taskdeck", "tasks", "progress", "7", "101"]).is_err());
    }

    #[test]
    fn bad_override_is_rejected() {
        assert!(GlobalCli::try_parse_from(["taskdeck", "--set", "nokey", "whoami"]).is_err());
    }
}
