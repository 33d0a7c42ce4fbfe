use anyhow::Result;
use clap::{Parser, Subcommand};
use log::debug;

use crate::api::GitLabClient;
use crate::commands::{groups, merge_requests, pipelines, projects, schedules};
use crate::config::Settings;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "labkit")]
#[command(
    author,
    version,
    about = "A CLI toolkit for GitLab groups, projects, merge requests, and CI/CD pipelines",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// GitLab instance URL (defaults to https://gitlab.com).
    #[arg(long, global = true, env = "GITLAB_URL")]
    gitlab_url: Option<String>,

    /// Personal access token.
    #[arg(long, global = true, env = "GITLAB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Default project path for project-scoped commands.
    #[arg(short = 'P', long, global = true, env = "GITLAB_PROJECT")]
    project: Option<String>,

    /// Verbose request/response tracing on stderr.
    #[arg(long, global = true)]
    debug: bool,

    /// Output format; defaults depend on whether stdout is a terminal.
    #[arg(short = 'o', long, global = true, value_enum)]
    output: Option<OutputFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage GitLab groups and members.
    #[command(visible_alias = "g")]
    Groups {
        #[command(subcommand)]
        command: groups::GroupsCommand,
    },

    /// Manage GitLab projects.
    #[command(visible_alias = "proj")]
    Projects {
        #[command(subcommand)]
        command: projects::ProjectsCommand,
    },

    /// Manage GitLab merge requests.
    #[command(name = "mergerequests", visible_alias = "mr")]
    MergeRequests {
        #[command(subcommand)]
        command: merge_requests::MergeRequestsCommand,
    },

    /// Manage GitLab CI/CD pipelines.
    #[command(visible_alias = "p")]
    Pipelines {
        #[command(subcommand)]
        command: pipelines::PipelinesCommand,
    },

    /// Manage GitLab CI/CD pipeline schedules.
    #[command(name = "pipeline-schedules", visible_alias = "ps")]
    Schedules {
        #[command(subcommand)]
        command: schedules::SchedulesCommand,
    },
}

impl Cli {
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Resolve settings once, build the client, and dispatch. Returns the
    /// process exit code; hard errors bubble up for the caller to report.
    pub async fn execute(self) -> Result<u8> {
        let Cli {
            command,
            gitlab_url,
            token,
            project,
            debug: debug_flag,
            output,
        } = self;

        let settings = Settings::resolve(gitlab_url, token, project, debug_flag);
        debug!("Using GitLab instance {}", settings.base_url);

        let client = GitLabClient::new(&settings)?;

        match command {
            Commands::Groups { command } => groups::run(&client, command, output).await,
            Commands::Projects { command } => projects::run(&client, command, output).await,
            Commands::MergeRequests { command } => {
                merge_requests::run(&client, &settings, command, output).await
            }
            Commands::Pipelines { command } => {
                pipelines::run(&client, &settings, command, output).await
            }
            Commands::Schedules { command } => {
                schedules::run(&client, &settings, command, output).await
            }
        }
    }
}
