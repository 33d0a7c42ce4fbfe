use anyhow::Result;
use clap::Subcommand;

use super::EXIT_OK;
use crate::api::GitLabClient;
use crate::models::Project;
use crate::output::{
    bright_red, bright_yellow, dim, print_project_details, projects_csv, projects_table,
    resolve_format, to_json, OutputFormat,
};

#[derive(Subcommand)]
pub enum ProjectsCommand {
    /// List projects, globally or inside a group.
    List {
        /// Filter projects by group path.
        #[arg(long)]
        group: Option<String>,

        /// Search projects by name.
        #[arg(long)]
        search: Option<String>,

        /// Maximum number of projects to fetch.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show details of a specific project.
    Show {
        /// Namespace-qualified project path, e.g. group/project.
        project_path: String,
    },
}

pub async fn run(
    client: &GitLabClient,
    command: ProjectsCommand,
    format: Option<OutputFormat>,
) -> Result<u8> {
    match command {
        ProjectsCommand::List {
            group,
            search,
            limit,
        } => {
            let projects = client
                .fetch_projects(group.as_deref(), search.as_deref(), limit)
                .await?;
            if projects.is_empty() {
                eprintln!("{}", bright_yellow("No projects found."));
                return Ok(EXIT_OK);
            }

            render_projects(&projects, format)?;
            eprintln!("\n{}", dim(format!("Total projects: {}", projects.len())));
            Ok(EXIT_OK)
        }

        ProjectsCommand::Show { project_path } => {
            let Some(project) = client.fetch_project(&project_path).await? else {
                eprintln!(
                    "{}",
                    bright_red(format!("Project '{project_path}' not found."))
                );
                return Ok(EXIT_OK);
            };

            match resolve_format(format, OutputFormat::Table, OutputFormat::Json) {
                OutputFormat::Json => println!("{}", to_json(&project)?),
                _ => print_project_details(&project),
            }
            Ok(EXIT_OK)
        }
    }
}

fn render_projects(projects: &[Project], format: Option<OutputFormat>) -> Result<()> {
    match resolve_format(format, OutputFormat::Table, OutputFormat::Csv) {
        OutputFormat::Json => println!("{}", to_json(&projects)?),
        OutputFormat::Csv => print!("{}", projects_csv(projects)?),
        _ => println!("{}", projects_table(projects)),
    }
    Ok(())
}
