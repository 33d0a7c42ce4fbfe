use anyhow::Result;
use clap::Subcommand;

use super::EXIT_OK;
use crate::api::{GitLabClient, MergeRequestQuery};
use crate::config::Settings;
use crate::models::{MergeRequest, Pipeline};
use crate::output::{
    bright_green, bright_red, bright_yellow, cyan, dim, fetch_spinner, merge_requests_csv,
    merge_requests_table, pipelines_table, print_merge_request_details, resolve_format, to_json,
    OutputFormat,
};

#[derive(Subcommand)]
pub enum MergeRequestsCommand {
    /// List merge requests, globally or for the configured project.
    List {
        /// Filter by state.
        #[arg(long, default_value = "opened", value_parser = ["opened", "merged", "closed", "all"])]
        state: String,

        /// Search merge requests by title or description.
        #[arg(long)]
        search: Option<String>,

        /// Filter by author's username.
        #[arg(long)]
        author: Option<String>,

        /// Exclude draft merge requests.
        #[arg(long)]
        no_drafts: bool,

        /// Keep only MRs whose latest pipeline has this status
        /// (success, failed, running, pending, canceled, skipped).
        #[arg(long)]
        pipeline_status: Option<String>,

        /// Maximum number of merge requests to fetch.
        #[arg(long)]
        limit: Option<usize>,

        /// Trigger a new pipeline for each listed merge request.
        #[arg(long)]
        trigger_pipeline: bool,
    },

    /// Show details of a specific merge request.
    Show {
        /// Namespace-qualified project path, e.g. group/project.
        project_path: String,

        /// The merge request iid.
        mr_iid: u64,
    },

    /// List pipelines of a specific merge request.
    Pipelines {
        /// Namespace-qualified project path, e.g. group/project.
        project_path: String,

        /// The merge request iid.
        mr_iid: u64,
    },
}

pub async fn run(
    client: &GitLabClient,
    settings: &Settings,
    command: MergeRequestsCommand,
    format: Option<OutputFormat>,
) -> Result<u8> {
    match command {
        MergeRequestsCommand::List {
            state,
            search,
            author,
            no_drafts,
            pipeline_status,
            limit,
            trigger_pipeline,
        } => {
            let project = settings.project.clone();
            let spinner = fetch_spinner("Fetching merge requests...");
            let mrs = client
                .fetch_merge_requests(&MergeRequestQuery {
                    project_path: project.as_deref(),
                    state: &state,
                    search: search.as_deref(),
                    author_username: author.as_deref(),
                    exclude_drafts: no_drafts,
                    pipeline_status: pipeline_status.as_deref(),
                    limit,
                })
                .await?;
            spinner.finish_and_clear();

            if mrs.is_empty() {
                eprintln!("{}", bright_yellow("No merge requests found."));
                return Ok(EXIT_OK);
            }

            render_merge_requests(&mrs, format)?;
            eprintln!("\n{}", dim(format!("Total MRs: {}", mrs.len())));

            if trigger_pipeline {
                trigger_pipelines(client, &mrs).await?;
            }
            Ok(EXIT_OK)
        }

        MergeRequestsCommand::Show {
            project_path,
            mr_iid,
        } => {
            let Some(mr) = client.fetch_merge_request(&project_path, mr_iid).await? else {
                eprintln!(
                    "{}",
                    bright_red(format!(
                        "Merge request !{mr_iid} not found in {project_path}."
                    ))
                );
                return Ok(EXIT_OK);
            };

            match resolve_format(format, OutputFormat::Table, OutputFormat::Json) {
                OutputFormat::Json => println!("{}", to_json(&mr)?),
                _ => print_merge_request_details(&mr),
            }
            Ok(EXIT_OK)
        }

        MergeRequestsCommand::Pipelines {
            project_path,
            mr_iid,
        } => {
            let pipelines = client.fetch_mr_pipelines(&project_path, mr_iid).await?;
            if pipelines.is_empty() {
                eprintln!(
                    "{}",
                    bright_yellow(format!("No pipelines found for MR !{mr_iid}."))
                );
                return Ok(EXIT_OK);
            }

            render_pipelines(&pipelines, format)?;
            Ok(EXIT_OK)
        }
    }
}

/// Fire a fresh pipeline for each MR's current head. Per-MR failures are
/// reported inline and do not abort the loop.
async fn trigger_pipelines(client: &GitLabClient, mrs: &[MergeRequest]) -> Result<()> {
    eprintln!("\n{}", cyan("Triggering pipelines..."));

    for mr in mrs {
        let Some(project_id) = mr.project_id else {
            eprintln!(
                "{}",
                bright_yellow(format!("Skipping !{} - no project id available", mr.iid))
            );
            continue;
        };

        let Some(project) = client.fetch_project_by_id(project_id).await? else {
            eprintln!(
                "{}",
                bright_yellow(format!("Skipping !{} - could not fetch project info", mr.iid))
            );
            continue;
        };

        eprintln!(
            "{}",
            cyan(format!(
                "Triggering pipeline for !{} ({}:{})...",
                mr.iid, project.path_with_namespace, mr.source_branch
            ))
        );

        match client
            .trigger_mr_pipeline(&project.path_with_namespace, mr.iid)
            .await
        {
            Some(pipeline) => eprintln!(
                "  {} Pipeline #{} triggered successfully",
                bright_green("✓"),
                pipeline.id
            ),
            None => eprintln!("  {} Failed to trigger pipeline", bright_red("✗")),
        }
    }

    Ok(())
}

fn render_merge_requests(mrs: &[MergeRequest], format: Option<OutputFormat>) -> Result<()> {
    match resolve_format(format, OutputFormat::Table, OutputFormat::Csv) {
        OutputFormat::Json => println!("{}", to_json(&mrs)?),
        OutputFormat::Csv => print!("{}", merge_requests_csv(mrs)?),
        _ => println!("{}", merge_requests_table(mrs)),
    }
    Ok(())
}

fn render_pipelines(pipelines: &[Pipeline], format: Option<OutputFormat>) -> Result<()> {
    match resolve_format(format, OutputFormat::Table, OutputFormat::Csv) {
        OutputFormat::Json => println!("{}", to_json(&pipelines)?),
        OutputFormat::Csv => print!("{}", crate::output::pipelines_csv(pipelines)?),
        _ => println!("{}", pipelines_table(pipelines)),
    }
    Ok(())
}
