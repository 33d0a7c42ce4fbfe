use anyhow::Result;
use clap::Subcommand;

use super::{require_project, EXIT_FAILURE, EXIT_OK};
use crate::api::{GitLabClient, PipelineQuery};
use crate::config::Settings;
use crate::models::{Job, Pipeline};
use crate::output::{
    bright_green, bright_red, bright_yellow, dim, fetch_spinner, jobs_csv, jobs_table,
    pipelines_csv, pipelines_table, print_pipeline_details, resolve_format, to_json, OutputFormat,
};

#[derive(Subcommand)]
pub enum PipelinesCommand {
    /// List pipelines for the project (--project / GITLAB_PROJECT).
    List {
        /// Filter by pipeline status.
        #[arg(long, value_parser = ["running", "pending", "success", "failed", "canceled", "skipped"])]
        status: Option<String>,

        /// Filter by trigger source, e.g. push or merge_request_event.
        #[arg(long)]
        source: Option<String>,

        /// Maximum number of pipelines to fetch.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show details of a specific pipeline.
    Show { pipeline_id: u64 },

    /// List jobs of a specific pipeline.
    Jobs { pipeline_id: u64 },

    /// Trigger a new pipeline on a branch or tag.
    Trigger {
        /// Branch or tag name.
        #[arg(value_name = "REF")]
        ref_: String,
    },
}

pub async fn run(
    client: &GitLabClient,
    settings: &Settings,
    command: PipelinesCommand,
    format: Option<OutputFormat>,
) -> Result<u8> {
    let project = require_project(settings)?;

    match command {
        PipelinesCommand::List {
            status,
            source,
            limit,
        } => {
            let spinner = fetch_spinner("Fetching pipelines...");
            let pipelines = client
                .fetch_pipelines(
                    project,
                    &PipelineQuery {
                        status: status.as_deref(),
                        source: source.as_deref(),
                        limit,
                        ..Default::default()
                    },
                )
                .await?;
            spinner.finish_and_clear();

            if pipelines.is_empty() {
                eprintln!("{}", bright_yellow("No pipelines found."));
                return Ok(EXIT_OK);
            }

            render_pipelines(&pipelines, format)?;
            eprintln!("\n{}", dim(format!("Total pipelines: {}", pipelines.len())));
            Ok(EXIT_OK)
        }

        PipelinesCommand::Show { pipeline_id } => {
            let Some(pipeline) = client.fetch_pipeline(project, pipeline_id).await? else {
                eprintln!(
                    "{}",
                    bright_red(format!("Pipeline #{pipeline_id} not found in {project}."))
                );
                return Ok(EXIT_OK);
            };

            match resolve_format(format, OutputFormat::Table, OutputFormat::Json) {
                OutputFormat::Json => println!("{}", to_json(&pipeline)?),
                _ => print_pipeline_details(&pipeline),
            }
            Ok(EXIT_OK)
        }

        PipelinesCommand::Jobs { pipeline_id } => {
            let jobs = client.fetch_pipeline_jobs(project, pipeline_id).await?;
            if jobs.is_empty() {
                eprintln!("{}", bright_yellow("No jobs found."));
                return Ok(EXIT_OK);
            }

            render_jobs(&jobs, format)?;
            eprintln!("\n{}", dim(format!("Total jobs: {}", jobs.len())));
            Ok(EXIT_OK)
        }

        PipelinesCommand::Trigger { ref_ } => {
            match client.trigger_pipeline(project, &ref_).await? {
                Some(pipeline) => {
                    eprintln!(
                        "{} Pipeline #{} triggered on {ref_}",
                        bright_green("✓"),
                        pipeline.id
                    );
                    match resolve_format(format, OutputFormat::Table, OutputFormat::Json) {
                        OutputFormat::Json => println!("{}", to_json(&pipeline)?),
                        _ => print_pipeline_details(&pipeline),
                    }
                    Ok(EXIT_OK)
                }
                None => {
                    eprintln!("{} Failed to trigger pipeline on {ref_}", bright_red("✗"));
                    Ok(EXIT_FAILURE)
                }
            }
        }
    }
}

fn render_pipelines(pipelines: &[Pipeline], format: Option<OutputFormat>) -> Result<()> {
    match resolve_format(format, OutputFormat::Table, OutputFormat::Csv) {
        OutputFormat::Json => println!("{}", to_json(&pipelines)?),
        OutputFormat::Csv => print!("{}", pipelines_csv(pipelines)?),
        _ => println!("{}", pipelines_table(pipelines)),
    }
    Ok(())
}

fn render_jobs(jobs: &[Job], format: Option<OutputFormat>) -> Result<()> {
    match resolve_format(format, OutputFormat::Table, OutputFormat::Csv) {
        OutputFormat::Json => println!("{}", to_json(&jobs)?),
        OutputFormat::Csv => print!("{}", jobs_csv(jobs)?),
        _ => println!("{}", jobs_table(jobs)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_setup(server: &mockito::Server) -> (GitLabClient, Settings) {
        let settings = Settings {
            base_url: server.url(),
            token: None,
            project: Some("team/api".to_string()),
            debug: false,
        };
        let client = GitLabClient::new(&settings).unwrap();
        (client, settings)
    }

    // A trigger that does not produce a pipeline is a hard failure and must
    // exit nonzero...
    #[tokio::test]
    async fn failed_trigger_exits_nonzero() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v4/projects/team%2Fapi/pipeline")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;

        let (client, settings) = test_setup(&server);
        let code = run(
            &client,
            &settings,
            PipelinesCommand::Trigger {
                ref_: "main".to_string(),
            },
            Some(OutputFormat::Json),
        )
        .await
        .unwrap();

        assert_eq!(code, EXIT_FAILURE);
    }

    // ...while a missing resource on a lookup is a soft failure: a message
    // and exit 0.
    #[tokio::test]
    async fn missing_pipeline_lookup_exits_zero() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v4/projects/team%2Fapi/pipelines/99")
            .with_status(404)
            .with_body(r#"{"message": "404 Not found"}"#)
            .create_async()
            .await;

        let (client, settings) = test_setup(&server);
        let code = run(
            &client,
            &settings,
            PipelinesCommand::Show { pipeline_id: 99 },
            Some(OutputFormat::Json),
        )
        .await
        .unwrap();

        assert_eq!(code, EXIT_OK);
    }
}
