use anyhow::{Context, Result};
use clap::Subcommand;
use serde_json::Value;
use std::io::Read;

use super::{require_project, EXIT_FAILURE, EXIT_OK};
use crate::api::GitLabClient;
use crate::config::Settings;
use crate::models::{Pipeline, PipelineSchedule};
use crate::output::{
    bright_green, bright_red, bright_yellow, dim, fetch_spinner, pipelines_csv, pipelines_table,
    print_pipeline_details, print_schedule_details, resolve_format, schedules_csv,
    schedules_table, to_json, OutputFormat,
};

#[derive(Subcommand)]
pub enum SchedulesCommand {
    /// List pipeline schedules for the project (--project / GITLAB_PROJECT).
    List {
        /// Filter by schedule state.
        #[arg(long, value_parser = ["active", "inactive"])]
        state: Option<String>,

        /// Maximum number of schedules to fetch.
        #[arg(long)]
        limit: Option<usize>,

        /// Fetch each schedule's most recent pipeline (slower).
        #[arg(long)]
        include_last_pipeline: bool,
    },

    /// Show details of a specific pipeline schedule.
    Show { schedule_id: u64 },

    /// List pipelines triggered by a specific schedule.
    Pipelines {
        schedule_id: u64,

        /// Maximum number of pipelines to fetch.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Trigger a schedule to run immediately.
    Trigger { schedule_id: u64 },

    /// Create a schedule from JSON on stdin; flags override JSON fields.
    Create {
        #[arg(long)]
        description: Option<String>,

        /// Git ref (branch or tag).
        #[arg(long, value_name = "REF")]
        r#ref: Option<String>,

        /// Cron expression, e.g. "0 2 * * *".
        #[arg(long)]
        cron: Option<String>,

        #[arg(long)]
        cron_timezone: Option<String>,

        #[arg(long, overrides_with = "inactive")]
        active: bool,

        #[arg(long)]
        inactive: bool,
    },

    /// Update a schedule from JSON on stdin; flags override JSON fields.
    Update {
        schedule_id: u64,

        #[arg(long)]
        description: Option<String>,

        /// Git ref (branch or tag).
        #[arg(long, value_name = "REF")]
        r#ref: Option<String>,

        /// Cron expression, e.g. "0 2 * * *".
        #[arg(long)]
        cron: Option<String>,

        #[arg(long)]
        cron_timezone: Option<String>,

        #[arg(long, overrides_with = "inactive")]
        active: bool,

        #[arg(long)]
        inactive: bool,
    },
}

pub async fn run(
    client: &GitLabClient,
    settings: &Settings,
    command: SchedulesCommand,
    format: Option<OutputFormat>,
) -> Result<u8> {
    let project = require_project(settings)?;

    match command {
        SchedulesCommand::List {
            state,
            limit,
            include_last_pipeline,
        } => {
            let spinner = fetch_spinner("Fetching pipeline schedules...");
            let mut schedules = client
                .fetch_schedules(project, state.as_deref(), limit, include_last_pipeline)
                .await?;
            spinner.finish_and_clear();

            if schedules.is_empty() {
                eprintln!("{}", bright_yellow("No pipeline schedules found."));
                return Ok(EXIT_OK);
            }

            schedules.sort_by_key(|s| s.description.to_lowercase());

            render_schedules(&schedules, format)?;
            eprintln!("\n{}", dim(format!("Total schedules: {}", schedules.len())));
            Ok(EXIT_OK)
        }

        SchedulesCommand::Show { schedule_id } => {
            let Some(schedule) = client.fetch_schedule(project, schedule_id).await? else {
                eprintln!(
                    "{}",
                    bright_red(format!(
                        "Pipeline schedule #{schedule_id} not found in {project}."
                    ))
                );
                return Ok(EXIT_OK);
            };

            match resolve_format(format, OutputFormat::Table, OutputFormat::Json) {
                OutputFormat::Json => println!("{}", to_json(&schedule)?),
                _ => print_schedule_details(&schedule),
            }
            Ok(EXIT_OK)
        }

        SchedulesCommand::Pipelines { schedule_id, limit } => {
            let pipelines = client
                .fetch_schedule_pipelines(project, schedule_id, limit)
                .await?;

            if pipelines.is_empty() {
                eprintln!(
                    "{}",
                    bright_yellow(format!("No pipelines found for schedule #{schedule_id}."))
                );
                return Ok(EXIT_OK);
            }

            render_schedule_pipelines(&pipelines, format)?;
            eprintln!("\n{}", dim(format!("Total pipelines: {}", pipelines.len())));
            Ok(EXIT_OK)
        }

        SchedulesCommand::Trigger { schedule_id } => {
            let Some(payload) = client.trigger_schedule(project, schedule_id).await else {
                eprintln!(
                    "{}",
                    bright_red(format!(
                        "✗ Failed to trigger pipeline schedule #{schedule_id}"
                    ))
                );
                return Ok(EXIT_FAILURE);
            };

            eprintln!(
                "{}",
                bright_green(format!(
                    "✓ Successfully triggered pipeline schedule #{schedule_id}"
                ))
            );

            // The platform may answer with the created pipeline or a bare
            // confirmation; render whichever arrived.
            match resolve_format(format, OutputFormat::Table, OutputFormat::Json) {
                OutputFormat::Json => println!("{}", to_json(&payload)?),
                _ => {
                    if let Ok(pipeline) = serde_json::from_value::<Pipeline>(payload) {
                        print_pipeline_details(&pipeline);
                    }
                }
            }
            Ok(EXIT_OK)
        }

        SchedulesCommand::Create {
            description,
            r#ref,
            cron,
            cron_timezone,
            active,
            inactive,
        } => {
            let mut payload = read_stdin_json()?;
            apply_overrides(
                &mut payload,
                description,
                r#ref,
                cron,
                cron_timezone,
                state_override(active, inactive),
            );

            match client.create_schedule(project, &payload).await {
                Some(schedule) => {
                    render_written_schedule(&schedule, format)?;
                    Ok(EXIT_OK)
                }
                None => {
                    eprintln!("{}", bright_red("✗ Failed to create pipeline schedule"));
                    Ok(EXIT_FAILURE)
                }
            }
        }

        SchedulesCommand::Update {
            schedule_id,
            description,
            r#ref,
            cron,
            cron_timezone,
            active,
            inactive,
        } => {
            let mut payload = read_stdin_json()?;
            apply_overrides(
                &mut payload,
                description,
                r#ref,
                cron,
                cron_timezone,
                state_override(active, inactive),
            );

            match client.update_schedule(project, schedule_id, &payload).await {
                Some(schedule) => {
                    render_written_schedule(&schedule, format)?;
                    Ok(EXIT_OK)
                }
                None => {
                    eprintln!(
                        "{}",
                        bright_red(format!(
                            "✗ Failed to update pipeline schedule #{schedule_id}"
                        ))
                    );
                    Ok(EXIT_FAILURE)
                }
            }
        }
    }
}

fn state_override(active: bool, inactive: bool) -> Option<bool> {
    if active {
        Some(true)
    } else if inactive {
        Some(false)
    } else {
        None
    }
}

fn read_stdin_json() -> Result<Value> {
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .context("Error reading stdin")?;

    let value: Value = serde_json::from_str(&buffer).context("Invalid JSON on stdin")?;
    anyhow::ensure!(value.is_object(), "JSON must be an object");
    Ok(value)
}

/// CLI flags take priority over fields in the JSON document.
fn apply_overrides(
    payload: &mut Value,
    description: Option<String>,
    ref_: Option<String>,
    cron: Option<String>,
    cron_timezone: Option<String>,
    active: Option<bool>,
) {
    let Some(fields) = payload.as_object_mut() else {
        return;
    };

    if let Some(description) = description {
        fields.insert("description".to_string(), description.into());
    }
    if let Some(ref_) = ref_ {
        fields.insert("ref".to_string(), ref_.into());
    }
    if let Some(cron) = cron {
        fields.insert("cron".to_string(), cron.into());
    }
    if let Some(cron_timezone) = cron_timezone {
        fields.insert("cron_timezone".to_string(), cron_timezone.into());
    }
    if let Some(active) = active {
        fields.insert("active".to_string(), active.into());
    }
}

fn render_schedules(schedules: &[PipelineSchedule], format: Option<OutputFormat>) -> Result<()> {
    match resolve_format(format, OutputFormat::Table, OutputFormat::Csv) {
        OutputFormat::Json => println!("{}", to_json(&schedules)?),
        OutputFormat::Csv => print!("{}", schedules_csv(schedules)?),
        _ => println!("{}", schedules_table(schedules)),
    }
    Ok(())
}

fn render_schedule_pipelines(pipelines: &[Pipeline], format: Option<OutputFormat>) -> Result<()> {
    match resolve_format(format, OutputFormat::Table, OutputFormat::Csv) {
        OutputFormat::Json => println!("{}", to_json(&pipelines)?),
        OutputFormat::Csv => print!("{}", pipelines_csv(pipelines)?),
        _ => println!("{}", pipelines_table(pipelines)),
    }
    Ok(())
}

fn render_written_schedule(
    schedule: &PipelineSchedule,
    format: Option<OutputFormat>,
) -> Result<()> {
    match resolve_format(format, OutputFormat::Table, OutputFormat::Json) {
        OutputFormat::Json => println!("{}", to_json(schedule)?),
        _ => print_schedule_details(schedule),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failed_schedule_trigger_exits_nonzero() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock(
                "POST",
                "/api/v4/projects/team%2Fapi/pipeline_schedules/11/play",
            )
            .with_status(403)
            .with_body(r#"{"message": "403 Forbidden"}"#)
            .create_async()
            .await;

        let settings = Settings {
            base_url: server.url(),
            token: None,
            project: Some("team/api".to_string()),
            debug: false,
        };
        let client = GitLabClient::new(&settings).unwrap();

        let code = run(
            &client,
            &settings,
            SchedulesCommand::Trigger { schedule_id: 11 },
            Some(OutputFormat::Json),
        )
        .await
        .unwrap();

        assert_eq!(code, EXIT_FAILURE);
    }

    #[test]
    fn flags_override_json_fields() {
        let mut payload = serde_json::json!({
            "description": "from json",
            "ref": "main",
            "cron": "0 2 * * *"
        });

        apply_overrides(
            &mut payload,
            Some("from flag".to_string()),
            None,
            None,
            Some("Europe/Madrid".to_string()),
            Some(false),
        );

        assert_eq!(payload["description"], "from flag");
        assert_eq!(payload["ref"], "main");
        assert_eq!(payload["cron_timezone"], "Europe/Madrid");
        assert_eq!(payload["active"], false);
    }

    #[test]
    fn state_override_prefers_the_set_flag() {
        assert_eq!(state_override(true, false), Some(true));
        assert_eq!(state_override(false, true), Some(false));
        assert_eq!(state_override(false, false), None);
    }
}
