use async_trait::async_trait;
use log::warn;
use serde::Deserialize;
use serde_json::{json, Value};

use super::client::{encode_path, GitLabClient};
use crate::error::{LabkitError, Result};
use crate::models::{
    Pipeline, PipelineSchedule, PipelineScheduleLastPipeline, PipelineScheduleOwner,
    PipelineScheduleVariable,
};

/// Page size for the per-schedule pipeline probe in the REST fallback; big
/// enough to contain the most recent pipeline even with unreliable upstream
/// ordering.
const REST_PIPELINE_PROBE: usize = 10;

const SCHEDULES_QUERY: &str = r#"
query GetPipelineSchedules($projectPath: ID!, $first: Int) {
  project(fullPath: $projectPath) {
    pipelineSchedules(first: $first) {
      nodes {
        id
        description
        ref
        cron
        cronTimezone
        nextRunAt
        active
        createdAt
        updatedAt
        owner {
          id
          name
          username
          state
          avatarUrl
          webUrl
        }
        pipelines(first: 1, sort: CREATED_DESC) {
          nodes {
            id
            sha
            ref
            status
          }
        }
        variables {
          nodes {
            key
            value
            variableType
            raw
          }
        }
      }
    }
  }
}
"#;

/// Strategy for the enriched schedule listing (owner, variables, and the
/// most recent pipeline per schedule). The GraphQL strategy does it in one
/// round trip; the REST strategy issues one probe per schedule.
#[async_trait]
trait ScheduleFetch: Sync {
    fn name(&self) -> &'static str;

    async fn fetch(
        &self,
        client: &GitLabClient,
        project_path: &str,
        scope: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<PipelineSchedule>>;
}

struct GraphqlScheduleFetch;
struct RestScheduleFetch;

#[async_trait]
impl ScheduleFetch for GraphqlScheduleFetch {
    fn name(&self) -> &'static str {
        "GraphQL"
    }

    async fn fetch(
        &self,
        client: &GitLabClient,
        project_path: &str,
        scope: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<PipelineSchedule>> {
        let variables = json!({
            "projectPath": project_path,
            "first": limit.unwrap_or(100),
        });
        let data = client.graphql(SCHEDULES_QUERY, variables).await?;
        let data: SchedulesData = serde_json::from_value(data)?;

        let nodes = data
            .project
            .and_then(|p| p.pipeline_schedules)
            .map(Connection::into_nodes)
            .unwrap_or_default();

        let mut schedules = nodes
            .into_iter()
            .map(convert_schedule_node)
            .collect::<Result<Vec<_>>>()?;

        // The query has no scope argument; filter locally.
        if let Some(scope) = scope {
            let want_active = scope == "active";
            schedules.retain(|s| s.active == want_active);
        }

        Ok(schedules)
    }
}

#[async_trait]
impl ScheduleFetch for RestScheduleFetch {
    fn name(&self) -> &'static str {
        "REST"
    }

    async fn fetch(
        &self,
        client: &GitLabClient,
        project_path: &str,
        scope: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<PipelineSchedule>> {
        let mut schedules = client
            .fetch_schedules_plain(project_path, scope, limit)
            .await?;

        for schedule in &mut schedules {
            // A failure on one schedule leaves its pipeline column empty
            // instead of sinking the whole listing.
            match client
                .fetch_schedule_pipelines(project_path, schedule.id, Some(REST_PIPELINE_PROBE))
                .await
            {
                Ok(pipelines) => {
                    if let Some(latest) = pipelines.first() {
                        schedule.last_pipeline = Some(PipelineScheduleLastPipeline {
                            id: latest.id,
                            sha: latest.sha.clone(),
                            ref_: latest.ref_.clone(),
                            status: latest.status.clone(),
                        });
                    }
                }
                Err(e) => {
                    warn!(
                        "Could not fetch pipelines for schedule {}: {e}",
                        schedule.id
                    );
                }
            }
        }

        Ok(schedules)
    }
}

impl GitLabClient {
    /// List pipeline schedules. The fast mode is a plain REST listing; with
    /// `include_last_pipeline` the enriched strategies run, GraphQL first
    /// and REST as the silent fallback.
    pub async fn fetch_schedules(
        &self,
        project_path: &str,
        scope: Option<&str>,
        limit: Option<usize>,
        include_last_pipeline: bool,
    ) -> Result<Vec<PipelineSchedule>> {
        if !include_last_pipeline {
            return self.fetch_schedules_plain(project_path, scope, limit).await;
        }

        let strategies: [&dyn ScheduleFetch; 2] = [&GraphqlScheduleFetch, &RestScheduleFetch];
        let mut last_error = None;
        for strategy in strategies {
            match strategy.fetch(self, project_path, scope, limit).await {
                Ok(schedules) => return Ok(schedules),
                Err(e) => {
                    warn!("{} schedule fetch failed: {e}", strategy.name());
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| LabkitError::Config("no schedule fetch strategy ran".to_string())))
    }

    async fn fetch_schedules_plain(
        &self,
        project_path: &str,
        scope: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<PipelineSchedule>> {
        let mut params: Vec<(String, String)> = Vec::new();
        if let Some(scope) = scope {
            params.push(("scope".to_string(), scope.to_string()));
        }

        let raw = self
            .paginate(
                &format!("projects/{}/pipeline_schedules", encode_path(project_path)),
                &params,
                limit,
            )
            .await?;

        raw.into_iter()
            .map(|value| serde_json::from_value(value).map_err(Into::into))
            .collect()
    }

    pub async fn fetch_schedule(
        &self,
        project_path: &str,
        schedule_id: u64,
    ) -> Result<Option<PipelineSchedule>> {
        let value = self
            .get_optional(
                &format!(
                    "projects/{}/pipeline_schedules/{schedule_id}",
                    encode_path(project_path)
                ),
                &[],
            )
            .await?;
        match value {
            Some(value) if value.is_object() => Ok(Some(serde_json::from_value(value)?)),
            _ => Ok(None),
        }
    }

    /// Pipelines started by one schedule, most recent first. Upstream
    /// ordering for this sub-resource is not trustworthy, so the result is
    /// re-sorted by id descending locally.
    pub async fn fetch_schedule_pipelines(
        &self,
        project_path: &str,
        schedule_id: u64,
        limit: Option<usize>,
    ) -> Result<Vec<Pipeline>> {
        let params = [("sort".to_string(), "desc".to_string())];
        let raw = self
            .paginate(
                &format!(
                    "projects/{}/pipeline_schedules/{schedule_id}/pipelines",
                    encode_path(project_path)
                ),
                &params,
                limit,
            )
            .await?;

        let mut pipelines = raw
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(Into::into))
            .collect::<Result<Vec<Pipeline>>>()?;

        pipelines.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(pipelines)
    }

    /// Run a schedule immediately. Returns the platform's response payload,
    /// or `None` on failure; the caller is responsible for turning a `None`
    /// into a nonzero exit.
    pub async fn trigger_schedule(&self, project_path: &str, schedule_id: u64) -> Option<Value> {
        let endpoint = format!(
            "projects/{}/pipeline_schedules/{schedule_id}/play",
            encode_path(project_path)
        );

        match self.post(&endpoint, None).await {
            Ok(value) if value.is_object() => Some(value),
            Ok(_) => None,
            Err(e) => {
                warn!("Failed to trigger schedule {schedule_id}: {e}");
                None
            }
        }
    }

    /// Create a schedule from a JSON document. Returns `None` on failure.
    pub async fn create_schedule(
        &self,
        project_path: &str,
        payload: &Value,
    ) -> Option<PipelineSchedule> {
        let endpoint = format!("projects/{}/pipeline_schedules", encode_path(project_path));
        self.write_schedule(self.post(&endpoint, Some(payload)), "create")
            .await
    }

    /// Update an existing schedule from a JSON document. Returns `None` on
    /// failure.
    pub async fn update_schedule(
        &self,
        project_path: &str,
        schedule_id: u64,
        payload: &Value,
    ) -> Option<PipelineSchedule> {
        let endpoint = format!(
            "projects/{}/pipeline_schedules/{schedule_id}",
            encode_path(project_path)
        );
        self.write_schedule(self.put(&endpoint, Some(payload)), "update")
            .await
    }

    async fn write_schedule(
        &self,
        request: impl std::future::Future<Output = Result<Value>>,
        action: &str,
    ) -> Option<PipelineSchedule> {
        match request.await {
            Ok(value) if value.is_object() => match serde_json::from_value(value) {
                Ok(schedule) => Some(schedule),
                Err(e) => {
                    warn!("Unexpected schedule payload on {action}: {e}");
                    None
                }
            },
            Ok(_) => None,
            Err(e) => {
                warn!("Failed to {action} schedule: {e}");
                None
            }
        }
    }
}

#[derive(Deserialize)]
struct SchedulesData {
    project: Option<SchedulesProject>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchedulesProject {
    pipeline_schedules: Option<Connection<ScheduleNode>>,
}

/// GraphQL connections deliver `nodes` as a nullable list of nullable
/// entries; both layers flatten away.
#[derive(Deserialize)]
struct Connection<T> {
    nodes: Option<Vec<Option<T>>>,
}

impl<T> Connection<T> {
    fn into_nodes(self) -> Vec<T> {
        self.nodes.into_iter().flatten().flatten().collect()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleNode {
    id: String,
    description: Option<String>,
    #[serde(rename = "ref")]
    ref_: Option<String>,
    cron: String,
    cron_timezone: Option<String>,
    next_run_at: Option<String>,
    active: bool,
    created_at: Option<String>,
    updated_at: Option<String>,
    owner: Option<OwnerNode>,
    pipelines: Option<Connection<PipelineNode>>,
    variables: Option<Connection<VariableNode>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnerNode {
    id: String,
    name: Option<String>,
    username: Option<String>,
    state: Option<String>,
    avatar_url: Option<String>,
    web_url: Option<String>,
}

#[derive(Deserialize)]
struct PipelineNode {
    id: String,
    sha: Option<String>,
    #[serde(rename = "ref")]
    ref_: Option<String>,
    status: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariableNode {
    key: String,
    value: String,
    variable_type: Option<String>,
    raw: Option<bool>,
}

/// GraphQL global ids look like `gid://gitlab/Ci::PipelineSchedule/42`.
fn parse_gid(gid: &str) -> Option<u64> {
    gid.rsplit('/').next()?.parse().ok()
}

fn convert_schedule_node(node: ScheduleNode) -> Result<PipelineSchedule> {
    let id = parse_gid(&node.id).ok_or_else(|| LabkitError::GraphQl {
        errors: format!("unexpected schedule id '{}'", node.id),
    })?;

    let owner = node
        .owner
        .map(|owner| PipelineScheduleOwner {
            id: parse_gid(&owner.id).unwrap_or_default(),
            name: owner.name.unwrap_or_default(),
            username: owner.username.unwrap_or_default(),
            state: owner.state.unwrap_or_default().to_lowercase(),
            avatar_url: owner.avatar_url,
            web_url: owner.web_url,
        })
        .unwrap_or_default();

    let last_pipeline = node
        .pipelines
        .map(Connection::into_nodes)
        .unwrap_or_default()
        .into_iter()
        .next()
        .map(|pipeline| PipelineScheduleLastPipeline {
            id: parse_gid(&pipeline.id).unwrap_or_default(),
            sha: pipeline.sha.unwrap_or_default(),
            ref_: pipeline.ref_.unwrap_or_default(),
            status: pipeline.status.unwrap_or_default().to_lowercase(),
        });

    let variables = node
        .variables
        .map(Connection::into_nodes)
        .unwrap_or_default()
        .into_iter()
        .map(|variable| PipelineScheduleVariable {
            key: variable.key,
            variable_type: variable
                .variable_type
                .unwrap_or_else(|| "env_var".to_string())
                .to_lowercase(),
            value: variable.value,
            raw: variable.raw.unwrap_or(false),
        })
        .collect();

    Ok(PipelineSchedule {
        id,
        description: node.description.unwrap_or_default(),
        ref_: node.ref_.unwrap_or_default(),
        cron: node.cron,
        cron_timezone: node.cron_timezone.unwrap_or_else(|| "UTC".to_string()),
        next_run_at: node.next_run_at,
        active: node.active,
        created_at: node.created_at.unwrap_or_default(),
        updated_at: node.updated_at.unwrap_or_default(),
        owner,
        last_pipeline,
        variables,
    })
}
