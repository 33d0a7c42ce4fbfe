use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineScheduleVariable {
    pub key: String,
    #[serde(default = "default_variable_type")]
    pub variable_type: String,
    pub value: String,
    /// When set, variable substitution is disabled for the value.
    #[serde(default)]
    pub raw: bool,
}

fn default_variable_type() -> String {
    "env_var".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineScheduleOwner {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
}

/// Summary of the most recent pipeline a schedule triggered; deliberately
/// not a full [`crate::models::Pipeline`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineScheduleLastPipeline {
    pub id: u64,
    #[serde(default)]
    pub sha: String,
    #[serde(rename = "ref", default)]
    pub ref_: String,
    #[serde(default)]
    pub status: String,
}

/// A cron-like rule that periodically triggers a pipeline on a ref.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSchedule {
    pub id: u64,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "ref")]
    pub ref_: String,
    pub cron: String,
    #[serde(default = "default_timezone")]
    pub cron_timezone: String,
    /// Absent while the schedule is inactive.
    #[serde(default)]
    pub next_run_at: Option<String>,
    pub active: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub owner: PipelineScheduleOwner,
    /// Only populated by the enriched listing or a single-schedule fetch.
    #[serde(default)]
    pub last_pipeline: Option<PipelineScheduleLastPipeline>,
    /// Only present on single-schedule fetches.
    #[serde(default)]
    pub variables: Vec<PipelineScheduleVariable>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}
