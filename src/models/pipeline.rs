use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: u64,
    pub iid: u64,
    pub project_id: u64,
    /// Platform status string (created, pending, running, success, failed,
    /// canceled, skipped, ...).
    pub status: String,
    #[serde(rename = "ref")]
    pub ref_: String,
    pub sha: String,
    pub web_url: String,
    pub created_at: String,
    pub updated_at: String,
    /// Whole seconds; absent while the pipeline is still running and on
    /// collection listings.
    #[serde(default)]
    pub duration: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    pub name: String,
    pub stage: String,
    pub status: String,
    #[serde(rename = "ref")]
    pub ref_: String,
    pub created_at: String,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
    /// Fractional seconds, unlike pipeline durations.
    #[serde(default)]
    pub duration: Option<f64>,
    pub web_url: String,
}
