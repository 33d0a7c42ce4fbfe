use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRequest {
    /// Platform-global id.
    pub id: u64,
    /// Project-scoped iid; the number users type and URLs carry.
    pub iid: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// opened, merged, or closed.
    pub state: String,
    /// Flattened from the wire's nested `author` object.
    #[serde(
        rename(deserialize = "author"),
        deserialize_with = "author_username",
        default = "unknown_author"
    )]
    pub author: String,
    pub source_branch: String,
    pub target_branch: String,
    pub web_url: String,
    pub created_at: String,
    pub updated_at: String,
    /// Present only once the state is `merged`.
    #[serde(default)]
    pub merged_at: Option<String>,
    #[serde(default)]
    pub draft: bool,
    /// Historical twin of `draft`; either flag marks a draft.
    #[serde(default)]
    pub work_in_progress: bool,
    #[serde(default)]
    pub project_id: Option<u64>,
}

impl MergeRequest {
    /// The two draft flags are one concept on the platform.
    pub fn is_draft(&self) -> bool {
        self.draft || self.work_in_progress
    }
}

fn unknown_author() -> String {
    "unknown".to_string()
}

fn author_username<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Author {
        username: Option<String>,
    }

    let author = Option::<Author>::deserialize(deserializer)?;
    Ok(author
        .and_then(|a| a.username)
        .unwrap_or_else(unknown_author))
}
