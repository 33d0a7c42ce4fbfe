use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Private,
    Internal,
    Public,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Visibility::Private => "private",
            Visibility::Internal => "internal",
            Visibility::Public => "public",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub path: String,
    pub path_with_namespace: String,
    #[serde(default)]
    pub description: Option<String>,
    pub visibility: Visibility,
    #[serde(default)]
    pub default_branch: Option<String>,
    pub web_url: String,
    /// Flattened from the wire's nested `namespace` object.
    #[serde(
        rename(deserialize = "namespace"),
        deserialize_with = "namespace_full_path",
        default
    )]
    pub namespace_path: String,
    #[serde(default)]
    pub star_count: u64,
    #[serde(default)]
    pub forks_count: u64,
}

fn namespace_full_path<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Namespace {
        full_path: Option<String>,
    }

    let namespace = Option::<Namespace>::deserialize(deserializer)?;
    Ok(namespace.and_then(|n| n.full_path).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_path_is_flattened() {
        let project: Project = serde_json::from_value(serde_json::json!({
            "id": 12,
            "name": "api",
            "path": "api",
            "path_with_namespace": "team/api",
            "visibility": "internal",
            "web_url": "https://gitlab.example.com/team/api",
            "namespace": { "full_path": "team" },
            "star_count": 3,
            "forks_count": 1
        }))
        .unwrap();

        assert_eq!(project.namespace_path, "team");
        assert_eq!(project.visibility, Visibility::Internal);
        assert!(project.default_branch.is_none());
    }
}
