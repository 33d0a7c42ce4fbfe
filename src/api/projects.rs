use log::warn;

use super::client::{encode_path, GitLabClient};
use crate::error::Result;
use crate::models::Project;

impl GitLabClient {
    /// List projects, either globally or inside one group. A group path is
    /// resolved with a search plus an exact `full_path` match; an unknown
    /// group yields an empty listing, not an error.
    pub async fn fetch_projects(
        &self,
        group_path: Option<&str>,
        search: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<Project>> {
        let mut params: Vec<(String, String)> = Vec::new();
        if let Some(search) = search {
            params.push(("search".to_string(), search.to_string()));
        }

        let raw = match group_path {
            Some(group_path) => {
                let candidates = self
                    .get("groups", &[("search".to_string(), group_path.to_string())])
                    .await?;
                let group_id = candidates
                    .as_array()
                    .and_then(|groups| {
                        groups
                            .iter()
                            .find(|g| g["full_path"].as_str() == Some(group_path))
                    })
                    .and_then(|g| g["id"].as_u64());

                let Some(group_id) = group_id else {
                    warn!("Group '{group_path}' not found");
                    return Ok(Vec::new());
                };

                self.paginate(&format!("groups/{group_id}/projects"), &params, limit)
                    .await?
            }
            None => self.paginate("projects", &params, limit).await?,
        };

        raw.into_iter()
            .map(|value| serde_json::from_value(value).map_err(Into::into))
            .collect()
    }

    /// Fetch a single project by its namespace-qualified path.
    pub async fn fetch_project(&self, project_path: &str) -> Result<Option<Project>> {
        let value = self
            .get_optional(&format!("projects/{}", encode_path(project_path)), &[])
            .await?;
        match value {
            Some(value) if value.is_object() => Ok(Some(serde_json::from_value(value)?)),
            _ => Ok(None),
        }
    }

    pub async fn fetch_project_by_id(&self, project_id: u64) -> Result<Option<Project>> {
        let value = self
            .get_optional(&format!("projects/{project_id}"), &[])
            .await?;
        match value {
            Some(value) if value.is_object() => Ok(Some(serde_json::from_value(value)?)),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use mockito::Matcher;

    fn test_client(server: &mockito::Server) -> GitLabClient {
        GitLabClient::new(&Settings {
            base_url: server.url(),
            token: None,
            project: None,
            debug: false,
        })
        .unwrap()
    }

    const PROJECT_BODY: &str = r#"{
        "id": 7, "name": "api", "path": "api", "path_with_namespace": "team/api",
        "visibility": "private", "web_url": "https://gitlab.example.com/team/api",
        "namespace": {"full_path": "team"}, "star_count": 0, "forks_count": 0
    }"#;

    #[tokio::test]
    async fn group_scoped_listing_requires_exact_path_match() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v4/groups")
            .match_query(Matcher::UrlEncoded("search".into(), "team".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"id": 1, "name": "team-archive", "full_path": "team-archive"},
                    {"id": 2, "name": "team", "full_path": "team"}
                ]"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/api/v4/groups/2/projects")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!("[{PROJECT_BODY}]"))
            .create_async()
            .await;

        let client = test_client(&server);
        let projects = client.fetch_projects(Some("team"), None, None).await.unwrap();

        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].path_with_namespace, "team/api");
    }

    #[tokio::test]
    async fn unknown_group_yields_empty_listing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v4/groups")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;

        let client = test_client(&server);
        let projects = client
            .fetch_projects(Some("nope"), None, None)
            .await
            .unwrap();
        assert!(projects.is_empty());
    }

    #[tokio::test]
    async fn missing_project_is_none_not_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v4/projects/team%2Fgone")
            .with_status(404)
            .with_body(r#"{"message": "404 Project Not Found"}"#)
            .create_async()
            .await;

        let client = test_client(&server);
        let project = client.fetch_project("team/gone").await.unwrap();
        assert!(project.is_none());
    }
}
