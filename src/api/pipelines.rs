use log::warn;
use serde_json::json;

use super::client::{encode_path, GitLabClient};
use crate::error::Result;
use crate::models::{Job, Pipeline};

#[derive(Default)]
pub struct PipelineQuery<'a> {
    pub status: Option<&'a str>,
    /// Trigger source, e.g. `push` or `merge_request_event`.
    pub source: Option<&'a str>,
    /// ISO-8601 floor on the pipeline creation time.
    pub created_after: Option<&'a str>,
    pub limit: Option<usize>,
}

impl GitLabClient {
    pub async fn fetch_pipelines(
        &self,
        project_path: &str,
        query: &PipelineQuery<'_>,
    ) -> Result<Vec<Pipeline>> {
        let mut params: Vec<(String, String)> = Vec::new();
        if let Some(status) = query.status {
            params.push(("status".to_string(), status.to_string()));
        }
        if let Some(source) = query.source {
            params.push(("source".to_string(), source.to_string()));
        }
        if let Some(created_after) = query.created_after {
            params.push(("created_after".to_string(), created_after.to_string()));
        }

        let raw = self
            .paginate(
                &format!("projects/{}/pipelines", encode_path(project_path)),
                &params,
                query.limit,
            )
            .await?;

        raw.into_iter()
            .map(|value| serde_json::from_value(value).map_err(Into::into))
            .collect()
    }

    pub async fn fetch_pipeline(
        &self,
        project_path: &str,
        pipeline_id: u64,
    ) -> Result<Option<Pipeline>> {
        let value = self
            .get_optional(
                &format!(
                    "projects/{}/pipelines/{pipeline_id}",
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

    pub async fn fetch_pipeline_jobs(
        &self,
        project_path: &str,
        pipeline_id: u64,
    ) -> Result<Vec<Job>> {
        let raw = self
            .paginate(
                &format!(
                    "projects/{}/pipelines/{pipeline_id}/jobs",
                    encode_path(project_path)
                ),
                &[],
                None,
            )
            .await?;

        raw.into_iter()
            .map(|value| serde_json::from_value(value).map_err(Into::into))
            .collect()
    }

    /// Start a new pipeline on a branch or tag. Returns `None` when the
    /// platform answered with something that is not a pipeline.
    pub async fn trigger_pipeline(
        &self,
        project_path: &str,
        ref_: &str,
    ) -> Result<Option<Pipeline>> {
        let body = json!({ "ref": ref_ });
        let value = self
            .post(
                &format!("projects/{}/pipeline", encode_path(project_path)),
                Some(&body),
            )
            .await?;

        if value.is_object() {
            Ok(Some(serde_json::from_value(value)?))
        } else {
            Ok(None)
        }
    }

    pub async fn fetch_mr_pipelines(
        &self,
        project_path: &str,
        mr_iid: u64,
    ) -> Result<Vec<Pipeline>> {
        let raw = self
            .paginate(
                &format!(
                    "projects/{}/merge_requests/{mr_iid}/pipelines",
                    encode_path(project_path)
                ),
                &[],
                None,
            )
            .await?;

        raw.into_iter()
            .map(|value| serde_json::from_value(value).map_err(Into::into))
            .collect()
    }

    /// Start a new pipeline for a merge request's current head. Failures are
    /// logged and reported as `None`; the caller decides what that means for
    /// the process exit.
    pub async fn trigger_mr_pipeline(&self, project_path: &str, mr_iid: u64) -> Option<Pipeline> {
        let endpoint = format!(
            "projects/{}/merge_requests/{mr_iid}/pipelines",
            encode_path(project_path)
        );

        match self.post(&endpoint, None).await {
            Ok(value) if value.is_object() => match serde_json::from_value(value) {
                Ok(pipeline) => Some(pipeline),
                Err(e) => {
                    warn!("Unexpected pipeline payload for MR !{mr_iid}: {e}");
                    None
                }
            },
            Ok(_) => None,
            Err(e) => {
                warn!("Failed to trigger pipeline for MR !{mr_iid}: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use mockito::Matcher;
    use serde_json::json;

    fn test_client(server: &mockito::Server) -> GitLabClient {
        GitLabClient::new(&Settings {
            base_url: server.url(),
            token: None,
            project: None,
            debug: false,
        })
        .unwrap()
    }

    fn pipeline_body(id: u64, status: &str) -> serde_json::Value {
        json!({
            "id": id,
            "iid": id,
            "project_id": 7,
            "status": status,
            "ref": "main",
            "sha": "deadbeefcafe",
            "web_url": format!("https://gitlab.example.com/team/api/-/pipelines/{id}"),
            "created_at": "2024-05-02T10:00:00Z",
            "updated_at": "2024-05-02T10:05:00Z"
        })
    }

    #[tokio::test]
    async fn status_and_source_become_query_params() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/api/v4/projects/team%2Fapi/pipelines")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("status".into(), "failed".into()),
                Matcher::UrlEncoded("source".into(), "push".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!([pipeline_body(1, "failed")]).to_string())
            .create_async()
            .await;

        let client = test_client(&server);
        let pipelines = client
            .fetch_pipelines(
                "team/api",
                &PipelineQuery {
                    status: Some("failed"),
                    source: Some("push"),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(pipelines.len(), 1);
        assert_eq!(pipelines[0].status, "failed");
        m.assert_async().await;
    }

    #[tokio::test]
    async fn trigger_pipeline_returns_created_pipeline() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v4/projects/team%2Fapi/pipeline")
            .match_body(Matcher::Json(json!({"ref": "main"})))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(pipeline_body(55, "created").to_string())
            .create_async()
            .await;

        let client = test_client(&server);
        let pipeline = client
            .trigger_pipeline("team/api", "main")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pipeline.id, 55);
        assert_eq!(pipeline.status, "created");
    }

    #[tokio::test]
    async fn failed_mr_trigger_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v4/projects/team%2Fapi/merge_requests/5/pipelines")
            .with_status(400)
            .with_body(r#"{"message": {"base": ["Pipeline could not be created"]}}"#)
            .create_async()
            .await;

        let client = test_client(&server);
        let pipeline = client.trigger_mr_pipeline("team/api", 5).await;
        assert!(pipeline.is_none());
    }
}
