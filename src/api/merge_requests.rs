use chrono::{Duration, Utc};
use log::warn;
use std::collections::HashMap;

use super::client::{encode_path, GitLabClient};
use super::pipelines::PipelineQuery;
use crate::error::Result;
use crate::models::MergeRequest;

/// How far back to look for merge-request pipelines when building the
/// status index. MR pipelines are recent by nature; the floor keeps the
/// bulk fetch bounded.
const PIPELINE_WINDOW_DAYS: i64 = 30;
const PIPELINE_FETCH_LIMIT: usize = 1000;

pub struct MergeRequestQuery<'a> {
    pub project_path: Option<&'a str>,
    /// opened, merged, closed, or all.
    pub state: &'a str,
    pub search: Option<&'a str>,
    pub author_username: Option<&'a str>,
    pub exclude_drafts: bool,
    pub pipeline_status: Option<&'a str>,
    pub limit: Option<usize>,
}

impl Default for MergeRequestQuery<'_> {
    fn default() -> Self {
        Self {
            project_path: None,
            state: "opened",
            search: None,
            author_username: None,
            exclude_drafts: false,
            pipeline_status: None,
            limit: None,
        }
    }
}

impl GitLabClient {
    pub async fn fetch_merge_requests(
        &self,
        query: &MergeRequestQuery<'_>,
    ) -> Result<Vec<MergeRequest>> {
        let mut params = vec![("state".to_string(), query.state.to_string())];
        if let Some(search) = query.search {
            params.push(("search".to_string(), search.to_string()));
        }
        if let Some(author) = query.author_username {
            params.push(("author_username".to_string(), author.to_string()));
        }
        if query.exclude_drafts {
            params.push(("wip".to_string(), "no".to_string()));
        }

        // Status filtering happens after the fetch; applying the limit while
        // paging would bias which merge requests survive the filter.
        let page_limit = if query.pipeline_status.is_some() {
            None
        } else {
            query.limit
        };

        let endpoint = match query.project_path {
            Some(path) => format!("projects/{}/merge_requests", encode_path(path)),
            None => "merge_requests".to_string(),
        };

        let raw = self.paginate(&endpoint, &params, page_limit).await?;
        let mut mrs = raw
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<MergeRequest>, _>>()?;

        if let Some(desired_status) = query.pipeline_status {
            let Some(project_path) = query.project_path else {
                warn!("Pipeline status filtering requires a project; returning no merge requests");
                return Ok(Vec::new());
            };
            mrs = self
                .filter_by_pipeline_status(mrs, project_path, desired_status)
                .await;
            if let Some(limit) = query.limit {
                mrs.truncate(limit);
            }
        }

        Ok(mrs)
    }

    pub async fn fetch_merge_request(
        &self,
        project_path: &str,
        mr_iid: u64,
    ) -> Result<Option<MergeRequest>> {
        let value = self
            .get_optional(
                &format!(
                    "projects/{}/merge_requests/{mr_iid}",
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

    /// Keep only merge requests whose latest merge-request pipeline has the
    /// desired status, preserving their relative order.
    ///
    /// An MR without any pipeline in the indexed window is excluded: no
    /// pipeline data never counts as a match. Any failure while building the
    /// index collapses to an empty result; at this layer "filtering failed"
    /// and "nothing matched" are indistinguishable by design.
    pub async fn filter_by_pipeline_status(
        &self,
        mrs: Vec<MergeRequest>,
        project_path: &str,
        desired_status: &str,
    ) -> Vec<MergeRequest> {
        match self.latest_mr_pipeline_statuses(project_path).await {
            Ok(index) => mrs
                .into_iter()
                .filter(|mr| {
                    index
                        .get(&mr.iid)
                        .is_some_and(|status| status == desired_status)
                })
                .collect(),
            Err(e) => {
                warn!("Pipeline status filter failed for '{project_path}': {e}");
                Vec::new()
            }
        }
    }

    /// One bulk fetch instead of a pipeline lookup per merge request: index
    /// the project's recent merge-request pipelines by MR iid. The list
    /// arrives newest-first, so the first status seen for an iid wins.
    async fn latest_mr_pipeline_statuses(
        &self,
        project_path: &str,
    ) -> Result<HashMap<u64, String>> {
        let floor = (Utc::now() - Duration::days(PIPELINE_WINDOW_DAYS))
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string();

        let pipelines = self
            .fetch_pipelines(
                project_path,
                &PipelineQuery {
                    source: Some("merge_request_event"),
                    created_after: Some(&floor),
                    limit: Some(PIPELINE_FETCH_LIMIT),
                    ..Default::default()
                },
            )
            .await?;

        let mut index = HashMap::new();
        for pipeline in pipelines {
            if let Some(iid) = mr_iid_from_ref(&pipeline.ref_) {
                index.entry(iid).or_insert(pipeline.status);
            }
        }
        Ok(index)
    }
}

/// Extract the MR iid from a `refs/merge-requests/<iid>/head` pipeline ref.
fn mr_iid_from_ref(ref_: &str) -> Option<u64> {
    ref_.strip_prefix("refs/merge-requests/")?
        .strip_suffix("/head")?
        .parse()
        .ok()
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

    fn mr_body(iid: u64) -> serde_json::Value {
        json!({
            "id": 1000 + iid,
            "iid": iid,
            "title": format!("MR {iid}"),
            "state": "opened",
            "author": {"username": "jane"},
            "source_branch": format!("feature-{iid}"),
            "target_branch": "main",
            "web_url": format!("https://gitlab.example.com/team/api/-/merge_requests/{iid}"),
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-02T10:00:00Z"
        })
    }

    fn pipeline_body(id: u64, mr_iid: u64, status: &str) -> serde_json::Value {
        json!({
            "id": id,
            "iid": id,
            "project_id": 7,
            "status": status,
            "ref": format!("refs/merge-requests/{mr_iid}/head"),
            "sha": "deadbeefcafe",
            "web_url": format!("https://gitlab.example.com/team/api/-/pipelines/{id}"),
            "created_at": "2024-05-02T10:00:00Z",
            "updated_at": "2024-05-02T10:05:00Z"
        })
    }

    fn mock_mr_pipelines(server: &mut mockito::Server, body: serde_json::Value) -> mockito::Mock {
        server
            .mock("GET", "/api/v4/projects/team%2Fapi/pipelines")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("source".into(), "merge_request_event".into()),
                Matcher::Regex("created_after=".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
    }

    #[test]
    fn iid_extraction_only_accepts_mr_head_refs() {
        assert_eq!(mr_iid_from_ref("refs/merge-requests/5/head"), Some(5));
        assert_eq!(mr_iid_from_ref("refs/merge-requests/123/head"), Some(123));
        assert_eq!(mr_iid_from_ref("refs/merge-requests/5/merge"), None);
        assert_eq!(mr_iid_from_ref("refs/heads/main"), None);
        assert_eq!(mr_iid_from_ref("refs/merge-requests/abc/head"), None);
    }

    #[tokio::test]
    async fn first_pipeline_wins_for_each_iid() {
        let mut server = mockito::Server::new_async().await;
        // Newest-first: the running pipeline for MR 5 precedes the success.
        mock_mr_pipelines(
            &mut server,
            json!([
                pipeline_body(31, 5, "running"),
                pipeline_body(30, 5, "success"),
                pipeline_body(29, 7, "success"),
            ]),
        )
        .create_async()
        .await;

        let client = test_client(&server);
        let mrs: Vec<MergeRequest> = vec![
            serde_json::from_value(mr_body(5)).unwrap(),
            serde_json::from_value(mr_body(7)).unwrap(),
        ];

        let running = client
            .filter_by_pipeline_status(mrs.clone(), "team/api", "running")
            .await;
        assert_eq!(running.iter().map(|m| m.iid).collect::<Vec<_>>(), vec![5]);

        let success = client
            .filter_by_pipeline_status(mrs, "team/api", "success")
            .await;
        assert_eq!(success.iter().map(|m| m.iid).collect::<Vec<_>>(), vec![7]);
    }

    #[tokio::test]
    async fn unknown_iids_are_excluded_not_passed_through() {
        let mut server = mockito::Server::new_async().await;
        mock_mr_pipelines(&mut server, json!([pipeline_body(31, 5, "success")]))
            .create_async()
            .await;

        let client = test_client(&server);
        let mrs: Vec<MergeRequest> = vec![
            serde_json::from_value(mr_body(9)).unwrap(),
            serde_json::from_value(mr_body(5)).unwrap(),
        ];

        let filtered = client
            .filter_by_pipeline_status(mrs, "team/api", "success")
            .await;
        // MR 9 has no pipeline data in the window: excluded, never assumed.
        assert_eq!(filtered.iter().map(|m| m.iid).collect::<Vec<_>>(), vec![5]);
    }

    #[tokio::test]
    async fn filter_failure_collapses_to_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v4/projects/team%2Fapi/pipelines")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body(r#"{"message": "Internal Server Error"}"#)
            .create_async()
            .await;

        let client = test_client(&server);
        let mrs: Vec<MergeRequest> = vec![serde_json::from_value(mr_body(5)).unwrap()];

        let filtered = client
            .filter_by_pipeline_status(mrs, "team/api", "success")
            .await;
        assert!(filtered.is_empty());
    }

    #[tokio::test]
    async fn exclude_drafts_sends_wip_no() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/api/v4/merge_requests")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("state".into(), "opened".into()),
                Matcher::UrlEncoded("wip".into(), "no".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;

        let client = test_client(&server);
        let mrs = client
            .fetch_merge_requests(&MergeRequestQuery {
                exclude_drafts: true,
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(mrs.is_empty());
        m.assert_async().await;
    }

    #[tokio::test]
    async fn limit_is_deferred_until_after_status_filtering() {
        let mut server = mockito::Server::new_async().await;
        // per_page=100 proves the fetch ran unbounded; an early limit of 1
        // would have shrunk per_page to 1 and missed this mock.
        let mr_mock = server
            .mock("GET", "/api/v4/projects/team%2Fapi/merge_requests")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("state".into(), "opened".into()),
                Matcher::UrlEncoded("per_page".into(), "100".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!([mr_body(5), mr_body(7), mr_body(9)]).to_string())
            .create_async()
            .await;
        mock_mr_pipelines(
            &mut server,
            json!([
                pipeline_body(31, 5, "success"),
                pipeline_body(30, 7, "success"),
            ]),
        )
        .create_async()
        .await;

        let client = test_client(&server);
        let mrs = client
            .fetch_merge_requests(&MergeRequestQuery {
                project_path: Some("team/api"),
                pipeline_status: Some("success"),
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(mrs.iter().map(|m| m.iid).collect::<Vec<_>>(), vec![5]);
        mr_mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_merge_request_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v4/projects/team%2Fapi/merge_requests/99")
            .with_status(404)
            .with_body(r#"{"message": "404 Not found"}"#)
            .create_async()
            .await;

        let client = test_client(&server);
        let mr = client.fetch_merge_request("team/api", 99).await.unwrap();
        assert!(mr.is_none());
    }
}
