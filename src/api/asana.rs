use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use super::{RequestError, TaskSource};
use crate::model::task::{Attachment, Story, TaskDetails, TaskSummary};

const PAGE_LIMIT: &str = "100";

const TASK_LIST_FIELDS: &str =
    "gid,name,assignee_status,completed,created_at,due_on,assignee,subtasks";
const TASK_DETAIL_FIELDS: &str = "gid,name,assignee,assignee.name,assignee_status,completed,\
created_at,due_on,notes,followers,projects,resource_subtype,start_on,tags,subtasks,subtasks.name";
const ATTACHMENT_FIELDS: &str = "gid,name,download_url";

pub struct AsanaClient {
    base_url: String,
    auth_header: String,
    client: reqwest::Client,
}

impl AsanaClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_header: format!("Bearer {token}"),
            client: reqwest::Client::new(),
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Envelope<T>, RequestError> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header("Authorization", &self.auth_header)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await
            .map_err(|source| RequestError::Transport {
                endpoint: path.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RequestError::Status {
                endpoint: path.to_string(),
                status,
            });
        }

        resp.json().await.map_err(|source| RequestError::Decode {
            endpoint: path.to_string(),
            source,
        })
    }

    /// Follow `next_page.offset` until the API stops handing one out.
    async fn get_paged<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, RequestError> {
        let mut items = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let page: Envelope<Vec<T>> = {
                let mut params: Vec<(&str, &str)> = query.to_vec();
                params.push(("limit", PAGE_LIMIT));
                if let Some(off) = offset.as_deref() {
                    params.push(("offset", off));
                }
                self.get(path, &params).await?
            };
            items.extend(page.data);

            match page.next_page.and_then(|p| p.offset) {
                Some(next) => {
                    debug!(path, offset = %next, "fetching next page");
                    offset = Some(next);
                }
                None => break,
            }
        }

        Ok(items)
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
    next_page: Option<NextPage>,
}

#[derive(Deserialize)]
struct NextPage {
    offset: Option<String>,
}

#[async_trait]
impl TaskSource for AsanaClient {
    async fn list_tasks(&self, project_id: &str) -> Result<Vec<TaskSummary>, RequestError> {
        let tasks = self
            .get_paged(
                &format!("/projects/{project_id}/tasks"),
                &[("opt_fields", TASK_LIST_FIELDS)],
            )
            .await?;
        info!(project_id, count = tasks.len(), "fetched tasks");
        Ok(tasks)
    }

    async fn get_task_details(&self, task_id: &str) -> Result<TaskDetails, RequestError> {
        let envelope: Envelope<TaskDetails> = self
            .get(
                &format!("/tasks/{task_id}"),
                &[("opt_fields", TASK_DETAIL_FIELDS)],
            )
            .await?;
        debug!(task_id, "fetched task details");
        Ok(envelope.data)
    }

    async fn get_task_comments(&self, task_id: &str) -> Result<Vec<Story>, RequestError> {
        let stories = self
            .get_paged(&format!("/tasks/{task_id}/stories"), &[])
            .await?;
        debug!(task_id, count = stories.len(), "fetched stories");
        Ok(stories)
    }

    async fn get_task_attachments(&self, task_id: &str) -> Result<Vec<Attachment>, RequestError> {
        let attachments = self
            .get_paged(
                &format!("/tasks/{task_id}/attachments"),
                &[("opt_fields", ATTACHMENT_FIELDS)],
            )
            .await?;
        debug!(task_id, count = attachments.len(), "fetched attachments");
        Ok(attachments)
    }

    async fn get_attachment(&self, attachment_id: &str) -> Result<Attachment, RequestError> {
        let envelope: Envelope<Attachment> = self
            .get(
                &format!("/attachments/{attachment_id}"),
                &[("opt_fields", ATTACHMENT_FIELDS)],
            )
            .await?;
        Ok(envelope.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> AsanaClient {
        AsanaClient::new(&server.uri(), "secret-token")
    }

    #[tokio::test]
    async fn list_tasks_sends_bearer_token_and_field_set() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects/42/tasks"))
            .and(header("Authorization", "Bearer secret-token"))
            .and(query_param("opt_fields", TASK_LIST_FIELDS))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"gid": "1234", "name": "Test Task"}]
            })))
            .mount(&server)
            .await;

        let tasks = client_for(&server).await.list_tasks("42").await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].gid, "1234");
        assert_eq!(tasks[0].name, "Test Task");
    }

    #[tokio::test]
    async fn list_tasks_follows_pagination_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects/42/tasks"))
            .and(query_param_is_missing("offset"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"gid": "1"}, {"gid": "2"}],
                "next_page": {"offset": "abc", "path": "/projects/42/tasks?offset=abc"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/projects/42/tasks"))
            .and(query_param("offset", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"gid": "3"}],
                "next_page": null
            })))
            .mount(&server)
            .await;

        let tasks = client_for(&server).await.list_tasks("42").await.unwrap();
        let ids: Vec<&str> = tasks.iter().map(|t| t.gid.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
    }

    #[tokio::test]
    async fn unauthorized_surfaces_as_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks/1"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .get_task_details("1")
            .await
            .unwrap_err();
        match err {
            RequestError::Status { status, .. } => assert_eq!(status.as_u16(), 401),
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        // Bind then drop a listener so the port is closed.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = AsanaClient::new(&format!("http://127.0.0.1:{port}"), "t");
        let err = client.get_task_comments("1").await.unwrap_err();
        assert!(matches!(err, RequestError::Transport { .. }));
        // The cause is reachable through `source()`, not repeated in the message.
        assert_eq!(err.to_string(), "/tasks/1/stories request failed");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[tokio::test]
    async fn fetches_details_stories_and_attachments() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks/7"))
            .and(query_param("opt_fields", TASK_DETAIL_FIELDS))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"gid": "7", "name": "Ship it", "assignee": {"gid": "u1", "name": "Ana"},
                         "completed": true, "notes": "n", "subtasks": []}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tasks/7/stories"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"gid": "s1", "text": "Test comment"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tasks/7/attachments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"gid": "a1", "name": "Test Attachment", "download_url": null}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let details = client.get_task_details("7").await.unwrap();
        assert_eq!(details.assignee.unwrap().name, "Ana");
        assert!(details.completed);

        let stories = client.get_task_comments("7").await.unwrap();
        assert_eq!(stories[0].text, "Test comment");

        let attachments = client.get_task_attachments("7").await.unwrap();
        assert_eq!(attachments[0].name.as_deref(), Some("Test Attachment"));
        assert!(attachments[0].download_url.is_none());
    }

    #[tokio::test]
    async fn malformed_payload_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/attachments/a1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .get_attachment("a1")
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Decode { .. }));
    }
}
