//! GraphQL-over-HTTP implementation of the DataPlatform
//!
//! Every operation posts `{ query, variables }` to `{url}/graphql/v1` with
//! the service key as bearer token.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};
use userbridge_core::{ProbeError, RemoteError, TransportError, TransportErrorKind, UserId};

use super::DataPlatform;
use crate::config::PlatformConfig;
use crate::error::ServerResult;
use crate::models::{UpdatedUser, User, UserUpdate};

const GET_USER_QUERY: &str = r#"
query GetUserById($id: UUID!) {
    users_dataCollection(filter: { id: { eq: $id } }) {
        edges {
            node {
                first_name last_name id email created_at latitude longitude location
            }
        }
    }
}
"#;

const UPDATE_USER_MUTATION: &str = r#"
mutation UpdateUser($id: UUID!, $set: users_dataUpdateInput!) {
    updateusers_dataCollection(
        filter: { id: { eq: $id } }
        set: $set
        atMost: 1
    ) {
        records {
            first_name
            last_name
            location
            longitude
            latitude
        }
    }
}
"#;

/// GraphQL response envelope
#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct UserQueryData {
    #[serde(rename = "users_dataCollection")]
    collection: Option<UserConnection>,
}

#[derive(Debug, Deserialize)]
struct UserConnection {
    edges: Vec<UserEdge>,
}

#[derive(Debug, Deserialize)]
struct UserEdge {
    node: User,
}

#[derive(Debug, Deserialize)]
struct UpdateMutationData {
    #[serde(rename = "updateusers_dataCollection")]
    result: Option<UpdateResult>,
}

#[derive(Debug, Deserialize)]
struct UpdateResult {
    records: Vec<UpdatedUser>,
}

/// HTTP client for the data platform
#[derive(Debug, Clone)]
pub struct HttpDataPlatform {
    /// Base URL of the data platform project
    base_url: String,

    /// Service role key (bearer token)
    service_key: String,

    /// Value of the `apikey` header
    api_key: String,

    /// Path used by the status check
    status_path: String,

    /// HTTP client
    client: Client,
}

impl HttpDataPlatform {
    /// Create a new HttpDataPlatform
    pub fn new(config: &PlatformConfig) -> ServerResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
            api_key: config
                .anon_key
                .clone()
                .unwrap_or_else(|| config.service_key.clone()),
            status_path: config.status_path.clone(),
            client,
        })
    }

    /// GraphQL endpoint URL
    fn graphql_url(&self) -> String {
        format!("{}/graphql/v1", self.base_url)
    }

    fn status_url(&self) -> String {
        format!("{}/{}", self.base_url, self.status_path.trim_start_matches('/'))
    }

    /// Post a GraphQL document and decode its `data` member
    async fn execute_graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<T, RemoteError> {
        let response = self
            .client
            .post(self.graphql_url())
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("apikey", &self.api_key)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let envelope: GraphQlResponse<T> = response.json().await.map_err(|e| {
            TransportError::new(TransportErrorKind::Decode, format!("Invalid GraphQL response: {}", e))
        })?;

        if !envelope.errors.is_empty() {
            let detail = envelope
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            debug!(%detail, "Data platform returned GraphQL errors");
            return Err(RemoteError::rejected(Some(status.as_u16()), detail));
        }

        envelope
            .data
            .ok_or_else(|| RemoteError::rejected(Some(status.as_u16()), "GraphQL response contained no data"))
    }
}

#[async_trait]
impl DataPlatform for HttpDataPlatform {
    async fn fetch_user(&self, id: &UserId) -> Result<Option<User>, RemoteError> {
        let data: UserQueryData = self
            .execute_graphql(GET_USER_QUERY, json!({ "id": id }))
            .await?;

        Ok(data
            .collection
            .and_then(|c| c.edges.into_iter().next())
            .map(|edge| edge.node))
    }

    async fn update_user(
        &self,
        id: &UserId,
        changes: &UserUpdate,
    ) -> Result<Option<UpdatedUser>, RemoteError> {
        let data: UpdateMutationData = self
            .execute_graphql(UPDATE_USER_MUTATION, json!({ "id": id, "set": changes }))
            .await?;

        Ok(data.result.and_then(|r| r.records.into_iter().next()))
    }

    async fn status(&self) -> Result<(), ProbeError> {
        let response = self
            .client
            .get(self.status_url())
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("apikey", &self.api_key)
            .send()
            .await
            .map_err(|e| ProbeError::Dependency(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProbeError::Dependency(format!(
                "status endpoint returned {}",
                response.status()
            )))
        }
    }
}

/// Classify a reqwest failure that happened before a response was read
fn transport_error(err: reqwest::Error) -> RemoteError {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_connect() {
        TransportErrorKind::Connect
    } else {
        TransportErrorKind::Other
    };
    warn!(error = %err, %kind, "Data platform request failed");
    TransportError::new(kind, err.to_string()).into()
}

/// Throttling and gateway statuses are transient; anything else is a rejection
fn status_error(status: StatusCode, body: String) -> RemoteError {
    match status {
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => TransportError::new(
            TransportErrorKind::Unavailable,
            format!("data platform returned {}", status),
        )
        .into(),
        _ => RemoteError::rejected(Some(status.as_u16()), body),
    }
}
