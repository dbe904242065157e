//! Grist destination API operations.

mod types;

pub use types::*;

use crate::error::{MigrateError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

/// Trait for destination API operations.
#[async_trait]
pub trait TargetApi: Send + Sync {
    /// List the organizations visible to the API key.
    async fn list_organizations(&self) -> Result<Vec<Org>>;

    /// List the workspaces of an organization.
    async fn list_workspaces(&self, org_id: i64) -> Result<Vec<Workspace>>;

    /// Create an empty document and return its id.
    async fn create_document(&self, workspace_id: i64, name: &str) -> Result<String>;

    /// Create tables in a document. The returned ids follow input order.
    async fn create_tables(&self, document_id: &str, tables: &[TableSchema]) -> Result<Vec<String>>;

    /// Append records to a table. Callers are responsible for batching.
    async fn insert_records(
        &self,
        document_id: &str,
        table_id: &str,
        records: &[Map<String, Value>],
    ) -> Result<()>;

    /// True iff listing organizations succeeds. Errors are swallowed here only.
    async fn validate_credentials(&self) -> bool {
        match self.list_organizations().await {
            Ok(_) => true,
            Err(e) => {
                debug!("Grist credential check failed: {}", e);
                false
            }
        }
    }
}

/// Check a Grist url/key pair without keeping a client around.
pub async fn validate_credentials(api_url: &str, token: &str) -> bool {
    match GristClient::new(api_url, token) {
        Ok(client) => TargetApi::validate_credentials(&client).await,
        Err(e) => {
            debug!("Grist credential check failed: {}", e);
            false
        }
    }
}

/// Pull the document id out of a Grist document url such as
/// `https://docs.getgrist.com/doc/abc123`.
pub fn extract_document_id(url: &str) -> Result<String> {
    let (_, rest) = url.split_once("/doc/").ok_or_else(|| {
        MigrateError::Validation(format!(
            "invalid Grist document url '{}', expected https://docs.getgrist.com/doc/DOC_ID",
            url
        ))
    })?;

    let id: String = rest
        .chars()
        .take_while(|c| *c != '/' && *c != '?' && *c != '#')
        .collect();
    if id.is_empty() {
        return Err(MigrateError::Validation(format!(
            "invalid Grist document url '{}': missing document id",
            url
        )));
    }
    Ok(id)
}

/// Grist REST client.
#[derive(Clone)]
pub struct GristClient {
    client: Client,
    api_url: String,
    token: String,
}

impl std::fmt::Debug for GristClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GristClient")
            .field("api_url", &self.api_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl GristClient {
    /// Create a client for the Grist server at `api_url`.
    pub fn new(api_url: &str, token: &str) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(MigrateError::Config("Grist API token is required".into()));
        }
        let api_url = api_url.trim().trim_end_matches('/');
        if api_url.is_empty() {
            return Err(MigrateError::Config("Grist API URL is required".into()));
        }
        Ok(Self {
            client: Client::new(),
            api_url: api_url.to_string(),
            token: token.to_string(),
        })
    }

    /// Server url with any trailing slash removed.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let url = format!("{}/api/{}", self.api_url, path);
        debug!("{} {}", method, url);
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = check_status(request.send().await?).await?;
        Ok(response.json::<T>().await?)
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED => Err(MigrateError::Auth(format!(
            "Grist rejected the API key ({})",
            status
        ))),
        _ => Err(MigrateError::remote(status, body)),
    }
}

/// Document creation answers with a bare JSON string; accept `{ "id": .. }`
/// as well.
fn document_id_from(value: Value) -> Result<String> {
    match value {
        Value::String(id) => Ok(id),
        Value::Object(mut map) => match map.remove("id") {
            Some(Value::String(id)) => Ok(id),
            _ => Err(malformed_document_response(Value::Object(map))),
        },
        other => Err(malformed_document_response(other)),
    }
}

/// The request succeeded but the body carries no document id.
fn malformed_document_response(body: Value) -> MigrateError {
    MigrateError::Remote {
        status: 200,
        status_text: "document creation response has no id".into(),
        body: body.to_string(),
    }
}

#[async_trait]
impl TargetApi for GristClient {
    async fn list_organizations(&self) -> Result<Vec<Org>> {
        self.send(self.request(reqwest::Method::GET, "orgs")).await
    }

    async fn list_workspaces(&self, org_id: i64) -> Result<Vec<Workspace>> {
        self.send(self.request(
            reqwest::Method::GET,
            &format!("orgs/{}/workspaces", org_id),
        ))
        .await
    }

    async fn create_document(&self, workspace_id: i64, name: &str) -> Result<String> {
        let request = self
            .request(
                reqwest::Method::POST,
                &format!("workspaces/{}/docs", workspace_id),
            )
            .json(&serde_json::json!({ "name": name }));
        let value: Value = self.send(request).await?;
        document_id_from(value)
    }

    async fn create_tables(&self, document_id: &str, tables: &[TableSchema]) -> Result<Vec<String>> {
        let request = self
            .request(
                reqwest::Method::POST,
                &format!("docs/{}/tables", document_id),
            )
            .json(&CreateTablesRequest { tables });
        let response: CreateTablesResponse = self.send(request).await?;

        // Partial creation is never passed on as success.
        if response.tables.len() != tables.len() {
            return Err(MigrateError::Remote {
                status: StatusCode::OK.as_u16(),
                status_text: "Partial table creation".into(),
                body: format!(
                    "requested {} tables, server returned {} ids",
                    tables.len(),
                    response.tables.len()
                ),
            });
        }

        Ok(response.tables.into_iter().map(|t| t.id).collect())
    }

    async fn insert_records(
        &self,
        document_id: &str,
        table_id: &str,
        records: &[Map<String, Value>],
    ) -> Result<()> {
        let body = InsertRecordsRequest {
            records: records.iter().map(|fields| RecordFields { fields }).collect(),
        };
        let request = self
            .request(
                reqwest::Method::POST,
                &format!("docs/{}/tables/{}/records", document_id, table_id),
            )
            .json(&body);
        let _: Value = self.send(request).await?;
        Ok(())
    }
}
