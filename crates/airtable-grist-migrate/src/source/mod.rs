//! Airtable source API operations.

mod types;

pub use types::*;

use crate::error::{MigrateError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Default Airtable REST endpoint.
pub const AIRTABLE_API_URL: &str = "https://api.airtable.com/v0";

/// Largest page the records endpoint will return.
pub const MAX_PAGE_SIZE: usize = 100;

/// Error type Airtable reports for bases and tables the token cannot see.
const MODEL_NOT_FOUND: &str = "INVALID_PERMISSIONS_OR_MODEL_NOT_FOUND";

/// Trait for source API operations.
#[async_trait]
pub trait SourceApi: Send + Sync {
    /// List all bases the token can access.
    async fn list_containers(&self) -> Result<Vec<Base>>;

    /// List the tables of a base, including their fields.
    async fn list_tables(&self, base_id: &str) -> Result<Vec<TableDescriptor>>;

    /// Fetch a single page of records.
    async fn list_records(
        &self,
        base_id: &str,
        table_id: &str,
        options: ListRecordsOptions,
    ) -> Result<RecordPage>;

    /// Page size used by [`SourceApi::list_all_records`].
    fn page_size(&self) -> usize {
        MAX_PAGE_SIZE
    }

    /// Fetch the full schema of one table.
    async fn get_table_schema(&self, base_id: &str, table_id: &str) -> Result<TableDescriptor> {
        self.list_tables(base_id)
            .await?
            .into_iter()
            .find(|t| t.id == table_id)
            .ok_or_else(|| {
                MigrateError::NotFound(format!("table {} in base {}", table_id, base_id))
            })
    }

    /// Fetch every record of a table, following the cursor until the
    /// server stops returning one. Pages are concatenated in server order.
    async fn list_all_records(&self, base_id: &str, table_id: &str) -> Result<Vec<Record>> {
        let page_size = self.page_size();
        let mut records = Vec::new();
        let mut offset = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .list_records(base_id, table_id, ListRecordsOptions::page(page_size, offset))
                .await?;
            pages += 1;
            records.extend(page.records);

            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        debug!(
            "{}: fetched {} records in {} pages",
            table_id,
            records.len(),
            pages
        );
        Ok(records)
    }

    /// True iff the token can list bases. Errors are swallowed here only.
    async fn validate_credentials(&self) -> bool {
        match self.list_containers().await {
            Ok(_) => true,
            Err(e) => {
                debug!("Airtable credential check failed: {}", e);
                false
            }
        }
    }
}

/// Airtable REST client.
#[derive(Clone)]
pub struct AirtableClient {
    client: Client,
    base_url: String,
    token: String,
    page_size: usize,
}

impl std::fmt::Debug for AirtableClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AirtableClient")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl AirtableClient {
    /// Create a client for the public Airtable API.
    pub fn new(token: &str) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(MigrateError::Config("Airtable API token is required".into()));
        }
        Ok(Self {
            client: Client::new(),
            base_url: AIRTABLE_API_URL.to_string(),
            token: token.to_string(),
            page_size: MAX_PAGE_SIZE,
        })
    }

    /// Point the client at a different endpoint (proxies, tests).
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim().trim_end_matches('/').to_string();
        self
    }

    /// Override the page size used when fetching all records.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        debug!("GET {}", url);
        self.client
            .get(url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = request.send().await?;
        let response = check_status(response, what).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Map a non-2xx response onto the error kinds callers distinguish.
async fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED => Err(MigrateError::Auth(format!(
            "Airtable rejected the token ({})",
            status
        ))),
        StatusCode::NOT_FOUND => Err(MigrateError::NotFound(what.to_string())),
        StatusCode::FORBIDDEN if body.contains(MODEL_NOT_FOUND) => {
            Err(MigrateError::NotFound(what.to_string()))
        }
        StatusCode::FORBIDDEN => Err(MigrateError::Auth(format!(
            "Airtable token lacks permission for {} ({})",
            what, status
        ))),
        _ => Err(MigrateError::remote(status, body)),
    }
}

#[async_trait]
impl SourceApi for AirtableClient {
    async fn list_containers(&self) -> Result<Vec<Base>> {
        let mut bases = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut request = self.get("meta/bases");
            if let Some(ref cursor) = offset {
                request = request.query(&[("offset", cursor)]);
            }
            let page: BasesResponse = self.send(request, "bases").await?;
            bases.extend(page.bases);

            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(bases)
    }

    async fn list_tables(&self, base_id: &str) -> Result<Vec<TableDescriptor>> {
        if base_id.trim().is_empty() {
            return Err(MigrateError::Validation("base id is required".into()));
        }
        let request = self.get(&format!("meta/bases/{}/tables", base_id));
        let response: TablesResponse = self.send(request, &format!("base {}", base_id)).await?;
        Ok(response.tables)
    }

    async fn list_records(
        &self,
        base_id: &str,
        table_id: &str,
        options: ListRecordsOptions,
    ) -> Result<RecordPage> {
        if base_id.trim().is_empty() || table_id.trim().is_empty() {
            return Err(MigrateError::Validation(
                "base id and table id are required".into(),
            ));
        }
        let request = self
            .get(&format!("{}/{}", base_id, table_id))
            .query(&options.query_pairs());
        self.send(request, &format!("table {} in base {}", table_id, base_id))
            .await
    }

    fn page_size(&self) -> usize {
        self.page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_blank_token() {
        assert!(matches!(
            AirtableClient::new("   "),
            Err(MigrateError::Config(_))
        ));
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = AirtableClient::new(" patSECRET ").unwrap();
        let debug_output = format!("{:?}", client);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("patSECRET"));
    }

    #[test]
    fn test_builder_normalizes_url_and_page_size() {
        let client = AirtableClient::new("pat")
            .unwrap()
            .with_base_url("http://localhost:8080/v0/")
            .with_page_size(500);
        assert_eq!(client.base_url, "http://localhost:8080/v0");
        assert_eq!(client.page_size(), MAX_PAGE_SIZE);
    }
}
