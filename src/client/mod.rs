use std::time::Duration;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use reqwest::{Method, StatusCode, Url};
use thiserror::Error;
use tracing::{debug, trace};

use crate::model::{IndexStatus, ModelError, Row, SearchHit, TableName};

/// Upper bound the backend applies to `/table/{name}?limit=`.
pub const MAX_TABLE_LIMIT: usize = 500;
pub const DEFAULT_TABLE_LIMIT: usize = 100;

/// Query the backend treats as "match everything".
pub const MATCH_ALL: &str = "*:*";

#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub base_url: String,
    pub timeout_seconds: usize,
    pub proxy: Option<String>,
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/".to_string(),
            timeout_seconds: 10,
            proxy: None,
            user_agent: format!("freqctl/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid base URL '{url}': {message}")]
    InvalidBaseUrl { url: String, message: String },

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("not found: {url}")]
    NotFound { url: String },

    #[error("{url} answered {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("refusing to send an empty row to table {table}")]
    EmptyRow { table: String },

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Row count (or failure) for one table of a multi-table listing.
#[derive(Debug)]
pub struct TableSummary {
    pub table: TableName,
    pub rows: Result<usize, ClientError>,
}

/// Thin async wrapper around the backend's search, index and table API.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let invalid = |message: String| ClientError::InvalidBaseUrl {
        url: raw.to_string(),
        message,
    };
    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("URL cannot be used as a base".to_string()));
    }
    Ok(url)
}

fn build_http_client(options: &ClientOptions) -> Result<reqwest::Client, ClientError> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/json"),
    );

    let timeout = Duration::from_secs(options.timeout_seconds.try_into().unwrap_or(10));
    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .user_agent(options.user_agent.clone())
        .timeout(timeout);

    if let Some(proxy) = options.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
        let proxy = reqwest::Proxy::all(proxy).map_err(|e| ClientError::ProxySetup {
            proxy: proxy.to_string(),
            source: e,
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| ClientError::HttpClientBuild { source: e })
}

impl ApiClient {
    pub fn new(options: &ClientOptions) -> Result<Self, ClientError> {
        let base = parse_base_url(&options.base_url)?;
        let http = build_http_client(options)?;
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// Appends path segments to the base URL, percent-encoding each one.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidBaseUrl {
                url: self.base.to_string(),
                message: "URL cannot be used as a base".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&Row>,
    ) -> Result<reqwest::Response, ClientError> {
        debug!(%method, %url, "sending request");
        let mut request = self.http.request(method, url.clone());
        if let Some(row) = body {
            request = request.json(row);
        }
        let response = request.send().await.map_err(|e| ClientError::Request {
            url: url.to_string(),
            source: e,
        })?;

        let status = response.status();
        trace!(%url, status = status.as_u16(), "response received");
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }
        Ok(response)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        let label = url.to_string();
        let response = self.send(Method::GET, url, None).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode {
                url: label,
                source: e,
            })
    }

    /// Runs a structured query. A blank query matches everything.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ClientError> {
        let query = query.trim();
        let query = if query.is_empty() { MATCH_ALL } else { query };
        let mut url = self.endpoint(&["search"])?;
        url.query_pairs_mut().append_pair("q", query);
        self.get_json(url).await
    }

    pub async fn trigger_reindex(&self) -> Result<(), ClientError> {
        let url = self.endpoint(&["api", "index", "reindex"])?;
        self.send(Method::POST, url, None).await?;
        Ok(())
    }

    pub async fn index_progress(&self) -> Result<IndexStatus, ClientError> {
        let url = self.endpoint(&["api", "index-progress"])?;
        self.get_json(url).await
    }

    /// Lists up to `limit` rows; the limit is clamped to what the backend allows.
    pub async fn list_table(
        &self,
        table: TableName,
        limit: usize,
    ) -> Result<Vec<Row>, ClientError> {
        let limit = limit.clamp(1, MAX_TABLE_LIMIT);
        let mut url = self.endpoint(&["table", table.alias()])?;
        url.query_pairs_mut().append_pair("limit", &limit.to_string());
        self.get_json(url).await
    }

    pub async fn get_row(&self, table: TableName, id: &str) -> Result<Row, ClientError> {
        let url = self.endpoint(&["row", table.alias(), id.trim()])?;
        self.get_json(url).await
    }

    pub async fn create_row(&self, table: TableName, row: &Row) -> Result<(), ClientError> {
        if row.is_empty() {
            return Err(ClientError::EmptyRow {
                table: table.to_string(),
            });
        }
        let url = self.endpoint(&["row", table.alias()])?;
        self.send(Method::POST, url, Some(row)).await?;
        Ok(())
    }

    pub async fn update_row(
        &self,
        table: TableName,
        id: &str,
        row: &Row,
    ) -> Result<(), ClientError> {
        if row.is_empty() {
            return Err(ClientError::EmptyRow {
                table: table.to_string(),
            });
        }
        let url = self.endpoint(&["row", table.alias(), id.trim()])?;
        self.send(Method::PUT, url, Some(row)).await?;
        Ok(())
    }

    pub async fn delete_row(&self, table: TableName, id: &str) -> Result<(), ClientError> {
        let url = self.endpoint(&["row", table.alias(), id.trim()])?;
        self.send(Method::DELETE, url, None).await?;
        Ok(())
    }

    /// Lists several tables concurrently and reports their row counts in
    /// the order the tables were given.
    pub async fn table_summaries(&self, tables: &[TableName], limit: usize) -> Vec<TableSummary> {
        let mut pending = tables
            .iter()
            .enumerate()
            .map(|(idx, table)| async move {
                let rows = self.list_table(*table, limit).await.map(|rows| rows.len());
                (idx, *table, rows)
            })
            .collect::<FuturesUnordered<_>>();

        let mut done = Vec::with_capacity(tables.len());
        while let Some(item) = pending.next().await {
            done.push(item);
        }
        done.sort_by_key(|(idx, _, _)| *idx);
        done.into_iter()
            .map(|(_, table, rows)| TableSummary { table, rows })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(&ClientOptions {
            base_url: base.to_string(),
            ..ClientOptions::default()
        })
        .unwrap()
    }

    #[test]
    fn endpoint_keeps_base_path_and_encodes_segments() {
        let c = client("http://backend.local/app/");
        let url = c.endpoint(&["row", "server", "a b/c"]).unwrap();
        assert_eq!(url.as_str(), "http://backend.local/app/row/server/a%20b%2Fc");

        let c = client("http://backend.local");
        let url = c.endpoint(&["api", "index-progress"]).unwrap();
        assert_eq!(url.as_str(), "http://backend.local/api/index-progress");
    }

    #[test]
    fn rejects_unusable_base_urls() {
        for raw in ["not a url", "ftp://backend.local/", "mailto:ops@example.com"] {
            let err = ApiClient::new(&ClientOptions {
                base_url: raw.to_string(),
                ..ClientOptions::default()
            })
            .unwrap_err();
            assert!(matches!(err, ClientError::InvalidBaseUrl { .. }), "{raw}");
        }
    }

    #[test]
    fn rejects_bad_proxy() {
        let err = ApiClient::new(&ClientOptions {
            proxy: Some("::not a proxy::".to_string()),
            ..ClientOptions::default()
        })
        .unwrap_err();
        assert!(matches!(err, ClientError::ProxySetup { .. }));
    }
}
