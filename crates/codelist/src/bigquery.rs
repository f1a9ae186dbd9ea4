//! BigQuery v2 REST client.
//!
//! Submits a query with `jobs.query`, waits on `jobs.getQueryResults`
//! while the job is running, then follows `pageToken` until every row has
//! been read. Authentication is delegated: the bearer token comes from an
//! environment variable or the output of an external command.

use crate::error::{QueryExecutionError, TableError};
use crate::model::{COLUMNS, CodelistRow, NAME_ALIAS, ProductType, ResultTable};
use crate::query::Query;
use crate::runner::Warehouse;
use diagnostics::*;
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::process::Command;

pub const DEFAULT_ENDPOINT: &str = "https://bigquery.googleapis.com/bigquery/v2";
pub const DEFAULT_TOKEN_ENV: &str = "BIGQUERY_ACCESS_TOKEN";
const DEFAULT_POLL_TIMEOUT_MS: u32 = 10_000;

type Result<T> = std::result::Result<T, QueryExecutionError>;

/// Connection settings for the warehouse
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WarehouseConfig {
    /// Project that runs (and is billed for) the query jobs
    pub project: String,
    /// Dataset location, e.g. `EU`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// How long each request asks the server to wait for the job
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    /// Environment variable holding an access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,
    /// Command whose stdout is an access token,
    /// e.g. `[gcloud, auth, print-access-token]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_command: Option<Vec<String>>,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_poll_timeout_ms() -> u32 {
    DEFAULT_POLL_TIMEOUT_MS
}

impl WarehouseConfig {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            location: None,
            endpoint: default_endpoint(),
            poll_timeout_ms: default_poll_timeout_ms(),
            page_size: None,
            token_env: None,
            token_command: None,
        }
    }

    /// Find a token: `token_env` first, then `token_command`, then
    /// `BIGQUERY_ACCESS_TOKEN` when neither is configured.
    pub fn resolve_token(&self) -> Result<String> {
        let env_name = match (&self.token_env, &self.token_command) {
            (Some(name), _) => Some(name.as_str()),
            (None, None) => Some(DEFAULT_TOKEN_ENV),
            (None, Some(_)) => None,
        };

        if let Some(name) = env_name {
            if let Ok(token) = std::env::var(name) {
                let token = token.trim().to_string();
                if !token.is_empty() {
                    debug!("Using access token from {name}");
                    return Ok(token);
                }
            }
        }

        if let Some(command) = &self.token_command {
            return run_token_command(command);
        }

        Err(QueryExecutionError::Credentials(format!(
            "set {} or configure token_command",
            env_name.unwrap_or(DEFAULT_TOKEN_ENV)
        )))
    }
}

fn run_token_command(command: &[String]) -> Result<String> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| QueryExecutionError::Credentials("token_command is empty".to_string()))?;

    debug!("Running token command {program}", program: program.as_str());
    let output = Command::new(program).args(args).output().map_err(|e| {
        QueryExecutionError::Credentials(format!("cannot run {program}: {e}"))
    })?;

    if !output.status.success() {
        return Err(QueryExecutionError::Credentials(format!(
            "{program} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(QueryExecutionError::Credentials(format!(
            "{program} printed no token"
        )));
    }
    Ok(token)
}

/// Blocking BigQuery client
pub struct BigQueryClient {
    http_client: reqwest::blocking::Client,
    config: WarehouseConfig,
    token: OnceCell<String>,
}

impl BigQueryClient {
    /// Build the HTTP client. No request is made until the first query,
    /// so cache hits never need credentials.
    pub fn new(config: WarehouseConfig) -> Result<Self> {
        // Job duration is bounded by the server, not by the client.
        let http_client = reqwest::blocking::Client::builder()
            .timeout(None::<std::time::Duration>)
            .build()?;

        Ok(Self {
            http_client,
            config,
            token: OnceCell::new(),
        })
    }

    /// Use `token` instead of resolving one from the configuration.
    pub fn with_token(self, token: impl Into<String>) -> Self {
        Self {
            token: OnceCell::from(token.into()),
            ..self
        }
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    fn token(&self) -> Result<&str> {
        if let Some(token) = self.token.get() {
            return Ok(token);
        }
        let token = self.config.resolve_token()?;
        Ok(self.token.get_or_init(|| token))
    }

    /// `jobs.query`
    fn submit(&self, query: &Query) -> Result<QueryResponse> {
        let body = QueryRequest {
            query: query.as_str(),
            use_legacy_sql: false,
            location: self.config.location.as_deref(),
            timeout_ms: self.config.poll_timeout_ms,
            max_results: self.config.page_size,
        };
        let body = serde_json::to_string(&body)
            .map_err(|e| QueryExecutionError::Other(format!("cannot encode request: {e}")))?;

        let url = self.queries_url();
        debug!("Submitting query to {url}");
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.token()?)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()?;

        read_response(&url, response)
    }

    /// `jobs.getQueryResults`
    fn fetch_page(&self, job: &JobReference, page_token: Option<&str>) -> Result<QueryResponse> {
        let url = format!("{}/{}", self.queries_url_for(&job.project_id), job.job_id);

        let mut params: Vec<(&str, String)> =
            vec![("timeoutMs", self.config.poll_timeout_ms.to_string())];
        if let Some(location) = job.location.as_ref().or(self.config.location.as_ref()) {
            params.push(("location", location.clone()));
        }
        if let Some(page_size) = self.config.page_size {
            params.push(("maxResults", page_size.to_string()));
        }
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(self.token()?)
            .query(&params)
            .send()?;

        read_response(&url, response)
    }

    /// Fetch the same page until the job reports completion.
    fn wait_for(&self, job: &JobReference, page_token: Option<&str>) -> Result<QueryResponse> {
        loop {
            let page = self.fetch_page(job, page_token)?;
            if page.job_complete {
                return Ok(page);
            }
            debug!("Job {job_id} still running", job_id: job.job_id.as_str());
        }
    }

    fn queries_url(&self) -> String {
        self.queries_url_for(&self.config.project)
    }

    fn queries_url_for(&self, project: &str) -> String {
        format!(
            "{}/projects/{}/queries",
            self.config.endpoint.trim_end_matches('/'),
            project
        )
    }
}

impl Warehouse for BigQueryClient {
    fn execute(&self, query: &Query) -> Result<ResultTable> {
        let mut page = self.submit(query)?;
        let job = page
            .job_reference
            .clone()
            .ok_or_else(|| QueryExecutionError::Response("missing jobReference".to_string()))?;

        let job_id = job.job_id.clone();
        info!("Submitted query job {job_id}");

        if !page.job_complete {
            page = self.wait_for(&job, None)?;
        }

        let schema = page
            .schema
            .take()
            .ok_or_else(|| QueryExecutionError::Response("missing schema".to_string()))?;
        let columns = ColumnIndex::new(&schema)?;

        let mut rows = Vec::new();
        let mut pages: usize = 1;
        loop {
            for raw in page.rows.drain(..) {
                rows.push(columns.decode(rows.len(), raw)?);
            }
            match page.page_token.take() {
                Some(token) => {
                    page = self.wait_for(&job, Some(&token))?;
                    pages += 1;
                }
                None => break,
            }
        }

        let count = rows.len();
        debug!("Job {job_id} returned {count} rows in {pages} pages");
        Ok(ResultTable::new(rows))
    }
}

fn read_response(url: &str, response: reqwest::blocking::Response) -> Result<QueryResponse> {
    let status = response.status();
    let text = response.text()?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorResponse>(&text)
            .map(|e| e.error.message)
            .unwrap_or(text);
        let code = status.as_u16();
        warn!("Warehouse returned HTTP {code} for {url}");
        return Err(QueryExecutionError::Rejected {
            status: code,
            message,
        });
    }

    parse_response(&text)
}

pub(crate) fn parse_response(text: &str) -> Result<QueryResponse> {
    serde_json::from_str(text)
        .map_err(|e| QueryExecutionError::Response(format!("cannot parse response: {e}")))
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
    timeout_ms: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_results: Option<u32>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryResponse {
    #[serde(default)]
    job_reference: Option<JobReference>,
    #[serde(default)]
    job_complete: bool,
    #[serde(default)]
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<TableRow>,
    #[serde(default)]
    page_token: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    project_id: String,
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Deserialize, Debug)]
struct TableSchema {
    fields: Vec<TableField>,
}

#[derive(Deserialize, Debug)]
struct TableField {
    name: String,
}

#[derive(Deserialize, Debug)]
struct TableRow {
    f: Vec<TableCell>,
}

#[derive(Deserialize, Debug)]
struct TableCell {
    #[serde(default)]
    v: serde_json::Value,
}

#[derive(Deserialize, Debug)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    message: String,
}

/// Positions of the codelist columns in the warehouse schema
struct ColumnIndex {
    positions: [usize; 4],
    width: usize,
}

impl ColumnIndex {
    fn new(schema: &TableSchema) -> std::result::Result<Self, TableError> {
        let find = |name: &str| schema.fields.iter().position(|f| f.name == name);

        let mut positions = [0; 4];
        for (slot, name) in positions.iter_mut().zip(COLUMNS) {
            *slot = match find(name) {
                Some(i) => i,
                None if name == "name" => {
                    find(NAME_ALIAS).ok_or_else(|| TableError::MissingColumn(name.to_string()))?
                }
                None => return Err(TableError::MissingColumn(name.to_string())),
            };
        }

        Ok(Self {
            positions,
            width: schema.fields.len(),
        })
    }

    fn decode(&self, row: usize, raw: TableRow) -> std::result::Result<CodelistRow, TableError> {
        if raw.f.len() != self.width {
            return Err(TableError::RowWidth {
                row,
                expected: self.width,
                found: raw.f.len(),
            });
        }

        let [type_at, id_at, code_at, name_at] = self.positions;
        let text = |i: usize| match &raw.f[i].v {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        let value = text(type_at);
        let product_type = value
            .parse::<ProductType>()
            .map_err(|value| TableError::UnknownProductType { row, value })?;

        Ok(CodelistRow {
            product_type,
            id: text(id_at),
            bnf_code: text(code_at),
            name: text(name_at),
        })
    }
}
