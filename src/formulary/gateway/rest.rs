//! Blocking HTTP gateway for a PostgREST-style hosted backend.
//!
//! Table access goes through `{url}/rest/v1/...`, identity through
//! `{url}/auth/v1/...`. Every request carries the project's public `apikey`
//! and a bearer token: the signed-in user's access token when there is one,
//! otherwise the api key itself.

use super::{AuthGateway, DrugPage, Gateway, ListQuery, RowRange, StatusChange, SEARCH_COLUMNS};
use crate::config::FormularyConfig;
use crate::error::{FormularyError, Result};
use crate::model::{DrugDraft, DrugRecord, StatusMode};
use crate::session::{Identity, Session};
use chrono::{Duration, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use uuid::Uuid;

const RESERVED: [char; 7] = [',', '.', ':', '(', ')', '"', '\\'];

/// Quote a filter value for use inside `or=(...)` when it holds reserved characters.
pub fn quote_value(value: &str) -> String {
    if value.chars().any(|c| RESERVED.contains(&c) || c.is_whitespace()) {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{}\"", escaped)
    } else {
        value.to_string()
    }
}

/// Query-string pairs for a listing.
pub fn list_params(query: &ListQuery) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];

    match query.status {
        StatusMode::Active => {
            params.push(("is_active".into(), "eq.true".into()));
            params.push(("order".into(), "drug_code.asc".into()));
        }
        StatusMode::Decommissioned => {
            params.push(("is_active".into(), "eq.false".into()));
            params.push(("remarks".into(), "not.is.null".into()));
            params.push(("order".into(), "decommissioned_at.desc".into()));
        }
    }

    if let Some(category) = query.category.as_option() {
        params.push(("category".into(), format!("eq.{}", category)));
    }

    if let Some(pattern) = &query.search {
        let value = quote_value(pattern.as_str());
        let clauses: Vec<String> = SEARCH_COLUMNS
            .iter()
            .map(|column| format!("{}.ilike.{}", column, value))
            .collect();
        params.push(("or".into(), format!("({})", clauses.join(","))));
    }

    params
}

pub fn range_header(range: RowRange) -> String {
    format!("{}-{}", range.from, range.to)
}

/// Total from a `Content-Range: 0-19/45` (or `*/0`) header.
pub fn parse_content_range(value: &str) -> Option<usize> {
    let (_, total) = value.split_once('/')?;
    total.trim().parse().ok()
}

fn content_range_total(headers: &HeaderMap) -> Option<usize> {
    headers
        .get("content-range")
        .and_then(|v| v.to_str().ok())
        .and_then(parse_content_range)
}

/// Past the last row the backend answers 416 but still reports the total.
fn out_of_range_page(status: StatusCode, headers: &HeaderMap) -> Option<DrugPage> {
    (status == StatusCode::RANGE_NOT_SATISFIABLE).then(|| DrugPage {
        records: Vec::new(),
        total_count: content_range_total(headers).unwrap_or(0),
    })
}

/// Without a `Content-Range` total the page is all there is.
fn listing_page(headers: &HeaderMap, records: Vec<DrugRecord>) -> DrugPage {
    let total_count = content_range_total(headers).unwrap_or(records.len());
    DrugPage {
        records,
        total_count,
    }
}

/// Pull a readable message out of an error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(String::from))
        })
        .unwrap_or_else(|| body.trim().to_string())
}

fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(FormularyError::Gateway {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Connection shared by the table gateway and the auth gateway.
#[derive(Clone)]
pub struct RestClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl RestClient {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(concat!("formulary/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(config: &FormularyConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                FormularyError::Config("No backend url set. Run `formulary config url <url>`.".into())
            })?;
        let api_key = config.api_key.as_deref().ok_or_else(|| {
            FormularyError::Config("No api key set. Run `formulary config api-key <key>`.".into())
        })?;
        Self::new(url, api_key, config.timeout_secs)
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.api_key)
            .bearer_auth(token.unwrap_or(&self.api_key))
    }
}

pub struct RestGateway {
    client: RestClient,
    table: String,
    categories_rpc: String,
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct CategoryRow {
    category: Option<String>,
}

impl RestGateway {
    pub fn new(client: RestClient, config: &FormularyConfig) -> Self {
        Self {
            client,
            table: config.table.clone(),
            categories_rpc: config.categories_rpc.clone(),
            access_token: None,
        }
    }

    /// Act as the signed-in user so row-level policies apply to them.
    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token;
        self
    }

    fn table_path(&self) -> String {
        format!("/rest/v1/{}", self.table)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, path, self.access_token.as_deref())
    }

    /// PATCH by id, treating an empty representation as a missing row.
    fn patch_by_id<T: serde::Serialize + ?Sized>(&self, id: Uuid, body: &T) -> Result<()> {
        let resp = self
            .request(Method::PATCH, &self.table_path())
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(body)
            .send()?;
        let updated: Vec<DrugRecord> = check(resp)?.json()?;
        if updated.is_empty() {
            return Err(FormularyError::DrugNotFound(id));
        }
        Ok(())
    }
}

impl Gateway for RestGateway {
    fn select_drugs(&self, query: &ListQuery) -> Result<DrugPage> {
        let params = list_params(query);
        tracing::debug!(table = %self.table, ?params, range = %range_header(query.range), "select drugs");

        let resp = self
            .request(Method::GET, &self.table_path())
            .query(&params)
            .header("Range-Unit", "items")
            .header("Range", range_header(query.range))
            .header("Prefer", "count=exact")
            .send()?;

        if let Some(page) = out_of_range_page(resp.status(), resp.headers()) {
            return Ok(page);
        }

        let resp = check(resp)?;
        let headers = resp.headers().clone();
        let records: Vec<DrugRecord> = resp.json()?;
        Ok(listing_page(&headers, records))
    }

    fn get_drug(&self, id: Uuid) -> Result<DrugRecord> {
        let resp = self
            .request(Method::GET, &self.table_path())
            .query(&[("select", "*".to_string()), ("id", format!("eq.{}", id))])
            .send()?;
        let rows: Vec<DrugRecord> = check(resp)?.json()?;
        rows.into_iter()
            .next()
            .ok_or(FormularyError::DrugNotFound(id))
    }

    fn insert_drug(&mut self, draft: &DrugDraft) -> Result<()> {
        let resp = self
            .request(Method::POST, &self.table_path())
            .header("Prefer", "return=minimal")
            .json(&[draft])
            .send()?;
        check(resp)?;
        Ok(())
    }

    fn update_drug(&mut self, id: Uuid, draft: &DrugDraft) -> Result<()> {
        self.patch_by_id(id, draft)
    }

    fn upsert_drugs(&mut self, drafts: &[DrugDraft]) -> Result<()> {
        let resp = self
            .request(Method::POST, &self.table_path())
            .query(&[("on_conflict", "drug_code")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(drafts)
            .send()?;
        check(resp)?;
        Ok(())
    }

    fn update_status(&mut self, id: Uuid, change: &StatusChange) -> Result<()> {
        self.patch_by_id(id, change)
    }

    fn unique_categories(&self, status: StatusMode) -> Result<Vec<String>> {
        let resp = self
            .request(Method::POST, &format!("/rest/v1/rpc/{}", self.categories_rpc))
            .json(&serde_json::json!({ "status_filter": status.to_string() }))
            .send()?;
        let rows: Vec<CategoryRow> = check(resp)?.json()?;
        Ok(rows.into_iter().filter_map(|r| r.category).collect())
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: UserResponse,
}

#[derive(Deserialize)]
struct UserResponse {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

impl From<UserResponse> for Identity {
    fn from(user: UserResponse) -> Self {
        Identity {
            id: user.id,
            email: user.email.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct RoleRow {
    role: Option<String>,
}

/// Password-grant identity service.
///
/// Holds the session it issued (or was handed from disk) so that
/// `current_session` can validate it against the backend.
pub struct RestAuth {
    client: RestClient,
    profiles_table: String,
    session: Option<Session>,
}

impl RestAuth {
    pub fn new(client: RestClient, config: &FormularyConfig) -> Self {
        Self {
            client,
            profiles_table: config.profiles_table.clone(),
            session: None,
        }
    }

    pub fn with_session(mut self, session: Option<Session>) -> Self {
        self.session = session;
        self
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }
}

impl AuthGateway for RestAuth {
    fn current_session(&self) -> Result<Option<Session>> {
        let Some(session) = &self.session else {
            return Ok(None);
        };
        if session.is_expired(Utc::now()) {
            return Ok(None);
        }

        let resp = self
            .client
            .request(Method::GET, "/auth/v1/user", Some(&session.access_token))
            .send()?;
        if matches!(resp.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Ok(None);
        }
        let user: UserResponse = check(resp)?.json()?;
        Ok(Some(Session {
            user: user.into(),
            ..session.clone()
        }))
    }

    fn sign_in(&mut self, email: &str, password: &str) -> Result<Session> {
        let resp = self
            .client
            .request(Method::POST, "/auth/v1/token", None)
            .query(&[("grant_type", "password")])
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(FormularyError::Auth(error_message(&body)));
        }

        let token: TokenResponse = resp.json()?;
        let session = Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
            user: token.user.into(),
        };
        self.session = Some(session.clone());
        Ok(session)
    }

    fn sign_out(&mut self, session: &Session) -> Result<()> {
        // Forget locally first; the remote call is best effort.
        self.session = None;
        let resp = self
            .client
            .request(Method::POST, "/auth/v1/logout", Some(&session.access_token))
            .send()?;
        check(resp)?;
        Ok(())
    }

    fn fetch_role(&self, user_id: Uuid) -> Result<Option<String>> {
        let token = self.session.as_ref().map(|s| s.access_token.as_str());
        let resp = self
            .client
            .request(Method::GET, &format!("/rest/v1/{}", self.profiles_table), token)
            .query(&[("select", "role".to_string()), ("id", format!("eq.{}", user_id))])
            .send()?;
        let rows: Vec<RoleRow> = check(resp)?.json()?;
        Ok(rows.into_iter().next().and_then(|r| r.role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::SearchPattern;
    use crate::model::CategoryFilter;
    use reqwest::header::HeaderValue;

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn active_listing_params() {
        let query = ListQuery {
            status: StatusMode::Active,
            category: CategoryFilter::any(),
            search: None,
            range: RowRange::for_page(1, 20).unwrap(),
        };
        let params = list_params(&query);
        assert_eq!(param(&params, "is_active"), Some("eq.true"));
        assert_eq!(param(&params, "order"), Some("drug_code.asc"));
        assert_eq!(param(&params, "remarks"), None);
        assert_eq!(param(&params, "category"), None);
        assert_eq!(param(&params, "or"), None);
    }

    #[test]
    fn decommissioned_listing_params() {
        let query = ListQuery {
            status: StatusMode::Decommissioned,
            category: CategoryFilter::exact("Analgesic"),
            search: SearchPattern::new(" Para "),
            range: RowRange::for_page(3, 20).unwrap(),
        };
        let params = list_params(&query);
        assert_eq!(param(&params, "is_active"), Some("eq.false"));
        assert_eq!(param(&params, "remarks"), Some("not.is.null"));
        assert_eq!(param(&params, "order"), Some("decommissioned_at.desc"));
        assert_eq!(param(&params, "category"), Some("eq.Analgesic"));
        assert_eq!(
            param(&params, "or"),
            Some("(trade_name.ilike.%Para%,generic_name.ilike.%Para%,drug_code.ilike.%Para%,remarks.ilike.%Para%)")
        );
        assert_eq!(range_header(query.range), "40-59");
    }

    #[test]
    fn search_values_with_reserved_characters_are_quoted() {
        assert_eq!(quote_value("%abc%"), "%abc%");
        assert_eq!(quote_value("%0.5 mg%"), "\"%0.5 mg%\"");
        assert_eq!(quote_value("%a,b%"), "\"%a,b%\"");
        assert_eq!(quote_value("%say \"hi\"%"), "\"%say \\\"hi\\\"%\"");
    }

    #[test]
    fn content_range_parsing() {
        assert_eq!(parse_content_range("0-19/45"), Some(45));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("0-19/*"), None);
        assert_eq!(parse_content_range("garbage"), None);
    }

    fn headers(content_range: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("content-range", HeaderValue::from_static(content_range));
        headers
    }

    #[test]
    fn range_past_the_end_is_an_empty_page_with_total() {
        let page = out_of_range_page(StatusCode::RANGE_NOT_SATISFIABLE, &headers("*/45")).unwrap();
        assert!(page.records.is_empty());
        assert_eq!(page.total_count, 45);

        let page = out_of_range_page(StatusCode::RANGE_NOT_SATISFIABLE, &HeaderMap::new()).unwrap();
        assert_eq!(page.total_count, 0);

        assert!(out_of_range_page(StatusCode::OK, &headers("0-19/45")).is_none());
        assert!(out_of_range_page(StatusCode::PARTIAL_CONTENT, &headers("0-19/45")).is_none());
        assert!(out_of_range_page(StatusCode::INTERNAL_SERVER_ERROR, &HeaderMap::new()).is_none());
    }

    #[test]
    fn listing_page_takes_total_from_header() {
        let record = DrugRecord {
            id: Uuid::new_v4(),
            drug_code: "PARA500".into(),
            trade_name: "Tylenol".into(),
            generic_name: "Paracetamol".into(),
            category: "Analgesic".into(),
            is_active: true,
            remarks: None,
            decommissioned_at: None,
        };

        let page = listing_page(&headers("40-44/45"), vec![record.clone()]);
        assert_eq!(page.total_count, 45);
        assert_eq!(page.records.len(), 1);

        let page = listing_page(&HeaderMap::new(), vec![record.clone(), record]);
        assert_eq!(page.total_count, 2);
    }

    #[test]
    fn error_message_prefers_json_fields() {
        assert_eq!(
            error_message(r#"{"code":"23505","message":"duplicate key"}"#),
            "duplicate key"
        );
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(error_message("  Bad Gateway \n"), "Bad Gateway");
    }

    #[test]
    fn client_requires_url_and_key() {
        let config = FormularyConfig::default();
        assert!(matches!(
            RestClient::from_config(&config),
            Err(FormularyError::Config(_))
        ));

        let config = FormularyConfig {
            url: Some("https://formulary.example.co".into()),
            ..FormularyConfig::default()
        };
        assert!(matches!(
            RestClient::from_config(&config),
            Err(FormularyError::Config(_))
        ));
    }
}
