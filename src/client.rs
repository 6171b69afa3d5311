//! HTTP client for the Google Flights results page

use crate::cookies::{cookie_header, CookieMap};
use crate::protobuf::FilterToken;
use crate::FlightError;
use reqwest::header::{ACCEPT_LANGUAGE, COOKIE, USER_AGENT};
use reqwest::{Client, Request, StatusCode};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

pub const SEARCH_ENDPOINT: &str = "https://www.google.com/travel/flights";

/// `tfu` value asking for all flights and prices instead of a summary.
const SHOW_ALL_CONDITION: &str = "EgQIABABIgA";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) \
    Chrome/123.0.0.0 Safari/537.36 OPR/109.0.0.0";

/// Transport settings for [`FlightClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub user_agent: String,
    /// Whole-request timeout, connect included.
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: None,
            connect_timeout: None,
        }
    }
}

/// Everything needed for one page fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub token: FilterToken,
    pub currency: Option<String>,
    pub language: Option<String>,
    pub max_stops: Option<u32>,
    pub cookies: Option<CookieMap>,
}

impl FetchRequest {
    pub fn new(token: FilterToken) -> Self {
        Self {
            token,
            currency: None,
            language: None,
            max_stops: None,
            cookies: None,
        }
    }

    /// Query string pairs. Unset options are left out entirely.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("tfs", self.token.to_base64())];
        if let Some(language) = &self.language {
            params.push(("hl", language.clone()));
        }
        params.push(("tfu", SHOW_ALL_CONDITION.to_string()));
        if let Some(currency) = &self.currency {
            params.push(("curr", currency.clone()));
        }
        if let Some(max_stops) = self.max_stops {
            params.push(("max_stops", max_stops.to_string()));
        }
        params
    }
}

/// Raw results page as returned by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub status: u16,
    pub body: String,
}

impl RawDocument {
    pub fn from_html(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK.as_u16(),
            body: body.into(),
        }
    }

    pub fn html(&self) -> &str {
        &self.body
    }
}

/// Main flight client for making requests to Google Flights
pub struct FlightClient {
    http_client: Client,
    user_agent: String,
}

impl FlightClient {
    pub fn new(config: ClientConfig) -> Result<Self, FlightError> {
        debug!(?config, "Creating new flight client");
        let mut builder = Client::builder().user_agent(config.user_agent.as_str());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(connect_timeout) = config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        let http_client = builder.build()?;

        debug!("Flight client created successfully");
        Ok(Self {
            http_client,
            user_agent: config.user_agent,
        })
    }

    /// Build the GET for one results page with every header set on the
    /// request itself, so what is built is exactly what goes on the wire.
    pub fn build_request(&self, request: &FetchRequest) -> Result<Request, FlightError> {
        let mut builder = self
            .http_client
            .get(SEARCH_ENDPOINT)
            .query(&request.query_params())
            .header(USER_AGENT, self.user_agent.as_str())
            .header(ACCEPT_LANGUAGE, "en");

        if let Some(header) = request.cookies.as_ref().and_then(cookie_header) {
            builder = builder.header(COOKIE, header);
        }

        Ok(builder.build()?)
    }

    /// Fetch one results page. Does not look at the body beyond the status.
    #[instrument(level = "info", skip(self, request))]
    pub async fn fetch_page(&self, request: &FetchRequest) -> Result<RawDocument, FlightError> {
        let http_request = self.build_request(request)?;

        info!(tfs = %request.token, "Making HTTP request to Google Flights");
        let start_time = std::time::Instant::now();
        let response = self.http_client.execute(http_request).await?;
        let status = response.status();
        let html = response.text().await?;

        info!(
            status = %status,
            duration_ms = start_time.elapsed().as_millis(),
            html_length = html.len(),
            "HTTP request completed"
        );

        check_status(status, html)
    }
}

fn check_status(status: StatusCode, body: String) -> Result<RawDocument, FlightError> {
    if status.is_client_error() || status.is_server_error() {
        error!(status = %status, "HTTP request failed");
        return Err(FlightError::FetchError {
            status: status.as_u16(),
            body,
        });
    }

    Ok(RawDocument {
        status: status.as_u16(),
        body,
    })
}
