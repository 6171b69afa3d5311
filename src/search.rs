//! Fetch + parse with one retry on an empty results page.
//!
//! The results page sometimes comes back without any offers even for a
//! valid query. One identical retry is made before reporting
//! [`FlightError::NoFlightsFound`]. HTTP failures are never retried.

use crate::client::{FetchRequest, FlightClient, RawDocument};
use crate::cookies::{effective_cookies, CookieMap};
use crate::parser::{looks_like_consent_wall, FlightResponseParser};
use crate::protobuf::encode;
use crate::{FlightError, SearchResult, TripCriteria};
use tracing::{info, instrument, warn};

/// Fetch+parse cycles before giving up on an empty page.
pub const MAX_ATTEMPTS: u32 = 2;

/// Per-search options on top of the trip criteria.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub currency: Option<String>,
    pub language: Option<String>,
    /// Sent as the `max_stops` query parameter, separate from the stop
    /// limit encoded in the filter token.
    pub max_stops: Option<u32>,
    pub cookies: Option<CookieMap>,
    /// Send the pre-accepted consent cookie pair.
    pub inject_eu_cookies: bool,
    /// Keep the trailing item of non-best groups (debugging aid).
    pub allow_looping_last_item: bool,
}

impl SearchOptions {
    pub fn fetch_request(&self, criteria: &TripCriteria) -> FetchRequest {
        FetchRequest {
            token: encode(criteria),
            currency: self.currency.clone(),
            language: self.language.clone(),
            max_stops: self.max_stops,
            cookies: effective_cookies(self.cookies.as_ref(), self.inject_eu_cookies),
        }
    }
}

/// Anything that can produce a results page for a request.
#[allow(async_fn_in_trait)]
pub trait PageSource {
    async fn fetch(&self, request: &FetchRequest) -> Result<RawDocument, FlightError>;
}

impl PageSource for FlightClient {
    async fn fetch(&self, request: &FetchRequest) -> Result<RawDocument, FlightError> {
        self.fetch_page(request).await
    }
}

/// Run the search, retrying once with the same request if no offers came back.
#[instrument(
    level = "info",
    skip_all,
    fields(origin = %criteria.origin(), destination = %criteria.destination())
)]
pub async fn fetch_and_parse<S: PageSource>(
    source: &S,
    parser: &FlightResponseParser,
    criteria: &TripCriteria,
    options: &SearchOptions,
) -> Result<SearchResult, FlightError> {
    let request = options.fetch_request(criteria);

    for attempt in 1..=MAX_ATTEMPTS {
        let doc = source.fetch(&request).await?;
        let result = parser.parse(&doc, options.allow_looping_last_item);

        if !result.flights.is_empty() {
            info!(attempt, flights_found = result.flights.len(), "Search completed");
            return Ok(result);
        }

        if looks_like_consent_wall(&doc) {
            warn!(attempt, "Consent page served instead of results");
        }
        warn!(attempt, max_attempts = MAX_ATTEMPTS, "No flights in results page");
    }

    Err(FlightError::NoFlightsFound)
}
