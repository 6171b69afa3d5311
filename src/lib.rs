//! # Flight Scout
//!
//! Scrapes round-trip flight offers from the Google Flights results page.
//!
//! The pipeline has four stages: the trip criteria are encoded into the
//! `tfs` filter token ([`protobuf`]), the results page is fetched with that
//! token ([`client`]), the returned HTML is scraped into [`FlightOffer`]s
//! ([`parser`]), and an empty page is retried once before giving up
//! ([`search`]).

pub mod client;
pub mod cookies;
pub mod parser;
pub mod protobuf;
pub mod search;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// Re-export main types for convenience
pub use client::{ClientConfig, FetchRequest, FlightClient, RawDocument};
pub use cookies::{effective_cookies, CookieMap};
pub use parser::{FlightResponseParser, Markup, GOOGLE_FLIGHTS_MARKUP};
pub use protobuf::{encode, FilterToken};
pub use search::{fetch_and_parse, PageSource, SearchOptions};

const DATE_FORMAT: &str = "%Y-%m-%d";
const MAX_PASSENGERS: u32 = 9;

/// Error types for the flights library
#[derive(Error, Debug)]
pub enum FlightError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Flight search page returned HTTP {status}")]
    FetchError { status: u16, body: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("HTML parsing failed: {0}")]
    ParseError(String),

    #[error(
        "No flights found. (preflight checked)\n\
         Possible reasons:\n\
         - Invalid query (e.g., date is in the past or cannot be booked)\n\
         - Invalid airport\n\
         - Blocked by EU consent form. Try enabling inject_eu_cookies"
    )]
    NoFlightsFound,
}

/// Trip type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TripType {
    RoundTrip,
    OneWay,
    MultiCity,
}

impl FromStr for TripType {
    type Err = FlightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "round-trip" | "roundtrip" => Ok(TripType::RoundTrip),
            "one-way" | "oneway" => Ok(TripType::OneWay),
            "multi-city" | "multicity" => Ok(TripType::MultiCity),
            _ => Err(FlightError::InvalidInput(format!("Invalid trip type: {}", s))),
        }
    }
}

/// Cabin class enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeatClass {
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl FromStr for SeatClass {
    type Err = FlightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "economy" => Ok(SeatClass::Economy),
            "premium-economy" | "premium_economy" => Ok(SeatClass::PremiumEconomy),
            "business" => Ok(SeatClass::Business),
            "first" => Ok(SeatClass::First),
            _ => Err(FlightError::InvalidInput(format!("Invalid seat class: {}", s))),
        }
    }
}

/// Passenger configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passengers {
    pub adults: u32,
    pub children: u32,
    pub infants_in_seat: u32,
    pub infants_on_lap: u32,
}

impl Passengers {
    /// Widened so that absurd counts cannot wrap past the limit check.
    pub fn total(&self) -> u64 {
        [
            self.adults,
            self.children,
            self.infants_in_seat,
            self.infants_on_lap,
        ]
        .iter()
        .map(|&count| u64::from(count))
        .sum()
    }

    fn validate(&self) -> Result<(), FlightError> {
        if self.adults == 0 {
            return Err(FlightError::InvalidInput(
                "At least one adult is required".to_string(),
            ));
        }
        if self.infants_on_lap > self.adults {
            return Err(FlightError::InvalidInput(format!(
                "Cannot have more infants on lap ({}) than adults ({})",
                self.infants_on_lap, self.adults
            )));
        }
        if self.total() > u64::from(MAX_PASSENGERS) {
            return Err(FlightError::InvalidInput(format!(
                "Too many passengers ({} > {})",
                self.total(),
                MAX_PASSENGERS
            )));
        }
        Ok(())
    }
}

impl Default for Passengers {
    fn default() -> Self {
        Self {
            adults: 1,
            children: 0,
            infants_in_seat: 0,
            infants_on_lap: 0,
        }
    }
}

/// Validated search criteria. Built through [`TripCriteriaBuilder`], never
/// mutated afterwards, so encoding it cannot fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripCriteria {
    origin: String,
    destination: String,
    depart_date: NaiveDate,
    return_date: Option<NaiveDate>,
    trip_type: TripType,
    seat_class: SeatClass,
    passengers: Passengers,
    max_stops: Option<u32>,
    airlines: Vec<String>,
}

impl TripCriteria {
    /// Start a round-trip search: the return leg flies destination → origin.
    pub fn round_trip(
        origin: impl Into<String>,
        destination: impl Into<String>,
        depart_date: impl Into<String>,
        return_date: impl Into<String>,
    ) -> TripCriteriaBuilder {
        let mut builder = TripCriteriaBuilder::new(origin, destination, depart_date);
        builder.return_date = Some(return_date.into());
        builder.trip_type = TripType::RoundTrip;
        builder
    }

    pub fn one_way(
        origin: impl Into<String>,
        destination: impl Into<String>,
        depart_date: impl Into<String>,
    ) -> TripCriteriaBuilder {
        TripCriteriaBuilder::new(origin, destination, depart_date)
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn depart_date(&self) -> NaiveDate {
        self.depart_date
    }

    pub fn return_date(&self) -> Option<NaiveDate> {
        self.return_date
    }

    pub fn trip_type(&self) -> TripType {
        self.trip_type
    }

    pub fn seat_class(&self) -> SeatClass {
        self.seat_class
    }

    pub fn passengers(&self) -> Passengers {
        self.passengers
    }

    pub fn max_stops(&self) -> Option<u32> {
        self.max_stops
    }

    pub fn airlines(&self) -> &[String] {
        &self.airlines
    }
}

#[derive(Debug, Clone)]
pub struct TripCriteriaBuilder {
    origin: String,
    destination: String,
    depart_date: String,
    return_date: Option<String>,
    trip_type: TripType,
    seat_class: SeatClass,
    passengers: Passengers,
    max_stops: Option<u32>,
    airlines: Vec<String>,
}

impl TripCriteriaBuilder {
    fn new(
        origin: impl Into<String>,
        destination: impl Into<String>,
        depart_date: impl Into<String>,
    ) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            depart_date: depart_date.into(),
            return_date: None,
            trip_type: TripType::OneWay,
            seat_class: SeatClass::Economy,
            passengers: Passengers::default(),
            max_stops: None,
            airlines: Vec::new(),
        }
    }

    pub fn return_date(mut self, return_date: impl Into<String>) -> Self {
        self.return_date = Some(return_date.into());
        self
    }

    pub fn trip_type(mut self, trip_type: TripType) -> Self {
        self.trip_type = trip_type;
        self
    }

    pub fn seat_class(mut self, seat_class: SeatClass) -> Self {
        self.seat_class = seat_class;
        self
    }

    pub fn passengers(mut self, passengers: Passengers) -> Self {
        self.passengers = passengers;
        self
    }

    pub fn max_stops(mut self, max_stops: Option<u32>) -> Self {
        self.max_stops = max_stops;
        self
    }

    pub fn airlines(mut self, airlines: Vec<String>) -> Self {
        self.airlines = airlines;
        self
    }

    pub fn build(self) -> Result<TripCriteria, FlightError> {
        if self.origin.trim().is_empty() {
            return Err(FlightError::InvalidInput(
                "Origin airport is required".to_string(),
            ));
        }
        if self.destination.trim().is_empty() {
            return Err(FlightError::InvalidInput(
                "Destination airport is required".to_string(),
            ));
        }
        self.passengers.validate()?;
        if let Some(max_stops) = self.max_stops {
            if i32::try_from(max_stops).is_err() {
                return Err(FlightError::InvalidInput(format!(
                    "Stop limit out of range: {}",
                    max_stops
                )));
            }
        }

        let depart_date = parse_date(&self.depart_date)?;
        let return_date = self.return_date.as_deref().map(parse_date).transpose()?;

        if self.trip_type == TripType::RoundTrip && return_date.is_none() {
            return Err(FlightError::InvalidInput(
                "Round-trip search requires a return date".to_string(),
            ));
        }

        Ok(TripCriteria {
            origin: self.origin,
            destination: self.destination,
            depart_date,
            return_date,
            trip_type: self.trip_type,
            seat_class: self.seat_class,
            passengers: self.passengers,
            max_stops: self.max_stops,
            airlines: self.airlines,
        })
    }
}

fn parse_date(date: &str) -> Result<NaiveDate, FlightError> {
    NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|e| FlightError::InvalidInput(format!("Invalid date '{}': {}", date, e)))
}

/// Number of stops as shown on the results page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCount {
    Known(u32),
    /// The stops label could not be read as a number.
    Unknown,
}

impl fmt::Display for StopCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopCount::Known(n) => write!(f, "{}", n),
            StopCount::Unknown => f.write_str("Unknown"),
        }
    }
}

impl Serialize for StopCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StopCount::Known(n) => serializer.serialize_u32(*n),
            StopCount::Unknown => serializer.serialize_str("Unknown"),
        }
    }
}

impl<'de> Deserialize<'de> for StopCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Count(u32),
            Label(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Count(n) => Ok(StopCount::Known(n)),
            Repr::Label(label) if label == "Unknown" => Ok(StopCount::Unknown),
            Repr::Label(label) => Err(serde::de::Error::custom(format!(
                "invalid stop count: {}",
                label
            ))),
        }
    }
}

/// Individual flight offer scraped from the results page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightOffer {
    pub is_best: bool,
    pub name: String,
    pub departure: String,
    pub arrival: String,
    pub arrival_time_ahead: String,
    pub duration: String,
    pub stops: StopCount,
    pub delay: Option<String>,
    pub price: String,
}

/// Flight search result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub current_price: String, // "low", "typical", "high"
    pub flights: Vec<FlightOffer>,
}

/// Search result paired with a link that reproduces the search in a browser
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub url: String,
    pub flights: SearchResult,
}

impl SearchResponse {
    pub fn new(token: &FilterToken, flights: SearchResult) -> Self {
        Self {
            url: token.search_url(),
            flights,
        }
    }
}

/// Main public API function: fetch, parse and retry once on an empty page.
pub async fn get_flights(
    criteria: &TripCriteria,
    options: &SearchOptions,
) -> Result<SearchResult, FlightError> {
    let client = FlightClient::new(ClientConfig::default())?;
    let parser = FlightResponseParser::new()?;
    fetch_and_parse(&client, &parser, criteria, options).await
}
