//! Filter token encoding for the Google Flights `tfs` query parameter.
//!
//! The message layout below is the upstream's own, so field numbers must
//! not change: any difference in the bytes changes the search Google runs.

use crate::{Passengers, SeatClass, TripCriteria, TripType, DATE_FORMAT};
use base64::{engine::general_purpose, Engine as _};
use prost::Message;
use std::fmt;
use tracing::debug;

const SEARCH_PAGE_URL: &str = "https://www.google.com/travel/flights";

#[derive(Clone, PartialEq, Message)]
pub struct Airport {
    #[prost(string, tag = "2")]
    pub airport: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct FlightData {
    #[prost(string, tag = "2")]
    pub date: String,
    #[prost(int32, optional, tag = "5")]
    pub max_stops: Option<i32>,
    #[prost(string, repeated, tag = "6")]
    pub airlines: Vec<String>,
    #[prost(message, optional, tag = "13")]
    pub from_flight: Option<Airport>,
    #[prost(message, optional, tag = "14")]
    pub to_flight: Option<Airport>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Info {
    #[prost(message, repeated, tag = "3")]
    pub data: Vec<FlightData>,
    #[prost(enumeration = "Passenger", repeated, tag = "8")]
    pub passengers: Vec<i32>,
    #[prost(enumeration = "Seat", tag = "9")]
    pub seat: i32,
    #[prost(enumeration = "Trip", tag = "19")]
    pub trip: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum Seat {
    UnknownSeat = 0,
    Economy = 1,
    PremiumEconomy = 2,
    Business = 3,
    First = 4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum Trip {
    UnknownTrip = 0,
    RoundTrip = 1,
    OneWay = 2,
    MultiCity = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum Passenger {
    UnknownPassenger = 0,
    Adult = 1,
    Child = 2,
    InfantInSeat = 3,
    InfantOnLap = 4,
}

impl From<SeatClass> for Seat {
    fn from(seat_class: SeatClass) -> Self {
        match seat_class {
            SeatClass::Economy => Seat::Economy,
            SeatClass::PremiumEconomy => Seat::PremiumEconomy,
            SeatClass::Business => Seat::Business,
            SeatClass::First => Seat::First,
        }
    }
}

impl From<TripType> for Trip {
    fn from(trip_type: TripType) -> Self {
        match trip_type {
            TripType::RoundTrip => Trip::RoundTrip,
            TripType::OneWay => Trip::OneWay,
            TripType::MultiCity => Trip::MultiCity,
        }
    }
}

// Order matters: adults, children, infants in seat, infants on lap.
impl From<Passengers> for Vec<Passenger> {
    fn from(passengers: Passengers) -> Self {
        [
            (Passenger::Adult, passengers.adults),
            (Passenger::Child, passengers.children),
            (Passenger::InfantInSeat, passengers.infants_in_seat),
            (Passenger::InfantOnLap, passengers.infants_on_lap),
        ]
        .into_iter()
        .flat_map(|(kind, count)| std::iter::repeat(kind).take(count as usize))
        .collect()
    }
}

/// Encoded trip criteria, ready to be sent as the `tfs` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterToken {
    bytes: Vec<u8>,
}

impl FilterToken {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// URL-safe base64 text form.
    pub fn to_base64(&self) -> String {
        general_purpose::URL_SAFE.encode(&self.bytes)
    }

    /// Link that reproduces this search in a browser.
    pub fn search_url(&self) -> String {
        format!("{}?tfs={}", SEARCH_PAGE_URL, self.to_base64())
    }
}

impl fmt::Display for FilterToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

fn leg(date: chrono::NaiveDate, from: &str, to: &str, criteria: &TripCriteria) -> FlightData {
    FlightData {
        date: date.format(DATE_FORMAT).to_string(),
        // Explicit presence: Some(0) means nonstop only and is encoded.
        // The builder already rejected limits that do not fit the field.
        max_stops: criteria.max_stops().and_then(|stops| i32::try_from(stops).ok()),
        airlines: criteria.airlines().to_vec(),
        from_flight: Some(Airport {
            airport: from.to_string(),
        }),
        to_flight: Some(Airport {
            airport: to.to_string(),
        }),
    }
}

/// Build protobuf Info message from validated trip criteria
pub fn build_flight_info(criteria: &TripCriteria) -> Info {
    let mut data = vec![leg(
        criteria.depart_date(),
        criteria.origin(),
        criteria.destination(),
        criteria,
    )];

    match (criteria.trip_type(), criteria.return_date()) {
        (TripType::RoundTrip | TripType::MultiCity, Some(return_date)) => {
            data.push(leg(
                return_date,
                criteria.destination(),
                criteria.origin(),
                criteria,
            ));
        }
        _ => {}
    }

    let passengers: Vec<Passenger> = criteria.passengers().into();

    Info {
        data,
        passengers: passengers.into_iter().map(i32::from).collect(),
        seat: Seat::from(criteria.seat_class()) as i32,
        trip: Trip::from(criteria.trip_type()) as i32,
    }
}

/// Encode trip criteria into a filter token. Pure: equal criteria always
/// give byte-identical tokens.
pub fn encode(criteria: &TripCriteria) -> FilterToken {
    let info = build_flight_info(criteria);
    let bytes = info.encode_to_vec();
    debug!(legs = info.data.len(), encoded_length = bytes.len(), "Encoded filter token");
    FilterToken { bytes }
}
