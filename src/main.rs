//! CLI interface for flight-scout

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use flight_scout::{
    encode, fetch_and_parse, ClientConfig, CookieMap, FlightClient, FlightResponseParser,
    Passengers, SearchOptions, SearchResponse, SeatClass, TripCriteria, TripType,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "flight-scout")]
#[command(about = "Scrape flight offers from Google Flights")]
#[command(version)]
pub struct Cli {
    /// Also write JSON logs to daily files in this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search for flights
    Search {
        /// Origin airport code
        #[arg(short, long)]
        from: String,
        /// Destination airport code
        #[arg(short, long)]
        to: String,
        /// Departure date (YYYY-MM-DD)
        #[arg(short, long)]
        date: String,
        /// Return date for round trips (YYYY-MM-DD)
        #[arg(short, long)]
        return_date: Option<String>,
        /// Trip type (one-way, round-trip, multi-city); round-trip when a return date is given
        #[arg(long)]
        trip_type: Option<String>,
        /// Number of adults
        #[arg(long, default_value = "1")]
        adults: u32,
        /// Number of children
        #[arg(long, default_value = "0")]
        children: u32,
        /// Number of infants in seat
        #[arg(long, default_value = "0")]
        infants_in_seat: u32,
        /// Number of infants on lap
        #[arg(long, default_value = "0")]
        infants_on_lap: u32,
        /// Seat class (economy, premium-economy, business, first)
        #[arg(long, default_value = "economy")]
        class: String,
        /// Maximum number of stops
        #[arg(long)]
        max_stops: Option<u32>,
        /// Preferred airlines (comma-separated)
        #[arg(long)]
        airlines: Option<String>,
        /// Currency code, e.g. USD
        #[arg(long)]
        currency: Option<String>,
        /// Page language, e.g. en
        #[arg(long)]
        language: Option<String>,
        /// Extra cookie as NAME=VALUE (repeatable)
        #[arg(long = "cookie", value_parser = parse_cookie)]
        cookies: Vec<(String, String)>,
        /// Send the pre-accepted EU consent cookies
        #[arg(long)]
        inject_eu_cookies: bool,
        /// Keep the trailing item of every flight group
        #[arg(long)]
        allow_looping_last_item: bool,
        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Output file for JSON results
        #[arg(short, long)]
        output: Option<String>,
    },
}

fn parse_cookie(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{}'", raw)),
    }
}

fn init_logging(log_dir: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("flight_scout=info"));

    let file_layer = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
            let file_appender = tracing_appender::rolling::daily(dir, "flight-scout.log");
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(file_appender)
                    .with_ansi(false)
                    .with_target(true)
                    .json(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_dir.as_deref())?;

    match cli.command {
        Commands::Search {
            from,
            to,
            date,
            return_date,
            trip_type,
            adults,
            children,
            infants_in_seat,
            infants_on_lap,
            class,
            max_stops,
            airlines,
            currency,
            language,
            cookies,
            inject_eu_cookies,
            allow_looping_last_item,
            timeout,
            output,
        } => {
            let trip_type = match (trip_type, &return_date) {
                (Some(trip_type), _) => trip_type.parse::<TripType>()?,
                (None, Some(_)) => TripType::RoundTrip,
                (None, None) => TripType::OneWay,
            };
            if trip_type == TripType::OneWay && return_date.is_some() {
                bail!("--return-date cannot be used with a one-way trip");
            }

            let mut builder = TripCriteria::one_way(from, to, date)
                .trip_type(trip_type)
                .seat_class(class.parse::<SeatClass>()?)
                .passengers(Passengers {
                    adults,
                    children,
                    infants_in_seat,
                    infants_on_lap,
                })
                .max_stops(max_stops);
            if let Some(return_date) = return_date {
                builder = builder.return_date(return_date);
            }
            if let Some(airlines) = airlines {
                builder = builder.airlines(
                    airlines.split(',').map(|s| s.trim().to_string()).collect(),
                );
            }
            let criteria = builder.build()?;

            let options = SearchOptions {
                currency,
                language,
                max_stops: None,
                cookies: (!cookies.is_empty()).then(|| cookies.into_iter().collect::<CookieMap>()),
                inject_eu_cookies,
                allow_looping_last_item,
            };

            let client = FlightClient::new(ClientConfig {
                timeout: timeout.map(Duration::from_secs),
                ..ClientConfig::default()
            })?;
            let parser = FlightResponseParser::new()?;

            info!(from = criteria.origin(), to = criteria.destination(), "Searching for flights");
            let result = fetch_and_parse(&client, &parser, &criteria, &options).await?;
            let response = SearchResponse::new(&encode(&criteria), result);

            let json = serde_json::to_string_pretty(&response)?;
            if let Some(output_file) = output {
                fs::write(&output_file, &json)
                    .with_context(|| format!("writing results to {}", output_file))?;
                eprintln!("Results saved to {}", output_file);
            } else {
                println!("{}", json);
            }

            eprintln!("\nSummary:");
            eprintln!("Current price level: {}", response.flights.current_price);
            eprintln!("Found {} flights", response.flights.flights.len());
            if let Some(best) = response.flights.flights.first() {
                eprintln!("Best flight: {} - {}", best.name, best.price);
            }
            eprintln!("Open in browser: {}", response.url);
        }
    }

    Ok(())
}
