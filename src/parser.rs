//! HTML parser for Google Flights results pages.
//!
//! The page markup is obfuscated and changes without notice. Every selector
//! lives in [`Markup`], so a markup change is a one-table edit. Extraction
//! never fails on a missing node: the field degrades to empty text instead.

use crate::client::RawDocument;
use crate::{FlightError, FlightOffer, SearchResult, StopCount};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, trace};

const NONSTOP_LABEL: &str = "Nonstop";
const DEFAULT_PRICE: &str = "0";

/// CSS selectors for each piece of the results page.
#[derive(Debug, Clone, Copy)]
pub struct Markup {
    /// Flight group containers. Both markers are treated the same.
    pub groups: &'static str,
    pub items: &'static str,
    pub name: &'static str,
    /// Departure then arrival, read positionally.
    pub times: &'static str,
    pub arrival_time_ahead: &'static str,
    pub duration: &'static str,
    pub stops: &'static str,
    pub delay: &'static str,
    pub price: &'static str,
    pub current_price: &'static str,
}

pub const GOOGLE_FLIGHTS_MARKUP: Markup = Markup {
    groups: r#"div[jsname="IWWDBc"], div[jsname="YdtKid"]"#,
    items: "ul.Rk10dc li",
    name: "div.sSHqwe.tPgKwe.ogfYpf span",
    times: "span.mv1WYe div",
    arrival_time_ahead: "span.bOzv6",
    duration: "li div.Ak5kof div",
    stops: ".BbR8Ec .ogfYpf",
    delay: ".GsCCve",
    price: ".YMlIz.FpEdX",
    current_price: "span.gOatQ",
};

struct Selectors {
    groups: Selector,
    items: Selector,
    name: Selector,
    times: Selector,
    arrival_time_ahead: Selector,
    duration: Selector,
    stops: Selector,
    delay: Selector,
    price: Selector,
    current_price: Selector,
}

fn compile(css: &str, field: &str) -> Result<Selector, FlightError> {
    Selector::parse(css)
        .map_err(|e| FlightError::ParseError(format!("Invalid {} selector: {}", field, e)))
}

impl Selectors {
    fn compile(markup: &Markup) -> Result<Self, FlightError> {
        Ok(Self {
            groups: compile(markup.groups, "flight group")?,
            items: compile(markup.items, "flight item")?,
            name: compile(markup.name, "flight name")?,
            times: compile(markup.times, "departure/arrival")?,
            arrival_time_ahead: compile(markup.arrival_time_ahead, "arrival time ahead")?,
            duration: compile(markup.duration, "duration")?,
            stops: compile(markup.stops, "stops")?,
            delay: compile(markup.delay, "delay")?,
            price: compile(markup.price, "price")?,
            current_price: compile(markup.current_price, "current price")?,
        })
    }
}

/// A lookup result that reads as empty text when the node is missing.
#[derive(Clone, Copy)]
struct SafeNode<'a>(Option<ElementRef<'a>>);

impl<'a> SafeNode<'a> {
    fn first(scope: ElementRef<'a>, selector: &Selector) -> Self {
        SafeNode(scope.select(selector).next())
    }

    fn text(&self) -> String {
        self.0
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default()
    }

    fn trimmed_text(&self) -> String {
        self.text().trim().to_string()
    }
}

/// HTML parser for Google Flights responses
pub struct FlightResponseParser {
    selectors: Selectors,
}

impl FlightResponseParser {
    pub fn new() -> Result<Self, FlightError> {
        Self::with_markup(&GOOGLE_FLIGHTS_MARKUP)
    }

    pub fn with_markup(markup: &Markup) -> Result<Self, FlightError> {
        debug!("Initializing HTML parser with selectors");
        Ok(Self {
            selectors: Selectors::compile(markup)?,
        })
    }

    /// Parse a results page. An empty offer list is a valid outcome here.
    ///
    /// Every group but the first ends with a "more flights" control rather
    /// than an offer; it is skipped unless `allow_looping_last_item` is set.
    pub fn parse(&self, doc: &RawDocument, allow_looping_last_item: bool) -> SearchResult {
        self.parse_html(doc.html(), allow_looping_last_item)
    }

    pub fn parse_html(&self, html: &str, allow_looping_last_item: bool) -> SearchResult {
        let document = Html::parse_document(html);
        let mut flights = Vec::new();

        for (i, group) in document.select(&self.selectors.groups).enumerate() {
            let is_best = i == 0;
            let items: Vec<_> = group.select(&self.selectors.items).collect();
            let keep = if is_best || allow_looping_last_item {
                items.len()
            } else {
                items.len().saturating_sub(1)
            };
            trace!(group = i, items = items.len(), keep, "Scanning flight group");

            for item in items.into_iter().take(keep) {
                flights.push(self.extract_offer(item, is_best));
            }
        }

        let current_price = SafeNode(document.select(&self.selectors.current_price).next()).text();

        debug!(
            flights_extracted = flights.len(),
            current_price = %current_price,
            "HTML parsing completed"
        );

        SearchResult {
            current_price,
            flights,
        }
    }

    fn extract_offer(&self, item: ElementRef<'_>, is_best: bool) -> FlightOffer {
        let s = &self.selectors;

        let times: Vec<String> = item
            .select(&s.times)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .collect();
        let (departure, arrival) = match times.as_slice() {
            [departure, arrival, ..] => (collapse_whitespace(departure), collapse_whitespace(arrival)),
            _ => (String::new(), String::new()),
        };

        let delay = SafeNode::first(item, &s.delay).text();

        FlightOffer {
            is_best,
            name: SafeNode::first(item, &s.name).trimmed_text(),
            departure,
            arrival,
            arrival_time_ahead: SafeNode::first(item, &s.arrival_time_ahead).text(),
            duration: SafeNode::first(item, &s.duration).text(),
            stops: normalize_stops(&SafeNode::first(item, &s.stops).text()),
            delay: (!delay.is_empty()).then_some(delay),
            price: normalize_price(&SafeNode::first(item, &s.price).text()),
        }
    }
}

/// "Nonstop" is zero stops, otherwise the leading number ("2 stops" → 2).
/// Surrounding whitespace is ignored and the number ends at any Unicode
/// space, non-breaking ones included.
pub fn normalize_stops(label: &str) -> StopCount {
    let label = label.trim();
    if label == NONSTOP_LABEL {
        return StopCount::Known(0);
    }

    label
        .split_whitespace()
        .next()
        .and_then(|token| token.parse().ok())
        .map(StopCount::Known)
        .unwrap_or(StopCount::Unknown)
}

/// Drop thousands separators; a missing price reads as "0".
pub fn normalize_price(text: &str) -> String {
    if text.is_empty() {
        return DEFAULT_PRICE.to_string();
    }
    text.replace(',', "")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Heuristic for the regional consent form served in place of results.
pub fn looks_like_consent_wall(doc: &RawDocument) -> bool {
    let html = doc.html();
    html.contains("consent.google.com") || html.contains("ppConfig")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, times: &[&str], stops: &str, price: Option<&str>) -> String {
        let times: String = times.iter().map(|t| format!("<div>{}</div>", t)).collect();
        let price = price
            .map(|p| format!(r#"<div class="YMlIz FpEdX">{}</div>"#, p))
            .unwrap_or_default();
        format!(
            r#"<li>
                <div class="sSHqwe tPgKwe ogfYpf"><span> {name} </span></div>
                <span class="mv1WYe">{times}</span>
                <div class="Ak5kof"><div>5 hr 35 min</div></div>
                <div class="BbR8Ec"><div class="ogfYpf">{stops}</div></div>
                {price}
            </li>"#
        )
    }

    fn group(jsname: &str, items: &[String]) -> String {
        format!(
            r#"<div jsname="{}"><ul class="Rk10dc">{}</ul></div>"#,
            jsname,
            items.concat()
        )
    }

    fn page(groups: &[String]) -> String {
        format!(
            r#"<html><body><span class="gOatQ">low</span>{}</body></html>"#,
            groups.concat()
        )
    }

    fn parser() -> FlightResponseParser {
        FlightResponseParser::new().unwrap()
    }

    #[test]
    fn test_flight_response_parser_creation() {
        assert!(FlightResponseParser::new().is_ok());
    }

    #[test]
    fn test_invalid_markup_is_rejected() {
        let markup = Markup {
            groups: "div[[",
            ..GOOGLE_FLIGHTS_MARKUP
        };
        assert!(matches!(
            FlightResponseParser::with_markup(&markup),
            Err(FlightError::ParseError(_))
        ));
    }

    #[test]
    fn test_parse_empty_response() {
        let result = parser().parse_html("<html></html>", false);
        assert!(result.flights.is_empty());
        assert_eq!(result.current_price, "");
    }

    #[test]
    fn test_best_group_and_last_item_exclusion() {
        let html = page(&[
            group(
                "IWWDBc",
                &[item("Delta", &["8:00 AM", "4:35 PM"], "Nonstop", Some("$1,234"))],
            ),
            group(
                "YdtKid",
                &[
                    item("United", &["9:00 AM", "6:10 PM"], "1 stop", Some("$980")),
                    item("JetBlue", &["1:00 PM", "9:45 PM"], "2 stops", Some("$1,020")),
                    item("View more flights", &[], "", None),
                ],
            ),
        ]);

        let result = parser().parse_html(&html, false);
        assert_eq!(result.current_price, "low");
        assert_eq!(result.flights.len(), 3);
        assert!(result.flights[0].is_best);
        assert!(!result.flights[1].is_best);
        assert!(!result.flights[2].is_best);
        assert_eq!(result.flights[2].name, "JetBlue");

        let looped = parser().parse_html(&html, true);
        assert_eq!(looped.flights.len(), 4);
        assert_eq!(looped.flights[3].name, "View more flights");
    }

    #[test]
    fn test_first_group_keeps_its_last_item() {
        let html = page(&[group(
            "YdtKid",
            &[
                item("A", &["1:00", "2:00"], "Nonstop", Some("$1")),
                item("B", &["3:00", "4:00"], "Nonstop", Some("$2")),
            ],
        )]);

        let result = parser().parse_html(&html, false);
        assert_eq!(result.flights.len(), 2);
        assert!(result.flights.iter().all(|f| f.is_best));
    }

    #[test]
    fn test_offer_fields() {
        let html = page(&[group(
            "IWWDBc",
            &[item("Delta", &["  8:00\u{202f}AM ", "4:35   PM"], "Nonstop", Some("$1,234"))],
        )]);

        let offer = &parser().parse_html(&html, false).flights[0];
        assert_eq!(offer.name, "Delta");
        assert_eq!(offer.departure, "8:00 AM");
        assert_eq!(offer.arrival, "4:35 PM");
        assert_eq!(offer.duration, "5 hr 35 min");
        assert_eq!(offer.stops, StopCount::Known(0));
        assert_eq!(offer.price, "$1234");
        assert_eq!(offer.delay, None);
        assert_eq!(offer.arrival_time_ahead, "");
    }

    #[test]
    fn test_missing_price_defaults_to_zero() {
        let html = page(&[group("IWWDBc", &[item("Delta", &["8:00", "9:00"], "Nonstop", None)])]);
        let offer = &parser().parse_html(&html, false).flights[0];
        assert_eq!(offer.price, "0");
    }

    #[test]
    fn test_single_time_node_blanks_both_times() {
        let html = page(&[group("IWWDBc", &[item("Delta", &["8:00 AM"], "Nonstop", Some("$5"))])]);
        let offer = &parser().parse_html(&html, false).flights[0];
        assert_eq!(offer.departure, "");
        assert_eq!(offer.arrival, "");
        assert_eq!(offer.name, "Delta");
    }

    #[test]
    fn test_bare_item_degrades_every_field() {
        let html = page(&[group("IWWDBc", &["<li></li>".to_string()])]);
        let offer = &parser().parse_html(&html, false).flights[0];

        assert_eq!(offer.name, "");
        assert_eq!(offer.duration, "");
        assert_eq!(offer.stops, StopCount::Unknown);
        assert_eq!(offer.price, "0");
        assert_eq!(offer.delay, None);
    }

    #[test]
    fn test_delay_and_day_offset() {
        let html = page(&[group(
            "IWWDBc",
            &[r#"<li>
                <span class="mv1WYe"><div>10:15 PM</div><div>6:05 AM</div></span>
                <span class="bOzv6">+1</span>
                <div class="GsCCve">Often delayed by 30+ min</div>
            </li>"#
                .to_string()],
        )]);

        let offer = &parser().parse_html(&html, false).flights[0];
        assert_eq!(offer.arrival_time_ahead, "+1");
        assert_eq!(offer.delay.as_deref(), Some("Often delayed by 30+ min"));
    }

    #[test]
    fn test_stop_normalization() {
        assert_eq!(normalize_stops("Nonstop"), StopCount::Known(0));
        assert_eq!(normalize_stops("1 stop"), StopCount::Known(1));
        assert_eq!(normalize_stops("3 stops"), StopCount::Known(3));
        assert_eq!(normalize_stops("garbage"), StopCount::Unknown);
        assert_eq!(normalize_stops(""), StopCount::Unknown);
    }

    #[test]
    fn test_stop_labels_with_odd_spacing() {
        assert_eq!(normalize_stops(" Nonstop"), StopCount::Known(0));
        assert_eq!(normalize_stops("Nonstop\n"), StopCount::Known(0));
        assert_eq!(normalize_stops("1\u{a0}stop"), StopCount::Known(1));
        assert_eq!(normalize_stops("  2  stops "), StopCount::Known(2));
        assert_eq!(normalize_stops("Non stop"), StopCount::Unknown);
    }

    #[test]
    fn test_price_normalization() {
        assert_eq!(normalize_price("1,234"), "1234");
        assert_eq!(normalize_price("$12,345,678"), "$12345678");
        assert_eq!(normalize_price(""), "0");
    }

    #[test]
    fn test_consent_wall_detection() {
        let wall = RawDocument::from_html(
            r#"<html><head><base href="https://consent.google.com"></head></html>"#,
        );
        assert!(looks_like_consent_wall(&wall));
        assert!(!looks_like_consent_wall(&RawDocument::from_html("<html></html>")));
    }
}
