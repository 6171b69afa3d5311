//! Consent cookie workaround for the regional cookie wall.
//!
//! From some regions the results page is replaced by a consent form. Sending
//! a pre-accepted `CONSENT`/`SOCS` pair skips it.

use std::collections::BTreeMap;

/// Cookie name to value. Ordered so the rendered header is stable.
pub type CookieMap = BTreeMap<String, String>;

/// Known-good consent pair captured from a browser that accepted the form.
pub const EU_CONSENT_COOKIES: [(&str, &str); 2] = [
    ("CONSENT", "PENDING+987"),
    ("SOCS", "CAESHAgBEhJnd3NfMjAyMzA4MTAtMF9SQzIaAmRlIAEaBgiAo_CmBg"),
];

pub fn eu_consent_cookies() -> CookieMap {
    EU_CONSENT_COOKIES
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

/// Cookies to send for a search.
///
/// When `inject_eu_cookies` is set the consent pair is merged over the
/// caller's cookies, so the consent values win on a name clash.
pub fn effective_cookies(cookies: Option<&CookieMap>, inject_eu_cookies: bool) -> Option<CookieMap> {
    match (cookies, inject_eu_cookies) {
        (Some(cookies), true) => {
            let mut merged = cookies.clone();
            merged.extend(eu_consent_cookies());
            Some(merged)
        }
        (None, true) => Some(eu_consent_cookies()),
        (cookies, false) => cookies.cloned(),
    }
}

/// Render a `Cookie` header value: `name=value; name=value`.
pub fn cookie_header(cookies: &CookieMap) -> Option<String> {
    if cookies.is_empty() {
        return None;
    }

    Some(
        cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; "),
    )
}
