use regex::Regex;
use std::env;
use urlencoding::encode;

use crate::record::Record;
use crate::servers::Rir;

const ASN: &str = r"^AS\d+$";
const IPV4_RANGE: &str = r"^[0-9]+\.[0-9]+\.[0-9]+\.[0-9]+\s*-\s*[0-9]+\.[0-9]+\.[0-9]+\.[0-9]+$";
const IPV6_PREFIX: &str = r"^[0-9a-fA-F:]+/\d+$";
const IPV4_PREFIX: &str = r"^[0-9]+\.[0-9]+\.[0-9]+\.[0-9]+/\d+$";
const HANDLE: &str = r"^[A-Z0-9][A-Z0-9-]*$";

/// Fields whose values link to a registry search, with the shape a value must have
const LINKED_FIELDS: &[(&str, &str)] = &[
    ("aut-num", ASN),
    ("origin", ASN),
    ("originas", ASN),
    ("inetnum", IPV4_RANGE),
    ("netrange", IPV4_RANGE),
    ("inet6num", IPV6_PREFIX),
    ("route", IPV4_PREFIX),
    ("route6", IPV6_PREFIX),
    ("cidr", r"^[0-9a-fA-F.:/]+$"),
    ("nethandle", r"^NET6?-[0-9A-Fa-f-]+$"),
    ("netname", HANDLE),
    ("orgid", HANDLE),
    ("organisation", r"^ORG-[A-Z0-9-]+$"),
    ("org", r"^ORG-[A-Z0-9-]+$"),
    ("nic-hdl", HANDLE),
    ("admin-c", HANDLE),
    ("tech-c", HANDLE),
    ("abuse-c", HANDLE),
    ("mnt-by", r"^[A-Z][A-Z0-9-]*$"),
];

/// Represents Regional Internet Registry URLs
pub struct RirUrls;

impl RirUrls {
    /// Get the web search URL of a RIR for a search term
    pub fn get_url(rir: Rir, search_term: &str) -> String {
        let encoded_term = encode(search_term);

        match rir {
            Rir::Ripe => format!("https://apps.db.ripe.net/db-web-ui/query?searchtext={}", encoded_term),
            Rir::Arin => format!("https://search.arin.net/rdap/?query={}", encoded_term),
            Rir::Apnic => format!("https://wq.apnic.net/apnic-bin/whois.pl?searchtext={}", encoded_term),
            Rir::Lacnic => format!("https://query.milacnic.lacnic.net/home?searchtext={}", encoded_term),
            Rir::Afrinic => format!("https://afrinic.net/whois?searchtext={}", encoded_term),
        }
    }
}

/// Detect the RIR from a record's `source` field
pub fn rir_from_source(record: &Record) -> Option<Rir> {
    let source = record.get_ignore_case("source")?.value.as_single()?;
    match source.trim().to_uppercase().as_str() {
        "RIPE" => Some(Rir::Ripe),
        "ARIN" => Some(Rir::Arin),
        "APNIC" => Some(Rir::Apnic),
        "LACNIC" => Some(Rir::Lacnic),
        "AFRINIC" => Some(Rir::Afrinic),
        _ => None,
    }
}

/// Check if terminal supports hyperlinks (OSC 8)
pub fn terminal_supports_hyperlinks() -> bool {
    // Check for Windows Terminal first (most reliable)
    if env::var("WT_SESSION").is_ok() || env::var("WT_PROFILE_ID").is_ok() {
        return true;
    }

    if let Ok(term_program) = env::var("TERM_PROGRAM") {
        if matches!(term_program.as_str(), "vscode" | "iTerm.app" | "WezTerm" | "Hyper") {
            return true;
        }
    }

    // These terminals are known to support OSC 8
    if let Ok(term) = env::var("TERM") {
        if term == "dumb" {
            return false;
        }
        if term.contains("xterm") ||
           term.contains("screen") ||
           term.contains("tmux") ||
           term == "alacritty" ||
           term == "kitty" ||
           term == "foot" ||
           term.contains("256color") {
            return true;
        }
    }

    // VTE-based terminals (GNOME Terminal, etc.), iTerm2, WezTerm
    if env::var("VTE_VERSION").is_ok() ||
       env::var("ITERM_SESSION_ID").is_ok() ||
       env::var("WEZTERM_EXECUTABLE").is_ok() {
        return true;
    }

    // Default to true for modern systems - most terminals support OSC 8 now
    true
}

/// Create OSC 8 hyperlink
pub fn create_hyperlink(url: &str, text: &str) -> String {
    if !terminal_supports_hyperlinks() {
        return text.to_string();
    }

    format!("\x1b]8;;{}\x1b\\{}\x1b]8;;\x1b\\", url, text)
}

/// Hyperlink processor for RIR record values
pub struct RirHyperlinkProcessor {
    patterns: Vec<(&'static str, Regex)>,
}

impl RirHyperlinkProcessor {
    pub fn new() -> Self {
        let patterns = LINKED_FIELDS
            .iter()
            .filter_map(|(field, pattern)| Regex::new(pattern).ok().map(|re| (*field, re)))
            .collect();

        Self { patterns }
    }

    /// Search URL for a field value, if the field is linkable and the value has the expected shape
    pub fn url_for(&self, rir: Rir, field: &str, value: &str) -> Option<String> {
        let (_, pattern) = self
            .patterns
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(field))?;

        let value = value.trim();
        pattern
            .is_match(value)
            .then(|| RirUrls::get_url(rir, value))
    }
}

impl Default for RirHyperlinkProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{parse_records, FieldFilter};

    #[test]
    fn test_rir_from_source() {
        let records = parse_records(
            "as-block: AS137530 - AS138553\nsource: APNIC\n\naut-num: AS3333\nsource: RIPE\n\nroute: 10.0.0.0/8\n",
            &FieldFilter::all(),
        );

        assert_eq!(rir_from_source(&records[0]), Some(Rir::Apnic));
        assert_eq!(rir_from_source(&records[1]), Some(Rir::Ripe));
        assert_eq!(rir_from_source(&records[2]), None);
    }

    #[test]
    fn test_create_hyperlink() {
        let url = "https://example.com";
        let text = "Example";

        let result = create_hyperlink(url, text);
        assert!(result.contains("Example"));
    }

    #[test]
    fn test_rir_urls() {
        let query_url = RirUrls::get_url(Rir::Ripe, "AS3333");
        assert!(query_url.contains("AS3333"));
        assert!(query_url.contains("apps.db.ripe.net"));

        let arin_url = RirUrls::get_url(Rir::Arin, "NET-198-51-100-0-1");
        assert!(arin_url.contains("search.arin.net"));
        assert!(arin_url.contains("NET-198-51-100-0-1"));

        let apnic_url = RirUrls::get_url(Rir::Apnic, "AS3333");
        assert!(apnic_url.contains("wq.apnic.net"));

        let lacnic_url = RirUrls::get_url(Rir::Lacnic, "AS3333");
        assert!(lacnic_url.contains("query.milacnic.lacnic.net"));

        let afrinic_url = RirUrls::get_url(Rir::Afrinic, "AS3333");
        assert!(afrinic_url.contains("afrinic.net"));
    }

    #[test]
    fn test_url_for_checks_shape() {
        let processor = RirHyperlinkProcessor::new();

        let url = processor.url_for(Rir::Arin, "NetRange", "198.51.100.0 - 198.51.100.255").unwrap();
        assert!(url.contains("198.51.100.0%20-%20198.51.100.255"));

        assert!(processor.url_for(Rir::Ripe, "aut-num", "AS3333").is_some());
        assert!(processor.url_for(Rir::Ripe, "aut-num", "not an asn").is_none());
        assert!(processor.url_for(Rir::Ripe, "remarks", "AS3333").is_none());
        assert!(processor.url_for(Rir::Arin, "NetHandle", "NET-198-51-100-0-1").is_some());
    }
}
