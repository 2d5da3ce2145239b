use colored::*;

use crate::answer::Answer;
use crate::hyperlink::{create_hyperlink, rir_from_source, RirHyperlinkProcessor};
use crate::servers::Rir;

pub struct OutputColorizer {
    color: bool,
    hyperlinks: Option<RirHyperlinkProcessor>,
}

impl OutputColorizer {
    pub fn new(color: bool, hyperlinks: bool) -> Self {
        Self {
            color,
            hyperlinks: hyperlinks.then(RirHyperlinkProcessor::new),
        }
    }

    /// Render answers as `key: value` text, one banner per server
    pub fn render(&self, answers: &[Answer]) -> String {
        let mut blocks = Vec::new();

        for answer in answers {
            let mut lines = vec![self.banner(answer)];
            let server_rir = Rir::from_server(&answer.server);

            for record in &answer.data {
                let rir = server_rir.or_else(|| rir_from_source(record));
                lines.push(String::new());
                for field in record {
                    for value in field.value.values() {
                        lines.push(self.render_field(rir, &field.key, value));
                    }
                }
            }

            blocks.push(lines.join("\n"));
        }

        blocks.join("\n\n")
    }

    fn banner(&self, answer: &Answer) -> String {
        let banner = match answer.authority {
            Some(true) => format!("% {} (authoritative)", answer.server),
            _ => format!("% {}", answer.server),
        };

        if !self.color {
            return banner;
        }
        match answer.authority {
            Some(true) => banner.bright_green().bold().to_string(),
            _ => banner.bright_black().to_string(),
        }
    }

    fn render_field(&self, rir: Option<Rir>, field: &str, value: &str) -> String {
        let (name, text) = if self.color {
            (Self::colorize_field_name(field), Self::colorize_field_value(field, value))
        } else {
            (field.to_string(), value.to_string())
        };

        let url = match (&self.hyperlinks, rir) {
            (Some(processor), Some(rir)) => processor.url_for(rir, field, value),
            _ => None,
        };

        match url {
            Some(url) => format!("{}: {}", name, create_hyperlink(&url, &text)),
            None => format!("{}: {}", name, text),
        }
    }

    /// Colorize field names based on their type
    fn colorize_field_name(field: &str) -> String {
        match field.to_lowercase().as_str() {
            // Network and AS fields
            "aut-num" | "as-block" | "inet6num" | "inetnum" | "route" | "route6" | "netname" |
            "netrange" | "cidr" | "asnumber" | "asname" =>
                field.bright_cyan().to_string(),

            // Allocation status
            "status" | "nettype" =>
                field.bright_yellow().to_string(),

            // Handles and references
            "nethandle" | "parent" | "orgid" | "originas" =>
                field.blue().to_string(),

            // Date fields
            "created" | "regdate" | "updated" | "last-modified" | "changed" =>
                field.bright_magenta().to_string(),

            // Name fields
            "as-name" | "org-name" | "orgname" | "role" | "person" =>
                field.bright_green().to_string(),

            // Organization fields
            "org" | "organisation" | "org-type" | "organization" =>
                field.yellow().to_string(),

            // Contact fields
            "admin-c" | "tech-c" | "abuse-c" | "nic-hdl" | "abuse-mailbox" |
            "orgabusehandle" | "orgtechhandle" | "orgabuseemail" | "orgtechemail" =>
                field.green().to_string(),

            // Maintainer fields
            "mnt-by" | "mnt-ref" | "mnt-domains" | "mnt-lower" | "mnt-routes" | "mnt-irt" =>
                field.bright_blue().to_string(),

            // Location fields
            "country" | "address" | "source" | "city" | "stateprov" | "postalcode" =>
                field.bright_white().to_string(),

            // Annotations
            "remarks" | "comment" | "descr" =>
                field.bright_black().to_string(),

            // Default
            _ => field.white().to_string(),
        }
    }

    /// Colorize field values based on content and context
    fn colorize_field_value(field: &str, value: &str) -> String {
        let field_lower = field.to_lowercase();

        // AS Numbers
        if field_lower == "aut-num" || field_lower == "originas" {
            return value.bright_red().bold().to_string();
        }

        // Allocation type
        if field_lower == "status" || field_lower == "nettype" {
            return Self::colorize_status_value(value);
        }

        if field_lower == "source" {
            return value.bright_blue().to_string();
        }

        if field_lower.contains("country") {
            return value.yellow().to_string();
        }

        // Dates
        if field_lower.contains("date") || field_lower.contains("created") ||
           field_lower.contains("changed") || field_lower.contains("updated") ||
           field_lower.contains("modified") {
            return value.bright_magenta().to_string();
        }

        // Email addresses
        if value.contains('@') {
            return value.bright_yellow().to_string();
        }

        // AS numbers in values
        if is_asn(value) {
            return value.bright_red().to_string();
        }

        // IP addresses, CIDR blocks and ranges
        if Self::looks_like_ip_or_cidr(value) {
            return value.bright_cyan().to_string();
        }

        // Names
        if matches!(field_lower.as_str(), "as-name" | "org-name" | "netname" | "orgname" | "asname") {
            return value.bright_white().bold().to_string();
        }

        // Handles
        if field.ends_with("-c") || field_lower.ends_with("handle") {
            return value.green().to_string();
        }

        if matches!(field_lower.as_str(), "remarks" | "comment" | "descr") {
            return value.bright_black().to_string();
        }

        value.white().to_string()
    }

    /// Colorize allocation status values
    fn colorize_status_value(value: &str) -> String {
        let upper = value.to_uppercase();
        if upper.starts_with("ALLOCATED TO") {
            value.bright_yellow().bold().to_string()
        } else if upper.contains("ALLOCATED") || upper.contains("ALLOCATION") {
            value.bright_green().to_string()
        } else if upper.contains("ASSIGNED") || upper.contains("REASSIGN") || upper.contains("REALLOCATION") {
            value.green().to_string()
        } else if upper.contains("RESERVED") {
            value.yellow().to_string()
        } else {
            value.bright_yellow().to_string()
        }
    }

    /// Check if a string looks like an IP address, CIDR block or range
    fn looks_like_ip_or_cidr(value: &str) -> bool {
        !value.is_empty() &&
            value.chars().any(|c| c.is_ascii_digit()) &&
            value.chars().all(|c| c.is_ascii_hexdigit() || matches!(c, '.' | ':' | '/' | '-' | ' ' | ','))
    }
}

fn is_asn(value: &str) -> bool {
    match (value.get(..2), value.get(2..)) {
        (Some(prefix), Some(digits)) => {
            prefix.eq_ignore_ascii_case("AS")
                && !digits.is_empty()
                && digits.chars().all(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldFilter;

    fn answers() -> Vec<Answer> {
        let mut arin = Answer::parse(
            "whois.arin.net",
            "NetRange: 192.0.2.0 - 192.0.2.255\nComment: one\nComment: two\n\nOrgName: Example\n",
            &FieldFilter::all(),
        );
        arin.authority = Some(true);
        vec![arin]
    }

    #[test]
    fn test_render_plain() {
        let output = OutputColorizer::new(false, false).render(&answers());
        assert_eq!(
            output,
            "% whois.arin.net (authoritative)\n\nNetRange: 192.0.2.0 - 192.0.2.255\nComment: one\nComment: two\n\nOrgName: Example"
        );
    }

    #[test]
    fn test_render_separates_servers() {
        let mut list = answers();
        list.push(Answer::parse("whois.ripe.net", "inetnum: 192.0.2.0 - 192.0.2.255\n", &FieldFilter::all()));
        let output = OutputColorizer::new(false, false).render(&list);
        assert!(output.contains("OrgName: Example\n\n% whois.ripe.net\n\ninetnum: 192.0.2.0 - 192.0.2.255"));
    }

    #[test]
    fn test_render_colored_keeps_text() {
        colored::control::set_override(true);
        let output = OutputColorizer::new(true, false).render(&answers());
        assert!(output.contains("NetRange"));
        assert!(output.contains("192.0.2.0 - 192.0.2.255"));
        assert!(output.contains("\x1b["));
    }

    #[test]
    fn test_looks_like_ip_or_cidr() {
        assert!(OutputColorizer::looks_like_ip_or_cidr("192.0.2.0 - 192.0.2.255"));
        assert!(OutputColorizer::looks_like_ip_or_cidr("2001:db8::/32"));
        assert!(!OutputColorizer::looks_like_ip_or_cidr("Example"));
        assert!(!OutputColorizer::looks_like_ip_or_cidr("cafe"));
    }

    #[test]
    fn test_is_asn() {
        assert!(is_asn("AS3333"));
        assert!(is_asn("as64496"));
        assert!(!is_asn("AS"));
        assert!(!is_asn("ASN-EXAMPLE"));
    }
}
