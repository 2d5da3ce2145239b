//! Longest-prefix-match index over IPv4 and IPv6 prefixes.

use std::net::IpAddr;

use ipnet::{IpNet, Ipv4Subnets, Ipv6Subnets};

use crate::error::{Result, WhoisError};

/// Parse a CIDR prefix, a bare address or a `start - end` range into CIDR blocks.
///
/// Ranges are decomposed into the minimal set of covering blocks. Prefixes
/// with host bits set are truncated to their network address.
pub fn parse_prefixes(text: &str) -> Result<Vec<IpNet>> {
    let text = text.trim();

    if let Some((start, end)) = text.split_once('-') {
        return parse_range(start.trim(), end.trim())
            .ok_or_else(|| WhoisError::InvalidPrefix(text.to_string()));
    }

    parse_prefix(text).map(|net| vec![net])
}

/// Parse a single CIDR prefix or bare address (as a host prefix)
pub fn parse_prefix(text: &str) -> Result<IpNet> {
    let text = text.trim();

    if let Ok(net) = text.parse::<IpNet>() {
        return Ok(net.trunc());
    }

    text.parse::<IpAddr>()
        .map(host_prefix)
        .map_err(|_| WhoisError::InvalidPrefix(text.to_string()))
}

pub fn host_prefix(addr: IpAddr) -> IpNet {
    match addr {
        IpAddr::V4(v4) => IpNet::V4(v4.into()),
        IpAddr::V6(v6) => IpNet::V6(v6.into()),
    }
}

/// Minimal CIDR blocks covering `start..=end`; `None` on mixed families or reversed bounds
pub fn range_to_prefixes(start: IpAddr, end: IpAddr) -> Option<Vec<IpNet>> {
    match (start, end) {
        (IpAddr::V4(s), IpAddr::V4(e)) if s <= e => {
            Some(Ipv4Subnets::new(s, e, 0).map(IpNet::V4).collect())
        }
        (IpAddr::V6(s), IpAddr::V6(e)) if s <= e => {
            Some(Ipv6Subnets::new(s, e, 0).map(IpNet::V6).collect())
        }
        _ => None,
    }
}

fn parse_range(start: &str, end: &str) -> Option<Vec<IpNet>> {
    let start = start.parse::<IpAddr>().ok()?;
    let end = end.parse::<IpAddr>().ok()?;
    range_to_prefixes(start, end)
}

/// Associates payloads with prefixes and answers containment queries,
/// most specific prefix first
#[derive(Debug, Clone)]
pub struct PrefixIndex<T> {
    entries: Vec<(IpNet, T)>,
}

impl<T> PrefixIndex<T> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a single block. The same block may carry several payloads.
    pub fn insert(&mut self, net: IpNet, payload: T) {
        self.entries.push((net.trunc(), payload));
    }

    /// Every stored entry whose prefix contains `net`, longest prefix first
    pub fn matches(&self, net: &IpNet) -> Vec<(&IpNet, &T)> {
        let mut found: Vec<(&IpNet, &T)> = self
            .entries
            .iter()
            .filter(|(stored, _)| stored.contains(net))
            .map(|(stored, payload)| (stored, payload))
            .collect();

        // Stable: equal lengths keep insertion order
        found.sort_by(|a, b| b.0.prefix_len().cmp(&a.0.prefix_len()));
        found
    }

    /// Payloads whose prefix contains `net`, most specific first
    pub fn get_match_net(&self, net: &IpNet) -> Vec<&T> {
        self.matches(net).into_iter().map(|(_, payload)| payload).collect()
    }

    /// Parse `prefix` and return every payload whose prefix contains it
    pub fn get_match(&self, prefix: &str) -> Result<Vec<&T>> {
        let net = parse_prefix(prefix)?;
        Ok(self.get_match_net(&net))
    }

    /// Distinct stored blocks in insertion order
    pub fn prefixes(&self) -> Vec<IpNet> {
        let mut seen = Vec::new();
        for (net, _) in &self.entries {
            if !seen.contains(net) {
                seen.push(*net);
            }
        }
        seen
    }
}

impl<T: Clone> PrefixIndex<T> {
    /// Insert a prefix, address or range; a range inserts every covering block
    /// with the same payload. Returns the blocks inserted.
    pub fn add_prefix(&mut self, prefix: &str, payload: T) -> Result<Vec<IpNet>> {
        let nets = parse_prefixes(prefix)?;
        for net in &nets {
            self.insert(*net, payload.clone());
        }
        Ok(nets)
    }
}

impl<T> Default for PrefixIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}
