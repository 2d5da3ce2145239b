//! ARIN suballocation discovery.
//!
//! Starting from the ARIN records for a prefix, list the networks ARIN has
//! registered beneath them (`r > <prefix>`) and index every block, so the
//! most specific holder of the queried prefix can be picked out.
//!
//! The related-network listing is free text meant for people. Lines are
//! recognised by shape alone: a handle such as `(NET-198-51-100-0-1)` and
//! two address literals somewhere among at least five words. Other
//! registries or future ARIN formats may need this scanner adjusted.

use std::collections::BTreeSet;
use std::net::IpAddr;

use futures::future::join_all;
use ipnet::IpNet;
use tracing::debug;

use crate::answer::{filter_answers, merge_by_server, Answer};
use crate::authority::get_authority;
use crate::error::Result;
use crate::prefix::{parse_prefix, parse_prefixes, range_to_prefixes, PrefixIndex};
use crate::query::{WhoisQuery, DELEGATION_TIMEOUT};
use crate::record::FieldFilter;
use crate::servers::{Rir, ARIN_WHOIS_SERVER};
use crate::transport::Transport;

/// Minimum word count of a related-network line
const MIN_LISTING_WORDS: usize = 5;

/// Payload of the delegation index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delegate {
    /// ARIN's own answer for a block it returned
    Answer(Answer),
    /// Handle of a network registered under one of those blocks
    Handler(String),
}

/// A network handle and the address range it covers
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Suballocation {
    pub handle: String,
    pub start: IpAddr,
    pub end: IpAddr,
}

impl Suballocation {
    pub fn prefixes(&self) -> Vec<IpNet> {
        range_to_prefixes(self.start, self.end).unwrap_or_default()
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    /// Handle written as `(NET-...)`, the way listings print it
    Handle(&'a str),
    /// Handle-shaped word without parentheses, possibly just a network name
    BareHandle(&'a str),
    Address(IpAddr),
    Other,
}

fn classify(word: &str) -> Token<'_> {
    if let Some(inner) = word.strip_prefix('(').and_then(|w| w.strip_suffix(')')) {
        if is_handle(inner) {
            return Token::Handle(inner);
        }
    }

    let bare = word.trim_start_matches('(').trim_end_matches(')');
    if is_handle(bare) {
        return Token::BareHandle(bare);
    }
    match bare.parse::<IpAddr>() {
        Ok(addr) => Token::Address(addr),
        Err(_) => Token::Other,
    }
}

/// `NET-` followed by digits and dashes; `NET6-` handles also carry hex digits
fn is_handle(word: &str) -> bool {
    if let Some(rest) = word.strip_prefix("NET-") {
        return !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit() || c == '-');
    }
    if let Some(rest) = word.strip_prefix("NET6-") {
        return !rest.is_empty() && rest.chars().all(|c| c.is_ascii_hexdigit() || c == '-');
    }
    false
}

/// Pull a handle and its address range out of one related-network line
pub fn scan_suballocation(line: &str) -> Option<Suballocation> {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.len() < MIN_LISTING_WORDS {
        return None;
    }

    let mut handle = None;
    let mut bare_handle = None;
    let mut addresses = Vec::with_capacity(2);

    for word in words {
        match classify(word) {
            Token::Handle(h) if handle.is_none() => handle = Some(h),
            Token::BareHandle(h) if bare_handle.is_none() => bare_handle = Some(h),
            Token::Address(addr) if addresses.len() < 2 => addresses.push(addr),
            _ => {}
        }
    }

    // A parenthesized handle wins over a network name that merely looks like one
    let handle = handle.or(bare_handle)?;
    let [start, end] = addresses.as_slice() else {
        return None;
    };

    Some(Suballocation {
        handle: handle.to_string(),
        start: *start,
        end: *end,
    })
}

/// Every block named by a `NetRange` field of the answer
fn net_ranges(answer: &Answer) -> Vec<IpNet> {
    answer
        .data
        .iter()
        .flat_map(|record| record.iter())
        .filter(|field| field.key == "NetRange")
        .filter_map(|field| field.value.as_single())
        .flat_map(|value| match parse_prefixes(value) {
            Ok(nets) => nets,
            Err(e) => {
                debug!(%value, error = %e, "skipping unparsable NetRange");
                Vec::new()
            }
        })
        .collect()
}

pub struct DelegationResolver<'a, T> {
    engine: &'a WhoisQuery<T>,
    flag: String,
}

impl<'a, T: Transport> DelegationResolver<'a, T> {
    pub fn new(engine: &'a WhoisQuery<T>, flag: &str) -> Self {
        Self {
            engine,
            flag: flag.to_string(),
        }
    }

    /// Most specific answer for `prefix`, falling back to ARIN's own answer
    /// when nothing more specific turns up
    pub async fn resolve(&self, prefix: &str, fields: &FieldFilter) -> Result<Vec<Answer>> {
        let parent = parse_prefix(prefix)?;
        let start = parent.network().to_string();
        let parent_query = parent.to_string();

        let (parent_answers, start_answers) = futures::join!(
            self.query_arin(&parent_query),
            self.query_arin(&start),
        );

        let index = self.discover(&parent_answers, &start_answers).await;
        let result = filter_answers(self.select(&index, &parent, &parent_answers).await, fields);

        if result.is_empty() {
            debug!(%parent, "nothing more specific found, keeping ARIN answer");
            return Ok(filter_answers(parent_answers, fields));
        }
        Ok(result)
    }

    /// Index ARIN's answers by their `NetRange`, then every network listed
    /// beneath those ranges by its handle
    pub async fn discover(&self, parent_answers: &[Answer], start_answers: &[Answer]) -> PrefixIndex<Delegate> {
        let mut index = PrefixIndex::new();

        for answer in parent_answers.iter().chain(start_answers) {
            let delegate = Delegate::Answer(Answer::new(ARIN_WHOIS_SERVER, answer.data.clone()));
            for net in net_ranges(answer) {
                index.insert(net, delegate.clone());
            }
        }

        // Only ARIN's own blocks are indexed so far
        let ranges = index.prefixes();

        let listings = join_all(
            ranges
                .iter()
                .map(|net| async move { self.query_arin(&format!("r > {}", net)).await }),
        )
        .await;

        let suballocations: BTreeSet<Suballocation> = listings
            .iter()
            .flatten()
            .flat_map(|answer| answer.data.iter())
            .flat_map(|record| record.iter())
            .filter_map(|field| scan_suballocation(&field.key))
            .collect();

        for sub in suballocations {
            for net in sub.prefixes() {
                index.insert(net, Delegate::Handler(sub.handle.clone()));
            }
        }

        debug!(ranges = ranges.len(), entries = index.len(), "delegation index built");
        index
    }

    async fn select(&self, index: &PrefixIndex<Delegate>, parent: &IpNet, parent_answers: &[Answer]) -> Vec<Answer> {
        let matches = index.get_match_net(parent);

        if matches.is_empty() {
            return self.fall_back(parent, parent_answers).await;
        }

        if let Some(answer) = matches.iter().find_map(|delegate| match delegate {
            Delegate::Answer(answer) => Some(answer.clone()),
            Delegate::Handler(_) => None,
        }) {
            return vec![answer];
        }

        let mut handlers: Vec<&str> = Vec::new();
        for delegate in &matches {
            if let Delegate::Handler(handle) = delegate {
                if !handlers.contains(&handle.as_str()) {
                    handlers.push(handle.as_str());
                }
            }
        }

        debug!(?handlers, "querying suballocation handlers");
        let hosts = Rir::all_hosts();
        let per_handler = join_all(handlers.iter().map(|handle| {
            let hosts = &hosts;
            async move {
                self.engine
                    .fan_out(handle, hosts, &self.flag, DELEGATION_TIMEOUT)
                    .await
            }
        }))
        .await;

        merge_by_server(per_handler.into_iter().flatten())
    }

    /// No indexed block holds the prefix: follow ARIN's referral, or ask every RIR
    async fn fall_back(&self, parent: &IpNet, parent_answers: &[Answer]) -> Vec<Answer> {
        let servers = match get_authority(parent_answers) {
            Some(rir) => vec![rir.host().to_string()],
            None => Rir::all_hosts(),
        };

        self.engine
            .fan_out(&parent.to_string(), &servers, &self.flag, DELEGATION_TIMEOUT)
            .await
    }

    async fn query_arin(&self, query: &str) -> Vec<Answer> {
        self.engine
            .fan_out(query, &[ARIN_WHOIS_SERVER.to_string()], &self.flag, DELEGATION_TIMEOUT)
            .await
    }
}
