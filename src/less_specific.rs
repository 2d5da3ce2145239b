//! Search outward through the prefixes containing a query until a caller
//! predicate accepts the resolved answers.
//!
//! Steps run strictly one at a time from most to least specific. A step is
//! only worth resolving once every longer prefix has been rejected, so the
//! loop returns at the first accepted step and never resolves a shorter one.

use std::str::FromStr;

use ipnet::IpNet;
use tracing::{debug, warn};

use crate::answer::{filter_answers, Answer};
use crate::error::{Result, WhoisError};
use crate::prefix::{parse_prefix, parse_prefixes, PrefixIndex};
use crate::query::{QueryOptions, WhoisQuery};
use crate::transport::Transport;

/// Record fields holding the address range a record describes
const RANGE_KEYS: [&str; 3] = ["inetnum", "inet6num", "netrange"];

/// Shortest prefix lengths the search widens to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LessSpecificOptions {
    pub ipv4_floor: u8,
    pub ipv6_floor: u8,
}

impl Default for LessSpecificOptions {
    fn default() -> Self {
        Self {
            ipv4_floor: 16,
            ipv6_floor: 32,
        }
    }
}

impl LessSpecificOptions {
    pub fn floor_for(&self, net: &IpNet) -> u8 {
        match net {
            IpNet::V4(_) => self.ipv4_floor,
            IpNet::V6(_) => self.ipv6_floor,
        }
    }
}

/// Containing prefixes of `net` from its own length down to `floor`, same base address
pub fn candidates(net: &IpNet, floor: u8) -> Vec<IpNet> {
    (floor..=net.prefix_len())
        .rev()
        .filter_map(|len| IpNet::new(net.network(), len).ok())
        .map(|candidate| candidate.trunc())
        .collect()
}

/// Accepts an answer set when some record has a field with this key and,
/// if given, a value containing the expected text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPredicate {
    pub key: String,
    pub value: Option<String>,
}

impl FieldPredicate {
    pub fn matches(&self, answers: &[Answer]) -> bool {
        answers
            .iter()
            .flat_map(|answer| answer.data.iter())
            .flat_map(|record| record.iter())
            .filter(|field| field.key.eq_ignore_ascii_case(&self.key))
            .any(|field| match &self.value {
                Some(expected) => field.value.contains(expected),
                None => true,
            })
    }
}

impl FromStr for FieldPredicate {
    type Err = String;

    /// Parse `KEY` or `KEY=VALUE`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (key, value) = match s.split_once('=') {
            Some((key, value)) => (key.trim(), Some(value.trim().to_string())),
            None => (s.trim(), None),
        };

        if key.is_empty() {
            return Err(format!("missing field name in '{}'", s));
        }

        Ok(Self {
            key: key.to_string(),
            value,
        })
    }
}

pub struct LessSpecificSearch<'a, T> {
    engine: &'a WhoisQuery<T>,
    options: LessSpecificOptions,
}

impl<'a, T: Transport> LessSpecificSearch<'a, T> {
    pub fn new(engine: &'a WhoisQuery<T>, options: LessSpecificOptions) -> Self {
        Self { engine, options }
    }

    /// Resolve each containing prefix of `query` in turn and return the first
    /// answer set `predicate` accepts, narrowed to the records most
    /// specifically covering `query`.
    pub async fn search<F>(&self, query: &str, query_options: &QueryOptions, mut predicate: F) -> Result<Vec<Answer>>
    where
        F: FnMut(&[Answer]) -> bool,
    {
        let original = parse_prefix(query)?;
        let floor = self.options.floor_for(&original);

        // Narrowing needs the range fields, so resolve unfiltered
        let step_options = query_options.clone().with_fields(Default::default());

        for candidate in candidates(&original, floor) {
            debug!(%candidate, "resolving less specific prefix");

            let answers = match self.engine.lookup_prefix(&candidate.to_string(), &step_options).await {
                Ok(answers) => answers,
                Err(e) => {
                    warn!(%candidate, error = %e, "resolution failed, widening");
                    continue;
                }
            };

            if predicate(answers.as_slice()) {
                debug!(%candidate, "predicate matched");
                let narrowed = narrow_to_most_specific(answers, &original);
                return Ok(filter_answers(narrowed, &query_options.fields));
            }
        }

        Err(WhoisError::NoCoveringAllocation {
            query: original.to_string(),
            floor,
        })
    }
}

/// Keep only the records whose own range is the most specific one still
/// containing `original`. Answers are returned whole if no record says
/// which range it describes.
pub fn narrow_to_most_specific(answers: Vec<Answer>, original: &IpNet) -> Vec<Answer> {
    let mut index = PrefixIndex::new();

    for (a, answer) in answers.iter().enumerate() {
        for (r, record) in answer.data.iter().enumerate() {
            let ranges = record
                .iter()
                .filter(|field| RANGE_KEYS.iter().any(|key| field.key.eq_ignore_ascii_case(key)))
                .filter_map(|field| field.value.as_single())
                .filter_map(|value| parse_prefixes(value).ok())
                .flatten();

            for net in ranges {
                index.insert(net, (a, r));
            }
        }
    }

    let matches = index.matches(original);
    let Some(most_specific) = matches.first().map(|(net, _)| **net) else {
        return answers;
    };

    let keep: Vec<(usize, usize)> = matches
        .iter()
        .filter(|(net, _)| **net == most_specific)
        .map(|(_, position)| **position)
        .collect();

    answers
        .into_iter()
        .enumerate()
        .filter_map(|(a, mut answer)| {
            answer.data = answer
                .data
                .into_iter()
                .enumerate()
                .filter(|(r, _)| keep.contains(&(a, *r)))
                .map(|(_, record)| record)
                .collect();
            (!answer.is_empty()).then_some(answer)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldFilter;
    use crate::servers::{ARIN_WHOIS_SERVER, RIPE_WHOIS_SERVER};
    use crate::stub::StubTransport;

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    #[test]
    fn test_candidates_sequence() {
        assert_eq!(
            candidates(&net("192.0.2.128/26"), 23),
            vec![net("192.0.2.128/26"), net("192.0.2.128/25"), net("192.0.2.0/24"), net("192.0.2.0/23")]
        );
        assert_eq!(candidates(&net("10.0.0.0/16"), 16), vec![net("10.0.0.0/16")]);
        assert!(candidates(&net("10.0.0.0/8"), 16).is_empty());
    }

    #[test]
    fn test_floor_by_family() {
        let options = LessSpecificOptions::default();
        assert_eq!(options.floor_for(&net("192.0.2.0/24")), 16);
        assert_eq!(options.floor_for(&net("2001:db8::/48")), 32);
    }

    #[test]
    fn test_field_predicate_parse_and_match() {
        let predicate: FieldPredicate = "status=ALLOCATED".parse().unwrap();
        assert_eq!(predicate.key, "status");
        assert_eq!(predicate.value.as_deref(), Some("ALLOCATED"));
        assert!("=x".parse::<FieldPredicate>().is_err());

        let answers = vec![Answer::parse(
            RIPE_WHOIS_SERVER,
            "inetnum: 193.0.0.0 - 193.0.7.255\nstatus: ALLOCATED PA\n",
            &FieldFilter::all(),
        )];
        assert!(predicate.matches(&answers));
        assert!("Status".parse::<FieldPredicate>().unwrap().matches(&answers));
        assert!(!"status=ASSIGNED".parse::<FieldPredicate>().unwrap().matches(&answers));
    }

    #[test]
    fn test_narrow_keeps_most_specific_record() {
        let answers = vec![
            Answer::parse(
                RIPE_WHOIS_SERVER,
                "inetnum: 193.0.0.0 - 193.0.255.255\nnetname: WIDE\n\ninetnum: 193.0.0.0 - 193.0.7.255\nnetname: NARROW\n\nroute: 193.0.0.0/21\n",
                &FieldFilter::all(),
            ),
            Answer::parse(ARIN_WHOIS_SERVER, "NetRange: 193.0.0.0 - 193.255.255.255\n", &FieldFilter::all()),
        ];

        let narrowed = narrow_to_most_specific(answers, &net("193.0.4.0/24"));
        assert_eq!(narrowed.len(), 1);
        assert_eq!(narrowed[0].data.len(), 1);
        assert_eq!(narrowed[0].data[0].get("netname").unwrap().value.as_single(), Some("NARROW"));
    }

    #[test]
    fn test_narrow_without_ranges_returns_input() {
        let answers = vec![Answer::parse(RIPE_WHOIS_SERVER, "aut-num: AS3333\n", &FieldFilter::all())];
        assert_eq!(narrow_to_most_specific(answers.clone(), &net("193.0.4.0/24")), answers);
    }

    #[tokio::test]
    async fn test_search_stops_at_first_match() {
        let stub = StubTransport::new()
            .with_reply(ARIN_WHOIS_SERVER, "198.51.100.0/23", "NetType: Allocated to RIPE NCC\n")
            .with_reply(
                RIPE_WHOIS_SERVER,
                "198.51.100.0/23",
                "inetnum: 198.51.100.0 - 198.51.101.255\nnetname: EXAMPLE\nstatus: ALLOCATED PA\n",
            );
        let engine = WhoisQuery::new(stub);
        let search = LessSpecificSearch::new(&engine, LessSpecificOptions { ipv4_floor: 20, ipv6_floor: 32 });

        let predicate: FieldPredicate = "status=ALLOCATED".parse().unwrap();
        let answers = search
            .search("198.51.100.0/24", &QueryOptions::default(), |answers| predicate.matches(answers))
            .await
            .unwrap();

        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].server, RIPE_WHOIS_SERVER);

        let queried: Vec<String> = engine.transport().calls().into_iter().map(|(_, q)| q).collect();
        assert!(queried.iter().any(|q| q == "198.51.100.0/24"));
        assert!(queried.iter().any(|q| q == "198.51.100.0/23"));
        for shorter in ["198.51.100.0/22", "198.51.96.0/21", "198.51.96.0/20"] {
            assert!(!queried.iter().any(|q| q.contains(shorter)), "{} was resolved", shorter);
        }
    }

    #[tokio::test]
    async fn test_search_applies_fields_after_narrowing() {
        let stub = StubTransport::new()
            .with_reply(ARIN_WHOIS_SERVER, "198.51.100.0/24", "NetType: Allocated to RIPE NCC\n")
            .with_reply(
                RIPE_WHOIS_SERVER,
                "198.51.100.0/24",
                "inetnum: 198.51.100.0 - 198.51.100.255\nnetname: EXAMPLE\n",
            );
        let engine = WhoisQuery::new(stub);
        let search = LessSpecificSearch::new(&engine, LessSpecificOptions::default());
        let options = QueryOptions::default().with_fields(FieldFilter::new(["netname"]));

        let answers = search
            .search("198.51.100.0/24", &options, |answers| !answers.is_empty())
            .await
            .unwrap();

        assert_eq!(answers[0].data[0].len(), 1);
        assert_eq!(answers[0].data[0].fields()[0].key, "netname");
    }

    #[tokio::test]
    async fn test_search_exhausts_floor() {
        let engine = WhoisQuery::new(StubTransport::new());
        let search = LessSpecificSearch::new(&engine, LessSpecificOptions { ipv4_floor: 22, ipv6_floor: 32 });

        let mut steps = 0;
        let err = search
            .search("192.0.2.0/24", &QueryOptions::default(), |_| {
                steps += 1;
                false
            })
            .await
            .unwrap_err();

        assert_eq!(steps, 3);
        assert!(matches!(err, WhoisError::NoCoveringAllocation { floor: 22, .. }));
    }
}
