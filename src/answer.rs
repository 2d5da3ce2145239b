use serde::Serialize;

use crate::record::{parse_records, FieldFilter, Record};

/// Parsed reply of one server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub server: String,
    pub data: Vec<Record>,
    /// `Some(true)` when this server was named authoritative, `Some(false)` when
    /// another one was, `None` when authority could not be determined
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authority: Option<bool>,
}

impl Answer {
    pub fn new(server: impl Into<String>, data: Vec<Record>) -> Self {
        Self {
            server: server.into(),
            data,
            authority: None,
        }
    }

    /// Parse the raw text a server returned
    pub fn parse(server: impl Into<String>, text: &str, filter: &FieldFilter) -> Self {
        Self::new(server, parse_records(text, filter))
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Drop fields the filter rejects, then records left without fields
    pub fn filtered(&self, filter: &FieldFilter) -> Answer {
        let data = self
            .data
            .iter()
            .map(|record| record.filtered(filter))
            .filter(|record| !record.is_empty())
            .collect();

        Answer {
            server: self.server.clone(),
            data,
            authority: self.authority,
        }
    }
}

/// Apply a field filter to every answer, removing answers left without records
pub fn filter_answers(answers: Vec<Answer>, filter: &FieldFilter) -> Vec<Answer> {
    if filter.is_empty() {
        return answers;
    }

    answers
        .iter()
        .map(|answer| answer.filtered(filter))
        .filter(|answer| !answer.is_empty())
        .collect()
}

/// Combine answers from the same server, appending their records in order
pub fn merge_by_server(answers: impl IntoIterator<Item = Answer>) -> Vec<Answer> {
    let mut merged: Vec<Answer> = Vec::new();

    for answer in answers {
        match merged.iter_mut().find(|a| a.server == answer.server) {
            Some(existing) => existing.data.extend(answer.data),
            None => merged.push(answer),
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Field;

    fn sample() -> Vec<Answer> {
        vec![
            Answer::parse(
                "whois.arin.net",
                "NetRange: 192.0.2.0 - 192.0.2.255\nNetType: Direct Allocation\n\nOrgName: Example\n",
                &FieldFilter::all(),
            ),
            Answer::parse("whois.ripe.net", "inetnum: 192.0.2.0 - 192.0.2.255\n", &FieldFilter::all()),
        ]
    }

    #[test]
    fn test_empty_filter_returns_input() {
        let answers = sample();
        assert_eq!(filter_answers(answers.clone(), &FieldFilter::all()), answers);
    }

    #[test]
    fn test_filter_without_matching_fields_is_empty() {
        assert!(filter_answers(sample(), &FieldFilter::new(["abuse-mailbox"])).is_empty());
    }

    #[test]
    fn test_filter_drops_records_and_answers() {
        let filtered = filter_answers(sample(), &FieldFilter::new(["nettype"]));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].server, "whois.arin.net");
        assert_eq!(filtered[0].data.len(), 1);
        assert_eq!(filtered[0].data[0].fields(), &[Field::new("NetType", "Direct Allocation")]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let filter = FieldFilter::new(["netrange", "inetnum"]);
        let once = filter_answers(sample(), &filter);
        assert_eq!(filter_answers(once.clone(), &filter), once);
    }

    #[test]
    fn test_merge_by_server_accumulates() {
        let a = Answer::new("whois.arin.net", vec![Record::new(vec![Field::new("NetHandle", "NET-1")])]);
        let b = Answer::new("whois.ripe.net", vec![Record::new(vec![Field::new("inetnum", "x")])]);
        let c = Answer::new("whois.arin.net", vec![Record::new(vec![Field::new("NetHandle", "NET-2")])]);

        let merged = merge_by_server(vec![a, b, c]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].server, "whois.arin.net");
        assert_eq!(merged[0].data.len(), 2);
        assert_eq!(merged[0].data[1].get("NetHandle").unwrap().value.as_single(), Some("NET-2"));
    }

    #[test]
    fn test_serialize_shape() {
        let mut answer = Answer::parse("whois.arin.net", "NetName: EX\nComment: a\n", &FieldFilter::all());
        let json = serde_json::to_value(&answer).unwrap();
        assert!(json.get("authority").is_none());
        assert_eq!(json["data"][0][0]["key"], "NetName");
        assert_eq!(json["data"][0][1]["value"][0], "a");

        answer.authority = Some(true);
        let json = serde_json::to_value(&answer).unwrap();
        assert_eq!(json["authority"], true);
    }
}
