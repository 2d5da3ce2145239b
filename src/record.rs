//! Line-oriented WHOIS text parsing.
//!
//! A reply is split into records at blank lines. Each remaining line is a
//! `key: value` pair split on the first colon; banner lines starting with
//! `%` or `#` and lines without a key are dropped. Repeated annotation
//! fields (`comment`, `remarks`, `descr`) are folded into one list-valued
//! field per kind at the end of their record.

use std::collections::HashSet;

use serde::Serialize;

/// Keys folded into a single list-valued field, with their normalized spelling
const FOLDED_KEYS: [(&str, &str); 3] = [("comment", "Comment"), ("remarks", "remarks"), ("descr", "descr")];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Single(String),
    Folded(Vec<String>),
}

impl FieldValue {
    /// Every value carried, one per original line
    pub fn values(&self) -> Vec<&str> {
        match self {
            FieldValue::Single(value) => vec![value.as_str()],
            FieldValue::Folded(values) => values.iter().map(String::as_str).collect(),
        }
    }

    pub fn as_single(&self) -> Option<&str> {
        match self {
            FieldValue::Single(value) => Some(value),
            FieldValue::Folded(_) => None,
        }
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.values().iter().any(|v| v.contains(needle))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub key: String,
    pub value: FieldValue,
}

impl Field {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: FieldValue::Single(value.into()),
        }
    }

    pub fn folded(key: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            key: key.into(),
            value: FieldValue::Folded(values),
        }
    }
}

/// One blank-line-delimited paragraph of a reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: Vec<Field>,
}

impl Record {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// First field with exactly this key
    pub fn get(&self, key: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// First field whose key matches case-insensitively
    pub fn get_ignore_case(&self, key: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.key.eq_ignore_ascii_case(key))
    }

    /// Keep only the fields the filter allows
    pub fn filtered(&self, filter: &FieldFilter) -> Record {
        Record::new(
            self.fields
                .iter()
                .filter(|f| filter.allows(&f.key))
                .cloned()
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Case-insensitive allow-list of field keys; an empty filter allows everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldFilter {
    keys: HashSet<String>,
}

impl FieldFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keys: keys
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn allows(&self, key: &str) -> bool {
        self.keys.is_empty() || self.keys.contains(&key.to_lowercase())
    }
}

/// Parse raw reply text into records, applying the field filter before grouping
pub fn parse_records(text: &str, filter: &FieldFilter) -> Vec<Record> {
    let mut records = Vec::new();
    let mut current = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                records.push(fold_annotations(std::mem::take(&mut current)));
            }
            continue;
        }

        if let Some(field) = parse_line(line) {
            if filter.allows(&field.key) {
                current.push(field);
            }
        }
    }

    if !current.is_empty() {
        records.push(fold_annotations(current));
    }

    records
}

/// Split a non-blank line into a field, or drop it
fn parse_line(line: &str) -> Option<Field> {
    if line.starts_with('%') || line.starts_with('#') {
        return None;
    }

    let (key, value) = match line.split_once(':') {
        Some((key, value)) => (key.trim(), value.trim()),
        None => (line, ""),
    };

    if key.is_empty() {
        return None;
    }

    Some(Field::new(key, value))
}

/// Move `comment`/`remarks`/`descr` fields to the end, one list-valued field per kind
fn fold_annotations(fields: Vec<Field>) -> Record {
    let mut rest = Vec::with_capacity(fields.len());
    let mut folded: [Vec<String>; 3] = Default::default();

    for field in fields {
        let slot = FOLDED_KEYS
            .iter()
            .position(|(kind, _)| field.key.eq_ignore_ascii_case(kind));

        match slot {
            Some(i) => folded[i].extend(field.value.values().into_iter().map(String::from)),
            None => rest.push(field),
        }
    }

    for ((_, key), values) in FOLDED_KEYS.iter().zip(folded) {
        if !values.is_empty() {
            rest.push(Field::folded(*key, values));
        }
    }

    Record::new(rest)
}
