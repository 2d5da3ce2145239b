//! Authority detection from ARIN referral metadata.
//!
//! ARIN publishes `NetType: Allocated to <RIR>` on blocks it handed to
//! another registry. That is the only signal used here.

use tracing::debug;

use crate::answer::Answer;
use crate::servers::{Rir, ARIN_WHOIS_SERVER};

const ALLOCATED_TO: &str = "Allocated to ";

/// Name of the registry ARIN says is authoritative, if any
pub fn get_authority(answers: &[Answer]) -> Option<Rir> {
    let arin = answers.iter().find(|a| a.server == ARIN_WHOIS_SERVER)?;

    let value = arin
        .data
        .iter()
        .flat_map(|record| record.iter())
        .filter(|field| field.key == "NetType")
        .filter_map(|field| field.value.as_single())
        .find(|value| value.contains(ALLOCATED_TO))?;

    let ident = value
        .replacen(ALLOCATED_TO, "", 1)
        .replacen(" NCC", "", 1)
        .trim()
        .to_lowercase();

    let rir = Rir::from_ident(&ident);
    if rir.is_none() {
        debug!(%ident, "referral names an unknown registry");
    }
    rir
}

/// Tag each answer with whether its server is the authoritative one.
/// Answers are returned untouched when no authority can be determined.
pub fn set_authority(answers: Vec<Answer>) -> Vec<Answer> {
    let Some(rir) = get_authority(&answers) else {
        return answers;
    };

    answers
        .into_iter()
        .map(|mut answer| {
            answer.authority = Some(answer.server.contains(rir.host()));
            answer
        })
        .collect()
}
