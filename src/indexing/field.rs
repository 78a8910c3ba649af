use bitflags::bitflags;

use crate::config::ScoringConfig;

bitflags! {
    /// Which field(s) a forward-index occurrence came from.
    ///
    /// Shared by the forward encoder and the inverted scorer.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct FieldMask: u8 {
        const TITLE = 1 << 0;
        const BODY = 1 << 1;
        const TAG = 1 << 2;
    }
}

/// Score of one occurrence: body base, title bonus and tag bonus for each bit set.
pub fn occurrence_score(mask: FieldMask, scoring: &ScoringConfig) -> i32 {
    let mut score = 0;
    if mask.contains(FieldMask::BODY) {
        score += scoring.body_base;
    }
    if mask.contains(FieldMask::TITLE) {
        score += scoring.title_bonus;
    }
    if mask.contains(FieldMask::TAG) {
        score += scoring.tag_bonus;
    }
    score
}
