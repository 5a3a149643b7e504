use recon_model::{Pattern, PatternId};

/// Minimum cosine similarity for a pattern to contribute a boost (§4.5, §4.6 table).
pub const SIMILARITY_MIN: f64 = 0.85;

/// A pattern that qualified for a boost against some query embedding.
#[derive(Clone, Debug, PartialEq)]
pub struct PatternBoost {
    pub pattern_id: PatternId,
    pub similarity: f64,
    pub boost: f64,
}

/// Resolve the boost to apply given the index's nearest-neighbor results and the patterns they
/// resolve to: only active patterns clearing [`SIMILARITY_MIN`] qualify; when several qualify,
/// the maximum boost wins (§4.5 "if multiple qualifying patterns are found, use the maximum
/// boost").
pub fn resolve_boost(nearest: &[(PatternId, f32)], lookup: impl Fn(&PatternId) -> Option<Pattern>) -> Option<PatternBoost> {
    nearest
        .iter()
        .filter_map(|(id, similarity)| {
            let similarity = f64::from(*similarity);
            if similarity < SIMILARITY_MIN {
                return None;
            }
            let pattern = lookup(id)?;
            if !pattern.active {
                return None;
            }
            Some(PatternBoost { pattern_id: id.clone(), similarity, boost: pattern.boost })
        })
        .max_by(|a, b| a.boost.partial_cmp(&b.boost).unwrap_or(std::cmp::Ordering::Equal))
}
