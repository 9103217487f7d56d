//! Mention scoring.
//!
//! A mention's score combines how early the entity appears in an artifact
//! with the sentiment of the mention. Scores are always recomputed from
//! these inputs, never hand-set.

use crate::error::{Error, Result};
use crate::models::Sentiment;

/// Multiplier applied per sentiment.
pub fn sentiment_weight(sentiment: Sentiment) -> f64 {
    match sentiment {
        Sentiment::Positive => 1.0,
        Sentiment::Neutral => 0.6,
        Sentiment::Negative => 0.2,
    }
}

/// Compute a mention score in `[0, 1]`.
///
/// `score = (1 / position) * sentiment_weight`. Position is 1-indexed;
/// anything below 1 is a domain error and fails the whole analysis rather
/// than persisting a partial result.
pub fn mention_score(position: i32, sentiment: Sentiment) -> Result<f64> {
    if position < 1 {
        return Err(Error::InvalidInput(format!(
            "mention position must be >= 1, got {position}"
        )));
    }

    let position_weight = 1.0 / position as f64;
    Ok(position_weight * sentiment_weight(sentiment))
}
