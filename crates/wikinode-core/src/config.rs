//! Engine tuning knobs

use serde::{Deserialize, Serialize};

use crate::graph::ScaleMode;

/// Settings for an [`ExpansionEngine`](crate::engine::ExpansionEngine).
///
/// Every field has a default, so partial configuration files deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Related articles requested per expansion
    pub related_limit: usize,
    /// Concurrent popularity/link-count lookups per expansion
    pub fetch_concurrency: usize,
    /// Concurrent outbound-link resolutions while ranking
    pub link_concurrency: usize,
    /// Candidates kept after ranking
    pub max_results: usize,
    /// Color-code nodes by popularity
    pub colorize: bool,
    pub scale: ScaleMode,
    /// Popularity multiplier for trending titles
    pub trending_boost: f64,
    /// Clustering-coefficient window for expansion suggestions
    pub suggestion_min_lcc: f64,
    pub suggestion_max_lcc: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            related_limit: 20,
            fetch_concurrency: 8,
            link_concurrency: 8,
            max_results: 10,
            colorize: false,
            scale: ScaleMode::Linear,
            trending_boost: 1.1,
            suggestion_min_lcc: 0.3,
            suggestion_max_lcc: 0.5,
        }
    }
}

impl EngineConfig {
    /// Popularity after the trending boost, if the title is trending
    pub fn boosted(&self, popularity: u64, trending: bool) -> u64 {
        if trending {
            (popularity as f64 * self.trending_boost).round() as u64
        } else {
            popularity
        }
    }
}
