//! Job progress aggregation.
//!
//! A job's `done` percentage and `last_update` timestamp are cached
//! denormalizations; these pure functions are the single source of truth
//! for recomputing them from the owned tile set. Both are plain sums and
//! maxima, so results are invariant to tile order.

use chrono::{DateTime, Utc};

/// The slice of tile state progress aggregation depends on.
#[derive(Debug, Clone, Copy)]
pub struct TileProgress {
    pub zoom: i64,
    pub checkin: i64,
    pub update: Option<DateTime<Utc>>,
}

/// Percentage of the job's area-weighted tiles completed, 0..=100.
///
/// Each tile weighs `1 / (1 + tile.zoom - job.zoom)^2`: a tile at the
/// job's own zoom weighs 1, and the four children of a split tile weigh
/// a quarter each, so re-splitting keeps the total area weight bounded.
/// Jobs without a zoom (imported boundaries) weigh every tile equally,
/// as does any tile coarser than the job zoom. A job with no tiles
/// reports 0.
pub fn percent_done(job_zoom: Option<i64>, tiles: &[TileProgress]) -> i64 {
    let mut total = 0.0;
    let mut done = 0.0;
    for tile in tiles {
        let weight = tile_weight(job_zoom, tile.zoom);
        total += weight;
        if tile.checkin > 0 {
            done += weight;
        }
    }

    if total == 0.0 {
        return 0;
    }
    (done * 100.0 / total).round() as i64
}

/// Most recent tile update, or `None` when no tile was ever updated.
pub fn last_update(tiles: &[TileProgress]) -> Option<DateTime<Utc>> {
    tiles.iter().filter_map(|tile| tile.update).max()
}

fn tile_weight(job_zoom: Option<i64>, tile_zoom: i64) -> f64 {
    let Some(job_zoom) = job_zoom else {
        return 1.0;
    };
    let denominator = 1 + tile_zoom - job_zoom;
    if denominator <= 0 {
        return 1.0;
    }
    1.0 / (denominator * denominator) as f64
}
