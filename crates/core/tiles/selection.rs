//! Trimming a tile set to a per-mode budget.

use super::grid::Tile;
use crate::config::TileConfig;
use gridline_types::BoundingBox;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Query mode: geographic spread or density around the viewport centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    Overview,
    #[default]
    Full,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::Overview => "overview",
            QueryMode::Full => "full",
        }
    }

    pub fn tile_budget(&self, config: &TileConfig) -> usize {
        match self {
            QueryMode::Overview => config.overview_tile_budget,
            QueryMode::Full => config.full_tile_budget,
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reduce `tiles` to at most `budget` entries.
///
/// Sets within budget pass through unchanged. Otherwise:
/// - `Overview`: sort into raster order (latitude, then longitude), take every
///   `ceil(n / budget)`-th tile, then backfill with unused tiles in raster
///   order until the budget is met.
/// - `Full`: the `budget` tiles whose centres are nearest the viewport centre
///   (Euclidean, in degrees); ties keep raster order.
pub fn select_tiles(
    mut tiles: Vec<Tile>,
    mode: QueryMode,
    budget: usize,
    viewport: &BoundingBox,
) -> Vec<Tile> {
    if tiles.len() <= budget {
        return tiles;
    }
    if budget == 0 {
        return Vec::new();
    }

    tiles.sort_by(|a, b| {
        a.min_lat
            .total_cmp(&b.min_lat)
            .then(a.min_lon.total_cmp(&b.min_lon))
    });

    match mode {
        QueryMode::Overview => select_spread(tiles, budget),
        QueryMode::Full => select_nearest(tiles, budget, viewport.center()),
    }
}

fn select_spread(tiles: Vec<Tile>, budget: usize) -> Vec<Tile> {
    let stride = tiles.len().div_ceil(budget);
    let mut used = vec![false; tiles.len()];
    let mut selected = Vec::with_capacity(budget);

    for idx in (0..tiles.len()).step_by(stride).take(budget) {
        used[idx] = true;
        selected.push(tiles[idx]);
    }

    for (idx, tile) in tiles.iter().enumerate() {
        if selected.len() >= budget {
            break;
        }
        if !used[idx] {
            selected.push(*tile);
        }
    }

    selected
}

fn select_nearest(mut tiles: Vec<Tile>, budget: usize, center: [f64; 2]) -> Vec<Tile> {
    let distance = |tile: &Tile| {
        let c = tile.center();
        let dx = c[0] - center[0];
        let dy = c[1] - center[1];
        dx * dx + dy * dy
    };
    // Stable sort keeps raster order among equidistant tiles
    tiles.sort_by(|a, b| distance(a).total_cmp(&distance(b)));
    tiles.truncate(budget);
    tiles
}
