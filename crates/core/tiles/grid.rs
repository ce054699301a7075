//! Fixed-size world grid.

use crate::error::{GridlineError, Result};
use gridline_types::BoundingBox;
use std::fmt;

/// Upper bound on tiles enumerated for one box.
pub const MAX_GRID_TILES: usize = 1_000_000;

/// Smallest tile size; tile names are rounded to this precision.
pub const MIN_TILE_SIZE_DEG: f64 = 1e-6;

/// Integer lattice coordinates of a tile: `floor(min / size)` per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId {
    pub lon_index: i64,
    pub lat_index: i64,
}

/// One grid cell, identified by its south-west corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tile {
    pub min_lon: f64,
    pub min_lat: f64,
    pub size: f64,
}

impl Tile {
    fn from_indices(lon_index: i64, lat_index: i64, size: f64) -> Self {
        Self {
            min_lon: lon_index as f64 * size,
            min_lat: lat_index as f64 * size,
            size,
        }
    }

    pub fn max_lon(&self) -> f64 {
        self.min_lon + self.size
    }

    pub fn max_lat(&self) -> f64 {
        self.min_lat + self.size
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(self.min_lon, self.min_lat, self.max_lon(), self.max_lat())
    }

    pub fn center(&self) -> [f64; 2] {
        [
            self.min_lon + self.size / 2.0,
            self.min_lat + self.size / 2.0,
        ]
    }

    pub fn id(&self) -> TileId {
        TileId {
            lon_index: (self.min_lon / self.size).round() as i64,
            lat_index: (self.min_lat / self.size).round() as i64,
        }
    }

    /// Stable name derived from the south-west corner, e.g. `m120_20`.
    pub fn name(&self) -> String {
        format!("{}_{}", coord_label(self.min_lon), coord_label(self.min_lat))
    }

    /// File name of the tile at the origin.
    pub fn file_name(&self) -> String {
        format!("{}.geojson", self.name())
    }

    pub fn cache_key(&self) -> String {
        format!("tile:{}", self.name())
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Negative values get an `m` prefix; a decimal point becomes `p`.
fn coord_label(value: f64) -> String {
    let rounded = (value * 1e6).round() / 1e6;
    let magnitude = rounded.abs();
    let digits = if magnitude.fract() == 0.0 {
        format!("{}", magnitude as i64)
    } else {
        format!("{}", magnitude).replace('.', "p")
    };
    if rounded < 0.0 {
        format!("m{}", digits)
    } else {
        digits
    }
}

/// Partition of the world into square cells of `size` degrees, anchored at
/// `(0, 0)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileGrid {
    size: f64,
}

impl TileGrid {
    pub fn new(size: f64) -> Result<Self> {
        if !size.is_finite() || size < MIN_TILE_SIZE_DEG {
            return Err(GridlineError::Config(format!(
                "Tile size must be at least {} degrees, got {}",
                MIN_TILE_SIZE_DEG, size
            )));
        }
        Ok(Self { size })
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    /// The tile containing `(lon, lat)`.
    pub fn tile_at(&self, lon: f64, lat: f64) -> Tile {
        Tile::from_indices(
            (lon / self.size).floor() as i64,
            (lat / self.size).floor() as i64,
            self.size,
        )
    }

    /// Tiles whose cells overlap `bbox`, in raster order (south to north,
    /// then west to east).
    ///
    /// The box is clamped to the world first; a box entirely outside the
    /// world yields no tiles. Cells that only touch the box along an edge
    /// are not included.
    ///
    /// ```
    /// use gridline::tiles::TileGrid;
    /// use gridline_types::BoundingBox;
    ///
    /// let grid = TileGrid::new(5.0).unwrap();
    /// let tiles = grid.tiles_for(&BoundingBox::new(-120.0, 20.0, -70.0, 50.0)).unwrap();
    /// assert_eq!(tiles.len(), 60);
    /// assert_eq!(tiles[0].name(), "m120_20");
    /// ```
    pub fn tiles_for(&self, bbox: &BoundingBox) -> Result<Vec<Tile>> {
        let bbox = BoundingBox::try_new(
            bbox.min_lon(),
            bbox.min_lat(),
            bbox.max_lon(),
            bbox.max_lat(),
        )?;

        let min_lon = bbox.min_lon().max(-180.0);
        let max_lon = bbox.max_lon().min(180.0);
        let min_lat = bbox.min_lat().max(-90.0);
        let max_lat = bbox.max_lat().min(90.0);
        if min_lon >= max_lon || min_lat >= max_lat {
            return Ok(Vec::new());
        }

        let lon_range = (min_lon / self.size).floor() as i64..(max_lon / self.size).ceil() as i64;
        let lat_range = (min_lat / self.size).floor() as i64..(max_lat / self.size).ceil() as i64;

        let span = |range: &std::ops::Range<i64>| {
            range
                .end
                .checked_sub(range.start)
                .and_then(|n| usize::try_from(n).ok())
        };
        let count = span(&lon_range)
            .zip(span(&lat_range))
            .and_then(|(cols, rows)| cols.checked_mul(rows))
            .filter(|&count| count <= MAX_GRID_TILES)
            .ok_or_else(|| {
                GridlineError::InvalidInput(format!(
                    "bounding box covers more than {} tiles of {} degrees",
                    MAX_GRID_TILES, self.size
                ))
            })?;

        let mut tiles = Vec::with_capacity(count);
        for lat_index in lat_range {
            for lon_index in lon_range.clone() {
                tiles.push(Tile::from_indices(lon_index, lat_index, self.size));
            }
        }
        Ok(tiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> TileGrid {
        TileGrid::new(5.0).unwrap()
    }

    #[test]
    fn test_rejects_bad_sizes() {
        assert!(TileGrid::new(0.0).is_err());
        assert!(TileGrid::new(-5.0).is_err());
        assert!(TileGrid::new(f64::NAN).is_err());
        assert!(TileGrid::new(1e-300).is_err());
        assert!(TileGrid::new(MIN_TILE_SIZE_DEG).is_ok());
    }

    #[test]
    fn test_fine_grid_over_world_is_rejected_not_overflowed() {
        let grid = TileGrid::new(MIN_TILE_SIZE_DEG).unwrap();
        let err = grid
            .tiles_for(&BoundingBox::new(-180.0, -90.0, 180.0, 90.0))
            .unwrap_err();
        assert!(matches!(err, GridlineError::InvalidInput(_)));

        // A huge but finite size still yields the single covering tile
        let coarse = TileGrid::new(1e300).unwrap();
        assert_eq!(
            coarse
                .tiles_for(&BoundingBox::new(-10.0, -10.0, 10.0, 10.0))
                .unwrap()
                .len(),
            4
        );
    }

    #[test]
    fn test_tile_names() {
        let grid = grid();
        assert_eq!(grid.tile_at(-117.3, 22.0).name(), "m120_20");
        assert_eq!(grid.tile_at(7.0, -7.0).name(), "5_m10");
        assert_eq!(grid.tile_at(0.0, 0.0).name(), "0_0");
        assert_eq!(grid.tile_at(-0.1, 0.1).file_name(), "m5_0.geojson");
        assert_eq!(grid.tile_at(1.0, 1.0).cache_key(), "tile:0_0");

        let fine = TileGrid::new(2.5).unwrap();
        assert_eq!(fine.tile_at(-1.0, 1.0).name(), "m2p5_0");

        let tenth = TileGrid::new(0.1).unwrap();
        assert_eq!(tenth.tile_at(0.35, 0.05).name(), "0p3_0");
    }

    #[test]
    fn test_id_is_pure_function_of_corner() {
        let grid = grid();
        let a = grid.tile_at(-117.0, 22.0);
        let b = grid.tile_at(-119.9, 24.9);
        assert_eq!(a.id(), b.id());
        assert_eq!(
            a.id(),
            TileId {
                lon_index: -24,
                lat_index: 4
            }
        );
        assert_eq!(a.name(), b.name());
    }

    #[test]
    fn test_tiles_for_raster_order() {
        let tiles = grid()
            .tiles_for(&BoundingBox::new(-12.0, -3.0, 3.0, 7.0))
            .unwrap();
        let names: Vec<String> = tiles.iter().map(Tile::name).collect();
        assert_eq!(
            names,
            vec![
                "m15_m5", "m10_m5", "m5_m5", "0_m5", "m15_0", "m10_0", "m5_0", "0_0", "m15_5",
                "m10_5", "m5_5", "0_5"
            ]
        );
    }

    #[test]
    fn test_edges_on_grid_lines_add_no_tiles() {
        let tiles = grid()
            .tiles_for(&BoundingBox::new(0.0, 0.0, 10.0, 5.0))
            .unwrap();
        assert_eq!(tiles.len(), 2);
    }

    #[test]
    fn test_cover_and_intersect() {
        let grid = TileGrid::new(3.0).unwrap();
        let boxes = [
            BoundingBox::new(-179.5, -89.0, 179.5, 89.0),
            BoundingBox::new(-1.0, -1.0, 1.0, 1.0),
            BoundingBox::new(10.2, 44.4, 17.9, 51.3),
            BoundingBox::new(-75.0, 38.0, -74.999, 38.001),
        ];
        for bbox in boxes {
            let tiles = grid.tiles_for(&bbox).unwrap();
            for tile in &tiles {
                assert!(tile.bounds().intersection(&bbox).is_some(), "{} misses {:?}", tile, bbox);
            }
            // Sample points across the box must each fall in a returned tile
            for i in 0..=10 {
                for j in 0..=10 {
                    let lon = bbox.min_lon() + bbox.width() * i as f64 / 10.0;
                    let lat = bbox.min_lat() + bbox.height() * j as f64 / 10.0;
                    assert!(tiles.iter().any(|t| t.bounds().contains(lon, lat)));
                }
            }
        }
    }

    #[test]
    fn test_clamps_to_world() {
        let tiles = grid()
            .tiles_for(&BoundingBox::new(170.0, 80.0, 200.0, 100.0))
            .unwrap();
        assert_eq!(tiles.len(), 4);
        assert!(tiles.iter().all(|t| t.max_lon() <= 180.0 && t.max_lat() <= 90.0));

        let outside = grid()
            .tiles_for(&BoundingBox::new(185.0, 0.0, 190.0, 5.0))
            .unwrap();
        assert!(outside.is_empty());
    }

    #[test]
    fn test_rejects_degenerate_boxes() {
        let grid = grid();
        let flat = BoundingBox {
            rect: geo::Rect::new(
                geo::coord! { x: -70.0, y: 20.0 },
                geo::coord! { x: -70.0, y: 50.0 },
            ),
        };
        assert!(matches!(
            grid.tiles_for(&flat),
            Err(GridlineError::InvalidBoundingBox(_))
        ));
    }

    #[test]
    fn test_tile_limit() {
        let grid = TileGrid::new(0.01).unwrap();
        assert!(grid.tiles_for(&BoundingBox::world()).is_err());
    }
}
