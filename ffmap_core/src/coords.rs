//! Conversions between world space, map space and the 1–42 game coordinate
//! grid shown to players.
//!
//! Map space is world-aligned: a level row or layer object's `x`/`z` is
//! already a map-space position. Game coordinates come from
//! `41 / c * (map + offset) / 2048 + 1` with `c = size_factor / 100`.

use serde::{Deserialize, Serialize};

use crate::error::CoordinateError;

/// Width of the map texture the formulas are expressed against.
pub const MAP_TEXTURE_SIZE: f64 = 2048.0;
/// Span of the player-facing coordinate grid.
pub const GAME_GRID_SPAN: f64 = 41.0;
pub const DEFAULT_SIZE_FACTOR: u16 = 200;
/// Libra stores coordinates multiplied by ten.
pub const LIBRA_SCALE: f64 = 10.0;

/// Scale and offset parameters of one map row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapDescriptor {
    pub map_id: u32,
    pub territory_id: u32,
    pub size_factor: u16,
    pub offset_x: i16,
    pub offset_y: i16,
    pub place_name_id: u32,
    pub marker_range: u32,
}

impl MapDescriptor {
    pub fn new(map_id: u32, territory_id: u32) -> Self {
        Self {
            map_id,
            territory_id,
            size_factor: DEFAULT_SIZE_FACTOR,
            offset_x: 0,
            offset_y: 0,
            place_name_id: 0,
            marker_range: 0,
        }
    }

    pub fn transformer(&self) -> Result<CoordinateTransformer, CoordinateError> {
        CoordinateTransformer::new(
            f64::from(self.size_factor),
            f64::from(self.offset_x),
            f64::from(self.offset_y),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RawCoordinate {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl RawCoordinate {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Player-facing coordinate, nominally within `1.0..=42.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GameCoordinate {
    pub x: f64,
    pub y: f64,
}

impl GameCoordinate {
    pub const MIN: f64 = 1.0;
    pub const MAX: f64 = 42.0;

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Display bound clamp. The transformer never applies this on its own.
    pub fn clamped(self) -> Self {
        Self {
            x: self.x.clamp(Self::MIN, Self::MAX),
            y: self.y.clamp(Self::MIN, Self::MAX),
        }
    }
}

/// Linear transform for one map's `size_factor` and offsets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateTransformer {
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl CoordinateTransformer {
    pub fn new(size_factor: f64, offset_x: f64, offset_y: f64) -> Result<Self, CoordinateError> {
        if size_factor == 0.0 || !size_factor.is_finite() {
            return Err(CoordinateError::DivisionError(size_factor));
        }
        for component in [offset_x, offset_y] {
            if !component.is_finite() {
                return Err(CoordinateError::NonFinite(component));
            }
        }
        Ok(Self {
            scale: size_factor / 100.0,
            offset_x,
            offset_y,
        })
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// World position to game coordinate. World `z` is the map's vertical axis.
    pub fn world_to_game(&self, raw: RawCoordinate) -> GameCoordinate {
        self.map_to_game(f64::from(raw.x), f64::from(raw.z))
    }

    pub fn map_to_game(&self, map_x: f64, map_y: f64) -> GameCoordinate {
        GameCoordinate {
            x: self.axis_to_game(self.normalize(map_x, self.offset_x)),
            y: self.axis_to_game(self.normalize(map_y, self.offset_y)),
        }
    }

    /// Inverse of [`Self::map_to_game`].
    pub fn game_to_map(&self, game: GameCoordinate) -> (f64, f64) {
        (
            self.axis_to_map(game.x, self.offset_x),
            self.axis_to_map(game.y, self.offset_y),
        )
    }

    /// Map-marker sheet rows store texture pixels, already offset.
    pub fn pixel_to_game(&self, pixel_x: f64, pixel_y: f64) -> GameCoordinate {
        GameCoordinate {
            x: self.axis_to_game(pixel_x / MAP_TEXTURE_SIZE),
            y: self.axis_to_game(pixel_y / MAP_TEXTURE_SIZE),
        }
    }

    fn normalize(&self, value: f64, offset: f64) -> f64 {
        (value + offset) / MAP_TEXTURE_SIZE
    }

    fn axis_to_game(&self, normalized: f64) -> f64 {
        (GAME_GRID_SPAN / self.scale) * normalized + 1.0
    }

    fn axis_to_map(&self, game: f64, offset: f64) -> f64 {
        ((game - 1.0) * self.scale / GAME_GRID_SPAN) * MAP_TEXTURE_SIZE - offset
    }
}

/// Converts a Libra coordinate string pair into game space.
pub fn libra_to_game(x: f64, y: f64) -> GameCoordinate {
    GameCoordinate {
        x: x / LIBRA_SCALE,
        y: y / LIBRA_SCALE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-6;

    #[test]
    fn origin_maps_to_one_one_at_default_scale() {
        let transformer = CoordinateTransformer::new(200.0, 0.0, 0.0).unwrap();
        let game = transformer.world_to_game(RawCoordinate::new(0.0, 0.0, 0.0));
        assert!((game.x - 1.0).abs() < EPSILON);
        assert!((game.y - 1.0).abs() < EPSILON);
    }

    #[test]
    fn world_z_feeds_map_y() {
        let transformer = CoordinateTransformer::new(100.0, 0.0, 0.0).unwrap();
        let game = transformer.world_to_game(RawCoordinate::new(0.0, 999.0, 2048.0));
        assert!((game.x - 1.0).abs() < EPSILON);
        assert!((game.y - 42.0).abs() < EPSILON);
    }

    #[test]
    fn inverse_round_trips_across_parameters() {
        let parameters = [
            (100.0, 0.0, 0.0),
            (200.0, 0.0, 0.0),
            (200.0, -448.0, 32.0),
            (400.0, 1024.0, -1024.0),
            (95.0, 12.5, 7.0),
        ];
        for (size_factor, offset_x, offset_y) in parameters {
            let transformer = CoordinateTransformer::new(size_factor, offset_x, offset_y).unwrap();
            let mut g = 1.0;
            while g <= 42.0 {
                let game = GameCoordinate::new(g, 43.0 - g);
                let (map_x, map_y) = transformer.game_to_map(game);
                let back = transformer.map_to_game(map_x, map_y);
                assert!((back.x - game.x).abs() < EPSILON, "x drifted for {size_factor}");
                assert!((back.y - game.y).abs() < EPSILON, "y drifted for {size_factor}");
                g += 0.7;
            }
        }
    }

    #[test]
    fn zero_size_factor_is_a_division_error() {
        assert_eq!(
            CoordinateTransformer::new(0.0, 0.0, 0.0),
            Err(CoordinateError::DivisionError(0.0))
        );
        let descriptor = MapDescriptor {
            size_factor: 0,
            ..MapDescriptor::new(1, 1)
        };
        assert!(descriptor.transformer().is_err());
        assert!(CoordinateTransformer::new(f64::NAN, 0.0, 0.0).is_err());
    }

    #[test]
    fn transformer_does_not_clamp() {
        let transformer = CoordinateTransformer::new(200.0, 0.0, 0.0).unwrap();
        let game = transformer.map_to_game(-4096.0, 8192.0);
        assert!(game.x < 1.0);
        assert!(game.y > 42.0);
        let clamped = game.clamped();
        assert_eq!(clamped, GameCoordinate::new(1.0, 42.0));
    }

    #[test]
    fn libra_pairs_divide_by_ten() {
        let game = libra_to_game(205.0, 205.0);
        assert_eq!(game, GameCoordinate::new(20.5, 20.5));
    }

    #[test]
    fn pixel_coordinates_ignore_offsets() {
        let transformer = CoordinateTransformer::new(200.0, 300.0, -300.0).unwrap();
        let game = transformer.pixel_to_game(1024.0, 0.0);
        assert!((game.x - 11.25).abs() < EPSILON);
        assert!((game.y - 1.0).abs() < EPSILON);
    }
}
