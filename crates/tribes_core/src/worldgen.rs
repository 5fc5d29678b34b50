//! Procedural map generation and new-game setup.
//!
//! A seed string hashes to a `u64`; that value seeds one ChaCha8 stream
//! which seeds the simplex noise fields, drives every post-processing roll, and
//! then carries on as the session RNG. The same seed therefore always gives
//! the same map and the same game.

use std::collections::{BTreeSet, VecDeque};

use noise::{NoiseFn, Simplex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::container::ContainerRef;
use crate::error::{GameError, Result};
use crate::hex::HexCoord;
use crate::math::fnv1a_64;
use crate::player::{AiPersonality, Player, PlayerId};
use crate::resources::Resources;
use crate::rules::GameRules;
use crate::state::{offset_coords, Tile, WorldState};
use crate::terrain::Terrain;
use crate::units::UnitKind;

// ============================================================================
// Constants
// ============================================================================

/// Smallest accepted map side.
pub const MIN_MAP_SIDE: u32 = 8;
/// Largest accepted player count.
pub const MAX_PLAYERS: u32 = 8;

const SEA_LEVEL: f64 = 0.30;
const LOWLAND_LEVEL: f64 = 0.45;
const MIDLAND_LEVEL: f64 = 0.62;
const HILLS_LEVEL: f64 = 0.75;

/// `(frequency multiplier, weight)` per octave.
const ELEVATION_OCTAVES: [(f64, f64); 3] = [(1.0, 0.6), (2.0, 0.3), (4.0, 0.1)];
const CLIMATE_OCTAVES: [(f64, f64); 2] = [(1.0, 0.7), (2.0, 0.3)];

const MOUNTAIN_RANGES: usize = 2;
const MOUNTAIN_RANGE_LENGTH: usize = 3;
const MOUNTAIN_RANGE_ATTEMPTS: usize = 50;
const VOLCANOES: usize = 2;

/// What a new player starts with in their settlement.
const STARTING_STOCKPILE: Resources = Resources::new(30, 20, 10, 10, 0);
const STARTING_SETTLERS: [UnitKind; 5] = [
    UnitKind::Male,
    UnitKind::Male,
    UnitKind::Female,
    UnitKind::Female,
    UnitKind::Juvenile,
];
const STARTING_BAND: [UnitKind; 3] = [UnitKind::Warrior, UnitKind::Warrior, UnitKind::Male];

/// Farthest ring searched for a starting band's tile.
const BAND_SEARCH_RADIUS: u32 = 3;

// ============================================================================
// Seeds
// ============================================================================

/// Hash a seed string to the numeric seed.
#[must_use]
pub fn seed_from_str(seed: &str) -> u64 {
    fnv1a_64(seed.as_bytes())
}

// ============================================================================
// Terrain generation
// ============================================================================

/// Classify a tile from its shaped elevation, moisture and biome samples.
#[must_use]
pub fn classify(elevation: f64, moisture: f64, biome: f64) -> Terrain {
    if elevation < SEA_LEVEL {
        // Edge-connected seas become ocean later; everything starts as lake.
        Terrain::Lake
    } else if elevation < LOWLAND_LEVEL {
        if moisture > 0.65 {
            Terrain::Swamp
        } else {
            Terrain::Plains
        }
    } else if elevation < MIDLAND_LEVEL {
        if biome < 0.35 {
            if moisture < 0.4 {
                Terrain::Desert
            } else {
                Terrain::Steppe
            }
        } else if moisture > 0.5 {
            Terrain::Forest
        } else {
            Terrain::Plains
        }
    } else if elevation < HILLS_LEVEL {
        Terrain::Hills
    } else {
        Terrain::Mountains
    }
}

/// Dense terrain grid in row-major offset order.
struct Grid {
    width: u32,
    height: u32,
    terrain: Vec<Terrain>,
}

impl Grid {
    fn index(&self, c: HexCoord) -> Option<usize> {
        let (col, row) = c.to_offset();
        if col < 0 || row < 0 || col >= self.width as i32 || row >= self.height as i32 {
            return None;
        }
        Some(row as usize * self.width as usize + col as usize)
    }

    fn get(&self, c: HexCoord) -> Option<Terrain> {
        self.index(c).map(|i| self.terrain[i])
    }

    fn set(&mut self, c: HexCoord, t: Terrain) {
        if let Some(i) = self.index(c) {
            self.terrain[i] = t;
        }
    }

    fn coords(&self) -> impl Iterator<Item = HexCoord> {
        offset_coords(self.width, self.height)
    }

    fn is_edge(&self, c: HexCoord) -> bool {
        let (col, row) = c.to_offset();
        col == 0 || row == 0 || col == self.width as i32 - 1 || row == self.height as i32 - 1
    }
}

/// Generate a `width × height` map from `seed`.
///
/// Returns the tiles with full resource pools and the RNG, advanced past
/// every roll generation made, for use as the session RNG.
#[must_use]
pub fn generate_map(width: u32, height: u32, seed: u64) -> (Vec<Tile>, ChaCha8Rng) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let elevation_noise = Simplex::new(rng.gen());
    let moisture_noise = Simplex::new(rng.gen());
    let biome_noise = Simplex::new(rng.gen());

    let base_frequency = 4.0 / f64::from(width.max(height).max(1));
    let positions: Vec<(f64, f64)> = offset_coords(width, height)
        .map(|c| {
            let (col, row) = c.to_offset();
            (f64::from(col) + 0.5 * f64::from(row & 1), f64::from(row) * 0.866)
        })
        .collect();

    let field = |source: &Simplex, octaves: &[(f64, f64)]| {
        let mut values: Vec<f64> = positions
            .iter()
            .map(|&(x, y)| {
                octaves
                    .iter()
                    .map(|&(frequency, weight)| {
                        let f = base_frequency * frequency;
                        weight * source.get([x * f, y * f])
                    })
                    .sum::<f64>()
            })
            .collect();
        normalize(&mut values);
        values
    };
    let elevation = field(&elevation_noise, &ELEVATION_OCTAVES);
    let moisture = field(&moisture_noise, &CLIMATE_OCTAVES);
    let biome = field(&biome_noise, &CLIMATE_OCTAVES);

    let half_w = f64::from(width.max(2) - 1) / 2.0;
    let half_h = f64::from(height.max(2) - 1) / 2.0;
    let mut grid = Grid {
        width,
        height,
        terrain: offset_coords(width, height)
            .enumerate()
            .map(|(i, c)| {
                let (col, row) = c.to_offset();
                let dx = (f64::from(col) - half_w) / half_w;
                let dy = (f64::from(row) - half_h) / half_h;
                let distance = (dx * dx + dy * dy).sqrt();
                let shaped = elevation[i] - distance.powi(4);
                classify(shaped, moisture[i], biome[i])
            })
            .collect(),
    };

    mark_oceans(&mut grid);
    raise_mountain_ranges(&mut grid, &mut rng);
    place_volcanoes(&mut grid, &mut rng);
    spread_swamps(&mut grid, &mut rng);

    let tiles = grid
        .coords()
        .zip(grid.terrain.iter())
        .map(|(c, &t)| Tile::new(c, t))
        .collect();
    (tiles, rng)
}

/// Rescale `values` in place to span `[0, 1]`. A flat field becomes all 0.5.
fn normalize(values: &mut [f64]) {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let span = max - min;
    for v in values.iter_mut() {
        *v = if span > f64::EPSILON {
            (*v - min) / span
        } else {
            0.5
        };
    }
}

/// Flood fill from sea tiles on the map edge; what the fill reaches is
/// ocean, enclosed water stays lake.
fn mark_oceans(grid: &mut Grid) {
    let mut queue: VecDeque<HexCoord> = grid
        .coords()
        .filter(|&c| grid.is_edge(c) && grid.get(c) == Some(Terrain::Lake))
        .collect();
    for &c in &queue {
        grid.set(c, Terrain::Ocean);
    }
    while let Some(c) = queue.pop_front() {
        for n in c.neighbors() {
            if grid.get(n) == Some(Terrain::Lake) {
                grid.set(n, Terrain::Ocean);
                queue.push_back(n);
            }
        }
    }
}

fn random_tile(grid: &Grid, rng: &mut ChaCha8Rng) -> HexCoord {
    let col = rng.gen_range(0..grid.width) as i32;
    let row = rng.gen_range(0..grid.height) as i32;
    HexCoord::from_offset(col, row)
}

fn raise_mountain_ranges(grid: &mut Grid, rng: &mut ChaCha8Rng) {
    let mut placed: BTreeSet<HexCoord> = BTreeSet::new();
    let mut ranges = 0;
    for _ in 0..MOUNTAIN_RANGE_ATTEMPTS {
        if ranges == MOUNTAIN_RANGES {
            break;
        }
        let start = random_tile(grid, rng);
        let mut dir = rng.gen_range(0..6);
        let mut walk = vec![start];
        while walk.len() < MOUNTAIN_RANGE_LENGTH {
            let last = walk[walk.len() - 1];
            walk.push(last.neighbor(dir));
            dir = (dir + [5, 0, 1][rng.gen_range(0..3)]) % 6;
        }
        let valid = walk.iter().all(|c| {
            grid.get(*c).is_some_and(|t| !t.is_water()) && !placed.contains(c)
        });
        if !valid {
            continue;
        }

        for &c in &walk {
            grid.set(c, Terrain::Mountains);
            placed.insert(c);
        }
        for &c in &walk {
            for n in c.neighbors() {
                if grid.get(n).is_some_and(Terrain::is_lowland) && rng.gen_bool(0.5) {
                    grid.set(n, Terrain::Hills);
                }
            }
        }
        ranges += 1;
        debug!(start = %start, "mountain range raised");
    }
}

fn place_volcanoes(grid: &mut Grid, rng: &mut ChaCha8Rng) {
    for _ in 0..VOLCANOES {
        let candidates: Vec<HexCoord> = grid
            .coords()
            .filter(|&c| matches!(grid.get(c), Some(Terrain::Mountains | Terrain::Hills)))
            .collect();
        if candidates.is_empty() {
            return;
        }
        let c = candidates[rng.gen_range(0..candidates.len())];
        grid.set(c, Terrain::Volcano);
    }
}

fn spread_swamps(grid: &mut Grid, rng: &mut ChaCha8Rng) {
    let shore: Vec<HexCoord> = grid
        .coords()
        .filter(|&c| {
            grid.get(c).is_some_and(Terrain::is_lowland)
                && c.neighbors().iter().any(|&n| grid.get(n) == Some(Terrain::Lake))
        })
        .collect();
    for c in shore {
        if rng.gen_bool(0.4) {
            grid.set(c, Terrain::Swamp);
        }
    }
}

// ============================================================================
// New game
// ============================================================================

/// Options for [`new_game`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewGameConfig {
    /// Map width in hexes.
    pub width: u32,
    /// Map height in hexes.
    pub height: u32,
    /// Number of human players, seated first.
    pub humans: u32,
    /// Number of AI opponents.
    pub opponents: u32,
    /// Seed text; a random seed is drawn when absent.
    pub seed: Option<String>,
    /// Rules for the session.
    pub rules: GameRules,
}

impl Default for NewGameConfig {
    fn default() -> Self {
        Self {
            width: 24,
            height: 18,
            humans: 1,
            opponents: 2,
            seed: None,
            rules: GameRules::default(),
        }
    }
}

impl NewGameConfig {
    /// Numeric seed for this config.
    pub fn resolve_seed(&self) -> u64 {
        self.seed
            .as_deref()
            .map_or_else(|| rand::thread_rng().gen(), seed_from_str)
    }

    fn validate(&self) -> Result<()> {
        if self.width < MIN_MAP_SIDE || self.height < MIN_MAP_SIDE {
            return Err(GameError::InvalidState(format!(
                "map {}x{} is smaller than {MIN_MAP_SIDE}x{MIN_MAP_SIDE}",
                self.width, self.height
            )));
        }
        let players = self.humans + self.opponents;
        if players == 0 || players > MAX_PLAYERS {
            return Err(GameError::InvalidState(format!(
                "{players} players; expected 1 to {MAX_PLAYERS}"
            )));
        }
        Ok(())
    }
}

/// Whether a tile can take a starting settlement with a band beside it.
fn is_start_candidate(state: &WorldState, c: HexCoord) -> bool {
    state.tile(c).is_some_and(|t| t.terrain.is_settleable())
        && c.neighbors().iter().any(|&n| is_band_spot(state, n))
}

fn is_band_spot(state: &WorldState, c: HexCoord) -> bool {
    state.tile(c).is_some_and(|t| {
        t.occupant.is_none()
            && !t.terrain.is_water()
            && t.terrain.movement_cost().is_some()
            && t.terrain.required_tech().is_none()
    })
}

/// Closest free tile a starting band can stand on, searching ring by ring
/// out to [`BAND_SEARCH_RADIUS`].
fn band_spot_near(state: &WorldState, home: HexCoord) -> Option<HexCoord> {
    (1..=BAND_SEARCH_RADIUS).find_map(|ring| {
        home.range(ring)
            .into_iter()
            .filter(|c| c.distance(home) == ring)
            .find(|&c| is_band_spot(state, c))
    })
}

/// Greedy farthest-point selection of `count` start tiles.
fn pick_starts(state: &mut WorldState, count: usize) -> Result<Vec<HexCoord>> {
    let view: &WorldState = state;
    let candidates: Vec<HexCoord> = view
        .tiles()
        .iter()
        .map(|t| t.coord)
        .filter(|&c| is_start_candidate(view, c))
        .collect();
    if candidates.len() < count {
        return Err(GameError::InvalidState(format!(
            "only {} start tiles for {count} players",
            candidates.len()
        )));
    }

    let first = candidates[state.rng_mut().gen_range(0..candidates.len())];
    let mut starts = vec![first];
    while starts.len() < count {
        let next = candidates
            .iter()
            .filter(|c| !starts.contains(*c))
            .map(|&c| {
                let nearest = starts.iter().map(|s| s.distance(c)).min().unwrap_or(u32::MAX);
                (nearest, c)
            })
            // Farthest first; among equals the earliest tile in grid order.
            .min_by(|a, b| b.0.cmp(&a.0))
            .map(|(_, c)| c);
        match next {
            Some(c) => starts.push(c),
            None => break,
        }
    }
    Ok(starts)
}

/// Create a fresh game: generate the map, seat the players, and give each a
/// settlement and a war-band.
pub fn new_game(config: &NewGameConfig) -> Result<WorldState> {
    config.validate()?;
    let seed = config.resolve_seed();
    let (tiles, rng) = generate_map(config.width, config.height, seed);
    let mut state = WorldState::from_tiles(
        config.width,
        config.height,
        tiles,
        seed,
        rng,
        config.rules.clone(),
    )?;

    for i in 0..config.humans {
        let mut player = Player::new(PlayerId(0), format!("Player {}", i + 1), true);
        player.gold = config.rules.starting_gold;
        state.add_player(player);
    }
    for i in 0..config.opponents {
        let personality = AiPersonality::ALL[i as usize % AiPersonality::ALL.len()];
        let mut player = Player::new(PlayerId(0), format!("Tribe {}", i + 1), false)
            .with_personality(personality);
        player.gold = config.rules.starting_gold;
        state.add_player(player);
    }

    let count = state.players().len();
    let starts = pick_starts(&mut state, count)?;
    // Every settlement goes down before any band so a band can never stand
    // on another player's start.
    for (i, &home) in starts.iter().enumerate() {
        let owner = PlayerId(i as u8);
        let name = format!("{} Hearth", state.players()[i].name);
        let settlement = state.found_settlement(owner, name, home, 1)?;
        let r = ContainerRef::Settlement(settlement);
        state.add_units(r, &STARTING_SETTLERS)?;
        if let Some(holding) = state.holding_mut(r) {
            holding.stockpile = STARTING_STOCKPILE;
        }
    }
    for (i, &home) in starts.iter().enumerate() {
        let spot = band_spot_near(&state, home)
            .ok_or_else(|| GameError::InvalidState(format!("no room for a band near {home}")))?;
        state.spawn_war_band(PlayerId(i as u8), spot, &STARTING_BAND)?;
    }

    info!(
        seed,
        width = config.width,
        height = config.height,
        players = count,
        "new game created"
    );
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_from_str_is_fnv() {
        assert_eq!(seed_from_str(""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(seed_from_str("hunt"), seed_from_str("hunt"));
        assert_ne!(seed_from_str("hunt"), seed_from_str("gather"));
    }

    #[test]
    fn test_normalize_spans_unit_interval() {
        let mut values = vec![-2.0, 0.0, 6.0];
        normalize(&mut values);
        assert_eq!(values, vec![0.0, 0.25, 1.0]);

        let mut flat = vec![3.0; 4];
        normalize(&mut flat);
        assert!(flat.iter().all(|&v| (v - 0.5).abs() < f64::EPSILON));
    }

    #[test]
    fn test_classify_thresholds() {
        assert_eq!(classify(0.1, 0.5, 0.5), Terrain::Lake);
        assert_eq!(classify(0.40, 0.7, 0.5), Terrain::Swamp);
        assert_eq!(classify(0.40, 0.3, 0.5), Terrain::Plains);
        assert_eq!(classify(0.50, 0.3, 0.2), Terrain::Desert);
        assert_eq!(classify(0.50, 0.6, 0.2), Terrain::Steppe);
        assert_eq!(classify(0.50, 0.6, 0.8), Terrain::Forest);
        assert_eq!(classify(0.50, 0.4, 0.8), Terrain::Plains);
        assert_eq!(classify(0.70, 0.5, 0.5), Terrain::Hills);
        assert_eq!(classify(0.90, 0.5, 0.5), Terrain::Mountains);
    }

    #[test]
    fn test_same_seed_same_map() {
        let (a, mut ra) = generate_map(20, 16, 77);
        let (b, mut rb) = generate_map(20, 16, 77);
        assert_eq!(a, b);
        assert_eq!(ra.gen::<u64>(), rb.gen::<u64>());
        let (c, _) = generate_map(20, 16, 78);
        assert_ne!(a, c);
    }

    #[test]
    fn test_edges_are_ocean_and_pools_full() {
        let (tiles, _) = generate_map(24, 18, 5);
        let grid = Grid {
            width: 24,
            height: 18,
            terrain: tiles.iter().map(|t| t.terrain).collect(),
        };
        for t in &tiles {
            // The corner falloff pushes every edge tile under sea level.
            if grid.is_edge(t.coord) {
                assert_eq!(t.terrain, Terrain::Ocean, "edge tile {}", t.coord);
            }
            assert_eq!(t.pools, t.terrain.resource_max());
        }
        let volcanoes = tiles.iter().filter(|t| t.terrain == Terrain::Volcano).count();
        assert!(volcanoes <= VOLCANOES);
    }

    #[test]
    fn test_new_game_seats_players() {
        let config = NewGameConfig {
            seed: Some("river".into()),
            ..NewGameConfig::default()
        };
        let state = new_game(&config).expect("new game");
        assert_eq!(state.players().len(), 3);
        assert!(state.players()[0].is_human);
        assert_eq!(state.players()[1].personality, AiPersonality::Aggressive);
        assert_eq!(state.players()[2].personality, AiPersonality::Balanced);

        for p in state.players() {
            assert_eq!(p.gold, 20);
            assert!(p.techs.is_empty());
            let settlement = state
                .settlements()
                .find(|s| s.owner == p.id)
                .expect("settlement");
            assert!(state
                .tile(settlement.position)
                .is_some_and(|t| t.terrain.is_settleable()));
            assert_eq!(settlement.holding.units.len(), 5);
            let band = state.war_bands().find(|b| b.owner == p.id).expect("band");
            assert!(band.position.is_adjacent(settlement.position));
            assert_eq!(band.holding.units.len(), 3);
        }
        assert_eq!(state.seed(), seed_from_str("river"));
    }

    #[test]
    fn test_band_spot_falls_back_to_next_ring() {
        let mut state = WorldState::blank(9, 9, Terrain::Plains, 4, GameRules::default());
        state.add_player(Player::new(PlayerId(0), "Home", false));
        state.add_player(Player::new(PlayerId(0), "Neighbour", false));
        let home = HexCoord::from_offset(4, 4);
        state
            .found_settlement(PlayerId(0), "Hearth", home, 0)
            .expect("found");
        let taken = home.neighbor(0);
        for n in home.neighbors() {
            if n != taken {
                state.set_terrain(n, Terrain::Lake).expect("terrain");
            }
        }
        state
            .spawn_war_band(PlayerId(1), taken, &[UnitKind::Warrior])
            .expect("spawn");

        let spot = band_spot_near(&state, home).expect("second ring has room");
        assert_eq!(spot.distance(home), 2);
        assert!(is_band_spot(&state, spot));

        let mut boxed = state.clone();
        for c in home.range(BAND_SEARCH_RADIUS) {
            if c != home && c != taken && c.distance(home) > 1 {
                boxed.set_terrain(c, Terrain::Ocean).expect("terrain");
            }
        }
        assert_eq!(band_spot_near(&boxed, home), None);
    }

    #[test]
    fn test_new_game_is_reproducible() {
        let config = NewGameConfig {
            seed: Some("same".into()),
            ..NewGameConfig::default()
        };
        let a = new_game(&config).expect("a");
        let b = new_game(&config).expect("b");
        assert_eq!(a.state_hash(), b.state_hash());
    }

    #[test]
    fn test_rejects_bad_config() {
        let tiny = NewGameConfig {
            width: 4,
            ..NewGameConfig::default()
        };
        assert!(new_game(&tiny).is_err());
        let crowded = NewGameConfig {
            opponents: 20,
            ..NewGameConfig::default()
        };
        assert!(new_game(&crowded).is_err());
    }
}
