//! Proptest strategies.
//!
//! These strategies generate random but reproducible inputs for
//! property-based testing of the simulation core.

use proptest::prelude::*;
use tribes_core::hex::HexCoord;
use tribes_core::resources::Resources;
use tribes_core::terrain::Terrain;
use tribes_core::units::UnitKind;

/// Any axial coordinate within `radius` of the origin.
pub fn arb_hex(radius: i32) -> impl Strategy<Value = HexCoord> {
    (-radius..=radius, -radius..=radius)
        .prop_filter("within radius", move |&(q, r)| (q + r).abs() <= radius)
        .prop_map(|(q, r)| HexCoord::new(q, r))
}

/// A coordinate on a `width × height` offset grid.
pub fn arb_grid_coord(width: u32, height: u32) -> impl Strategy<Value = HexCoord> {
    (0..width as i32, 0..height as i32).prop_map(|(col, row)| HexCoord::from_offset(col, row))
}

/// Any terrain.
pub fn arb_terrain() -> impl Strategy<Value = Terrain> {
    prop::sample::select(Terrain::ALL.to_vec())
}

/// A land terrain every player may enter.
pub fn arb_open_land() -> impl Strategy<Value = Terrain> {
    prop::sample::select(vec![
        Terrain::Plains,
        Terrain::Steppe,
        Terrain::Desert,
        Terrain::Swamp,
        Terrain::Forest,
        Terrain::Hills,
    ])
}

/// Any unit kind that can be ordered or spawned as an adult.
pub fn arb_unit_kind() -> impl Strategy<Value = UnitKind> {
    prop::sample::select(vec![
        UnitKind::Male,
        UnitKind::Female,
        UnitKind::Warrior,
        UnitKind::Hunter,
        UnitKind::Shaman,
    ])
}

/// A non-empty band of small units.
pub fn arb_band(max_len: usize) -> impl Strategy<Value = Vec<UnitKind>> {
    prop::collection::vec(arb_unit_kind(), 1..=max_len.max(1))
}

/// A stockpile with every amount below `max`.
pub fn arb_resources(max: u32) -> impl Strategy<Value = Resources> {
    (0..max, 0..max, 0..max, 0..max, 0..max)
        .prop_map(|(f, w, s, h, o)| Resources::new(f, w, s, h, o))
}

/// A short printable seed string.
pub fn arb_seed() -> impl Strategy<Value = String> {
    "[a-z]{1,12}"
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn prop_hexes_stay_in_radius(c in arb_hex(5)) {
            prop_assert!(c.distance(HexCoord::new(0, 0)) <= 5);
        }

        #[test]
        fn prop_grid_coords_in_bounds(c in arb_grid_coord(12, 9)) {
            let (col, row) = c.to_offset();
            prop_assert!((0..12).contains(&col));
            prop_assert!((0..9).contains(&row));
        }
    }
}
