//! Axial hex coordinate math.
//!
//! The map is a rectangle of pointy-top hexes laid out in odd-row offset
//! order; everything inside the simulation addresses tiles by axial
//! coordinate ([`HexCoord`]) or its packed 64-bit form ([`TileKey`]).

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GameError;
use crate::math::{Fixed, SQRT_3, SQRT_3_OVER_3};

// ============================================================================
// HexCoord
// ============================================================================

/// Axial hex coordinate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct HexCoord {
    /// Column axis.
    pub q: i32,
    /// Row axis.
    pub r: i32,
}

/// The six axial neighbour offsets, starting east and turning counter-clockwise.
pub const DIRECTIONS: [HexCoord; 6] = [
    HexCoord::new(1, 0),
    HexCoord::new(1, -1),
    HexCoord::new(0, -1),
    HexCoord::new(-1, 0),
    HexCoord::new(-1, 1),
    HexCoord::new(0, 1),
];

impl HexCoord {
    /// Create a new coordinate.
    #[must_use]
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// Implicit third cube axis.
    #[must_use]
    pub const fn s(self) -> i32 {
        -self.q - self.r
    }

    /// Neighbour in direction `dir` (taken modulo 6).
    #[must_use]
    pub const fn neighbor(self, dir: usize) -> Self {
        let d = DIRECTIONS[dir % 6];
        Self::new(self.q + d.q, self.r + d.r)
    }

    /// All six neighbours.
    #[must_use]
    pub fn neighbors(self) -> [Self; 6] {
        DIRECTIONS.map(|d| Self::new(self.q + d.q, self.r + d.r))
    }

    /// Hex distance: `(|dq| + |dq + dr| + |dr|) / 2`.
    #[must_use]
    pub const fn distance(self, other: Self) -> u32 {
        let dq = self.q - other.q;
        let dr = self.r - other.r;
        (dq.unsigned_abs() + (dq + dr).unsigned_abs() + dr.unsigned_abs()) / 2
    }

    /// Whether `other` is one of the six neighbours.
    #[must_use]
    pub const fn is_adjacent(self, other: Self) -> bool {
        self.distance(other) == 1
    }

    /// Every coordinate within `radius` of `self`, including `self`.
    ///
    /// Ordered by `q` then `r`.
    #[must_use]
    pub fn range(self, radius: u32) -> Vec<Self> {
        let n = i32::try_from(radius).unwrap_or(i32::MAX / 4);
        let mut out = Vec::with_capacity((3 * radius * (radius + 1) + 1) as usize);
        for dq in -n..=n {
            let lo = (-n).max(-dq - n);
            let hi = n.min(-dq + n);
            for dr in lo..=hi {
                out.push(Self::new(self.q + dq, self.r + dr));
            }
        }
        out
    }

    /// Packed key for this coordinate.
    #[must_use]
    pub const fn key(self) -> TileKey {
        TileKey::from_coord(self)
    }

    /// Convert to odd-row offset `(col, row)`.
    #[must_use]
    pub const fn to_offset(self) -> (i32, i32) {
        let col = self.q + (self.r - (self.r & 1)) / 2;
        (col, self.r)
    }

    /// Convert from odd-row offset `(col, row)`.
    #[must_use]
    pub const fn from_offset(col: i32, row: i32) -> Self {
        let q = col - (row - (row & 1)) / 2;
        Self::new(q, row)
    }

    /// Centre of this hex in pixel space (pointy-top, `size` = corner radius).
    #[must_use]
    pub fn to_pixel(self, size: Fixed) -> (Fixed, Fixed) {
        let q = Fixed::from_num(self.q);
        let r = Fixed::from_num(self.r);
        let half = Fixed::from_num(0.5);
        let x = size * SQRT_3 * (q + r * half);
        let y = size * Fixed::from_num(1.5) * r;
        (x, y)
    }

    /// Hex containing the pixel `(x, y)`; inverse of [`HexCoord::to_pixel`].
    #[must_use]
    pub fn from_pixel(x: Fixed, y: Fixed, size: Fixed) -> Self {
        let three = Fixed::from_num(3);
        let q = (SQRT_3_OVER_3 * x - y / three) / size;
        let r = (y * Fixed::from_num(2) / three) / size;
        cube_round(q, r)
    }
}

/// Round fractional axial coordinates to the nearest hex.
fn cube_round(q: Fixed, r: Fixed) -> HexCoord {
    let s = -q - r;
    let (rq, rr, rs) = (q.round(), r.round(), s.round());
    let (dq, dr, ds) = ((rq - q).abs(), (rr - r).abs(), (rs - s).abs());

    let (mut q_i, mut r_i) = (rq.to_num::<i32>(), rr.to_num::<i32>());
    let s_i = rs.to_num::<i32>();
    if dq > dr && dq > ds {
        q_i = -r_i - s_i;
    } else if dr > ds {
        r_i = -q_i - s_i;
    }
    HexCoord::new(q_i, r_i)
}

impl fmt::Display for HexCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.q, self.r)
    }
}

impl FromStr for HexCoord {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || GameError::TileNotFound(s.to_string());
        let (q, r) = s.split_once(',').ok_or_else(bad)?;
        let q = q.trim().parse().map_err(|_| bad())?;
        let r = r.trim().parse().map_err(|_| bad())?;
        Ok(Self::new(q, r))
    }
}

// ============================================================================
// TileKey
// ============================================================================

/// Canonical 64-bit tile key: `q` in the high half, `r` in the low half.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct TileKey(pub u64);

impl TileKey {
    /// Pack a coordinate.
    #[must_use]
    pub const fn from_coord(coord: HexCoord) -> Self {
        Self(((coord.q as u32 as u64) << 32) | (coord.r as u32 as u64))
    }

    /// Unpack to a coordinate.
    #[must_use]
    pub const fn coord(self) -> HexCoord {
        HexCoord::new((self.0 >> 32) as u32 as i32, self.0 as u32 as i32)
    }
}

impl From<HexCoord> for TileKey {
    fn from(coord: HexCoord) -> Self {
        Self::from_coord(coord)
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.coord().fmt(f)
    }
}

impl FromStr for TileKey {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<HexCoord>().map(Self::from_coord)
    }
}

// ============================================================================
// MinQueue
// ============================================================================

struct QueueEntry<T> {
    priority: u32,
    /// Insertion order; equal priorities pop first-in first-out.
    order: u64,
    item: T,
}

impl<T> PartialEq for QueueEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.order == other.order
    }
}

impl<T> Eq for QueueEntry<T> {}

impl<T> Ord for QueueEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse for min-first.
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.order.cmp(&self.order))
    }
}

impl<T> PartialOrd for QueueEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Deterministic min-priority queue.
///
/// Lowest priority pops first; ties pop in insertion order.
pub struct MinQueue<T> {
    heap: BinaryHeap<QueueEntry<T>>,
    counter: u64,
}

impl<T> MinQueue<T> {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            counter: 0,
        }
    }

    /// Insert `item` with `priority`.
    pub fn push(&mut self, item: T, priority: u32) {
        self.heap.push(QueueEntry {
            priority,
            order: self.counter,
            item,
        });
        self.counter += 1;
    }

    /// Remove the lowest-priority item.
    pub fn pop(&mut self) -> Option<(T, u32)> {
        self.heap.pop().map(|e| (e.item, e.priority))
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<T> Default for MinQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
