//! Static obstacles
//!
//! Barriers are line segments laid out in chains at world generation. The same
//! seed yields the same field on every node, so barriers are never replicated.
//! The field is immutable once built and only read during ticks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SimConfig;
use crate::game::collision::segment_intersection;
use crate::game::constants::barrier::{EDGE_MARGIN, GRID_CELL_SIZE};
use crate::game::spatial::SpatialGrid;
use crate::util::vec2::Vector2;

/// Immutable line segment obstacle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Barrier {
    center: Vector2,
    rotation: f64,
    start: Vector2,
    end: Vector2,
    /// Unit normal, counter-clockwise from the start→end direction
    normal: Vector2,
}

impl Barrier {
    pub fn new(center: Vector2, rotation: f64, length: f64) -> Self {
        let half = Vector2::polar(rotation, length / 2.0);
        Self::from_parts(center, rotation, center - half, center + half)
    }

    pub fn from_endpoints(start: Vector2, end: Vector2) -> Self {
        let rotation = (end - start).angle();
        Self::from_parts(start.lerp(end, 0.5), rotation, start, end)
    }

    fn from_parts(center: Vector2, rotation: f64, start: Vector2, end: Vector2) -> Self {
        Self {
            center,
            rotation,
            start,
            end,
            normal: Vector2::from_angle(rotation).perpendicular(),
        }
    }

    /// Next link of a chain: starts at this barrier's end, bent by `turn`
    pub fn extend(&self, turn: f64, length: f64) -> Self {
        let rotation = self.rotation + turn;
        let end = self.end + Vector2::polar(rotation, length);
        Self::from_parts(self.end.lerp(end, 0.5), rotation, self.end, end)
    }

    #[inline]
    pub fn center(&self) -> Vector2 {
        self.center
    }

    #[inline]
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    #[inline]
    pub fn start(&self) -> Vector2 {
        self.start
    }

    #[inline]
    pub fn end(&self) -> Vector2 {
        self.end
    }

    #[inline]
    pub fn normal(&self) -> Vector2 {
        self.normal
    }

    fn inside_world(&self) -> bool {
        [self.start, self.end]
            .iter()
            .all(|p| (0.0..=1.0).contains(&p.x()) && (0.0..=1.0).contains(&p.y()))
    }
}

/// First barrier crossed by a swept segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarrierHit {
    pub index: u32,
    pub point: Vector2,
    pub normal: Vector2,
    /// Fraction along the query segment
    pub t: f64,
}

#[derive(Debug, Clone)]
pub struct BarrierField {
    barriers: Vec<Barrier>,
    grid: SpatialGrid<u32>,
}

impl BarrierField {
    /// Lay out seeded chains of barriers inside the world square
    pub fn generate(config: &SimConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.world_seed);
        let length = config.barrier_segment_length;
        let mut barriers = Vec::with_capacity(config.barrier_chains * config.barrier_chain_length);

        for _ in 0..config.barrier_chains {
            let start = Vector2::cartesian(
                rng.gen_range(EDGE_MARGIN..=1.0 - EDGE_MARGIN),
                rng.gen_range(EDGE_MARGIN..=1.0 - EDGE_MARGIN),
            );
            let rotation = rng.gen_range(0.0..std::f64::consts::TAU);
            let mut link = Barrier::from_endpoints(start, start + Vector2::polar(rotation, length));
            for _ in 0..config.barrier_chain_length {
                if !link.inside_world() {
                    break;
                }
                barriers.push(link);
                let turn = rng.gen_range(-config.barrier_max_turn..=config.barrier_max_turn);
                link = link.extend(turn, length);
            }
        }

        tracing::info!(
            "Generated {} barriers in {} chains (seed {:#x})",
            barriers.len(),
            config.barrier_chains,
            config.world_seed
        );
        Self::from_barriers(barriers)
    }

    pub fn from_barriers(barriers: Vec<Barrier>) -> Self {
        let mut grid = SpatialGrid::new(GRID_CELL_SIZE);
        for (index, barrier) in barriers.iter().enumerate() {
            let (a, b) = (barrier.start(), barrier.end());
            grid.insert_span(index as u32, a.x(), a.y(), b.x(), b.y());
        }
        Self { barriers, grid }
    }

    pub fn empty() -> Self {
        Self::from_barriers(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.barriers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.barriers.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<&Barrier> {
        self.barriers.get(index as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Barrier> {
        self.barriers.iter()
    }

    /// Candidate barriers near the box (x1,y1)-(x2,y2)
    pub fn search(&self, x1: f64, y1: f64, x2: f64, y2: f64, margin: f64) -> impl Iterator<Item = (u32, &Barrier)> {
        self.grid
            .search(x1, y1, x2, y2, margin)
            .into_iter()
            .filter_map(move |index| self.get(index).map(|b| (index, b)))
    }

    /// Nearest barrier crossed by `from`→`to`
    pub fn first_hit(&self, from: Vector2, to: Vector2) -> Option<BarrierHit> {
        self.search(from.x(), from.y(), to.x(), to.y(), 0.0)
            .filter_map(|(index, barrier)| {
                segment_intersection(from, to, barrier.start(), barrier.end()).map(|hit| BarrierHit {
                    index,
                    point: hit.point,
                    normal: barrier.normal(),
                    t: hit.t,
                })
            })
            .min_by(|a, b| a.t.total_cmp(&b.t))
    }

    /// Free distance from `origin` along `angle`, capped at `max_distance`
    pub fn raycast(&self, origin: Vector2, angle: f64, max_distance: f64) -> f64 {
        let to = origin + Vector2::polar(angle, max_distance);
        match self.first_hit(origin, to) {
            Some(hit) => hit.t * max_distance,
            None => max_distance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall() -> BarrierField {
        // Vertical wall at x = 0.5 spanning y 0.3..0.7
        BarrierField::from_barriers(vec![Barrier::from_endpoints(
            Vector2::cartesian(0.5, 0.3),
            Vector2::cartesian(0.5, 0.7),
        )])
    }

    #[test]
    fn test_generation_is_deterministic() {
        let config = SimConfig::default();
        let a = BarrierField::generate(&config);
        let b = BarrierField::generate(&config);
        assert!(!a.is_empty());
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x, y);
        }
    }

    #[test]
    fn test_generated_barriers_stay_inside_world() {
        let config = SimConfig::default();
        let field = BarrierField::generate(&config);
        assert!(field.iter().all(|b| b.inside_world()));
        assert!(field.len() <= config.barrier_chains * config.barrier_chain_length);
    }

    #[test]
    fn test_chain_links_connect() {
        let first = Barrier::new(Vector2::cartesian(0.5, 0.5), 0.0, 0.1);
        let second = first.extend(0.3, 0.1);
        assert!(second.start().approx_eq(first.end(), 1e-12));
        assert!((second.rotation() - 0.3).abs() < 1e-12);
        assert!(((second.end() - second.start()).magnitude() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_normal_is_unit_and_perpendicular() {
        let barrier = Barrier::new(Vector2::cartesian(0.5, 0.5), 0.7, 0.2);
        let direction = barrier.end() - barrier.start();
        assert!((barrier.normal().magnitude() - 1.0).abs() < 1e-12);
        assert!(barrier.normal().dot(direction).abs() < 1e-12);
    }

    #[test]
    fn test_first_hit_picks_nearest() {
        let field = BarrierField::from_barriers(vec![
            Barrier::from_endpoints(Vector2::cartesian(0.6, 0.0), Vector2::cartesian(0.6, 1.0)),
            Barrier::from_endpoints(Vector2::cartesian(0.4, 0.0), Vector2::cartesian(0.4, 1.0)),
        ]);
        let hit = field
            .first_hit(Vector2::cartesian(0.1, 0.5), Vector2::cartesian(0.9, 0.5))
            .unwrap();
        assert_eq!(hit.index, 1);
        assert!(hit.point.approx_eq(Vector2::cartesian(0.4, 0.5), 1e-12));
    }

    #[test]
    fn test_raycast() {
        let field = wall();
        let free = field.raycast(Vector2::cartesian(0.1, 0.5), 0.0, 1.0);
        assert!((free - 0.4).abs() < 1e-9);

        // Pointing away
        assert_eq!(field.raycast(Vector2::cartesian(0.1, 0.5), std::f64::consts::PI, 0.05), 0.05);
        // Passing above the wall
        assert_eq!(field.raycast(Vector2::cartesian(0.1, 0.9), 0.0, 1.0), 1.0);
    }
}
