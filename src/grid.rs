//! Spatial hashing for radius-and-category neighbor queries.

use crate::agent::AgentId;
use crate::food::{FoodField, FoodId};
use crate::population::PopulationRegistry;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Entity categories a query can filter on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Food,
    Individual,
}

/// Non-owning reference to a world entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    Food(FoodId),
    Agent(AgentId),
}

impl EntityRef {
    #[inline]
    pub fn category(&self) -> Category {
        match self {
            Self::Food(_) => Category::Food,
            Self::Agent(_) => Category::Individual,
        }
    }

    /// Owning agent id, if this refers to an individual
    #[inline]
    pub fn agent_id(&self) -> Option<AgentId> {
        match self {
            Self::Agent(id) => Some(*id),
            Self::Food(_) => None,
        }
    }

    #[inline]
    pub fn food_id(&self) -> Option<FoodId> {
        match self {
            Self::Food(id) => Some(*id),
            Self::Agent(_) => None,
        }
    }
}

/// One query hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sighting {
    pub entity: EntityRef,
    pub position: Vec2,
}

/// "Find nearby entities of a category within a radius."
///
/// Agents only ever see the world through this trait, so any broad-phase
/// structure can stand in for [`SpatialIndex`].
pub trait SpatialQuery {
    fn query(&self, position: Vec2, radius: f32, category: Category) -> Vec<Sighting>;
}

type CellKey = (i32, i32);

/// Uniform hash grid over continuous positions
#[derive(Clone, Debug)]
pub struct SpatialIndex {
    cell_size: f32,
    cells: HashMap<CellKey, Vec<Sighting>>,
    /// Occupied cell extent, used to clip large-radius scans
    min_cell: CellKey,
    max_cell: CellKey,
    len: usize,
}

impl SpatialIndex {
    /// Create an empty index with the given cell edge length
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(f32::EPSILON),
            cells: HashMap::new(),
            min_cell: (i32::MAX, i32::MAX),
            max_cell: (i32::MIN, i32::MIN),
            len: 0,
        }
    }

    /// Build an index holding every live agent and food item
    pub fn from_world(cell_size: f32, population: &PopulationRegistry, food: &FoodField) -> Self {
        let mut index = Self::new(cell_size);
        index.rebuild(population, food);
        index
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        for bucket in self.cells.values_mut() {
            bucket.clear();
        }
        self.min_cell = (i32::MAX, i32::MAX);
        self.max_cell = (i32::MIN, i32::MIN);
        self.len = 0;
    }

    /// Replace the contents with the current population and food field
    pub fn rebuild(&mut self, population: &PopulationRegistry, food: &FoodField) {
        self.clear();
        for agent in population.all() {
            self.insert(EntityRef::Agent(agent.id), agent.position);
        }
        for item in food.iter() {
            self.insert(EntityRef::Food(item.id), item.position);
        }
    }

    #[inline]
    fn cell_of(&self, position: Vec2) -> CellKey {
        (
            (position.x / self.cell_size).floor() as i32,
            (position.y / self.cell_size).floor() as i32,
        )
    }

    /// Insert an entity at the given position
    pub fn insert(&mut self, entity: EntityRef, position: Vec2) {
        let key = self.cell_of(position);
        self.min_cell = (self.min_cell.0.min(key.0), self.min_cell.1.min(key.1));
        self.max_cell = (self.max_cell.0.max(key.0), self.max_cell.1.max(key.1));
        self.cells.entry(key).or_default().push(Sighting { entity, position });
        self.len += 1;
    }

    /// Number of indexed entities
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl SpatialQuery for SpatialIndex {
    fn query(&self, position: Vec2, radius: f32, category: Category) -> Vec<Sighting> {
        let mut results = Vec::new();
        if self.len == 0 || !(radius >= 0.0) {
            return results;
        }

        let lo = self.cell_of(position - Vec2::splat(radius));
        let hi = self.cell_of(position + Vec2::splat(radius));
        let (x_min, y_min) = (lo.0.max(self.min_cell.0), lo.1.max(self.min_cell.1));
        let (x_max, y_max) = (hi.0.min(self.max_cell.0), hi.1.min(self.max_cell.1));
        let radius_sq = radius * radius;

        for cy in y_min..=y_max {
            for cx in x_min..=x_max {
                let Some(bucket) = self.cells.get(&(cx, cy)) else {
                    continue;
                };
                results.extend(bucket.iter().filter(|s| {
                    s.entity.category() == category
                        && s.position.distance_squared(position) <= radius_sq
                }));
            }
        }

        results
    }
}

/// Nearest sighting to `origin`, if any
pub fn nearest<I>(origin: Vec2, sightings: I) -> Option<Sighting>
where
    I: IntoIterator<Item = Sighting>,
{
    sightings.into_iter().min_by(|a, b| {
        a.position
            .distance_squared(origin)
            .total_cmp(&b.position.distance_squared(origin))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_filters_category() {
        let mut index = SpatialIndex::new(2.0);
        index.insert(EntityRef::Agent(1), Vec2::new(0.5, 0.5));
        index.insert(EntityRef::Food(7), Vec2::new(0.6, 0.5));

        let agents = index.query(Vec2::ZERO, 1.0, Category::Individual);
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].entity, EntityRef::Agent(1));

        let food = index.query(Vec2::ZERO, 1.0, Category::Food);
        assert_eq!(food.len(), 1);
        assert_eq!(food[0].entity.food_id(), Some(7));
    }

    #[test]
    fn test_query_radius_across_cells() {
        let mut index = SpatialIndex::new(1.0);
        index.insert(EntityRef::Agent(0), Vec2::new(0.0, 0.0));
        index.insert(EntityRef::Agent(1), Vec2::new(1.5, 0.0));
        index.insert(EntityRef::Agent(2), Vec2::new(-1.9, -0.1));
        index.insert(EntityRef::Agent(3), Vec2::new(8.0, 8.0)); // far away

        let ids: Vec<_> = index
            .query(Vec2::ZERO, 2.0, Category::Individual)
            .iter()
            .filter_map(|s| s.entity.agent_id())
            .collect();
        assert!(ids.contains(&0));
        assert!(ids.contains(&1));
        assert!(ids.contains(&2));
        assert!(!ids.contains(&3));
    }

    #[test]
    fn test_huge_radius_is_clipped() {
        let mut index = SpatialIndex::new(0.5);
        index.insert(EntityRef::Food(1), Vec2::new(-9.0, 9.0));
        let hits = index.query(Vec2::ZERO, 1.0e6, Category::Food);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut index = SpatialIndex::new(1.0);
        index.insert(EntityRef::Agent(0), Vec2::ZERO);
        index.clear();
        assert!(index.is_empty());
        assert!(index.query(Vec2::ZERO, 5.0, Category::Individual).is_empty());
    }

    #[test]
    fn test_nearest() {
        let hits = vec![
            Sighting { entity: EntityRef::Food(1), position: Vec2::new(3.0, 0.0) },
            Sighting { entity: EntityRef::Food(2), position: Vec2::new(1.0, 1.0) },
        ];
        let best = nearest(Vec2::ZERO, hits).unwrap();
        assert_eq!(best.entity, EntityRef::Food(2));
        assert!(nearest(Vec2::ZERO, Vec::new()).is_none());
    }
}
