//! Food entities and the ambient food spawner.

use crate::config::FoodConfig;
use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unique food identifier
pub type FoodId = u64;

/// A single food unit lying in the world
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Food {
    pub id: FoodId,
    pub position: Vec2,
}

/// All food currently in the world
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FoodField {
    items: BTreeMap<FoodId, Food>,
    next_id: FoodId,
}

impl FoodField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a food unit and return its id
    pub fn spawn(&mut self, position: Vec2) -> FoodId {
        let id = self.next_id;
        self.next_id += 1;
        self.items.insert(id, Food { id, position });
        id
    }

    /// Destroy a food unit. Returns `None` if it was already gone.
    pub fn remove(&mut self, id: FoodId) -> Option<Food> {
        self.items.remove(&id)
    }

    #[inline]
    pub fn get(&self, id: FoodId) -> Option<&Food> {
        self.items.get(&id)
    }

    #[inline]
    pub fn contains(&self, id: FoodId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Food> {
        self.items.values()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Scatter `count` units uniformly within +- `spread` of `center`,
    /// clamped to the world square of half-width `extent`
    pub fn scatter(&mut self, center: Vec2, count: usize, spread: f32, extent: f32, rng: &mut impl Rng) {
        let (lo, hi) = (Vec2::splat(-extent), Vec2::splat(extent));
        for _ in 0..count {
            let offset = Vec2::new(rng.gen_range(-spread..=spread), rng.gen_range(-spread..=spread));
            self.spawn((center + offset).clamp(lo, hi));
        }
    }
}

/// Interval-driven cluster generator, capped at `max_food`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodSpawner {
    config: FoodConfig,
    extent: f32,
    timer: f32,
}

impl FoodSpawner {
    pub fn new(config: FoodConfig, extent: f32) -> Self {
        let timer = config.spawn_interval;
        Self { config, extent, timer }
    }

    /// Lay down the initial clusters
    pub fn seed(&self, field: &mut FoodField, rng: &mut impl Rng) -> usize {
        (0..self.config.initial_clusters)
            .map(|_| self.spawn_cluster(field, rng))
            .sum()
    }

    /// Advance the spawn timer; returns the number of units placed
    pub fn advance(&mut self, dt: f32, field: &mut FoodField, rng: &mut impl Rng) -> usize {
        self.timer -= dt;
        if self.timer > 0.0 {
            return 0;
        }
        self.timer = self.config.spawn_interval;
        self.spawn_cluster(field, rng)
    }

    fn spawn_cluster(&self, field: &mut FoodField, rng: &mut impl Rng) -> usize {
        if field.len() >= self.config.max_food {
            return 0;
        }

        let extent = self.extent;
        let center = Vec2::new(rng.gen_range(-extent..=extent), rng.gen_range(-extent..=extent));
        let count = self.config.cluster_size.min(self.config.max_food - field.len());
        field.scatter(center, count, self.config.cluster_spread, extent, rng);
        count
    }
}
