//! Statistics tracking for the simulation.
//!
//! Two layers: [`StatsAggregator`] samples population-wide trait averages on
//! a simulated-time cadence and keeps the three trait histories, while
//! [`Stats`] is the per-step snapshot of counters the world maintains.

use crate::population::PopulationRegistry;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;

/// Population-wide trait averages at one point in time
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSample {
    /// Simulated seconds since the start of the run
    pub time: f32,
    pub speed: f32,
    pub size: f32,
    pub vision_range: f32,
}

impl StatsSample {
    /// Arithmetic means over the live population; zeros when it is empty
    pub fn measure(population: &PopulationRegistry, time: f32) -> Self {
        let count = population.len();
        if count == 0 {
            return Self {
                time,
                ..Self::default()
            };
        }

        let (speed, size, vision_range) = population.all().fold((0.0, 0.0, 0.0), |acc, agent| {
            (
                acc.0 + agent.traits.speed,
                acc.1 + agent.traits.size,
                acc.2 + agent.traits.vision_range,
            )
        });
        let n = count as f32;

        Self {
            time,
            speed: speed / n,
            size: size / n,
            vision_range: vision_range / n,
        }
    }
}

/// Three parallel trait series, optionally bounded
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TraitHistory {
    pub times: VecDeque<f32>,
    pub speed: VecDeque<f32>,
    pub size: VecDeque<f32>,
    pub vision_range: VecDeque<f32>,
    /// Oldest samples are evicted past this length; `None` keeps everything
    pub capacity: Option<usize>,
}

impl TraitHistory {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Append one sample to every series, evicting together when full
    pub fn record(&mut self, sample: StatsSample) {
        if let Some(cap) = self.capacity {
            while self.len() >= cap.max(1) {
                self.times.pop_front();
                self.speed.pop_front();
                self.size.pop_front();
                self.vision_range.pop_front();
            }
        }
        self.times.push_back(sample.time);
        self.speed.push_back(sample.speed);
        self.size.push_back(sample.size);
        self.vision_range.push_back(sample.vision_range);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Sample at `index`, oldest first
    pub fn get(&self, index: usize) -> Option<StatsSample> {
        Some(StatsSample {
            time: *self.times.get(index)?,
            speed: *self.speed.get(index)?,
            size: *self.size.get(index)?,
            vision_range: *self.vision_range.get(index)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = StatsSample> + '_ {
        (0..self.len()).filter_map(|i| self.get(i))
    }

    /// Save history to a JSON file
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Load history from a JSON file
    pub fn load_json<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

/// Interval-driven sampler of trait averages
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatsAggregator {
    update_interval: f32,
    since_update: f32,
    elapsed: f32,
    latest: StatsSample,
    history: TraitHistory,
}

impl StatsAggregator {
    pub fn new(update_interval: f32, capacity: Option<usize>) -> Self {
        Self {
            update_interval,
            since_update: 0.0,
            elapsed: 0.0,
            latest: StatsSample::default(),
            history: TraitHistory::new(capacity),
        }
    }

    /// Accumulate `dt`; once the interval is reached, sample the registry.
    /// Returns the new sample when one was taken.
    pub fn advance(&mut self, dt: f32, population: &PopulationRegistry) -> Option<StatsSample> {
        self.elapsed += dt;
        self.since_update += dt;
        if self.since_update < self.update_interval {
            return None;
        }
        self.since_update = 0.0;

        let sample = StatsSample::measure(population, self.elapsed);
        self.latest = sample;
        self.history.record(sample);
        log::debug!(
            "t={:.1}s avg speed {:.3} size {:.3} vision {:.3} over {} agents",
            sample.time,
            sample.speed,
            sample.size,
            sample.vision_range,
            population.len()
        );
        Some(sample)
    }

    /// Most recent averages
    #[inline]
    pub fn latest(&self) -> StatsSample {
        self.latest
    }

    #[inline]
    pub fn history(&self) -> &TraitHistory {
        &self.history
    }

    pub fn speed_history(&self) -> &VecDeque<f32> {
        &self.history.speed
    }

    pub fn size_history(&self) -> &VecDeque<f32> {
        &self.history.size
    }

    pub fn vision_history(&self) -> &VecDeque<f32> {
        &self.history.vision_range
    }
}

/// Statistics snapshot for a simulation step
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Stats {
    /// Steps taken so far
    pub time: u64,
    /// Simulated seconds elapsed
    pub elapsed: f32,
    pub population: usize,
    pub generation_max: u32,
    pub energy_mean: f32,
    pub food_count: usize,
    /// Births this step
    pub births: usize,
    /// Deaths by starvation this step
    pub deaths: usize,
    /// Agents eaten this step
    pub kills: usize,
    /// Food units eaten this step
    pub food_eaten: usize,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refresh the population-derived fields
    pub fn update(&mut self, population: &PopulationRegistry, food_count: usize) {
        self.population = population.len();
        self.food_count = food_count;

        if self.population == 0 {
            self.generation_max = 0;
            self.energy_mean = 0.0;
            return;
        }

        self.generation_max = population.all().map(|a| a.generation).max().unwrap_or(0);
        self.energy_mean = population.all().map(|a| a.energy).sum::<f32>() / self.population as f32;
    }

    /// Format stats as a one-line summary
    pub fn summary(&self) -> String {
        format!(
            "T:{:7} | {:8.1}s | Pop:{:5} | Gen:{:4} | Energy:{:6.2} | Food:{:5} | +{} -{} kills:{} eaten:{}",
            self.time,
            self.elapsed,
            self.population,
            self.generation_max,
            self.energy_mean,
            self.food_count,
            self.births,
            self.deaths,
            self.kills,
            self.food_eaten,
        )
    }
}

/// Per-step snapshots recorded every `interval` steps
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatsHistory {
    pub snapshots: Vec<Stats>,
    pub interval: u64,
}

impl StatsHistory {
    pub fn new(interval: u64) -> Self {
        Self {
            snapshots: Vec::new(),
            interval,
        }
    }

    pub fn record(&mut self, stats: Stats) {
        self.snapshots.push(stats);
    }

    /// Get population over time
    pub fn population_series(&self) -> Vec<(u64, usize)> {
        self.snapshots.iter().map(|s| (s.time, s.population)).collect()
    }

    /// Get generation max over time
    pub fn generation_series(&self) -> Vec<(u64, u32)> {
        self.snapshots.iter().map(|s| (s.time, s.generation_max)).collect()
    }

    /// Save history to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)
    }

    /// Load history from file
    pub fn load<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tests::test_agent;
    use crate::agent::Agent;

    fn agent_with(id: u64, speed: f32, size: f32, vision: f32) -> Agent {
        let mut agent = test_agent(id);
        agent.traits.speed = speed;
        agent.traits.size = size;
        agent.traits.vision_range = vision;
        agent
    }

    #[test]
    fn test_exact_means() {
        let registry: PopulationRegistry = vec![
            agent_with(1, 1.0, 1.0, 2.0),
            agent_with(2, 2.0, 3.0, 4.0),
            agent_with(3, 3.0, 2.0, 9.0),
        ]
        .into_iter()
        .collect();

        let sample = StatsSample::measure(&registry, 4.0);
        assert_eq!(sample.time, 4.0);
        assert!((sample.speed - 2.0).abs() < 1e-6);
        assert!((sample.size - 2.0).abs() < 1e-6);
        assert!((sample.vision_range - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_population_samples_zeros() {
        let mut aggregator = StatsAggregator::new(1.0, None);
        let sample = aggregator.advance(1.0, &PopulationRegistry::new()).unwrap();

        assert_eq!((sample.speed, sample.size, sample.vision_range), (0.0, 0.0, 0.0));
        assert_eq!(aggregator.speed_history().len(), 1);
    }

    #[test]
    fn test_one_sample_per_interval() {
        let registry: PopulationRegistry = vec![agent_with(1, 1.5, 1.0, 3.0)].into_iter().collect();
        let mut aggregator = StatsAggregator::new(1.0, None);

        let taken = (0..40)
            .filter_map(|_| aggregator.advance(0.25, &registry))
            .count();

        assert_eq!(taken, 10);
        assert_eq!(aggregator.speed_history().len(), 10);
        assert_eq!(aggregator.size_history().len(), 10);
        assert_eq!(aggregator.vision_history().len(), 10);
        assert_eq!(aggregator.latest().speed, 1.5);
    }

    #[test]
    fn test_ring_buffer_eviction() {
        let mut history = TraitHistory::new(Some(3));
        for i in 0..5 {
            let v = i as f32;
            history.record(StatsSample { time: v, speed: v, size: v, vision_range: v });
        }

        assert_eq!(history.len(), 3);
        assert_eq!(history.speed.len(), history.size.len());
        assert_eq!(history.size.len(), history.vision_range.len());
        assert_eq!(history.get(0).map(|s| s.speed), Some(2.0));
        assert_eq!(history.iter().last().map(|s| s.time), Some(4.0));
    }

    #[test]
    fn test_history_json_file() {
        let mut history = TraitHistory::new(None);
        history.record(StatsSample { time: 1.0, speed: 2.0, size: 3.0, vision_range: 4.0 });

        let path = std::env::temp_dir().join(format!("evosim_history_{}.json", std::process::id()));
        history.save_json(&path).unwrap();
        let loaded = TraitHistory::load_json(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.get(0), history.get(0));
    }

    #[test]
    fn test_stats_update() {
        let mut a = test_agent(1);
        a.generation = 3;
        a.energy = 1.0;
        let mut b = test_agent(2);
        b.generation = 7;
        b.energy = 3.0;
        let registry: PopulationRegistry = vec![a, b].into_iter().collect();

        let mut stats = Stats::new();
        stats.update(&registry, 12);

        assert_eq!(stats.population, 2);
        assert_eq!(stats.generation_max, 7);
        assert_eq!(stats.energy_mean, 2.0);
        assert_eq!(stats.food_count, 12);
        assert!(stats.summary().contains("Pop:    2"));
    }

    #[test]
    fn test_stats_history_series() {
        let mut history = StatsHistory::new(10);
        for i in 0..5 {
            let mut stats = Stats::new();
            stats.time = i * 10;
            stats.population = (i + 1) as usize * 100;
            history.record(stats);
        }

        let series = history.population_series();
        assert_eq!(series.len(), 5);
        assert_eq!(series[0], (0, 100));
        assert_eq!(series[4], (40, 500));
    }
}
