//! Agent structure and behavior.
//!
//! Every tick an agent updates its mating latch, looks around through a
//! [`SpatialQuery`], picks exactly one [`Behavior`] by walking
//! [`BehaviorKind::PRIORITY`], executes it, stays inside the world and pays
//! its metabolic cost. Interactions with other entities (eating, predation,
//! births) are not applied to the world directly: they are reported as
//! [`Effect`]s and committed by the world after every agent has decided.

use crate::config::{AgentConfig, Config, TraitBounds};
use crate::food::{FoodField, FoodId};
use crate::grid::{nearest, Category, EntityRef, SpatialQuery};
use crate::population::PopulationRegistry;
use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

/// Unique agent identifier
pub type AgentId = u64;

/// Speed multiplier while fleeing or hunting
const BURST_FACTOR: f32 = 1.2;
/// Another agent is a predator when larger by this factor, prey when smaller
const PREDATION_SIZE_RATIO: f32 = 1.5;
/// Predators are only noticed within this fraction of the vision range
const PREDATOR_VISION_FRACTION: f32 = 1.0 / 3.0;
/// Mates are searched for within this multiple of the vision range
const MATE_VISION_FACTOR: f32 = 2.0;
/// Maximum size difference between mates
const MATE_SIZE_TOLERANCE: f32 = 0.5;
/// Hunting needs energy above this multiple of the reproduction threshold
const HUNT_ENERGY_FACTOR: f32 = 2.0;
/// Energy gained per unit of prey body size, on top of its stored energy
const PREY_SIZE_ENERGY: f32 = 2.0;
/// Food units left by a corpse per unit of body size
const CORPSE_FOOD_PER_SIZE: f32 = 2.0;

/// Heritable traits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Traits {
    pub speed: f32,
    pub size: f32,
    pub vision_range: f32,
    pub mutation_strength: f32,
}

impl Traits {
    /// Independently jitter speed, size and vision by up to
    /// +- `mutation_strength`, then clamp to the global bounds.
    pub fn mutate(&self, bounds: &TraitBounds, evolve_mutation_strength: bool, rng: &mut impl Rng) -> Self {
        let strength = self.mutation_strength;
        let mut jitter = |value: f32| value + rng.gen_range(-strength..=strength);

        let speed = bounds.speed.clamp(jitter(self.speed));
        let size = bounds.size.clamp(jitter(self.size));
        let vision_range = bounds.vision_range.clamp(jitter(self.vision_range));
        let mutation_strength = if evolve_mutation_strength {
            bounds.mutation_strength.clamp(jitter(strength))
        } else {
            strength
        };

        Self {
            speed,
            size,
            vision_range,
            mutation_strength,
        }
    }

    /// Whether speed, size and vision satisfy the global bounds
    pub fn within(&self, bounds: &TraitBounds) -> bool {
        bounds.speed.contains(self.speed)
            && bounds.size.contains(self.size)
            && bounds.vision_range.contains(self.vision_range)
    }
}

/// Behavioral parameters, copied unchanged from parent to child
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorParams {
    pub flee_distance: f32,
    /// Seconds between wander heading changes
    pub wander_time: f32,
    pub reproduction_start: f32,
    pub reproduction_stop: f32,
    pub base_energy_usage: f32,
    pub size_energy_coeff: f32,
    pub vision_energy_coeff: f32,
    pub speed_energy_coeff: f32,
}

impl BehaviorParams {
    pub fn from_config(config: &AgentConfig, wander_time: f32) -> Self {
        Self {
            flee_distance: config.flee_distance,
            wander_time,
            reproduction_start: config.reproduction_start,
            reproduction_stop: config.reproduction_stop,
            base_energy_usage: config.base_energy_usage,
            size_energy_coeff: config.size_energy_coeff,
            vision_energy_coeff: config.vision_energy_coeff,
            speed_energy_coeff: config.speed_energy_coeff,
        }
    }

    /// Energy burned per simulated second
    #[inline]
    pub fn energy_usage(&self, traits: &Traits) -> f32 {
        self.base_energy_usage
            + traits.vision_range * self.vision_energy_coeff
            + traits.speed * self.speed_energy_coeff
            + traits.size * self.size_energy_coeff
    }
}

/// The closed set of behaviors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorKind {
    Flee,
    Hunt,
    SeekMate,
    SeekFood,
    Wander,
}

impl BehaviorKind {
    /// Evaluation order; the first applicable behavior wins
    pub const PRIORITY: [BehaviorKind; 5] = [
        BehaviorKind::Flee,
        BehaviorKind::Hunt,
        BehaviorKind::SeekMate,
        BehaviorKind::SeekFood,
        BehaviorKind::Wander,
    ];
}

/// A selected behavior together with what it acts on
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Behavior {
    Flee { from: Vec2 },
    Hunt { prey: AgentId, at: Vec2 },
    SeekMate { mate: AgentId, at: Vec2 },
    SeekFood { food: FoodId, at: Vec2 },
    Wander,
}

impl Behavior {
    pub fn kind(&self) -> BehaviorKind {
        match self {
            Self::Flee { .. } => BehaviorKind::Flee,
            Self::Hunt { .. } => BehaviorKind::Hunt,
            Self::SeekMate { .. } => BehaviorKind::SeekMate,
            Self::SeekFood { .. } => BehaviorKind::SeekFood,
            Self::Wander => BehaviorKind::Wander,
        }
    }
}

/// What a renderer should show for an agent. Purely observational.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DisplayState {
    Hunting,
    SeekingMate,
    /// Energy relative to the reproduction threshold, in [0, 1]
    Energy(f32),
}

impl DisplayState {
    pub fn of(agent: &Agent) -> Self {
        if agent.hunting {
            Self::Hunting
        } else if agent.seeking_mate {
            Self::SeekingMate
        } else {
            let threshold = agent.params.reproduction_start;
            let level = if threshold > 0.0 {
                (agent.energy / threshold).clamp(0.0, 1.0)
            } else {
                1.0
            };
            Self::Energy(level)
        }
    }
}

/// A child produced by [`Agent::reproduce`], waiting for an id
#[derive(Debug, Clone, PartialEq)]
pub struct Offspring {
    pub parent: AgentId,
    pub mate: AgentId,
    pub traits: Traits,
    pub params: BehaviorParams,
    pub energy: f32,
    pub generation: u32,
    pub position: Vec2,
    pub wander_direction: Vec2,
}

impl Offspring {
    /// Materialize the child under its allocated id
    pub fn into_agent(self, id: AgentId) -> Agent {
        let mut child = Agent::new(id, self.position, self.traits, self.params, self.energy);
        child.generation = self.generation;
        child.wander_direction = self.wander_direction;
        child
    }
}

/// Interaction with the rest of the world, committed after the decide phase
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Prey was caught; `gain` has already been added to the predator
    Devour { prey: AgentId, gain: f32 },
    /// Food was eaten; `gain` has already been added to the eater
    Eat { food: FoodId, gain: f32 },
    Birth(Offspring),
}

/// Result of one [`Agent::tick`]
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub behavior: BehaviorKind,
    pub effects: Vec<Effect>,
    /// Energy hit zero this tick
    pub starved: bool,
}

/// Read-only view of the world an agent decides against
pub struct TickContext<'a, Q: SpatialQuery + ?Sized> {
    pub spatial: &'a Q,
    pub population: &'a PopulationRegistry,
    pub food: &'a FoodField,
    pub config: &'a Config,
}

/// An individual in the simulation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Agent {
    // Identity
    pub id: AgentId,
    pub generation: u32,

    // Genes
    pub traits: Traits,
    pub params: BehaviorParams,

    // Physical state
    pub energy: f32,
    pub position: Vec2,
    pub age: f32,

    // Behavior
    pub wander_direction: Vec2,
    pub wander_timer: f32,
    pub target: Option<EntityRef>,
    pub seeking_mate: bool,
    pub hunting: bool,
    pub last_behavior: Option<BehaviorKind>,
    pub display: DisplayState,

    // Statistics
    pub kills: u32,
    pub offspring_count: u32,
    pub food_eaten: u32,
}

impl Agent {
    /// Create a first-generation agent
    pub fn new(id: AgentId, position: Vec2, traits: Traits, params: BehaviorParams, energy: f32) -> Self {
        let wander_timer = params.wander_time;
        let mut agent = Self {
            id,
            generation: 1,
            traits,
            params,
            energy,
            position,
            age: 0.0,
            wander_direction: Vec2::X,
            wander_timer,
            target: None,
            seeking_mate: false,
            hunting: false,
            last_behavior: None,
            display: DisplayState::Energy(0.0),
            kills: 0,
            offspring_count: 0,
            food_eaten: 0,
        };
        agent.display = DisplayState::of(&agent);
        agent
    }

    /// Advance this agent by `dt` simulated seconds
    pub fn tick<Q>(&mut self, dt: f32, ctx: &TickContext<'_, Q>, rng: &mut impl Rng) -> TickOutcome
    where
        Q: SpatialQuery + ?Sized,
    {
        self.age += dt;
        self.update_mating_state();

        let behavior = self.select_behavior(ctx);
        let mut effects = Vec::new();
        self.execute(behavior, dt, ctx, rng, &mut effects);

        self.keep_within_bounds(ctx.config.world.extent);
        let starved = self.consume_energy(dt);

        self.last_behavior = Some(behavior.kind());
        self.display = DisplayState::of(self);

        TickOutcome {
            behavior: behavior.kind(),
            effects,
            starved,
        }
    }

    /// Two-state latch with hysteresis between the start and stop thresholds
    pub fn update_mating_state(&mut self) {
        if !self.seeking_mate && self.energy >= self.params.reproduction_start {
            self.seeking_mate = true;
        } else if self.seeking_mate && self.energy < self.params.reproduction_stop {
            self.seeking_mate = false;
        }
    }

    /// Walk the priority list and return the first behavior that applies
    pub fn select_behavior<Q>(&mut self, ctx: &TickContext<'_, Q>) -> Behavior
    where
        Q: SpatialQuery + ?Sized,
    {
        for kind in BehaviorKind::PRIORITY {
            if let Some(behavior) = self.propose(kind, ctx) {
                return behavior;
            }
        }
        Behavior::Wander
    }

    fn propose<Q>(&mut self, kind: BehaviorKind, ctx: &TickContext<'_, Q>) -> Option<Behavior>
    where
        Q: SpatialQuery + ?Sized,
    {
        match kind {
            BehaviorKind::Flee => self
                .find_predator(ctx)
                .map(|(_, from)| Behavior::Flee { from }),
            BehaviorKind::Hunt => {
                if self.energy <= self.params.reproduction_start * HUNT_ENERGY_FACTOR {
                    return None;
                }
                self.find_prey(ctx).map(|(prey, at)| Behavior::Hunt { prey, at })
            }
            BehaviorKind::SeekMate => {
                if !self.seeking_mate {
                    return None;
                }
                let held = self.held_agent_target(ctx);
                let mate = held.or_else(|| self.find_mate(ctx));
                self.target = mate.map(|(id, _)| EntityRef::Agent(id));
                mate.map(|(mate, at)| Behavior::SeekMate { mate, at })
            }
            BehaviorKind::SeekFood => {
                let held = self.held_food_target(ctx);
                let food = held.or_else(|| self.find_food(ctx));
                self.target = food.map(|(id, _)| EntityRef::Food(id));
                food.map(|(food, at)| Behavior::SeekFood { food, at })
            }
            BehaviorKind::Wander => Some(Behavior::Wander),
        }
    }

    fn execute<Q>(
        &mut self,
        behavior: Behavior,
        dt: f32,
        ctx: &TickContext<'_, Q>,
        rng: &mut impl Rng,
        effects: &mut Vec<Effect>,
    ) where
        Q: SpatialQuery + ?Sized,
    {
        let world = &ctx.config.world;
        self.hunting = false;

        match behavior {
            Behavior::Flee { from } => {
                self.flee(from, dt);
                self.target = None;
            }
            Behavior::Hunt { prey, at } => {
                self.hunting = true;
                self.target = Some(EntityRef::Agent(prey));
                self.move_toward(at, self.traits.speed * BURST_FACTOR, dt);

                if self.position.distance(at) < world.capture_distance {
                    if let Some(victim) = ctx.population.get(prey) {
                        let gain = self.devour(victim);
                        effects.push(Effect::Devour { prey, gain });
                    }
                    self.target = None;
                }
            }
            Behavior::SeekMate { mate, at } => {
                self.move_toward(at, self.traits.speed, dt);

                if self.position.distance(at) < world.capture_distance {
                    if let Some(partner) = ctx.population.get(mate) {
                        let child = self.reproduce(partner, ctx.config, rng);
                        effects.push(Effect::Birth(child));
                    }
                    self.target = None;
                }
            }
            Behavior::SeekFood { food, at } => {
                if self.energy > world.crowding_energy {
                    self.keep_distance(ctx, dt);
                }
                self.move_toward(at, self.traits.speed, dt);

                if self.position.distance(at) < world.capture_distance {
                    self.energy += world.food_energy;
                    self.food_eaten += 1;
                    effects.push(Effect::Eat {
                        food,
                        gain: world.food_energy,
                    });
                    self.target = None;
                }
            }
            Behavior::Wander => self.wander(dt, rng),
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // PERCEPTION
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Nearest other agent within `radius` accepted by `accept`
    fn nearest_agent<Q, F>(&self, ctx: &TickContext<'_, Q>, radius: f32, accept: F) -> Option<(AgentId, Vec2)>
    where
        Q: SpatialQuery + ?Sized,
        F: Fn(&Agent) -> bool,
    {
        let candidates = ctx
            .spatial
            .query(self.position, radius, Category::Individual)
            .into_iter()
            .filter(|s| match s.entity.agent_id() {
                Some(id) if id != self.id => ctx.population.get(id).is_some_and(&accept),
                _ => false,
            });

        nearest(self.position, candidates)
            .and_then(|s| s.entity.agent_id().map(|id| (id, s.position)))
    }

    pub fn find_predator<Q>(&self, ctx: &TickContext<'_, Q>) -> Option<(AgentId, Vec2)>
    where
        Q: SpatialQuery + ?Sized,
    {
        let radius = self.traits.vision_range * PREDATOR_VISION_FRACTION;
        let threshold = self.traits.size * PREDATION_SIZE_RATIO;
        self.nearest_agent(ctx, radius, |other| other.traits.size > threshold)
    }

    pub fn find_prey<Q>(&self, ctx: &TickContext<'_, Q>) -> Option<(AgentId, Vec2)>
    where
        Q: SpatialQuery + ?Sized,
    {
        let threshold = self.traits.size / PREDATION_SIZE_RATIO;
        self.nearest_agent(ctx, self.traits.vision_range, |other| other.traits.size <= threshold)
    }

    pub fn find_mate<Q>(&self, ctx: &TickContext<'_, Q>) -> Option<(AgentId, Vec2)>
    where
        Q: SpatialQuery + ?Sized,
    {
        let radius = self.traits.vision_range * MATE_VISION_FACTOR;
        let size = self.traits.size;
        let threshold = self.params.reproduction_start;
        self.nearest_agent(ctx, radius, |other| {
            (other.traits.size - size).abs() < MATE_SIZE_TOLERANCE && other.energy >= threshold
        })
    }

    pub fn find_food<Q>(&self, ctx: &TickContext<'_, Q>) -> Option<(FoodId, Vec2)>
    where
        Q: SpatialQuery + ?Sized,
    {
        let candidates = ctx
            .spatial
            .query(self.position, self.traits.vision_range, Category::Food)
            .into_iter()
            .filter(|s| s.entity.food_id().is_some_and(|id| ctx.food.contains(id)));

        nearest(self.position, candidates)
            .and_then(|s| s.entity.food_id().map(|id| (id, s.position)))
    }

    /// Current target if it is still a live agent other than self
    fn held_agent_target<Q>(&self, ctx: &TickContext<'_, Q>) -> Option<(AgentId, Vec2)>
    where
        Q: SpatialQuery + ?Sized,
    {
        match self.target {
            Some(EntityRef::Agent(id)) if id != self.id => {
                ctx.population.get(id).map(|other| (id, other.position))
            }
            _ => None,
        }
    }

    /// Current target if it is still an existing food unit
    fn held_food_target<Q>(&self, ctx: &TickContext<'_, Q>) -> Option<(FoodId, Vec2)>
    where
        Q: SpatialQuery + ?Sized,
    {
        match self.target {
            Some(EntityRef::Food(id)) => ctx.food.get(id).map(|food| (id, food.position)),
            _ => None,
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // ACTIONS
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    #[inline]
    fn move_toward(&mut self, target: Vec2, speed: f32, dt: f32) {
        let direction = (target - self.position).normalize_or_zero();
        self.position += direction * speed * dt;
    }

    fn flee(&mut self, predator: Vec2, dt: f32) {
        let direction = (self.position - predator).normalize_or_zero();
        self.position += direction * self.traits.speed * BURST_FACTOR * dt;
    }

    fn wander(&mut self, dt: f32, rng: &mut impl Rng) {
        self.position += self.wander_direction * self.traits.speed * dt;

        self.wander_timer -= dt;
        if self.wander_timer <= 0.0 {
            self.wander_direction = random_heading(rng);
            self.wander_timer = self.params.wander_time;
        }
    }

    /// Crowding avoidance: step away from agents inside the separation radius
    fn keep_distance<Q>(&mut self, ctx: &TickContext<'_, Q>, dt: f32)
    where
        Q: SpatialQuery + ?Sized,
    {
        let me = EntityRef::Agent(self.id);
        let push: Vec2 = ctx
            .spatial
            .query(self.position, ctx.config.world.separation_radius, Category::Individual)
            .into_iter()
            .filter(|s| s.entity != me)
            .map(|s| (self.position - s.position).normalize_or_zero())
            .sum();

        if push != Vec2::ZERO {
            self.position += push.normalize_or_zero() * self.traits.speed * dt;
        }
    }

    /// Absorb a caught prey; returns the energy gained
    pub fn devour(&mut self, prey: &Agent) -> f32 {
        let gain = prey.energy + prey.traits.size * PREY_SIZE_ENERGY;
        self.energy += gain;
        self.kills += 1;
        gain
    }

    /// Produce a mutated child. Energy is split, not duplicated: the child
    /// receives half of this agent's energy and this agent keeps the rest.
    pub fn reproduce(&mut self, mate: &Agent, config: &Config, rng: &mut impl Rng) -> Offspring {
        let traits = self
            .traits
            .mutate(&config.bounds, config.agents.evolve_mutation_strength, rng);

        let share = self.energy / 2.0;
        self.energy -= share;
        self.offspring_count += 1;

        Offspring {
            parent: self.id,
            mate: mate.id,
            traits,
            params: self.params.clone(),
            energy: share,
            generation: self.generation.max(mate.generation) + 1,
            position: self.position,
            wander_direction: self.wander_direction,
        }
    }

    /// Clamp to the world square, reflecting the wander heading on the
    /// axis that was out of range
    pub fn keep_within_bounds(&mut self, extent: f32) {
        if self.position.x < -extent || self.position.x > extent {
            self.wander_direction.x = -self.wander_direction.x;
            self.position.x = self.position.x.clamp(-extent, extent);
        }
        if self.position.y < -extent || self.position.y > extent {
            self.wander_direction.y = -self.wander_direction.y;
            self.position.y = self.position.y.clamp(-extent, extent);
        }
    }

    /// Pay the metabolic cost for `dt`; returns true if the agent starved
    pub fn consume_energy(&mut self, dt: f32) -> bool {
        let usage = self.params.energy_usage(&self.traits);
        self.energy = (self.energy - usage * dt).max(0.0);
        self.is_starved()
    }

    #[inline]
    pub fn is_starved(&self) -> bool {
        self.energy <= 0.0
    }

    /// Food units this body turns into on death
    #[inline]
    pub fn corpse_food(&self) -> usize {
        (self.traits.size * CORPSE_FOOD_PER_SIZE).ceil() as usize
    }

    /// Get fitness score (for analysis)
    pub fn fitness(&self) -> f32 {
        let survival_score = self.age;
        let reproduction_score = self.offspring_count as f32 * 100.0;
        let food_score = self.food_eaten as f32 * 10.0;
        let predation_score = self.kills as f32 * 50.0;

        survival_score + reproduction_score + food_score + predation_score
    }
}

/// Uniform heading over the full circle
pub fn random_heading(rng: &mut impl Rng) -> Vec2 {
    Vec2::from_angle(rng.gen_range(0.0..TAU))
}
