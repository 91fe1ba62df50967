//! First-generation population sampling.

use crate::agent::{random_heading, Agent, AgentId, BehaviorParams, Traits};
use crate::config::{Config, Range};
use glam::Vec2;
use rand::Rng;

#[inline]
fn sample(range: &Range, rng: &mut impl Rng) -> f32 {
    rng.gen_range(range.min..=range.max)
}

/// Sample one generation-1 agent from the spawn ranges
pub fn spawn_agent(id: AgentId, config: &Config, rng: &mut impl Rng) -> Agent {
    let spawn = &config.spawn;
    let traits = Traits {
        speed: sample(&spawn.speed, rng),
        size: sample(&spawn.size, rng),
        vision_range: sample(&spawn.vision_range, rng),
        mutation_strength: config.agents.mutation_strength,
    };
    let params = BehaviorParams::from_config(&config.agents, sample(&spawn.wander_time, rng));

    let [half_w, half_h] = spawn.area;
    let position = Vec2::new(rng.gen_range(-half_w..=half_w), rng.gen_range(-half_h..=half_h));

    let mut agent = Agent::new(id, position, traits, params, config.agents.initial_energy);
    agent.wander_direction = random_heading(rng);
    agent
}

/// Sample `initial_population` agents with ids starting at `first_id`
pub fn initial_population(config: &Config, first_id: AgentId, rng: &mut impl Rng) -> Vec<Agent> {
    (0..config.spawn.initial_population as AgentId)
        .map(|offset| spawn_agent(first_id + offset, config, rng))
        .collect()
}
