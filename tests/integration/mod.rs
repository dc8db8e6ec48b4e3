mod fixtures;
mod resilience;
