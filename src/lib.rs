//! Sliding-mode control of a double inverted pendulum on a cart, with
//! controller gains tuned by particle-swarm optimization over randomized
//! initial-condition scenarios.

pub mod cli;
pub mod controllers;
pub mod core;
pub mod error;
pub mod optimization;
pub mod plant;
pub mod simulation;
