//! Quarry Core: shared entity abstractions.
//!
//! This crate defines the attribute store, the entity/record model, the
//! guard layer and the repository contract that the game context builds
//! on. It contains no infrastructure code.

pub mod attributes;
pub mod clock;
pub mod command;
pub mod entity;
pub mod error;
pub mod guard;
pub mod ids;
pub mod persistence;
pub mod repository;
pub mod rng;
