//! Domain layer: entities, selection logic and commands.

pub mod bounty;
pub mod charactor;
pub mod commands;
pub mod event;
pub mod game;
pub mod ids;
pub mod mission;
pub mod player;
pub mod selection;
pub mod stunt;
pub mod submission;
