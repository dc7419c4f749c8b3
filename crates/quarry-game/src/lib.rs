//! Quarry: hunter / prey / judge game-state engine.
//!
//! Players join a game as charactors, accept missions to photograph a prey
//! performing a stunt, and submit the photo to two judges. The crate owns
//! the entity model, the guarded state transitions between charactor
//! activities, and the random selection of prey, stunts and judges.

pub mod application;
pub mod config;
pub mod domain;
