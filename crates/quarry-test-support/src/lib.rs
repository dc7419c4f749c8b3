//! Shared test mocks and utilities for the Quarry game engine.

mod clock;
mod repository;
mod rng;
mod subscriber;

pub use clock::{FixedClock, ManualClock};
pub use repository::FailingEntityRepository;
pub use rng::{MockRng, SequenceRng};
pub use subscriber::init_test_tracing;
