//! Synthetic workloads for benchmarking and testing the engine.

pub mod trip_generator;

pub use trip_generator::{generate_random_trip, TripConfig};
