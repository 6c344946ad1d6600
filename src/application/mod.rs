//! Application layer: mission orchestration over the domain services.

pub mod mission_controller;

pub use mission_controller::{
    Collaborators, MissionController, MissionOutcome, MissionSnapshot, SNAPSHOT_VERSION,
};
