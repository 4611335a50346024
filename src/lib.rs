//! Elevator Simulation Library
//!
//! A multi-elevator dispatch simulation that runs headless from the command
//! line or step by step from tests.

pub mod simulation;
