//! Domain layer - Pure types and planning, no process or file IO.

pub mod jobs;
pub mod probe;
pub mod segments;
