//! Domain model and pure logic for storyreel.
//!
//! Everything in this crate is free of I/O: the story record and its
//! status state machine, the create-story request contract, the scene
//! prompt assembler, and the prompt safety audit.

pub mod assembler;
pub mod error;
pub mod request;
pub mod safety;
pub mod story;
pub mod types;
