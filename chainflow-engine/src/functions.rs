//! Functions served by the engine.

pub mod hello_world;

pub use hello_world::{greet, hello_world, GreetingResult};
