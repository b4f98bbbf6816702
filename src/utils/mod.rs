//! Helper functions for working with A2A protocol types.

pub mod artifact;
pub mod constants;
pub mod extensions;
pub mod message;
pub mod task;

pub use artifact::*;
pub use constants::*;
pub use extensions::*;
pub use message::*;
pub use task::*;
