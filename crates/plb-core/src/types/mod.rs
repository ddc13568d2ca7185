//! Core data types flowing through the PLB system.

pub mod enums;
pub mod level;
pub mod order;

pub use enums::*;
pub use level::*;
pub use order::*;
