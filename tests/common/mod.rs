#![allow(dead_code)] // each test binary uses a different slice of the helpers

pub mod builders;
pub mod strategies;

pub use builders::*;
