// Core modules shared by every handler surface.
pub mod error;
