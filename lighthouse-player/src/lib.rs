//! # lighthouse-player
//!
//! Plays one of the built-in animations on the Lighthouse display until
//! interrupted.
//!
//! - **fill**: lights every channel of every window in turn, then clears
//! - **dot**: a dot steered with W, A, S and D from the remote input page
//! - **sweep**: a coloured column crossing the display

pub mod animation;
pub mod config;
