pub mod config;
pub mod constraint;
pub mod geometry;
pub mod hand;
pub mod net;
pub mod protocol;
pub mod render;
pub mod session;
pub mod tracker;
