pub mod tombstones;
pub mod vec2;
