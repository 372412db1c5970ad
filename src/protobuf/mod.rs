//! Meshtastic protobuf messages
//!
//! The message types the session engine exchanges with a radio, declared with
//! `prost` derives. Field tags follow the upstream Meshtastic schema so frames
//! produced here are understood by stock firmware. Only the subset the engine
//! reads or writes is declared; prost skips unknown fields on decode.
//!
//! Configuration and module-configuration bodies are kept as opaque bytes per
//! category (a message field and a bytes field share the same wire encoding),
//! so the engine can store and forward them without modelling every setting.

pub mod admin;
pub mod apps;
pub mod mesh;

pub use admin::*;
pub use apps::*;
pub use mesh::*;

/// Node number meaning "every node on the mesh".
pub const BROADCAST_ADDR: u32 = 0xFFFF_FFFF;

/// Convert a Meshtastic fixed-point coordinate (1e-7 degrees) to degrees.
pub fn coord_from_i(v: i32) -> f64 {
    v as f64 * 1e-7
}

/// Convert degrees to the Meshtastic fixed-point coordinate representation.
pub fn coord_to_i(deg: f64) -> i32 {
    (deg * 1e7).round() as i32
}
