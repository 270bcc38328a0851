pub mod engine;
pub mod geo;

pub use engine::FusionEngine;
pub use geo::haversine_km;
