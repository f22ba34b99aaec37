pub mod regions;

pub use regions::{CalibrationRegions, SamplingGeometry};
