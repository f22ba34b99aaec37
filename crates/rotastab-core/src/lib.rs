pub mod analysis;
pub mod config;
pub mod correction;
pub mod debug;
pub mod discovery;
pub mod pipeline;
pub mod rect;
pub mod services;
pub mod video;
