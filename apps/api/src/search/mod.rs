pub mod cache;
pub mod cache_key;
pub mod handlers;
pub mod orchestrator;
pub mod params;
pub mod upstream;
pub mod usage;
