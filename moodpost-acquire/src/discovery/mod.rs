//! Track discovery: tier descriptors, provider catalogue and the engine

pub mod engine;
pub mod tiers;

pub use engine::{DiscoveryOutcome, TrackDiscoveryEngine, DEFAULT_PROVIDER_TIMEOUT};
pub use tiers::{ProviderCatalog, Relaxation, Tier};
