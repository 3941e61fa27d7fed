pub mod cache_store;
pub mod collection;
pub mod engine;
pub mod fingerprint;
pub mod recommendations;
pub mod singleflight;
