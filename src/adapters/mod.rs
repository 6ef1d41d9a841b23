// Adapters layer: concrete implementations for external systems (storage backends, http).

pub mod http;
pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;
