//! Provider module - Trait, direct inference and proxy adapters, and registry

pub mod huggingface;
pub mod proxy;
pub mod registry;
pub mod traits;

pub use traits::{ImageProvider, ProviderKind, ProviderRequest};
