// arbor-api: Async Rust client for the platform's template and hierarchy endpoints

pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use client::PlatformClient;
pub use error::Error;
pub use models::{HierarchyPayload, HierarchyQuery, RawRecord, TemplateRecord};
pub use transport::{TlsMode, TransportConfig};
