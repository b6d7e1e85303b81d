pub mod engine;
pub mod fetcher;
pub mod pipeline;
pub mod plecto;
pub mod session;
pub mod snapshot;
pub mod token;
pub mod transform;
pub mod uploader;

pub use crate::domain::model::{DomainRecord, Registration, Session, SyncSummary};
pub use crate::domain::ports::{Pipeline, SecretStore, Storage};
pub use crate::utils::error::Result;
