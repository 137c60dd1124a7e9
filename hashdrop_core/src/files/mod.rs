pub mod manager;
pub mod models;
pub mod retention;
pub mod store;
pub mod validation;

pub use manager::{FileManager, FileManagerConfig};
pub use models::{ObjectKey, StorageStats, StoreOutcome, StoredObject, UploadRequest, UploadResult};
pub use retention::{RetentionSweeper, SweepReport};
pub use store::ContentStore;
pub use validation::{FileValidationConfig, FileValidator, ValidationError, ValidationOutcome};
