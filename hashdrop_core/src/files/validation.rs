use std::collections::HashSet;
use thiserror::Error;

use crate::config::StorageConfig;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max_size} bytes)")]
    FileTooLarge { size: u64, max_size: u64 },

    #[error("Invalid file type: {filename}")]
    InvalidFileType { filename: String },

    #[error("Empty file not allowed")]
    EmptyFile,
}

/// Result of checking an upload before anything touches disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Carries the normalized (lowercase) extension.
    Accepted { extension: String },
    Rejected { reason: ValidationError },
}

impl ValidationOutcome {
    pub fn into_result(self) -> Result<String, ValidationError> {
        match self {
            ValidationOutcome::Accepted { extension } => Ok(extension),
            ValidationOutcome::Rejected { reason } => Err(reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileValidationConfig {
    pub max_file_size: u64,
    pub allowed_extensions: HashSet<String>,
}

impl Default for FileValidationConfig {
    fn default() -> Self {
        Self::from(&StorageConfig::default())
    }
}

impl From<&StorageConfig> for FileValidationConfig {
    fn from(storage: &StorageConfig) -> Self {
        Self {
            max_file_size: storage.max_file_size_bytes,
            allowed_extensions: storage
                .allowed_extensions
                .iter()
                .map(|ext| ext.to_ascii_lowercase())
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileValidator {
    config: FileValidationConfig,
}

impl FileValidator {
    pub fn new(config: FileValidationConfig) -> Self {
        Self { config }
    }

    pub fn with_default_config() -> Self {
        Self::new(FileValidationConfig::default())
    }

    pub fn max_file_size(&self) -> u64 {
        self.config.max_file_size
    }

    pub fn is_allowed_extension(&self, extension: &str) -> bool {
        self.config.allowed_extensions.contains(extension)
    }

    /// Checks the declared type first, then the size, so an oversized
    /// `.zip` is reported as a type problem.
    pub fn validate(&self, filename: &str, size: u64) -> ValidationOutcome {
        let extension = match self.validate_extension(filename) {
            Ok(extension) => extension,
            Err(reason) => return ValidationOutcome::Rejected { reason },
        };

        if let Err(reason) = self.validate_size(size) {
            return ValidationOutcome::Rejected { reason };
        }

        ValidationOutcome::Accepted { extension }
    }

    pub fn validate_size(&self, size: u64) -> Result<(), ValidationError> {
        if size > self.config.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max_size: self.config.max_file_size,
            });
        }
        Ok(())
    }

    fn validate_extension(&self, filename: &str) -> Result<String, ValidationError> {
        let invalid = || ValidationError::InvalidFileType {
            filename: filename.to_string(),
        };

        let (_, suffix) = filename.rsplit_once('.').ok_or_else(invalid)?;
        let extension = suffix.to_ascii_lowercase();

        if extension.is_empty() || !self.is_allowed_extension(&extension) {
            return Err(invalid());
        }

        Ok(extension)
    }
}
