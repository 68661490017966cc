// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Errors raised while declaring, slicing, or computing pooled statistics.
///
/// Configuration problems ([`VerifError::Declaration`], [`VerifError::Threshold`]) surface
/// synchronously from constructors and `apply`. Metric failures surface as
/// [`VerifError::Computation`] when the result store is built.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum VerifError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid declaration: {0}")]
    Declaration(String),
    #[error("threshold error: {0}")]
    Threshold(String),
    #[error("pool error: {0}")]
    Pool(String),
    #[error("computation failed: {0}")]
    Computation(String),
    #[error("not supported: {0}")]
    NotSupported(String),
    #[error("resource limit: {0}")]
    ResourceLimit(String),
}

impl VerifError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn declaration(message: impl Into<String>) -> Self {
        Self::Declaration(message.into())
    }

    pub fn threshold(message: impl Into<String>) -> Self {
        Self::Threshold(message.into())
    }

    pub fn pool(message: impl Into<String>) -> Self {
        Self::Pool(message.into())
    }

    pub fn computation(message: impl Into<String>) -> Self {
        Self::Computation(message.into())
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported(message.into())
    }

    pub fn resource_limit(message: impl Into<String>) -> Self {
        Self::ResourceLimit(message.into())
    }

    /// True for errors that indicate a bad declaration rather than a failed computation.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::Declaration(_) | Self::Threshold(_)
        )
    }
}
