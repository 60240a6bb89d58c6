// src/error.rs
//
// Unified error handling for imagemill
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy:
// - Decode: malformed/truncated binary input (and codec failures)
// - Capability: operation requested on a format/state that cannot support it
// - Validation: out-of-range parameters, rejected before any pixel work
// - Consistency: data-integrity failures in otherwise well-formed input
// - Resource: I/O, allocation and limit failures
// - Internal: library bugs (should not happen)

use std::borrow::Cow;
use thiserror::Error;

/// Error taxonomy for callers that route on failure class rather than
/// on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed or truncated binary input; also covers encode failures
    Decode,
    /// Format/state cannot support the requested operation
    Capability,
    /// Out-of-range parameters, raised at construction time
    Validation,
    /// Data-integrity failure in structurally valid input
    Consistency,
    /// I/O, allocation and limit failures
    Resource,
    /// Library bugs (should not happen)
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Decode => "Decode",
            ErrorCategory::Capability => "Capability",
            ErrorCategory::Validation => "Validation",
            ErrorCategory::Consistency => "Consistency",
            ErrorCategory::Resource => "Resource",
            ErrorCategory::Internal => "Internal",
        }
    }
}

/// imagemill error types
///
/// All errors are type-safe and provide clear, actionable messages.
/// No numeric error codes - just clear error variants.
#[derive(Debug, Error)]
pub enum ImagemillError {
    // File I/O Errors
    #[error("File not found: {path}")]
    FileNotFound { path: Cow<'static, str> },

    #[error("Failed to read file '{path}': {source}")]
    FileReadFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to memory-map file '{path}': {source}")]
    MmapFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWriteFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    // Decode Errors
    #[error("Unsupported image format: {format}")]
    UnsupportedFormat { format: Cow<'static, str> },

    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    #[error("Invalid segment length {length} at offset {offset}")]
    InvalidSegmentLength { length: usize, offset: usize },

    #[error("Truncated data at offset {offset}: needed {needed} more byte(s)")]
    TruncatedData { offset: usize, needed: usize },

    #[error("Failed to encode as {format}: {message}")]
    EncodeFailed {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    // Capability Errors
    #[error("{format} does not support {feature}")]
    UnsupportedFeature {
        format: Cow<'static, str>,
        feature: Cow<'static, str>,
    },

    #[error("Transforms are not supported for the current {format} image")]
    TransformsUnsupported { format: Cow<'static, str> },

    #[error("Unsupported image conversion from {from} to {to}")]
    UnsupportedConversion {
        from: Cow<'static, str>,
        to: Cow<'static, str>,
    },

    // Validation Errors
    #[error("Invalid value for {name}: {value}. {reason}")]
    InvalidArgument {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    #[error("Invalid transform specifier: '{specifier}'")]
    InvalidSpecifier { specifier: Cow<'static, str> },

    // Consistency Errors
    #[error("Unexpected profile chunk count: expected {expected}, got {actual}")]
    ChunkCountMismatch { expected: u8, actual: usize },

    #[error("Unexpected value: {message}")]
    UnexpectedValue { message: Cow<'static, str> },

    // Resource Errors
    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    // Internal Errors
    #[error("Internal error: {message}")]
    InternalPanic { message: Cow<'static, str> },
}

// Constructor Helpers
impl ImagemillError {
    pub fn file_not_found(path: impl Into<Cow<'static, str>>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn file_read_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            source,
        }
    }

    pub fn mmap_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::MmapFailed {
            path: path.into(),
            source,
        }
    }

    pub fn file_write_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileWriteFailed {
            path: path.into(),
            source,
        }
    }

    pub fn unsupported_format(format: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn invalid_segment_length(length: usize, offset: usize) -> Self {
        Self::InvalidSegmentLength { length, offset }
    }

    pub fn truncated_data(offset: usize, needed: usize) -> Self {
        Self::TruncatedData { offset, needed }
    }

    pub fn encode_failed(
        format: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn unsupported_feature(
        format: impl Into<Cow<'static, str>>,
        feature: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::UnsupportedFeature {
            format: format.into(),
            feature: feature.into(),
        }
    }

    pub fn transforms_unsupported(format: impl Into<Cow<'static, str>>) -> Self {
        Self::TransformsUnsupported {
            format: format.into(),
        }
    }

    pub fn unsupported_conversion(
        from: impl Into<Cow<'static, str>>,
        to: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::UnsupportedConversion {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn invalid_argument(
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_specifier(specifier: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidSpecifier {
            specifier: specifier.into(),
        }
    }

    pub fn chunk_count_mismatch(expected: u8, actual: usize) -> Self {
        Self::ChunkCountMismatch { expected, actual }
    }

    pub fn unexpected_value(message: impl Into<Cow<'static, str>>) -> Self {
        Self::UnexpectedValue {
            message: message.into(),
        }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn internal_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            message: message.into(),
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            // Decode: malformed input and codec failures.
            // Encode failures share the codec category: both sides of the
            // byte<->raster boundary fail for the same class of reasons.
            Self::UnsupportedFormat { .. }
            | Self::DecodeFailed { .. }
            | Self::InvalidSegmentLength { .. }
            | Self::TruncatedData { .. }
            | Self::EncodeFailed { .. } => ErrorCategory::Decode,

            // Capability: raised before any mutation is attempted
            Self::UnsupportedFeature { .. }
            | Self::TransformsUnsupported { .. }
            | Self::UnsupportedConversion { .. } => ErrorCategory::Capability,

            // Validation: construction-time parameter checks
            Self::InvalidArgument { .. } | Self::InvalidSpecifier { .. } => {
                ErrorCategory::Validation
            }

            // Consistency: structurally valid input with contradictory content
            Self::ChunkCountMismatch { .. } | Self::UnexpectedValue { .. } => {
                ErrorCategory::Consistency
            }

            // Resource: I/O and limit failures
            Self::FileNotFound { .. }
            | Self::FileReadFailed { .. }
            | Self::MmapFailed { .. }
            | Self::FileWriteFailed { .. }
            | Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. } => ErrorCategory::Resource,

            Self::InternalPanic { .. } => ErrorCategory::Internal,
        }
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, ImagemillError>;
