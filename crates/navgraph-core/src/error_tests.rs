//! Tests for `error` module

use super::error::*;
use crate::metric::MetricKind;
use crate::scalar::ScalarKind;

// -------------------------------------------------------------------------
// Error code tests
// -------------------------------------------------------------------------

#[test]
fn test_error_codes_are_unique() {
    // Arrange - create all error variants
    let errors: Vec<Error> = vec![
        Error::InvalidConfig("test".into()),
        Error::UnsupportedCombination {
            metric: MetricKind::Hamming,
            scalar: ScalarKind::F32,
        },
        Error::DimensionMismatch {
            expected: 768,
            actual: 512,
        },
        Error::DuplicateLabel(2),
        Error::CapacityExceeded { capacity: 10 },
        Error::AllocationFailure("test".into()),
        Error::NotFound(1),
        Error::Serialization("test".into()),
        Error::ConfigMismatch {
            field: "dimensions",
            expected: "3".into(),
            found: "4".into(),
        },
        Error::ReadOnly("add"),
        Error::Io(std::io::Error::other("test")),
    ];

    // Act - collect all codes
    let codes: Vec<&str> = errors.iter().map(Error::code).collect();

    // Assert - all codes are unique and follow pattern
    let mut unique_codes = codes.clone();
    unique_codes.sort_unstable();
    unique_codes.dedup();
    assert_eq!(codes.len(), unique_codes.len(), "Error codes must be unique");

    for code in &codes {
        assert!(code.starts_with("NAVG-"), "Code {code} should start with NAVG-");
    }
}

#[test]
fn test_error_display_includes_code() {
    // Arrange
    let err = Error::NotFound(42);

    // Act
    let display = format!("{err}");

    // Assert
    assert!(display.contains("NAVG-007"));
    assert!(display.contains("42"));
}

#[test]
fn test_dimension_mismatch_display() {
    let err = Error::DimensionMismatch {
        expected: 768,
        actual: 512,
    };

    let display = format!("{err}");

    assert!(display.contains("768"));
    assert!(display.contains("512"));
    assert!(display.contains("NAVG-003"));
}

#[test]
fn test_unsupported_combination_names_both_kinds() {
    let err = Error::UnsupportedCombination {
        metric: MetricKind::Jaccard,
        scalar: ScalarKind::F16,
    };

    let display = format!("{err}");

    assert!(display.contains("jaccard"));
    assert!(display.contains("f16"));
}

// -------------------------------------------------------------------------
// Conversion tests
// -------------------------------------------------------------------------

#[test]
fn test_from_io_error() {
    // Arrange
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");

    // Act
    let err: Error = io_err.into();

    // Assert
    assert_eq!(err.code(), "NAVG-011");
    assert!(format!("{err}").contains("file not found"));
}

#[test]
fn test_from_config_error() {
    let cfg_err = crate::config::ConfigError::InvalidValue {
        key: "connectivity".into(),
        message: "too small".into(),
    };

    let err: Error = cfg_err.into();

    assert_eq!(err.code(), "NAVG-001");
    assert!(format!("{err}").contains("connectivity"));
}

// -------------------------------------------------------------------------
// Recoverable tests
// -------------------------------------------------------------------------

#[test]
fn test_recoverable_errors() {
    assert!(Error::CapacityExceeded { capacity: 1 }.is_recoverable());
    assert!(Error::DuplicateLabel(3).is_recoverable());
    assert!(Error::NotFound(3).is_recoverable());
}

#[test]
fn test_non_recoverable_errors() {
    assert!(!Error::Serialization("truncated header".into()).is_recoverable());
}

#[test]
fn test_error_is_send_sync() {
    // Required for rayon worker pools
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Error>();
}
