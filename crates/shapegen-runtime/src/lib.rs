//! # shapegen runtime
//!
//! Structured error values and validation helpers called by the server types
//! that `shapegen` emits.
//!
//! A request that fails validation produces one [`ServiceError`] per
//! violation. Generated validators never stop at the first violation: each
//! error is pushed into a [`MultiError`], and the transport layer turns the
//! aggregate into a response using [`MultiError::status`].
//!
//! ```rust
//! use shapegen_runtime::{missing_field_error, MultiError};
//!
//! let mut err = MultiError::new();
//! err.push(missing_field_error("name", "body"));
//! err.push(missing_field_error("age", "body"));
//!
//! assert_eq!(err.len(), 2);
//! assert_eq!(err.status(), 400);
//! ```

mod error;
mod multi;
mod validate;

pub use error::{
    ErrorClass, ServiceError, INTERNAL, INVALID_ENCODING, INVALID_ENUM_VALUE, INVALID_FIELD_TYPE,
    INVALID_FORMAT, INVALID_LENGTH, INVALID_PARAM_TYPE, INVALID_PATTERN, INVALID_RANGE,
    MISSING_FIELD, MISSING_HEADER, MISSING_PARAM, internal_error, invalid_encoding_error,
    invalid_enum_value_error, invalid_field_type_error, invalid_format_error,
    invalid_length_error, invalid_param_type_error, invalid_pattern_error, invalid_range_error,
    missing_field_error, missing_header_error, missing_param_error,
};
pub use multi::{merge_errors, MultiError, BAD_REQUEST_STATUS, INTERNAL_STATUS};
pub use validate::{validate_format, validate_pattern, Format, UnknownFormat};
