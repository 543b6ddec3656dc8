//! Resolution details returned by providers

use crate::{FlagType, FlagValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Error classification carried on a failed resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    /// No provider was ready (or eligible) to answer
    ProviderNotReady,
    /// The provider has no definition for the flag
    FlagNotFound,
    /// The flag definition could not be parsed
    ParseError,
    /// The flag value does not match the requested type
    TypeMismatch,
    /// Targeting requires a key that the context lacks
    TargetingKeyMissing,
    /// The evaluation context is invalid
    InvalidContext,
    /// The provider is in an unrecoverable state
    ProviderFatal,
    /// Anything else
    General,
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ProviderNotReady => "PROVIDER_NOT_READY",
            Self::FlagNotFound => "FLAG_NOT_FOUND",
            Self::ParseError => "PARSE_ERROR",
            Self::TypeMismatch => "TYPE_MISMATCH",
            Self::TargetingKeyMissing => "TARGETING_KEY_MISSING",
            Self::InvalidContext => "INVALID_CONTEXT",
            Self::ProviderFatal => "PROVIDER_FATAL",
            Self::General => "GENERAL",
        };
        f.write_str(name)
    }
}

/// Why a value was returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reason {
    Static,
    Default,
    TargetingMatch,
    Split,
    Cached,
    Disabled,
    Unknown,
    Stale,
    Error,
}

/// Outcome of evaluating one flag against one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionDetails<T = FlagValue> {
    /// Flag key that was evaluated
    pub flag_key: String,

    /// Resolved value (the caller's default on error)
    pub value: T,

    /// Variant identifier, if the provider uses variants
    pub variant: Option<String>,

    /// Resolution reason
    pub reason: Option<Reason>,

    /// Error classification, `None` on success
    pub error_type: Option<ErrorType>,

    /// Human-readable error message
    pub error_message: Option<String>,

    /// Provider-specific metadata about the flag
    #[serde(default)]
    pub flag_metadata: HashMap<String, FlagValue>,
}

impl<T> ResolutionDetails<T> {
    /// Successful resolution
    pub fn success(flag_key: impl Into<String>, value: T) -> Self {
        Self {
            flag_key: flag_key.into(),
            value,
            variant: None,
            reason: Some(Reason::Static),
            error_type: None,
            error_message: None,
            flag_metadata: HashMap::new(),
        }
    }

    /// Failed resolution returning `default_value`
    pub fn error(
        flag_key: impl Into<String>,
        default_value: T,
        error_type: ErrorType,
        message: impl Into<String>,
    ) -> Self {
        Self {
            flag_key: flag_key.into(),
            value: default_value,
            variant: None,
            reason: Some(Reason::Error),
            error_type: Some(error_type),
            error_message: Some(message.into()),
            flag_metadata: HashMap::new(),
        }
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn with_reason(mut self, reason: Reason) -> Self {
        self.reason = Some(reason);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<FlagValue>) -> Self {
        self.flag_metadata.insert(key.into(), value.into());
        self
    }

    /// True when no error type is set
    pub fn is_success(&self) -> bool {
        self.error_type.is_none()
    }

    /// Transform the value, keeping everything else
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ResolutionDetails<U> {
        ResolutionDetails {
            flag_key: self.flag_key,
            value: f(self.value),
            variant: self.variant,
            reason: self.reason,
            error_type: self.error_type,
            error_message: self.error_message,
            flag_metadata: self.flag_metadata,
        }
    }
}

impl<T: FlagType> ResolutionDetails<T> {
    /// Erase the value type
    pub fn into_flag_value(self) -> ResolutionDetails<FlagValue> {
        self.map(FlagType::into_flag_value)
    }
}

impl ResolutionDetails<FlagValue> {
    /// Recover a typed result.
    ///
    /// A value of the wrong type yields `default_value` with `TypeMismatch`.
    pub fn into_typed<T: FlagType>(self, default_value: T) -> ResolutionDetails<T> {
        let actual = self.value.value_type();
        match T::from_flag_value(self.value.clone()) {
            Some(value) => self.map(|_| value),
            None => {
                let flag_key = self.flag_key.clone();
                ResolutionDetails::error(
                    flag_key,
                    default_value,
                    ErrorType::TypeMismatch,
                    format!("expected {} value, got {}", T::VALUE_TYPE, actual),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_details() {
        let details = ResolutionDetails::success("new-ui", true).with_variant("on");
        assert!(details.is_success());
        assert_eq!(details.variant.as_deref(), Some("on"));
        assert_eq!(details.reason, Some(Reason::Static));
    }

    #[test]
    fn test_error_details() {
        let details =
            ResolutionDetails::error("missing", false, ErrorType::FlagNotFound, "not found");
        assert!(!details.is_success());
        assert_eq!(details.error_type, Some(ErrorType::FlagNotFound));
        assert_eq!(details.reason, Some(Reason::Error));
        assert!(!details.value);
    }

    #[test]
    fn test_into_typed_mismatch() {
        let erased = ResolutionDetails::success("limit", FlagValue::string("ten"));
        let typed = erased.into_typed(5_i64);
        assert_eq!(typed.value, 5);
        assert_eq!(typed.error_type, Some(ErrorType::TypeMismatch));
    }

    #[test]
    fn test_into_typed_keeps_variant() {
        let erased = ResolutionDetails::success("limit", 10_i64)
            .with_variant("ten")
            .into_flag_value();
        let typed = erased.into_typed(0_i64);
        assert_eq!(typed.value, 10);
        assert_eq!(typed.variant.as_deref(), Some("ten"));
    }
}
