use crate::api::ApiRange;
use thiserror::Error;

/// Broad classification shared by every error the substrate raises.
///
/// None of these are recoverable: each one marks a contract violation that
/// should fail the enclosing test right where it happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Ambiguous or missing registration, unresolvable dispatch target.
    Configuration,
    /// No shadow bound for an instance, or the bound shadow has another type.
    Lookup,
    /// Misuse of the threading contract (quitting the main looper, resetting
    /// loopers off the main thread).
    State,
    /// A named field or method does not exist.
    Reflection,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShadowError {
    #[error("{shadow} for {class} (API {range}) overlaps existing registration {existing}")]
    OverlappingRegistration { class: String, shadow: String, existing: String, range: ApiRange },

    #[error("{shadow} for {class} declares an empty API range {range}")]
    InvalidApiRange { class: String, shadow: String, range: ApiRange },

    #[error("cannot dispatch {class}.{signature}: neither the shadow nor the real class implements it")]
    UnresolvedDispatch { class: String, signature: String },

    #[error("argument {index} of {signature}: {source}")]
    ArgumentMismatch {
        signature: String,
        index: usize,
        #[source]
        source: Box<ShadowError>,
    },

    #[error("expected a {expected} value, got {actual}")]
    ValueMismatch { expected: &'static str, actual: &'static str },

    #[error("no shadow bound for instance of {class}")]
    NoShadowBound { class: String },

    #[error("instance of {class} already has shadow {shadow} bound")]
    AlreadyBound { class: String, shadow: String },

    #[error("shadow bound to {class} is {actual}, not the requested type")]
    ShadowTypeMismatch { class: String, actual: String },

    #[error("no field `{field}` declared on {class} or its supertypes")]
    MissingField { class: String, field: String },

    #[error("no method `{method}` taking {arity} argument(s) declared on {class} or its supertypes")]
    MissingMethod { class: String, method: String, arity: usize },

    #[error("field `{field}` on {class} cannot be written")]
    ReadOnlyField { class: String, field: String },
}

impl ShadowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShadowError::OverlappingRegistration { .. }
            | ShadowError::InvalidApiRange { .. }
            | ShadowError::UnresolvedDispatch { .. }
            | ShadowError::ArgumentMismatch { .. }
            | ShadowError::ValueMismatch { .. } => ErrorKind::Configuration,
            ShadowError::NoShadowBound { .. }
            | ShadowError::AlreadyBound { .. }
            | ShadowError::ShadowTypeMismatch { .. } => ErrorKind::Lookup,
            ShadowError::MissingField { .. }
            | ShadowError::MissingMethod { .. }
            | ShadowError::ReadOnlyField { .. } => ErrorKind::Reflection,
        }
    }

    pub fn missing_field(class: &str, field: &str) -> Self {
        ShadowError::MissingField { class: class.to_owned(), field: field.to_owned() }
    }

    pub fn missing_method(class: &str, method: &str, arity: usize) -> Self {
        ShadowError::MissingMethod { class: class.to_owned(), method: method.to_owned(), arity }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiLevel;
    use rstest::rstest;

    #[rstest]
    fn dispatch_errors_are_configuration_errors() {
        let err = ShadowError::UnresolvedDispatch {
            class: "mock.widget.View".into(),
            signature: "frobnicate(int)".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Configuration);
        let message = err.to_string();
        assert!(message.contains("mock.widget.View"));
        assert!(message.contains("frobnicate(int)"));
    }

    #[rstest]
    fn overlap_message_names_range() {
        let err = ShadowError::OverlappingRegistration {
            class: "R".into(),
            shadow: "S2".into(),
            existing: "S1".into(),
            range: ApiRange::new(ApiLevel(1), ApiLevel(100)),
        };
        assert!(err.to_string().contains("1..=100"));
    }

    #[rstest]
    #[case(ShadowError::NoShadowBound { class: "R".into() }, ErrorKind::Lookup)]
    #[case(ShadowError::missing_field("R", "mText"), ErrorKind::Reflection)]
    #[case(ShadowError::missing_method("R", "draw", 1), ErrorKind::Reflection)]
    #[case(ShadowError::ValueMismatch { expected: "int", actual: "string" }, ErrorKind::Configuration)]
    fn kinds_follow_taxonomy(#[case] err: ShadowError, #[case] kind: ErrorKind) {
        assert_eq!(err.kind(), kind);
    }
}
