//! Retryable-versus-terminal error classification
//!
//! A classifier is a pure predicate over an error value. Classifiers are
//! consulted after every failed attempt, so they must be cheap and must not
//! have side effects.

use crate::error::{ApiError, WaitError};

/// Decides whether a failure is transient and worth another attempt
pub trait ErrorClassifier<E: ?Sized> {
    fn is_retryable(&self, err: &E) -> bool;
}

impl<E: ?Sized, F> ErrorClassifier<E> for F
where
    F: Fn(&E) -> bool,
{
    fn is_retryable(&self, err: &E) -> bool {
        self(err)
    }
}

/// Structured error with a machine-readable code
///
/// Implemented by remote API error types so the code matchers below can be
/// reused across services.
pub trait RemoteError {
    fn code(&self) -> Option<&str>;

    fn message(&self) -> Option<&str> {
        None
    }
}

impl RemoteError for ApiError {
    fn code(&self) -> Option<&str> {
        Some(&self.code)
    }

    fn message(&self) -> Option<&str> {
        Some(&self.message)
    }
}

/// Only `Remote` errors carry a code; sentinels never match a code matcher.
impl<E: RemoteError> RemoteError for WaitError<E> {
    fn code(&self) -> Option<&str> {
        self.as_remote().and_then(RemoteError::code)
    }

    fn message(&self) -> Option<&str> {
        self.as_remote().and_then(RemoteError::message)
    }
}

/// Matches an error whose code is in an allow-list, optionally requiring a
/// substring in the message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCodeMatcher {
    codes: Vec<String>,
    message_contains: Option<String>,
}

impl ErrorCodeMatcher {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            codes: codes.into_iter().map(Into::into).collect(),
            message_contains: None,
        }
    }

    /// Match a single code whose message also contains `substring`
    pub fn code_with_message(code: impl Into<String>, substring: impl Into<String>) -> Self {
        Self {
            codes: vec![code.into()],
            message_contains: Some(substring.into()),
        }
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    /// Logical OR with another classifier
    pub fn or<C>(self, other: C) -> AnyOf<Self, C> {
        AnyOf(self, other)
    }

    fn matches(&self, code: Option<&str>, message: Option<&str>) -> bool {
        let Some(code) = code else {
            return false;
        };
        if !self.codes.iter().any(|c| c == code) {
            return false;
        }
        match &self.message_contains {
            Some(needle) => message.is_some_and(|m| m.contains(needle.as_str())),
            None => true,
        }
    }
}

impl<E: RemoteError + ?Sized> ErrorClassifier<E> for ErrorCodeMatcher {
    fn is_retryable(&self, err: &E) -> bool {
        self.matches(err.code(), err.message())
    }
}

/// Logical OR of two classifiers
#[derive(Debug, Clone)]
pub struct AnyOf<A, B>(pub A, pub B);

impl<A, B> AnyOf<A, B> {
    pub fn or<C>(self, other: C) -> AnyOf<Self, C> {
        AnyOf(self, other)
    }
}

impl<E: ?Sized, A, B> ErrorClassifier<E> for AnyOf<A, B>
where
    A: ErrorClassifier<E>,
    B: ErrorClassifier<E>,
{
    fn is_retryable(&self, err: &E) -> bool {
        self.0.is_retryable(err) || self.1.is_retryable(err)
    }
}

/// Retries a `NotFound` sentinel
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFoundClassifier;

impl NotFoundClassifier {
    pub fn or<C>(self, other: C) -> AnyOf<Self, C> {
        AnyOf(self, other)
    }
}

impl<E> ErrorClassifier<WaitError<E>> for NotFoundClassifier {
    fn is_retryable(&self, err: &WaitError<E>) -> bool {
        err.is_not_found()
    }
}

/// Never retries anything
#[derive(Debug, Clone, Copy, Default)]
pub struct Never;

impl<E: ?Sized> ErrorClassifier<E> for Never {
    fn is_retryable(&self, _err: &E) -> bool {
        false
    }
}

/// "Retry while any of these error codes"
pub fn retry_on_codes<I, S>(codes: I) -> ErrorCodeMatcher
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ErrorCodeMatcher::new(codes)
}

/// "Retry while this code is returned with a message containing `substring`"
pub fn retry_on_code_message(
    code: impl Into<String>,
    substring: impl Into<String>,
) -> ErrorCodeMatcher {
    ErrorCodeMatcher::code_with_message(code, substring)
}

/// "Retry while not found"
pub fn retry_on_not_found() -> NotFoundClassifier {
    NotFoundClassifier
}

pub fn never() -> Never {
    Never
}

#[cfg(test)]
mod tests {
    use super::*;

    type Error = WaitError<ApiError>;

    fn api(code: &str, message: &str) -> Error {
        WaitError::remote(ApiError::new(code, message))
    }

    #[test]
    fn test_code_matcher() {
        let classifier = retry_on_codes(["DependencyTimeoutException", "KMSInternalException"]);

        assert!(classifier.is_retryable(&api("DependencyTimeoutException", "")));
        assert!(classifier.is_retryable(&api("KMSInternalException", "oops")));
        assert!(!classifier.is_retryable(&api("AccessDeniedException", "")));
    }

    #[test]
    fn test_sentinels_never_match_codes() {
        let classifier = retry_on_codes(["NotFoundException"]);

        assert!(!classifier.is_retryable(&Error::not_found("NotFoundException")));
        assert!(!classifier.is_retryable(&Error::Cancelled));
    }

    #[test]
    fn test_code_with_message() {
        let classifier = retry_on_code_message(
            "InvalidParameterException",
            "The specified role does not exist",
        );

        assert!(classifier.is_retryable(&api(
            "InvalidParameterException",
            "The specified role does not exist: arn:aws:iam::1:role/x"
        )));
        assert!(!classifier.is_retryable(&api("InvalidParameterException", "bad size")));
    }

    #[test]
    fn test_or_composition() {
        let classifier = retry_on_codes(["ThrottlingException"]).or(retry_on_not_found());

        assert!(classifier.is_retryable(&api("ThrottlingException", "")));
        assert!(classifier.is_retryable(&Error::not_found("gone")));
        assert!(!classifier.is_retryable(&api("ValidationException", "")));
        assert!(!classifier.is_retryable(&Error::Cancelled));
    }

    #[test]
    fn test_matcher_chain() {
        let classifier = retry_on_codes(["InvalidArnException"]).or(retry_on_code_message(
            "MalformedPolicyDocumentException",
            "principal",
        ));

        assert!(classifier.is_retryable(&api("InvalidArnException", "")));
        assert!(classifier.is_retryable(&api(
            "MalformedPolicyDocumentException",
            "Policy contains a statement with one or more invalid principals"
        )));
        assert!(!classifier.is_retryable(&api("MalformedPolicyDocumentException", "syntax")));
    }

    #[test]
    fn test_closure_and_never() {
        let classifier = |err: &Error| err.is_timed_out();
        assert!(!classifier.is_retryable(&Error::Cancelled));
        assert!(!never().is_retryable(&api("ThrottlingException", "")));
    }

    #[test]
    fn test_classifier_is_deterministic() {
        let classifier = retry_on_codes(["ThrottlingException"]).or(retry_on_not_found());
        let errors = [
            api("ThrottlingException", "slow down"),
            api("AccessDeniedException", ""),
            Error::not_found("gone"),
            Error::Cancelled,
        ];

        for err in &errors {
            let first = classifier.is_retryable(err);
            for _ in 0..10 {
                assert_eq!(classifier.is_retryable(err), first);
            }
        }
    }
}
