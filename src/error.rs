use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::time::Duration;

/// A `CircuitBreaker`'s error.
#[derive(Debug, PartialEq)]
pub enum Error<E> {
    /// The error returned by the guarded call, untouched.
    Inner(E),
    /// The call was rejected without being made because the circuit is open.
    Rejected {
        /// Time left until a trial call is permitted.
        retry_in: Duration,
    },
}

impl<E> Error<E> {
    /// Returns `true` if the call was rejected by the circuit breaker.
    #[inline]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Error::Rejected { .. })
    }

    /// Returns the guarded call's error, if the call was made.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Error::Inner(err) => Some(err),
            Error::Rejected { .. } => None,
        }
    }

    /// Remaining wait in minutes, for rejected calls.
    pub fn retry_in_minutes(&self) -> Option<f64> {
        match self {
            Error::Rejected { retry_in } => Some(retry_in.as_secs_f64() / 60.0),
            Error::Inner(_) => None,
        }
    }
}

impl<E> Display for Error<E>
where
    E: Display,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Rejected { retry_in } => write!(
                f,
                "circuit breaker is open, next retry in {:.1} minutes",
                retry_in.as_secs_f64() / 60.0
            ),
            Error::Inner(err) => write!(f, "{}", err),
        }
    }
}

impl<E> StdError for Error<E>
where
    E: StdError + 'static,
{
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Inner(ref err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn inner_error_is_transparent() {
        let err = Error::Inner(io::Error::new(io::ErrorKind::Other, "boom"));

        assert_eq!("boom", err.to_string());
        assert!(err.source().is_some());
        assert!(!err.is_rejected());
        assert_eq!(None, err.retry_in_minutes());
        assert_eq!("boom", err.into_inner().unwrap().to_string());
    }

    #[test]
    fn rejected_reports_remaining_minutes() {
        let err = Error::<io::Error>::Rejected {
            retry_in: Duration::from_secs(90),
        };

        assert!(err.is_rejected());
        assert!(err.source().is_none());
        assert_eq!(Some(1.5), err.retry_in_minutes());
        assert_eq!(
            "circuit breaker is open, next retry in 1.5 minutes",
            err.to_string()
        );
        assert!(err.into_inner().is_none());
    }
}
