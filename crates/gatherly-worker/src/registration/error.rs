use std::fmt;

use thiserror::Error;

/// Failure reported by an external collaborator (store, directory, notifier).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("record already exists")]
    Duplicate,

    #[error("{0}")]
    Unavailable(String),
}

impl ServiceError {
    pub fn unavailable(err: impl fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Collaborator that produced a [`RegistrationError::Transient`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Service {
    Store,
    Directory,
    Notifier,
    Signer,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Service::Store => "pending registration store",
            Service::Directory => "user directory",
            Service::Notifier => "notifier",
            Service::Signer => "credential signer",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("an account with this email already exists")]
    Conflict,

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    InvalidInput(&'static str),

    #[error("{service} unavailable: {message}")]
    Transient { service: Service, message: String },
}

impl RegistrationError {
    pub fn transient(service: Service, err: impl fmt::Display) -> Self {
        Self::Transient {
            service,
            message: err.to_string(),
        }
    }

    /// Map a collaborator failure, treating duplicates as a conflict.
    pub fn from_service(service: Service, err: ServiceError) -> Self {
        match err {
            ServiceError::Duplicate => Self::Conflict,
            ServiceError::Unavailable(message) => Self::Transient { service, message },
        }
    }

    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Conflict => "conflict",
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidInput(_) => "invalid_input",
            Self::Transient { .. } => "service_unavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_maps_to_conflict() {
        let err = RegistrationError::from_service(Service::Directory, ServiceError::Duplicate);
        assert!(matches!(err, RegistrationError::Conflict));
    }

    #[test]
    fn unavailable_keeps_service_and_message() {
        let err = RegistrationError::from_service(
            Service::Store,
            ServiceError::unavailable("connection refused"),
        );
        assert_eq!(
            err.to_string(),
            "pending registration store unavailable: connection refused"
        );
        assert_eq!(err.code(), "service_unavailable");
    }

    #[test]
    fn unauthorized_displays_reason_verbatim() {
        let err = RegistrationError::Unauthorized("invalid code");
        assert_eq!(err.to_string(), "invalid code");
        assert_eq!(err.code(), "unauthorized");
    }
}
