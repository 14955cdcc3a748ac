//! Email-verified sign-up and session issuance.
//!
//! [`VerificationProtocol`] composes four collaborators: a [`PendingRegistrationStore`]
//! with TTL expiry, the [`CredentialIssuer`], a [`UserDirectory`] and a [`Notifier`].
//! Only the issuer lives here in full; the others are traits with in-memory
//! implementations, and the Worker supplies KV, libSQL and Brevo backed ones.

pub mod clock;
pub mod code;
pub mod config;
pub mod credentials;
pub mod directory;
pub mod error;
pub mod notifier;
pub mod pending;
pub mod protocol;

pub use clock::{system_clock, Clock, SharedClock, SystemClock};
pub use config::{ConfigError, RegistrationConfig};
pub use credentials::{
    CredentialIssuer, SessionClaims, SessionCredential, TemporaryClaims, TemporaryCredential,
};
pub use directory::{InMemoryUserDirectory, NewUser, Role, UserDirectory, UserRecord};
pub use error::{RegistrationError, Service, ServiceError};
pub use notifier::{Notifier, OutboundEmail, OutboxNotifier};
pub use pending::{InMemoryPendingStore, PendingRegistration, PendingRegistrationStore};
pub use protocol::VerificationProtocol;
