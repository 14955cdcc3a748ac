use tracing::{info, warn};

use crate::crypto::{hash_password, secrets_match, verify_password_hash};

use super::clock::SharedClock;
use super::code::{generate_code, is_well_formed};
use super::config::RegistrationConfig;
use super::credentials::{CredentialIssuer, SessionCredential, TemporaryCredential};
use super::directory::{NewUser, UserDirectory, UserRecord};
use super::error::{RegistrationError, Service};
use super::notifier::{Notifier, OutboundEmail};
use super::pending::{PendingRegistration, PendingRegistrationStore};

const CODE_EXPIRED: &str = "code expired or invalid";
const CODE_MISMATCH: &str = "invalid code";
const RESEND_NOT_FOUND: &str = "verification not found or expired";
const BAD_LOGIN: &str = "invalid email or password";
const UNKNOWN_SUBJECT: &str = "invalid or expired token";

type Result<T> = std::result::Result<T, RegistrationError>;

/// Sign-up handshake: a pending registration in an expiring store, a 6-digit code
/// sent by email, and a temporary credential that scopes confirm/resend to one email.
///
/// ```text
/// NONE --initiate--> PENDING --confirm--> CONFIRMED (user created)
///                    PENDING --resend---> PENDING   (code rotated, TTL restarted)
///                    PENDING --TTL------> NONE
/// ```
pub struct VerificationProtocol<S, D, N> {
    store: S,
    directory: D,
    notifier: N,
    issuer: CredentialIssuer,
    config: RegistrationConfig,
}

impl<S, D, N> VerificationProtocol<S, D, N>
where
    S: PendingRegistrationStore,
    D: UserDirectory,
    N: Notifier,
{
    pub fn new(
        config: RegistrationConfig,
        clock: SharedClock,
        store: S,
        directory: D,
        notifier: N,
    ) -> Self {
        let issuer = CredentialIssuer::new(
            config.jwt_secret.clone(),
            clock,
            config.temporary_token_ttl_secs,
            config.session_token_ttl_secs,
        );
        Self {
            store,
            directory,
            notifier,
            issuer,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Start a sign-up. Nothing durable is written until [`Self::confirm`].
    pub async fn initiate(&self, email: &str, password: &str) -> Result<TemporaryCredential> {
        let email = normalize_email(email)?;
        if password.is_empty() {
            return Err(RegistrationError::InvalidInput("password cannot be blank"));
        }

        let existing = self
            .directory
            .find_by_email(&email)
            .await
            .map_err(|e| RegistrationError::from_service(Service::Directory, e))?;
        if existing.is_some() {
            info!(%email, "sign-up rejected: account exists");
            return Err(RegistrationError::Conflict);
        }

        let code = generate_code();
        self.write_pending(&PendingRegistration::new(&email, password, code.clone()))
            .await?;
        let credential = self.issuer.issue_temporary(&email)?;
        self.send_code(&email, &code).await?;

        info!(%email, "registration pending verification");
        Ok(credential)
    }

    /// Promote the pending registration of the credential's email into a user and log it in.
    pub async fn confirm(&self, code: &str, temporary_token: &str) -> Result<SessionCredential> {
        let claims = self.issuer.validate_temporary(temporary_token)?;

        let Some(pending) = self.read_pending(&claims.email).await? else {
            info!(email = %claims.email, "confirm without pending registration");
            return Err(RegistrationError::Unauthorized(CODE_EXPIRED));
        };
        if pending.email != claims.email {
            warn!(email = %claims.email, "pending registration stored under a foreign key");
            return Err(RegistrationError::Unauthorized(CODE_EXPIRED));
        }

        if !is_well_formed(code) || !secrets_match(code, &pending.verification_code) {
            info!(email = %claims.email, "verification code mismatch");
            return Err(RegistrationError::Unauthorized(CODE_MISMATCH));
        }

        let password = hash_password(pending.password.as_bytes(), self.config.password_iterations);
        let user = self
            .directory
            .create(NewUser::promoted(&pending.email, password))
            .await
            .map_err(|e| RegistrationError::from_service(Service::Directory, e))?;

        let key = PendingRegistration::store_key(&pending.email);
        if let Err(e) = self.store.delete(&key).await {
            warn!(
                email = %user.email,
                user_id = %user.id,
                error = %e,
                "account created but pending registration not cleared"
            );
            return Err(RegistrationError::from_service(Service::Store, e));
        }

        info!(email = %user.email, user_id = %user.id, "registration confirmed");
        self.issuer.issue_session(&user)
    }

    /// Rotate the code and restart the pending TTL. The original temporary credential stays in use.
    pub async fn resend(&self, temporary_token: &str) -> Result<()> {
        let claims = self.issuer.validate_temporary(temporary_token)?;

        let Some(pending) = self.read_pending(&claims.email).await? else {
            return Err(RegistrationError::Unauthorized(RESEND_NOT_FOUND));
        };

        let code = loop {
            let candidate = generate_code();
            if candidate != pending.verification_code {
                break candidate;
            }
        };
        let rotated = PendingRegistration::new(&pending.email, &pending.password, code.clone());
        self.write_pending(&rotated).await?;
        self.send_code(&rotated.email, &code).await?;

        info!(email = %rotated.email, "verification code resent");
        Ok(())
    }

    /// Password login for an existing user.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionCredential> {
        let email = normalize_email(email)?;

        let user = self
            .directory
            .find_by_email(&email)
            .await
            .map_err(|e| RegistrationError::from_service(Service::Directory, e))?
            .ok_or(RegistrationError::Unauthorized(BAD_LOGIN))?;

        let verified = user
            .password
            .as_ref()
            .is_some_and(|stored| verify_password_hash(password.as_bytes(), stored));
        if !verified {
            info!(%email, "sign-in rejected");
            return Err(RegistrationError::Unauthorized(BAD_LOGIN));
        }

        self.issuer.issue_session(&user)
    }

    /// Resolve a session bearer token to the user it was issued for.
    pub async fn authenticate(&self, session_token: &str) -> Result<UserRecord> {
        let claims = self.issuer.validate_session(session_token)?;

        self.directory
            .find_by_id(&claims.sub)
            .await
            .map_err(|e| RegistrationError::from_service(Service::Directory, e))?
            .ok_or(RegistrationError::Unauthorized(UNKNOWN_SUBJECT))
    }

    async fn read_pending(&self, email: &str) -> Result<Option<PendingRegistration>> {
        let value = self
            .store
            .get(&PendingRegistration::store_key(email))
            .await
            .map_err(|e| RegistrationError::from_service(Service::Store, e))?;

        value
            .map(|v| PendingRegistration::from_value(&v))
            .transpose()
            .map_err(|e| {
                warn!(%email, error = %e, "unreadable pending registration");
                RegistrationError::from_service(Service::Store, e)
            })
    }

    async fn write_pending(&self, pending: &PendingRegistration) -> Result<()> {
        let value = pending
            .to_value()
            .map_err(|e| RegistrationError::from_service(Service::Store, e))?;

        self.store
            .put(
                &PendingRegistration::store_key(&pending.email),
                value,
                self.config.pending_ttl_secs,
            )
            .await
            .map_err(|e| RegistrationError::from_service(Service::Store, e))
    }

    async fn send_code(&self, email: &str, code: &str) -> Result<()> {
        let message = OutboundEmail::verification_code(
            &self.config.app_name,
            email,
            code,
            self.config.pending_ttl_secs,
        );

        self.notifier.send(message).await.map_err(|e| {
            warn!(%email, error = %e, "verification email failed");
            RegistrationError::from_service(Service::Notifier, e)
        })
    }
}

fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(RegistrationError::InvalidInput("email cannot be blank"));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(RegistrationError::InvalidInput("email is not valid")),
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;
    use std::sync::Arc;

    use super::super::clock::manual::ManualClock;
    use super::super::directory::{InMemoryUserDirectory, Role};
    use super::super::error::ServiceError;
    use super::super::notifier::OutboxNotifier;
    use super::super::pending::InMemoryPendingStore;
    use super::*;

    type TestProtocol<N = OutboxNotifier> =
        VerificationProtocol<InMemoryPendingStore, InMemoryUserDirectory, N>;

    struct Harness {
        /// Drives token issuance and expiry.
        tokens: Arc<ManualClock>,
        /// Drives pending-registration TTLs.
        store: Arc<ManualClock>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                tokens: ManualClock::starting_at(1_000_000),
                store: ManualClock::starting_at(1_000_000),
            }
        }

        fn config() -> RegistrationConfig {
            let mut config = RegistrationConfig::new(b"test-secret".to_vec());
            config.password_iterations = NonZeroU32::new(1_000).unwrap();
            config
        }

        fn protocol_with<N: Notifier>(&self, notifier: N) -> TestProtocol<N> {
            VerificationProtocol::new(
                Self::config(),
                self.tokens.shared(),
                InMemoryPendingStore::new(self.store.shared()),
                InMemoryUserDirectory::new(self.tokens.shared()),
                notifier,
            )
        }

        fn protocol(&self) -> TestProtocol {
            self.protocol_with(OutboxNotifier::new())
        }

        fn advance(&self, secs: i64) {
            self.tokens.advance(secs);
            self.store.advance(secs);
        }
    }

    fn latest_code(protocol: &TestProtocol, email: &str) -> String {
        let message = protocol.notifier().last_to(email).expect("no email sent");
        message
            .text
            .split_whitespace()
            .find_map(|word| {
                let word = word.trim_end_matches('.');
                is_well_formed(word).then(|| word.to_string())
            })
            .expect("no code in email")
    }

    fn wrong_code(right: &str) -> String {
        if right == "000000" { "111111" } else { "000000" }.to_string()
    }

    struct FailingNotifier;

    /// Forwards to an in-memory store but refuses deletes.
    struct UndeletableStore(InMemoryPendingStore);

    #[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
    #[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
    impl PendingRegistrationStore for UndeletableStore {
        async fn put(
            &self,
            key: &str,
            value: String,
            ttl_secs: u64,
        ) -> std::result::Result<(), ServiceError> {
            self.0.put(key, value, ttl_secs).await
        }

        async fn get(&self, key: &str) -> std::result::Result<Option<String>, ServiceError> {
            self.0.get(key).await
        }

        async fn delete(&self, _key: &str) -> std::result::Result<(), ServiceError> {
            Err(ServiceError::unavailable("kv write quota exceeded"))
        }
    }

    #[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
    #[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
    impl Notifier for FailingNotifier {
        async fn send(&self, _email: OutboundEmail) -> std::result::Result<(), ServiceError> {
            Err(ServiceError::unavailable("smtp relay down"))
        }
    }

    #[tokio::test]
    async fn initiate_stores_one_pending_record_and_sends_its_code() {
        let harness = Harness::new();
        let protocol = harness.protocol();

        let temporary = protocol.initiate(" A@X.com ", "secret1").await.unwrap();
        assert_eq!(temporary.expires_in, 300);
        assert_eq!(protocol.store().live_len(), 1);

        let stored = protocol
            .store()
            .get("pending-registration:a@x.com")
            .await
            .unwrap()
            .unwrap();
        let pending = PendingRegistration::from_value(&stored).unwrap();
        assert_eq!(pending.email, "a@x.com");
        assert_eq!(pending.attempts, 0);
        assert!(is_well_formed(&pending.verification_code));
        assert_eq!(latest_code(&protocol, "a@x.com"), pending.verification_code);
        assert!(protocol.directory().is_empty());
    }

    #[tokio::test]
    async fn initiate_conflicts_for_existing_account_without_writing() {
        let harness = Harness::new();
        let protocol = harness.protocol();

        let temporary = protocol.initiate("a@x.com", "secret1").await.unwrap();
        let code = latest_code(&protocol, "a@x.com");
        protocol.confirm(&code, &temporary.token).await.unwrap();
        assert_eq!(protocol.store().live_len(), 0);

        let err = protocol.initiate("a@x.com", "other").await.unwrap_err();
        assert!(matches!(err, RegistrationError::Conflict));
        assert_eq!(protocol.store().live_len(), 0);
        assert_eq!(protocol.notifier().sent().len(), 1);
    }

    #[tokio::test]
    async fn initiate_rejects_blank_input() {
        let harness = Harness::new();
        let protocol = harness.protocol();

        let cases = [
            ("", "pw"),
            ("   ", "pw"),
            ("no-at-sign", "pw"),
            ("@x.com", "pw"),
            ("a@x.com", ""),
        ];
        for (email, password) in cases {
            let err = protocol.initiate(email, password).await.unwrap_err();
            assert!(matches!(err, RegistrationError::InvalidInput(_)), "{email:?}");
        }
        assert_eq!(protocol.store().live_len(), 0);
    }

    #[tokio::test]
    async fn wrong_code_then_right_code() {
        let harness = Harness::new();
        let protocol = harness.protocol();

        let temporary = protocol.initiate("a@x.com", "secret1").await.unwrap();
        let code = latest_code(&protocol, "a@x.com");

        let err = protocol
            .confirm(&wrong_code(&code), &temporary.token)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Unauthorized("invalid code")));
        assert_eq!(protocol.store().live_len(), 1);

        let session = protocol.confirm(&code, &temporary.token).await.unwrap();
        assert_eq!(session.expires_in, 7 * 24 * 60 * 60);
        assert_eq!(session.claims.username, "a@x.com");
        assert_eq!(session.claims.role, Role::User);

        let user = protocol.directory().find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(user.id, session.claims.sub);
        assert_eq!(user.role, Role::User);
        assert!(verify_password_hash(b"secret1", user.password.as_ref().unwrap()));
        assert_eq!(protocol.store().live_len(), 0);
    }

    #[tokio::test]
    async fn confirm_is_single_use() {
        let harness = Harness::new();
        let protocol = harness.protocol();

        let temporary = protocol.initiate("a@x.com", "secret1").await.unwrap();
        let code = latest_code(&protocol, "a@x.com");
        protocol.confirm(&code, &temporary.token).await.unwrap();

        let err = protocol.confirm(&code, &temporary.token).await.unwrap_err();
        assert!(matches!(err, RegistrationError::Unauthorized("code expired or invalid")));
        assert_eq!(protocol.directory().len(), 1);
    }

    #[tokio::test]
    async fn forged_or_expired_credentials_never_confirm() {
        let harness = Harness::new();
        let protocol = harness.protocol();

        let temporary = protocol.initiate("a@x.com", "secret1").await.unwrap();
        let code = latest_code(&protocol, "a@x.com");

        let forger = CredentialIssuer::new(b"guessed".to_vec(), harness.tokens.shared(), 300, 600);
        let forged = forger.issue_temporary("a@x.com").unwrap();
        for token in [forged.token.as_str(), "garbage", ""] {
            let err = protocol.confirm(&code, token).await.unwrap_err();
            assert!(matches!(err, RegistrationError::Unauthorized("invalid or expired token")));
        }

        // Token window closes while the pending record is still alive.
        harness.tokens.advance(300);
        let err = protocol.confirm(&code, &temporary.token).await.unwrap_err();
        assert!(matches!(err, RegistrationError::Unauthorized("invalid or expired token")));
        assert!(protocol.directory().is_empty());
    }

    #[tokio::test]
    async fn session_credential_cannot_stand_in_for_temporary() {
        let harness = Harness::new();
        let protocol = harness.protocol();

        let temporary = protocol.initiate("a@x.com", "secret1").await.unwrap();
        let code = latest_code(&protocol, "a@x.com");
        let session = protocol.confirm(&code, &temporary.token).await.unwrap();

        let err = protocol.resend(&session.token).await.unwrap_err();
        assert!(matches!(err, RegistrationError::Unauthorized("invalid or expired token")));
    }

    #[tokio::test]
    async fn expired_pending_registration_cannot_be_confirmed() {
        let harness = Harness::new();
        let protocol = harness.protocol();

        let temporary = protocol.initiate("a@x.com", "secret1").await.unwrap();
        let code = latest_code(&protocol, "a@x.com");

        harness.store.advance(300);
        let err = protocol.confirm(&code, &temporary.token).await.unwrap_err();
        assert!(matches!(err, RegistrationError::Unauthorized("code expired or invalid")));

        let err = protocol.resend(&temporary.token).await.unwrap_err();
        assert!(matches!(err, RegistrationError::Unauthorized("verification not found or expired")));
    }

    #[tokio::test]
    async fn resend_rotates_code_and_restarts_ttl() {
        let harness = Harness::new();
        let protocol = harness.protocol();

        let temporary = protocol.initiate("a@x.com", "secret1").await.unwrap();
        let first = latest_code(&protocol, "a@x.com");

        harness.store.advance(200);
        protocol.resend(&temporary.token).await.unwrap();
        let second = latest_code(&protocol, "a@x.com");
        assert_ne!(first, second);
        assert_eq!(protocol.notifier().sent().len(), 2);

        // Past the original 300s window, inside the restarted one.
        harness.store.advance(200);
        let err = protocol.confirm(&first, &temporary.token).await.unwrap_err();
        assert!(matches!(err, RegistrationError::Unauthorized("invalid code")));

        let session = protocol.confirm(&second, &temporary.token).await.unwrap();
        assert_eq!(session.claims.username, "a@x.com");
    }

    #[tokio::test]
    async fn resend_keeps_password_and_resets_attempts() {
        let harness = Harness::new();
        let protocol = harness.protocol();

        let temporary = protocol.initiate("a@x.com", "secret1").await.unwrap();
        protocol.resend(&temporary.token).await.unwrap();

        let stored = protocol
            .store()
            .get("pending-registration:a@x.com")
            .await
            .unwrap()
            .unwrap();
        let pending = PendingRegistration::from_value(&stored).unwrap();
        assert_eq!(pending.password, "secret1");
        assert_eq!(pending.attempts, 0);
        assert_eq!(pending.verification_code, latest_code(&protocol, "a@x.com"));
    }

    #[tokio::test]
    async fn second_initiate_wins_for_the_same_email() {
        let harness = Harness::new();
        let protocol = harness.protocol();

        let first = protocol.initiate("b@x.com", "secret1").await.unwrap();
        let first_code = latest_code(&protocol, "b@x.com");
        harness.advance(1);
        let _second = protocol.initiate("b@x.com", "secret2").await.unwrap();
        let second_code = latest_code(&protocol, "b@x.com");
        assert_eq!(protocol.store().live_len(), 1);

        if first_code != second_code {
            let err = protocol.confirm(&first_code, &first.token).await.unwrap_err();
            assert!(matches!(err, RegistrationError::Unauthorized("invalid code")));
        }
        protocol.confirm(&second_code, &first.token).await.unwrap();

        assert!(protocol.sign_in("b@x.com", "secret2").await.is_ok());
        assert!(protocol.sign_in("b@x.com", "secret1").await.is_err());
    }

    #[tokio::test]
    async fn notifier_failure_is_reported_and_leaves_the_record() {
        let harness = Harness::new();
        let protocol = harness.protocol_with(FailingNotifier);

        let err = protocol.initiate("a@x.com", "secret1").await.unwrap_err();
        match err {
            RegistrationError::Transient { service, message } => {
                assert_eq!(service, Service::Notifier);
                assert_eq!(message, "smtp relay down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(protocol.store().live_len(), 1);
    }

    #[tokio::test]
    async fn sign_in_and_authenticate_after_confirmation() {
        let harness = Harness::new();
        let protocol = harness.protocol();

        let temporary = protocol.initiate("a@x.com", "secret1").await.unwrap();
        let code = latest_code(&protocol, "a@x.com");
        protocol.confirm(&code, &temporary.token).await.unwrap();

        let err = protocol.sign_in("a@x.com", "wrong").await.unwrap_err();
        assert!(matches!(err, RegistrationError::Unauthorized("invalid email or password")));
        let err = protocol.sign_in("nobody@x.com", "secret1").await.unwrap_err();
        assert!(matches!(err, RegistrationError::Unauthorized("invalid email or password")));

        let session = protocol.sign_in("A@x.com", "secret1").await.unwrap();
        let user = protocol.authenticate(&session.token).await.unwrap();
        assert_eq!(user.email, "a@x.com");

        harness.advance(7 * 24 * 60 * 60);
        assert!(protocol.authenticate(&session.token).await.is_err());
    }

    #[tokio::test]
    async fn corrupt_pending_record_is_a_store_failure() {
        let harness = Harness::new();
        let protocol = harness.protocol();

        let temporary = protocol.initiate("a@x.com", "secret1").await.unwrap();
        protocol
            .store()
            .put("pending-registration:a@x.com", "not json".to_string(), 300)
            .await
            .unwrap();

        let err = protocol.confirm("123456", &temporary.token).await.unwrap_err();
        assert!(matches!(err, RegistrationError::Transient { service: Service::Store, .. }));
    }

    #[tokio::test]
    async fn record_under_a_foreign_key_is_not_confirmable() {
        let harness = Harness::new();
        let protocol = harness.protocol();

        let temporary = protocol.initiate("a@x.com", "secret1").await.unwrap();
        let foreign = PendingRegistration::new("b@x.com", "secret2", "123456".to_string());
        protocol
            .store()
            .put(
                &PendingRegistration::store_key("a@x.com"),
                foreign.to_value().unwrap(),
                300,
            )
            .await
            .unwrap();

        let err = protocol.confirm("123456", &temporary.token).await.unwrap_err();
        assert!(matches!(err, RegistrationError::Unauthorized("code expired or invalid")));
        assert!(protocol.directory().is_empty());
    }

    #[tokio::test]
    async fn failed_cleanup_after_promotion_is_reported() {
        let harness = Harness::new();
        let protocol = VerificationProtocol::new(
            Harness::config(),
            harness.tokens.shared(),
            UndeletableStore(InMemoryPendingStore::new(harness.store.shared())),
            InMemoryUserDirectory::new(harness.tokens.shared()),
            OutboxNotifier::new(),
        );

        let temporary = protocol.initiate("a@x.com", "secret1").await.unwrap();
        let message = protocol.notifier().last_to("a@x.com").unwrap();
        let code = message
            .text
            .split_whitespace()
            .map(|word| word.trim_end_matches('.'))
            .find(|word| is_well_formed(word))
            .unwrap()
            .to_string();

        let err = protocol.confirm(&code, &temporary.token).await.unwrap_err();
        assert!(matches!(err, RegistrationError::Transient { service: Service::Store, .. }));
        // The account exists, so a retry lands on the directory's duplicate check.
        assert_eq!(protocol.directory().len(), 1);
        let err = protocol.confirm(&code, &temporary.token).await.unwrap_err();
        assert!(matches!(err, RegistrationError::Conflict));
    }
}
