//! Credential verification strategies.
//!
//! Exactly one strategy is active per deployment, chosen once at startup:
//!
//! - [`TokenVerifier`]: HS256 bearer tokens, revalidated against the
//!   directory on every request.
//! - [`SharedSecretVerifier`]: a plaintext development secret compared in
//!   constant time, resolving to a fixed operator account. Never available
//!   in the production profile (enforced by configuration at startup).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::{
    Credential, DirectoryError, JwtClaims, Principal, PrincipalDirectory, UserRecord,
    validate_claims,
};

const MISSING_BEARER: &str = "Missing bearer token";
const INVALID_BEARER: &str = "Invalid or expired token";
const USER_NOT_FOUND: &str = "User not found";
const USER_INACTIVE: &str = "User account is not active";
const MISSING_DEV_TOKEN: &str = "Missing x-dev-auth header";
const INVALID_DEV_TOKEN: &str = "Invalid x-dev-auth token";
const NO_DEV_USER: &str = "No dev user available";

#[derive(Debug, Error)]
pub enum VerificationError {
    /// Credential missing, malformed, expired, or not backed by a usable
    /// account. The message is safe to show to clients.
    #[error("{0}")]
    InvalidCredential(&'static str),

    /// A collaborator lookup failed; no decision could be made.
    #[error("credential lookup failed: {0}")]
    Lookup(#[from] DirectoryError),
}

/// Resolves a presented credential to a [`Principal`].
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// `None` means the caller presented no credential at all.
    async fn verify(&self, credential: Option<&Credential>) -> Result<Principal, VerificationError>;
}

/// Constant-time byte comparison.
///
/// Unequal lengths return `false` immediately; equal-length inputs are
/// compared without early exit.
pub fn constant_time_eq(provided: &[u8], expected: &[u8]) -> bool {
    if provided.len() != expected.len() {
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Which strategy a deployment runs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StrategyKind {
    SharedSecret,
    Token,
}

/// The strategy selected from configuration.
pub enum CredentialStrategy {
    SharedSecret(SharedSecretVerifier),
    Token(TokenVerifier),
}

impl CredentialStrategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::SharedSecret(_) => StrategyKind::SharedSecret,
            Self::Token(_) => StrategyKind::Token,
        }
    }
}

#[async_trait]
impl CredentialVerifier for CredentialStrategy {
    async fn verify(
        &self,
        credential: Option<&Credential>,
    ) -> Result<Principal, VerificationError> {
        match self {
            Self::SharedSecret(v) => v.verify(credential).await,
            Self::Token(v) => v.verify(credential).await,
        }
    }
}

// -------------------------
// Token-signature strategy
// -------------------------

pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
    directory: Arc<dyn PrincipalDirectory>,
}

impl TokenVerifier {
    pub fn new(secret: &[u8], directory: Arc<dyn PrincipalDirectory>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            key: DecodingKey::from_secret(secret),
            validation,
            directory,
        }
    }

    fn decode(&self, token: &str) -> Result<JwtClaims, VerificationError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.key, &self.validation).map_err(
            |e| {
                debug!(error = %e, "bearer token rejected");
                VerificationError::InvalidCredential(INVALID_BEARER)
            },
        )?;

        validate_claims(&data.claims, Utc::now()).map_err(|e| {
            debug!(error = %e, "bearer token outside its validity window");
            VerificationError::InvalidCredential(INVALID_BEARER)
        })?;

        Ok(data.claims)
    }
}

#[async_trait]
impl CredentialVerifier for TokenVerifier {
    async fn verify(
        &self,
        credential: Option<&Credential>,
    ) -> Result<Principal, VerificationError> {
        let token = match credential {
            Some(Credential::Bearer(token)) if !token.is_empty() => token,
            _ => return Err(VerificationError::InvalidCredential(MISSING_BEARER)),
        };

        let claims = self.decode(token)?;

        let user = self
            .directory
            .find_principal_by_id(claims.sub)
            .await?
            .ok_or(VerificationError::InvalidCredential(USER_NOT_FOUND))?;

        if !user.is_active {
            warn!(user_id = %user.id, "bearer token presented for inactive account");
            return Err(VerificationError::InvalidCredential(USER_INACTIVE));
        }

        Ok(user.to_principal())
    }
}

// -------------------------
// Shared-secret strategy (development only)
// -------------------------

pub struct SharedSecretVerifier {
    secret: String,
    operator_email: String,
    directory: Arc<dyn PrincipalDirectory>,
}

impl SharedSecretVerifier {
    pub fn new(
        secret: impl Into<String>,
        operator_email: impl Into<String>,
        directory: Arc<dyn PrincipalDirectory>,
    ) -> Self {
        Self {
            secret: secret.into(),
            operator_email: operator_email.into(),
            directory,
        }
    }

    /// Configured operator email first, else the first active admin.
    async fn operator_account(&self) -> Result<Option<UserRecord>, DirectoryError> {
        if let Some(user) = self
            .directory
            .find_principal_by_email(&self.operator_email)
            .await?
        {
            if user.is_active {
                return Ok(Some(user));
            }
            warn!(
                email = %self.operator_email,
                "operator account is inactive; falling back to first admin"
            );
        }

        self.directory.find_first_active_admin().await
    }
}

#[async_trait]
impl CredentialVerifier for SharedSecretVerifier {
    async fn verify(
        &self,
        credential: Option<&Credential>,
    ) -> Result<Principal, VerificationError> {
        let presented = match credential {
            Some(Credential::DevToken(value)) => value,
            _ => {
                warn!("missing x-dev-auth header");
                return Err(VerificationError::InvalidCredential(MISSING_DEV_TOKEN));
            }
        };

        if !constant_time_eq(presented.as_bytes(), self.secret.as_bytes()) {
            warn!("invalid x-dev-auth token");
            return Err(VerificationError::InvalidCredential(INVALID_DEV_TOKEN));
        }

        let user = self.operator_account().await?.ok_or_else(|| {
            error!("no operator account available for shared-secret auth; seed an admin user");
            VerificationError::InvalidCredential(NO_DEV_USER)
        })?;

        Ok(user.to_principal())
    }
}

impl core::fmt::Debug for SharedSecretVerifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SharedSecretVerifier")
            .field("secret", &"[REDACTED]")
            .field("operator_email", &self.operator_email)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TokenIssuer, UserRole};
    use chrono::Duration;
    use gatehouse_core::UserId;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    const SECRET: &[u8] = b"test-secret";

    #[derive(Default)]
    struct StubDirectory {
        users: Vec<UserRecord>,
        failing: AtomicBool,
    }

    impl StubDirectory {
        fn with(users: Vec<UserRecord>) -> Arc<Self> {
            Arc::new(Self {
                users,
                failing: AtomicBool::new(false),
            })
        }

        fn check(&self) -> Result<(), DirectoryError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(DirectoryError::Unavailable("stub offline".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl PrincipalDirectory for StubDirectory {
        async fn find_principal_by_id(
            &self,
            id: UserId,
        ) -> Result<Option<UserRecord>, DirectoryError> {
            self.check()?;
            Ok(self.users.iter().find(|u| u.id == id).cloned())
        }

        async fn find_principal_by_email(
            &self,
            email: &str,
        ) -> Result<Option<UserRecord>, DirectoryError> {
            self.check()?;
            let email = email.to_lowercase();
            Ok(self.users.iter().find(|u| u.email == email).cloned())
        }

        async fn find_first_active_admin(&self) -> Result<Option<UserRecord>, DirectoryError> {
            self.check()?;
            Ok(self
                .users
                .iter()
                .find(|u| u.is_active && u.role == UserRole::Admin)
                .cloned())
        }
    }

    fn user(email: &str, role: UserRole, is_active: bool) -> UserRecord {
        UserRecord {
            id: UserId::new(),
            email: email.to_string(),
            role,
            is_active,
        }
    }

    fn invalid_reason(err: VerificationError) -> &'static str {
        match err {
            VerificationError::InvalidCredential(reason) => reason,
            other => panic!("expected InvalidCredential, got {other:?}"),
        }
    }

    #[test]
    fn constant_time_eq_accepts_identical_secrets() {
        assert!(constant_time_eq(b"dev", b"dev"));
    }

    #[test]
    fn constant_time_eq_rejects_prefix_and_empty() {
        assert!(!constant_time_eq(b"secret", b"secret-token"));
        assert!(!constant_time_eq(b"", b"secret-token"));
    }

    proptest! {
        #[test]
        fn mismatch_position_does_not_change_the_result(
            secret in proptest::collection::vec(any::<u8>(), 1..64),
            idx in any::<prop::sample::Index>(),
            flip in 1u8..=255,
        ) {
            let mut presented = secret.clone();
            let i = idx.index(secret.len());
            presented[i] ^= flip;
            prop_assert!(!constant_time_eq(&presented, &secret));
            prop_assert!(constant_time_eq(&secret, &secret.clone()));
        }

        #[test]
        fn unequal_lengths_never_match(
            a in proptest::collection::vec(any::<u8>(), 0..32),
            b in proptest::collection::vec(any::<u8>(), 0..32),
        ) {
            prop_assume!(a.len() != b.len());
            prop_assert!(!constant_time_eq(&a, &b));
        }
    }

    #[tokio::test]
    async fn valid_token_resolves_to_current_directory_record() {
        let mut alice = user("alice@example.test", UserRole::User, true);
        let directory = StubDirectory::with(vec![alice.clone()]);
        let verifier = TokenVerifier::new(SECRET, directory);

        let token = TokenIssuer::new(SECRET, Duration::minutes(10))
            .issue(&alice.to_principal())
            .unwrap();

        let principal = verifier
            .verify(Some(&Credential::Bearer(token)))
            .await
            .unwrap();
        assert_eq!(principal.id(), alice.id);
        assert_eq!(principal.email(), "alice@example.test");

        // Role comes from the record, not from the (stale) token.
        alice.role = UserRole::Admin;
        let directory = StubDirectory::with(vec![alice.clone()]);
        let verifier = TokenVerifier::new(SECRET, directory);
        let token = TokenIssuer::new(SECRET, Duration::minutes(10))
            .issue(&Principal::new(alice.id, alice.email.clone(), UserRole::User))
            .unwrap();
        let principal = verifier
            .verify(Some(&Credential::Bearer(token)))
            .await
            .unwrap();
        assert_eq!(principal.role(), UserRole::Admin);
    }

    fn sign(claims: serde_json::Value) -> String {
        jsonwebtoken::encode(
            &jsonwebtoken::Header::new(Algorithm::HS256),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn tokens_need_only_subject_and_expiry() {
        let alice = user("alice@example.test", UserRole::User, true);
        let verifier = TokenVerifier::new(SECRET, StubDirectory::with(vec![alice.clone()]));
        let now = Utc::now().timestamp();

        let tokens = [
            // Issuer clock slightly ahead of ours.
            sign(serde_json::json!({
                "sub": alice.id, "email": alice.email, "role": "USER",
                "iat": now + 2, "exp": now + 600,
            })),
            sign(serde_json::json!({ "sub": alice.id, "exp": now + 600 })),
            sign(serde_json::json!({
                "sub": alice.id, "email": alice.email, "role": "user",
                "iat": now, "exp": now + 600,
            })),
        ];

        for token in tokens {
            let principal = verifier
                .verify(Some(&Credential::Bearer(token)))
                .await
                .unwrap();
            assert_eq!(principal.id(), alice.id);
            assert_eq!(principal.role(), UserRole::User);
        }
    }

    #[tokio::test]
    async fn tokens_without_subject_or_expiry_are_rejected() {
        let alice = user("alice@example.test", UserRole::User, true);
        let verifier = TokenVerifier::new(SECRET, StubDirectory::with(vec![alice.clone()]));
        let now = Utc::now().timestamp();

        for claims in [
            serde_json::json!({ "sub": alice.id }),
            serde_json::json!({ "exp": now + 600 }),
            serde_json::json!({ "sub": "not-a-uuid", "exp": now + 600 }),
        ] {
            let err = verifier
                .verify(Some(&Credential::Bearer(sign(claims))))
                .await
                .unwrap_err();
            assert_eq!(invalid_reason(err), INVALID_BEARER);
        }
    }

    #[tokio::test]
    async fn expired_tampered_and_foreign_tokens_are_rejected() {
        let alice = user("alice@example.test", UserRole::User, true);
        let verifier = TokenVerifier::new(SECRET, StubDirectory::with(vec![alice.clone()]));

        let expired = TokenIssuer::new(SECRET, Duration::minutes(10))
            .issue_at(&alice.to_principal(), Utc::now() - Duration::hours(1))
            .unwrap();
        let foreign = TokenIssuer::new(b"other-secret", Duration::minutes(10))
            .issue(&alice.to_principal())
            .unwrap();

        for token in [expired, foreign, "not.a.jwt".to_string()] {
            let err = verifier
                .verify(Some(&Credential::Bearer(token)))
                .await
                .unwrap_err();
            assert_eq!(invalid_reason(err), INVALID_BEARER);
        }
    }

    #[tokio::test]
    async fn missing_or_wrong_kind_of_credential_is_rejected() {
        let verifier = TokenVerifier::new(SECRET, StubDirectory::with(vec![]));
        let err = verifier.verify(None).await.unwrap_err();
        assert_eq!(invalid_reason(err), MISSING_BEARER);

        let err = verifier
            .verify(Some(&Credential::DevToken("dev".into())))
            .await
            .unwrap_err();
        assert_eq!(invalid_reason(err), MISSING_BEARER);
    }

    #[tokio::test]
    async fn unknown_and_inactive_users_are_rejected() {
        let ghost = user("ghost@example.test", UserRole::User, true);
        let dormant = user("dormant@example.test", UserRole::User, false);
        let verifier = TokenVerifier::new(SECRET, StubDirectory::with(vec![dormant.clone()]));
        let issuer = TokenIssuer::new(SECRET, Duration::minutes(10));

        let err = verifier
            .verify(Some(&Credential::Bearer(issuer.issue(&ghost.to_principal()).unwrap())))
            .await
            .unwrap_err();
        assert_eq!(invalid_reason(err), USER_NOT_FOUND);

        let err = verifier
            .verify(Some(&Credential::Bearer(issuer.issue(&dormant.to_principal()).unwrap())))
            .await
            .unwrap_err();
        assert_eq!(invalid_reason(err), USER_INACTIVE);
    }

    #[tokio::test]
    async fn directory_failure_is_not_an_invalid_credential() {
        let alice = user("alice@example.test", UserRole::User, true);
        let directory = StubDirectory::with(vec![alice.clone()]);
        directory.failing.store(true, Ordering::SeqCst);
        let verifier = TokenVerifier::new(SECRET, directory);
        let token = TokenIssuer::new(SECRET, Duration::minutes(10))
            .issue(&alice.to_principal())
            .unwrap();

        let err = verifier
            .verify(Some(&Credential::Bearer(token)))
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationError::Lookup(_)));
    }

    #[tokio::test]
    async fn shared_secret_resolves_configured_operator() {
        let first_admin = user("first@example.test", UserRole::Admin, true);
        let operator = user("admin@local", UserRole::Admin, true);
        let directory = StubDirectory::with(vec![first_admin, operator.clone()]);
        let verifier = SharedSecretVerifier::new("dev", "admin@local", directory);

        let principal = verifier
            .verify(Some(&Credential::DevToken("dev".into())))
            .await
            .unwrap();
        assert_eq!(principal.id(), operator.id);
    }

    #[tokio::test]
    async fn shared_secret_falls_back_to_first_active_admin() {
        let regular = user("user@example.test", UserRole::User, true);
        let retired_admin = user("old@example.test", UserRole::Admin, false);
        let admin = user("boss@example.test", UserRole::Admin, true);
        let inactive_operator = user("admin@local", UserRole::Admin, false);
        let directory = StubDirectory::with(vec![
            regular,
            retired_admin,
            admin.clone(),
            inactive_operator,
        ]);
        let verifier = SharedSecretVerifier::new("dev", "admin@local", directory);

        let principal = verifier
            .verify(Some(&Credential::DevToken("dev".into())))
            .await
            .unwrap();
        assert_eq!(principal.id(), admin.id);
        assert_eq!(principal.role(), UserRole::Admin);
    }

    #[tokio::test]
    async fn shared_secret_rejects_missing_wrong_and_unbacked_tokens() {
        let verifier = SharedSecretVerifier::new(
            "dev",
            "admin@local",
            StubDirectory::with(vec![user("user@example.test", UserRole::User, true)]),
        );

        assert_eq!(invalid_reason(verifier.verify(None).await.unwrap_err()), MISSING_DEV_TOKEN);

        for wrong in ["dex", "devv", ""] {
            let err = verifier
                .verify(Some(&Credential::DevToken(wrong.into())))
                .await
                .unwrap_err();
            assert_eq!(invalid_reason(err), INVALID_DEV_TOKEN);
        }

        let err = verifier
            .verify(Some(&Credential::DevToken("dev".into())))
            .await
            .unwrap_err();
        assert_eq!(invalid_reason(err), NO_DEV_USER);
    }

    #[tokio::test]
    async fn strategy_dispatches_to_the_selected_verifier() {
        let operator = user("admin@local", UserRole::Admin, true);
        let directory = StubDirectory::with(vec![operator.clone()]);

        let strategy = CredentialStrategy::SharedSecret(SharedSecretVerifier::new(
            "dev",
            "admin@local",
            directory.clone(),
        ));
        assert_eq!(strategy.kind(), StrategyKind::SharedSecret);
        assert!(
            strategy
                .verify(Some(&Credential::DevToken("dev".into())))
                .await
                .is_ok()
        );

        let strategy = CredentialStrategy::Token(TokenVerifier::new(SECRET, directory));
        assert_eq!(strategy.kind(), StrategyKind::Token);
        assert!(
            strategy
                .verify(Some(&Credential::DevToken("dev".into())))
                .await
                .is_err()
        );
    }
}
