//! `gatehouse-auth`: authentication boundary.
//!
//! Principals, roles, bearer-token claims, the collaborator contracts used to
//! resolve identities and memberships, and the two credential verification
//! strategies. This crate is intentionally decoupled from HTTP and storage.

pub mod claims;
pub mod credential;
pub mod directory;
pub mod principal;
pub mod roles;
pub mod token;
pub mod verifier;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use credential::{Credential, DEV_AUTH_HEADER};
pub use directory::{DirectoryError, MembershipRecord, MembershipStore, PrincipalDirectory};
pub use principal::{Principal, UserRecord};
pub use roles::{MembershipRole, UnknownRole, UserRole};
pub use token::{TokenError, TokenIssuer};
pub use verifier::{
    CredentialStrategy, CredentialVerifier, SharedSecretVerifier, StrategyKind, TokenVerifier,
    VerificationError, constant_time_eq,
};
