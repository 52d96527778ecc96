/// Header carrying the shared development secret.
pub const DEV_AUTH_HEADER: &str = "x-dev-auth";

/// A credential presented by a caller.
///
/// Exists only for the duration of verification; never persisted or logged.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Signed bearer token (`Authorization: Bearer <token>`).
    Bearer(String),
    /// Plaintext shared secret (non-production only).
    DevToken(String),
}

impl Credential {
    pub fn expose(&self) -> &str {
        match self {
            Self::Bearer(v) | Self::DevToken(v) => v,
        }
    }
}

impl core::fmt::Debug for Credential {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer([REDACTED])"),
            Self::DevToken(_) => f.write_str("DevToken([REDACTED])"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_never_contains_the_secret() {
        let cred = Credential::DevToken("hunter2".into());
        assert!(!format!("{cred:?}").contains("hunter2"));
        assert_eq!(cred.expose(), "hunter2");
    }
}
