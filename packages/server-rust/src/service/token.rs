//! Bearer tokens: minting with gateway-issued material and decoding caller
//! identity.
//!
//! Tokens are HS256 JWTs. `iss` is the gateway credential key, which is how
//! the gateway picks the secret to verify with; `sub` is the auth subject id.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rally_core::Principal;
use serde::{Deserialize, Serialize};

use super::gateway::Credential;
use crate::failure::Failure;

/// Payload of every issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub iat: u64,
    pub exp: u64,
}

/// Signs tokens for authenticated subjects.
#[derive(Debug, Clone)]
pub struct TokenMinter {
    ttl: Duration,
}

impl TokenMinter {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Mints a token for `subject`, signed with the credential secret.
    ///
    /// # Errors
    ///
    /// Returns [`Failure::Other`] if the system clock is before the epoch or
    /// signing fails.
    pub fn mint(
        &self,
        credential: &Credential,
        subject: &str,
        email: Option<&str>,
    ) -> Result<String, Failure> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|err| anyhow::anyhow!("system time error: {err}"))?
            .as_secs();
        let claims = Claims {
            iss: credential.key.clone(),
            sub: subject.to_string(),
            email: email.map(str::to_string),
            iat: now,
            exp: now.saturating_add(self.ttl.as_secs()),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(credential.secret.as_bytes()),
        )
        .map_err(|err| anyhow::anyhow!("failed to sign token: {err}").into())
    }
}

/// Turns a bearer token into a [`Principal`].
///
/// Two modes: behind the gateway, signatures were already checked upstream
/// and only the claims are read (expiry is still enforced); with a shared
/// secret, the signature is verified locally.
#[derive(Clone)]
pub struct IdentityDecoder {
    key: DecodingKey,
    validation: Validation,
    verifies_signatures: bool,
}

impl IdentityDecoder {
    #[must_use]
    pub fn trusting_gateway() -> Self {
        let mut validation = base_validation();
        validation.insecure_disable_signature_validation();
        Self {
            key: DecodingKey::from_secret(&[]),
            validation,
            verifies_signatures: false,
        }
    }

    #[must_use]
    pub fn verifying(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: base_validation(),
            verifies_signatures: true,
        }
    }

    /// False when signatures are left to the gateway.
    #[must_use]
    pub fn verifies_signatures(&self) -> bool {
        self.verifies_signatures
    }

    /// # Errors
    ///
    /// Returns [`Failure::Unauthenticated`] when the token is malformed,
    /// expired, missing `sub`, or fails verification.
    pub fn decode(&self, token: &str) -> Result<Principal, Failure> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|err| Failure::Unauthenticated(format!("invalid bearer token: {err}")))?;
        if data.claims.sub.is_empty() {
            return Err(Failure::Unauthenticated("token has no subject".to_string()));
        }
        Ok(Principal {
            id: data.claims.sub,
            email: data.claims.email,
        })
    }
}

impl std::fmt::Debug for IdentityDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityDecoder")
            .field("algorithms", &self.validation.algorithms)
            .field("verifies_signatures", &self.verifies_signatures)
            .finish_non_exhaustive()
    }
}

fn base_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["exp", "sub"]);
    validation
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential() -> Credential {
        Credential {
            key: "K".to_string(),
            secret: "S".to_string(),
        }
    }

    fn claims_of(token: &str) -> Claims {
        let mut validation = base_validation();
        validation.insecure_disable_signature_validation();
        decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
            .unwrap()
            .claims
    }

    #[test]
    fn issuer_is_credential_key() {
        let token = TokenMinter::new(Duration::from_secs(60))
            .mint(&credential(), "subject-1", Some("ada@example.com"))
            .unwrap();
        let claims = claims_of(&token);
        assert_eq!(claims.iss, "K");
        assert_eq!(claims.sub, "subject-1");
        assert_eq!(claims.email.as_deref(), Some("ada@example.com"));
        assert_eq!(claims.exp - claims.iat, 60);
    }

    #[test]
    fn verifying_decoder_checks_signature() {
        let token = TokenMinter::new(Duration::from_secs(60))
            .mint(&credential(), "subject-1", None)
            .unwrap();
        let principal = IdentityDecoder::verifying("S").decode(&token).unwrap();
        assert_eq!(principal, Principal::new("subject-1"));

        let err = IdentityDecoder::verifying("other").decode(&token).unwrap_err();
        assert!(matches!(err, Failure::Unauthenticated(_)));
    }

    #[test]
    fn trusting_decoder_reads_claims() {
        let token = TokenMinter::new(Duration::from_secs(60))
            .mint(&credential(), "subject-2", None)
            .unwrap();
        let principal = IdentityDecoder::trusting_gateway().decode(&token).unwrap();
        assert_eq!(principal.id, "subject-2");
    }

    #[test]
    fn garbage_is_unauthenticated() {
        let err = IdentityDecoder::trusting_gateway()
            .decode("not.a.token")
            .unwrap_err();
        assert!(matches!(err, Failure::Unauthenticated(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = Claims {
            iss: "K".to_string(),
            sub: "subject-3".to_string(),
            email: None,
            iat: 1,
            exp: 2,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"S"),
        )
        .unwrap();
        assert!(IdentityDecoder::verifying("S").decode(&token).is_err());
    }
}
