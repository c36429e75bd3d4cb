//! Principal lookup contract.

use std::collections::BTreeMap;

use crate::claims::CustomClaims;

/// Raw login credentials, e.g. `email` and `password`.
pub type Credentials = BTreeMap<String, String>;

/// A principal that can be the subject of a token.
pub trait JwtSubject {
    /// Value stored in the `sub` claim.
    fn jwt_identifier(&self) -> String;

    /// Claims added to every token issued for this principal.
    fn jwt_custom_claims(&self) -> CustomClaims {
        CustomClaims::new()
    }
}

/// Where principals live.  Shared read-mostly across requests.
pub trait PrincipalStore: Send + Sync {
    type Principal: JwtSubject + Clone;

    fn retrieve_by_id(&self, id: &str) -> Option<Self::Principal>;

    /// The principal whose record matches `credentials`, or `None` on any
    /// mismatch.
    fn validate(&self, credentials: &Credentials) -> Option<Self::Principal>;

    /// Type name hashed into the `prv` claim.  `None` disables the
    /// subject-model check.
    fn principal_type_name(&self) -> Option<&str> {
        None
    }
}
