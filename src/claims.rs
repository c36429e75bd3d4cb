use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Issuer-specific claims, flattened into the JWT payload.
pub type CustomClaims = Map<String, Value>;

/// Claim names owned by [`Claims`]; custom claims may not shadow them.
pub const REGISTERED_CLAIMS: [&str; 8] = ["iss", "iat", "exp", "nbf", "jti", "sub", "aud", "prv"];

/// Decoded JWT claims.
///
/// The standard registered fields (`iss`, `iat`, `exp`, `nbf`, `jti`,
/// `sub`) plus the optional `aud` and Laravel `prv` claims.  Everything
/// else lands in `custom`.
///
/// ```rust
/// use jwt_guard::{JwtCodec, JwtConfig, TokenCodec};
/// use serde_json::json;
///
/// let codec = JwtCodec::new(JwtConfig::new("secret"));
/// let mut extra = jwt_guard::CustomClaims::new();
/// extra.insert("tenant".into(), json!("acme"));
///
/// let token = codec.encode("42", None, extra).unwrap();
/// let claims = codec.decode(&token).unwrap();
/// assert_eq!(claims.sub, "42");
/// assert_eq!(claims.get("tenant"), Some(json!("acme")));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// RFC 7519 §4.1.1, optional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub jti: String,
    pub sub: String,

    /// RFC 7519 §4.1.3 audience.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Vec<String>>,

    /// Laravel `prv` claim (SHA-1 of the principal type name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prv: Option<String>,

    #[serde(flatten)]
    pub custom: CustomClaims,
}

/// A verified claim set, as handed out by the guard.
pub type Payload = Claims;

impl Claims {
    /// Parse `sub` as `u32`.
    pub fn user_id_u32(&self) -> Option<u32> {
        self.sub.parse().ok()
    }

    /// The raw subject string.
    pub fn subject(&self) -> &str {
        &self.sub
    }

    /// Look up any claim, registered or custom, by name.
    pub fn get(&self, name: &str) -> Option<Value> {
        match name {
            "iss" => self.iss.clone().map(Value::from),
            "iat" => Some(self.iat.into()),
            "exp" => Some(self.exp.into()),
            "nbf" => Some(self.nbf.into()),
            "jti" => Some(self.jti.clone().into()),
            "sub" => Some(self.sub.clone().into()),
            "aud" => self.aud.clone().map(Value::from),
            "prv" => self.prv.clone().map(Value::from),
            other => self.custom.get(other).cloned(),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Whether the token was issued for a principal of type `type_name`.
    ///
    /// Tokens without a `prv` claim are not locked to any type and pass.
    pub fn matches_subject_model(&self, type_name: &str) -> bool {
        match &self.prv {
            None => true,
            Some(prv) => *prv == hash_subject_model(type_name),
        }
    }
}

/// SHA-1 hex of the principal type name (Laravel `prv` convention).
pub fn hash_subject_model(type_name: &str) -> String {
    use sha1::Digest;
    let hash = sha1::Sha1::new_with_prefix(type_name.as_bytes()).finalize();
    hex_encode(&hash)
}

const HEX: &[u8; 16] = b"0123456789abcdef";

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        s.push(HEX[(b >> 4) as usize] as char);
        s.push(HEX[(b & 0x0f) as usize] as char);
    }
    s
}
