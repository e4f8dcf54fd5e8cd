use std::fmt;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};

/// HS256 keys shared by token verification and signing of the JWT composite
/// type.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    audience: String,
}

impl fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtKeys").field("audience", &self.audience).finish_non_exhaustive()
    }
}

impl JwtKeys {
    pub fn new(secret: &str, audience: impl Into<String>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            audience: audience.into(),
        }
    }

    /// Checks signature, audience and, when present, expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not valid.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.audience]);
        validation.required_spec_claims.clear();

        jsonwebtoken::decode::<Map<String, Value>>(token, &self.decoding, &validation)
            .map(|data| Claims(data.claims))
    }

    /// Signs a JWT composite value; null attributes are left out and the
    /// audience is added when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the claims cannot be encoded.
    pub fn sign(&self, claims: Map<String, Value>) -> Result<String, jsonwebtoken::errors::Error> {
        let mut claims: Map<String, Value> =
            claims.into_iter().filter(|(_, value)| !value.is_null()).collect();
        if !claims.contains_key("aud") {
            drop(claims.insert("aud".to_string(), Value::String(self.audience.clone())));
        }

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }
}

/// Verified token claims.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub fn role(&self) -> Option<&str> { self.0.get("role").and_then(Value::as_str) }

    /// `(setting, value)` pairs applied to the request transaction.
    pub fn settings(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(name, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (format!("jwt.claims.{name}"), value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn claims(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_sign_and_verify() {
        let keys = JwtKeys::new("top-secret", "postgraphile");
        let token = keys
            .sign(claims(json!({ "role": "app_user", "user_id": 42, "exp": 4_102_444_800_i64, "nickname": null })))
            .unwrap();

        let verified = keys.verify(&token).unwrap();
        assert_eq!(verified.role(), Some("app_user"));

        let settings = verified.settings();
        assert!(settings.contains(&("jwt.claims.user_id".to_string(), "42".to_string())));
        assert!(settings.contains(&("jwt.claims.role".to_string(), "app_user".to_string())));
        assert!(settings.contains(&("jwt.claims.aud".to_string(), "postgraphile".to_string())));
        assert!(!settings.iter().any(|(name, _)| name == "jwt.claims.nickname"));
    }

    #[test]
    fn test_rejects_foreign_tokens() {
        let keys = JwtKeys::new("top-secret", "postgraphile");

        let other_secret = JwtKeys::new("other-secret", "postgraphile")
            .sign(claims(json!({ "role": "app_user" })))
            .unwrap();
        assert!(keys.verify(&other_secret).is_err());

        let other_audience =
            keys.sign(claims(json!({ "role": "app_user", "aud": "someone-else" }))).unwrap();
        assert!(keys.verify(&other_audience).is_err());

        let expired = keys.sign(claims(json!({ "role": "app_user", "exp": 1 }))).unwrap();
        assert!(keys.verify(&expired).is_err());

        assert!(keys.verify("not-a-token").is_err());
    }
}
