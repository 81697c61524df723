use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
pub struct Claims {
    pub sub: String,
    pub email: Option<String>,
}

/// Reads the claims of the access token handed back by the login page.
///
/// The signature is not checked here, the token only identifies who logged
/// in on this machine.
pub fn extract_claims(token: Option<&str>) -> Result<Claims, String> {
    let token = match token {
        Some(token) => token,
        None => {
            return Err("unable to extract token".to_string());
        }
    };

    let token = match token.strip_prefix("Bearer ") {
        Some(token) => token,
        None => {
            return Err("invalid token".to_string());
        }
    };

    let key = DecodingKey::from_secret(&[]);
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_aud = false;

    match decode::<Claims>(token, &key, &validation) {
        Ok(data) => Ok(data.claims),
        Err(_) => Err("invalid token".to_string()),
    }
}

#[cfg(test)]
pub fn test_token(sub: &str, email: Option<&str>, expires_in: i64) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = serde_json::json!({
        "sub": sub,
        "email": email,
        "aud": "authenticated",
        "exp": chrono::Utc::now().timestamp() + expires_in,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"signing key the service never sees"),
    )
    .unwrap()
}
