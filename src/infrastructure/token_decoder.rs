use crate::domain::claims::AccessTokenClaims;
use crate::infrastructure::error::ClientError;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// Reads the payload segment of a JWT without verifying its signature.
/// Validation is the backend's job; the client only needs the claims.
pub fn decode_access_token(token: &str) -> Result<AccessTokenClaims, ClientError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ClientError::Auth("access token must not be empty".to_string()));
    }

    let mut segments = token.split('.');
    let (Some(_header), Some(payload)) = (segments.next(), segments.next()) else {
        return Err(ClientError::Auth("access token is not a JWT".to_string()));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|error| ClientError::Auth(format!("invalid token payload encoding: {error}")))?;
    serde_json::from_slice::<AccessTokenClaims>(&bytes)
        .map_err(|error| ClientError::Auth(format!("invalid token payload: {error}")))
}

#[cfg(test)]
pub(crate) fn encode_test_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}
