use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha2::Sha256;

use crate::error::BankError;

/// Signs the raw bytes of an SCA one-time token with RSA-SHA256 (PKCS#1 v1.5), as required by
/// step 2 of the handshake (§4.1), and returns the base64-encoded signature.
pub fn sign_ott(private_key_pem: &str, ott: &[u8]) -> Result<String, BankError> {
    let private_key = RsaPrivateKey::from_pkcs8_pem(private_key_pem)
        .map_err(|e| BankError::SigningFailed(format!("invalid private key: {e}")))?;
    let signing_key = SigningKey::<Sha256>::new(private_key);
    let signature = signing_key.try_sign(ott).map_err(|e| BankError::SigningFailed(e.to_string()))?;
    Ok(BASE64.encode(signature.to_bytes()))
}
