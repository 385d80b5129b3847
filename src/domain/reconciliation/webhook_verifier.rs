//! Mercado Pago webhook signature verification.
//!
//! The `x-signature` header carries `ts=<ts>,v1=<hex hmac>`. The HMAC-SHA256
//! is computed over the manifest `id:<data.id>;request-id:<x-request-id>;ts:<ts>;`
//! with the webhook secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::WebhookError;

/// Parsed components from the `x-signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub ts: String,
    pub v1_signature: Vec<u8>,
}

impl SignatureHeader {
    /// Parses `ts=<ts>,v1=<hex>`; unknown parts are ignored.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::ParseError` if either part is missing or the
    /// signature is not hex.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut ts: Option<String> = None;
        let mut v1_signature: Option<Vec<u8>> = None;

        for part in header.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or_else(|| WebhookError::ParseError("invalid header format".to_string()))?;

            match key {
                "ts" => ts = Some(value.to_string()),
                "v1" => {
                    v1_signature = Some(hex::decode(value).map_err(|_| {
                        WebhookError::ParseError("invalid v1 signature hex".to_string())
                    })?);
                }
                _ => {}
            }
        }

        Ok(SignatureHeader {
            ts: ts.ok_or_else(|| WebhookError::ParseError("missing ts".to_string()))?,
            v1_signature: v1_signature
                .ok_or_else(|| WebhookError::ParseError("missing v1 signature".to_string()))?,
        })
    }
}

/// Verifier for Mercado Pago notification signatures.
pub struct MercadoPagoSignatureVerifier {
    secret: String,
}

impl MercadoPagoSignatureVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Checks `signature_header` against the notified data id and request id.
    ///
    /// # Errors
    ///
    /// - `ParseError` - header is malformed
    /// - `InvalidSignature` - HMAC does not match
    pub fn verify(
        &self,
        signature_header: &str,
        request_id: &str,
        data_id: &str,
    ) -> Result<(), WebhookError> {
        let header = SignatureHeader::parse(signature_header)?;
        let expected = self.compute_signature(&manifest(data_id, request_id, &header.ts))?;

        if !constant_time_compare(&expected, &header.v1_signature) {
            tracing::warn!(data_id = %data_id, "Mercado Pago webhook signature mismatch");
            return Err(WebhookError::InvalidSignature);
        }
        Ok(())
    }

    fn compute_signature(&self, manifest: &str) -> Result<Vec<u8>, WebhookError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.as_bytes())
            .map_err(|_| WebhookError::InvalidSignature)?;
        mac.update(manifest.as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

fn manifest(data_id: &str, request_id: &str, ts: &str) -> String {
    format!("id:{};request-id:{};ts:{};", data_id, request_id, ts)
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Builds a valid `x-signature` header for test fixtures.
#[cfg(test)]
pub fn sign_for_tests(secret: &str, request_id: &str, data_id: &str, ts: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key");
    mac.update(manifest(data_id, request_id, ts).as_bytes());
    format!("ts={},v1={}", ts, hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "mp_webhook_secret";

    #[test]
    fn parse_reads_ts_and_v1() {
        let header = SignatureHeader::parse("ts=1704908010,v1=abcd").unwrap();
        assert_eq!(header.ts, "1704908010");
        assert_eq!(header.v1_signature, vec![0xab, 0xcd]);
    }

    #[test]
    fn parse_rejects_missing_parts() {
        assert!(SignatureHeader::parse("v1=abcd").is_err());
        assert!(SignatureHeader::parse("ts=1").is_err());
        assert!(SignatureHeader::parse("garbage").is_err());
    }

    #[test]
    fn valid_signature_verifies() {
        let header = sign_for_tests(SECRET, "req-1", "123456", "1704908010");
        let verifier = MercadoPagoSignatureVerifier::new(SECRET);
        assert!(verifier.verify(&header, "req-1", "123456").is_ok());
    }

    #[test]
    fn tampered_data_id_fails() {
        let header = sign_for_tests(SECRET, "req-1", "123456", "1704908010");
        let verifier = MercadoPagoSignatureVerifier::new(SECRET);
        assert!(matches!(
            verifier.verify(&header, "req-1", "999999"),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[test]
    fn wrong_secret_fails() {
        let header = sign_for_tests("other", "req-1", "123456", "1704908010");
        let verifier = MercadoPagoSignatureVerifier::new(SECRET);
        assert!(verifier.verify(&header, "req-1", "123456").is_err());
    }
}
