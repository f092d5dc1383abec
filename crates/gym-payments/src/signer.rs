//! HMAC-SHA512 request signing

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Lowercase hex HMAC-SHA512 digest (128 characters)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn mac_for(secret: &str) -> HmacSha512 {
    HmacSha512::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length")
}

/// Sign the exact canonical query bytes with the shared secret.
///
/// `canonical` must be the string the gateway will rebuild on its side; any
/// drift in ordering or encoding makes the gateway reject the transaction.
pub fn sign(canonical: &str, secret: &str) -> Signature {
    let mut mac = mac_for(secret);
    mac.update(canonical.as_bytes());
    Signature(hex::encode(mac.finalize().into_bytes()))
}

/// Check a hex signature against `canonical` in constant time.
///
/// Hex case is ignored. Malformed hex is simply a mismatch.
pub fn verify(canonical: &str, secret: &str, signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex) else {
        return false;
    };

    let mut mac = mac_for(secret);
    mac.update(canonical.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_signature_shape() {
        let sig = sign("vnp_Amount=100", "SECRET123");
        assert_eq!(sig.as_str().len(), 128);
        assert!(sig.as_str().chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_rfc4231_case_2() {
        // HMAC-SHA512, key "Jefe"
        let sig = sign("what do ya want for nothing?", "Jefe");
        assert_eq!(
            sig.as_str(),
            "164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea250554\
             9758bf75c05a994a6d034f65f8f0e6fdcaeab1a34d4a6b4b636e070a38bce737"
        );
    }

    #[test]
    fn test_one_byte_changes_signature() {
        let a = sign("vnp_Amount=50000000&vnp_TxnRef=42", "SECRET123");
        let b = sign("vnp_Amount=50000000&vnp_TxnRef=43", "SECRET123");
        assert_ne!(a, b);
    }

    #[test]
    fn test_secret_changes_signature() {
        let a = sign("vnp_Amount=100", "SECRET123");
        let b = sign("vnp_Amount=100", "SECRET124");
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_accepts_uppercase_hex() {
        let sig = sign("vnp_Amount=100", "SECRET123");
        assert!(verify("vnp_Amount=100", "SECRET123", &sig.as_str().to_uppercase()));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        assert!(!verify("vnp_Amount=100", "SECRET123", "not-hex"));
        assert!(!verify("vnp_Amount=100", "SECRET123", ""));
        let sig = sign("vnp_Amount=100", "SECRET123");
        assert!(!verify("vnp_Amount=101", "SECRET123", sig.as_str()));
    }

    proptest! {
        #[test]
        fn prop_sign_is_deterministic_and_verifiable(payload in ".*", secret in "[ -~]{1,64}") {
            let first = sign(&payload, &secret);
            prop_assert_eq!(&first, &sign(&payload, &secret));
            prop_assert!(verify(&payload, &secret, first.as_str()));
        }
    }
}
