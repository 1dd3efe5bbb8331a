//! Default signer and validator.

use pubsync_api::{
    DynValidationHandler, Publication, PsResult, Signer, Validator,
    SIG_TYPE_DIGEST_SHA256,
};
use sha2::{Digest, Sha256};

/// Signs publications with a SHA-256 digest over the signed portion.
///
/// A digest carries no provenance or trust semantics; it is a high
/// quality checksum. Production deployments install an identity-bearing
/// [Signer] instead, without any engine change.
#[derive(Debug, Default)]
pub struct Sha256Signer;

impl Signer for Sha256Signer {
    fn sign(&self, publication: &mut Publication) -> PsResult<()> {
        let digest = Sha256::digest(publication.signed_portion());
        publication.set_signature(
            SIG_TYPE_DIGEST_SHA256,
            bytes::Bytes::copy_from_slice(&digest),
        );
        Ok(())
    }
}

/// Passes every publication through unexamined.
#[derive(Debug, Default)]
pub struct AcceptAllValidator;

impl Validator for AcceptAllValidator {
    fn validate(&self, data: Publication, handler: DynValidationHandler) {
        handler.on_valid(data);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pubsync_api::{Name, Timestamp};

    fn sample() -> Publication {
        let mut name: Name = "/t/a".parse().unwrap();
        name.push_timestamp(Timestamp::from_millis(42));
        Publication::new(name, &b"x"[..])
    }

    #[test]
    fn signing_is_deterministic() {
        let signer = Sha256Signer;
        let mut a = sample();
        let mut b = sample();
        signer.sign(&mut a).unwrap();
        signer.sign(&mut b).unwrap();
        assert_eq!(a.wire_encode(), b.wire_encode());
        assert_eq!(32, a.sig_value().len());
    }

    #[test]
    fn re_signing_is_idempotent() {
        let signer = Sha256Signer;
        let mut p = sample();
        signer.sign(&mut p).unwrap();
        let first = p.wire_encode();
        signer.sign(&mut p).unwrap();
        assert_eq!(first, p.wire_encode());
    }
}
