//! Certificate pinning (trust-on-first-use).
//!
//! The first certificate stored for an identity is authoritative. A later
//! offer with a different fingerprint is reported as a conflict and never
//! replaces the pin.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{
    fingerprint_of, Fingerprint, FleetEvent, PeerIdentity, StoreError, Timestamp,
};
use crate::ports::{FleetEventPublisher, KeyValueStore};

/// Key prefix of pinned certificates.
pub const CERTIFICATE_PREFIX: &[u8] = b"cert/";

/// A pinned certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateEntry {
    /// Owner of the certificate.
    pub identity: PeerIdentity,
    /// DER bytes.
    pub certificate: Vec<u8>,
    /// SHA-256 of `certificate`.
    pub fingerprint: Fingerprint,
    /// When the pin was created.
    pub stored_at: Timestamp,
}

/// Result of offering a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    /// No pin existed; this certificate is now pinned.
    Stored(CertificateEntry),
    /// The same certificate was already pinned.
    AlreadyStored(CertificateEntry),
    /// A different certificate is pinned.
    Conflict {
        /// The pin.
        existing: CertificateEntry,
        /// Fingerprint of the rejected offer.
        offered: Fingerprint,
    },
}

#[derive(Serialize, Deserialize)]
struct StoredCertificate {
    identity: String,
    certificate: String,
    stored_at: u64,
}

/// Pin store over a [`KeyValueStore`].
pub struct CertificateStore {
    store: Arc<dyn KeyValueStore>,
    events: Arc<dyn FleetEventPublisher>,
}

impl CertificateStore {
    /// Create a store emitting `CertificateSaved` through `events`.
    pub fn new(store: Arc<dyn KeyValueStore>, events: Arc<dyn FleetEventPublisher>) -> Self {
        Self { store, events }
    }

    /// The pinned certificate of `identity`, if any.
    pub fn get(&self, identity: &PeerIdentity) -> Result<Option<CertificateEntry>, StoreError> {
        let key = certificate_key(identity);
        self.store
            .get(&key)?
            .map(|bytes| decode_entry(&key, &bytes))
            .transpose()
    }

    /// Pin `certificate` for `identity` unless a pin exists.
    pub fn put_if_absent(
        &self,
        identity: PeerIdentity,
        certificate: &[u8],
        now: Timestamp,
    ) -> Result<PutOutcome, StoreError> {
        let key = certificate_key(&identity);
        let offered = CertificateEntry {
            identity,
            certificate: certificate.to_vec(),
            fingerprint: fingerprint_of(certificate),
            stored_at: now,
        };
        let encoded = encode_entry(&offered)?;

        match self.store.put_if_absent(&key, &encoded)? {
            None => {
                debug!(peer = %identity, "Pinned certificate");
                self.events.publish(FleetEvent::CertificateSaved {
                    identity,
                    nickname: identity.nickname(),
                    fingerprint: offered.fingerprint,
                });
                Ok(PutOutcome::Stored(offered))
            }
            Some(bytes) => {
                let existing = decode_entry(&key, &bytes)?;
                if existing.fingerprint == offered.fingerprint {
                    Ok(PutOutcome::AlreadyStored(existing))
                } else {
                    Ok(PutOutcome::Conflict {
                        existing,
                        offered: offered.fingerprint,
                    })
                }
            }
        }
    }
}

fn certificate_key(identity: &PeerIdentity) -> Vec<u8> {
    let mut key = CERTIFICATE_PREFIX.to_vec();
    key.extend_from_slice(hex::encode(identity.as_bytes()).as_bytes());
    key
}

fn encode_entry(entry: &CertificateEntry) -> Result<Vec<u8>, StoreError> {
    let stored = StoredCertificate {
        identity: entry.identity.to_checksum_string(),
        certificate: hex::encode(&entry.certificate),
        stored_at: entry.stored_at.as_secs(),
    };
    serde_json::to_vec(&stored).map_err(|e| StoreError::Backend(e.to_string()))
}

fn decode_entry(key: &[u8], bytes: &[u8]) -> Result<CertificateEntry, StoreError> {
    let corrupt = |reason: String| StoreError::Corrupt {
        key: String::from_utf8_lossy(key).into_owned(),
        reason,
    };
    let stored: StoredCertificate =
        serde_json::from_slice(bytes).map_err(|e| corrupt(e.to_string()))?;
    let identity = PeerIdentity::parse(&stored.identity).map_err(|e| corrupt(e.to_string()))?;
    let certificate = hex::decode(&stored.certificate).map_err(|e| corrupt(e.to_string()))?;
    Ok(CertificateEntry {
        identity,
        fingerprint: fingerprint_of(&certificate),
        certificate,
        stored_at: Timestamp::new(stored.stored_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryEventPublisher, InMemoryKeyValueStore};

    fn store() -> (CertificateStore, Arc<InMemoryEventPublisher>) {
        let events = Arc::new(InMemoryEventPublisher::new());
        let certificates =
            CertificateStore::new(Arc::new(InMemoryKeyValueStore::new()), events.clone());
        (certificates, events)
    }

    #[test]
    fn test_first_offer_is_pinned_and_announced() {
        let (certificates, events) = store();
        let identity = PeerIdentity::new([1u8; 20]);
        let outcome = certificates
            .put_if_absent(identity, b"cert-a", Timestamp::new(5))
            .unwrap();
        assert!(matches!(outcome, PutOutcome::Stored(_)));
        assert_eq!(events.certificates_saved(), vec![identity]);

        let entry = certificates.get(&identity).unwrap().unwrap();
        assert_eq!(entry.certificate, b"cert-a");
        assert_eq!(entry.fingerprint, fingerprint_of(b"cert-a"));
        assert_eq!(entry.stored_at, Timestamp::new(5));
    }

    #[test]
    fn test_same_certificate_is_already_stored() {
        let (certificates, events) = store();
        let identity = PeerIdentity::new([1u8; 20]);
        certificates
            .put_if_absent(identity, b"cert-a", Timestamp::new(5))
            .unwrap();
        let again = certificates
            .put_if_absent(identity, b"cert-a", Timestamp::new(9))
            .unwrap();
        match again {
            PutOutcome::AlreadyStored(entry) => assert_eq!(entry.stored_at, Timestamp::new(5)),
            other => panic!("expected AlreadyStored, got {other:?}"),
        }
        assert_eq!(events.certificates_saved().len(), 1);
    }

    #[test]
    fn test_different_certificate_conflicts_and_pin_survives() {
        let (certificates, _) = store();
        let identity = PeerIdentity::new([1u8; 20]);
        certificates
            .put_if_absent(identity, b"cert-a", Timestamp::new(5))
            .unwrap();
        let outcome = certificates
            .put_if_absent(identity, b"cert-b", Timestamp::new(6))
            .unwrap();
        match outcome {
            PutOutcome::Conflict { existing, offered } => {
                assert_eq!(existing.fingerprint, fingerprint_of(b"cert-a"));
                assert_eq!(offered, fingerprint_of(b"cert-b"));
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
        assert_eq!(
            certificates.get(&identity).unwrap().unwrap().certificate,
            b"cert-a"
        );
    }

    #[test]
    fn test_unknown_identity_has_no_entry() {
        let (certificates, _) = store();
        assert_eq!(certificates.get(&PeerIdentity::new([2u8; 20])).unwrap(), None);
    }

    #[test]
    fn test_concurrent_offers_have_one_winner() {
        let (certificates, _) = store();
        let certificates = Arc::new(certificates);
        let identity = PeerIdentity::new([3u8; 20]);

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let certificates = certificates.clone();
                std::thread::spawn(move || {
                    certificates
                        .put_if_absent(identity, &[i; 16], Timestamp::new(1))
                        .unwrap()
                })
            })
            .collect();
        let stored = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|o| matches!(o, PutOutcome::Stored(_)))
            .count();
        assert_eq!(stored, 1);
    }
}
