//! TLS material and rustls configuration.
//!
//! Workers present self-signed certificates. Clients accept any server
//! certificate during the handshake but still check the handshake
//! signature; trust is decided afterwards by the pinned certificate store.

use std::fmt;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};

use super::config::QuicConfig;
use crate::domain::{fingerprint_of, Fingerprint, TransportError};

/// A worker's TLS certificate and private key, both DER.
#[derive(Clone)]
pub struct NodeTlsMaterial {
    certificate_der: Vec<u8>,
    private_key_der: Vec<u8>,
}

impl NodeTlsMaterial {
    /// Generate a fresh self-signed certificate for `host`.
    ///
    /// `host` may be an IP literal or a DNS name.
    pub fn generate(host: &str) -> Result<Self, TransportError> {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec![host.to_string()])
                .map_err(|e| TransportError::Tls(format!("certificate generation: {e}")))?;
        Ok(Self {
            certificate_der: cert.der().to_vec(),
            private_key_der: key_pair.serialize_der(),
        })
    }

    /// Material loaded from storage. The key must be PKCS#8.
    pub fn from_der(certificate_der: Vec<u8>, private_key_der: Vec<u8>) -> Self {
        Self {
            certificate_der,
            private_key_der,
        }
    }

    /// Certificate, DER.
    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate_der
    }

    /// Private key, PKCS#8 DER.
    pub fn private_key_der(&self) -> &[u8] {
        &self.private_key_der
    }

    /// SHA-256 of the certificate.
    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint_of(&self.certificate_der)
    }

    pub(crate) fn server_config(&self, config: &QuicConfig) -> Result<quinn::ServerConfig, TransportError> {
        let cert_chain = vec![CertificateDer::from(self.certificate_der.clone())];
        let private_key =
            PrivateKeyDer::from(PrivatePkcs8KeyDer::from(self.private_key_der.clone()));

        let server_crypto = rustls::ServerConfig::builder_with_provider(provider())
            .with_protocol_versions(&[&rustls::version::TLS13])
            .map_err(tls_error)?
            .with_no_client_auth()
            .with_single_cert(cert_chain, private_key)
            .map_err(tls_error)?;

        let quic_server_config = quinn::crypto::rustls::QuicServerConfig::try_from(server_crypto)
            .map_err(|e| TransportError::Tls(format!("QUIC crypto config error: {e:?}")))?;

        let mut server_config = quinn::ServerConfig::with_crypto(Arc::new(quic_server_config));
        server_config.transport_config(Arc::new(config.transport()));
        Ok(server_config)
    }
}

impl fmt::Debug for NodeTlsMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeTlsMaterial")
            .field("fingerprint", &hex::encode(self.fingerprint()))
            .finish_non_exhaustive()
    }
}

/// Client configuration that accepts any self-signed server certificate.
pub(crate) fn client_config(config: &QuicConfig) -> Result<quinn::ClientConfig, TransportError> {
    let provider = provider();
    let crypto = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(tls_error)?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(PinnedElsewhere { provider }))
        .with_no_client_auth();

    let quic_client_config = quinn::crypto::rustls::QuicClientConfig::try_from(crypto)
        .map_err(|e| TransportError::Tls(format!("client crypto config error: {e:?}")))?;

    let mut client_config = quinn::ClientConfig::new(Arc::new(quic_client_config));
    client_config.transport_config(Arc::new(config.transport()));
    Ok(client_config)
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

fn tls_error(error: rustls::Error) -> TransportError {
    TransportError::Tls(error.to_string())
}

/// Accepts any end-entity certificate; the learner compares it against the
/// pinned one after the handshake.
#[derive(Debug)]
struct PinnedElsewhere {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for PinnedElsewhere {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
