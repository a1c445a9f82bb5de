//! On-disk TLS material.
//!
//! The certificate is what peers pin, so it must survive restarts: a worker
//! that regenerates it will be rejected as a trust conflict by every peer
//! that already knows it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use fleet_discovery::{NodeTlsMaterial, TransportError};
use tracing::info;

const CERTIFICATE_FILE: &str = "certificate.der";
const PRIVATE_KEY_FILE: &str = "private_key.der";

/// TLS material kept under one directory.
#[derive(Debug, Clone)]
pub struct TlsMaterialStore {
    dir: PathBuf,
}

impl TlsMaterialStore {
    /// Store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load the stored material, or generate and store new material for `host`.
    pub fn load_or_generate(&self, host: &str) -> Result<NodeTlsMaterial, TransportError> {
        if let Some(material) = self.load().map_err(io_error)? {
            info!(dir = %self.dir.display(), "Loaded TLS certificate");
            return Ok(material);
        }
        let material = NodeTlsMaterial::generate(host)?;
        self.save(&material).map_err(io_error)?;
        info!(
            dir = %self.dir.display(),
            fingerprint = %hex::encode(material.fingerprint()),
            "Generated TLS certificate"
        );
        Ok(material)
    }

    /// Stored material, if both files exist.
    pub fn load(&self) -> io::Result<Option<NodeTlsMaterial>> {
        let certificate = read_optional(&self.dir.join(CERTIFICATE_FILE))?;
        let private_key = read_optional(&self.dir.join(PRIVATE_KEY_FILE))?;
        Ok(match (certificate, private_key) {
            (Some(certificate), Some(private_key)) => {
                Some(NodeTlsMaterial::from_der(certificate, private_key))
            }
            _ => None,
        })
    }

    /// Write `material`, replacing any previous files.
    pub fn save(&self, material: &NodeTlsMaterial) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(PRIVATE_KEY_FILE), material.private_key_der())?;
        fs::write(self.dir.join(CERTIFICATE_FILE), material.certificate_der())
    }
}

fn read_optional(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(error),
    }
}

fn io_error(error: io::Error) -> TransportError {
    TransportError::Tls(format!("TLS material: {error}"))
}
