// src/signing.rs

//! Repository signing
//!
//! Manifest files written to the repository can carry a detached Ed25519
//! signature so clients can verify them. The core only depends on the
//! [`PrivateKeyProvider`] interface; when no provider is configured, files
//! are written unsigned.
//!
//! The key file is TOML with an `algorithm` tag and the base64-encoded
//! 32-byte seed. The seed is stored unencrypted; the file is created with
//! mode 0o600.

use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signer as _, SigningKey};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Supplies the private key used to sign repository manifests.
pub trait PrivateKeyProvider {
    fn private_key_file(&self) -> &Path;
    fn passphrase(&self) -> Option<&str>;
}

/// Provider backed by a key file and an optional passphrase file content.
#[derive(Debug, Clone)]
pub struct KeyFileProvider {
    key_file: PathBuf,
    passphrase: Option<String>,
}

impl KeyFileProvider {
    pub fn new(key_file: PathBuf, passphrase: Option<String>) -> Self {
        KeyFileProvider {
            key_file,
            passphrase,
        }
    }
}

impl PrivateKeyProvider for KeyFileProvider {
    fn private_key_file(&self) -> &Path {
        &self.key_file
    }

    fn passphrase(&self) -> Option<&str> {
        self.passphrase.as_deref()
    }
}

/// Key file format.
#[derive(Debug, Serialize, Deserialize)]
struct KeyFile {
    algorithm: String,
    key: String,
}

/// Signs manifest bytes with Ed25519.
pub struct Signer {
    signing_key: SigningKey,
}

impl Signer {
    /// Load the signing key named by a provider.
    pub fn from_provider(provider: &dyn PrivateKeyProvider) -> Result<Self> {
        let path = provider.private_key_file();
        let content = fs::read_to_string(path)?;
        let key_file: KeyFile = toml::from_str(&content)
            .map_err(|e| Error::config(format!("bad key file {}: {}", path.display(), e)))?;
        if key_file.algorithm != "ed25519" {
            return Err(Error::config(format!(
                "unsupported key algorithm: {}",
                key_file.algorithm
            )));
        }
        let seed = BASE64
            .decode(&key_file.key)
            .map_err(|e| Error::config(format!("bad key file {}: {}", path.display(), e)))?;
        let seed: [u8; 32] = seed
            .try_into()
            .map_err(|_| Error::config(format!("bad key length in {}", path.display())))?;
        Ok(Signer {
            signing_key: SigningKey::from_bytes(&seed),
        })
    }

    /// Generate a fresh random key. Used by tests and key provisioning.
    pub fn generate() -> Self {
        Signer {
            signing_key: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    /// The base64 public key, for distribution to clients.
    pub fn public_key_base64(&self) -> String {
        BASE64.encode(self.signing_key.verifying_key().as_bytes())
    }

    /// Save the private key to a key file with restrictive permissions.
    pub fn save(&self, path: &Path) -> Result<()> {
        let key_file = KeyFile {
            algorithm: "ed25519".to_string(),
            key: BASE64.encode(self.signing_key.to_bytes()),
        };
        let text = toml::to_string_pretty(&key_file)
            .map_err(|e| Error::config(format!("cannot serialize key file: {}", e)))?;
        fs::write(path, text)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms)?;
        }
        Ok(())
    }

    /// The signature comment line appended to signed INI files.
    pub fn signature_line(&self, content: &[u8]) -> String {
        let signature = self.signing_key.sign(content);
        format!(";;;ed25519:{}", BASE64.encode(signature.to_bytes()))
    }
}
