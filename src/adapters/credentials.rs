use crate::domain::ports::AnyListCredentials;
use crate::utils::error::{AppError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const KEY_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredCredentials {
    email: String,
    /// base64(nonce || ciphertext || tag)
    password: String,
    #[serde(default)]
    anylist_enabled: bool,
}

/// AnyList logins on disk, keyed by the signed-in user's email.
/// Passwords are sealed with AES-256-GCM under a key kept next to the file.
pub struct CredentialVault {
    creds_path: PathBuf,
    key: LessSafeKey,
    rng: SystemRandom,
}

fn vault_error(message: impl Into<String>) -> AppError {
    AppError::CredentialError {
        message: message.into(),
    }
}

impl CredentialVault {
    pub fn open(creds_path: impl Into<PathBuf>, key_path: impl AsRef<Path>) -> Result<Self> {
        let rng = SystemRandom::new();
        let key_bytes = load_or_create_key(key_path.as_ref(), &rng)?;
        let unbound = UnboundKey::new(&AES_256_GCM, &key_bytes)
            .map_err(|_| vault_error("encryption key has the wrong length"))?;

        Ok(Self {
            creds_path: creds_path.into(),
            key: LessSafeKey::new(unbound),
            rng,
        })
    }

    fn load_all(&self) -> BTreeMap<String, StoredCredentials> {
        if !self.creds_path.exists() {
            return BTreeMap::new();
        }
        match fs::read_to_string(&self.creds_path)
            .map_err(AppError::from)
            .and_then(|s| serde_json::from_str(&s).map_err(AppError::from))
        {
            Ok(all) => all,
            Err(e) => {
                tracing::error!("Error loading credentials file: {}", e);
                BTreeMap::new()
            }
        }
    }

    fn store_all(&self, all: &BTreeMap<String, StoredCredentials>) -> Result<()> {
        if let Some(parent) = self.creds_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.creds_path, serde_json::to_string_pretty(all)?)?;
        Ok(())
    }

    fn seal(&self, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| vault_error("could not generate nonce"))?;

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| vault_error("encryption failed"))?;

        let mut sealed = nonce_bytes.to_vec();
        sealed.extend_from_slice(&in_out);
        Ok(STANDARD.encode(sealed))
    }

    fn open_sealed(&self, encoded: &str) -> Result<String> {
        let sealed = STANDARD
            .decode(encoded)
            .map_err(|e| vault_error(format!("stored password is not base64: {}", e)))?;
        if sealed.len() < NONCE_LEN {
            return Err(vault_error("stored password is truncated"));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| vault_error("stored nonce is invalid"))?;
        let mut in_out = ciphertext.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| vault_error("stored password could not be decrypted"))?;

        String::from_utf8(plaintext.to_vec()).map_err(|e| vault_error(e.to_string()))
    }

    pub fn save(&self, user: &str, credentials: &AnyListCredentials) -> Result<()> {
        let mut all = self.load_all();
        all.insert(
            user.to_string(),
            StoredCredentials {
                email: credentials.email.clone(),
                password: self.seal(&credentials.password)?,
                anylist_enabled: true,
            },
        );
        self.store_all(&all)?;
        tracing::info!("Saved AnyList credentials for user: {}", user);
        Ok(())
    }

    pub fn get(&self, user: &str) -> Result<Option<AnyListCredentials>> {
        let all = self.load_all();
        let Some(stored) = all.get(user) else {
            return Ok(None);
        };
        Ok(Some(AnyListCredentials {
            email: stored.email.clone(),
            password: self.open_sealed(&stored.password)?,
        }))
    }

    /// Returns whether anything was removed.
    pub fn remove(&self, user: &str) -> Result<bool> {
        let mut all = self.load_all();
        if all.remove(user).is_none() {
            return Ok(false);
        }
        self.store_all(&all)?;
        tracing::info!("Removed AnyList credentials for user: {}", user);
        Ok(true)
    }

    pub fn has(&self, user: &str) -> bool {
        self.load_all().contains_key(user)
    }

    pub fn is_enabled(&self, user: &str) -> bool {
        self.load_all()
            .get(user)
            .map(|c| c.anylist_enabled)
            .unwrap_or(false)
    }
}

fn load_or_create_key(path: &Path, rng: &SystemRandom) -> Result<Vec<u8>> {
    if path.exists() {
        let encoded = fs::read_to_string(path)?;
        let key = STANDARD
            .decode(encoded.trim())
            .map_err(|e| vault_error(format!("key file is not base64: {}", e)))?;
        if key.len() != KEY_LEN {
            return Err(vault_error("key file has the wrong length"));
        }
        return Ok(key);
    }

    let mut key = vec![0u8; KEY_LEN];
    rng.fill(&mut key)
        .map_err(|_| vault_error("could not generate encryption key"))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, STANDARD.encode(&key))?;
    restrict_permissions(path)?;
    tracing::info!("Generated new credential key at {}", path.display());
    Ok(key)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn creds() -> AnyListCredentials {
        AnyListCredentials {
            email: "cook@example.com".to_string(),
            password: "hunter2".to_string(),
        }
    }

    #[test]
    fn test_save_and_get_round_trip() {
        let dir = TempDir::new().unwrap();
        let vault = CredentialVault::open(
            dir.path().join("anylist_creds.json"),
            dir.path().join(".encryption_key"),
        )
        .unwrap();

        vault.save("user@example.com", &creds()).unwrap();

        assert!(vault.has("user@example.com"));
        assert!(vault.is_enabled("user@example.com"));
        assert_eq!(vault.get("user@example.com").unwrap(), Some(creds()));
        assert_eq!(vault.get("other@example.com").unwrap(), None);
    }

    #[test]
    fn test_password_is_not_stored_in_plaintext() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("anylist_creds.json");
        let vault = CredentialVault::open(&path, dir.path().join(".encryption_key")).unwrap();
        vault.save("user@example.com", &creds()).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("cook@example.com"));
        assert!(!raw.contains("hunter2"));
    }

    #[test]
    fn test_key_is_reused_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("anylist_creds.json");
        let key = dir.path().join(".encryption_key");

        CredentialVault::open(&path, &key)
            .unwrap()
            .save("user@example.com", &creds())
            .unwrap();
        let reopened = CredentialVault::open(&path, &key).unwrap();

        assert_eq!(reopened.get("user@example.com").unwrap(), Some(creds()));
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let key = dir.path().join("data").join(".encryption_key");
        CredentialVault::open(dir.path().join("creds.json"), &key).unwrap();

        let mode = fs::metadata(&key).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let vault = CredentialVault::open(
            dir.path().join("creds.json"),
            dir.path().join(".encryption_key"),
        )
        .unwrap();
        vault.save("user@example.com", &creds()).unwrap();

        assert!(vault.remove("user@example.com").unwrap());
        assert!(!vault.remove("user@example.com").unwrap());
        assert!(!vault.has("user@example.com"));
        assert!(!vault.is_enabled("user@example.com"));
    }
}
