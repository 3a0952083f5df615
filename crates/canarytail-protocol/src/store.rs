//! Local key and canary archive.
//!
//! Layout under the store root, one directory per domain:
//!
//! ```text
//! <root>/<domain>/public.b64
//! <root>/<domain>/private.b64
//! <root>/<domain>/panic-public.b64
//! <root>/<domain>/panic-private.b64
//! <root>/<domain>/canary.<domain>.<unix-millis>.json
//! <root>/<domain>/canary.<domain>.latest.json
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ed25519_dalek::{SigningKey, VerifyingKey};

use crate::canary::Canary;
use crate::constants::{CANARY_HOME_DIR, CANARY_HOME_ENV};
use crate::crypto::{format_private_key, format_public_key, generate_keypair, parse_private_key, parse_public_key};
use crate::error::CanaryError;

pub const PUBLIC_KEY_FILE: &str = "public.b64";
pub const PRIVATE_KEY_FILE: &str = "private.b64";
pub const PANIC_PUBLIC_KEY_FILE: &str = "panic-public.b64";
pub const PANIC_PRIVATE_KEY_FILE: &str = "panic-private.b64";

#[derive(Debug, Clone)]
pub struct KeyStore {
    root: PathBuf,
}

impl KeyStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$CANARY_HOME`, else `~/.canarytail`.
    pub fn from_env() -> Result<Self, CanaryError> {
        if let Some(dir) = std::env::var_os(CANARY_HOME_ENV).filter(|d| !d.is_empty()) {
            return Ok(Self::new(dir));
        }
        let home = dirs::home_dir().ok_or_else(|| CanaryError::Storage("no home directory".into()))?;
        Ok(Self::new(home.join(CANARY_HOME_DIR)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn domain_dir(&self, domain: &str) -> Result<PathBuf, CanaryError> {
        check_domain(domain)?;
        Ok(self.root.join(domain))
    }

    /// Create the root and the domain directory (mode 0700) if missing.
    pub fn ensure_domain_dir(&self, domain: &str) -> Result<PathBuf, CanaryError> {
        let dir = self.domain_dir(domain)?;
        for d in [self.root.as_path(), dir.as_path()] {
            if !d.exists() {
                std::fs::create_dir_all(d).map_err(|e| io_error("create dir", d, e))?;
                set_mode(d, 0o700)?;
            }
        }
        Ok(dir)
    }

    /// Generate the signing and panic key pairs for `domain`.
    ///
    /// Refuses to overwrite existing keys. Returns `(signing, panic)`.
    pub fn generate(&self, domain: &str) -> Result<(SigningKey, SigningKey), CanaryError> {
        let dir = self.ensure_domain_dir(domain)?;
        if dir.join(PUBLIC_KEY_FILE).exists() || dir.join(PANIC_PUBLIC_KEY_FILE).exists() {
            return Err(CanaryError::Storage(format!("keys already exist for {domain}")));
        }

        let signing = generate_keypair();
        let panic = generate_keypair();
        write_private(&dir.join(PUBLIC_KEY_FILE), &format_public_key(&signing.verifying_key()))?;
        write_private(&dir.join(PRIVATE_KEY_FILE), &format_private_key(&signing))?;
        write_private(&dir.join(PANIC_PUBLIC_KEY_FILE), &format_public_key(&panic.verifying_key()))?;
        write_private(&dir.join(PANIC_PRIVATE_KEY_FILE), &format_private_key(&panic))?;

        tracing::info!(domain, dir = %dir.display(), "Generated signing and panic key pairs");
        Ok((signing, panic))
    }

    pub fn read_public_key(&self, domain: &str) -> Result<VerifyingKey, CanaryError> {
        parse_public_key(&read_file(&self.domain_dir(domain)?.join(PUBLIC_KEY_FILE))?)
    }

    pub fn read_keypair(&self, domain: &str) -> Result<SigningKey, CanaryError> {
        let dir = self.domain_dir(domain)?;
        read_pair(&dir.join(PUBLIC_KEY_FILE), &dir.join(PRIVATE_KEY_FILE))
    }

    pub fn read_panic_keypair(&self, domain: &str) -> Result<SigningKey, CanaryError> {
        let dir = self.domain_dir(domain)?;
        read_pair(&dir.join(PANIC_PUBLIC_KEY_FILE), &dir.join(PANIC_PRIVATE_KEY_FILE))
    }

    /// Write the canary as both a timestamped issue and the domain's latest.
    /// Returns the timestamped path.
    pub fn store_canary(&self, canary: &Canary, issued_at: DateTime<Utc>) -> Result<PathBuf, CanaryError> {
        let domain = &canary.claim.domain;
        let dir = self.ensure_domain_dir(domain)?;
        let json = canary.to_json()?;

        let path = dir.join(canary_file_name(domain, issued_at));
        write_private(&path, &json)?;
        write_private(&dir.join(latest_file_name(domain)), &json)?;
        tracing::info!(domain = %domain, path = %path.display(), "Stored canary");
        Ok(path)
    }

    /// The most recently issued canary for `domain`.
    pub fn latest_canary(&self, domain: &str) -> Result<Canary, CanaryError> {
        let dir = self.domain_dir(domain)?;
        if !dir.is_dir() {
            return Err(CanaryError::CanaryNotFound);
        }
        let path = latest_canary_file(&dir)?;
        let bytes = std::fs::read(&path).map_err(|e| io_error("read", &path, e))?;
        Canary::from_json(&bytes)
    }
}

/// `canary.<domain>.<unix-millis>.json`
pub fn canary_file_name(domain: &str, t: DateTime<Utc>) -> String {
    format!("canary.{domain}.{}.json", t.timestamp_millis())
}

/// `canary.<domain>.latest.json`
pub fn latest_file_name(domain: &str) -> String {
    format!("canary.{domain}.latest.json")
}

/// Timestamp of a `canary.<domain>.<millis>.json` file name, if it is one.
fn issue_timestamp(name: &str) -> Option<i64> {
    let middle = name.strip_prefix("canary.")?.strip_suffix(".json")?;
    let (domain, ts) = middle.rsplit_once('.')?;
    if domain.is_empty() || ts.is_empty() || !ts.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    ts.parse().ok()
}

/// Newest timestamped canary file in `dir`. `CanaryNotFound` if there is none.
pub fn latest_canary_file(dir: &Path) -> Result<PathBuf, CanaryError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_error("read dir", dir, e))?;
    let mut newest: Option<(i64, PathBuf)> = None;
    for entry in entries {
        let entry = entry.map_err(|e| io_error("read dir", dir, e))?;
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(true) {
            continue;
        }
        let name = entry.file_name();
        let Some(ts) = name.to_str().and_then(issue_timestamp) else {
            continue;
        };
        if newest.as_ref().map_or(true, |(best, _)| ts > *best) {
            newest = Some((ts, entry.path()));
        }
    }
    newest.map(|(_, p)| p).ok_or(CanaryError::CanaryNotFound)
}

fn check_domain(domain: &str) -> Result<(), CanaryError> {
    if domain.is_empty() || domain == "." || domain.contains("..") || domain.contains(['/', '\\']) {
        return Err(CanaryError::Storage(format!("unusable domain name '{domain}'")));
    }
    Ok(())
}

fn read_file(path: &Path) -> Result<String, CanaryError> {
    std::fs::read_to_string(path).map_err(|e| io_error("read", path, e))
}

/// Read a key pair and check the private half matches the stored public key.
fn read_pair(public: &Path, private: &Path) -> Result<SigningKey, CanaryError> {
    let public_key = parse_public_key(&read_file(public)?)?;
    let encoded = zeroize::Zeroizing::new(read_file(private)?);
    let signing = parse_private_key(&encoded)?;
    if signing.verifying_key() != public_key {
        return Err(CanaryError::Decode(format!(
            "{} does not match {}",
            private.display(),
            public.display()
        )));
    }
    Ok(signing)
}

fn write_private(path: &Path, contents: &str) -> Result<(), CanaryError> {
    std::fs::write(path, contents).map_err(|e| io_error("write", path, e))?;
    set_mode(path, 0o600)
}

fn set_mode(path: &Path, mode: u32) -> Result<(), CanaryError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .map_err(|e| io_error("set permissions", path, e))?;
    }
    #[cfg(not(unix))]
    let _ = (path, mode);
    Ok(())
}

fn io_error(op: &str, path: &Path, err: std::io::Error) -> CanaryError {
    CanaryError::Storage(format!("{op} {}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_canary_file_name() {
        let t = Utc.timestamp_opt(100_000, 0).unwrap();
        assert_eq!(canary_file_name("mydomain.com", t), "canary.mydomain.com.100000000.json");
        let t = Utc.timestamp_opt(12_345, 678_900_000).unwrap();
        assert_eq!(canary_file_name("mydomain.com", t), "canary.mydomain.com.12345678.json");
        assert_eq!(latest_file_name("mydomain.com"), "canary.mydomain.com.latest.json");
    }

    #[test]
    fn test_issue_timestamp() {
        assert_eq!(issue_timestamp("canary.a.b.com.42.json"), Some(42));
        assert_eq!(issue_timestamp("canary.a.com.latest.json"), None);
        assert_eq!(issue_timestamp("canary.42.json"), None);
        assert_eq!(issue_timestamp("temp1.json"), None);
    }

    #[test]
    fn test_latest_canary_file_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("temp1.json"), [1u8]).unwrap();
        std::fs::write(dir.path().join("temp2.json"), [1u8]).unwrap();
        assert_eq!(latest_canary_file(dir.path()), Err(CanaryError::CanaryNotFound));
    }

    #[test]
    fn test_latest_canary_file_among_noise() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("temp1.json"), [1u8]).unwrap();
        std::fs::write(dir.path().join(latest_file_name("canarytail.org")), [1u8]).unwrap();
        for secs in [1_000, 9_000, 3_000, 5_000] {
            let name = canary_file_name("canarytail.org", Utc.timestamp_opt(secs, 0).unwrap());
            std::fs::write(dir.path().join(name), [1u8]).unwrap();
        }
        let expected = dir.path().join(canary_file_name("canarytail.org", Utc.timestamp_opt(9_000, 0).unwrap()));
        assert_eq!(latest_canary_file(dir.path()).unwrap(), expected);
    }

    #[test]
    fn test_rejects_path_like_domains() {
        let store = KeyStore::new("/tmp/unused");
        assert!(store.domain_dir("../etc").is_err());
        assert!(store.domain_dir("a/b").is_err());
        assert!(store.domain_dir("").is_err());
        assert!(store.domain_dir("example.com").is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_generated_key_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(dir.path().join("home"));
        store.generate("example.com").unwrap();
        let domain_dir = store.domain_dir("example.com").unwrap();

        let mode = std::fs::metadata(&domain_dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
        for file in [PUBLIC_KEY_FILE, PRIVATE_KEY_FILE, PANIC_PUBLIC_KEY_FILE, PANIC_PRIVATE_KEY_FILE] {
            let mode = std::fs::metadata(domain_dir.join(file)).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600, "{file}");
        }
    }
}
