//! Key discovery chain
//!
//! Lookup order for a query (first match wins):
//!   1. $RSASEAL_KEY_FILE      (explicit PEM file, name queries only)
//!   2. user key directory      (config keys.user_dir, ~/.config/rsaseal/keys)
//!   3. system key directory    (config keys.system_dir, /etc/rsaseal/keys)
//!
//! Within a directory a name resolves to `<name>.pem`, then `<name>.pub.pem`.
//! Fingerprint queries scan every `*.pem` file instead.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rsaseal_core::config::{expand_tilde, KeysConfig};
use rsaseal_core::{SealError, SealResult};
use rsaseal_crypto::{KeyMaterial, ModulusSize};
use secrecy::SecretString;

/// Environment variable naming an explicit key file
pub const KEY_FILE_ENV: &str = "RSASEAL_KEY_FILE";

/// Shortest fingerprint prefix accepted in a query
pub const MIN_FINGERPRINT_PREFIX: usize = 8;

/// How a caller identifies a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyQuery {
    /// Logical name: `<name>.pem` / `<name>.pub.pem` in the key directories
    Name(String),
    /// SHA-256 SPKI fingerprint (lowercase hex, full or unique prefix)
    Fingerprint(String),
    /// A PEM file, bypassing the discovery chain
    Path(PathBuf),
}

impl FromStr for KeyQuery {
    type Err = SealError;

    /// `sha256:<hex>` is a fingerprint, anything containing a path separator
    /// or ending in `.pem` is a path, everything else is a name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SealError::key("empty key query"));
        }
        if let Some(hex) = s.strip_prefix("sha256:") {
            let hex = hex.to_ascii_lowercase();
            if hex.len() < MIN_FINGERPRINT_PREFIX || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(SealError::key(format!(
                    "fingerprint must be at least {MIN_FINGERPRINT_PREFIX} hex digits: {s}"
                )));
            }
            return Ok(KeyQuery::Fingerprint(hex));
        }
        if s.contains(std::path::MAIN_SEPARATOR) || s.contains('/') || s.ends_with(".pem") {
            return Ok(KeyQuery::Path(PathBuf::from(s)));
        }
        Ok(KeyQuery::Name(s.to_string()))
    }
}

impl fmt::Display for KeyQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyQuery::Name(name) => write!(f, "{name}"),
            KeyQuery::Fingerprint(hex) => write!(f, "sha256:{hex}"),
            KeyQuery::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A key found by the store, with where it came from.
#[derive(Debug)]
pub struct LoadedKey {
    pub material: KeyMaterial,
    pub path: PathBuf,
    /// Chain step that produced the key, e.g. `user:/home/me/.config/rsaseal/keys/db.pem`
    pub source: String,
}

/// Summary of one key file, for listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    pub name: String,
    pub fingerprint: String,
    pub bits: usize,
    pub has_private: bool,
    pub source: String,
}

/// File-backed key store. Reads PEM files on every lookup; keeps no state.
pub struct KeyStore {
    key_file: Option<PathBuf>,
    user_dir: PathBuf,
    system_dir: PathBuf,
    passphrase: Option<SecretString>,
}

impl KeyStore {
    pub fn new(user_dir: impl Into<PathBuf>, system_dir: impl Into<PathBuf>) -> Self {
        Self {
            key_file: None,
            user_dir: user_dir.into(),
            system_dir: system_dir.into(),
            passphrase: None,
        }
    }

    /// Store over the configured directories, honoring `$RSASEAL_KEY_FILE`.
    pub fn from_config(config: &KeysConfig) -> Self {
        let mut store = Self::new(expand_tilde(&config.user_dir), expand_tilde(&config.system_dir));
        if let Ok(path) = std::env::var(KEY_FILE_ENV) {
            if !path.is_empty() {
                store.key_file = Some(PathBuf::from(path));
            }
        }
        store
    }

    pub fn with_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_file = Some(path.into());
        self
    }

    /// Passphrase for `ENCRYPTED PRIVATE KEY` files.
    pub fn with_passphrase(mut self, passphrase: SecretString) -> Self {
        self.passphrase = Some(passphrase);
        self
    }

    /// Find a key for sealing. Public-only keys qualify.
    pub fn find(&self, query: &KeyQuery) -> SealResult<LoadedKey> {
        self.resolve(query, false)
    }

    /// Find a key for opening. Only keys with a private half qualify.
    pub fn find_private(&self, query: &KeyQuery) -> SealResult<LoadedKey> {
        self.resolve(query, true)
    }

    /// Every readable key in the key directories, user directory first.
    pub fn list(&self) -> SealResult<Vec<KeyEntry>> {
        let mut entries = Vec::new();
        for (label, dir) in self.dirs() {
            for path in pem_files(dir)? {
                let Some(material) = self.try_load(&path) else {
                    continue;
                };
                entries.push(KeyEntry {
                    name: key_name(&path),
                    fingerprint: material.fingerprint()?,
                    bits: material.modulus_byte_size() * 8,
                    has_private: material.has_private(),
                    source: format!("{label}:{}", path.display()),
                });
            }
        }
        Ok(entries)
    }

    fn resolve(&self, query: &KeyQuery, want_private: bool) -> SealResult<LoadedKey> {
        let found = match query {
            KeyQuery::Path(path) => {
                let material = self.load(path)?;
                LoadedKey {
                    material,
                    path: path.clone(),
                    source: format!("path:{}", path.display()),
                }
            }
            KeyQuery::Name(name) => self.find_by_name(name, want_private)?,
            KeyQuery::Fingerprint(hex) => self.find_by_fingerprint(hex, want_private)?,
        };

        if want_private && !found.material.has_private() {
            return Err(SealError::key(format!(
                "key '{query}' resolved to {} which holds only a public key",
                found.source
            )));
        }

        tracing::debug!(query = %query, source = %found.source, "resolved key");
        Ok(found)
    }

    fn find_by_name(&self, name: &str, want_private: bool) -> SealResult<LoadedKey> {
        let mut public_only: Option<LoadedKey> = None;

        let mut candidates: Vec<(String, PathBuf)> = Vec::new();
        if let Some(file) = &self.key_file {
            candidates.push((KEY_FILE_ENV.to_string(), file.clone()));
        }
        for (label, dir) in self.dirs() {
            candidates.push((label.to_string(), dir.join(format!("{name}.pem"))));
            candidates.push((label.to_string(), dir.join(format!("{name}.pub.pem"))));
        }

        // First load failure, reported if no other candidate qualifies
        let mut load_error: Option<SealError> = None;

        for (label, path) in candidates {
            if !path.is_file() {
                continue;
            }
            let material = match self.load(&path) {
                Ok(material) => material,
                Err(e) => {
                    tracing::debug!(path = %path.display(), "skipping key file: {e}");
                    load_error.get_or_insert(e);
                    continue;
                }
            };
            let loaded = LoadedKey {
                material,
                source: format!("{label}:{}", path.display()),
                path,
            };
            if !want_private || loaded.material.has_private() {
                return Ok(loaded);
            }
            public_only.get_or_insert(loaded);
        }

        if let Some(e) = load_error {
            return Err(e);
        }
        // Let `resolve` report the public-only match precisely
        public_only.ok_or_else(|| self.not_found(&format!("key named '{name}'")))
    }

    fn find_by_fingerprint(&self, prefix: &str, want_private: bool) -> SealResult<LoadedKey> {
        let mut matches: Vec<(String, LoadedKey)> = Vec::new();
        for (label, dir) in self.dirs() {
            for path in pem_files(dir)? {
                let Some(material) = self.try_load(&path) else {
                    continue;
                };
                let fingerprint = material.fingerprint()?;
                if fingerprint.starts_with(prefix) {
                    matches.push((
                        fingerprint,
                        LoadedKey {
                            material,
                            source: format!("{label}:{}", path.display()),
                            path,
                        },
                    ));
                }
            }
        }

        let first = matches
            .first()
            .map(|(fp, _)| fp.clone())
            .ok_or_else(|| self.not_found(&format!("key with fingerprint sha256:{prefix}")))?;
        if matches.iter().any(|(fp, _)| *fp != first) {
            return Err(SealError::key(format!(
                "fingerprint prefix sha256:{prefix} is ambiguous; give more digits"
            )));
        }

        let index = if want_private {
            matches
                .iter()
                .position(|(_, k)| k.material.has_private())
                .unwrap_or(0)
        } else {
            0
        };
        Ok(matches.swap_remove(index).1)
    }

    fn dirs(&self) -> [(&'static str, &Path); 2] {
        [
            ("user", self.user_dir.as_path()),
            ("system", self.system_dir.as_path()),
        ]
    }

    fn load(&self, path: &Path) -> SealResult<KeyMaterial> {
        let pem = std::fs::read_to_string(path)
            .map_err(|e| SealError::key(format!("reading key file {}: {e}", path.display())))?;
        KeyMaterial::from_pem(&pem, self.passphrase.as_ref()).map_err(|e| match e {
            SealError::KeyResolution(reason) => {
                SealError::key(format!("{}: {reason}", path.display()))
            }
            other => other,
        })
    }

    /// Load for scanning: unreadable files are skipped, not fatal.
    fn try_load(&self, path: &Path) -> Option<KeyMaterial> {
        match self.load(path) {
            Ok(material) => Some(material),
            Err(e) => {
                tracing::debug!(path = %path.display(), "skipping key file: {e}");
                None
            }
        }
    }

    fn not_found(&self, what: &str) -> SealError {
        SealError::key(format!(
            "no {what} found. Tried: ${KEY_FILE_ENV}, {}, {}",
            self.user_dir.display(),
            self.system_dir.display()
        ))
    }
}

/// `*.pem` files in `dir`, sorted. A missing directory has no files.
fn pem_files(dir: &Path) -> SealResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "pem"))
        .collect();
    files.sort();
    Ok(files)
}

/// `db.pem` and `db.pub.pem` are both named `db`.
fn key_name(path: &Path) -> String {
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    file.strip_suffix(".pub.pem")
        .or_else(|| file.strip_suffix(".pem"))
        .unwrap_or(&file)
        .to_string()
}
