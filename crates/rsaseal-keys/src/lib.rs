//! rsaseal-keys: locate RSA keys for sealing and opening envelopes
//!
//! Key discovery chain (in order of precedence):
//!   1. $RSASEAL_KEY_FILE            (explicit PEM file)
//!   2. ~/.config/rsaseal/keys        (keys.user_dir)
//!   3. /etc/rsaseal/keys             (keys.system_dir)
//!
//! Sealing accepts public keys; opening insists on a private one and keeps
//! walking the chain past public-only matches.

pub mod store;

pub use store::{KeyEntry, KeyQuery, KeyStore, LoadedKey, KEY_FILE_ENV};
