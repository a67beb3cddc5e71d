//! Envelope orchestration: value → codec → chunked RSA → carrier, and back
//!
//! ```text
//! seal:  value ─encode─▶ bytes ─split+encrypt─▶ [M-byte blocks] ─carrier─▶ String | Vec<u8>
//! open:  String | Vec<u8> ─carrier─▶ [M-byte blocks] ─decrypt+join─▶ bytes ─decode─▶ value
//! ```
//!
//! The key is always injected: nothing here looks keys up. Plaintext buffers
//! are zeroized once the envelope is built or the value is decoded.

use std::io::{Read, Write};

use rsaseal_core::config::EnvelopeConfig;
use rsaseal_core::SealResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use zeroize::Zeroizing;

use crate::chunk::{self, ChunkParams};
use crate::codec::{BincodeCodec, JsonCodec, PayloadCodec};
use crate::keys::{Decrypter, Encrypter};
use crate::{binary, text};

/// Carrier and scheduling knobs shared by all envelope operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeOptions {
    /// Text carrier delimiter (default `,`)
    pub delimiter: char,
    /// Chunk count at which blocks go to the rayon pool (0 = always sequential)
    pub parallel_threshold: usize,
}

impl Default for EnvelopeOptions {
    fn default() -> Self {
        Self {
            delimiter: text::DEFAULT_DELIMITER,
            parallel_threshold: 16,
        }
    }
}

impl From<&EnvelopeConfig> for EnvelopeOptions {
    fn from(config: &EnvelopeConfig) -> Self {
        Self {
            delimiter: config.delimiter,
            parallel_threshold: config.parallel_threshold,
        }
    }
}

impl EnvelopeOptions {
    fn use_parallel(&self, chunks: usize) -> bool {
        self.parallel_threshold > 0 && chunks >= self.parallel_threshold
    }
}

/// Seals and opens values of any serde type with a fixed payload codec.
#[derive(Debug, Clone, Default)]
pub struct Envelope<C = JsonCodec> {
    codec: C,
    options: EnvelopeOptions,
}

impl Envelope<JsonCodec> {
    pub fn json() -> Self {
        Self::new(JsonCodec, EnvelopeOptions::default())
    }
}

impl Envelope<BincodeCodec> {
    pub fn bincode() -> Self {
        Self::new(BincodeCodec, EnvelopeOptions::default())
    }
}

impl<C: PayloadCodec> Envelope<C> {
    pub fn new(codec: C, options: EnvelopeOptions) -> Self {
        Self { codec, options }
    }

    pub fn with_options(mut self, options: EnvelopeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.options.delimiter = delimiter;
        self
    }

    pub fn options(&self) -> &EnvelopeOptions {
        &self.options
    }

    // ── raw payloads ─────────────────────────────────────────────────────

    /// Encrypt an already-serialized payload into ordered ciphertext blocks.
    pub fn seal_payload<K>(&self, payload: &[u8], key: &K) -> SealResult<Vec<Vec<u8>>>
    where
        K: Encrypter + ?Sized,
    {
        let params = ChunkParams::for_modulus(key.modulus_byte_size())?;
        let chunks = params.chunk_count(payload.len());
        tracing::debug!(
            payload_len = payload.len(),
            modulus_len = params.modulus_len(),
            chunk_len = params.plaintext_len(),
            chunks,
            "sealing payload"
        );

        let encrypt = |window: &[u8]| key.encrypt(window);
        if self.options.use_parallel(chunks) {
            chunk::par_split_and_encrypt(payload, params.plaintext_len(), encrypt)
        } else {
            chunk::split_and_encrypt(payload, params.plaintext_len(), encrypt)
        }
    }

    /// Decrypt ordered ciphertext blocks back into the serialized payload.
    pub fn open_payload<K, B>(&self, blocks: &[B], key: &K) -> SealResult<Zeroizing<Vec<u8>>>
    where
        K: Decrypter + ?Sized,
        B: AsRef<[u8]> + Sync,
    {
        let params = ChunkParams::for_modulus(key.modulus_byte_size())?;
        tracing::debug!(
            modulus_len = params.modulus_len(),
            chunks = blocks.len(),
            "opening payload"
        );

        let decrypt = |block: &[u8]| key.decrypt(block);
        let payload = if self.options.use_parallel(blocks.len()) {
            chunk::par_decrypt_and_join(blocks, decrypt)?
        } else {
            chunk::decrypt_and_join(blocks, decrypt)?
        };
        Ok(Zeroizing::new(payload))
    }

    // ── values ───────────────────────────────────────────────────────────

    /// Serialize `value` and encrypt it into ordered ciphertext blocks.
    pub fn seal_blocks<T, K>(&self, value: &T, key: &K) -> SealResult<Vec<Vec<u8>>>
    where
        T: Serialize + ?Sized,
        K: Encrypter + ?Sized,
    {
        let payload = Zeroizing::new(self.codec.encode(value)?);
        self.seal_payload(&payload, key)
    }

    /// Decrypt ordered ciphertext blocks and deserialize the value.
    pub fn open_blocks<T, K, B>(&self, blocks: &[B], key: &K) -> SealResult<T>
    where
        T: DeserializeOwned,
        K: Decrypter + ?Sized,
        B: AsRef<[u8]> + Sync,
    {
        let payload = self.open_payload(blocks, key)?;
        self.codec.decode(&payload)
    }

    // ── text carrier ─────────────────────────────────────────────────────

    pub fn seal_text<T, K>(&self, value: &T, key: &K) -> SealResult<String>
    where
        T: Serialize + ?Sized,
        K: Encrypter + ?Sized,
    {
        let blocks = self.seal_blocks(value, key)?;
        Ok(text::encode_blocks(&blocks, self.options.delimiter))
    }

    pub fn open_text<T, K>(&self, data: &str, key: &K) -> SealResult<T>
    where
        T: DeserializeOwned,
        K: Decrypter + ?Sized,
    {
        let blocks = text::decode_blocks(data, self.options.delimiter)?;
        self.open_blocks(&blocks, key)
    }

    // ── binary carrier ───────────────────────────────────────────────────

    pub fn seal_binary<T, K>(&self, value: &T, key: &K) -> SealResult<Vec<u8>>
    where
        T: Serialize + ?Sized,
        K: Encrypter + ?Sized,
    {
        let blocks = self.seal_blocks(value, key)?;
        Ok(binary::encode_blocks(&blocks))
    }

    /// Seal straight into `writer`. Returns the number of bytes written.
    pub fn write_binary<T, K, W>(&self, value: &T, key: &K, writer: &mut W) -> SealResult<usize>
    where
        T: Serialize + ?Sized,
        K: Encrypter + ?Sized,
        W: Write,
    {
        let blocks = self.seal_blocks(value, key)?;
        binary::write_blocks(&blocks, writer)
    }

    /// Open a binary envelope. A trailing partial block is ignored.
    pub fn open_binary<T, K>(&self, data: &[u8], key: &K) -> SealResult<T>
    where
        T: DeserializeOwned,
        K: Decrypter + ?Sized,
    {
        let blocks = binary::decode_blocks(data, key.modulus_byte_size())?;
        self.open_blocks(&blocks, key)
    }

    /// Open a binary envelope from a stream. A trailing partial block is ignored.
    pub fn read_binary<T, K, R>(&self, reader: &mut R, key: &K) -> SealResult<T>
    where
        T: DeserializeOwned,
        K: Decrypter + ?Sized,
        R: Read,
    {
        let blocks = binary::read_blocks(reader, key.modulus_byte_size())?;
        self.open_blocks(&blocks, key)
    }
}

/// Seal `value` as JSON into a text envelope with the default delimiter.
pub fn to_text_envelope<T, K>(value: &T, key: &K) -> SealResult<String>
where
    T: Serialize + ?Sized,
    K: Encrypter + ?Sized,
{
    Envelope::json().seal_text(value, key)
}

/// Open a JSON text envelope sealed by [`to_text_envelope`].
pub fn from_text_envelope<T, K>(data: &str, key: &K) -> SealResult<T>
where
    T: DeserializeOwned,
    K: Decrypter + ?Sized,
{
    Envelope::json().open_text(data, key)
}

/// Seal `value` with bincode into a binary envelope.
pub fn to_binary_envelope<T, K>(value: &T, key: &K) -> SealResult<Vec<u8>>
where
    T: Serialize + ?Sized,
    K: Encrypter + ?Sized,
{
    Envelope::bincode().seal_binary(value, key)
}

/// Open a bincode binary envelope sealed by [`to_binary_envelope`].
pub fn from_binary_envelope<T, K>(data: &[u8], key: &K) -> SealResult<T>
where
    T: DeserializeOwned,
    K: Decrypter + ?Sized,
{
    Envelope::bincode().open_binary(data, key)
}

/// Envelope methods on every serde type.
///
/// ```ignore
/// let sealed = creds.seal_text(&key)?;
/// let creds = Credentials::open_text(&sealed, &key)?;
/// ```
pub trait Sealable: Serialize + DeserializeOwned {
    fn seal_text<K: Encrypter + ?Sized>(&self, key: &K) -> SealResult<String> {
        to_text_envelope(self, key)
    }

    fn seal_binary<K: Encrypter + ?Sized>(&self, key: &K) -> SealResult<Vec<u8>> {
        to_binary_envelope(self, key)
    }

    fn open_text<K: Decrypter + ?Sized>(data: &str, key: &K) -> SealResult<Self> {
        from_text_envelope(data, key)
    }

    fn open_binary<K: Decrypter + ?Sized>(data: &[u8], key: &K) -> SealResult<Self> {
        from_binary_envelope(data, key)
    }
}

impl<T: Serialize + DeserializeOwned> Sealable for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::test_keys::{rsa_1024, rsa_1024_other, rsa_2048};
    use crate::keys::ModulusSize;
    use rsaseal_core::SealError;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Credentials {
        user: String,
        password: String,
        hosts: Vec<String>,
    }

    fn creds(hosts: usize) -> Credentials {
        Credentials {
            user: "svc-deploy".into(),
            password: "p@ss w0rd, with commas".into(),
            hosts: (0..hosts).map(|i| format!("db-{i}.internal")).collect(),
        }
    }

    /// Key double with a modulus too small for OAEP-SHA256
    struct TinyKey;
    impl ModulusSize for TinyKey {
        fn modulus_byte_size(&self) -> usize {
            64
        }
    }
    impl Encrypter for TinyKey {
        fn encrypt(&self, _window: &[u8]) -> SealResult<Vec<u8>> {
            unreachable!("tiny keys are rejected before encryption")
        }
    }
    impl Decrypter for TinyKey {
        fn decrypt(&self, _block: &[u8]) -> SealResult<Vec<u8>> {
            unreachable!("tiny keys are rejected before decryption")
        }
    }

    #[test]
    fn test_text_roundtrip() {
        let key = rsa_1024();
        let value = creds(12);
        let sealed = to_text_envelope(&value, key).unwrap();
        let opened: Credentials = from_text_envelope(&sealed, key).unwrap();
        assert_eq!(opened, value);
    }

    #[test]
    fn test_binary_roundtrip() {
        let key = rsa_1024();
        let value = creds(12);
        let sealed = to_binary_envelope(&value, key).unwrap();
        assert_eq!(sealed.len() % key.modulus_byte_size(), 0);
        let opened: Credentials = from_binary_envelope(&sealed, key).unwrap();
        assert_eq!(opened, value);
    }

    #[test]
    fn test_sealable_extension() {
        let key = rsa_1024();
        let value = creds(3);
        let text = value.seal_text(key).unwrap();
        assert_eq!(Credentials::open_text(&text, key).unwrap(), value);
        let bin = value.seal_binary(key).unwrap();
        assert_eq!(Credentials::open_binary(&bin, key).unwrap(), value);
    }

    #[test]
    fn test_public_key_seals_private_key_opens() {
        let pair = rsa_1024();
        let public = pair.public_key();
        let sealed = Envelope::json().seal_text(&creds(2), &public).unwrap();
        let opened: Credentials = Envelope::json().open_text(&sealed, pair).unwrap();
        assert_eq!(opened, creds(2));
    }

    #[test]
    fn test_payload_boundaries_both_carriers() {
        let key = rsa_1024();
        let c = ChunkParams::for_modulus(key.modulus_byte_size())
            .unwrap()
            .plaintext_len();
        let env = Envelope::json();

        for len in [0, 1, c - 1, c, c + 1, 2 * c, 3 * c, 3 * c + 5] {
            let payload: Vec<u8> = (0..len).map(|i| (i * 31 % 251) as u8).collect();
            let blocks = env.seal_payload(&payload, key).unwrap();
            assert_eq!(blocks.len(), len.div_ceil(c), "payload of {len} bytes");
            assert!(blocks.iter().all(|b| b.len() == key.modulus_byte_size()));

            let text = text::encode_blocks(&blocks, ',');
            let from_text = env
                .open_payload(&text::decode_blocks(&text, ',').unwrap(), key)
                .unwrap();
            assert_eq!(*from_text, payload);

            let bin = binary::encode_blocks(&blocks);
            let from_bin = env
                .open_payload(&binary::decode_blocks(&bin, key.modulus_byte_size()).unwrap(), key)
                .unwrap();
            assert_eq!(*from_bin, payload);
        }
    }

    #[test]
    fn test_empty_payload_is_empty_envelope() {
        let key = rsa_1024();
        let env = Envelope::json();
        let blocks = env.seal_payload(&[], key).unwrap();
        assert!(blocks.is_empty());
        assert_eq!(text::encode_blocks(&blocks, ','), "");
        assert!(env.open_payload(&text::decode_blocks("", ',').unwrap(), key).unwrap().is_empty());
        assert!(env.open_payload::<_, Vec<u8>>(&[], key).unwrap().is_empty());
    }

    #[test]
    fn test_scenario_2048_bit_key_400_bytes() {
        let key = rsa_2048();
        let params = ChunkParams::for_modulus(key.modulus_byte_size()).unwrap();
        assert_eq!(params.modulus_len(), 256);
        assert_eq!(params.plaintext_len(), 190);

        let payload: Vec<u8> = (0..400u32).map(|i| (i % 256) as u8).collect();
        let mut windows = Vec::new();
        let blocks = chunk::split_and_encrypt(&payload, params.plaintext_len(), |w| {
            windows.push(w.len());
            key.encrypt(w)
        })
        .unwrap();
        assert_eq!(windows, vec![190, 190, 20]);
        assert_eq!(blocks.len(), 3);
        assert!(blocks.iter().all(|b| b.len() == 256));

        let text = text::encode_blocks(&blocks, ',');
        assert_eq!(text.split(',').count(), 3);
        let bin = binary::encode_blocks(&blocks);
        assert_eq!(bin.len(), 768);

        let env = Envelope::json();
        let from_text = env
            .open_payload(&text::decode_blocks(&text, ',').unwrap(), key)
            .unwrap();
        let from_bin = env
            .open_payload(&binary::decode_blocks(&bin, 256).unwrap(), key)
            .unwrap();
        assert_eq!(*from_text, payload);
        assert_eq!(*from_bin, payload);
    }

    #[test]
    fn test_tampered_block_fails_whole_open() {
        let key = rsa_1024();
        let mut blocks = Envelope::json().seal_blocks(&creds(10), key).unwrap();
        assert!(blocks.len() >= 3);
        blocks[1][40] ^= 0x01;

        let result: SealResult<Credentials> = Envelope::json().open_blocks(&blocks, key);
        match result.unwrap_err() {
            SealError::Decryption { index, .. } => assert_eq!(index, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_wrong_key_is_decryption_error() {
        let sealed = to_text_envelope(&creds(1), rsa_1024()).unwrap();
        let err = from_text_envelope::<Credentials, _>(&sealed, rsa_1024_other()).unwrap_err();
        assert!(err.is_decryption());
    }

    #[test]
    fn test_wrong_type_is_deserialization_error() {
        let key = rsa_1024();
        let sealed = to_text_envelope(&"just a string", key).unwrap();
        let err = from_text_envelope::<Credentials, _>(&sealed, key).unwrap_err();
        assert!(matches!(err, SealError::Deserialization(_)));
    }

    #[test]
    fn test_bad_base64_is_encoding_error() {
        let key = rsa_1024();
        let err = from_text_envelope::<Credentials, _>("%%%", key).unwrap_err();
        assert!(matches!(err, SealError::Encoding { index: 0, .. }));
    }

    #[test]
    fn test_tiny_key_fails_fast() {
        let err = to_text_envelope(&creds(1), &TinyKey).unwrap_err();
        assert!(matches!(err, SealError::KeyResolution(_)));
        let err = from_binary_envelope::<Credentials, _>(&[0u8; 64], &TinyKey).unwrap_err();
        assert!(matches!(err, SealError::KeyResolution(_)));
    }

    #[test]
    fn test_custom_delimiter() {
        let key = rsa_1024();
        let env = Envelope::json().with_delimiter(';');
        let sealed = env.seal_text(&creds(8), key).unwrap();
        assert!(!sealed.contains(','));
        assert_eq!(env.open_text::<Credentials, _>(&sealed, key).unwrap(), creds(8));
    }

    #[test]
    fn test_parallel_path_matches_sequential() {
        let key = rsa_1024();
        let value = creds(40);
        let parallel = Envelope::json().with_options(EnvelopeOptions {
            delimiter: ',',
            parallel_threshold: 1,
        });
        let sequential = Envelope::json().with_options(EnvelopeOptions {
            delimiter: ',',
            parallel_threshold: 0,
        });

        let sealed = parallel.seal_text(&value, key).unwrap();
        assert_eq!(sequential.open_text::<Credentials, _>(&sealed, key).unwrap(), value);
        let sealed = sequential.seal_text(&value, key).unwrap();
        assert_eq!(parallel.open_text::<Credentials, _>(&sealed, key).unwrap(), value);
    }

    #[test]
    fn test_stream_roundtrip() {
        let key = rsa_1024();
        let env = Envelope::bincode();
        let mut out = Vec::new();
        let written = env.write_binary(&creds(6), key, &mut out).unwrap();
        assert_eq!(written, out.len());

        let opened: Credentials = env.read_binary(&mut std::io::Cursor::new(out), key).unwrap();
        assert_eq!(opened, creds(6));
    }

    // Known weak point: appending garbage shorter than a block goes unnoticed.
    #[test]
    fn test_binary_trailing_garbage_ignored() {
        let key = rsa_1024();
        let mut sealed = to_binary_envelope(&creds(4), key).unwrap();
        sealed.extend_from_slice(&[0xAB; 17]);
        let opened: Credentials = from_binary_envelope(&sealed, key).unwrap();
        assert_eq!(opened, creds(4));
    }

    #[test]
    fn test_binary_truncated_by_a_block_is_not_a_decryption_error() {
        let key = rsa_1024();
        let mut sealed = to_binary_envelope(&creds(10), key).unwrap();
        let m = key.modulus_byte_size();
        sealed.truncate(sealed.len() - m - 3);

        // Every remaining block decrypts; the loss only shows up when decoding
        let err = from_binary_envelope::<Credentials, _>(&sealed, key).unwrap_err();
        assert!(matches!(err, SealError::Deserialization(_)));
    }

    #[test]
    fn test_options_from_config() {
        let config = EnvelopeConfig {
            delimiter: '|',
            parallel_threshold: 3,
            ..EnvelopeConfig::default()
        };
        let options = EnvelopeOptions::from(&config);
        assert_eq!(options.delimiter, '|');
        assert_eq!(options.parallel_threshold, 3);
        assert!(options.use_parallel(3));
        assert!(!options.use_parallel(2));
        assert!(!EnvelopeOptions { parallel_threshold: 0, ..options }.use_parallel(100));
    }
}
