//! Integration tests for sealing and opening values through both carriers.
//!
//! Uses PEM-loaded keys, as a caller of the public API would, and checks the
//! round-trip law across chunk boundaries plus the failure taxonomy.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use proptest::prelude::*;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsaseal_crypto::{
    binary, text, ChunkParams, Envelope, KeyMaterial, ModulusSize, RsaKeyPair, SealError,
    Sealable,
};
use serde::{Deserialize, Serialize};

struct TestKeys {
    private_pem: String,
    public_pem: String,
}

fn keys() -> &'static TestKeys {
    static KEYS: OnceLock<TestKeys> = OnceLock::new();
    KEYS.get_or_init(|| {
        let private = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 1024).expect("keygen");
        TestKeys {
            private_pem: private.to_pkcs8_pem(LineEnding::LF).unwrap().to_string(),
            public_pem: private
                .to_public_key()
                .to_public_key_pem(LineEnding::LF)
                .unwrap(),
        }
    })
}

fn private_key() -> KeyMaterial {
    KeyMaterial::from_pem(&keys().private_pem, None).unwrap()
}

fn public_key() -> KeyMaterial {
    KeyMaterial::from_pem(&keys().public_pem, None).unwrap()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ServiceSecrets {
    name: String,
    api_token: String,
    env: BTreeMap<String, String>,
}

fn secrets(vars: usize) -> ServiceSecrets {
    ServiceSecrets {
        name: "billing".into(),
        api_token: "tok_live_0123456789abcdef".into(),
        env: (0..vars)
            .map(|i| (format!("VAR_{i}"), format!("value-{i}-{}", "x".repeat(i % 7))))
            .collect(),
    }
}

#[test]
fn public_pem_seals_private_pem_opens_text() {
    let sealed = Envelope::json()
        .seal_text(&secrets(20), public_key().encrypter())
        .unwrap();
    assert!(!sealed.is_empty());

    let private = private_key();
    let opened: ServiceSecrets = Envelope::json()
        .open_text(&sealed, private.decrypter().unwrap())
        .unwrap();
    assert_eq!(opened, secrets(20));
}

#[test]
fn public_pem_seals_private_pem_opens_binary() {
    let sealed = Envelope::bincode()
        .seal_binary(&secrets(20), public_key().encrypter())
        .unwrap();
    assert_eq!(sealed.len() % 128, 0);

    let private = private_key();
    let opened: ServiceSecrets = Envelope::bincode()
        .open_binary(&sealed, private.decrypter().unwrap())
        .unwrap();
    assert_eq!(opened, secrets(20));
}

#[test]
fn public_only_key_cannot_open() {
    let public = public_key();
    assert!(matches!(public.decrypter(), Err(SealError::KeyResolution(_))));
}

#[test]
fn sealable_methods_on_plain_types() {
    let pair = RsaKeyPair::from_pem(&keys().private_pem).unwrap();
    let value: Vec<String> = vec!["alpha".into(), "beta,gamma".into()];

    let text = value.seal_text(&pair).unwrap();
    assert_eq!(Vec::<String>::open_text(&text, &pair).unwrap(), value);

    let bin = value.seal_binary(&pair).unwrap();
    assert_eq!(Vec::<String>::open_binary(&bin, &pair).unwrap(), value);
}

#[test]
fn text_chunk_count_tracks_payload_size() {
    let private = private_key();
    let params = ChunkParams::for_modulus(private.modulus_byte_size()).unwrap();
    let env = Envelope::json();

    for vars in [0, 1, 5, 25] {
        let value = secrets(vars);
        let payload_len = serde_json::to_vec(&value).unwrap().len();
        let sealed = env.seal_text(&value, private.encrypter()).unwrap();
        let tokens = text::decode_blocks(&sealed, ',').unwrap();
        assert_eq!(tokens.len(), params.chunk_count(payload_len));
        assert!(tokens.iter().all(|t| t.len() == params.modulus_len()));
    }
}

#[test]
fn flipping_any_block_byte_is_detected() {
    let private = private_key();
    let env = Envelope::bincode();
    let sealed = env.seal_binary(&secrets(10), private.encrypter()).unwrap();
    let m = private.modulus_byte_size();

    for offset in [0, m / 2, m - 1, m, sealed.len() - 1] {
        let mut tampered = sealed.clone();
        tampered[offset] ^= 0x80;
        let err = env
            .open_binary::<ServiceSecrets, _>(&tampered, private.decrypter().unwrap())
            .unwrap_err();
        match err {
            SealError::Decryption { index, .. } => assert_eq!(index, offset / m),
            other => panic!("offset {offset}: unexpected error {other}"),
        }
    }
}

#[test]
fn stream_truncated_mid_block_uses_full_blocks_only() {
    let private = private_key();
    let env = Envelope::json();
    let m = private.modulus_byte_size();
    let blocks = env.seal_payload(&[7u8; 200], private.encrypter()).unwrap();
    let mut stream = binary::encode_blocks(&blocks);
    stream.truncate(stream.len() - 1);

    let windows = binary::read_blocks(&mut std::io::Cursor::new(&stream), m).unwrap();
    assert_eq!(windows.len(), blocks.len() - 1);
    let partial = env.open_payload(&windows, private.decrypter().unwrap()).unwrap();
    let c = m - rsaseal_crypto::OAEP_OVERHEAD;
    assert_eq!(partial.len(), c * (blocks.len() - 1));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn payload_roundtrip_both_carriers(data in proptest::collection::vec(any::<u8>(), 0..=600)) {
        let private = private_key();
        let env = Envelope::json();
        let m = private.modulus_byte_size();
        let blocks = env.seal_payload(&data, private.encrypter()).unwrap();

        let text = text::encode_blocks(&blocks, ',');
        let from_text = env
            .open_payload(&text::decode_blocks(&text, ',').unwrap(), private.decrypter().unwrap())
            .unwrap();
        prop_assert_eq!(&*from_text, &data);

        let bin = binary::encode_blocks(&blocks);
        prop_assert_eq!(bin.len(), blocks.len() * m);
        let from_bin = env
            .open_payload(&binary::decode_blocks(&bin, m).unwrap(), private.decrypter().unwrap())
            .unwrap();
        prop_assert_eq!(&*from_bin, &data);
    }
}
