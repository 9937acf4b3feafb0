//! Key file and secrets blob behaviour through the public API.

use std::fs;

use keyswitch::error::{ErrorKind, KeyFileProblem};
use keyswitch::{keystore, vault};

struct Fixture {
    _dir: tempfile::TempDir,
    key: std::path::PathBuf,
    secrets: std::path::PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let key = keystore::key_path(dir.path());
    let secrets = vault::secrets_path(dir.path());
    keystore::generate(&key).unwrap();
    Fixture {
        _dir: dir,
        key,
        secrets,
    }
}

#[test]
fn test_round_trip_plaintexts() {
    let f = fixture();
    let binary: Vec<u8> = (0u8..=255).collect();
    let large = "K=".to_string() + &"v".repeat(200_000);
    let cases: [&[u8]; 4] = [b"", b"OPENAI_API_KEY=sk-1\n", &binary, large.as_bytes()];

    for plaintext in cases {
        vault::encrypt(&f.secrets, &f.key, plaintext).unwrap();
        let decrypted = vault::decrypt(&f.secrets, &f.key).unwrap();
        assert_eq!(decrypted.expose_bytes(), plaintext);
    }
}

#[test]
fn test_tampering_is_detected() {
    let f = fixture();
    vault::encrypt(&f.secrets, &f.key, b"OPENAI_API_KEY=sk-live-0123456789\n").unwrap();
    let original = fs::read(&f.secrets).unwrap();

    let positions = [0, original.len() / 2, original.len() - 20, original.len() - 1];
    for pos in positions {
        let mut tampered = original.clone();
        tampered[pos] ^= 0x01;
        fs::write(&f.secrets, &tampered).unwrap();

        let err = vault::decrypt(&f.secrets, &f.key).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Crypto, "flipped byte {}", pos);
    }

    fs::write(&f.secrets, &original[..original.len() / 2]).unwrap();
    let err = vault::decrypt(&f.secrets, &f.key).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Crypto);

    // Untouched envelope still decrypts
    fs::write(&f.secrets, &original).unwrap();
    assert!(vault::decrypt(&f.secrets, &f.key).is_ok());
}

#[test]
fn test_key_file_diagnostics() {
    let f = fixture();

    fs::write(&f.key, "").unwrap();
    let empty = keystore::load_recipient(&f.key).unwrap_err();

    let pair = keystore::KeyPair::generate();
    let contents = pair.to_file_contents();
    let first_line = contents.lines().next().unwrap().to_string();
    fs::write(&f.key, format!("{}\n", first_line)).unwrap();
    let one_line = keystore::load_identity(&f.key).err().unwrap();

    assert_eq!(empty.kind(), ErrorKind::Format);
    assert_eq!(one_line.kind(), ErrorKind::Format);
    assert_eq!(empty.key_file_problem(), Some(KeyFileProblem::Empty));
    assert_eq!(
        one_line.key_file_problem(),
        Some(KeyFileProblem::MissingRecipient)
    );
    assert_ne!(empty.to_string(), one_line.to_string());

    fs::write(&f.key, contents.as_bytes()).unwrap();
    assert!(keystore::load_identity(&f.key).is_ok());
    assert!(keystore::load_recipient(&f.key).is_ok());
}

#[test]
fn test_errors_never_contain_secret_values() {
    let f = fixture();
    vault::encrypt(&f.secrets, &f.key, b"OPENAI_API_KEY=sk-should-not-leak\nbroken line\n")
        .unwrap();

    let err = vault::load_map(&f.secrets, &f.key).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
    assert!(!err.to_string().contains("sk-should-not-leak"));
    assert!(!format!("{:?}", err).contains("sk-should-not-leak"));
}

#[test]
fn test_secrets_map_updates() {
    let f = fixture();

    let mut map = vault::load_map(&f.secrets, &f.key).unwrap();
    map.insert("OPENAI_API_KEY", "sk-1").unwrap();
    map.insert("ANTHROPIC_API_KEY", "sk-ant").unwrap();
    vault::store_map(&f.secrets, &f.key, &map).unwrap();

    let mut map = vault::load_map(&f.secrets, &f.key).unwrap();
    assert_eq!(
        map.names().collect::<Vec<_>>(),
        vec!["ANTHROPIC_API_KEY", "OPENAI_API_KEY"]
    );
    assert!(map.remove("OPENAI_API_KEY"));
    vault::store_map(&f.secrets, &f.key, &map).unwrap();

    let plaintext = vault::decrypt(&f.secrets, &f.key).unwrap();
    assert_eq!(plaintext.expose_str().unwrap(), "ANTHROPIC_API_KEY=sk-ant\n");
}
