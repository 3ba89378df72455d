// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Integration tests for q-crypto
//!
//! Known-answer vectors for every backend, exercised through the
//! capability traits as the update engine sees them.

mod crc_tests {
    use q_crypto::{crc32, Crc32, HashAlgo};

    #[test]
    fn test_empty_input() {
        assert_eq!(crc32(&[]), 0);
    }

    #[test]
    fn test_reinit_discards_state() {
        let mut digest = Crc32::new();
        digest.update(b"garbage");
        digest.init();
        digest.update(b"123456789");
        let mut out = [0u8; 4];
        digest.finalize(&mut out).unwrap();
        assert_eq!(u32::from_le_bytes(out), 0xCBF4_3926);
    }

    #[test]
    fn test_magic_block_constant() {
        assert_eq!(
            crc32(&q_common::constants::MAGIC_BLOCK),
            q_common::constants::MAGIC_BLOCK_CRC
        );
    }
}

mod sha3_tests {
    use q_crypto::{HashAlgo, Sha3_256};

    #[test]
    fn test_sha3_256_abc() {
        // NIST KAT: SHA3-256("abc")
        let expected = [
            0x3a, 0x98, 0x5d, 0xa7, 0x4f, 0xe2, 0x25, 0xb2,
            0x04, 0x5c, 0x17, 0x2d, 0x6b, 0xd3, 0x90, 0xbd,
            0x85, 0x5f, 0x08, 0x6e, 0x3e, 0x9d, 0x52, 0x5b,
            0x46, 0xbf, 0xe2, 0x45, 0x11, 0x43, 0x15, 0x32,
        ];

        let mut hasher = Sha3_256::new();
        hasher.init();
        hasher.update(b"a");
        hasher.update(b"bc");
        let mut out = [0u8; 32];
        assert_eq!(hasher.finalize(&mut out), Ok(32));
        assert_eq!(out, expected);
    }

    #[test]
    fn test_finalize_resets() {
        let mut hasher = Sha3_256::new();
        let mut first = [0u8; 32];
        let mut second = [0u8; 32];
        hasher.update(b"abc");
        hasher.finalize(&mut first).unwrap();
        hasher.update(b"abc");
        hasher.finalize(&mut second).unwrap();
        assert_eq!(first, second);
    }
}

mod cbc_tests {
    use q_crypto::{AesCbc, AesCbcEncryptor, CipherAlgo};

    // NIST SP 800-38A F.2.1 CBC-AES128
    const KEY: [u8; 16] = [
        0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6,
        0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf, 0x4f, 0x3c,
    ];
    const IV: [u8; 16] = [
        0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07,
        0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
    ];
    const PLAIN: [u8; 32] = [
        0x6b, 0xc1, 0xbe, 0xe2, 0x2e, 0x40, 0x9f, 0x96,
        0xe9, 0x3d, 0x7e, 0x11, 0x73, 0x93, 0x17, 0x2a,
        0xae, 0x2d, 0x8a, 0x57, 0x1e, 0x03, 0xac, 0x9c,
        0x9e, 0xb7, 0x6f, 0xac, 0x45, 0xaf, 0x8e, 0x51,
    ];
    const CIPHER: [u8; 32] = [
        0x76, 0x49, 0xab, 0xac, 0x81, 0x19, 0xb2, 0x46,
        0xce, 0xe9, 0x8e, 0x9b, 0x12, 0xe9, 0x19, 0x7d,
        0x50, 0x86, 0xcb, 0x9b, 0x50, 0x72, 0x19, 0xee,
        0x95, 0xdb, 0x11, 0x3a, 0x91, 0x76, 0x78, 0xb2,
    ];

    #[test]
    fn test_nist_decrypt() {
        let mut cipher = AesCbc::new();
        cipher.init(&KEY, &IV).unwrap();
        let mut data = CIPHER;
        cipher.decrypt(&mut data).unwrap();
        assert_eq!(data, PLAIN);
    }

    #[test]
    fn test_nist_encrypt() {
        let mut enc = AesCbcEncryptor::new(&KEY, &IV).unwrap();
        let mut data = PLAIN;
        enc.encrypt(&mut data).unwrap();
        assert_eq!(data, CIPHER);
    }

    #[test]
    fn test_chained_decrypt_across_calls() {
        let mut cipher = AesCbc::new();
        cipher.init(&KEY, &IV).unwrap();
        let mut data = CIPHER;
        let (first, second) = data.split_at_mut(16);
        cipher.decrypt(first).unwrap();
        cipher.decrypt(second).unwrap();
        assert_eq!(data, PLAIN);
    }

    #[test]
    fn test_wrong_key_garbles() {
        let mut cipher = AesCbc::new();
        cipher.init(&[0u8; 16], &IV).unwrap();
        let mut data = CIPHER;
        cipher.decrypt(&mut data).unwrap();
        assert_ne!(data, PLAIN);
    }

    #[test]
    fn test_trait_object_dispatch() {
        let mut backend = AesCbc::new();
        let cipher: &mut dyn CipherAlgo = &mut backend;
        assert_eq!(cipher.block_size(), 16);
        assert_eq!(cipher.iv_size(), 16);
    }
}

mod property_tests {
    use proptest::prelude::*;
    use q_crypto::{AesCbc, AesCbcEncryptor, CipherAlgo};

    proptest! {
        #[test]
        fn prop_decrypt_inverts_encrypt(
            key in prop::sample::select(vec![16usize, 24, 32]),
            seed in any::<u8>(),
            blocks in 1usize..8,
        ) {
            let key: Vec<u8> = (0..key).map(|i| seed.wrapping_add(i as u8)).collect();
            let iv = [seed; 16];
            let plain: Vec<u8> = (0..blocks * 16).map(|i| (i as u8) ^ seed).collect();

            let mut data = plain.clone();
            AesCbcEncryptor::new(&key, &iv).unwrap().encrypt(&mut data).unwrap();
            let mut cipher = AesCbc::new();
            cipher.init(&key, &iv).unwrap();
            cipher.decrypt(&mut data).unwrap();
            prop_assert_eq!(data, plain);
        }
    }
}

mod error_tests {
    use q_crypto::CryptoError;

    #[test]
    fn test_key_errors_map_to_wrong_key() {
        assert_eq!(
            q_common::Error::from(CryptoError::InvalidKey),
            q_common::Error::WrongKey
        );
        assert_eq!(
            q_common::Error::from(CryptoError::NotInitialized),
            q_common::Error::CryptoFailure
        );
    }
}
