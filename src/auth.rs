//! RSA authentication: the Android public-key wire format, its MD5
//! fingerprint, and token signing for the `AUTH` handshake. Grounded on
//! `adb/auth.py` (public-key struct layout, fingerprint, comment parsing)
//! and `mdb/src/adb/pubkey.rs` (the Montgomery-parameter encoding, adapted
//! here to arbitrary modulus sizes instead of a fixed 2048-bit key).

use base64::Engine;
use byteorder::{ByteOrder, LittleEndian};
use md5::{Digest as Md5Digest, Md5};
use num_bigint_dig::traits::ModInverse;
use num_bigint_dig::IntoBigInt;
use num_traits::ToPrimitive;
use regex::Regex;
use rsa::{BigUint, Pkcs1v15Sign, PublicKeyParts, RsaPrivateKey, RsaPublicKey};

use crate::error::{AdbError, AdbResult};

/// The Android-specific RSA public key wire format used in `AUTH` packets:
/// a word count, a Montgomery `n0inv`, the modulus and `R^2 mod n`
/// (both little-endian), and the public exponent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndroidPublicKey {
    modulus_size_words: u32,
    n0inv: u32,
    /// Little-endian, as carried on the wire.
    modulus_le: Vec<u8>,
    /// Little-endian, as carried on the wire.
    rr_le: Vec<u8>,
    exponent: u32,
    pub fingerprint: String,
    pub comment: String,
}

impl AndroidPublicKey {
    /// Derive the wire-format public key (and its Montgomery parameters)
    /// from an RSA private key.
    pub fn from_private(private_key: &RsaPrivateKey, comment: impl Into<String>) -> AdbResult<Self> {
        let public = RsaPublicKey::from(private_key);
        let modulus = public.n();
        let modulus_bytes = modulus.to_bytes_le();
        let modulus_size_words = (modulus_bytes.len() as u32).div_ceil(4);

        let r32 = BigUint::from(1u8) << 32;
        let n0inv = modulus % &r32;
        let n0inv = n0inv
            .mod_inverse(&r32)
            .ok_or_else(|| AdbError::AuthError("modulus has no inverse mod 2^32".into()))?;
        let n0inv = r32
            .into_bigint()
            .map_err(|_| AdbError::AuthError("failed to convert montgomery parameter".into()))?
            - n0inv;
        let n0inv = n0inv
            .to_u32()
            .ok_or_else(|| AdbError::AuthError("n0inv did not fit in u32".into()))?;

        let r = BigUint::from(1u8) << (modulus_bytes.len() * 8);
        let rr = (&r * &r) % modulus;
        let mut rr_le = rr.to_bytes_le();
        rr_le.resize(modulus_bytes.len(), 0);

        let exponent = public
            .e()
            .to_u32()
            .ok_or_else(|| AdbError::AuthError("exponent did not fit in u32".into()))?;

        let mut key = Self {
            modulus_size_words,
            n0inv,
            modulus_le: modulus_bytes,
            rr_le,
            exponent,
            fingerprint: String::new(),
            comment: comment.into(),
        };
        key.fingerprint = key.compute_fingerprint();
        Ok(key)
    }

    fn wire_struct(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + self.modulus_le.len() * 2 + 4);
        let mut header = [0u8; 8];
        LittleEndian::write_u32(&mut header[0..4], self.modulus_size_words);
        LittleEndian::write_u32(&mut header[4..8], self.n0inv);
        buf.extend_from_slice(&header);
        buf.extend_from_slice(&self.modulus_le);
        buf.extend_from_slice(&self.rr_le);
        let mut exponent = [0u8; 4];
        LittleEndian::write_u32(&mut exponent, self.exponent);
        buf.extend_from_slice(&exponent);
        buf
    }

    fn compute_fingerprint(&self) -> String {
        let mut hasher = Md5::new();
        hasher.update(self.wire_struct());
        let digest = hasher.finalize();
        digest
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Base64-encode the wire struct, trailer-separated from the comment by
    /// a NUL and a space, matching the `adbkey.pub` on-disk format.
    pub fn encode(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(self.wire_struct());
        if self.comment.is_empty() {
            format!("{encoded}\0")
        } else {
            format!("{encoded}\0 {}", self.comment)
        }
    }

    /// Parse an `adbkey.pub`-style line: base64 struct, optional NUL, then
    /// an optional ` comment` tail.
    pub fn parse(line: &str) -> AdbResult<Self> {
        let re = Regex::new(
            r"^((?:[A-Za-z0-9+/]{4})*(?:[A-Za-z0-9+/]{2}==|[A-Za-z0-9+/]{3}=)?)\x00?( .*|)\s*$",
        )
        .unwrap();
        let captures = re
            .captures(line)
            .ok_or_else(|| AdbError::AuthError("unrecognizable public key format".into()))?;
        let struct_data = base64::engine::general_purpose::STANDARD
            .decode(&captures[1])
            .map_err(AdbError::Base64)?;
        let comment = captures[2].trim().to_string();
        Self::from_wire_struct(&struct_data, comment)
    }

    fn from_wire_struct(data: &[u8], comment: String) -> AdbResult<Self> {
        if data.len() < 8 {
            return Err(AdbError::AuthError("invalid public key".into()));
        }
        let modulus_size_words = LittleEndian::read_u32(&data[0..4]);
        let n0inv = LittleEndian::read_u32(&data[4..8]);
        let length = modulus_size_words as usize * 4;
        if data.len() != 4 + 4 + length + length + 4 {
            return Err(AdbError::AuthError("invalid public key".into()));
        }

        let modulus_le = data[8..8 + length].to_vec();
        let rr_le = data[8 + length..8 + 2 * length].to_vec();
        let exponent = LittleEndian::read_u32(&data[8 + 2 * length..8 + 2 * length + 4]);
        if exponent != 3 && exponent != 65537 {
            return Err(AdbError::AuthError(format!(
                "invalid exponent {exponent}, only 3 and 65537 are supported"
            )));
        }

        let mut key = Self {
            modulus_size_words,
            n0inv,
            modulus_le,
            rr_le,
            exponent,
            fingerprint: String::new(),
            comment,
        };
        key.fingerprint = key.compute_fingerprint();
        Ok(key)
    }

    /// Reconstruct the `rsa` crate's public key (modulus in big-endian,
    /// derived by reversing the wire's little-endian bytes).
    pub fn to_rsa_public_key(&self) -> AdbResult<RsaPublicKey> {
        let mut modulus_be = self.modulus_le.clone();
        modulus_be.reverse();
        let n = BigUint::from_bytes_be(&modulus_be);
        let e = BigUint::from(self.exponent);
        RsaPublicKey::new(n, e).map_err(AdbError::Rsa)
    }

    /// Verify a signature produced by [`sign_token`] against this key,
    /// for the bridge side of the `AUTH` handshake.
    pub fn verify(&self, token: &[u8], signature: &[u8]) -> AdbResult<bool> {
        let public_key = self.to_rsa_public_key()?;
        let padding = Pkcs1v15Sign::new::<sha1::Sha1>();
        Ok(public_key.verify(padding, token, signature).is_ok())
    }
}

/// Sign a 20-byte `AUTH TOKEN` challenge for the `AUTH SIGNATURE` reply.
/// ADB's historical quirk: the token is not actually hashed with SHA-1, but
/// the signature is still produced with the SHA-1 `DigestInfo` padding
/// prefix, so `adbd` can verify it with a normal RSA-SHA1 check.
pub fn sign_token(private_key: &RsaPrivateKey, token: &[u8]) -> AdbResult<Vec<u8>> {
    let padding = Pkcs1v15Sign::new::<sha1::Sha1>();
    private_key.sign(padding, token).map_err(AdbError::Rsa)
}

#[cfg(test)]
mod test {
    use super::*;
    use rsa::rand_core::OsRng;

    #[test]
    fn encode_decode_roundtrip_preserves_fields() {
        let private_key = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let key = AndroidPublicKey::from_private(&private_key, "test@host").unwrap();
        let encoded = key.encode();
        let line = encoded.trim_end_matches('\0');
        let decoded = AndroidPublicKey::parse(&format!("{line}\0 test@host")).unwrap();
        assert_eq!(decoded.modulus_le, key.modulus_le);
        assert_eq!(decoded.exponent, key.exponent);
        assert_eq!(decoded.fingerprint, key.fingerprint);
        assert_eq!(decoded.comment, "test@host");
    }

    #[test]
    fn rejects_unsupported_exponent() {
        let mut data = vec![0u8; 8 + 4 + 4 + 4];
        LittleEndian::write_u32(&mut data[0..4], 1);
        LittleEndian::write_u32(&mut data[8 + 4..8 + 8], 17);
        let err = AndroidPublicKey::from_wire_struct(&data, String::new()).unwrap_err();
        assert!(matches!(err, AdbError::AuthError(_)));
    }

    #[test]
    fn sign_token_produces_modulus_sized_signature() {
        let private_key = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let token = [7u8; 20];
        let signature = sign_token(&private_key, &token).unwrap();
        assert_eq!(signature.len(), 1024 / 8);
    }

    #[test]
    fn verify_accepts_matching_signature_and_rejects_tampered_one() {
        let private_key = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let key = AndroidPublicKey::from_private(&private_key, "").unwrap();
        let token = [9u8; 20];
        let signature = sign_token(&private_key, &token).unwrap();
        assert!(key.verify(&token, &signature).unwrap());

        let other_token = [1u8; 20];
        assert!(!key.verify(&other_token, &signature).unwrap());
    }
}
