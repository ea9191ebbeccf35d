//! The decryption seam. Cipher implementations live with the host; this
//! crate only routes per-object transforms into string and stream reads.

use crate::primitive::PlainRef;

/// Decrypts the payloads of one indirect object.
pub trait CipherTransform {
    fn decrypt_string(&self, data: Vec<u8>) -> Vec<u8>;
    fn decrypt_stream(&self, data: Vec<u8>) -> Vec<u8>;
}

/// Built by the host from the `/Encrypt` dictionary, the file ID and the
/// password; hands out one transform per `(object number, generation)`.
pub trait CipherTransformFactory {
    fn create_transform(&self, id: PlainRef) -> Box<dyn CipherTransform>;
    /// Whether the document metadata stream is encrypted too.
    fn encrypt_metadata(&self) -> bool {
        true
    }
}

/// Identity transform, useful for hosts that resolve `/Encrypt` to
/// "nothing to do" and in tests.
pub struct NoCipher;

impl CipherTransform for NoCipher {
    fn decrypt_string(&self, data: Vec<u8>) -> Vec<u8> {
        data
    }
    fn decrypt_stream(&self, data: Vec<u8>) -> Vec<u8> {
        data
    }
}

impl CipherTransformFactory for NoCipher {
    fn create_transform(&self, _id: PlainRef) -> Box<dyn CipherTransform> {
        Box::new(NoCipher)
    }
}
