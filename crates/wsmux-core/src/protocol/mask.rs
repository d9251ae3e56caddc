//! WebSocket payload masking (RFC 6455 section 5.3).
//!
//! Octet `i` of the transformed data is octet `i` of the original XOR
//! `key[i % 4]`. The transform is its own inverse.

use bytes::BytesMut;

/// XOR `buf` in place with the 4-byte masking key.
#[inline]
pub fn apply_mask(buf: &mut [u8], key: [u8; 4]) {
    for (i, b) in buf.iter_mut().enumerate() {
        *b ^= key[i & 3];
    }
}

/// Append the unmasked form of `masked` to `out`.
#[inline]
pub fn unmask_into(out: &mut BytesMut, masked: &[u8], key: [u8; 4]) {
    out.reserve(masked.len());
    out.extend(masked.iter().enumerate().map(|(i, b)| b ^ key[i & 3]));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_is_an_involution() {
        let key = [0x37, 0xfa, 0x21, 0x3d];
        let payloads: [&[u8]; 4] = [b"", b"H", b"Hello", &[0u8; 1031]];
        for p in payloads {
            let mut buf = p.to_vec();
            apply_mask(&mut buf, key);
            apply_mask(&mut buf, key);
            assert_eq!(buf, p);
        }
    }

    #[test]
    fn unmask_into_appends_after_existing_bytes() {
        let key = [0x37, 0xfa, 0x21, 0x3d];
        let mut masked = b"Hello".to_vec();
        apply_mask(&mut masked, key);
        assert_eq!(masked, [0x7f, 0x9f, 0x4d, 0x51, 0x58]);

        let mut out = BytesMut::from(&b"AB"[..]);
        unmask_into(&mut out, &masked, key);
        assert_eq!(&out[..], b"ABHello");
    }
}
