//! The 32-bit hash primitive.
//!
//! MurmurHash3_x86_32, bit-identical to Appleby's public-domain reference.
//! Digests produced here travel inside IBLT cells on the wire and are
//! compared across peers, so there is no room for a "mostly compatible"
//! implementation.

/// Hash `data` under `seed` with MurmurHash3_x86_32.
pub fn murmur3_32(seed: u32, data: &[u8]) -> u32 {
    const C1: u32 = 0xcc9e2d51;
    const C2: u32 = 0x1b873593;

    let mut h1 = seed;

    let mut chunks = data.chunks_exact(4);
    for block in &mut chunks {
        let mut k1 =
            u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        k1 = k1.wrapping_mul(C1);
        k1 = k1.rotate_left(15);
        k1 = k1.wrapping_mul(C2);

        h1 ^= k1;
        h1 = h1.rotate_left(13);
        h1 = h1.wrapping_mul(5).wrapping_add(0xe6546b64);
    }

    let tail = chunks.remainder();
    let mut k1: u32 = 0;
    if tail.len() >= 3 {
        k1 ^= (tail[2] as u32) << 16;
    }
    if tail.len() >= 2 {
        k1 ^= (tail[1] as u32) << 8;
    }
    if !tail.is_empty() {
        k1 ^= tail[0] as u32;
        k1 = k1.wrapping_mul(C1);
        k1 = k1.rotate_left(15);
        k1 = k1.wrapping_mul(C2);
        h1 ^= k1;
    }

    h1 ^= data.len() as u32;
    h1 ^= h1 >> 16;
    h1 = h1.wrapping_mul(0x85ebca6b);
    h1 ^= h1 >> 13;
    h1 = h1.wrapping_mul(0xc2b2ae35);
    h1 ^= h1 >> 16;
    h1
}

/// Hash a 32-bit value: byte-equivalent to hashing its little-endian
/// bytes.
pub fn murmur3_u32(seed: u32, value: u32) -> u32 {
    murmur3_32(seed, &value.to_le_bytes())
}

/// Hash a string: byte-equivalent to hashing its UTF-8 bytes.
pub fn murmur3_str(seed: u32, value: &str) -> u32 {
    murmur3_32(seed, value.as_bytes())
}

#[cfg(test)]
mod test {
    use super::*;

    // Reference vectors for MurmurHash3_x86_32.
    #[test]
    fn reference_vectors() {
        const F: &[(u32, &[u8], u32)] = &[
            (0, b"", 0),
            (1, b"", 0x514e28b7),
            (0xffffffff, b"", 0x81f16f39),
            (0, &[0xff, 0xff, 0xff, 0xff], 0x76293b50),
            (0, &[0x21, 0x43, 0x65, 0x87], 0xf55b516b),
            (0x5082edee, &[0x21, 0x43, 0x65, 0x87], 0x2362f9de),
            (0, &[0x21, 0x43, 0x65], 0x7e4a8634),
            (0, &[0x21, 0x43], 0xa0f7b07a),
            (0, &[0x21], 0x72661cf4),
            (0, &[0, 0, 0, 0], 0x2362f9de),
            (0, &[0, 0, 0], 0x85f0b427),
            (0, &[0, 0], 0x30f4c306),
            (0, &[0], 0x514e28b7),
        ];

        for (seed, data, expect) in F {
            assert_eq!(*expect, murmur3_32(*seed, data), "seed {seed:#x}");
        }
    }

    #[test]
    fn string_vectors() {
        const F: &[(u32, &str, u32)] = &[
            (0x9747b28c, "aaaa", 0x5a97808a),
            (0x9747b28c, "aaa", 0x283e0130),
            (0x9747b28c, "aa", 0x5d211726),
            (0x9747b28c, "a", 0x7fa09ea6),
            (0x9747b28c, "abcd", 0xf0478627),
            (0x9747b28c, "abc", 0xc84a62dd),
            (0x9747b28c, "ab", 0x74875592),
            (0x9747b28c, "Hello, world!", 0x24884cba),
        ];

        for (seed, data, expect) in F {
            assert_eq!(*expect, murmur3_str(*seed, data), "input {data:?}");
        }
    }

    #[test]
    fn u32_form_matches_le_bytes() {
        for v in [0u32, 1, 0xdeadbeef, u32::MAX] {
            assert_eq!(murmur3_32(11, &v.to_le_bytes()), murmur3_u32(11, v));
        }
    }
}
