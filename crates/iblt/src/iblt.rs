//! The Invertible Bloom Lookup Table.

use crate::{murmur3_32, murmur3_u32};
use bytes::BufMut;
use pubsync_api::{Component, PsError, PsResult};
use std::collections::BTreeSet;
use std::io::{Read, Write};

/// Number of hash functions, each indexing its own sub-table.
/// Sub-table `i` uses hash seed `i`.
pub const HASH_COUNT: usize = 3;

/// Seed for the cell key check, and for publication digests.
pub const CHECK_SEED: u32 = 11;

/// Wire size of one cell: i32 count, u32 keySum, u32 keyCheck.
const CELL_BYTES: usize = 12;

/// One cell of the table.
///
/// `count` is signed so that after subtracting another table, the sign
/// tells which side held the key. `key_check` is the key hashed under a
/// distinct seed, distinguishing true singletons from accidental XOR
/// cancellations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HashCell {
    /// Signed number of keys folded into this cell.
    pub count: i32,
    /// XOR of the keys in this cell.
    pub key_sum: u32,
    /// XOR of `murmur3(CHECK_SEED, key)` for the keys in this cell.
    pub key_check: u32,
}

impl HashCell {
    /// A cell holding exactly one key (possibly of either sign).
    pub fn is_pure(&self) -> bool {
        (self.count == 1 || self.count == -1)
            && self.key_check == murmur3_u32(CHECK_SEED, self.key_sum)
    }

    /// A cell holding nothing at all.
    pub fn is_empty(&self) -> bool {
        self.count == 0 && self.key_sum == 0 && self.key_check == 0
    }
}

/// The keys recovered by peeling a table (usually a difference of two).
///
/// For `a - b`: `positive` keys are in `a` but not `b`, `negative` keys
/// are in `b` but not `a`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Peeled {
    /// Keys with count +1.
    pub positive: BTreeSet<u32>,
    /// Keys with count -1.
    pub negative: BTreeSet<u32>,
}

/// Invertible Bloom Lookup Table over 32-bit keys.
///
/// The cell count is fixed at construction (a multiple of
/// [HASH_COUNT]) and never changes; only tables of identical size can be
/// subtracted.
#[derive(Clone, PartialEq, Eq)]
pub struct Iblt {
    cells: Vec<HashCell>,
}

impl Iblt {
    /// Construct an empty table sized for `expected_entries` keys.
    ///
    /// The table allocates 1.5x the expected entry count, rounded up to a
    /// multiple of [HASH_COUNT]. The headroom keeps the peeling failure
    /// probability very low at the design load.
    pub fn new(expected_entries: usize) -> Self {
        let mut n = expected_entries + expected_entries / 2;
        let remainder = n % HASH_COUNT;
        if remainder != 0 {
            n += HASH_COUNT - remainder;
        }
        Self {
            cells: vec![HashCell::default(); n],
        }
    }

    /// Number of cells in the table.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Cell index for `key` in sub-table `sub`.
    fn index(&self, sub: usize, key: u32) -> usize {
        let sub_size = self.cells.len() / HASH_COUNT;
        murmur3_u32(sub as u32, key) as usize % sub_size + sub * sub_size
    }

    fn update(&mut self, delta: i32, key: u32) {
        let check = murmur3_u32(CHECK_SEED, key);
        for sub in 0..HASH_COUNT {
            let idx = self.index(sub, key);
            let cell = &mut self.cells[idx];
            cell.count += delta;
            cell.key_sum ^= key;
            cell.key_check ^= check;
        }
    }

    /// Add one occurrence of `key`.
    pub fn insert(&mut self, key: u32) {
        self.update(1, key);
    }

    /// Remove one occurrence of `key`.
    ///
    /// If the table's cells for `key` look corrupt — a double erase, or an
    /// erase of something never inserted — the erase is suppressed and an
    /// error logged, leaving the table untouched.
    pub fn erase(&mut self, key: u32) {
        if self.bad_peers(key) {
            tracing::error!("invalid iblt erase: bad peers for key {key:#010x}");
            return;
        }
        self.update(-1, key);
    }

    fn chk_peer(&self, key: u32, idx: usize) -> bool {
        let cell = &self.cells[idx];
        cell.is_empty() || (cell.is_pure() && cell.key_sum != key)
    }

    /// Validity check for `key` before a peel or erase.
    ///
    /// True when any of the key's three cells is empty, or is pure but
    /// holds a different key — the signature of a corrupted table or an
    /// invalid delete.
    pub fn bad_peers(&self, key: u32) -> bool {
        (0..HASH_COUNT).any(|sub| self.chk_peer(key, self.index(sub, key)))
    }

    /// Peel the table, recovering every key it still resolves.
    ///
    /// Called on a difference of two tables. Returns `None` when peeling
    /// exposes a corrupt cell (bad peers), meaning the difference cannot
    /// be trusted at all. Returns the recovered keys otherwise; cells may
    /// remain undecoded when the difference exceeds the peeling capacity,
    /// and those pairs surface on a later exchange.
    pub fn list_entries(&self) -> Option<Peeled> {
        let mut peeled = self.clone();
        let mut out = Peeled::default();

        let mut progressed = true;
        while progressed {
            progressed = false;
            for idx in 0..peeled.cells.len() {
                let cell = peeled.cells[idx];
                if !cell.is_pure() {
                    continue;
                }
                let key = cell.key_sum;
                if peeled.bad_peers(key) {
                    tracing::error!(
                        "invalid iblt: bad peers for entry {key:#010x}"
                    );
                    return None;
                }
                if cell.count == 1 {
                    out.positive.insert(key);
                } else {
                    out.negative.insert(key);
                }
                peeled.update(-cell.count, key);
                progressed = true;
            }
        }

        Some(out)
    }

    /// Serialize to a compressed name component.
    ///
    /// Cells are laid out little-endian, 12 bytes each, then the whole
    /// buffer is zlib-deflated and becomes the raw value of a single
    /// component.
    pub fn encoded_component(&self) -> Component {
        let mut table = Vec::with_capacity(self.cells.len() * CELL_BYTES);
        for cell in &self.cells {
            table.put_i32_le(cell.count);
            table.put_u32_le(cell.key_sum);
            table.put_u32_le(cell.key_check);
        }

        let mut encoder = flate2::write::ZlibEncoder::new(
            Vec::new(),
            flate2::Compression::default(),
        );
        encoder
            .write_all(&table)
            .expect("deflate into memory cannot fail");
        let compressed =
            encoder.finish().expect("deflate into memory cannot fail");
        Component::from_bytes(compressed)
    }

    /// Reconstitute a table from a name component.
    ///
    /// The inflated payload must be exactly `12 * cell_count` bytes for a
    /// table sized by `expected_entries`; anything else is a decode
    /// error. Cells whose count is zero on the wire keep their zeroed
    /// default, preserving the empty-cell invariant.
    pub fn decode_component(
        expected_entries: usize,
        component: &Component,
    ) -> PsResult<Iblt> {
        let mut decoder = flate2::read::ZlibDecoder::new(component.as_bytes());
        let mut inflated = Vec::new();
        decoder.read_to_end(&mut inflated).map_err(|e| {
            PsError::decode(format!("IBLT component does not inflate: {e}"))
        })?;

        let mut out = Iblt::new(expected_entries);
        let want = out.cells.len() * CELL_BYTES;
        if inflated.len() != want {
            return Err(PsError::decode(format!(
                "inflated IBLT is {} bytes, expected {}",
                inflated.len(),
                want
            )));
        }

        for (i, raw) in inflated.chunks_exact(CELL_BYTES).enumerate() {
            let count = i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
            if count != 0 {
                out.cells[i] = HashCell {
                    count,
                    key_sum: u32::from_le_bytes([
                        raw[4], raw[5], raw[6], raw[7],
                    ]),
                    key_check: u32::from_le_bytes([
                        raw[8], raw[9], raw[10], raw[11],
                    ]),
                };
            }
        }

        Ok(out)
    }

    /// Hash of an encoded IBLT component, for log correlation between
    /// peers.
    pub fn component_hash(component: &Component) -> u32 {
        murmur3_32(CHECK_SEED, component.as_bytes())
    }
}

impl std::ops::Sub for &Iblt {
    type Output = Iblt;

    /// Elementwise difference. Both tables must have the same cell count;
    /// subtracting mismatched tables is a hard protocol violation.
    fn sub(self, other: &Iblt) -> Iblt {
        if self.cells.len() != other.cells.len() {
            panic!(
                "refusing to subtract IBLTs of different sizes ({} != {})",
                self.cells.len(),
                other.cells.len()
            );
        }
        let mut out = self.clone();
        for (a, b) in out.cells.iter_mut().zip(other.cells.iter()) {
            a.count -= b.count;
            a.key_sum ^= b.key_sum;
            a.key_check ^= b.key_check;
        }
        out
    }
}

impl std::fmt::Debug for Iblt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "idx   count keySum   keyCheck")?;
        for (idx, cell) in self.cells.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            writeln!(
                f,
                "{:3} {:5} {:08x} {:08x}",
                idx, cell.count, cell.key_sum, cell.key_check
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::prelude::*;

    #[test]
    fn cell_count_is_multiple_of_hash_count() {
        for expected in [1, 2, 3, 10, 85, 100] {
            let iblt = Iblt::new(expected);
            assert_eq!(0, iblt.cell_count() % HASH_COUNT);
            assert!(iblt.cell_count() >= expected + expected / 2);
        }
        // the default engine sizing
        assert_eq!(129, Iblt::new(85).cell_count());
    }

    #[test]
    fn insert_then_erase_restores_cells_exactly() {
        let empty = Iblt::new(85);
        let mut iblt = empty.clone();
        iblt.insert(0xdeadbeef);
        assert_ne!(empty, iblt);
        iblt.erase(0xdeadbeef);
        assert_eq!(empty, iblt);
    }

    #[test]
    fn erase_of_absent_key_is_suppressed() {
        let empty = Iblt::new(85);
        let mut iblt = empty.clone();
        iblt.erase(0x12345678);
        assert_eq!(empty, iblt);
    }

    #[test]
    fn double_erase_is_suppressed() {
        let mut iblt = Iblt::new(85);
        iblt.insert(7);
        iblt.erase(7);
        let snapshot = iblt.clone();
        iblt.erase(7);
        assert_eq!(snapshot, iblt);
    }

    #[test]
    fn list_entries_of_own_set() {
        let mut iblt = Iblt::new(85);
        let keys: Vec<u32> = (1..=20).map(|i: u32| i.wrapping_mul(0x9e3779b9)).collect();
        for k in &keys {
            iblt.insert(*k);
        }
        let peeled = iblt.list_entries().unwrap();
        assert_eq!(
            keys.iter().copied().collect::<BTreeSet<_>>(),
            peeled.positive
        );
        assert!(peeled.negative.is_empty());
    }

    #[test]
    fn difference_peels_both_sides() {
        // 50 shared-ish keys on one side, 45 of them plus 5 new on the other
        let mut rng = StdRng::seed_from_u64(0xfeed);
        let keys: Vec<u32> = (0..55).map(|_| rng.gen()).collect();

        let mut a = Iblt::new(85);
        for k in &keys[..50] {
            a.insert(*k);
        }
        let mut b = Iblt::new(85);
        for k in &keys[..45] {
            b.insert(*k);
        }
        for k in &keys[50..] {
            b.insert(*k);
        }

        let peeled = (&a - &b).list_entries().unwrap();
        assert_eq!(
            keys[45..50].iter().copied().collect::<BTreeSet<_>>(),
            peeled.positive
        );
        assert_eq!(
            keys[50..].iter().copied().collect::<BTreeSet<_>>(),
            peeled.negative
        );
    }

    #[test]
    fn equal_tables_peel_to_nothing() {
        let mut a = Iblt::new(85);
        let mut b = Iblt::new(85);
        for k in [3u32, 99, 1 << 20] {
            a.insert(k);
            b.insert(k);
        }
        let peeled = (&a - &b).list_entries().unwrap();
        assert!(peeled.positive.is_empty());
        assert!(peeled.negative.is_empty());
    }

    #[test]
    #[should_panic(expected = "different sizes")]
    fn subtract_size_mismatch_panics() {
        let _ = &Iblt::new(85) - &Iblt::new(10);
    }

    #[test]
    fn component_round_trip() {
        let mut iblt = Iblt::new(85);
        for k in 0..40u32 {
            iblt.insert(k.wrapping_mul(0x85ebca6b));
        }
        let component = iblt.encoded_component();
        let decoded = Iblt::decode_component(85, &component).unwrap();
        assert_eq!(iblt, decoded);
    }

    #[test]
    fn empty_table_round_trip() {
        let iblt = Iblt::new(85);
        let decoded =
            Iblt::decode_component(85, &iblt.encoded_component()).unwrap();
        assert_eq!(iblt, decoded);
    }

    #[test]
    fn oversize_payload_rejected() {
        // a valid encoding padded by one cell's worth of zeros inflates to
        // 12*N + 12 bytes and must be refused
        let iblt = Iblt::new(85);
        let mut table = Vec::new();
        for cell in &iblt.cells {
            table.put_i32_le(cell.count);
            table.put_u32_le(cell.key_sum);
            table.put_u32_le(cell.key_check);
        }
        table.extend_from_slice(&[0u8; 12]);

        let mut encoder = flate2::write::ZlibEncoder::new(
            Vec::new(),
            flate2::Compression::default(),
        );
        encoder.write_all(&table).unwrap();
        let component = Component::from_bytes(encoder.finish().unwrap());

        assert!(Iblt::decode_component(85, &component).is_err());
    }

    #[test]
    fn garbage_payload_rejected() {
        let component = Component::from_bytes(&b"not zlib at all"[..]);
        assert!(Iblt::decode_component(85, &component).is_err());
    }

    #[test]
    fn size_mismatch_between_peers_rejected() {
        let iblt = Iblt::new(40);
        let component = iblt.encoded_component();
        assert!(Iblt::decode_component(85, &component).is_err());
    }
}
