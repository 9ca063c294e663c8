use crate::common::MAX_CODE_BITS;

/// Prime slot count; comfortably above the 4096 codes a 12-bit dictionary can hold.
pub const TABLE_SIZE: usize = 5003;

const EMPTY: i32 = -1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Probe {
    Found(u16),
    Vacant(usize),
}

/// Open addressing table mapping `(prefix code, pixel)` pairs to dictionary
/// codes. Collisions are resolved with a secondary displacement, so lookups
/// never allocate.
pub struct CodeTable {
    fingerprints: Vec<i32>,
    codes: Vec<u16>,
    hash_shift: u32,
    len: usize,
}

impl CodeTable {

    pub fn new() -> Self {
        CodeTable {
            fingerprints: vec![EMPTY; TABLE_SIZE],
            codes: vec![0; TABLE_SIZE],
            hash_shift: hash_shift(TABLE_SIZE),
            len: 0,
        }
    }

    pub fn find(&self, pixel: u8, prefix: u16) -> Probe {
        let fingerprint = fingerprint(pixel, prefix);
        let mut slot = (((pixel as usize) << self.hash_shift) ^ prefix as usize) % TABLE_SIZE;

        if self.fingerprints[slot] == fingerprint {
            return Probe::Found(self.codes[slot]);
        }

        if self.fingerprints[slot] == EMPTY {
            return Probe::Vacant(slot);
        }

        let displacement = if slot == 0 {
            1
        } else {
            TABLE_SIZE - slot
        };

        loop {
            slot = if slot >= displacement {
                slot - displacement
            } else {
                slot + TABLE_SIZE - displacement
            };

            if self.fingerprints[slot] == fingerprint {
                return Probe::Found(self.codes[slot]);
            }

            if self.fingerprints[slot] == EMPTY {
                return Probe::Vacant(slot);
            }
        }
    }

    /// `slot` must come from a `Probe::Vacant` for the same pair.
    pub fn insert(&mut self, slot: usize, pixel: u8, prefix: u16, code: u16) {
        self.fingerprints[slot] = fingerprint(pixel, prefix);
        self.codes[slot] = code;
        self.len += 1;
    }

    pub fn clear(&mut self) {
        for fingerprint in self.fingerprints.iter_mut() {
            *fingerprint = EMPTY;
        }
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

fn fingerprint(pixel: u8, prefix: u16) -> i32 {
    ((pixel as i32) << MAX_CODE_BITS) | prefix as i32
}

// 8 minus the number of doublings that keep the table size below 65536
fn hash_shift(table_size: usize) -> u32 {
    let mut shift = 0;
    let mut size = table_size;

    while size < 65536 {
        shift += 1;
        size *= 2;
    }

    8 - shift
}
