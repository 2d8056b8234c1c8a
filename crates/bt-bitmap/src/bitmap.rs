//! Compressed set of 64-bit block ids (spec §4.1).
//!
//! The id space is split in two: the high 48 bits select a [`Container`] in
//! a `BTreeMap`, and the low 16 bits are represented within that container as
//! either a sorted array or a dense bitset (see `container.rs`). This keeps
//! membership and insertion at `O(log N)` in the number of *distinct*
//! containers, which for any real workload is far smaller than the number of
//! ids.

use crate::container::Container;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Write};

const SERIAL_MAGIC: u32 = 0xB17A_0001;
const TAG_ARRAY: u8 = 0;
const TAG_BITSET: u8 = 1;

fn split(id: u64) -> (u64, u16) {
    (id >> 16, (id & 0xFFFF) as u16)
}

fn join(hi: u64, lo: u16) -> u64 {
    (hi << 16) | lo as u64
}

/// A compressed, cloneable set of `u64` block ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitmap {
    containers: BTreeMap<u64, Container>,
    cardinality: u64,
}

impl Bitmap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` to the set. Returns `true` if it was not already present.
    pub fn add(&mut self, id: u64) -> bool {
        let (hi, lo) = split(id);
        let container = self.containers.entry(hi).or_insert_with(Container::empty_array);
        let inserted = container.insert(lo);
        if inserted {
            self.cardinality += 1;
        }
        inserted
    }

    /// Remove `id` from the set. Returns `true` if it was present.
    pub fn remove(&mut self, id: u64) -> bool {
        let (hi, lo) = split(id);
        let Some(container) = self.containers.get_mut(&hi) else {
            return false;
        };
        let removed = container.remove(lo);
        if removed {
            self.cardinality -= 1;
            if container.is_empty() {
                self.containers.remove(&hi);
            }
        }
        removed
    }

    pub fn contains(&self, id: u64) -> bool {
        let (hi, lo) = split(id);
        self.containers.get(&hi).is_some_and(|c| c.contains(lo))
    }

    /// O(1): cardinality is maintained incrementally on every mutation.
    pub fn cardinality(&self) -> u64 {
        self.cardinality
    }

    pub fn is_empty(&self) -> bool {
        self.cardinality == 0
    }

    pub fn clear(&mut self) {
        self.containers.clear();
        self.cardinality = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.containers
            .iter()
            .flat_map(|(&hi, c)| c.iter().map(move |lo| join(hi, lo)))
    }

    /// Extract up to `max` ids into `out`, clearing it first. Returns the
    /// number of ids written (spec §4.1 "bulk extraction into a
    /// caller-provided buffer").
    pub fn extract_into(&self, out: &mut Vec<u64>, max: usize) -> usize {
        out.clear();
        for id in self.iter().take(max) {
            out.push(id);
        }
        out.len()
    }

    pub fn union_with(&mut self, other: &Bitmap) {
        for (&hi, other_c) in &other.containers {
            let before = self.containers.get(&hi).map(Container::len).unwrap_or(0);
            let merged = match self.containers.get(&hi) {
                Some(mine) => mine.union(other_c),
                None => other_c.clone(),
            };
            let after = merged.len();
            self.containers.insert(hi, merged);
            self.cardinality += (after - before) as u64;
        }
    }

    pub fn intersect_with(&mut self, other: &Bitmap) {
        let mut next = BTreeMap::new();
        let mut total = 0u64;
        for (&hi, mine) in &self.containers {
            if let Some(other_c) = other.containers.get(&hi) {
                let merged = mine.intersect(other_c);
                if !merged.is_empty() {
                    total += merged.len() as u64;
                    next.insert(hi, merged);
                }
            }
        }
        self.containers = next;
        self.cardinality = total;
    }

    pub fn subtract_with(&mut self, other: &Bitmap) {
        let mut next = BTreeMap::new();
        let mut total = 0u64;
        for (&hi, mine) in &self.containers {
            let merged = match other.containers.get(&hi) {
                Some(other_c) => mine.subtract(other_c),
                None => mine.clone(),
            };
            if !merged.is_empty() {
                total += merged.len() as u64;
                next.insert(hi, merged);
            }
        }
        self.containers = next;
        self.cardinality = total;
    }

    /// Return a new bitmap holding the intersection, without mutating either input.
    pub fn intersection(&self, other: &Bitmap) -> Bitmap {
        let mut out = self.clone();
        out.intersect_with(other);
        out
    }

    /// Return a new bitmap holding the union, without mutating either input.
    pub fn union(&self, other: &Bitmap) -> Bitmap {
        let mut out = self.clone();
        out.union_with(other);
        out
    }

    /// Serialize to a portable, endian-stable byte layout (spec §4.1).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(SERIAL_MAGIC).unwrap();
        buf.write_u32::<LittleEndian>(self.containers.len() as u32).unwrap();
        for (&hi, container) in &self.containers {
            buf.write_u64::<LittleEndian>(hi).unwrap();
            match container {
                Container::Array(v) => {
                    buf.write_u8(TAG_ARRAY).unwrap();
                    buf.write_u32::<LittleEndian>(v.len() as u32).unwrap();
                    for &lo in v {
                        buf.write_u16::<LittleEndian>(lo).unwrap();
                    }
                }
                Container::Bitset(words) => {
                    buf.write_u8(TAG_BITSET).unwrap();
                    buf.write_u32::<LittleEndian>(words.len() as u32).unwrap();
                    for &w in words.iter() {
                        buf.write_u64::<LittleEndian>(w).unwrap();
                    }
                }
            }
        }
        buf
    }

    /// Deserialize from the layout written by [`Bitmap::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> io::Result<Bitmap> {
        let mut cur = Cursor::new(bytes);
        let magic = cur.read_u32::<LittleEndian>()?;
        if magic != SERIAL_MAGIC {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad bitmap magic"));
        }
        let container_count = cur.read_u32::<LittleEndian>()?;
        let mut bitmap = Bitmap::new();
        for _ in 0..container_count {
            let hi = cur.read_u64::<LittleEndian>()?;
            let tag = cur.read_u8()?;
            let count = cur.read_u32::<LittleEndian>()? as usize;
            let container = match tag {
                TAG_ARRAY => {
                    let mut v = Vec::with_capacity(count);
                    for _ in 0..count {
                        v.push(cur.read_u16::<LittleEndian>()?);
                    }
                    Container::Array(v)
                }
                TAG_BITSET => {
                    if count != 1024 {
                        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad bitset word count"));
                    }
                    let mut words = Box::new([0u64; 1024]);
                    for w in words.iter_mut() {
                        *w = cur.read_u64::<LittleEndian>()?;
                    }
                    Container::Bitset(words)
                }
                _ => return Err(io::Error::new(io::ErrorKind::InvalidData, "bad container tag")),
            };
            bitmap.cardinality += container.len() as u64;
            bitmap.containers.insert(hi, container);
        }
        // Surface trailing garbage as corruption rather than silently ignoring it.
        let mut trailing = [0u8; 1];
        if cur.read(&mut trailing)? != 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "trailing bytes after bitmap"));
        }
        Ok(bitmap)
    }
}

impl FromIterator<u64> for Bitmap {
    fn from_iter<T: IntoIterator<Item = u64>>(iter: T) -> Self {
        let mut b = Bitmap::new();
        for id in iter {
            b.add(id);
        }
        b
    }
}
