//! A contiguous, appendable, index-addressed string store (§4.1).
//!
//! Mirrors the original `binary_string_table`: a header, a dense array
//! of `{offset, length}` entries, and a single contiguous blob of
//! concatenated, unterminated string bytes. Append is the only
//! mutation; there is no delete.

use crate::error::StringTableError;
use bytemuck::{Pod, Zeroable};

/// `entry_count` ‖ `data_block_size`, exactly as laid out on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
pub struct StringTableHeader {
    pub entry_count: u32,
    pub data_block_size: u32,
}

static_assertions::const_assert_eq!(std::mem::size_of::<StringTableHeader>(), 8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
pub struct StringTableEntry {
    pub offset: u32,
    pub length: u32,
}

static_assertions::const_assert_eq!(std::mem::size_of::<StringTableEntry>(), 8);

/// Append-only, index-addressed string blob. See module docs.
#[derive(Debug, Clone, Default)]
pub struct StringTable {
    entries: Vec<StringTableEntry>,
    data: Vec<u8>,
}

impl StringTable {
    /// An empty table, zero entries, empty blob.
    pub fn new() -> Self {
        StringTable::default()
    }

    /// Appends `bytes` to the blob with no terminator and records a new
    /// entry. Returns the new index, which equals the prior entry count.
    ///
    /// Fails if `bytes` is empty.
    pub fn add(&mut self, bytes: &[u8]) -> Result<u32, StringTableError> {
        if bytes.is_empty() {
            return Err(StringTableError::EmptyString);
        }
        let entry = StringTableEntry {
            offset: self.data.len() as u32,
            length: bytes.len() as u32,
        };
        self.data.extend_from_slice(bytes);
        self.entries.push(entry);
        Ok((self.entries.len() - 1) as u32)
    }

    /// Appends a UTF-8 string; convenience wrapper over [`Self::add`].
    pub fn add_str(&mut self, s: &str) -> Result<u32, StringTableError> {
        self.add(s.as_bytes())
    }

    fn entry(&self, index: u32) -> Result<StringTableEntry, StringTableError> {
        self.entries
            .get(index as usize)
            .copied()
            .ok_or(StringTableError::IndexOutOfRange {
                index,
                len: self.entries.len() as u32,
            })
    }

    /// A freshly allocated, null-terminated copy of the stored bytes.
    pub fn get(&self, index: u32) -> Result<Vec<u8>, StringTableError> {
        let entry = self.entry(index)?;
        let start = entry.offset as usize;
        let end = start + entry.length as usize;
        let mut out = Vec::with_capacity(entry.length as usize + 1);
        out.extend_from_slice(&self.data[start..end]);
        out.push(0);
        Ok(out)
    }

    /// The stored bytes as a `&str`, without allocating or copying.
    pub fn get_str(&self, index: u32) -> Result<&str, StringTableError> {
        let entry = self.entry(index)?;
        let start = entry.offset as usize;
        let end = start + entry.length as usize;
        // The table only ever stores bytes handed to it via `add`/`add_str`;
        // malformed UTF-8 can only arrive through `add` with raw bytes.
        Ok(std::str::from_utf8(&self.data[start..end]).unwrap_or(""))
    }

    /// Copies the raw, unterminated bytes of `index` into `buffer`.
    ///
    /// `buffer` must be at least [`Self::length`] bytes long.
    pub fn get_into(&self, index: u32, buffer: &mut [u8]) -> Result<(), StringTableError> {
        let entry = self.entry(index)?;
        let start = entry.offset as usize;
        let end = start + entry.length as usize;
        buffer[..entry.length as usize].copy_from_slice(&self.data[start..end]);
        Ok(())
    }

    /// The stored length of `index`, excluding the (absent) terminator.
    pub fn length(&self, index: u32) -> Result<u32, StringTableError> {
        Ok(self.entry(index)?.length)
    }

    pub fn entry_count(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn data_block_size(&self) -> u32 {
        self.data.len() as u32
    }

    fn header(&self) -> StringTableHeader {
        StringTableHeader {
            entry_count: self.entry_count(),
            data_block_size: self.data_block_size(),
        }
    }

    /// Total size of the serialized form: header ‖ entries ‖ blob.
    pub fn serialized_size(&self) -> usize {
        std::mem::size_of::<StringTableHeader>()
            + self.entries.len() * std::mem::size_of::<StringTableEntry>()
            + self.data.len()
    }

    /// Serializes as header ‖ entry array ‖ blob into a single allocation.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.serialized_size());
        out.extend_from_slice(bytemuck::bytes_of(&self.header()));
        out.extend_from_slice(bytemuck::cast_slice(&self.entries));
        out.extend_from_slice(&self.data);
        out
    }

    /// Reconstructs a table by reading the header at the start of
    /// `block`, then copying the entry array and blob into owned
    /// storage. `block` is not retained.
    pub fn from_block(block: &[u8]) -> Result<Self, StringTableError> {
        let header_size = std::mem::size_of::<StringTableHeader>();
        let header: StringTableHeader = *bytemuck::from_bytes(
            block
                .get(..header_size)
                .ok_or(StringTableError::IndexOutOfRange { index: 0, len: 0 })?,
        );

        let entry_size = std::mem::size_of::<StringTableEntry>();
        let entries_len = entry_size * header.entry_count as usize;
        let entries_start = header_size;
        let entries_end = entries_start + entries_len;
        let entries: Vec<StringTableEntry> = bytemuck::cast_slice(
            block
                .get(entries_start..entries_end)
                .ok_or(StringTableError::IndexOutOfRange { index: 0, len: 0 })?,
        )
        .to_vec();

        let data_start = entries_end;
        let data_end = data_start + header.data_block_size as usize;
        let data = block
            .get(data_start..data_end)
            .ok_or(StringTableError::IndexOutOfRange { index: 0, len: 0 })?
            .to_vec();

        Ok(StringTable { entries, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_order_and_contents() {
        let strings = ["cube", "mat_cube", "root_bone", "a_very_long_material_name"];
        let mut table = StringTable::new();
        for s in &strings {
            table.add_str(s).unwrap();
        }
        assert_eq!(table.entry_count(), strings.len() as u32);

        let serialized = table.serialize();
        let restored = StringTable::from_block(&serialized).unwrap();
        assert_eq!(restored.entry_count(), strings.len() as u32);
        for (i, expected) in strings.iter().enumerate() {
            assert_eq!(restored.get_str(i as u32).unwrap(), *expected);
            let terminated = restored.get(i as u32).unwrap();
            assert_eq!(&terminated[..terminated.len() - 1], expected.as_bytes());
            assert_eq!(*terminated.last().unwrap(), 0);
        }
    }

    #[test]
    fn add_empty_fails() {
        let mut table = StringTable::new();
        assert!(matches!(table.add(&[]), Err(StringTableError::EmptyString)));
    }

    #[test]
    fn out_of_range_access_fails() {
        let table = StringTable::new();
        assert!(matches!(
            table.get(0),
            Err(StringTableError::IndexOutOfRange { index: 0, len: 0 })
        ));
    }

    #[test]
    fn get_into_copies_raw_bytes_without_terminator() {
        let mut table = StringTable::new();
        let idx = table.add_str("hello").unwrap();
        let mut buf = [0u8; 5];
        table.get_into(idx, &mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }
}
