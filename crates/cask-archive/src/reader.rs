use crate::entry::{validate_rel_path, EntryKind, PackEntry};
use crate::error::{PackError, PackResult};
use crate::writer::{decode_varint, PACK_MAGIC, PACK_VERSION};

/// Pack header size: magic + version + entry count.
const HEADER_LEN: usize = 12;
/// BLAKE3 trailer size.
const TRAILER_LEN: usize = 32;

/// Reads entries back out of a single-blob directory archive.
///
/// The header, version, and trailer checksum are validated on open; each
/// entry's CRC is checked before decompression during iteration.
pub struct DirPackReader {
    data: Vec<u8>,
    entry_count: u32,
}

impl DirPackReader {
    /// Open an archive from its raw bytes.
    pub fn from_bytes(data: Vec<u8>) -> PackResult<Self> {
        if data.len() < HEADER_LEN + TRAILER_LEN {
            return Err(PackError::CorruptEntry {
                offset: 0,
                reason: "pack data too short".into(),
            });
        }
        if &data[0..4] != PACK_MAGIC {
            return Err(PackError::InvalidMagic {
                expected: String::from_utf8_lossy(PACK_MAGIC).into(),
                actual: String::from_utf8_lossy(&data[0..4]).into(),
            });
        }
        let version = u32::from_be_bytes(data[4..8].try_into().expect("4-byte slice"));
        if version != PACK_VERSION {
            return Err(PackError::UnsupportedVersion(version));
        }

        let body_end = data.len() - TRAILER_LEN;
        let expected: [u8; 32] = data[body_end..].try_into().expect("32-byte slice");
        let actual = *blake3::hash(&data[..body_end]).as_bytes();
        if expected != actual {
            return Err(PackError::ChecksumMismatch);
        }

        let entry_count = u32::from_be_bytes(data[8..12].try_into().expect("4-byte slice"));
        Ok(Self { data, entry_count })
    }

    /// Number of entries in the archive.
    pub fn entry_count(&self) -> u32 {
        self.entry_count
    }

    /// Iterate over entries in pack order, decompressing one at a time.
    pub fn entries(&self) -> Entries<'_> {
        Entries {
            reader: self,
            pos: HEADER_LEN,
            remaining: self.entry_count,
        }
    }

    fn read_entry_at(&self, pos: usize) -> PackResult<(PackEntry, usize)> {
        let offset = pos as u64;
        let body = &self.data[..self.data.len() - TRAILER_LEN];

        let corrupt = |reason: &str| PackError::CorruptEntry {
            offset,
            reason: reason.into(),
        };

        let mut pos = pos;
        if pos >= body.len() {
            return Err(corrupt("entry offset beyond pack body"));
        }

        let type_byte = body[pos];
        pos += 1;
        let kind = EntryKind::from_type_byte(type_byte)
            .ok_or_else(|| corrupt(&format!("unknown type byte: {type_byte}")))?;

        let (path_len, consumed) = decode_varint(&body[pos..])?;
        pos += consumed;
        // Varint values come straight from the blob; checked math keeps a
        // hostile length a typed error instead of a panic.
        let path_end = usize::try_from(path_len)
            .ok()
            .and_then(|len| pos.checked_add(len))
            .filter(|&end| end <= body.len())
            .ok_or_else(|| corrupt("path extends beyond pack body"))?;
        let path = std::str::from_utf8(&body[pos..path_end])
            .map_err(|_| corrupt("entry path is not valid UTF-8"))?
            .to_string();
        validate_rel_path(&path)?;
        pos = path_end;

        let (uncompressed_size, consumed) = decode_varint(&body[pos..])?;
        pos += consumed;
        let (compressed_size, consumed) = decode_varint(&body[pos..])?;
        pos += consumed;

        let crc_end = pos
            .checked_add(4)
            .filter(|&end| end <= body.len())
            .ok_or_else(|| corrupt("entry truncated before CRC"))?;
        let expected_crc = u32::from_be_bytes(body[pos..crc_end].try_into().expect("4-byte slice"));
        pos = crc_end;

        let end = usize::try_from(compressed_size)
            .ok()
            .and_then(|len| pos.checked_add(len))
            .filter(|&end| end <= body.len())
            .ok_or_else(|| corrupt("compressed data extends beyond pack body"))?;
        let compressed = &body[pos..end];

        if crc32fast::hash(compressed) != expected_crc {
            return Err(PackError::CrcMismatch { path });
        }

        let data = zstd::decode_all(compressed)
            .map_err(|e| PackError::DecompressionFailed(e.to_string()))?;
        if data.len() != uncompressed_size as usize {
            return Err(corrupt(&format!(
                "size mismatch: expected {uncompressed_size}, got {}",
                data.len()
            )));
        }

        Ok((PackEntry { kind, path, data }, end))
    }
}

impl std::fmt::Debug for DirPackReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirPackReader")
            .field("entry_count", &self.entry_count)
            .field("pack_bytes", &self.data.len())
            .finish()
    }
}

/// Iterator over [`PackEntry`] values, yielded in pack order.
pub struct Entries<'a> {
    reader: &'a DirPackReader,
    pos: usize,
    remaining: u32,
}

impl Iterator for Entries<'_> {
    type Item = PackResult<PackEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        match self.reader.read_entry_at(self.pos) {
            Ok((entry, next_pos)) => {
                self.pos = next_pos;
                Some(Ok(entry))
            }
            Err(e) => {
                // Stop after the first corrupt entry; offsets past it are
                // meaningless.
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }
}
