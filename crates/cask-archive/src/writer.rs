use crate::entry::{validate_rel_path, EntryKind};
use crate::error::{PackError, PackResult};

/// Pack format magic bytes.
pub(crate) const PACK_MAGIC: &[u8; 4] = b"CSKP";
/// Current pack format version.
pub(crate) const PACK_VERSION: u32 = 1;
/// zstd level used for entry contents. Archives are written once and read
/// many times, so spend the CPU up front.
const COMPRESSION_LEVEL: i32 = 19;

/// Builds a single-blob directory archive.
///
/// Layout: `magic | version | entry count`, then per entry a type byte,
/// varint path length, UTF-8 path, varint uncompressed and compressed sizes,
/// CRC32 of the compressed bytes, and the zstd-compressed contents. The blob
/// ends with a BLAKE3 checksum of everything before it.
pub struct DirPackWriter {
    entries: Vec<(EntryKind, String, Vec<u8>)>,
}

impl DirPackWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Queue a file entry. `path` is relative to the archive root with
    /// forward-slash separators.
    pub fn add_file(&mut self, path: &str, data: Vec<u8>) -> PackResult<()> {
        validate_rel_path(path)?;
        self.entries.push((EntryKind::File, path.to_string(), data));
        Ok(())
    }

    /// Queue a directory marker. Markers make directories representable in
    /// the format; extraction recreates directory structure from file paths
    /// and skips them.
    pub fn add_dir(&mut self, path: &str) -> PackResult<()> {
        validate_rel_path(path)?;
        self.entries
            .push((EntryKind::Directory, path.to_string(), Vec::new()));
        Ok(())
    }

    /// Number of entries queued.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entries are queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize the archive to a single byte blob.
    pub fn finish(self) -> PackResult<Vec<u8>> {
        let mut pack = Vec::new();

        // Header: magic + version + entry count
        pack.extend_from_slice(PACK_MAGIC);
        pack.extend_from_slice(&PACK_VERSION.to_be_bytes());
        pack.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());

        for (kind, path, data) in &self.entries {
            pack.push(kind.type_byte());

            let path_bytes = path.as_bytes();
            encode_varint(&mut pack, path_bytes.len() as u64);
            pack.extend_from_slice(path_bytes);

            let compressed = zstd::encode_all(data.as_slice(), COMPRESSION_LEVEL)
                .map_err(|e| PackError::CompressionFailed(e.to_string()))?;

            encode_varint(&mut pack, data.len() as u64);
            encode_varint(&mut pack, compressed.len() as u64);
            pack.extend_from_slice(&crc32fast::hash(&compressed).to_be_bytes());
            pack.extend_from_slice(&compressed);
        }

        // Trailer: BLAKE3 checksum of everything so far
        let checksum = *blake3::hash(&pack).as_bytes();
        pack.extend_from_slice(&checksum);

        Ok(pack)
    }
}

impl Default for DirPackWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a u64 as a variable-length integer.
pub(crate) fn encode_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value > 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode a variable-length integer. Returns (value, bytes_consumed).
pub(crate) fn decode_varint(data: &[u8]) -> PackResult<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0;
    for (i, &byte) in data.iter().enumerate() {
        value |= ((byte & 0x7F) as u64) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        if shift >= 64 {
            return Err(PackError::CorruptEntry {
                offset: 0,
                reason: "varint overflow".into(),
            });
        }
    }
    Err(PackError::CorruptEntry {
        offset: 0,
        reason: "truncated varint".into(),
    })
}
