//! On-disk backup container format (spec §6 "Container file format").
//!
//! A fixed header followed by a sequence of typed blocks, trailed by a
//! CRC-32 (zlib polynomial, via `crc32fast`) of the concatenated body
//! payload bytes — not of the per-block headers.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use bt_core::{Error, Result};

pub const MAGIC: [u8; 4] = *b"TAOS";
pub const VERSION: u16 = 0o10;
const COMMIT_ID_LEN: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    pub api_commit_id: [u8; COMMIT_ID_LEN],
    pub server_commit_id: [u8; COMMIT_ID_LEN],
    pub obj_name: String,
    pub timestamp_ms: i64,
    pub vg_id: i8,
    pub file_seq: u32,
}

impl ContainerHeader {
    pub fn new(obj_name: impl Into<String>, timestamp_ms: i64, vg_id: i8, file_seq: u32) -> Self {
        ContainerHeader {
            api_commit_id: [0u8; COMMIT_ID_LEN],
            server_commit_id: [0u8; COMMIT_ID_LEN],
            obj_name: obj_name.into(),
            timestamp_ms,
            vg_id,
            file_seq,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerBlock {
    pub block_type: u8,
    pub msg_type: u16,
    pub msg_body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub header: ContainerHeader,
    pub blocks: Vec<ContainerBlock>,
}

impl Container {
    pub fn new(header: ContainerHeader) -> Self {
        Container { header, blocks: Vec::new() }
    }

    pub fn push_block(&mut self, block_type: u8, msg_type: u16, msg_body: Vec<u8>) {
        self.blocks.push(ContainerBlock { block_type, msg_type, msg_body });
    }

    /// CRC-32 of the concatenated `msg_body` bytes across every block, in
    /// order (spec §8 scenario 7: "the CRC-32 of the six body bytes" for two
    /// payloads of length 2 and 4 — the header and per-block framing bytes
    /// are not part of the checksum).
    fn body_crc(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        for block in &self.blocks {
            hasher.update(&block.msg_body);
        }
        hasher.finalize()
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        let io_err = |e: io::Error| Error::FileIo(e.to_string());

        if self.header.obj_name.len() > u8::MAX as usize {
            return Err(Error::InvalidParam("obj_name exceeds 255 bytes".into()));
        }

        w.write_all(&MAGIC).map_err(io_err)?;
        w.write_u16::<LittleEndian>(VERSION).map_err(io_err)?;
        w.write_all(&self.header.api_commit_id).map_err(io_err)?;
        w.write_all(&self.header.server_commit_id).map_err(io_err)?;
        w.write_u8(self.header.obj_name.len() as u8).map_err(io_err)?;
        w.write_all(self.header.obj_name.as_bytes()).map_err(io_err)?;
        w.write_i64::<LittleEndian>(self.header.timestamp_ms).map_err(io_err)?;
        w.write_i8(self.header.vg_id).map_err(io_err)?;
        w.write_u32::<LittleEndian>(self.header.file_seq).map_err(io_err)?;

        for block in &self.blocks {
            w.write_u8(block.block_type).map_err(io_err)?;
            w.write_u32::<LittleEndian>(block.msg_body.len() as u32).map_err(io_err)?;
            w.write_u16::<LittleEndian>(block.msg_type).map_err(io_err)?;
            w.write_all(&block.msg_body).map_err(io_err)?;
        }

        w.write_u32::<LittleEndian>(self.body_crc()).map_err(io_err)?;
        Ok(())
    }

    /// Reads a container and verifies its trailing CRC. There is no block
    /// count in the header, so blocks are parsed until the remaining bytes
    /// equal exactly the 4-byte CRC trailer.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let io_err = |e: io::Error| Error::FileIo(e.to_string());

        let mut magic = [0u8; 4];
        r.read_exact(&mut magic).map_err(io_err)?;
        if magic != MAGIC {
            return Err(Error::DataCorruption("bad container magic".into()));
        }
        let version = r.read_u16::<LittleEndian>().map_err(io_err)?;
        if version != VERSION {
            return Err(Error::DataCorruption(format!("unsupported container version {version:#o}")));
        }

        let mut api_commit_id = [0u8; COMMIT_ID_LEN];
        r.read_exact(&mut api_commit_id).map_err(io_err)?;
        let mut server_commit_id = [0u8; COMMIT_ID_LEN];
        r.read_exact(&mut server_commit_id).map_err(io_err)?;

        let obj_name_len = r.read_u8().map_err(io_err)? as usize;
        let mut obj_name_bytes = vec![0u8; obj_name_len];
        r.read_exact(&mut obj_name_bytes).map_err(io_err)?;
        let obj_name = String::from_utf8(obj_name_bytes)
            .map_err(|_| Error::DataCorruption("obj_name is not valid UTF-8".into()))?;

        let timestamp_ms = r.read_i64::<LittleEndian>().map_err(io_err)?;
        let vg_id = r.read_i8().map_err(io_err)?;
        let file_seq = r.read_u32::<LittleEndian>().map_err(io_err)?;

        // Read the rest of the stream so the block loop can stop exactly at
        // the 4-byte CRC trailer without needing a block count up front.
        let mut rest = Vec::new();
        r.read_to_end(&mut rest).map_err(io_err)?;
        if rest.len() < 4 {
            return Err(Error::DataCorruption("container truncated before CRC trailer".into()));
        }
        let (body, crc_bytes) = rest.split_at(rest.len() - 4);
        let stored_crc = u32::from_le_bytes(crc_bytes.try_into().unwrap());

        let mut blocks = Vec::new();
        let mut cursor = io::Cursor::new(body);
        let mut hasher = crc32fast::Hasher::new();
        while (cursor.position() as usize) < body.len() {
            let block_type = cursor.read_u8().map_err(io_err)?;
            let msg_len = cursor.read_u32::<LittleEndian>().map_err(io_err)? as usize;
            let msg_type = cursor.read_u16::<LittleEndian>().map_err(io_err)?;
            let mut msg_body = vec![0u8; msg_len];
            cursor.read_exact(&mut msg_body).map_err(io_err)?;
            hasher.update(&msg_body);
            blocks.push(ContainerBlock { block_type, msg_type, msg_body });
        }

        if hasher.finalize() != stored_crc {
            return Err(Error::DataCorruption("container CRC mismatch".into()));
        }

        Ok(Container {
            header: ContainerHeader {
                api_commit_id,
                server_commit_id,
                obj_name,
                timestamp_ms,
                vg_id,
                file_seq,
            },
            blocks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_header_and_blocks_through_a_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.taosz");

        let mut container = Container::new(ContainerHeader::new("db1", 1_700_000_000_000, 2, 7));
        container.push_block(1, 10, b"aa".to_vec());
        container.push_block(2, 20, b"bbbb".to_vec());

        let mut file = std::fs::File::create(&path).unwrap();
        container.write_to(&mut file).unwrap();
        drop(file);

        let mut file = std::fs::File::open(&path).unwrap();
        let read_back = Container::read_from(&mut file).unwrap();

        assert_eq!(read_back.header.obj_name, "db1");
        assert_eq!(read_back.header.timestamp_ms, 1_700_000_000_000);
        assert_eq!(read_back.header.vg_id, 2);
        assert_eq!(read_back.header.file_seq, 7);
        assert_eq!(read_back.blocks.len(), 2);
        assert_eq!(read_back.blocks[0].msg_body, b"aa");
        assert_eq!(read_back.blocks[1].msg_body, b"bbbb");

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(b"aa");
        hasher.update(b"bbbb");
        assert_eq!(container.body_crc(), hasher.finalize());
    }

    #[test]
    fn rejects_a_corrupted_trailer() {
        let mut container = Container::new(ContainerHeader::new("db1", 0, 0, 0));
        container.push_block(1, 0, b"payload".to_vec());

        let mut bytes = Vec::new();
        container.write_to(&mut bytes).unwrap();
        *bytes.last_mut().unwrap() ^= 0xFF;

        let err = Container::read_from(&mut io::Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, Error::DataCorruption(_)));
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = vec![0u8; 32];
        let err = Container::read_from(&mut io::Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, Error::DataCorruption(_)));
    }
}
