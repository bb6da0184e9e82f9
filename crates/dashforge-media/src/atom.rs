//! Atom codec (C1): read/write ISO BMFF atom headers, fixed-size big-endian
//! integers, and buffers. The codec never interprets payloads — it is purely
//! a structural layer that higher modules (`track`, `fmp4`) build on.
//!
//! An atom is a 32-bit big-endian size (including its own 8-byte header)
//! followed by a 4-byte ASCII tag, then `size - 8` payload bytes.

use crate::error::{Error, Result};
use bytes::{BufMut, BytesMut};

/// Container tags that are descended into rather than interpreted directly.
pub const CONTAINER_TAGS: &[&[u8; 4]] = &[
    b"moov", b"trak", b"mdia", b"minf", b"stbl", b"moof", b"traf", b"mvex", b"edts", b"dinf",
    b"schi", b"sinf",
];

pub fn is_container_tag(tag: &[u8; 4]) -> bool {
    CONTAINER_TAGS.iter().any(|t| *t == tag)
}

/// A parsed atom header: its tag, its total size (header included), and the
/// width of the header itself (8 bytes, or 16 for a 64-bit extended size).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomHeader {
    pub tag: [u8; 4],
    pub size: u64,
    pub header_size: u8,
    /// Absolute offset of this atom's first header byte in the buffer it
    /// was read from.
    pub start: usize,
}

impl AtomHeader {
    /// Size of the payload, excluding the header.
    pub fn content_size(&self) -> u64 {
        self.size.saturating_sub(self.header_size as u64)
    }

    /// Absolute offset one past this atom's last byte.
    pub fn end(&self) -> usize {
        self.start + self.size as usize
    }

    pub fn tag_str(&self) -> &str {
        std::str::from_utf8(&self.tag).unwrap_or("????")
    }
}

/// A cursor-style reader over an in-memory atom tree (an init segment, a
/// media segment, or a fetched fragment — all small enough to hold whole).
pub struct AtomReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> AtomReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn seek_to(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(Error::malformed_input("seek past end of buffer"));
        }
        self.pos = pos;
        Ok(())
    }

    /// Read an atom header at the current position, advancing past it.
    pub fn read_header(&mut self) -> Result<AtomHeader> {
        let start = self.pos;
        let size32 = self.read_u32()?;
        let tag = self.read_tag()?;
        if size32 == 1 {
            let size = self.read_u64()?;
            Ok(AtomHeader {
                tag,
                size,
                header_size: 16,
                start,
            })
        } else {
            Ok(AtomHeader {
                tag,
                size: size32 as u64,
                header_size: 8,
                start,
            })
        }
    }

    /// Skip past the remainder of `header`'s payload, regardless of how much
    /// of its body has already been read (used for unrecognized atoms, and
    /// to resume sibling search after partially parsing a known one).
    pub fn skip_box(&mut self, header: &AtomHeader) -> Result<()> {
        self.seek_to(header.end())
    }

    /// Find the first direct child atom with the given tag, starting the
    /// search from the current position and scanning `limit` bytes forward.
    /// Leaves the reader positioned just past the child's header on success.
    pub fn find_child_box(&mut self, tag: &[u8; 4], limit: usize) -> Result<Option<AtomHeader>> {
        let end = (self.pos + limit).min(self.data.len());
        while self.pos < end {
            let start = self.pos;
            let header = self.read_header()?;
            if &header.tag == tag {
                return Ok(Some(header));
            }
            let next = start + header.size as usize;
            if next <= start || next > self.data.len() {
                return Ok(None);
            }
            self.seek_to(next)?;
        }
        Ok(None)
    }

    pub fn read_tag(&mut self) -> Result<[u8; 4]> {
        let bytes = self.read_bytes(4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::malformed_input("unexpected end of atom buffer"));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u24(&mut self) -> Result<u32> {
        let b = self.read_bytes(3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let b = self.read_bytes(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(u64::from_be_bytes(arr))
    }

    /// Read a full-box version/flags pair (`u8` version, `u24` flags).
    pub fn read_fullbox_header(&mut self) -> Result<(u8, u32)> {
        let version = self.read_u8()?;
        let flags = self.read_u24()?;
        Ok((version, flags))
    }

    /// Descend through a chain of container tags, e.g. `[moov, trak, mdia]`,
    /// leaving the reader positioned just past the final tag's header. The
    /// search at each level is bounded by its parent's content size.
    pub fn descend(&mut self, path: &[&[u8; 4]]) -> Result<Option<AtomHeader>> {
        let mut limit = self.remaining();
        let mut header = None;
        for tag in path {
            match self.find_child_box(tag, limit)? {
                Some(h) => {
                    limit = h.content_size() as usize;
                    header = Some(h);
                }
                None => return Ok(None),
            }
        }
        Ok(header)
    }

    /// Like [`Self::descend`], but starting inside an already-known parent
    /// atom rather than from the reader's current position — every level,
    /// including the first, is bounded by its immediate parent's content
    /// size.
    pub fn descend_from(&mut self, parent: &AtomHeader, path: &[&[u8; 4]]) -> Result<Option<AtomHeader>> {
        self.seek_to(parent.start + parent.header_size as usize)?;
        let mut limit = parent.content_size() as usize;
        let mut header = None;
        for tag in path {
            match self.find_child_box(tag, limit)? {
                Some(h) => {
                    limit = h.content_size() as usize;
                    header = Some(h);
                }
                None => return Ok(None),
            }
        }
        Ok(header)
    }
}

/// Begin writing a size-prefixed box: emits a zero placeholder size and the
/// tag, returning the offset the placeholder lives at so [`end_box`] can
/// patch it once the body has been written.
pub fn begin_box(buf: &mut BytesMut, tag: &[u8; 4]) -> usize {
    let start = buf.len();
    buf.put_u32(0);
    buf.put_slice(tag);
    start
}

/// Patch the placeholder written by [`begin_box`] with the box's true size
/// now that its body is known.
pub fn end_box(buf: &mut BytesMut, start: usize) {
    let size = (buf.len() - start) as u32;
    buf[start..start + 4].copy_from_slice(&size.to_be_bytes());
}

/// Write a complete leaf atom in one call, given its tag and payload.
pub fn write_atom(buf: &mut BytesMut, tag: &[u8; 4], payload: &[u8]) {
    buf.put_u32((8 + payload.len()) as u32);
    buf.put_slice(tag);
    buf.put_slice(payload);
}

/// Write a zero-filled atom of a chosen payload size (used for `free`
/// padding atoms that carry no meaningful content).
pub fn write_zero_atom(buf: &mut BytesMut, tag: &[u8; 4], payload_size: usize) {
    buf.put_u32((8 + payload_size) as u32);
    buf.put_slice(tag);
    buf.put_bytes(0, payload_size);
}

/// Write a `free` atom carrying an ASCII message as its payload (the
/// reference embeds `"DashMe"` in every init segment's free atom).
pub fn write_free_atom(buf: &mut BytesMut, message: &[u8]) {
    write_atom(buf, b"free", message);
}

/// Write a full-box version/flags header (no tag/size — caller already
/// emitted those via [`begin_box`]).
pub fn write_fullbox_header(buf: &mut BytesMut, version: u8, flags: u32) {
    buf.put_u8(version);
    buf.put_slice(&flags.to_be_bytes()[1..4]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_leaf_atom() {
        let mut buf = BytesMut::new();
        write_atom(&mut buf, b"test", b"hello");
        assert_eq!(buf.len(), 8 + 5);

        let mut reader = AtomReader::new(&buf);
        let header = reader.read_header().unwrap();
        assert_eq!(&header.tag, b"test");
        assert_eq!(header.size, 13);
        assert_eq!(header.content_size(), 5);
        assert_eq!(reader.read_bytes(5).unwrap(), b"hello");
    }

    #[test]
    fn begin_end_box_patches_the_correct_size() {
        let mut buf = BytesMut::new();
        let start = begin_box(&mut buf, b"moov");
        buf.put_slice(b"payload-bytes");
        end_box(&mut buf, start);

        let mut reader = AtomReader::new(&buf);
        let header = reader.read_header().unwrap();
        assert_eq!(header.size, 8 + 13);
        assert_eq!(&header.tag, b"moov");
    }

    #[test]
    fn skip_box_advances_past_unknown_atoms() {
        let mut buf = BytesMut::new();
        write_atom(&mut buf, b"xxxx", b"ignored-payload");
        write_atom(&mut buf, b"tkhd", b"kept");

        let mut reader = AtomReader::new(&buf);
        let header = reader.read_header().unwrap();
        reader.skip_box(&header).unwrap();
        let next = reader.read_header().unwrap();
        assert_eq!(&next.tag, b"tkhd");
    }

    #[test]
    fn find_child_box_locates_a_nested_tag() {
        let mut buf = BytesMut::new();
        write_atom(&mut buf, b"aaaa", b"1");
        write_atom(&mut buf, b"bbbb", b"22");
        write_atom(&mut buf, b"cccc", b"333");

        let mut reader = AtomReader::new(&buf);
        let found = reader.find_child_box(b"bbbb", buf.len()).unwrap();
        assert!(found.is_some());
        assert_eq!(reader.read_bytes(2).unwrap(), b"22");
    }

    #[test]
    fn fixed_width_integers_round_trip() {
        let mut buf = BytesMut::new();
        buf.put_u8(0x01);
        buf.put_slice(&0x020304u32.to_be_bytes()[1..4]);
        buf.put_u32(0x05060708);
        buf.put_u64(0x090a0b0c0d0e0f10);

        let mut reader = AtomReader::new(&buf);
        assert_eq!(reader.read_u8().unwrap(), 0x01);
        assert_eq!(reader.read_u24().unwrap(), 0x020304);
        assert_eq!(reader.read_u32().unwrap(), 0x05060708);
        assert_eq!(reader.read_u64().unwrap(), 0x090a0b0c0d0e0f10);
    }

    #[test]
    fn descend_walks_nested_containers_by_tag_chain() {
        let mut inner = BytesMut::new();
        write_atom(&mut inner, b"mdhd", b"timescale-bytes");

        let mut mdia = BytesMut::new();
        let start = begin_box(&mut mdia, b"mdia");
        mdia.put_slice(&inner);
        end_box(&mut mdia, start);

        let mut trak = BytesMut::new();
        let start = begin_box(&mut trak, b"trak");
        trak.put_slice(&mdia);
        end_box(&mut trak, start);

        let mut moov = BytesMut::new();
        let start = begin_box(&mut moov, b"moov");
        moov.put_slice(&trak);
        end_box(&mut moov, start);

        let mut reader = AtomReader::new(&moov);
        let found = reader.descend(&[b"trak", b"mdia", b"mdhd"]).unwrap();
        assert_eq!(&found.unwrap().tag, b"mdhd");
    }

    #[test]
    fn descend_from_bounds_the_first_level_by_parent_content_size() {
        let mut buf = BytesMut::new();
        let trak_start = begin_box(&mut buf, b"trak");
        write_atom(&mut buf, b"tkhd", b"x");
        end_box(&mut buf, trak_start);
        // a sibling atom after `trak` that also happens to be named `tkhd`
        // must not be reachable from a `descend_from(&trak, ...)` call.
        write_atom(&mut buf, b"tkhd", b"sibling");

        let mut reader = AtomReader::new(&buf);
        let trak = reader.read_header().unwrap();
        reader.skip_box(&trak).unwrap();

        let mut reader = AtomReader::new(&buf);
        let trak = reader.find_child_box(b"trak", buf.len()).unwrap().unwrap();
        let found = reader.descend_from(&trak, &[b"tkhd"]).unwrap().unwrap();
        assert_eq!(reader.read_bytes(1).unwrap(), b"x");
        assert_eq!(found.content_size(), 1);
    }

    #[test]
    fn container_tags_match_the_fixed_set() {
        assert!(is_container_tag(b"moov"));
        assert!(is_container_tag(b"sinf"));
        assert!(!is_container_tag(b"stsd"));
    }
}
