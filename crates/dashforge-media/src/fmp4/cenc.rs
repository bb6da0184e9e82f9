//! Common Encryption atoms shared by the init segment (`sinf`/`pssh`) and
//! media segment (`senc`/`saiz`/`saio`) writers.

use bytes::{BufMut, BytesMut};

use crate::atom::{begin_box, end_box, write_fullbox_header};
use crate::track::{ProtectionSystem, SubsamplePair, Track};

/// `sinf{frma, schm, schi{tenc}}` wrapping an encrypted sample entry.
pub fn write_sinf(buf: &mut BytesMut, original_format: &[u8; 4], key_id: &[u8; 16]) {
    let start = begin_box(buf, b"sinf");

    let frma_start = begin_box(buf, b"frma");
    buf.put_slice(original_format);
    end_box(buf, frma_start);

    let schm_start = begin_box(buf, b"schm");
    write_fullbox_header(buf, 0, 0);
    buf.put_slice(b"cenc");
    buf.put_u32(0x0001_0000); // scheme version "1.0"
    end_box(buf, schm_start);

    let schi_start = begin_box(buf, b"schi");
    write_tenc(buf, key_id);
    end_box(buf, schi_start);

    end_box(buf, start);
}

fn write_tenc(buf: &mut BytesMut, key_id: &[u8; 16]) {
    let start = begin_box(buf, b"tenc");
    write_fullbox_header(buf, 0, 0);
    buf.put_u8(0); // reserved
    buf.put_u8(1); // default_IsProtected
    buf.put_u8(crate::track::CENC_IV_LEN as u8); // default_Per_Sample_IV_Size
    buf.put_slice(key_id);
    end_box(buf, start);
}

/// One `pssh` atom per registered protection system.
pub fn write_pssh_atoms(buf: &mut BytesMut, systems: &[ProtectionSystem]) {
    for system in systems {
        let start = begin_box(buf, b"pssh");
        write_fullbox_header(buf, 0, 0);
        buf.put_slice(&system.system_id);
        buf.put_u32(system.private_data.len() as u32);
        buf.put_slice(&system.private_data);
        end_box(buf, start);
    }
}

/// `senc`: per-sample IV, and (when the track uses subsample encryption) a
/// subsample count followed by `(clear u16, encrypted u32)` pairs.
pub fn write_senc(buf: &mut BytesMut, track: &Track) {
    let flags = if track.uses_subsample_encryption() { 2 } else { 0 };
    let start = begin_box(buf, b"senc");
    write_fullbox_header(buf, 0, flags);
    buf.put_u32(track.pending_samples().len() as u32);
    for sample in track.pending_samples() {
        match &sample.encryption {
            Some(enc) => {
                buf.put_slice(&enc.iv);
                if let Some(subsamples) = &enc.subsamples {
                    buf.put_u16(subsamples.len() as u16);
                    for pair in subsamples {
                        write_subsample_pair(buf, pair);
                    }
                }
            }
            None => buf.put_bytes(0, crate::track::CENC_IV_LEN),
        }
    }
    end_box(buf, start);
}

fn write_subsample_pair(buf: &mut BytesMut, pair: &SubsamplePair) {
    buf.put_u16(pair.clear);
    buf.put_u32(pair.encrypted);
}

/// `saiz`: default sample info size 0 (per-sample sizes follow explicitly).
pub fn write_saiz(buf: &mut BytesMut, track: &Track) {
    let start = begin_box(buf, b"saiz");
    write_fullbox_header(buf, 0, 0);
    buf.put_u8(0); // default_sample_info_size
    buf.put_u32(track.pending_samples().len() as u32);
    for sample in track.pending_samples() {
        let size = sample
            .encryption
            .as_ref()
            .map(|e| e.senc_entry_size())
            .unwrap_or(crate::track::CENC_IV_LEN as u64);
        buf.put_u8(size as u8);
    }
    end_box(buf, start);
}

/// `saio`: a single offset pointing at the first byte of the `senc` entry
/// list, computed from the known prefix of boxes preceding it in `traf`.
pub fn write_saio(buf: &mut BytesMut, senc_offset_from_moof_start: u64) {
    let start = begin_box(buf, b"saio");
    write_fullbox_header(buf, 0, 0);
    buf.put_u32(1); // entry_count
    buf.put_u32(senc_offset_from_moof_start as u32);
    end_box(buf, start);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::AtomReader;

    #[test]
    fn sinf_wraps_frma_schm_schi_tenc() {
        let mut buf = BytesMut::new();
        let key_id = [0xAAu8; 16];
        write_sinf(&mut buf, b"avc1", &key_id);

        let mut reader = AtomReader::new(&buf);
        let sinf = reader.read_header().unwrap();
        assert_eq!(&sinf.tag, b"sinf");

        let frma = reader.read_header().unwrap();
        assert_eq!(&frma.tag, b"frma");
        assert_eq!(reader.read_bytes(4).unwrap(), b"avc1");

        let schm = reader.read_header().unwrap();
        assert_eq!(&schm.tag, b"schm");
        reader.read_fullbox_header().unwrap();
        assert_eq!(reader.read_bytes(4).unwrap(), b"cenc");
        assert_eq!(reader.read_u32().unwrap(), 0x0001_0000);

        let schi = reader.read_header().unwrap();
        assert_eq!(&schi.tag, b"schi");
        let tenc = reader.read_header().unwrap();
        assert_eq!(&tenc.tag, b"tenc");
    }

    #[test]
    fn pssh_atom_carries_system_id_and_private_data() {
        let mut buf = BytesMut::new();
        let systems = vec![ProtectionSystem {
            system_id: [0x11; 16],
            private_data: vec![0xde, 0xad, 0xbe, 0xef],
        }];
        write_pssh_atoms(&mut buf, &systems);

        let mut reader = AtomReader::new(&buf);
        let header = reader.read_header().unwrap();
        assert_eq!(&header.tag, b"pssh");
        reader.read_fullbox_header().unwrap();
        assert_eq!(reader.read_bytes(16).unwrap(), &[0x11; 16]);
        assert_eq!(reader.read_u32().unwrap(), 4);
        assert_eq!(reader.read_bytes(4).unwrap(), &[0xde, 0xad, 0xbe, 0xef]);
    }
}
