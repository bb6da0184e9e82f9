//! Initialization segment: `ftyp` + `free("DashMe")` + `moov` for a single
//! track. One init segment is built per track — `init_<kind><n>.mp4`.

use bytes::{BufMut, BytesMut};

use crate::atom::{begin_box, end_box, write_fullbox_header};
use crate::error::Result;
use crate::fmp4::cenc;
use crate::fmp4::{COMPATIBLE_BRANDS, FREE_MESSAGE, MAJOR_BRAND, MINOR_VERSION};
use crate::track::{Kind, Track};

/// Unity 3x3 transformation matrix stored as nine 32-bit fixed-point values,
/// per the ISO BMFF `mvhd`/`tkhd` convention.
const UNITY_MATRIX: [u32; 9] = [
    0x0001_0000,
    0,
    0,
    0,
    0x0001_0000,
    0,
    0,
    0,
    0x4000_0000,
];

fn write_matrix(buf: &mut BytesMut) {
    for value in UNITY_MATRIX {
        buf.put_u32(value);
    }
}

/// Build the init segment bytes for a single track.
pub fn build_init_segment(track: &Track) -> Result<bytes::Bytes> {
    let mut buf = BytesMut::new();
    write_ftyp(&mut buf);
    crate::atom::write_free_atom(&mut buf, FREE_MESSAGE);
    write_moov(&mut buf, track)?;
    Ok(buf.freeze())
}

fn write_ftyp(buf: &mut BytesMut) {
    let start = begin_box(buf, b"ftyp");
    buf.put_slice(MAJOR_BRAND);
    buf.put_u32(MINOR_VERSION);
    for brand in COMPATIBLE_BRANDS {
        buf.put_slice(brand);
    }
    end_box(buf, start);
}

fn write_moov(buf: &mut BytesMut, track: &Track) -> Result<()> {
    let start = begin_box(buf, b"moov");
    write_mvhd(buf, track);
    write_trak(buf, track)?;
    write_mvex(buf);
    if let Some(encryption) = &track.encryption {
        cenc::write_pssh_atoms(buf, &encryption.systems);
    }
    end_box(buf, start);
    Ok(())
}

fn write_mvhd(buf: &mut BytesMut, track: &Track) {
    let start = begin_box(buf, b"mvhd");
    write_fullbox_header(buf, 0, 0);
    buf.put_u32(track.creation_time as u32);
    buf.put_u32(track.modification_time as u32);
    buf.put_u32(track.global_timescale);
    buf.put_u32(track.duration as u32);
    buf.put_u32(0x0001_0000); // rate 1.0
    buf.put_u16(0x0100); // volume 1.0
    buf.put_u16(0); // reserved
    buf.put_u64(0); // reserved[2]
    write_matrix(buf);
    buf.put_bytes(0, 24); // pre_defined
    buf.put_u32(2); // next_track_ID
    end_box(buf, start);
}

fn write_mvex(buf: &mut BytesMut) {
    let start = begin_box(buf, b"mvex");
    let trex_start = begin_box(buf, b"trex");
    write_fullbox_header(buf, 0, 0);
    buf.put_u32(1); // track_ID
    buf.put_u32(1); // default_sample_description_index
    buf.put_u32(0); // default_sample_duration
    buf.put_u32(0); // default_sample_size
    buf.put_u32(0); // default_sample_flags
    end_box(buf, trex_start);
    end_box(buf, start);
}

fn write_trak(buf: &mut BytesMut, track: &Track) -> Result<()> {
    let start = begin_box(buf, b"trak");
    write_tkhd(buf, track);
    write_mdia(buf, track)?;
    end_box(buf, start);
    Ok(())
}

fn write_tkhd(buf: &mut BytesMut, track: &Track) {
    let start = begin_box(buf, b"tkhd");
    write_fullbox_header(buf, 0, 3); // track enabled + in-movie
    buf.put_u32(track.creation_time as u32);
    buf.put_u32(track.modification_time as u32);
    buf.put_u32(1); // track_ID
    buf.put_u32(0); // reserved
    buf.put_u32(track.duration as u32);
    buf.put_u64(0); // reserved[2]
    buf.put_i16(0); // layer
    buf.put_i16(0); // alternate_group
    buf.put_u16(if track.is_audio() { 0x0100 } else { 0 }); // volume
    buf.put_u16(0); // reserved
    write_matrix(buf);
    buf.put_u32((track.width as u32) << 16);
    buf.put_u32((track.height as u32) << 16);
    end_box(buf, start);
}

fn write_mdia(buf: &mut BytesMut, track: &Track) -> Result<()> {
    let start = begin_box(buf, b"mdia");
    write_mdhd(buf, track);
    write_hdlr(buf, track);
    write_minf(buf, track)?;
    end_box(buf, start);
    Ok(())
}

fn write_mdhd(buf: &mut BytesMut, track: &Track) {
    let start = begin_box(buf, b"mdhd");
    write_fullbox_header(buf, 0, 0);
    buf.put_u32(track.creation_time as u32);
    buf.put_u32(track.modification_time as u32);
    buf.put_u32(track.media_timescale);
    let media_duration = if track.global_timescale == 0 {
        0
    } else {
        track.duration * track.media_timescale as u64 / track.global_timescale as u64
    };
    buf.put_u32(media_duration as u32);
    buf.put_u16(0x55C4); // language "und"
    buf.put_u16(0); // pre_defined
    end_box(buf, start);
}

fn write_hdlr(buf: &mut BytesMut, track: &Track) {
    let start = begin_box(buf, b"hdlr");
    write_fullbox_header(buf, 0, 0);
    buf.put_u32(0); // pre_defined
    buf.put_slice(if track.is_video() { b"vide" } else { b"soun" });
    buf.put_bytes(0, 12); // reserved
    let name = if track.is_video() {
        b"VideoHandler\0".as_slice()
    } else {
        b"SoundHandler\0".as_slice()
    };
    buf.put_slice(name);
    end_box(buf, start);
}

fn write_minf(buf: &mut BytesMut, track: &Track) -> Result<()> {
    let start = begin_box(buf, b"minf");
    write_dinf(buf);
    write_stbl(buf, track)?;
    if track.is_video() {
        write_vmhd(buf);
    } else {
        write_smhd(buf);
    }
    end_box(buf, start);
    Ok(())
}

fn write_vmhd(buf: &mut BytesMut) {
    let start = begin_box(buf, b"vmhd");
    write_fullbox_header(buf, 0, 1);
    buf.put_u16(0); // graphicsmode
    buf.put_bytes(0, 6); // opcolor
    end_box(buf, start);
}

fn write_smhd(buf: &mut BytesMut) {
    let start = begin_box(buf, b"smhd");
    write_fullbox_header(buf, 0, 0);
    buf.put_u16(0); // balance
    buf.put_u16(0); // reserved
    end_box(buf, start);
}

fn write_dinf(buf: &mut BytesMut) {
    let start = begin_box(buf, b"dinf");
    let dref_start = begin_box(buf, b"dref");
    write_fullbox_header(buf, 0, 0);
    buf.put_u32(1); // entry_count
    let url_start = begin_box(buf, b"url ");
    write_fullbox_header(buf, 0, 1); // self-contained, no location string
    end_box(buf, url_start);
    end_box(buf, dref_start);
    end_box(buf, start);
}

fn write_stbl(buf: &mut BytesMut, track: &Track) -> Result<()> {
    let start = begin_box(buf, b"stbl");
    write_stsd(buf, track)?;
    write_empty_fullbox(buf, b"stts", 1); // entry_count field only
    write_empty_fullbox(buf, b"stsc", 1);
    write_empty_fullbox(buf, b"stsz", 2); // sample_size + sample_count
    write_empty_fullbox(buf, b"stco", 1);
    write_empty_fullbox(buf, b"stss", 1);
    end_box(buf, start);
    Ok(())
}

/// `stts`/`stsc`/`stco`/`stss` all share the "fullbox header plus one or two
/// zeroed u32 count fields, no entries" shape in an init segment — samples
/// live in media segments, not here.
fn write_empty_fullbox(buf: &mut BytesMut, tag: &[u8; 4], trailing_u32_count: usize) {
    let start = begin_box(buf, tag);
    write_fullbox_header(buf, 0, 0);
    for _ in 0..trailing_u32_count {
        buf.put_u32(0);
    }
    end_box(buf, start);
}

fn write_stsd(buf: &mut BytesMut, track: &Track) -> Result<()> {
    let start = begin_box(buf, b"stsd");
    write_fullbox_header(buf, 0, 0);
    buf.put_u32(1); // entry_count
    match track.kind {
        Kind::Audio => write_audio_sample_entry(buf, track)?,
        Kind::Video => write_video_sample_entry(buf, track)?,
    }
    end_box(buf, start);
    Ok(())
}

fn write_audio_sample_entry(buf: &mut BytesMut, track: &Track) -> Result<()> {
    let tag: &[u8; 4] = if track.is_encrypted() { b"enca" } else { b"mp4a" };
    let start = begin_box(buf, tag);
    buf.put_bytes(0, 6); // reserved
    buf.put_u16(1); // data_reference_index
    buf.put_u16(0); // version
    buf.put_u16(0); // revision
    buf.put_u32(0); // vendor
    buf.put_u16(2); // channel_count
    buf.put_u16(16); // sample_size
    buf.put_u16(0); // compression_id
    buf.put_u16(0); // packet_size
    buf.put_u32((track.sample_rate) << 16);
    write_esds(buf, &track.codec_extradata);
    if let Some(encryption) = &track.encryption {
        cenc::write_sinf(buf, b"mp4a", &encryption.key_id);
    }
    end_box(buf, start);
    Ok(())
}

fn write_video_sample_entry(buf: &mut BytesMut, track: &Track) -> Result<()> {
    let tag: &[u8; 4] = if track.is_encrypted() { b"encv" } else { b"avc1" };
    let start = begin_box(buf, tag);
    buf.put_bytes(0, 6); // reserved
    buf.put_u16(1); // data_reference_index
    buf.put_u16(0); // pre_defined
    buf.put_u16(0); // reserved
    buf.put_bytes(0, 12); // pre_defined[3]
    buf.put_u16(track.width);
    buf.put_u16(track.height);
    buf.put_u32(0x0048_0000); // horizresolution 72dpi
    buf.put_u32(0x0048_0000); // vertresolution 72dpi
    buf.put_u32(0); // reserved
    buf.put_u16(1); // frame_count
    buf.put_bytes(0, 32); // compressorname
    buf.put_u16(track.bits_per_sample);
    buf.put_i16(track.color_table_id);
    write_avcc(buf, &track.codec_extradata);
    if let Some(encryption) = &track.encryption {
        cenc::write_sinf(buf, b"avc1", &encryption.key_id);
    }
    end_box(buf, start);
    Ok(())
}

fn write_avcc(buf: &mut BytesMut, extradata: &[u8]) {
    crate::atom::write_atom(buf, b"avcC", extradata);
}

/// A minimal MPEG-4 ES descriptor tree carrying the AAC `AudioSpecificConfig`
/// as `extradata`. Descriptor lengths use single-byte BER encoding, valid as
/// long as each descriptor body stays under 128 bytes (true for AAC-LC).
fn write_esds(buf: &mut BytesMut, extradata: &[u8]) {
    let start = begin_box(buf, b"esds");
    write_fullbox_header(buf, 0, 0);

    let dsi_len = extradata.len();
    let dcd_len = 13 + 2 + dsi_len; // fixed fields + DecoderSpecificInfo descriptor
    let es_len = 3 + (2 + dcd_len) + (2 + 1); // ES_ID+flags + DecoderConfig + SLConfig

    write_descriptor_header(buf, 0x03, es_len);
    buf.put_u16(0); // ES_ID
    buf.put_u8(0); // flags

    write_descriptor_header(buf, 0x04, dcd_len);
    buf.put_u8(0x40); // objectTypeIndication: AAC
    buf.put_u8(0x15); // streamType=5 (audio), upStream=0, reserved=1
    buf.put_u8(0); // bufferSizeDB[0]
    buf.put_u16(0); // bufferSizeDB[1..3]
    buf.put_u32(0); // maxBitrate
    buf.put_u32(0); // avgBitrate

    write_descriptor_header(buf, 0x05, dsi_len);
    buf.put_slice(extradata);

    write_descriptor_header(buf, 0x06, 1);
    buf.put_u8(0x02); // SLConfigDescriptor predefined = MP4

    end_box(buf, start);
}

fn write_descriptor_header(buf: &mut BytesMut, tag: u8, len: usize) {
    buf.put_u8(tag);
    buf.put_u8(len as u8);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::AtomReader;
    use crate::track::Kind;

    fn video_track() -> Track {
        let mut t = Track::new(1, Kind::Video, 90_000, 90_000);
        t.duration = 900_000;
        t.width = 1920;
        t.height = 1080;
        t.bits_per_sample = 24;
        t.codec_extradata = vec![0x01, 0x64, 0x00, 0x1f, 0xff, 0xe1];
        t
    }

    #[test]
    fn init_segment_starts_with_ftyp_then_moov() {
        let track = video_track();
        let bytes = build_init_segment(&track).unwrap();
        let mut reader = AtomReader::new(&bytes);
        let ftyp = reader.read_header().unwrap();
        assert_eq!(&ftyp.tag, b"ftyp");
        assert_eq!(reader.read_bytes(4).unwrap(), b"dash");

        reader.seek_to(ftyp.size as usize).unwrap();
        let free = reader.read_header().unwrap();
        assert_eq!(&free.tag, b"free");
        reader.skip_box(&free).unwrap();

        let moov = reader.read_header().unwrap();
        assert_eq!(&moov.tag, b"moov");
    }

    #[test]
    fn mvhd_has_next_track_id_two() {
        let track = video_track();
        let bytes = build_init_segment(&track).unwrap();
        let mut reader = AtomReader::new(&bytes);
        let ftyp = reader.read_header().unwrap();
        reader.seek_to(ftyp.size as usize).unwrap();
        let free = reader.read_header().unwrap();
        reader.skip_box(&free).unwrap();
        let moov = reader.read_header().unwrap();
        let mvhd = reader
            .find_child_box(b"mvhd", moov.content_size() as usize)
            .unwrap()
            .unwrap();
        assert_eq!(&mvhd.tag, b"mvhd");
        reader.read_fullbox_header().unwrap();
        reader.read_u32().unwrap(); // creation_time
        reader.read_u32().unwrap(); // modification_time
        reader.read_u32().unwrap(); // timescale
        reader.read_u32().unwrap(); // duration
        reader.read_u32().unwrap(); // rate
        reader.read_u16().unwrap(); // volume
        reader.read_u16().unwrap(); // reserved
        reader.read_u64().unwrap(); // reserved[2]
        for _ in 0..9 {
            reader.read_u32().unwrap();
        }
        reader.read_bytes(24).unwrap();
        assert_eq!(reader.read_u32().unwrap(), 2);
    }

    #[test]
    fn tkhd_flags_are_three() {
        let track = video_track();
        let bytes = build_init_segment(&track).unwrap();
        let mut reader = AtomReader::new(&bytes);
        let ftyp = reader.read_header().unwrap();
        reader.seek_to(ftyp.size as usize).unwrap();
        let free = reader.read_header().unwrap();
        reader.skip_box(&free).unwrap();
        let moov = reader.read_header().unwrap();
        let trak = reader
            .find_child_box(b"trak", moov.content_size() as usize)
            .unwrap()
            .unwrap();
        let tkhd = reader
            .find_child_box(b"tkhd", trak.content_size() as usize)
            .unwrap()
            .unwrap();
        assert_eq!(&tkhd.tag, b"tkhd");
        let (_version, flags) = reader.read_fullbox_header().unwrap();
        assert_eq!(flags, 3);
    }
}
