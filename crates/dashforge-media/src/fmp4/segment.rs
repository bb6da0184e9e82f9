//! Media segment: `styp` + `free` + `sidx` + `moof` + `mdat` for one chunk
//! of a single track's pending samples.

use bytes::{BufMut, BytesMut};

use crate::atom::{begin_box, end_box, write_fullbox_header};
use crate::error::Result;
use crate::fmp4::cenc;
use crate::fmp4::{COMPATIBLE_BRANDS, FREE_MESSAGE, MAJOR_BRAND, MINOR_VERSION};
use crate::track::Track;

/// `trun` per-sample flags for a sync (key-frame) sample.
const KEYFRAME_SAMPLE_FLAGS: u32 = 0x0240_0004;
/// `trun` per-sample flags for a non-sync sample.
const NON_KEYFRAME_SAMPLE_FLAGS: u32 = 0x0141_00C0;

/// A built media segment plus the bookkeeping the generation controller and
/// manifest writer need without re-parsing it.
pub struct BuiltSegment {
    pub bytes: bytes::Bytes,
    pub duration: u64,
    pub size: u64,
}

/// Build one media segment from a track's current pending sample list. Does
/// not clear the list — the caller advances the track via
/// [`Track::finish_segment`](crate::track::Track::finish_segment) once the
/// segment has been durably written.
pub fn build_media_segment(track: &Track, is_live: bool) -> Result<BuiltSegment> {
    let duration = track.compute_chunk_duration();
    let mdat_size = track.compute_mdat_size();
    let moof_size = track.compute_moof_size();

    let mut buf = BytesMut::new();
    write_styp(&mut buf);
    crate::atom::write_free_atom(&mut buf, FREE_MESSAGE);
    write_sidx(&mut buf, track, is_live, moof_size, mdat_size, duration);
    write_moof(&mut buf, track, moof_size);
    write_mdat(&mut buf, track);

    let size = buf.len() as u64;
    Ok(BuiltSegment {
        bytes: buf.freeze(),
        duration,
        size,
    })
}

fn write_styp(buf: &mut BytesMut) {
    let start = begin_box(buf, b"styp");
    buf.put_slice(MAJOR_BRAND);
    buf.put_u32(MINOR_VERSION);
    for brand in COMPATIBLE_BRANDS {
        buf.put_slice(brand);
    }
    end_box(buf, start);
}

fn write_sidx(
    buf: &mut BytesMut,
    track: &Track,
    is_live: bool,
    moof_size: u64,
    mdat_size: u64,
    duration: u64,
) {
    let version = if is_live { 1 } else { 0 };
    let start = begin_box(buf, b"sidx");
    write_fullbox_header(buf, version, 0);
    buf.put_u32(1); // reference_ID (track_id)
    buf.put_u32(track.media_timescale);
    let earliest_pts = track.pending_samples().first().map(|s| s.pts).unwrap_or(0) as u64;
    if version == 0 {
        buf.put_u32(earliest_pts as u32);
        buf.put_u32(0); // first_offset
    } else {
        buf.put_u64(earliest_pts);
        buf.put_u64(0); // first_offset
    }
    buf.put_u16(0); // reserved
    buf.put_u16(1); // reference_count

    let reference_size = (moof_size + mdat_size) as u32 & 0x7FFF_FFFF; // reference_type=0 (media)
    buf.put_u32(reference_size);
    buf.put_u32(duration as u32);
    buf.put_u32(0x9000_0000); // starts_with_SAP=1, SAP_type=1, SAP_delta_time=0
    end_box(buf, start);
}

fn write_moof(buf: &mut BytesMut, track: &Track, expected_moof_size: u64) {
    let start = begin_box(buf, b"moof");
    write_mfhd(buf);
    write_traf(buf, track);
    end_box(buf, start);
    debug_assert_eq!((buf.len() - start) as u64, expected_moof_size);
}

fn write_mfhd(buf: &mut BytesMut) {
    let start = begin_box(buf, b"mfhd");
    write_fullbox_header(buf, 0, 0);
    buf.put_u32(1); // sequence_number
    end_box(buf, start);
}

fn write_traf(buf: &mut BytesMut, track: &Track) {
    let start = begin_box(buf, b"traf");
    write_tfhd(buf);
    write_tfdt(buf, track);
    let moof_size = track.compute_moof_size();
    write_trun(buf, track, moof_size);
    if track.is_encrypted() {
        cenc::write_senc(buf, track);
        cenc::write_saiz(buf, track);
        let senc_offset = senc_entries_offset(track.pending_samples().len() as u64);
        cenc::write_saio(buf, senc_offset);
    }
    end_box(buf, start);
}

fn write_tfhd(buf: &mut BytesMut) {
    let start = begin_box(buf, b"tfhd");
    write_fullbox_header(buf, 0, 0x02_0000); // default-base-is-moof
    buf.put_u32(1); // track_ID
    end_box(buf, start);
}

fn write_tfdt(buf: &mut BytesMut, track: &Track) {
    let start = begin_box(buf, b"tfdt");
    write_fullbox_header(buf, 1, 0);
    let base = track.pending_samples().first().map(|s| s.pts).unwrap_or(0);
    buf.put_u64(base as u64);
    end_box(buf, start);
}

fn write_trun(buf: &mut BytesMut, track: &Track, moof_size: u64) {
    let start = begin_box(buf, b"trun");
    write_fullbox_header(buf, 1, 0x0F01);
    buf.put_u32(track.pending_samples().len() as u32);
    buf.put_u32((moof_size + 8) as u32); // data_offset
    for sample in track.pending_samples() {
        buf.put_u32(sample.duration);
        buf.put_u32(sample.size);
        buf.put_u32(if sample.keyframe {
            KEYFRAME_SAMPLE_FLAGS
        } else {
            NON_KEYFRAME_SAMPLE_FLAGS
        });
        buf.put_i32(sample.composition_offset() as i32);
    }
    end_box(buf, start);
}

fn write_mdat(buf: &mut BytesMut, track: &Track) {
    let start = begin_box(buf, b"mdat");
    for sample in track.pending_samples() {
        buf.put_slice(&sample.payload);
    }
    end_box(buf, start);
}

/// Offset (from the start of `moof`) of the first byte of `senc`'s entry
/// list, given `n` pending samples — the fixed prefix `moof + mfhd + traf
/// header + tfhd + tfdt + trun + senc header`.
fn senc_entries_offset(n: u64) -> u64 {
    let moof_header = 8;
    let mfhd = 16;
    let traf_header = 8;
    let tfhd = 16;
    let tfdt = 20;
    let trun = 20 + 16 * n;
    let senc_header = 16;
    moof_header + mfhd + traf_header + tfhd + tfdt + trun + senc_header
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::AtomReader;
    use crate::track::{Kind, Sample};
    use bytes::Bytes;

    fn track_with_one_sample() -> Track {
        let mut t = Track::new(1, Kind::Video, 90_000, 90_000);
        t.append_sample(Sample::new(0, 0, 3600, true, Bytes::from_static(b"abcd")).unwrap())
            .unwrap();
        t
    }

    #[test]
    fn sidx_reference_size_matches_moof_plus_mdat() {
        let track = track_with_one_sample();
        let built = build_media_segment(&track, false).unwrap();

        let mut reader = AtomReader::new(&built.bytes);
        let styp = reader.read_header().unwrap();
        reader.seek_to(styp.size as usize).unwrap();
        let free = reader.read_header().unwrap();
        reader.skip_box(&free).unwrap();
        let sidx_start = reader.position();
        let sidx = reader.read_header().unwrap();
        reader.read_fullbox_header().unwrap();
        reader.read_u32().unwrap(); // reference_ID
        reader.read_u32().unwrap(); // timescale
        reader.read_u32().unwrap(); // earliest_presentation_time
        reader.read_u32().unwrap(); // first_offset
        reader.read_u16().unwrap(); // reserved
        reader.read_u16().unwrap(); // reference_count
        let reference_size = reader.read_u32().unwrap();
        reader.seek_to(sidx_start + sidx.size as usize).unwrap();

        let moof = reader.read_header().unwrap();
        reader.seek_to(sidx_start + sidx.size as usize + moof.size as usize)
            .unwrap();
        let mdat = reader.read_header().unwrap();

        assert_eq!(reference_size as u64, moof.size + mdat.size);
    }

    #[test]
    fn trun_data_offset_is_moof_size_plus_eight() {
        let track = track_with_one_sample();
        let built = build_media_segment(&track, false).unwrap();
        let moof_size = track.compute_moof_size();

        let mut reader = AtomReader::new(&built.bytes);
        let styp = reader.read_header().unwrap();
        reader.seek_to(styp.size as usize).unwrap();
        let free = reader.read_header().unwrap();
        reader.skip_box(&free).unwrap();
        let sidx = reader.read_header().unwrap();
        reader.skip_box(&sidx).unwrap();
        let moof = reader.read_header().unwrap();
        let traf = reader
            .find_child_box(b"traf", moof.content_size() as usize)
            .unwrap()
            .unwrap();
        let trun = reader
            .find_child_box(b"trun", traf.content_size() as usize)
            .unwrap()
            .unwrap();
        assert_eq!(&trun.tag, b"trun");
        reader.read_fullbox_header().unwrap();
        reader.read_u32().unwrap(); // sample_count
        let data_offset = reader.read_u32().unwrap();
        assert_eq!(data_offset as u64, moof_size + 8);
    }

    #[test]
    fn keyframe_sample_gets_keyframe_flags() {
        let track = track_with_one_sample();
        assert_eq!(
            if track.pending_samples()[0].keyframe {
                KEYFRAME_SAMPLE_FLAGS
            } else {
                NON_KEYFRAME_SAMPLE_FLAGS
            },
            0x0240_0004
        );
    }
}
