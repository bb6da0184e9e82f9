//! Track model (C2): per-track timing/codec/encryption state, the pending
//! sample list, and the on-disk chunk history.

use std::collections::VecDeque;

use bytes::Bytes;

use crate::error::{Error, Result};

/// Whether a track carries video or audio samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Video,
    Audio,
}

/// One `(clear, encrypted)` byte-length pair in a subsample encryption
/// pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubsamplePair {
    pub clear: u16,
    pub encrypted: u32,
}

/// Per-sample encryption metadata: a fixed-length IV and an optional
/// subsample clear/encrypted byte-pair list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleEncryption {
    pub iv: Vec<u8>,
    pub subsamples: Option<Vec<SubsamplePair>>,
}

impl SampleEncryption {
    /// Size, in bytes, this record occupies inside a `senc` entry: the IV,
    /// plus (when present) a subsample count and the pairs themselves.
    pub fn senc_entry_size(&self) -> u64 {
        let mut size = self.iv.len() as u64;
        if let Some(subsamples) = &self.subsamples {
            size += 2 + (subsamples.len() as u64 * 6);
        }
        size
    }
}

/// A single access unit.
#[derive(Debug, Clone)]
pub struct Sample {
    pub pts: i64,
    pub dts: i64,
    pub duration: u32,
    pub keyframe: bool,
    pub payload: Bytes,
    pub size: u32,
    pub encryption: Option<SampleEncryption>,
}

impl Sample {
    pub fn new(pts: i64, dts: i64, duration: u32, keyframe: bool, payload: Bytes) -> Result<Self> {
        if duration == 0 {
            return Err(Error::malformed_input("sample duration must be > 0"));
        }
        let size = payload.len() as u32;
        Ok(Self {
            pts,
            dts,
            duration,
            keyframe,
            payload,
            size,
            encryption: None,
        })
    }

    pub fn with_encryption(mut self, encryption: SampleEncryption) -> Self {
        self.encryption = Some(encryption);
        self
    }

    /// Composition offset as the reference computes it: `dts - pts`,
    /// preserved in that order for round-trip compatibility with existing
    /// caches rather than the more conventional `pts - dts`.
    pub fn composition_offset(&self) -> i64 {
        self.dts - self.pts
    }
}

/// One Protection System Specific entry registered on an encrypted track.
#[derive(Debug, Clone)]
pub struct ProtectionSystem {
    pub system_id: [u8; 16],
    pub private_data: Vec<u8>,
}

/// Encryption parameters shared by every sample on a track.
#[derive(Debug, Clone)]
pub struct EncryptionInfo {
    pub systems: Vec<ProtectionSystem>,
    pub sub_encrypt: bool,
    pub key_id: [u8; 16],
}

/// A single emitted media segment, recorded for manifest timeline
/// construction and history trimming.
#[derive(Debug, Clone)]
pub struct ChunkHistoryEntry {
    pub duration: u32,
    pub size: u64,
    pub file_name: String,
}

/// Default depth at which segment history is trimmed for a live asset.
pub const DEFAULT_HISTORY_DEPTH: usize = 30;

/// Fixed sample-encryption IV length used throughout this implementation;
/// no per-track IV-size field is read from `tenc`.
pub const CENC_IV_LEN: usize = 8;

/// The central per-track aggregate: timing, codec parameters, pending
/// samples awaiting segmentation, and the history of already-emitted
/// segments.
#[derive(Debug, Clone)]
pub struct Track {
    pub index: u32,
    pub kind: Kind,
    /// Seconds since 1904-01-01 UTC, per ISO BMFF convention.
    pub creation_time: u64,
    pub modification_time: u64,
    /// Total duration in the global (movie) timescale.
    pub duration: u64,
    pub media_timescale: u32,
    pub global_timescale: u32,
    pub width: u16,
    pub height: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub color_table_id: i16,
    pub codec_extradata: Vec<u8>,
    pub encryption: Option<EncryptionInfo>,
    bandwidth_override: Option<u32>,
    decode_time: i64,
    pending: Vec<Sample>,
    history: VecDeque<ChunkHistoryEntry>,
}

impl Track {
    pub fn new(index: u32, kind: Kind, media_timescale: u32, global_timescale: u32) -> Self {
        Self {
            index,
            kind,
            creation_time: 0,
            modification_time: 0,
            duration: 0,
            media_timescale,
            global_timescale,
            width: 0,
            height: 0,
            sample_rate: 0,
            bits_per_sample: 16,
            color_table_id: -1,
            codec_extradata: Vec::new(),
            encryption: None,
            bandwidth_override: None,
            decode_time: 0,
            pending: Vec::new(),
            history: VecDeque::new(),
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self.kind, Kind::Video)
    }

    pub fn is_audio(&self) -> bool {
        matches!(self.kind, Kind::Audio)
    }

    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_some()
    }

    pub fn set_bandwidth(&mut self, bandwidth: u32) {
        self.bandwidth_override = Some(bandwidth);
    }

    pub fn decode_time(&self) -> i64 {
        self.decode_time
    }

    pub fn pending_samples(&self) -> &[Sample] {
        &self.pending
    }

    pub fn history(&self) -> &VecDeque<ChunkHistoryEntry> {
        &self.history
    }

    /// Append a demuxed sample to the pending list.
    pub fn append_sample(&mut self, sample: Sample) -> Result<()> {
        if sample.size as usize != sample.payload.len() {
            return Err(Error::malformed_input("sample size does not match payload length"));
        }
        self.pending.push(sample);
        Ok(())
    }

    /// Sum of pending sample durations — the duration the next segment will
    /// cover.
    pub fn compute_chunk_duration(&self) -> u64 {
        self.pending.iter().map(|s| s.duration as u64).sum()
    }

    /// `8 + Σ sample sizes` — the size of the `mdat` body that will hold the
    /// pending samples.
    pub fn compute_mdat_size(&self) -> u64 {
        8 + self.pending.iter().map(|s| s.size as u64).sum::<u64>()
    }

    /// Size of the `moof` that will wrap the pending samples, given the
    /// fixed box layout in 4.3: `mfhd(16) + traf{tfhd(16) + tfdt(20) +
    /// trun(20 + 16N)}` plus, when encrypted, `senc + saiz + saio`.
    pub fn compute_moof_size(&self) -> u64 {
        let n = self.pending.len() as u64;
        let moof_header = 8;
        let mfhd = 16;
        let traf_header = 8;
        let tfhd = 16;
        let tfdt = 20;
        let trun = 20 + 16 * n;
        let mut size = moof_header + mfhd + traf_header + tfhd + tfdt + trun;
        if self.is_encrypted() {
            size += self.compute_senc_size() + self.compute_saiz_size() + self.compute_saio_size();
        }
        size
    }

    fn compute_senc_size(&self) -> u64 {
        let header = 16u64; // box header(8) + version/flags(4) + sample_count(4)
        let entries: u64 = self
            .pending
            .iter()
            .map(|s| s.encryption.as_ref().map(|e| e.senc_entry_size()).unwrap_or(CENC_IV_LEN as u64))
            .sum();
        header + entries
    }

    fn compute_saiz_size(&self) -> u64 {
        let header = 17u64; // box header(8) + version/flags(4) + default_sample_info_size(1) + sample_count(4)
        header + self.pending.len() as u64
    }

    fn compute_saio_size(&self) -> u64 {
        20 // box header(8) + version/flags(4) + entry_count(4) + one u32 entry(4+4 padding kept explicit below)
    }

    /// Whether `senc` uses the subsample-present flag (`0x2`): true iff any
    /// pending sample carries a subsample pattern.
    pub fn uses_subsample_encryption(&self) -> bool {
        self.pending
            .iter()
            .any(|s| matches!(&s.encryption, Some(e) if e.subsamples.is_some()))
    }

    /// Clear the pending list and advance the decode-time cursor by the
    /// duration just emitted.
    pub fn finish_segment(&mut self, emitted_duration: u64) {
        self.pending.clear();
        self.decode_time += emitted_duration as i64;
    }

    pub fn push_history(&mut self, entry: ChunkHistoryEntry) {
        self.history.push_back(entry);
    }

    /// Trim history down to `depth` entries, returning the discarded
    /// entries so the caller can delete their backing files. `Track` itself
    /// performs no I/O.
    pub fn trim_history(&mut self, depth: usize) -> Vec<ChunkHistoryEntry> {
        let mut discarded = Vec::new();
        while self.history.len() > depth {
            if let Some(entry) = self.history.pop_front() {
                discarded.push(entry);
            }
        }
        discarded
    }

    /// `mp4a.40.2` for audio; `avc1.` + hex(extradata[1..4]) for video.
    pub fn codec_string(&self) -> Result<String> {
        match self.kind {
            Kind::Audio => Ok("mp4a.40.2".to_string()),
            Kind::Video => {
                if self.codec_extradata.len() < 4 {
                    return Err(Error::unsupported_codec(
                        "video extradata too short to derive a codec string",
                    ));
                }
                Ok(format!("avc1.{}", hex::encode(&self.codec_extradata[1..4])))
            }
        }
    }

    /// Explicit bandwidth if the demux set one; otherwise an estimate from
    /// history: `Σ size * 8 * globalTimescale / Σ duration`, dividing by the
    /// timescale directly rather than through a derived-seconds
    /// intermediate, matching the reference. Zero if the total duration is
    /// zero.
    pub fn bandwidth(&self) -> u32 {
        if let Some(bw) = self.bandwidth_override {
            return bw;
        }
        let total_size: u128 = self.history.iter().map(|e| e.size as u128).sum();
        let total_duration: u128 = self.history.iter().map(|e| e.duration as u128).sum();
        if total_duration == 0 {
            return 0;
        }
        let bits = total_size * 8 * self.global_timescale as u128;
        (bits / total_duration) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_track() -> Track {
        let mut t = Track::new(1, Kind::Video, 90_000, 90_000);
        t.codec_extradata = vec![0x01, 0x64, 0x00, 0x1f, 0xff];
        t
    }

    #[test]
    fn append_sample_rejects_size_payload_mismatch() {
        let mut track = video_track();
        let mut sample = Sample::new(0, 0, 3600, true, Bytes::from_static(b"1234")).unwrap();
        sample.size = 99;
        assert!(track.append_sample(sample).is_err());
    }

    #[test]
    fn chunk_duration_and_mdat_size_sum_pending_samples() {
        let mut track = video_track();
        track
            .append_sample(Sample::new(0, 0, 3600, true, Bytes::from_static(b"abcd")).unwrap())
            .unwrap();
        track
            .append_sample(Sample::new(3600, 3600, 3600, false, Bytes::from_static(b"xyz")).unwrap())
            .unwrap();

        assert_eq!(track.compute_chunk_duration(), 7200);
        assert_eq!(track.compute_mdat_size(), 8 + 4 + 3);
    }

    #[test]
    fn moof_size_matches_fixed_box_layout_unencrypted() {
        let mut track = video_track();
        track
            .append_sample(Sample::new(0, 0, 3600, true, Bytes::from_static(b"abcd")).unwrap())
            .unwrap();
        // moof(8) + mfhd(16) + traf_header(8) + tfhd(16) + tfdt(20) + trun(20+16*1)
        assert_eq!(track.compute_moof_size(), 8 + 16 + 8 + 16 + 20 + 36);
    }

    #[test]
    fn codec_string_derives_avc1_from_extradata() {
        let track = video_track();
        assert_eq!(track.codec_string().unwrap(), "avc1.64001f");
    }

    #[test]
    fn codec_string_for_audio_is_constant() {
        let track = Track::new(2, Kind::Audio, 48_000, 90_000);
        assert_eq!(track.codec_string().unwrap(), "mp4a.40.2");
    }

    #[test]
    fn bandwidth_estimates_from_history_when_unset() {
        let mut track = video_track();
        track.push_history(ChunkHistoryEntry {
            duration: 90_000,
            size: 125_000,
            file_name: "chunk_video1_0.mp4".into(),
        });
        // 125_000 bytes * 8 bits * 90_000 timescale / 90_000 duration = 1_000_000 bps
        assert_eq!(track.bandwidth(), 1_000_000);
    }

    #[test]
    fn bandwidth_is_zero_with_no_history_and_no_override() {
        let track = video_track();
        assert_eq!(track.bandwidth(), 0);
    }

    #[test]
    fn explicit_bandwidth_override_wins() {
        let mut track = video_track();
        track.set_bandwidth(5_000_000);
        assert_eq!(track.bandwidth(), 5_000_000);
    }

    #[test]
    fn trim_history_discards_oldest_entries_past_depth() {
        let mut track = video_track();
        for i in 0..5 {
            track.push_history(ChunkHistoryEntry {
                duration: 1,
                size: 1,
                file_name: format!("chunk_video1_{i}.mp4"),
            });
        }
        let discarded = track.trim_history(3);
        assert_eq!(discarded.len(), 2);
        assert_eq!(discarded[0].file_name, "chunk_video1_0.mp4");
        assert_eq!(track.history().len(), 3);
    }

    #[test]
    fn finish_segment_clears_pending_and_advances_cursor() {
        let mut track = video_track();
        track
            .append_sample(Sample::new(0, 0, 3600, true, Bytes::from_static(b"abcd")).unwrap())
            .unwrap();
        track.finish_segment(3600);
        assert!(track.pending_samples().is_empty());
        assert_eq!(track.decode_time(), 3600);
    }

    #[test]
    fn composition_offset_is_dts_minus_pts() {
        let sample = Sample::new(100, 140, 3600, true, Bytes::from_static(b"x")).unwrap();
        assert_eq!(sample.composition_offset(), 40);
    }
}
