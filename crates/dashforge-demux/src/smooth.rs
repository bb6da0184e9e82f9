//! Smooth-Streaming demux (4.4.3). Parses a Client Manifest
//! (`SmoothStreamingMedia`/`StreamIndex`/`QualityLevel`/`c` + optional
//! `ProtectionHeader`) and serves the same four-operation contract as
//! [`crate::dash::DashDemux`].

use std::collections::VecDeque;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use dashforge_media::atom::AtomReader;
use dashforge_media::track::{
    EncryptionInfo, Kind, ProtectionSystem, Sample, SampleEncryption, SubsamplePair, Track, CENC_IV_LEN,
};

use crate::error::{Error, Result};
use crate::xml::{self, Element};

const DEFAULT_TIMESCALE: u32 = 10_000_000;

const PLAYREADY_SYSTEM_ID: [u8; 16] = [
    0x9A, 0x04, 0xF0, 0x79, 0x98, 0x40, 0x42, 0x86, 0xAB, 0x92, 0xE6, 0x5B, 0xE0, 0x88, 0x5F, 0x95,
];
const WIDEVINE_SYSTEM_ID: [u8; 16] = [
    0xED, 0xEF, 0x8B, 0xA9, 0x79, 0xD6, 0x4A, 0xCE, 0xA3, 0xC8, 0x27, 0xDC, 0xD5, 0x1D, 0x21, 0xED,
];
/// Usertype carried by the per-fragment `uuid` box that wraps `senc`.
const CENC_UUID: [u8; 16] = [
    0xA2, 0x39, 0x4F, 0x52, 0x5A, 0x9B, 0x4F, 0x14, 0xA2, 0x44, 0x6C, 0x42, 0x7C, 0x64, 0x8D, 0xF4,
];

const AAC_SAMPLE_RATES: [u32; 13] = [
    96_000, 88_200, 64_000, 48_000, 44_100, 32_000, 24_000, 22_050, 16_000, 12_000, 11_025, 8_000, 7_350,
];

struct TrackQueue {
    track_index: usize,
    segment_urls: VecDeque<String>,
}

/// Parses a Smooth-Streaming Client Manifest and serves it through the
/// four-operation demux contract, reusing one `reqwest::Client` for the
/// lifetime of the instance.
pub struct SmoothDemux {
    client: reqwest::Client,
    base_url: String,
    document: Option<Element>,
    queues: Vec<TrackQueue>,
}

impl Default for SmoothDemux {
    fn default() -> Self {
        Self::new()
    }
}

impl SmoothDemux {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: String::new(),
            document: None,
            queues: Vec::new(),
        }
    }

    /// Fetch and parse the Client Manifest, caching the document for the
    /// lifetime of this instance.
    pub async fn open(&mut self, manifest_url: &str) -> Result<()> {
        self.base_url = base_url_of(manifest_url);
        let body = self.fetch_text(manifest_url).await?;
        self.document = Some(xml::parse(&body)?);
        Ok(())
    }

    pub async fn get_tracks(&mut self) -> Result<Vec<Track>> {
        let document = self
            .document
            .as_ref()
            .ok_or_else(|| Error::malformed_input("get_tracks called before open"))?;

        let timescale: u32 = document
            .attr("TimeScale")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMESCALE);

        let encryption = document
            .find_first("Protection")
            .and_then(|p| p.find_first("ProtectionHeader"))
            .map(parse_protection_header)
            .transpose()?;

        let mut tracks = Vec::new();
        let mut queues = Vec::new();
        let mut next_index = 1u32;

        for stream_index in document.children_named("StreamIndex") {
            let kind = match stream_index.attr("Type") {
                Some("audio") => Kind::Audio,
                Some("video") => Kind::Video,
                _ => continue,
            };
            let Some(url_template) = stream_index.attr("Url") else {
                continue;
            };

            for quality_level in stream_index.children_named("QualityLevel") {
                let index = next_index;
                next_index += 1;

                let mut track = Track::new(index, kind, timescale, timescale);
                track.width = parse_attr(quality_level, "MaxWidth").unwrap_or(0);
                track.height = parse_attr(quality_level, "MaxHeight").unwrap_or(0);
                track.bits_per_sample = parse_attr(quality_level, "BitsPerSample").unwrap_or(16);
                if let Some(bitrate) = parse_attr(quality_level, "Bitrate") {
                    track.set_bandwidth(bitrate);
                }

                let codec_private_data = quality_level.attr("CodecPrivateData").unwrap_or("");
                match kind {
                    Kind::Audio => {
                        track.sample_rate = parse_attr(quality_level, "SamplingRate").unwrap_or(0);
                        let channels: u8 = parse_attr(quality_level, "Channels").unwrap_or(2);
                        track.codec_extradata = if codec_private_data.is_empty() {
                            synthesize_audio_specific_config(track.sample_rate, channels)
                        } else {
                            hex::decode(codec_private_data)
                                .map_err(|e| Error::malformed_input(e.to_string()))?
                        };
                    }
                    Kind::Video => {
                        track.codec_extradata = build_avc_decoder_configuration_record(codec_private_data)?;
                    }
                }

                if let Some(info) = &encryption {
                    track.encryption = Some(info.clone());
                }

                let bitrate = quality_level.attr("Bitrate").unwrap_or("0");
                let segment_urls = build_fragment_queue(url_template, bitrate, stream_index);

                let track_index = tracks.len();
                tracks.push(track);
                queues.push(TrackQueue {
                    track_index,
                    segment_urls,
                });
            }
        }

        if tracks.is_empty() {
            return Err(Error::EmptyTrackSet);
        }

        self.queues = queues;
        Ok(tracks)
    }

    pub async fn extract_chunk(&mut self, tracks: &mut [Track], _is_live: bool) -> Result<bool> {
        let mut more = false;
        for queue in &mut self.queues {
            let Some(url) = queue.segment_urls.pop_front() else {
                continue;
            };
            more = true;
            let bytes = self.fetch_bytes(&resolve_url(&self.base_url, &url)).await?;
            apply_media_segment(&mut tracks[queue.track_index], &bytes)?;
        }
        Ok(more)
    }

    pub async fn close(&mut self) -> Result<()> {
        self.queues.clear();
        Ok(())
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::network(e.to_string()))?
            .text()
            .await
            .map_err(|e| Error::network(e.to_string()))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Bytes> {
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::network(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| Error::network(e.to_string()))
    }
}

fn parse_attr<T: std::str::FromStr>(element: &Element, name: &str) -> Option<T> {
    element.attr(name).and_then(|v| v.parse().ok())
}

fn base_url_of(url: &str) -> String {
    match url.rfind('/') {
        Some(idx) => url[..=idx].to_string(),
        None => String::new(),
    }
}

fn resolve_url(base: &str, maybe_relative: &str) -> String {
    if maybe_relative.contains("://") {
        maybe_relative.to_string()
    } else {
        format!("{base}{maybe_relative}")
    }
}

/// Expand `{bitrate}`/`{start time}` over a `StreamIndex`'s `<c t d r>`
/// entries, advancing the running fragment time the same way a DASH
/// `SegmentTimeline` does.
fn build_fragment_queue(url_template: &str, bitrate: &str, stream_index: &Element) -> VecDeque<String> {
    let mut urls = VecDeque::new();
    let mut time: u64 = 0;

    for entry in stream_index.children_named("c") {
        if let Some(t) = entry.attr("t").and_then(|s| s.parse::<u64>().ok()) {
            time = t;
        }
        let duration: u64 = entry.attr("d").and_then(|s| s.parse().ok()).unwrap_or(0);
        let repeat: u64 = entry.attr("r").and_then(|s| s.parse().ok()).unwrap_or(0);

        for _ in 0..=repeat {
            let url = url_template
                .replace("{bitrate}", bitrate)
                .replace("{start time}", &time.to_string());
            urls.push_back(url);
            time += duration;
        }
    }

    urls
}

/// `AOT=2` (AAC-LC), frequency index looked up against the standard AAC
/// sample rate table, falling back to the 48 kHz index when the rate isn't
/// one of the thirteen standard values.
fn synthesize_audio_specific_config(sample_rate: u32, channels: u8) -> Vec<u8> {
    let freq_index = AAC_SAMPLE_RATES
        .iter()
        .position(|&rate| rate == sample_rate)
        .unwrap_or(3) as u8;
    let object_type = 2u8;
    let byte0 = (object_type << 3) | (freq_index >> 1);
    let byte1 = ((freq_index & 1) << 7) | (channels << 3);
    vec![byte0, byte1]
}

fn split_nal_units(codec_private_data: &str) -> Result<Vec<Vec<u8>>> {
    let bytes = hex::decode(codec_private_data).map_err(|e| Error::malformed_input(e.to_string()))?;
    let mut units = Vec::new();
    let mut start = None;
    let mut i = 0;
    while i + 4 <= bytes.len() {
        if bytes[i..i + 4] == [0, 0, 0, 1] {
            if let Some(s) = start {
                units.push(bytes[s..i].to_vec());
            }
            start = Some(i + 4);
            i += 4;
        } else {
            i += 1;
        }
    }
    if let Some(s) = start {
        units.push(bytes[s..].to_vec());
    }
    Ok(units)
}

/// Build an `AVCDecoderConfigurationRecord` from `CodecPrivateData`'s
/// Annex-B NAL stream, taking the profile/constraints/level from the SPS's
/// first bytes and carrying exactly one SPS and one PPS.
fn build_avc_decoder_configuration_record(codec_private_data: &str) -> Result<Vec<u8>> {
    if codec_private_data.is_empty() {
        return Ok(Vec::new());
    }
    let nals = split_nal_units(codec_private_data)?;
    let sps = nals
        .iter()
        .find(|n| !n.is_empty() && (n[0] & 0x1F) == 7)
        .ok_or_else(|| Error::malformed_input("CodecPrivateData has no SPS"))?;
    let pps = nals
        .iter()
        .find(|n| !n.is_empty() && (n[0] & 0x1F) == 8)
        .ok_or_else(|| Error::malformed_input("CodecPrivateData has no PPS"))?;
    if sps.len() < 4 {
        return Err(Error::malformed_input("SPS too short to derive AVC profile"));
    }

    let mut record = Vec::with_capacity(11 + sps.len() + pps.len());
    record.push(1); // configurationVersion
    record.push(sps[1]); // AVCProfileIndication
    record.push(sps[2]); // profile_compatibility
    record.push(sps[3]); // AVCLevelIndication
    record.push(0xFF); // reserved(6) + lengthSizeMinusOne(2) = 3
    record.push(0xE1); // reserved(3) + numOfSequenceParameterSets(5) = 1
    record.extend_from_slice(&(sps.len() as u16).to_be_bytes());
    record.extend_from_slice(sps);
    record.push(1); // numOfPictureParameterSets
    record.extend_from_slice(&(pps.len() as u16).to_be_bytes());
    record.extend_from_slice(pps);
    Ok(record)
}

/// Decode a PlayReady `ProtectionHeader`'s Base64 blob, recover its `KID`,
/// and build the two CENC `pssh` entries a fragment's `tenc`-equivalent
/// needs (a synthesized Widevine header and the original PlayReady one).
fn parse_protection_header(header: &Element) -> Result<EncryptionInfo> {
    let blob_base64 = header.text.trim();
    let blob = STANDARD
        .decode(blob_base64)
        .map_err(|e| Error::malformed_input(e.to_string()))?;

    let wrm_xml = decode_playready_object(&blob)?;
    let wrm = xml::parse(&wrm_xml)?;
    let kid_base64 = wrm
        .find_descendant("KID")
        .map(|e| e.text.clone())
        .ok_or_else(|| Error::malformed_input("WRMHEADER has no KID"))?;
    let kid_bytes = STANDARD
        .decode(kid_base64.trim())
        .map_err(|e| Error::malformed_input(e.to_string()))?;
    if kid_bytes.len() != 16 {
        return Err(Error::malformed_input("KID is not 16 bytes"));
    }
    let mut widevine_body = vec![0x08, 0x01, 0x12, 0x10];
    widevine_body.extend_from_slice(&kid_bytes);

    let mut key_id = [0u8; 16];
    key_id.copy_from_slice(&kid_bytes);
    let key_id = guid_to_uuid(key_id);

    Ok(EncryptionInfo {
        systems: vec![
            ProtectionSystem {
                system_id: WIDEVINE_SYSTEM_ID,
                private_data: widevine_body,
            },
            ProtectionSystem {
                system_id: PLAYREADY_SYSTEM_ID,
                private_data: blob,
            },
        ],
        sub_encrypt: false,
        key_id,
    })
}

/// Strip the PlayReady Object binary wrapper (4-byte length, 2-byte record
/// count, then per record a 2-byte type + 2-byte length prefix) and decode
/// the remaining `WRMHEADER` record as UTF-16LE text.
fn decode_playready_object(blob: &[u8]) -> Result<String> {
    if blob.len() < 10 {
        return Err(Error::malformed_input("PlayReady object too short"));
    }
    let record_data = &blob[10..];
    let units: Vec<u16> = record_data
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16(&units).map_err(|_| Error::malformed_input("WRMHEADER is not valid UTF-16"))
}

/// Byte-swap a Microsoft GUID (little-endian `Data1`/`Data2`/`Data3`) into
/// big-endian UUID order used by `pssh`/`tenc` key IDs.
fn guid_to_uuid(mut bytes: [u8; 16]) -> [u8; 16] {
    bytes[0..4].reverse();
    bytes[4..6].reverse();
    bytes[6..8].reverse();
    bytes
}

/// Parse one Smooth-Streaming media fragment: the same `moof`/`mdat`
/// layout a DASH segment uses, plus an optional `uuid` box (CENC usertype)
/// wrapping a `senc` body that supplies per-sample IVs/subsamples.
fn apply_media_segment(track: &mut Track, data: &[u8]) -> Result<()> {
    let mut reader = AtomReader::new(data);
    let moof = reader
        .descend(&[b"moof"])?
        .ok_or_else(|| Error::malformed_input("fragment missing moof"))?;
    let traf = reader
        .descend_from(&moof, &[b"traf"])?
        .ok_or_else(|| Error::malformed_input("moof missing traf"))?;

    let mut base_media_decode_time = 0i64;
    let mut default_sample_duration = 0u32;
    let mut sample_entries: Vec<(u32, u32, bool)> = Vec::new();
    let mut sample_encryptions: Vec<SampleEncryption> = Vec::new();

    reader.seek_to(traf.start + traf.header_size as usize)?;
    if let Some(tfdt) = reader.find_child_box(b"tfdt", traf.content_size() as usize)? {
        let (version, _flags) = reader.read_fullbox_header()?;
        base_media_decode_time = if version == 1 {
            reader.read_u64()? as i64
        } else {
            reader.read_u32()? as i64
        };
        reader.seek_to(tfdt.end())?;
    }

    reader.seek_to(traf.start + traf.header_size as usize)?;
    if let Some(tfhd) = reader.find_child_box(b"tfhd", traf.content_size() as usize)? {
        let (_version, flags) = reader.read_fullbox_header()?;
        reader.read_u32()?; // track_ID
        if flags & 0x000008 != 0 {
            default_sample_duration = reader.read_u32()?;
        }
        reader.seek_to(tfhd.end())?;
    }

    reader.seek_to(traf.start + traf.header_size as usize)?;
    if let Some(trun) = reader.find_child_box(b"trun", traf.content_size() as usize)? {
        let (_version, flags) = reader.read_fullbox_header()?;
        let sample_count = reader.read_u32()?;
        if flags & 0x000001 != 0 {
            reader.read_u32()?; // data_offset
        }
        if flags & 0x000004 != 0 {
            reader.read_u32()?; // first_sample_flags
        }
        for _ in 0..sample_count {
            let duration = if flags & 0x000100 != 0 {
                reader.read_u32()?
            } else {
                default_sample_duration
            };
            let size = if flags & 0x000200 != 0 { reader.read_u32()? } else { 0 };
            let sample_flags = if flags & 0x000400 != 0 { reader.read_u32()? } else { 0 };
            if flags & 0x000800 != 0 {
                reader.read_i32()?;
            }
            let keyframe = (sample_flags & 0x0001_0000) == 0;
            sample_entries.push((duration, size, keyframe));
        }
        reader.seek_to(trun.end())?;
    }

    reader.seek_to(traf.start + traf.header_size as usize)?;
    if let Some(uuid_box) = reader.find_child_box(b"uuid", traf.content_size() as usize)? {
        let usertype = reader.read_bytes(16)?;
        if usertype == CENC_UUID {
            sample_encryptions = parse_senc_body(&mut reader, sample_entries.len())?;
        }
        reader.seek_to(uuid_box.end())?;
    }

    let mdat = reader
        .descend(&[b"mdat"])?
        .ok_or_else(|| Error::malformed_input("fragment missing mdat"))?;
    reader.seek_to(mdat.start + mdat.header_size as usize)?;

    let mut pts = base_media_decode_time;
    for (position, (duration, size, keyframe)) in sample_entries.into_iter().enumerate() {
        let payload = reader.read_bytes(size as usize)?;
        let mut sample = Sample::new(pts, pts, duration.max(1), keyframe, Bytes::copy_from_slice(payload))?;
        if let Some(encryption) = sample_encryptions.get(position) {
            sample = sample.with_encryption(encryption.clone());
        }
        track.append_sample(sample)?;
        pts += duration as i64;
    }

    Ok(())
}

/// Read a `senc` body (version/flags, sample_count, then per-sample IV and,
/// when the subsample-present flag is set, a pair count and pair list) —
/// the inverse of `dashforge_media::fmp4::cenc::write_senc`.
fn parse_senc_body(reader: &mut AtomReader<'_>, expected_samples: usize) -> Result<Vec<SampleEncryption>> {
    let (_version, flags) = reader.read_fullbox_header()?;
    let sample_count = reader.read_u32()? as usize;
    let has_subsamples = flags & 0x2 != 0;

    let mut entries = Vec::with_capacity(sample_count.min(expected_samples));
    for _ in 0..sample_count {
        let iv = reader.read_bytes(CENC_IV_LEN)?.to_vec();
        let subsamples = if has_subsamples {
            let pair_count = reader.read_u16()?;
            let mut pairs = Vec::with_capacity(pair_count as usize);
            for _ in 0..pair_count {
                let clear = reader.read_u16()?;
                let encrypted = reader.read_u32()?;
                pairs.push(SubsamplePair { clear, encrypted });
            }
            Some(pairs)
        } else {
            None
        };
        entries.push(SampleEncryption { iv, subsamples });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_queue_expands_bitrate_and_start_time_placeholders() {
        let xml = r#"<StreamIndex Type="video" Url="Video({bitrate},{start time})">
          <c t="0" d="20000000" r="1"/>
        </StreamIndex>"#;
        let stream_index = xml::parse(xml).unwrap();
        let queue = build_fragment_queue("Video({bitrate},{start time})", "2000000", &stream_index);
        let urls: Vec<String> = queue.into_iter().collect();
        assert_eq!(urls, vec!["Video(2000000,0)", "Video(2000000,20000000)"]);
    }

    #[test]
    fn synthesized_audio_specific_config_encodes_aac_lc_at_48khz_stereo() {
        let config = synthesize_audio_specific_config(48_000, 2);
        // AOT=2 (00010), freqIndex=3 (0011), chanConfig=2 (0010):
        // byte0 = 00010 001, byte1 = 1 0010 000
        assert_eq!(config, vec![0x11, 0x90]);
    }

    #[test]
    fn guid_to_uuid_swaps_the_first_three_little_endian_fields() {
        let guid = [
            0x01, 0x02, 0x03, 0x04, // Data1 (LE)
            0x05, 0x06, // Data2 (LE)
            0x07, 0x08, // Data3 (LE)
            0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, 0x10, // Data4 (unchanged)
        ];
        let uuid = guid_to_uuid(guid);
        assert_eq!(
            uuid,
            [0x04, 0x03, 0x02, 0x01, 0x06, 0x05, 0x08, 0x07, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, 0x10]
        );
    }

    #[test]
    fn avc_decoder_configuration_record_carries_profile_from_sps() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&[0, 0, 0, 1]);
        bytes.extend_from_slice(&[0x67, 0x64, 0x00, 0x1f, 0xaa, 0xbb]); // SPS (nal type 7)
        bytes.extend_from_slice(&[0, 0, 0, 1]);
        bytes.extend_from_slice(&[0x68, 0xcc, 0xdd]); // PPS (nal type 8)
        let hex_data = hex::encode(bytes);

        let record = build_avc_decoder_configuration_record(&hex_data).unwrap();
        assert_eq!(record[0], 1);
        assert_eq!(record[1], 0x64); // AVCProfileIndication
        assert_eq!(record[2], 0x00);
        assert_eq!(record[3], 0x1f); // AVCLevelIndication
    }

    fn build_playready_header_blob(kid_guid: [u8; 16]) -> String {
        let kid_base64 = STANDARD.encode(kid_guid);
        let wrm_xml = format!(
            "<WRMHEADER><DATA><PROTECTINFO><KID>{kid_base64}</KID></PROTECTINFO></DATA></WRMHEADER>"
        );
        let utf16_bytes: Vec<u8> = wrm_xml.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect();
        let mut blob = vec![0u8; 10]; // PlayReady Object length/record-count/type/length prefix
        blob.extend_from_slice(&utf16_bytes);
        STANDARD.encode(blob)
    }

    #[test]
    fn protection_header_recovers_kid_and_builds_both_pssh_entries() {
        let kid_guid = [
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, 0x10,
        ];
        let header = Element {
            name: "ProtectionHeader".into(),
            attrs: Vec::new(),
            text: build_playready_header_blob(kid_guid),
            children: Vec::new(),
        };

        let info = parse_protection_header(&header).unwrap();
        assert_eq!(info.key_id, guid_to_uuid(kid_guid));
        assert_eq!(info.systems.len(), 2);
        assert_eq!(info.systems[0].system_id, WIDEVINE_SYSTEM_ID);
        // The Widevine pssh body carries the raw KID bytes, not the
        // GUID-swapped `key_id` — the swap only feeds `tenc`.
        let mut expected_widevine_body = vec![0x08, 0x01, 0x12, 0x10];
        expected_widevine_body.extend_from_slice(&kid_guid);
        assert_eq!(info.systems[0].private_data, expected_widevine_body);
        assert_eq!(info.systems[1].system_id, PLAYREADY_SYSTEM_ID);
    }

    #[tokio::test]
    async fn open_and_get_tracks_populates_audio_and_video_from_a_fetched_manifest() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let manifest = r#"<SmoothStreamingMedia TimeScale="10000000">
          <StreamIndex Type="audio" Url="QualityLevels({bitrate})/Fragments(audio={start time})">
            <QualityLevel Bitrate="128000" SamplingRate="48000" Channels="2" CodecPrivateData="1210"/>
            <c t="0" d="20000000"/>
          </StreamIndex>
        </SmoothStreamingMedia>"#;

        Mock::given(method("GET"))
            .and(path("/manifest.ism/Manifest"))
            .respond_with(ResponseTemplate::new(200).set_body_string(manifest))
            .mount(&server)
            .await;

        let mut demux = SmoothDemux::new();
        demux
            .open(&format!("{}/manifest.ism/Manifest", server.uri()))
            .await
            .unwrap();
        let tracks = demux.get_tracks().await.unwrap();

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].sample_rate, 48_000);
        assert_eq!(tracks[0].bandwidth(), 128_000);
        assert_eq!(demux.queues[0].segment_urls.len(), 1);
    }
}
