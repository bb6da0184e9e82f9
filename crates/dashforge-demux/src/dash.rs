//! DASH demux (4.4.2). Parses an MPD subset, materializes one [`Track`] per
//! Representation, and fetches/parses init and media segments over HTTP.

use std::collections::VecDeque;

use bytes::Bytes;
use dashforge_media::atom::AtomReader;
use dashforge_media::track::{EncryptionInfo, Kind, Sample, Track};

use crate::error::{Error, Result};
use crate::xml::{self, Element};

struct RepresentationQueue {
    track_index: usize,
    segment_urls: VecDeque<String>,
}

/// Parses a DASH MPD and serves it through the four-operation demux
/// contract. Keeps one `reqwest::Client` for the lifetime of the instance
/// so per-track segment fetches reuse connections.
pub struct DashDemux {
    client: reqwest::Client,
    base_url: String,
    document: Option<Element>,
    queues: Vec<RepresentationQueue>,
}

impl Default for DashDemux {
    fn default() -> Self {
        Self::new()
    }
}

impl DashDemux {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: String::new(),
            document: None,
            queues: Vec::new(),
        }
    }

    /// Fetch and parse the MPD, caching the document for the lifetime of
    /// this instance (re-parsed only by a fresh `open` call).
    pub async fn open(&mut self, mpd_url: &str) -> Result<()> {
        self.base_url = base_url_of(mpd_url);
        let body = self.fetch_text(mpd_url).await?;
        self.document = Some(xml::parse(&body)?);
        Ok(())
    }

    pub async fn get_tracks(&mut self) -> Result<Vec<Track>> {
        let document = self
            .document
            .as_ref()
            .ok_or_else(|| Error::malformed_input("get_tracks called before open"))?;

        let mut tracks = Vec::new();
        let mut queues = Vec::new();
        let mut next_index = 1u32;

        for period in document.children_named("Period") {
            for adaptation_set in period.children_named("AdaptationSet") {
                let kind = adaptation_set_kind(adaptation_set);
                let set_template = adaptation_set.find_first("SegmentTemplate");
                let set_base_url = adaptation_set.find_first("BaseURL");

                for representation in adaptation_set.children_named("Representation") {
                    let index = next_index;
                    next_index += 1;

                    let mut track = Track::new(index, kind, 1, 1);
                    track.width = parse_attr(representation, "width").unwrap_or(0);
                    track.height = parse_attr(representation, "height").unwrap_or(0);
                    track.sample_rate = parse_attr(representation, "audioSamplingRate").unwrap_or(0);
                    if let Some(bandwidth) = parse_attr(representation, "bandwidth") {
                        track.set_bandwidth(bandwidth);
                    }

                    let template = representation.find_first("SegmentTemplate").or(set_template);
                    let segment_urls = if let Some(template) = template {
                        build_template_queue(&self.base_url, template, representation)
                    } else if let Some(base) = representation
                        .find_first("BaseURL")
                        .or(set_base_url)
                    {
                        VecDeque::from([resolve_url(&self.base_url, &base.text)])
                    } else {
                        VecDeque::new()
                    };

                    if let Some(template) = template {
                        if let Some(init_template) = template.attr("initialization") {
                            let init_url = resolve_url(
                                &self.base_url,
                                &expand_template(init_template, representation, 0, 0),
                            );
                            let init_bytes = self.fetch_bytes(&init_url).await?;
                            apply_init_segment(&mut track, &init_bytes)?;
                        }
                    }

                    let track_index = tracks.len();
                    tracks.push(track);
                    queues.push(RepresentationQueue {
                        track_index,
                        segment_urls,
                    });
                }
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
            let bytes = self.fetch_bytes(&url).await?;
            let track = &mut tracks[queue.track_index];
            apply_media_segment(track, &bytes)?;
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

fn adaptation_set_kind(adaptation_set: &Element) -> Kind {
    let content_type = adaptation_set
        .attr("contentType")
        .or_else(|| adaptation_set.attr("mimeType"))
        .unwrap_or("");
    if content_type.contains("audio") {
        Kind::Audio
    } else {
        Kind::Video
    }
}

fn parse_attr<T: std::str::FromStr>(element: &Element, name: &str) -> Option<T> {
    element.attr(name).and_then(|v| v.parse().ok())
}

/// Build the segment URL queue from a `SegmentTemplate`'s `SegmentTimeline`:
/// each `<S t d r>` entry expands to `r+1` URLs, `$Time$` advancing by `d`
/// per step unless the next entry supplies an explicit `t`.
fn build_template_queue(base_url: &str, template: &Element, representation: &Element) -> VecDeque<String> {
    let Some(media) = template.attr("media") else {
        return VecDeque::new();
    };
    let start_number: u64 = template.attr("startNumber").and_then(|s| s.parse().ok()).unwrap_or(1);

    let mut urls = VecDeque::new();
    let mut number = start_number;
    let mut time: u64 = 0;

    let Some(timeline) = template.find_first("SegmentTimeline") else {
        return urls;
    };

    for entry in timeline.children_named("S") {
        if let Some(t) = entry.attr("t").and_then(|s| s.parse::<u64>().ok()) {
            time = t;
        }
        let duration: u64 = entry.attr("d").and_then(|s| s.parse().ok()).unwrap_or(0);
        let repeat: u64 = entry.attr("r").and_then(|s| s.parse().ok()).unwrap_or(0);

        for _ in 0..=repeat {
            let expanded = expand_template(media, representation, number, time);
            urls.push_back(resolve_url(base_url, &expanded));
            number += 1;
            time += duration;
        }
    }

    urls
}

fn expand_template(template: &str, representation: &Element, number: u64, time: u64) -> String {
    let mut result = template.to_string();
    if let Some(id) = representation.attr("id") {
        result = result.replace("$RepresentationID$", id);
    }
    if let Some(bandwidth) = representation.attr("bandwidth") {
        result = result.replace("$Bandwidth$", bandwidth);
    }
    result = result.replace("$Number$", &number.to_string());
    result = result.replace("$Time$", &time.to_string());
    result
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

/// Parse `mdhd`/`mvhd` timescales, `hdlr` type, the `stsd` sample entry
/// (including its encrypted sibling and extradata), and any `tenc`/`pssh`
/// present, writing them onto `track`.
fn apply_init_segment(track: &mut Track, data: &[u8]) -> Result<()> {
    let mut reader = AtomReader::new(data);
    let moov = reader
        .descend(&[b"moov"])?
        .ok_or_else(|| Error::malformed_input("init segment missing moov"))?;
    reader.seek_to(moov.start + moov.header_size as usize)?;

    if let Some(mvhd) = reader.find_child_box(b"mvhd", moov.content_size() as usize)? {
        reader.read_fullbox_header()?;
        reader.read_u32()?; // creation_time
        reader.read_u32()?; // modification_time
        track.global_timescale = reader.read_u32()?;
        reader.skip_box(&mvhd)?;
    }

    reader.seek_to(moov.start + moov.header_size as usize)?;
    let trak = reader
        .find_child_box(b"trak", moov.content_size() as usize)?
        .ok_or_else(|| Error::malformed_input("init segment missing trak"))?;

    if let Some(mdhd) = reader.descend_from(&trak, &[b"mdia", b"mdhd"])? {
        reader.seek_to(mdhd.start + mdhd.header_size as usize)?;
        reader.read_fullbox_header()?;
        reader.read_u32()?;
        reader.read_u32()?;
        track.media_timescale = reader.read_u32()?;
    }

    if let Some(stsd) = reader.descend_from(&trak, &[b"mdia", b"minf", b"stbl", b"stsd"])? {
        reader.seek_to(stsd.start + stsd.header_size as usize)?;
        reader.read_fullbox_header()?;
        reader.read_u32()?; // entry_count
        apply_sample_entry(track, &mut reader)?;
    }

    Ok(())
}

fn apply_sample_entry(track: &mut Track, reader: &mut AtomReader<'_>) -> Result<()> {
    let entry = reader.read_header()?;
    let is_video = &entry.tag == b"avc1" || &entry.tag == b"encv";
    let is_encrypted = &entry.tag == b"enca" || &entry.tag == b"encv";

    if is_video {
        reader.read_bytes(6 + 2 + 2 + 2 + 12)?; // reserved..pre_defined[3]
        reader.read_u16()?; // width (already known from Representation)
        reader.read_u16()?; // height
        reader.read_u32()?; // horizresolution
        reader.read_u32()?; // vertresolution
        reader.read_u32()?; // reserved
        reader.read_u16()?; // frame_count
        reader.read_bytes(32)?; // compressorname
        track.bits_per_sample = reader.read_u16()?;
        track.color_table_id = reader.read_i16()?;
    } else {
        reader.read_bytes(6 + 2 + 2 + 2 + 4)?; // reserved..vendor
        reader.read_u16()?; // channel_count
        reader.read_u16()?; // sample_size
        reader.read_u16()?; // compression_id
        reader.read_u16()?; // packet_size
        let sample_rate = reader.read_u32()?;
        track.sample_rate = sample_rate >> 16;
    }

    let extradata_search_start = reader.position();
    let inner_limit = entry.end().saturating_sub(extradata_search_start);
    if is_video {
        if let Some(avcc) = reader.find_child_box(b"avcC", inner_limit)? {
            track.codec_extradata = reader.read_bytes(avcc.content_size() as usize)?.to_vec();
            reader.seek_to(avcc.end())?;
        }
    } else if let Some(esds) = reader.find_child_box(b"esds", inner_limit)? {
        reader.read_fullbox_header()?;
        track.codec_extradata = extract_decoder_specific_info(reader, esds.end())?;
        reader.seek_to(esds.end())?;
    }

    if is_encrypted {
        reader.seek_to(extradata_search_start)?;
        if let Some(sinf) = reader.find_child_box(b"sinf", inner_limit)? {
            if let Some(tenc) = reader.descend_from(&sinf, &[b"schi", b"tenc"])? {
                reader.seek_to(tenc.start + tenc.header_size as usize)?;
                reader.read_fullbox_header()?;
                reader.read_u8()?; // reserved
                reader.read_u8()?; // default_IsProtected
                reader.read_u8()?; // default_Per_Sample_IV_Size
                let key_id_bytes = reader.read_bytes(16)?;
                let mut key_id = [0u8; 16];
                key_id.copy_from_slice(key_id_bytes);
                track.encryption = Some(EncryptionInfo {
                    systems: Vec::new(),
                    sub_encrypt: false,
                    key_id,
                });
            }
        }
    }

    Ok(())
}

/// Walk an MPEG-4 ES descriptor tree to find tag `0x05`
/// (`DecoderSpecificInfo`) and return its body — the `AudioSpecificConfig`.
fn extract_decoder_specific_info(reader: &mut AtomReader<'_>, end: usize) -> Result<Vec<u8>> {
    while reader.position() < end {
        let tag = reader.read_u8()?;
        let len = reader.read_u8()? as usize;
        if tag == 0x05 {
            return Ok(reader.read_bytes(len)?.to_vec());
        }
        if tag == 0x03 {
            reader.read_bytes(3)?; // ES_ID + flags
            continue;
        }
        if tag == 0x04 {
            reader.read_bytes(13)?; // fixed DecoderConfigDescriptor fields
            continue;
        }
        reader.read_bytes(len)?;
    }
    Ok(Vec::new())
}

/// Parse a media segment fragment: `tfhd`'s `default_sample_duration` seeds
/// per-sample durations unless `trun` overrides them; `elst` (read from the
/// init segment in a fuller implementation) is out of scope here since this
/// demux does not track edit lists beyond what `tfdt`/`trun` already supply.
fn apply_media_segment(track: &mut Track, data: &[u8]) -> Result<()> {
    let mut reader = AtomReader::new(data);
    let moof = reader
        .descend(&[b"moof"])?
        .ok_or_else(|| Error::malformed_input("media segment missing moof"))?;

    let traf = reader
        .descend_from(&moof, &[b"traf"])?
        .ok_or_else(|| Error::malformed_input("moof missing traf"))?;

    let mut base_media_decode_time = 0i64;
    let mut default_sample_duration = 0u32;
    let mut sample_entries: Vec<(u32, u32, bool)> = Vec::new(); // (duration, size, keyframe)

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
                reader.read_i32()?; // composition time offset
            }
            let keyframe = (sample_flags & 0x0001_0000) == 0; // sample_is_non_sync_sample bit clear
            sample_entries.push((duration, size, keyframe));
        }
        reader.seek_to(trun.end())?;
    }

    let mdat = reader
        .descend(&[b"mdat"])?
        .ok_or_else(|| Error::malformed_input("segment missing mdat"))?;
    reader.seek_to(mdat.start + mdat.header_size as usize)?;

    let mut pts = base_media_decode_time;
    for (duration, size, keyframe) in sample_entries {
        let payload = reader.read_bytes(size as usize)?;
        let sample = Sample::new(pts, pts, duration.max(1), keyframe, Bytes::copy_from_slice(payload))?;
        track.append_sample(sample)?;
        pts += duration as i64;
    }

    Ok(())
}
