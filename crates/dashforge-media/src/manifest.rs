//! DASH MPD manifest writer (C5). Built with `std::fmt::Write` string
//! formatting — no XML-tree dependency is pulled in anywhere in this
//! codebase.

use std::fmt::Write as _;

use crate::error::Result;
use crate::track::Track;

const STATIC_PROFILE: &str = "urn:com:dashif:dash264";
const DYNAMIC_PROFILES: &str = "urn:mpeg:dash:profile:isoff-live:2011,urn:com:dashif:dash264,urn:hbbtv:dash:profile:isoff-live:2012";

const MIN_THUMBNAIL_WIDTH: u16 = 320;
const MIN_THUMBNAIL_HEIGHT: u16 = 180;

/// Options controlling manifest shape beyond what the track list implies.
pub struct ManifestOptions<'a> {
    pub asset_name: &'a str,
    pub is_live: bool,
    pub include_thumbnails: bool,
}

/// Render the MPD for the given tracks.
pub fn write_manifest(tracks: &[Track], options: &ManifestOptions) -> Result<String> {
    let video_tracks: Vec<&Track> = tracks.iter().filter(|t| t.is_video()).collect();
    let audio_tracks: Vec<&Track> = tracks.iter().filter(|t| t.is_audio()).collect();

    let mut out = String::new();
    writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#).ok();

    if options.is_live {
        write_dynamic_root(&mut out, tracks);
    } else {
        write_static_root(&mut out, tracks);
    }

    writeln!(out, r#"  <Period id="0" start="PT0S">"#).ok();
    if !video_tracks.is_empty() {
        write_video_adaptation_set(&mut out, &video_tracks, options)?;
    }
    if !audio_tracks.is_empty() {
        write_audio_adaptation_set(&mut out, &audio_tracks)?;
    }
    if options.include_thumbnails && !video_tracks.is_empty() {
        write_thumbnail_adaptation_set(&mut out, &video_tracks);
    }
    writeln!(out, "  </Period>").ok();
    writeln!(out, "</MPD>").ok();

    Ok(out)
}

fn write_static_root(out: &mut String, tracks: &[Track]) {
    let duration_secs = tracks
        .iter()
        .map(track_duration_secs)
        .fold(f64::INFINITY, f64::min);
    let duration_secs = if duration_secs.is_finite() { duration_secs } else { 0.0 };

    writeln!(
        out,
        r#"<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" type="static" profiles="{STATIC_PROFILE}" mediaPresentationDuration="{}">"#,
        format_duration(duration_secs)
    )
    .ok();
}

fn write_dynamic_root(out: &mut String, tracks: &[Track]) {
    let max_segment_duration = max_segment_duration_secs(tracks);
    let min_buffer_time = min_buffer_time_secs(tracks);
    let time_shift_buffer_depth = time_shift_buffer_depth_secs(tracks);

    writeln!(
        out,
        r#"<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" type="dynamic" profiles="{DYNAMIC_PROFILES}" minimumUpdatePeriod="PT2S" timeShiftBufferDepth="{}" maxSegmentDuration="{}" minBufferTime="{}">"#,
        format_duration(time_shift_buffer_depth),
        format_duration(max_segment_duration),
        format_duration(min_buffer_time),
    )
    .ok();
}

fn write_video_adaptation_set(
    out: &mut String,
    tracks: &[&Track],
    options: &ManifestOptions,
) -> Result<()> {
    let _ = options;
    let bandwidths: Vec<u32> = tracks.iter().map(|t| t.bandwidth()).collect();
    let min_bw = bandwidths.iter().min().copied().unwrap_or(0);
    let max_bw = bandwidths.iter().max().copied().unwrap_or(0);
    let min_w = tracks.iter().map(|t| t.width).min().unwrap_or(0);
    let max_w = tracks.iter().map(|t| t.width).max().unwrap_or(0);
    let min_h = tracks.iter().map(|t| t.height).min().unwrap_or(0);
    let max_h = tracks.iter().map(|t| t.height).max().unwrap_or(0);

    writeln!(
        out,
        r#"    <AdaptationSet contentType="video" mimeType="video/mp4" par="16:9" segmentAlignment="true" minWidth="{min_w}" maxWidth="{max_w}" minHeight="{min_h}" maxHeight="{max_h}" {}>"#,
        bandwidth_attrs(min_bw, max_bw)
    )
    .ok();

    for track in tracks {
        write_video_representation(out, track)?;
    }
    writeln!(out, "    </AdaptationSet>").ok();
    Ok(())
}

fn write_audio_adaptation_set(out: &mut String, tracks: &[&Track]) -> Result<()> {
    let bandwidths: Vec<u32> = tracks.iter().map(|t| t.bandwidth()).collect();
    let min_bw = bandwidths.iter().min().copied().unwrap_or(0);
    let max_bw = bandwidths.iter().max().copied().unwrap_or(0);

    writeln!(
        out,
        r#"    <AdaptationSet contentType="audio" mimeType="audio/mp4" segmentAlignment="true" {}>"#,
        bandwidth_attrs(min_bw, max_bw)
    )
    .ok();

    for track in tracks {
        write_audio_representation(out, track)?;
    }
    writeln!(out, "    </AdaptationSet>").ok();
    Ok(())
}

fn bandwidth_attrs(min_bw: u32, max_bw: u32) -> String {
    if min_bw == max_bw {
        format!(r#"bandwidth="{min_bw}""#)
    } else {
        format!(r#"minBandwidth="{min_bw}" maxBandwidth="{max_bw}""#)
    }
}

fn write_video_representation(out: &mut String, track: &Track) -> Result<()> {
    let codec = track.codec_string()?;
    writeln!(
        out,
        r#"      <Representation id="{id}" mimeType="video/mp4" codecs="{codec}" width="{w}" height="{h}" bandwidth="{bw}">"#,
        id = track.index,
        codec = codec,
        w = track.width,
        h = track.height,
        bw = track.bandwidth(),
    )
    .ok();
    write_segment_template(out, track, "video");
    writeln!(out, "      </Representation>").ok();
    Ok(())
}

fn write_audio_representation(out: &mut String, track: &Track) -> Result<()> {
    let codec = track.codec_string()?;
    writeln!(
        out,
        r#"      <Representation id="{id}" mimeType="audio/mp4" codecs="{codec}" audioSamplingRate="{sr}" bandwidth="{bw}">"#,
        id = track.index,
        codec = codec,
        sr = track.sample_rate,
        bw = track.bandwidth(),
    )
    .ok();
    write_segment_template(out, track, "audio");
    writeln!(out, "      </Representation>").ok();
    Ok(())
}

fn write_segment_template(out: &mut String, track: &Track, kind: &str) {
    writeln!(
        out,
        r#"        <SegmentTemplate timescale="{ts}" initialization="init_{kind}{n}.mp4" media="chunk_{kind}{n}_$Time$.mp4">"#,
        ts = track.media_timescale,
        kind = kind,
        n = track.index,
    )
    .ok();
    writeln!(out, "          <SegmentTimeline>").ok();

    let total: u64 = track.history().iter().map(|e| e.duration as u64).sum();
    let mut t = track.decode_time() as i64 - total as i64;
    let mut first = true;
    for entry in track.history() {
        if first {
            writeln!(out, r#"            <S t="{t}" d="{d}"/>"#, t = t, d = entry.duration).ok();
            first = false;
        } else {
            writeln!(out, r#"            <S d="{d}"/>"#, d = entry.duration).ok();
        }
        t += entry.duration as i64;
    }
    writeln!(out, "          </SegmentTimeline>").ok();
    writeln!(out, "        </SegmentTemplate>").ok();
}

fn write_thumbnail_adaptation_set(out: &mut String, video_tracks: &[&Track]) {
    let mut width = video_tracks.iter().map(|t| t.width).min().unwrap_or(MIN_THUMBNAIL_WIDTH);
    let mut height = video_tracks.iter().map(|t| t.height).min().unwrap_or(MIN_THUMBNAIL_HEIGHT);
    width = width.max(MIN_THUMBNAIL_WIDTH);
    height = height.max(MIN_THUMBNAIL_HEIGHT);

    let duration_secs = video_tracks
        .iter()
        .map(|t| track_duration_secs(t))
        .fold(f64::INFINITY, f64::min);
    let duration_secs = if duration_secs.is_finite() { duration_secs } else { 0.0 };

    writeln!(out, r#"    <AdaptationSet contentType="image" mimeType="image/jpeg">"#).ok();
    writeln!(
        out,
        r#"      <SegmentTemplate media="thumbnails.bsi" duration="{}"/>"#,
        format_duration(duration_secs)
    )
    .ok();
    writeln!(out, r#"      <Representation id="thumbnails" width="{width}" height="{height}"/>"#).ok();
    writeln!(out, "    </AdaptationSet>").ok();
}

fn track_duration_secs(track: &Track) -> f64 {
    if track.global_timescale == 0 {
        0.0
    } else {
        track.duration as f64 / track.global_timescale as f64
    }
}

fn max_segment_duration_secs(tracks: &[Track]) -> f64 {
    tracks
        .iter()
        .flat_map(|t| t.history().iter().map(move |e| e.duration as f64 / t.media_timescale.max(1) as f64))
        .fold(0.0, f64::max)
}

fn min_buffer_time_secs(tracks: &[Track]) -> f64 {
    tracks
        .iter()
        .map(|t| mean_segment_duration_secs(t))
        .fold(0.0, f64::max)
}

fn time_shift_buffer_depth_secs(tracks: &[Track]) -> f64 {
    tracks
        .iter()
        .map(|t| t.history().len() as f64 * mean_segment_duration_secs(t))
        .fold(f64::INFINITY, f64::min)
        .min(f64::MAX)
}

fn mean_segment_duration_secs(track: &Track) -> f64 {
    let count = track.history().len();
    if count == 0 {
        return 0.0;
    }
    let total: u64 = track.history().iter().map(|e| e.duration as u64).sum();
    total as f64 / count as f64 / track.media_timescale.max(1) as f64
}

fn format_duration(seconds: f64) -> String {
    format!("PT{:.3}S", seconds.max(0.0))
}
