//! Generation controller (4.6): drives a demux through a static (VoD) build
//! or an indefinite live build, writing init/media segments and the MPD as
//! it goes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dashforge_media::fmp4::{build_init_segment, build_media_segment};
use dashforge_media::manifest::{write_manifest, ManifestOptions};
use dashforge_media::track::{ChunkHistoryEntry, Kind, Track, DEFAULT_HISTORY_DEPTH};
use dashforge_demux::Demux;

/// How long the live loop sleeps when a tick produced no data.
const LIVE_RETRY_SLEEP: Duration = Duration::from_millis(500);

fn kind_label(kind: Kind) -> &'static str {
    match kind {
        Kind::Video => "video",
        Kind::Audio => "audio",
    }
}

fn init_file_name(track: &Track) -> String {
    format!("init_{}{}.mp4", kind_label(track.kind), track.index)
}

fn chunk_file_name(track: &Track, decode_time: i64) -> String {
    format!("chunk_{}{}_{}.mp4", kind_label(track.kind), track.index, decode_time)
}

async fn write_init_segments(tracks: &[Track], asset_dir: &Path) -> Result<()> {
    for track in tracks {
        let bytes = build_init_segment(track)?;
        let path = asset_dir.join(init_file_name(track));
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("writing init segment {:?}", path))?;
    }
    Ok(())
}

/// Builds and writes one media segment per track that has pending samples,
/// clearing each track's pending list and advancing its cursor. Returns, for
/// each track that emitted a segment, its duration in that track's own media
/// timescale.
async fn write_pending_segments(tracks: &mut [Track], asset_dir: &Path, is_live: bool) -> Result<Vec<(u32, u64)>> {
    let mut durations = Vec::new();
    for track in tracks.iter_mut() {
        if track.pending_samples().is_empty() {
            continue;
        }
        let decode_time = track.decode_time();
        let built = build_media_segment(track, is_live)?;
        let path = asset_dir.join(chunk_file_name(track, decode_time));
        tokio::fs::write(&path, &built.bytes)
            .await
            .with_context(|| format!("writing media segment {:?}", path))?;

        track.push_history(ChunkHistoryEntry {
            duration: built.duration as u32,
            size: built.size,
            file_name: path.file_name().unwrap().to_string_lossy().into_owned(),
        });
        track.finish_segment(built.duration);
        durations.push((track.media_timescale, built.duration));
    }
    Ok(durations)
}

async fn write_mpd(tracks: &[Track], asset_dir: &Path, asset_name: &str, is_live: bool) -> Result<()> {
    let options = ManifestOptions {
        asset_name,
        is_live,
        include_thumbnails: false,
    };
    let xml = write_manifest(tracks, &options)?;
    tokio::fs::write(asset_dir.join("manifest.mpd"), xml).await?;
    Ok(())
}

/// Runs a static (VoD) build to completion: open, demux to exhaustion,
/// segment every track, then write the manifest once.
pub async fn run_static_build(
    mut demux: Demux,
    source: &str,
    asset_name: &str,
    cache_root: &Path,
) -> Result<()> {
    demux.open(source).await.context("opening demux source")?;
    let mut tracks = demux.get_tracks().await.context("listing tracks")?;

    let asset_dir = cache_root.join(asset_name);
    tokio::fs::create_dir_all(&asset_dir).await?;
    write_init_segments(&tracks, &asset_dir).await?;

    loop {
        let more = demux.extract_chunk(&mut tracks, false).await?;
        write_pending_segments(&mut tracks, &asset_dir, false).await?;
        if !more {
            break;
        }
    }

    write_mpd(&tracks, &asset_dir, asset_name, false).await?;
    demux.close().await?;
    Ok(())
}

/// Runs the live worker until `stop` is flipped: extract one chunk per
/// track, write segments, rewrite the manifest, and sleep for the batch's
/// duration (or retry shortly if nothing was produced this tick).
pub async fn run_live_build(
    mut demux: Demux,
    source: &str,
    asset_name: &str,
    cache_root: &Path,
    stop: Arc<AtomicBool>,
) -> Result<()> {
    demux.open(source).await.context("opening demux source")?;
    let mut tracks = demux.get_tracks().await.context("listing tracks")?;

    let asset_dir = cache_root.join(asset_name);
    tokio::fs::create_dir_all(&asset_dir).await?;
    write_init_segments(&tracks, &asset_dir).await?;

    while !stop.load(Ordering::Relaxed) {
        let _more = demux.extract_chunk(&mut tracks, true).await?;
        let durations = write_pending_segments(&mut tracks, &asset_dir, true).await?;

        let min_secs = durations
            .iter()
            .map(|(timescale, duration)| *duration as f64 / *timescale as f64)
            .fold(f64::INFINITY, f64::min);

        if min_secs.is_finite() && min_secs > 0.0 {
            let mut discarded = Vec::new();
            for track in tracks.iter_mut() {
                discarded.extend(track.trim_history(DEFAULT_HISTORY_DEPTH));
            }
            for entry in discarded {
                let _ = tokio::fs::remove_file(asset_dir.join(&entry.file_name)).await;
            }

            write_mpd(&tracks, &asset_dir, asset_name, true).await?;
            tokio::time::sleep(Duration::from_secs_f64(min_secs)).await;
        } else {
            tokio::time::sleep(LIVE_RETRY_SLEEP).await;
        }

        if stop.load(Ordering::Relaxed) {
            break;
        }
    }

    demux.close().await?;
    Ok(())
}

/// Directory for an asset's cached artifacts: `<cacheRoot>/<assetName>/`.
pub fn asset_dir(cache_root: &Path, asset_name: &str) -> PathBuf {
    cache_root.join(asset_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashforge_demux::local::FakeDecoder;
    use dashforge_demux::local::{DecodedPacket, StreamInfo};

    fn video_stream() -> StreamInfo {
        StreamInfo {
            kind: Kind::Video,
            codec: "h264".into(),
            width: 640,
            height: 360,
            sample_rate: 0,
            bits_per_sample: 24,
            extradata: vec![0x01, 0x64, 0x00, 0x1f, 0xff, 0xe1],
        }
    }

    fn packet(pts: i64, keyframe: bool) -> DecodedPacket {
        DecodedPacket {
            stream_index: 0,
            pts,
            dts: pts,
            duration: 3600,
            keyframe,
            payload: bytes::Bytes::from_static(b"frame-data"),
        }
    }

    #[tokio::test]
    async fn static_build_writes_init_and_media_segments_plus_manifest() {
        let packets = vec![packet(0, true), packet(3600, false), packet(7200, true)];
        let decoder = FakeDecoder::new(vec![video_stream()], packets);
        let demux = Demux::local(Box::new(decoder));

        let dir = tempfile::tempdir().unwrap();
        run_static_build(demux, "movie.mp4", "movie", dir.path()).await.unwrap();

        let asset_dir = dir.path().join("movie");
        assert!(asset_dir.join("init_video1.mp4").exists());
        assert!(asset_dir.join("manifest.mpd").exists());
        let entries: Vec<_> = std::fs::read_dir(&asset_dir).unwrap().collect();
        assert!(entries.len() >= 2);
    }
}
