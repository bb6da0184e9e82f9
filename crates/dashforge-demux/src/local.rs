//! Local (native-decoder) demux (4.4.1). Wraps a narrow [`NativeDecoder`]
//! trait boundary — one production implementation drives an external
//! decoder binary, one deterministic fake backs the tests.

use std::io::{BufRead, BufReader};
use std::process::{ChildStdout, Command, Stdio};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use dashforge_media::track::{Kind, Sample, Track};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Global/media timescale the local demux always reports, matching the
/// reference decoder's clock.
pub const LOCAL_TIMESCALE: u32 = 90_000;

/// One elementary stream as enumerated by the native decoder.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub kind: Kind,
    pub codec: String,
    pub width: u16,
    pub height: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub extradata: Vec<u8>,
}

/// One decoded access unit handed back by the native decoder.
#[derive(Debug, Clone)]
pub struct DecodedPacket {
    pub stream_index: usize,
    pub pts: i64,
    pub dts: i64,
    pub duration: u32,
    pub keyframe: bool,
    pub payload: Bytes,
}

/// The FFI boundary to an external decoder. Implementations own the
/// decoder's lifetime and translate its packets into [`DecodedPacket`]s.
pub trait NativeDecoder: Send {
    fn open(&mut self, path: &str) -> Result<()>;
    fn streams(&self) -> &[StreamInfo];
    /// Read the next packet, or `None` at end of stream.
    fn read_packet(&mut self) -> Result<Option<DecodedPacket>>;
    fn close(&mut self);
}

#[derive(Deserialize)]
struct WireHandshake {
    streams: Vec<WireStreamInfo>,
}

#[derive(Deserialize)]
struct WireStreamInfo {
    kind: String,
    codec: String,
    width: u16,
    height: u16,
    sample_rate: u32,
    bits_per_sample: u16,
    extradata_base64: String,
}

#[derive(Deserialize)]
struct WirePacket {
    stream_index: usize,
    pts: i64,
    dts: i64,
    duration: u32,
    keyframe: bool,
    payload_base64: String,
}

fn parse_stream(wire: WireStreamInfo) -> Result<StreamInfo> {
    let kind = match wire.kind.as_str() {
        "video" => Kind::Video,
        "audio" => Kind::Audio,
        other => return Err(Error::malformed_input(format!("unknown stream kind: {other}"))),
    };
    let extradata = STANDARD
        .decode(&wire.extradata_base64)
        .map_err(|e| Error::malformed_input(e.to_string()))?;
    Ok(StreamInfo {
        kind,
        codec: wire.codec,
        width: wire.width,
        height: wire.height,
        sample_rate: wire.sample_rate,
        bits_per_sample: wire.bits_per_sample,
        extradata,
    })
}

/// Locates and drives an external decoder binary via `which` +
/// `std::process::Command`, mirroring the reference's FFI boundary. The
/// binary emits one JSON handshake line describing its streams, then one
/// JSON packet record per line on stdout until EOF.
pub struct ProcessDecoder {
    binary_name: String,
    streams: Vec<StreamInfo>,
    child: Option<std::process::Child>,
    stdout: Option<BufReader<ChildStdout>>,
}

impl ProcessDecoder {
    pub fn new(binary_name: impl Into<String>) -> Self {
        Self {
            binary_name: binary_name.into(),
            streams: Vec::new(),
            child: None,
            stdout: None,
        }
    }
}

impl NativeDecoder for ProcessDecoder {
    fn open(&mut self, path: &str) -> Result<()> {
        let binary = which::which(&self.binary_name)
            .map_err(|e| Error::network(format!("decoder binary not found: {e}")))?;
        let mut child = Command::new(binary)
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(Error::Io)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::network("decoder produced no stdout"))?;
        let mut reader = BufReader::new(stdout);

        let mut handshake_line = String::new();
        reader.read_line(&mut handshake_line).map_err(Error::Io)?;
        let handshake: WireHandshake = serde_json::from_str(handshake_line.trim())
            .map_err(|e| Error::malformed_input(format!("decoder handshake: {e}")))?;
        self.streams = handshake
            .streams
            .into_iter()
            .map(parse_stream)
            .collect::<Result<Vec<_>>>()?;

        self.child = Some(child);
        self.stdout = Some(reader);
        Ok(())
    }

    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    fn read_packet(&mut self) -> Result<Option<DecodedPacket>> {
        let Some(reader) = self.stdout.as_mut() else {
            return Ok(None);
        };
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).map_err(Error::Io)?;
        if bytes_read == 0 {
            return Ok(None);
        }
        let wire: WirePacket = serde_json::from_str(line.trim())
            .map_err(|e| Error::malformed_input(format!("decoder packet: {e}")))?;
        let payload = STANDARD
            .decode(&wire.payload_base64)
            .map_err(|e| Error::malformed_input(e.to_string()))?;
        Ok(Some(DecodedPacket {
            stream_index: wire.stream_index,
            pts: wire.pts,
            dts: wire.dts,
            duration: wire.duration,
            keyframe: wire.keyframe,
            payload: Bytes::from(payload),
        }))
    }

    fn close(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Deterministic in-memory decoder used by tests: pre-seeded streams and a
/// fixed packet sequence.
#[derive(Default)]
pub struct FakeDecoder {
    streams: Vec<StreamInfo>,
    packets: std::collections::VecDeque<DecodedPacket>,
}

impl FakeDecoder {
    pub fn new(streams: Vec<StreamInfo>, packets: Vec<DecodedPacket>) -> Self {
        Self {
            streams,
            packets: packets.into(),
        }
    }
}

impl NativeDecoder for FakeDecoder {
    fn open(&mut self, _path: &str) -> Result<()> {
        Ok(())
    }

    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    fn read_packet(&mut self) -> Result<Option<DecodedPacket>> {
        Ok(self.packets.pop_front())
    }

    fn close(&mut self) {}
}

/// Wraps a [`NativeDecoder`], rejecting anything that is not H.264 video or
/// AAC-LC audio and stopping each `extractChunk` at the reference video
/// track's next key-frame boundary.
pub struct LocalDemux {
    decoder: Box<dyn NativeDecoder>,
    reference_track: Option<usize>,
    lookahead: Option<DecodedPacket>,
}

impl LocalDemux {
    pub fn new(decoder: Box<dyn NativeDecoder>) -> Self {
        Self {
            decoder,
            reference_track: None,
            lookahead: None,
        }
    }

    pub fn open(&mut self, path: &str) -> Result<()> {
        self.decoder.open(path)
    }

    /// Enumerate streams into tracks, rejecting unsupported codecs with a
    /// distinct error per reason.
    pub fn get_tracks(&mut self) -> Result<Vec<Track>> {
        let streams = self.decoder.streams();
        if streams.is_empty() {
            return Err(Error::EmptyTrackSet);
        }

        let mut tracks = Vec::with_capacity(streams.len());
        for (index, stream) in streams.iter().enumerate() {
            match stream.kind {
                Kind::Video if stream.codec != "h264" => {
                    return Err(Error::unsupported_codec(format!(
                        "video stream {index} uses unsupported codec {}",
                        stream.codec
                    )));
                }
                Kind::Audio if stream.codec != "aac" => {
                    return Err(Error::unsupported_codec(format!(
                        "audio stream {index} uses unsupported codec {}",
                        stream.codec
                    )));
                }
                _ => {}
            }

            let mut track = Track::new(index as u32 + 1, stream.kind, LOCAL_TIMESCALE, LOCAL_TIMESCALE);
            track.width = stream.width;
            track.height = stream.height;
            track.sample_rate = stream.sample_rate;
            track.bits_per_sample = stream.bits_per_sample;
            track.codec_extradata = stream.extradata.clone();
            tracks.push(track);
        }

        self.reference_track = tracks.iter().position(|t| t.is_video());
        Ok(tracks)
    }

    /// Read packets until the reference video track reaches its next
    /// key-frame boundary (or the decoder is exhausted). The boundary
    /// packet itself is held back for the next call rather than appended to
    /// the chunk being closed out.
    pub fn extract_chunk(&mut self, tracks: &mut [Track], _is_live: bool) -> Result<bool> {
        let reference = self.reference_track;

        loop {
            let packet = match self.lookahead.take() {
                Some(p) => p,
                None => match self.decoder.read_packet()? {
                    Some(p) => p,
                    None => return Ok(false),
                },
            };

            let Some(track) = tracks.get_mut(packet.stream_index) else {
                continue;
            };

            let is_boundary =
                reference == Some(packet.stream_index) && packet.keyframe && !track.pending_samples().is_empty();
            if is_boundary {
                self.lookahead = Some(packet);
                return Ok(true);
            }

            let sample = Sample::new(
                packet.pts,
                packet.dts,
                packet.duration,
                packet.keyframe,
                packet.payload,
            )?;
            track.append_sample(sample)?;
        }
    }

    pub fn close(&mut self) -> Result<()> {
        self.decoder.close();
        Ok(())
    }
}
