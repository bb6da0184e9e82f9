//! Closed tagged-enum dispatch over the three demux variants, hiding the
//! local/DASH/Smooth split behind the uniform `open`/`get_tracks`/
//! `extract_chunk`/`close` contract (4.4).

use dashforge_media::track::Track;

use crate::dash::DashDemux;
use crate::error::Result;
use crate::local::{LocalDemux, NativeDecoder};
use crate::smooth::SmoothDemux;

/// One of the three source kinds a generation run can demux from.
pub enum Demux {
    Local(LocalDemux),
    Dash(DashDemux),
    Smooth(SmoothDemux),
}

impl Demux {
    pub fn local(decoder: Box<dyn NativeDecoder>) -> Self {
        Demux::Local(LocalDemux::new(decoder))
    }

    pub fn dash() -> Self {
        Demux::Dash(DashDemux::new())
    }

    pub fn smooth() -> Self {
        Demux::Smooth(SmoothDemux::new())
    }

    pub async fn open(&mut self, source: &str) -> Result<()> {
        match self {
            Demux::Local(d) => d.open(source),
            Demux::Dash(d) => d.open(source).await,
            Demux::Smooth(d) => d.open(source).await,
        }
    }

    pub async fn get_tracks(&mut self) -> Result<Vec<Track>> {
        match self {
            Demux::Local(d) => d.get_tracks(),
            Demux::Dash(d) => d.get_tracks().await,
            Demux::Smooth(d) => d.get_tracks().await,
        }
    }

    pub async fn extract_chunk(&mut self, tracks: &mut [Track], is_live: bool) -> Result<bool> {
        match self {
            Demux::Local(d) => d.extract_chunk(tracks, is_live),
            Demux::Dash(d) => d.extract_chunk(tracks, is_live).await,
            Demux::Smooth(d) => d.extract_chunk(tracks, is_live).await,
        }
    }

    pub async fn close(&mut self) -> Result<()> {
        match self {
            Demux::Local(d) => d.close(),
            Demux::Dash(d) => d.close().await,
            Demux::Smooth(d) => d.close().await,
        }
    }
}
