//! Generation controller: drives a demux through a static (VoD) build or an
//! indefinite live build, writing init/media segments and the manifest.

pub mod controller;
