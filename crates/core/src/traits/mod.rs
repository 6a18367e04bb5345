//! Traits at the seams between gateway components

mod provider;
mod transcode;
mod transport;

pub use provider::{ChunkStream, SynthesisProvider, SynthesisRequest};
pub use transcode::AudioTranscoder;
pub use transport::FrameTransport;
