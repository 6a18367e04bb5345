//! Core traits and types for the TTS streaming gateway
//!
//! This crate provides the foundational types used across all other crates:
//! - Audio chunk and format types
//! - Session lifecycle types with the monotonic status graph
//! - Wire frame envelopes for the streaming transport
//! - Error taxonomy
//! - Traits for pluggable providers, transcoders, and transports

pub mod audio;
pub mod error;
pub mod frame;
pub mod session;
pub mod traits;
pub mod voice;

pub use audio::{AudioChunk, AudioFormat, AudioSpec};
pub use error::{GatewayError, Result};
pub use frame::{CloseCode, StreamFrame};
pub use session::{CreateSessionRequest, Session, SessionStatus};
pub use voice::Voice;

pub use traits::{
    AudioTranscoder, ChunkStream, FrameTransport, SynthesisProvider, SynthesisRequest,
};
