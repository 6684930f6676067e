//! Transcription and analysis provider clients for `EchoLens`

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod analyze;
pub mod error;
pub mod mock;
pub mod summarize;
pub mod transcribe;

pub use analyze::{CallAnalyzer, ChatAnalyzer};
pub use error::{ProviderError, ProviderResult};
pub use summarize::{ChatSummarizer, SummaryModel};
pub use transcribe::{OpenAiTranscriber, SpeechToText, Transcript};
