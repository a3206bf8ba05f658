//! Realtime model providers: production implementations of the
//! `RealtimeModelProvider` seam.

pub mod openai;

pub use openai::OpenAiRealtimeProvider;
