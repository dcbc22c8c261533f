//! Wire types for the two API shapes the gateway speaks, plus the incremental
//! SSE parser used on upstream streams.

pub mod error;
pub mod gemini;
pub mod openai;
pub mod sse;
