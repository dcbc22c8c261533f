//! Translation between the OpenAI chat-completions shape and Gemini
//! `generateContent`, plus the incremental splitter that separates tagged
//! reasoning text from visible content.

pub mod error;
pub mod generate_content;
pub mod model;
pub mod think_tag;

pub use error::TransformError;
pub use model::{ModelTarget, ThinkingTier};
pub use think_tag::{SplitOutput, TagSplitter};
