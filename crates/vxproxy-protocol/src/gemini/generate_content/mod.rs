pub mod request;
pub mod response;

pub use request::GenerateContentRequest;
pub use response::{
    Candidate, FinishReason, GenerateContentResponse, PromptFeedback, UsageMetadata,
};
