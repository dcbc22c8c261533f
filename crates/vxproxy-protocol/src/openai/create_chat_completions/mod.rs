pub mod request;
pub mod response;
pub mod stream;
pub mod types;

pub use request::{
    CreateChatCompletionRequest, GoogleThinkingConfig, GoogleVendorExtension, StopConfiguration,
};
pub use response::{ChatCompletionChoice, ChatCompletionObjectType, CreateChatCompletionResponse};
pub use stream::{
    ChatCompletionChunkObjectType, ChatCompletionStreamChoice, CreateChatCompletionStreamResponse,
};
pub use types::*;
