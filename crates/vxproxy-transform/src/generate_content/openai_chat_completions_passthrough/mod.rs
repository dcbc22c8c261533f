//! Client and upstream both speak OpenAI chat completions; the upstream is
//! asked to inline its thoughts between tags, which are split back out here.

pub mod request;
pub mod response;
pub mod stream;

pub use request::transform_request;
pub use response::transform_response;
pub use stream::OpenAIChatCompletionReasoningStreamState;
