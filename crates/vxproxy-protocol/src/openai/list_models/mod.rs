pub mod response;

pub use response::{ListModelsResponse, ListObjectType, Model, ModelObjectType};
