//! Language-model providers
//!
//! The router and the specialists talk to a `ChatModel`. `GenaiModel` is the
//! production implementation: it drives an Azure OpenAI deployment through
//! the `genai` crate, resolving the endpoint with a `ServiceTargetResolver`
//! and the API key from our `SecretStore`. `MockModel` replays a script for
//! tests.

mod traits;
mod error;
mod genai_adapter;
mod genai_model;
mod mock;

pub use traits::{ChatModel, ModelTurn};
pub use error::{ProviderError, ProviderResult};
pub use genai_adapter::azure_base_url;
pub use genai_model::GenaiModel;
pub use mock::{MockModel, MockReply, MockRequest};
