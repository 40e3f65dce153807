// Model-backed data entry: gateway with fallback, task adapters, chat session

pub mod backend;
pub mod conversation;
pub mod document;
pub mod extract;
pub mod gateway;
pub mod gemini;
pub mod json;
pub mod prompts;
pub mod quote;

pub use backend::{BackendError, Content, GenerateRequest, GenerationConfig, ModelBackend, Part, Role, Tool};
pub use conversation::{ChatOutcome, ChatTurn, Conversation, Proposal, TurnRole};
pub use document::{DocumentBody, ReferenceDocument};
pub use extract::{extract, ExtractError, Extraction};
pub use gateway::{Gateway, GatewayError, Invocation, InvokeRequest, ModelPlan};
pub use gemini::GeminiBackend;
pub use quote::{quote, QuoteError, Quotes};
