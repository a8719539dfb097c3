//! Core type definitions
//!
//! Value types shared across the protocol stack: identifier newtypes,
//! interaction descriptions, the generation request, and the canonical
//! response shape.

pub mod identifiers;
pub mod interaction;
pub mod request;
pub mod response;

pub use identifiers::{InteractionId, ProviderId, RequestId, SessionId};
pub use interaction::{
    AnswerSource, InteractionAnswer, InteractionOption, InteractionRequest, SubmitResult,
};
pub use request::{GenerateRequest, GenerateRequestBuilder};
pub use response::{CanonicalResponse, ToolCallRecord, Usage};
