//! Chat proxy: stateless HTTP front for the Model Gateway.
//!
//! Each request carries the whole conversation. The proxy filters blank entries, prepends
//! the endpoint's instruction payload, calls the model once and returns the text, or a fixed
//! fallback message on failure.
//!
//! Status codes: 200 on success, 500 with the fallback body when the model call fails, and 400
//! with the same fallback body when the request body is not a JSON object with a `messages`
//! array. A 400 never reaches the model.

mod protocol;
mod server;

pub use protocol::{
    parse_request, to_model_messages, ChatReply, ProxyRequest, SummaryReply, CHAT_FALLBACK,
    SUMMARY_FALLBACK,
};
pub use server::{router, run_proxy, serve, ProxyState, Sampling};
