//! Response streaming: provider events, the normalized protocol and the
//! state machine between them.

mod event;
mod normalizer;
pub mod raw;

pub use event::{RequestTags, StreamEvent, UsageUpdate, WireEvent, WireMetadata};
pub use normalizer::{NormalizerState, StreamNormalizer, UsageAccumulator};
pub use raw::RawEvent;
