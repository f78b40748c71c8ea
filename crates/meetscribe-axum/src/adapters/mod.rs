//! Concrete, pluggable implementations of the opaque collaborator ports
//! (`Transcriber`, `Normalizer`, `DocRenderer`, `Llm`). None of these is
//! part of the core engine's scope; they are wired here, at the
//! composition root, the same way the process-spawning and HTTP-client
//! adapters are wired into the bootstrap module rather than the core
//! domain crate.

mod docs;
mod llm;
mod normalize;
mod transcribe;

pub use docs::PlaintextDocRenderer;
pub use llm::{ChatModelEndpoint, HttpLlm};
pub use normalize::PassthroughNormalizer;
pub use transcribe::ExternalCommandTranscriber;
