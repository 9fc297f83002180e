//! Rerank engines: in-process lexical model and remote HTTP service

mod lexical;
mod remote;

pub use lexical::LexicalCrossEncoder;
pub use remote::RemoteRerankClient;
