#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Topic routing and retrieval-augmented answering over per-topic corpora.

pub mod agent;
pub mod prompts;
pub mod router;

pub use agent::LawAgent;
pub use router::{parse_decision, TopicRouter};
