#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod indexer;
pub mod naming;
pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use indexer::CorpusIndexer;
pub use naming::collection_name;
pub use search::Collection;
pub use table::CollectionManifest;
