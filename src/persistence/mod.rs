//! Persistence primitives: the sorted key/blob store and the document store on top of it.

mod data_log;
mod doc_store;
mod isam;
mod sorted_index;

pub use data_log::DataLog;
pub use doc_store::DocStore;
pub use isam::{InsertOutcome, IsamStore};
pub use sorted_index::{IndexEntry, SortedIndex};
