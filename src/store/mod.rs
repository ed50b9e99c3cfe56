// SPDX-License-Identifier: GPL-3.0-only
pub mod http;
pub mod memory;
pub mod predicate;
pub mod traits;

pub use http::HttpRemoteStore;
pub use memory::MemoryStore;
pub use predicate::{Comparison, Operator, Predicate, SortDescriptor};
pub use traits::{Cursor, Query, QueryPage, RecordChange, RemoteStore, SubscriptionHandle};
