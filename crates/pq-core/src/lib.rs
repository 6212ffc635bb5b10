//! A persistent, memory-mapped, multi-writer/multi-reader product queue.
//!
//! The queue is a fixed-capacity ring of variable-length byte products,
//! each tagged with a signature for duplicate suppression and ordered by
//! insertion time for sequential consumption. Many processes may open
//! the same backing file concurrently; coordination is entirely through
//! advisory byte-range file locks, so no daemon or shared-memory
//! allocator needs to be running for the queue to work.
//!
//! ```no_run
//! use pq_core::{CreateOptions, Direction, Product, Queue};
//!
//! # fn main() -> pq_core::Result<()> {
//! let mut queue = Queue::create("/tmp/example.pq", CreateOptions::default())?;
//! queue.insert(&Product {
//!     origin: "station-1".into(),
//!     feedtype: 7,
//!     seqno: 0,
//!     arrival: (0, 0),
//!     ident: "obs-0001".into(),
//!     signature: [0; 16],
//!     data: b"payload".to_vec(),
//! })?;
//! queue.sequence(Direction::Gt, None, |meta, data| {
//!     println!("{} bytes from {}", data.len(), meta.header.origin);
//!     Ok(())
//! })?;
//! # Ok(())
//! # }
//! ```

mod alloc;
mod arena;
#[cfg(unix)]
mod backing_store;
mod backoff;
mod config;
mod control;
mod cursor;
mod error;
mod invariants;
#[cfg(unix)]
mod lockfile;
mod metrics;
mod product;
mod region;
mod reservation;
mod riu;
#[cfg(unix)]
mod signal;
mod sigindex;
mod skiplist;
mod timeindex;

#[cfg(unix)]
#[allow(clippy::module_inception)]
mod queue;

pub use config::{BackingMode, CreateOptions, OpenFlags};
pub use cursor::Direction;
pub use error::{Error, Result};
pub use metrics::MetricsSnapshot;
pub use product::{encode as encode_record, encoded_len as encoded_record_len, Product, ProductMetadata, RecordHeader};
#[cfg(unix)]
pub use queue::Queue;
pub use reservation::Reservation;
pub use sigindex::Signature;
