//! Runtime primitives for a high-concurrency network server: an arena
//! memory pool, a growable array and a chunked list built on it, an
//! intrusive-style doubly-linked queue, a red-black tree, a timer service
//! built on the tree, and a worker thread pool that bridges blocking work
//! back to a single-threaded event loop.
//!
//! Ported from nginx's core primitives (`ngx_alloc`, `ngx_array`,
//! `ngx_list`, `ngx_queue`, `ngx_rbtree`, `ngx_event_timer`,
//! `ngx_thread_pool`) to idiomatic Rust: intrusive pointers become arena
//! handles, function-pointer hooks become trait parameters, and raw
//! tail-of-pointer FIFOs become `VecDeque`s. See `DESIGN.md` for the
//! grounding of each module.

pub mod array;
pub mod error;
pub mod list;
pub mod pool;
pub mod queue;
pub mod rbtree;
pub mod threadpool;
pub mod timer;
pub mod tried;

pub use error::CoreError;
pub use pool::Pool;
