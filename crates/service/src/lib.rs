//! Service layer for adoption-insights
//!
//! Holds the incremental loader that turns a paginated fetch capability into
//! a subscribable, progressively filled [`ServiceState`].

#![allow(clippy::missing_errors_doc, reason = "Errors are self-explanatory from Result types")]
#![allow(clippy::implicit_return, reason = "Implicit return is idiomatic Rust")]
#![allow(clippy::question_mark_used, reason = "? operator is idiomatic Rust")]
#![allow(clippy::min_ident_chars, reason = "Short error vars are idiomatic")]

mod error;
mod incremental;
mod page_stream;
mod subscribers;

pub use adoption_insights_core::ServiceState;
pub use error::ServiceError;
pub use incremental::IncrementalDataService;
pub use page_stream::PageStream;
pub use subscribers::Subscription;
