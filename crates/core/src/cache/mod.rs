//! In-memory caches for REST responses.
//!
//! Both caches live for the whole process and are shared by every helper that
//! is handed a reference to them:
//!
//! - [`SiteBasedCache`] memoizes successfully parsed JSON per site partition
//! - [`FetchPromisesCache`] holds the handle of each pending request so that
//!   concurrent callers for the same key share one network call
//! - [`initial_data`] seeds the result cache from a payload shipped with the app

pub mod fetch_promises;
pub mod initial_data;
pub mod site;

pub use crate::Error;

pub use fetch_promises::{FetchPromisesCache, InFlight, Ticket};
pub use initial_data::load_initial_data;
pub use site::SiteBasedCache;
