//! Building blocks shared by the transform and interest stores.
//!
//! - [`LoadingSet`]: per-key loading flags released by RAII guards
//! - [`SingleFlight`]: one outstanding request per key, late callers join it
//! - [`RequestScope`]: optional cancellation of a request's wait and write

mod flight;
mod loading;
mod scope;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use flight::SingleFlight;
pub use loading::{LoadingGuard, LoadingSet};
pub use scope::RequestScope;

/// Lock store state, recovering it if a panicking holder poisoned the mutex.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
