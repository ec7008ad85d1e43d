//! Type aliases for commonly used complex types.
//!
//! Recorders shared between a worker thread and the code inspecting it
//! (wire logs, instrumentation traces) use these wrappers.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use motionkit_core::types::*;
//!
//! // Instead of: Arc<Mutex<Vec<String>>>
//! let writes: ThreadSafeVec<String> = thread_safe_vec();
//! ```

use parking_lot::Mutex;
use std::sync::Arc;

/// A thread-safe vector for cross-thread collection management.
///
/// Uses `parking_lot::Mutex`, so there is no lock poisoning.
pub type ThreadSafeVec<T> = Arc<Mutex<Vec<T>>>;

/// Create a new empty `ThreadSafeVec<T>`.
pub fn thread_safe_vec<T>() -> ThreadSafeVec<T> {
    Arc::new(Mutex::new(Vec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_safe_vec_sharing() {
        let shared: ThreadSafeVec<u32> = thread_safe_vec();
        let clone = shared.clone();
        std::thread::spawn(move || clone.lock().push(7))
            .join()
            .unwrap();
        assert_eq!(shared.lock().as_slice(), &[7]);
    }
}
