//! A thread-safe growable streaming buffer.
//!
//! [`Buffer<T>`] is a thread-safe, unbounded queue for streaming data between
//! producers and consumers: writers append, readers block until data is
//! available, and either side can close the stream (optionally with an
//! error) to unblock the other.
//!
//! ```
//! use dialog_buffer::Buffer;
//!
//! let buf = Buffer::<i32>::new();
//! buf.write(&[1, 2, 3]).unwrap();
//!
//! let mut data = vec![0; 3];
//! let n = buf.read(&mut data).unwrap();
//! assert_eq!(data, vec![1, 2, 3]);
//! ```
//!
//! # Closing
//!
//! - `close_write()`: prevents new writes but allows reading existing data
//! - `close_with_error()`: immediately closes and returns the error to all operations
//!
//! # Thread safety
//!
//! `Buffer<T>` is `Send + Sync` and `Clone` shares the underlying storage via
//! `Arc`.
//!
//! # Convenience constructors
//!
//! The [`bytes`] module provides pre-sized constructors for byte buffers:
//!
//! ```
//! use dialog_buffer::bytes_4kb;
//!
//! let buf = bytes_4kb();
//! ```

mod buffer;
mod bytes;
mod error;

pub use buffer::Buffer;
pub use bytes::*;
pub use error::{BufferError, Done};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Buffer<i32>>();
    }

    #[test]
    fn test_buffer_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<Buffer<i32>>();
    }
}
