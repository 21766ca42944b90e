//! Convenience functions for creating byte buffers.
//!
//! This module provides pre-configured buffer constructors for common
//! byte buffer sizes.

use crate::Buffer;

/// Creates a 1KB growable buffer for bytes.
pub fn bytes_1kb() -> Buffer<u8> {
    Buffer::with_capacity(1024)
}

/// Creates a 4KB growable buffer for bytes.
pub fn bytes_4kb() -> Buffer<u8> {
    Buffer::with_capacity(4096)
}

/// Creates a 16KB growable buffer for bytes.
pub fn bytes_16kb() -> Buffer<u8> {
    Buffer::with_capacity(16384)
}

/// Creates a 64KB growable buffer for bytes.
pub fn bytes_64kb() -> Buffer<u8> {
    Buffer::with_capacity(65536)
}

/// Creates a 256B growable buffer for bytes.
pub fn bytes_256b() -> Buffer<u8> {
    Buffer::with_capacity(256)
}

/// Creates a default 1KB growable buffer for bytes.
pub fn bytes() -> Buffer<u8> {
    bytes_1kb()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_convenience_functions() {
        let b1 = bytes_1kb();
        let b4 = bytes_4kb();
        let b16 = bytes_16kb();
        let b64 = bytes_64kb();

        // Just verify they can be created and used
        b1.write(&[1, 2, 3]).unwrap();
        b4.write(&[1, 2, 3]).unwrap();
        b16.write(&[1, 2, 3]).unwrap();
        b64.write(&[1, 2, 3]).unwrap();
    }
}
