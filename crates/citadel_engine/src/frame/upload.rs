//! CPU shadow of a per-slot GPU upload buffer.
//!
//! Constant-buffer elements are padded to the 256-byte alignment that both
//! D3D-style hardware constant views and Vulkan dynamic uniform offsets
//! require; vertex elements stay tightly packed. The renderer flushes the
//! shadow bytes into the slot's mapped GPU buffer once per frame.

use std::marker::PhantomData;

use bytemuck::Pod;

/// Alignment of constant-buffer elements.
pub const CONSTANT_ALIGNMENT: usize = 256;

/// Fixed-capacity typed upload buffer.
pub struct UploadBuffer<T: Pod> {
    bytes: Vec<u8>,
    stride: usize,
    len: usize,
    _element: PhantomData<T>,
}

impl<T: Pod> UploadBuffer<T> {
    /// Buffer of `len` constant-buffer elements, each padded to 256 bytes.
    pub fn constant(len: usize) -> Self {
        let stride = std::mem::size_of::<T>().div_ceil(CONSTANT_ALIGNMENT) * CONSTANT_ALIGNMENT;
        Self::with_stride(len, stride)
    }

    /// Buffer of `len` tightly packed elements (vertex data).
    pub fn packed(len: usize) -> Self {
        Self::with_stride(len, std::mem::size_of::<T>())
    }

    fn with_stride(len: usize, stride: usize) -> Self {
        Self {
            bytes: vec![0u8; len * stride],
            stride,
            len,
            _element: PhantomData,
        }
    }

    /// Write one element at its slot. An out-of-range index is a
    /// registration-time bug, not a runtime condition.
    pub fn copy_data(&mut self, index: usize, value: &T) {
        assert!(index < self.len, "upload index {index} out of range {}", self.len);
        let offset = index * self.stride;
        let size = std::mem::size_of::<T>();
        self.bytes[offset..offset + size].copy_from_slice(bytemuck::bytes_of(value));
    }

    /// Read an element back (test and verification support).
    pub fn read(&self, index: usize) -> T {
        assert!(index < self.len, "upload index {index} out of range {}", self.len);
        let offset = index * self.stride;
        let size = std::mem::size_of::<T>();
        *bytemuck::from_bytes(&self.bytes[offset..offset + size])
    }

    /// Distance between consecutive elements in bytes.
    pub fn element_stride(&self) -> usize {
        self.stride
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Raw bytes, sized `len * stride`, ready to flush into a mapped buffer.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::constants::{MaterialConstants, ObjectConstants};

    #[test]
    fn test_constant_elements_are_aligned() {
        let objects = UploadBuffer::<ObjectConstants>::constant(5);
        assert_eq!(objects.element_stride(), 256);
        assert_eq!(objects.bytes().len(), 5 * 256);

        let materials = UploadBuffer::<MaterialConstants>::constant(7);
        assert_eq!(materials.element_stride(), 256);
    }

    #[test]
    fn test_packed_elements_have_no_padding() {
        let buffer = UploadBuffer::<[f32; 8]>::packed(3);
        assert_eq!(buffer.element_stride(), 32);
        assert_eq!(buffer.bytes().len(), 96);
    }

    #[test]
    fn test_copy_data_round_trips_at_stable_offsets() {
        let mut buffer = UploadBuffer::<[f32; 2]>::constant(4);
        buffer.copy_data(0, &[1.0, 2.0]);
        buffer.copy_data(3, &[7.0, 8.0]);
        assert_eq!(buffer.read(0), [1.0, 2.0]);
        assert_eq!(buffer.read(3), [7.0, 8.0]);
        // Untouched slots stay zeroed.
        assert_eq!(buffer.read(1), [0.0, 0.0]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_out_of_range_write_fails_loudly() {
        let mut buffer = UploadBuffer::<f32>::constant(2);
        buffer.copy_data(2, &1.0);
    }
}
