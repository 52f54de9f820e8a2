//! A small bounds-checked cursor over an asset block.
//!
//! The binary codec deep-copies every field it reads into owned
//! storage (§4.2's final deserialization step), so there is no benefit
//! to `bytemuck::cast_slice`-style zero-copy views here — plain,
//! bounds-checked little-endian reads keep the section parsers free of
//! alignment hazards regardless of where a section happens to land.

use crate::codec::guard::Guard;
use crate::error::CodecError;
use crate::math::{Mat4, Vec3};

pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8], pos: usize) -> Self {
        Reader { data, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        let bytes = self
            .data
            .get(self.pos..self.pos + len)
            .ok_or(CodecError::IndexOutOfRange {
                what: "asset block",
                index: self.pos as u32,
                len: self.data.len() as u32,
            })?;
        self.pos += len;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_f32(&mut self) -> Result<f32, CodecError> {
        Ok(f32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_vec3(&mut self) -> Result<Vec3, CodecError> {
        Ok(Vec3 {
            x: self.read_f32()?,
            y: self.read_f32()?,
            z: self.read_f32()?,
        })
    }

    pub fn read_mat4(&mut self) -> Result<Mat4, CodecError> {
        let mut rows = [[0.0f32; 4]; 4];
        for row in rows.iter_mut() {
            for cell in row.iter_mut() {
                *cell = self.read_f32()?;
            }
        }
        Ok(Mat4(rows))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        self.take(len)
    }

    /// Reads a `u32` guard and verifies it matches `expected`.
    pub fn expect_guard(&mut self, expected: Guard) -> Result<(), CodecError> {
        let offset = self.pos;
        let found = self.read_u32()?;
        if found != u32::from(expected) {
            return Err(CodecError::GuardMismatch {
                expected: expected.name(),
                found,
                offset,
            });
        }
        Ok(())
    }

    pub fn read_u16_array(&mut self, count: usize) -> Result<Vec<u16>, CodecError> {
        (0..count).map(|_| self.read_u16()).collect()
    }

    pub fn read_u32_array(&mut self, count: usize) -> Result<Vec<u32>, CodecError> {
        (0..count).map(|_| self.read_u32()).collect()
    }

    pub fn read_u8_array(&mut self, count: usize) -> Result<Vec<u8>, CodecError> {
        (0..count).map(|_| self.read_u8()).collect()
    }

    pub fn read_f32_array(&mut self, count: usize) -> Result<Vec<f32>, CodecError> {
        (0..count).map(|_| self.read_f32()).collect()
    }

    pub fn read_vec3_array(&mut self, count: usize) -> Result<Vec<Vec3>, CodecError> {
        (0..count).map(|_| self.read_vec3()).collect()
    }

    pub fn read_mat4_array(&mut self, count: usize) -> Result<Vec<Mat4>, CodecError> {
        (0..count).map(|_| self.read_mat4()).collect()
    }
}

/// A minimal little-endian byte writer, used by the serializer to
/// accumulate sections before the whole block is handed back as a
/// single `Vec<u8>` (§4.2's "allocate one output block" step, relaxed
/// to a growable buffer since the total size is cheap to recompute).
#[derive(Default)]
pub struct Writer {
    pub out: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Writer::default()
    }

    pub fn position(&self) -> usize {
        self.out.len()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.out.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_vec3(&mut self, v: Vec3) {
        self.write_f32(v.x);
        self.write_f32(v.y);
        self.write_f32(v.z);
    }

    pub fn write_mat4(&mut self, m: Mat4) {
        for row in m.0 {
            for cell in row {
                self.write_f32(cell);
            }
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.out.extend_from_slice(bytes);
    }

    pub fn write_guard(&mut self, guard: Guard) {
        self.write_u32(u32::from(guard));
    }

    /// Overwrites the 4 bytes at `offset` with `value`, used to patch
    /// `string_table_offset` once it is known.
    pub fn patch_u32(&mut self, offset: usize, value: u32) {
        self.out[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
}
