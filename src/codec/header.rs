//! The fixed-layout asset header (§4.2).

use crate::error::CodecError;
use crate::math::{Mat4, Vec3};
use binrw::BinRead;

/// The byte offset of `string_table_offset` within a serialized
/// [`AssetHeader`], used to patch it in place after the pre-STRINGS
/// offset is known (§4.2's "record the pre-STRINGS offset and patch it
/// into the header" step).
pub const STRING_TABLE_OFFSET_FIELD_OFFSET: u64 = 4 + 4 + 4 + 4 + 1 + 3 + 12 + 12 + 12 + 64 + 2 + 2 + 2 + 2;

/// Only `BinRead` is derived: the header is the one section simple
/// enough for binrw's sequential-field parsing, but writing goes
/// through the same [`super::reader::Writer`] byte cursor as every
/// other section so the offset the serializer patches afterwards is
/// computed from one source of truth.
#[derive(Debug, Clone, Copy, BinRead)]
pub struct AssetHeader {
    pub magic: u32,
    pub asset_type: u32,
    pub version: u32,
    pub exporter_type: u32,
    pub exporter_version: u8,
    #[br(pad_before = 3)]
    pub extents_min: [f32; 3],
    pub extents_max: [f32; 3],
    pub center: [f32; 3],
    pub inverse_global_transform: [[f32; 4]; 4],
    pub submesh_count: u16,
    pub bone_count: u16,
    pub node_count: u16,
    pub animation_count: u16,
    pub string_table_offset: u32,
}

static_assertions::const_assert_eq!(std::mem::size_of::<AssetHeader>(), 132);

impl AssetHeader {
    pub fn extents_min(&self) -> Vec3 {
        self.extents_min.into()
    }

    pub fn extents_max(&self) -> Vec3 {
        self.extents_max.into()
    }

    pub fn center(&self) -> Vec3 {
        self.center.into()
    }

    pub fn inverse_global_transform(&self) -> Mat4 {
        Mat4(self.inverse_global_transform)
    }

    pub fn verify_magic(&self) -> Result<(), CodecError> {
        if self.magic != super::guard::MODEL_MAGIC {
            return Err(CodecError::InvalidMagic {
                expected: super::guard::MODEL_MAGIC,
                found: self.magic,
            });
        }
        Ok(())
    }

    pub fn verify_asset_type(&self) -> Result<(), CodecError> {
        if self.asset_type != super::guard::ASSET_TYPE_MODEL {
            return Err(CodecError::InvalidAssetType {
                expected: super::guard::ASSET_TYPE_MODEL,
                found: self.asset_type,
            });
        }
        Ok(())
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from(v: [f32; 3]) -> Self {
        Vec3 { x: v[0], y: v[1], z: v[2] }
    }
}

impl From<Vec3> for [f32; 3] {
    fn from(v: Vec3) -> Self {
        [v.x, v.y, v.z]
    }
}

/// The two submesh mesh kinds the codec understands; any other value
/// in a submesh's `mesh_type` byte is a [`CodecError::UnsupportedMeshType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshType {
    Static,
    Skinned,
}

impl MeshType {
    pub fn from_byte(byte: u8) -> Result<Self, CodecError> {
        match byte {
            0 => Ok(MeshType::Static),
            1 => Ok(MeshType::Skinned),
            other => Err(CodecError::UnsupportedMeshType(other)),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            MeshType::Static => 0,
            MeshType::Skinned => 1,
        }
    }

    /// Bytes per vertex for this mesh kind. Static vertices carry
    /// position + normal + UV + color (12 + 12 + 8 + 16 = 48 bytes);
    /// skinned vertices additionally carry four bone indices and four
    /// bone weights (48 + 16 + 16 = 80 bytes).
    pub fn vertex_stride(self) -> u32 {
        match self {
            MeshType::Static => 48,
            MeshType::Skinned => 80,
        }
    }
}
