//! The high-level, owned model asset: submeshes, skeleton, and
//! animation library, built by resolving a raw decoded block through
//! its embedded string table (§3, §4.2).

use super::guard::{Guard, ASSET_TYPE_MODEL, INVALID_NAME_SENTINEL, MODEL_MAGIC};
use super::header::{AssetHeader, MeshType, STRING_TABLE_OFFSET_FIELD_OFFSET};
use super::reader::{Reader, Writer};
use crate::error::CodecError;
use crate::math::{Mat4, Quat, Vec3};
use crate::string_table::StringTable;
use binrw::BinReaderExt;
use itertools::izip;
use std::io::Cursor;

/// `parent_index == NONE`, i.e. a root node.
pub const NO_PARENT: u16 = 0xFFFF;

#[derive(Debug, Clone)]
pub struct Submesh {
    pub name: Option<String>,
    pub material_name: Option<String>,
    pub mesh_type: MeshType,
    pub vertex_count: u32,
    pub index_count: u32,
    pub center: Vec3,
    pub extents_min: Vec3,
    pub extents_max: Vec3,
    pub vertex_data: Vec<u8>,
    pub index_data: Vec<u8>,
}

impl Submesh {
    pub fn vertex_stride(&self) -> u32 {
        self.mesh_type.vertex_stride()
    }
}

#[derive(Debug, Clone)]
pub struct Bone {
    pub name: Option<String>,
    pub offset_matrix: Mat4,
    pub id: u16,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: Option<String>,
    pub local_transform: Mat4,
    pub parent_index: u16,
    pub children: Vec<u16>,
}

impl Node {
    pub fn is_root(&self) -> bool {
        self.parent_index == NO_PARENT
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Vec3Key {
    pub time: f32,
    pub value: Vec3,
}

#[derive(Debug, Clone, Copy)]
pub struct QuatKey {
    pub time: f32,
    pub value: Quat,
}

#[derive(Debug, Clone, Default)]
pub struct Channel {
    pub node_name: Option<String>,
    pub positions: Vec<Vec3Key>,
    pub rotations: Vec<QuatKey>,
    pub scales: Vec<Vec3Key>,
}

#[derive(Debug, Clone)]
pub struct Animation {
    pub name: Option<String>,
    pub duration: f32,
    pub ticks_per_second: f32,
    pub channels: Vec<Channel>,
}

impl Animation {
    pub fn find_channel(&self, node_name: &str) -> Option<&Channel> {
        self.channels
            .iter()
            .find(|c| c.node_name.as_deref() == Some(node_name))
    }
}

/// The fully decoded model asset: everything the binary codec carries
/// for a single base model (§3's "Model (base)" geometry/skeleton/
/// animation-library attributes).
#[derive(Debug, Clone)]
pub struct ModelAsset {
    pub version: u32,
    pub exporter_type: u32,
    pub exporter_version: u8,
    pub extents_min: Vec3,
    pub extents_max: Vec3,
    pub center: Vec3,
    pub inverse_global_transform: Mat4,
    pub submeshes: Vec<Submesh>,
    pub bones: Vec<Bone>,
    pub nodes: Vec<Node>,
    pub animations: Vec<Animation>,
}

impl Default for ModelAsset {
    fn default() -> Self {
        ModelAsset {
            version: 1,
            exporter_type: 0,
            exporter_version: 0,
            extents_min: Vec3::ZERO,
            extents_max: Vec3::ZERO,
            center: Vec3::ZERO,
            inverse_global_transform: Mat4::IDENTITY,
            submeshes: Vec::new(),
            bones: Vec::new(),
            nodes: Vec::new(),
            animations: Vec::new(),
        }
    }
}

fn resolve_name(table: &StringTable, id: u16) -> Result<Option<String>, CodecError> {
    if id == INVALID_NAME_SENTINEL {
        return Ok(None);
    }
    Ok(Some(table.get_str(id as u32)?.to_string()))
}

fn name_id(table: &mut StringTable, name: &Option<String>) -> Result<u16, CodecError> {
    match name {
        None => Ok(INVALID_NAME_SENTINEL),
        Some(name) => Ok(table.add_str(name)? as u16),
    }
}

impl ModelAsset {
    /// Implements the §4.2 serialization algorithm: strings are
    /// collected into a single table while each section is assembled,
    /// the header is written first with a placeholder
    /// `string_table_offset`, sections follow in enum order, and the
    /// placeholder is patched once the STRINGS guard's position is known.
    pub fn serialize(&self) -> Vec<u8> {
        let mut strings = StringTable::new();
        let mut w = Writer::new();

        let header_placeholder = AssetHeader {
            magic: MODEL_MAGIC,
            asset_type: ASSET_TYPE_MODEL,
            version: self.version,
            exporter_type: self.exporter_type,
            exporter_version: self.exporter_version,
            extents_min: self.extents_min.into(),
            extents_max: self.extents_max.into(),
            center: self.center.into(),
            inverse_global_transform: self.inverse_global_transform.0,
            submesh_count: self.submeshes.len() as u16,
            bone_count: self.bones.len() as u16,
            node_count: self.nodes.len() as u16,
            animation_count: self.animations.len() as u16,
            string_table_offset: 0,
        };
        write_header(&mut w, &header_placeholder);

        if !self.submeshes.is_empty() {
            w.write_guard(Guard::Submeshes);
            for s in &self.submeshes {
                w.write_u16(name_id(&mut strings, &s.name).unwrap_or(INVALID_NAME_SENTINEL));
            }
            for s in &self.submeshes {
                w.write_u16(name_id(&mut strings, &s.material_name).unwrap_or(INVALID_NAME_SENTINEL));
            }
            for s in &self.submeshes {
                w.write_u32(s.vertex_count);
            }
            for s in &self.submeshes {
                w.write_u32(s.index_count);
            }
            for s in &self.submeshes {
                w.write_u8(s.mesh_type.as_byte());
            }
            for s in &self.submeshes {
                w.write_vec3(s.center);
            }
            for s in &self.submeshes {
                w.write_vec3(s.extents_min);
                w.write_vec3(s.extents_max);
            }
            for s in &self.submeshes {
                w.write_bytes(&s.vertex_data);
            }
            for s in &self.submeshes {
                w.write_bytes(&s.index_data);
            }
        }

        if !self.bones.is_empty() {
            w.write_guard(Guard::Bones);
            for b in &self.bones {
                w.write_u16(name_id(&mut strings, &b.name).unwrap_or(INVALID_NAME_SENTINEL));
            }
            for b in &self.bones {
                w.write_mat4(b.offset_matrix);
            }
        }

        if !self.nodes.is_empty() {
            w.write_guard(Guard::Nodes);
            for n in &self.nodes {
                w.write_u16(name_id(&mut strings, &n.name).unwrap_or(INVALID_NAME_SENTINEL));
            }
            for n in &self.nodes {
                w.write_u16(n.parent_index);
            }
            for n in &self.nodes {
                w.write_mat4(n.local_transform);
            }
        }

        let total_channel_count: usize = self.animations.iter().map(|a| a.channels.len()).sum();

        if !self.animations.is_empty() {
            w.write_guard(Guard::Animations);
            w.write_u16(total_channel_count as u16);
            for a in &self.animations {
                w.write_u16(name_id(&mut strings, &a.name).unwrap_or(INVALID_NAME_SENTINEL));
            }
            for a in &self.animations {
                w.write_f32(a.duration);
            }
            for a in &self.animations {
                w.write_f32(a.ticks_per_second);
            }
            for a in &self.animations {
                w.write_u16(a.channels.len() as u16);
            }

            if total_channel_count > 0 {
                w.write_guard(Guard::AnimChannels);

                // Flatten channels per §4.2: animation_ids[c] identifies
                // the owning animation by flattened position.
                let flattened: Vec<(u16, &Channel)> = self
                    .animations
                    .iter()
                    .enumerate()
                    .flat_map(|(a_idx, a)| a.channels.iter().map(move |c| (a_idx as u16, c)))
                    .collect();

                for (a_idx, _) in &flattened {
                    w.write_u16(*a_idx);
                }
                for (_, c) in &flattened {
                    w.write_u16(name_id(&mut strings, &c.node_name).unwrap_or(INVALID_NAME_SENTINEL));
                }

                let mut running_offset: u32 = 0;
                let mut pos_counts = Vec::with_capacity(flattened.len());
                let mut pos_offsets = Vec::with_capacity(flattened.len());
                let mut rot_counts = Vec::with_capacity(flattened.len());
                let mut rot_offsets = Vec::with_capacity(flattened.len());
                let mut scale_counts = Vec::with_capacity(flattened.len());
                let mut scale_offsets = Vec::with_capacity(flattened.len());
                for (_, c) in &flattened {
                    pos_counts.push(c.positions.len() as u32);
                    pos_offsets.push(running_offset);
                    running_offset += c.positions.len() as u32 * 16;
                    rot_counts.push(c.rotations.len() as u32);
                    rot_offsets.push(running_offset);
                    running_offset += c.rotations.len() as u32 * 20;
                    scale_counts.push(c.scales.len() as u32);
                    scale_offsets.push(running_offset);
                    running_offset += c.scales.len() as u32 * 16;
                }
                for v in &pos_counts {
                    w.write_u32(*v);
                }
                for v in &pos_offsets {
                    w.write_u32(*v);
                }
                for v in &rot_counts {
                    w.write_u32(*v);
                }
                for v in &rot_offsets {
                    w.write_u32(*v);
                }
                for v in &scale_counts {
                    w.write_u32(*v);
                }
                for v in &scale_offsets {
                    w.write_u32(*v);
                }

                for (_, c) in &flattened {
                    for k in &c.positions {
                        w.write_f32(k.time);
                        w.write_vec3(k.value);
                    }
                    for k in &c.rotations {
                        w.write_f32(k.time);
                        w.write_f32(k.value.x);
                        w.write_f32(k.value.y);
                        w.write_f32(k.value.z);
                        w.write_f32(k.value.w);
                    }
                    for k in &c.scales {
                        w.write_f32(k.time);
                        w.write_vec3(k.value);
                    }
                }
            }
        }

        w.write_guard(Guard::Strings);
        let strings_payload_offset = w.position() as u32;
        w.write_bytes(&strings.serialize());

        w.patch_u32(STRING_TABLE_OFFSET_FIELD_OFFSET as usize, strings_payload_offset);

        w.out
    }

    /// Implements the §4.2 deserialization algorithm.
    pub fn deserialize(data: &[u8]) -> Result<Self, CodecError> {
        let mut cursor = Cursor::new(data);
        let header: AssetHeader = cursor.read_le()?;
        header.verify_magic()?;
        header.verify_asset_type()?;

        let mut r = Reader::new(data, cursor.position() as usize);

        let submeshes_raw = if header.submesh_count > 0 {
            r.expect_guard(Guard::Submeshes)?;
            Some(read_submeshes_section(&mut r, header.submesh_count as usize)?)
        } else {
            None
        };

        let bones_raw = if header.bone_count > 0 {
            r.expect_guard(Guard::Bones)?;
            Some(read_bones_section(&mut r, header.bone_count as usize)?)
        } else {
            None
        };

        let nodes_raw = if header.node_count > 0 {
            r.expect_guard(Guard::Nodes)?;
            Some(read_nodes_section(&mut r, header.node_count as usize)?)
        } else {
            None
        };

        let animations_raw = if header.animation_count > 0 {
            r.expect_guard(Guard::Animations)?;
            Some(read_animations_section(&mut r, header.animation_count as usize)?)
        } else {
            None
        };

        r.expect_guard(Guard::Strings)?;
        if r.position() as u32 != header.string_table_offset {
            return Err(CodecError::StringTableOffsetMismatch {
                header: header.string_table_offset,
                actual: r.position() as u32,
            });
        }
        let string_table = StringTable::from_block(r.read_bytes(data.len() - r.position())?)?;

        let submeshes = submeshes_raw
            .unwrap_or_default()
            .into_iter()
            .map(|raw| raw.resolve(&string_table))
            .collect::<Result<_, _>>()?;

        let bones = bones_raw
            .unwrap_or_default()
            .into_iter()
            .map(|raw| raw.resolve(&string_table))
            .collect::<Result<_, _>>()?;

        let mut nodes: Vec<Node> = nodes_raw
            .unwrap_or_default()
            .into_iter()
            .map(|raw| raw.resolve(&string_table))
            .collect::<Result<_, _>>()?;
        populate_children(&mut nodes);

        let animations = match animations_raw {
            Some(raw) => raw.resolve(&string_table)?,
            None => Vec::new(),
        };

        Ok(ModelAsset {
            version: header.version,
            exporter_type: header.exporter_type,
            exporter_version: header.exporter_version,
            extents_min: header.extents_min(),
            extents_max: header.extents_max(),
            center: header.center(),
            inverse_global_transform: header.inverse_global_transform(),
            submeshes,
            bones,
            nodes,
            animations,
        })
    }
}

fn write_header(w: &mut Writer, header: &AssetHeader) {
    w.write_u32(header.magic);
    w.write_u32(header.asset_type);
    w.write_u32(header.version);
    w.write_u32(header.exporter_type);
    w.write_u8(header.exporter_version);
    w.write_bytes(&[0u8; 3]);
    w.write_vec3(header.extents_min());
    w.write_vec3(header.extents_max());
    w.write_vec3(header.center());
    w.write_mat4(Mat4(header.inverse_global_transform));
    w.write_u16(header.submesh_count);
    w.write_u16(header.bone_count);
    w.write_u16(header.node_count);
    w.write_u16(header.animation_count);
    w.write_u32(header.string_table_offset);
}

struct RawSubmesh {
    name_id: u16,
    material_name_id: u16,
    mesh_type: MeshType,
    vertex_count: u32,
    index_count: u32,
    center: Vec3,
    extents_min: Vec3,
    extents_max: Vec3,
    vertex_data: Vec<u8>,
    index_data: Vec<u8>,
}

impl RawSubmesh {
    fn resolve(self, table: &StringTable) -> Result<Submesh, CodecError> {
        Ok(Submesh {
            name: resolve_name(table, self.name_id)?,
            material_name: resolve_name(table, self.material_name_id)?,
            mesh_type: self.mesh_type,
            vertex_count: self.vertex_count,
            index_count: self.index_count,
            center: self.center,
            extents_min: self.extents_min,
            extents_max: self.extents_max,
            vertex_data: self.vertex_data,
            index_data: self.index_data,
        })
    }
}

fn read_submeshes_section(r: &mut Reader, count: usize) -> Result<Vec<RawSubmesh>, CodecError> {
    let name_ids = r.read_u16_array(count)?;
    let material_name_ids = r.read_u16_array(count)?;
    let vertex_counts = r.read_u32_array(count)?;
    let index_counts = r.read_u32_array(count)?;
    let mesh_type_bytes = r.read_u8_array(count)?;
    let centers = r.read_vec3_array(count)?;
    let mut extents_min = Vec::with_capacity(count);
    let mut extents_max = Vec::with_capacity(count);
    for _ in 0..count {
        extents_min.push(r.read_vec3()?);
        extents_max.push(r.read_vec3()?);
    }

    let mut mesh_types = Vec::with_capacity(count);
    for byte in &mesh_type_bytes {
        mesh_types.push(MeshType::from_byte(*byte)?);
    }

    let mut vertex_blobs = Vec::with_capacity(count);
    for i in 0..count {
        let len = vertex_counts[i] as usize * mesh_types[i].vertex_stride() as usize;
        vertex_blobs.push(r.read_bytes(len)?.to_vec());
    }
    let mut index_blobs = Vec::with_capacity(count);
    for i in 0..count {
        let len = index_counts[i] as usize * 4;
        index_blobs.push(r.read_bytes(len)?.to_vec());
    }

    Ok(izip!(
        name_ids,
        material_name_ids,
        vertex_counts,
        index_counts,
        mesh_types,
        centers,
        extents_min,
        extents_max,
        vertex_blobs,
        index_blobs
    )
    .map(
        |(name_id, material_name_id, vertex_count, index_count, mesh_type, center, extents_min, extents_max, vertex_data, index_data)| {
            RawSubmesh {
                name_id,
                material_name_id,
                mesh_type,
                vertex_count,
                index_count,
                center,
                extents_min,
                extents_max,
                vertex_data,
                index_data,
            }
        },
    )
    .collect())
}

struct RawBone {
    name_id: u16,
    offset_matrix: Mat4,
    id: u16,
}

impl RawBone {
    fn resolve(self, table: &StringTable) -> Result<Bone, CodecError> {
        Ok(Bone {
            name: resolve_name(table, self.name_id)?,
            offset_matrix: self.offset_matrix,
            id: self.id,
        })
    }
}

fn read_bones_section(r: &mut Reader, count: usize) -> Result<Vec<RawBone>, CodecError> {
    let name_ids = r.read_u16_array(count)?;
    let matrices = r.read_mat4_array(count)?;
    Ok(izip!(name_ids, matrices, 0u16..)
        .map(|(name_id, offset_matrix, id)| RawBone {
            name_id,
            offset_matrix,
            id,
        })
        .collect())
}

struct RawNode {
    name_id: u16,
    parent_index: u16,
    local_transform: Mat4,
}

impl RawNode {
    fn resolve(self, table: &StringTable) -> Result<Node, CodecError> {
        Ok(Node {
            name: resolve_name(table, self.name_id)?,
            local_transform: self.local_transform,
            parent_index: self.parent_index,
            children: Vec::new(),
        })
    }
}

/// The on-disk NODES section stores only `parent_indices` (§4.2);
/// `Node::children` is derived once at load time by scanning them.
fn populate_children(nodes: &mut [Node]) {
    for i in 0..nodes.len() {
        let parent_index = nodes[i].parent_index;
        if parent_index != NO_PARENT && (parent_index as usize) < nodes.len() {
            nodes[parent_index as usize].children.push(i as u16);
        }
    }
}

fn read_nodes_section(r: &mut Reader, count: usize) -> Result<Vec<RawNode>, CodecError> {
    let name_ids = r.read_u16_array(count)?;
    let parent_indices = r.read_u16_array(count)?;
    let transforms = r.read_mat4_array(count)?;
    Ok(izip!(name_ids, parent_indices, transforms)
        .map(|(name_id, parent_index, local_transform)| RawNode {
            name_id,
            parent_index,
            local_transform,
        })
        .collect())
}

struct RawAnimations {
    name_ids: Vec<u16>,
    durations: Vec<f32>,
    ticks_per_seconds: Vec<f32>,
    channel_counts: Vec<u16>,
    total_channel_count: u16,
    channels: Option<RawChannels>,
}

impl RawAnimations {
    /// Buckets the flattened channel array back per animation by
    /// `animation_ids[c]` (§4.2's lookup rule), then verifies the
    /// result against the two counts the format carries redundantly:
    /// the section-wide `total_channel_count` and each animation's own
    /// `channel_counts[i]`. Both must agree with the actual
    /// distribution (§4.2: "Per-animation channel counts must match
    /// this distribution.", §8 invariant 5).
    fn resolve(self, table: &StringTable) -> Result<Vec<Animation>, CodecError> {
        let animation_count = self.name_ids.len();
        let mut channels_by_anim: Vec<Vec<Channel>> = vec![Vec::new(); animation_count];
        if let Some(raw_channels) = &self.channels {
            let resolved = raw_channels.into_channels(table)?;
            for (&anim_id, channel) in raw_channels.animation_ids.iter().zip(resolved) {
                let slot = channels_by_anim
                    .get_mut(anim_id as usize)
                    .ok_or(CodecError::IndexOutOfRange {
                        what: "animation_ids",
                        index: anim_id as u32,
                        len: animation_count as u32,
                    })?;
                slot.push(channel);
            }
        }

        let found_total: u16 = channels_by_anim.iter().map(|c| c.len() as u16).sum();
        if found_total != self.total_channel_count {
            return Err(CodecError::AnimationChannelCountMismatch {
                context: "total animation channel count".to_string(),
                expected: self.total_channel_count,
                found: found_total,
            });
        }

        self.name_ids
            .iter()
            .enumerate()
            .map(|(i, name_id)| {
                let expected = self.channel_counts[i];
                let found = channels_by_anim[i].len() as u16;
                if found != expected {
                    return Err(CodecError::AnimationChannelCountMismatch {
                        context: format!("animation {i} channel count"),
                        expected,
                        found,
                    });
                }
                Ok(Animation {
                    name: resolve_name(table, *name_id)?,
                    duration: self.durations[i],
                    ticks_per_second: self.ticks_per_seconds[i],
                    channels: channels_by_anim[i].clone(),
                })
            })
            .collect()
    }
}

fn read_animations_section(r: &mut Reader, count: usize) -> Result<RawAnimations, CodecError> {
    let total_channel_count = r.read_u16()?;
    let name_ids = r.read_u16_array(count)?;
    let durations = r.read_f32_array(count)?;
    let ticks_per_seconds = r.read_f32_array(count)?;
    let channel_counts = r.read_u16_array(count)?;

    let channels = if total_channel_count > 0 {
        r.expect_guard(Guard::AnimChannels)?;
        Some(read_anim_channels_section(r, total_channel_count as usize)?)
    } else {
        None
    };

    Ok(RawAnimations {
        name_ids,
        durations,
        ticks_per_seconds,
        channel_counts,
        total_channel_count,
        channels,
    })
}

struct RawChannels {
    animation_ids: Vec<u16>,
    name_ids: Vec<u16>,
    pos_counts: Vec<u32>,
    pos_offsets: Vec<u32>,
    rot_counts: Vec<u32>,
    rot_offsets: Vec<u32>,
    scale_counts: Vec<u32>,
    scale_offsets: Vec<u32>,
    data: Vec<u8>,
}

impl RawChannels {
    fn into_channels(&self, table: &StringTable) -> Result<Vec<Channel>, CodecError> {
        let count = self.animation_ids.len();
        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            let positions = read_vec3_keys(&self.data, self.pos_offsets[i] as usize, self.pos_counts[i] as usize)?;
            let rotations = read_quat_keys(&self.data, self.rot_offsets[i] as usize, self.rot_counts[i] as usize)?;
            let scales = read_vec3_keys(&self.data, self.scale_offsets[i] as usize, self.scale_counts[i] as usize)?;
            out.push(Channel {
                node_name: resolve_name(table, self.name_ids[i])?,
                positions,
                rotations,
                scales,
            });
        }
        Ok(out)
    }
}

fn read_vec3_keys(data: &[u8], offset: usize, count: usize) -> Result<Vec<Vec3Key>, CodecError> {
    let mut r = Reader::new(data, offset);
    (0..count)
        .map(|_| {
            Ok(Vec3Key {
                time: r.read_f32()?,
                value: r.read_vec3()?,
            })
        })
        .collect()
}

fn read_quat_keys(data: &[u8], offset: usize, count: usize) -> Result<Vec<QuatKey>, CodecError> {
    let mut r = Reader::new(data, offset);
    (0..count)
        .map(|_| {
            Ok(QuatKey {
                time: r.read_f32()?,
                value: Quat {
                    x: r.read_f32()?,
                    y: r.read_f32()?,
                    z: r.read_f32()?,
                    w: r.read_f32()?,
                },
            })
        })
        .collect()
}

fn read_anim_channels_section(r: &mut Reader, count: usize) -> Result<RawChannels, CodecError> {
    let animation_ids = r.read_u16_array(count)?;
    let name_ids = r.read_u16_array(count)?;
    let pos_counts = r.read_u32_array(count)?;
    let pos_offsets = r.read_u32_array(count)?;
    let rot_counts = r.read_u32_array(count)?;
    let rot_offsets = r.read_u32_array(count)?;
    let scale_counts = r.read_u32_array(count)?;
    let scale_offsets = r.read_u32_array(count)?;

    let data_len = (0..count)
        .map(|i| {
            pos_offsets[i] as usize + pos_counts[i] as usize * 16
        })
        .chain((0..count).map(|i| rot_offsets[i] as usize + rot_counts[i] as usize * 20))
        .chain((0..count).map(|i| scale_offsets[i] as usize + scale_counts[i] as usize * 16))
        .max()
        .unwrap_or(0);

    let data = r.read_bytes(data_len)?.to_vec();

    Ok(RawChannels {
        animation_ids,
        name_ids,
        pos_counts,
        pos_offsets,
        rot_counts,
        rot_offsets,
        scale_counts,
        scale_offsets,
        data,
    })
}
