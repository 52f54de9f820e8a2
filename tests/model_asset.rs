//! End-to-end codec scenarios, synthesizing fixtures via the
//! serializer rather than vendoring binary blobs.

use kohi_core::animator::Animator;
use kohi_core::codec::{Animation, Bone, Channel, MeshType, ModelAsset, Node, QuatKey, Submesh, Vec3Key, NO_PARENT};
use kohi_core::math::{Mat4, Quat, Vec3};

fn empty_submesh(name: &str, material: &str, mesh_type: MeshType, vertex_count: u32, index_count: u32) -> Submesh {
    Submesh {
        name: Some(name.to_string()),
        material_name: Some(material.to_string()),
        mesh_type,
        vertex_count,
        index_count,
        center: Vec3::ZERO,
        extents_min: Vec3::ZERO,
        extents_max: Vec3::ZERO,
        vertex_data: vec![0u8; vertex_count as usize * mesh_type.vertex_stride() as usize],
        index_data: vec![0u8; index_count as usize * 4],
    }
}

#[test]
fn e1_empty_model_has_exact_header_plus_empty_strings_size() {
    let asset = ModelAsset::default();
    let bytes = asset.serialize();

    let header_size = std::mem::size_of::<kohi_core::codec::AssetHeader>();
    assert_eq!(bytes.len(), header_size + 4 + 8);

    let restored = ModelAsset::deserialize(&bytes).unwrap();
    assert!(restored.submeshes.is_empty());
    assert!(restored.bones.is_empty());
    assert!(restored.nodes.is_empty());
    assert!(restored.animations.is_empty());
}

#[test]
fn e2_static_cube_round_trips_with_exact_blob_sizes() {
    let mut asset = ModelAsset::default();
    asset.submeshes.push(empty_submesh("cube", "mat_cube", MeshType::Static, 24, 36));

    let bytes = asset.serialize();
    let restored = ModelAsset::deserialize(&bytes).unwrap();

    assert_eq!(restored.submeshes.len(), 1);
    let submesh = &restored.submeshes[0];
    assert_eq!(submesh.name.as_deref(), Some("cube"));
    assert_eq!(submesh.material_name.as_deref(), Some("mat_cube"));
    assert_eq!(submesh.vertex_data.len(), 24 * 48);
    assert_eq!(submesh.index_data.len(), 36 * 4);
}

#[test]
fn e3_skinned_idle_animation_wraps_after_one_full_cycle() {
    let mut asset = ModelAsset::default();
    asset.submeshes.push(empty_submesh("body", "mat_body", MeshType::Skinned, 4, 6));

    for i in 0..4u16 {
        asset.bones.push(Bone {
            name: Some(format!("node{i}")),
            offset_matrix: Mat4::IDENTITY,
            id: i,
        });
    }

    asset.nodes.push(Node {
        name: Some("node0".to_string()),
        local_transform: Mat4::IDENTITY,
        parent_index: NO_PARENT,
        children: vec![1, 2, 3],
    });
    for i in 1..4u16 {
        asset.nodes.push(Node {
            name: Some(format!("node{i}")),
            local_transform: Mat4::IDENTITY,
            parent_index: 0,
            children: vec![],
        });
    }

    let channels: Vec<Channel> = (0..4)
        .map(|i| Channel {
            node_name: Some(format!("node{i}")),
            positions: vec![
                Vec3Key { time: 0.0, value: Vec3::ZERO },
                Vec3Key { time: 60.0, value: Vec3 { x: 1.0, y: 0.0, z: 0.0 } },
            ],
            rotations: vec![
                QuatKey { time: 0.0, value: Quat::IDENTITY },
                QuatKey { time: 60.0, value: Quat::IDENTITY },
            ],
            scales: vec![
                Vec3Key { time: 0.0, value: Vec3 { x: 1.0, y: 1.0, z: 1.0 } },
                Vec3Key { time: 60.0, value: Vec3 { x: 1.0, y: 1.0, z: 1.0 } },
            ],
        })
        .collect();

    asset.animations.push(Animation {
        name: Some("idle".to_string()),
        duration: 60.0,
        ticks_per_second: 30.0,
        channels,
    });

    let bytes = asset.serialize();
    let restored = ModelAsset::deserialize(&bytes).unwrap();

    assert_eq!(restored.animations.len(), 1);
    let idle = &restored.animations[0];
    assert_eq!(idle.name.as_deref(), Some("idle"));
    assert_eq!(idle.channels.len(), 4);
    assert_eq!(idle.channels[0].positions.len(), 2);

    let mut animator = Animator::new(0, 0);
    animator.set_animation("idle", &restored.animations);
    animator.play();

    let dt = 1.0 / 60.0;
    for _ in 0..120 {
        animator.update(dt, 1.0, &restored.animations);
    }
    let near_zero = animator.time_in_ticks.abs() < 1e-2;
    let near_duration = (animator.time_in_ticks - 60.0).abs() < 1e-2;
    assert!(near_zero || near_duration, "expected wrap near a full cycle, got {}", animator.time_in_ticks);
}

#[test]
fn e4_invalid_magic_fails_without_panicking() {
    let mut asset = ModelAsset::default();
    asset.submeshes.push(empty_submesh("cube", "mat_cube", MeshType::Static, 24, 36));
    let mut bytes = asset.serialize();
    bytes[0] ^= 0xFF;

    assert!(ModelAsset::deserialize(&bytes).is_err());
}

#[test]
fn e5_spurious_guard_after_submeshes_fails_the_guard_check() {
    let mut asset = ModelAsset::default();
    asset.submeshes.push(empty_submesh("cube", "mat_cube", MeshType::Static, 24, 36));
    let bytes = asset.serialize();

    // No BONES/NODES/ANIMATIONS sections are present (all counts are
    // zero), so the STRINGS guard immediately precedes the recorded
    // `string_table_offset`. Splice in a spurious BONES guard right
    // there; the header still advertises bone_count == 0, so the
    // loader expects STRINGS next and must fail on the mismatch.
    let offset_field = kohi_core::codec::STRING_TABLE_OFFSET_FIELD_OFFSET as usize;
    let string_table_offset = u32::from_le_bytes(bytes[offset_field..offset_field + 4].try_into().unwrap());
    let strings_guard_offset = string_table_offset as usize - 4;
    let mut tampered = bytes[..strings_guard_offset].to_vec();
    tampered.extend_from_slice(&2u32.to_le_bytes()); // Guard::Bones
    tampered.extend_from_slice(&bytes[strings_guard_offset..]);

    assert!(ModelAsset::deserialize(&tampered).is_err());
}

#[test]
fn e6_sentinel_material_name_resolves_to_absent_without_lookup_failure() {
    let mut asset = ModelAsset::default();
    let mut submesh = empty_submesh("cube", "mat_cube", MeshType::Static, 4, 6);
    submesh.material_name = None;
    asset.submeshes.push(submesh);

    let bytes = asset.serialize();
    let restored = ModelAsset::deserialize(&bytes).unwrap();
    assert!(restored.submeshes[0].material_name.is_none());
    assert_eq!(restored.submeshes[0].name.as_deref(), Some("cube"));
}

#[test]
fn string_table_offset_is_self_consistent_after_serialization() {
    let mut asset = ModelAsset::default();
    asset.submeshes.push(empty_submesh("cube", "mat_cube", MeshType::Static, 24, 36));
    let bytes = asset.serialize();

    // Re-derive the header's string_table_offset field and confirm it
    // points exactly at the STRINGS guard's payload.
    let offset_field = kohi_core::codec::STRING_TABLE_OFFSET_FIELD_OFFSET as usize;
    let recorded = u32::from_le_bytes(bytes[offset_field..offset_field + 4].try_into().unwrap());

    let guard_value = u32::from_le_bytes(bytes[recorded as usize - 4..recorded as usize].try_into().unwrap());
    assert_eq!(guard_value, 6, "expected the STRINGS guard immediately before the recorded offset");
}

#[test]
fn channel_distribution_mismatch_is_rejected() {
    // Two animations, one channel each, no submeshes/bones/nodes so the
    // ANIMATIONS section immediately follows the header.
    let mut asset = ModelAsset::default();
    for i in 0..2u32 {
        asset.animations.push(Animation {
            name: Some(format!("anim{i}")),
            duration: 30.0,
            ticks_per_second: 30.0,
            channels: vec![Channel {
                node_name: Some(format!("node{i}")),
                positions: vec![Vec3Key { time: 0.0, value: Vec3::ZERO }],
                rotations: vec![QuatKey { time: 0.0, value: Quat::IDENTITY }],
                scales: vec![Vec3Key { time: 0.0, value: Vec3 { x: 1.0, y: 1.0, z: 1.0 } }],
            }],
        });
    }
    let mut bytes = asset.serialize();

    let header_size = std::mem::size_of::<kohi_core::codec::AssetHeader>();
    // ANIMATIONS section: guard(4) + total_channel_count(u16) +
    // name_ids[2](u16) + durations[2](f32) + ticks_per_seconds[2](f32) +
    // channel_counts[2](u16), then the ANIM_CHANNELS guard(4) and its
    // leading animation_ids[2](u16) array.
    let animations_section_size = 4 + 2 + 2 * 2 + 2 * 4 + 2 * 4 + 2 * 2;
    let animation_ids_offset = header_size + animations_section_size + 4;

    // Both flattened channels claim animation 0 instead of one each,
    // so animation 0's found count (2) no longer matches its declared
    // channel_counts entry (1).
    bytes[animation_ids_offset + 2..animation_ids_offset + 4].copy_from_slice(&0u16.to_le_bytes());

    let err = ModelAsset::deserialize(&bytes).unwrap_err();
    assert!(matches!(err, kohi_core::CodecError::AnimationChannelCountMismatch { .. }));
}
