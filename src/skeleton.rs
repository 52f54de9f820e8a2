//! Channel key interpolation, hierarchical transform composition, and
//! bone palette assembly (§4.6).

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};

use crate::codec::{Animation, Bone, Channel, Node, QuatKey, Vec3Key, NO_PARENT};
use crate::math::{key_window, Mat4, Quat, Vec3};

/// Bone ids at or past this index are ignored (§4.6); traversal of the
/// node tree continues regardless.
pub const MAX_BONES: usize = 64;

/// The fixed-capacity, identity-by-default shader data an Animator
/// writes each frame and the Frame Publisher bulk-copies (§3's "Bone
/// palette (shader data)").
#[derive(Debug, Clone, Copy, Zeroable, Pod)]
#[repr(C)]
pub struct BonePalette(pub [Mat4; MAX_BONES]);

impl Default for BonePalette {
    fn default() -> Self {
        BonePalette([Mat4::IDENTITY; MAX_BONES])
    }
}

fn interpolate_vec3(keys: &[Vec3Key], t: f32) -> Option<Vec3> {
    let times: Vec<f32> = keys.iter().map(|k| k.time).collect();
    let (i, factor) = key_window(&times, t)?;
    Some(match factor {
        None => keys[i].value,
        Some(f) => Vec3::lerp(keys[i].value, keys[i + 1].value, f),
    })
}

fn interpolate_quat(keys: &[QuatKey], t: f32) -> Option<Quat> {
    let times: Vec<f32> = keys.iter().map(|k| k.time).collect();
    let (i, factor) = key_window(&times, t)?;
    Some(match factor {
        None => keys[i].value,
        Some(f) => Quat::slerp(keys[i].value, keys[i + 1].value, f),
    })
}

fn compose_from_channel(channel: &Channel, t: f32) -> Mat4 {
    let translation = interpolate_vec3(&channel.positions, t).unwrap_or(Vec3::ZERO);
    let rotation = interpolate_quat(&channel.rotations, t).unwrap_or(Quat::IDENTITY);
    let scale = interpolate_vec3(&channel.scales, t).unwrap_or(Vec3 { x: 1.0, y: 1.0, z: 1.0 });
    Mat4::compose(translation, rotation, scale)
}

/// Evaluates the skeleton for `time_in_ticks` of `animation` (rest
/// pose if `None`), writing bone palette entries in place.
///
/// Recurses from every root node (`parent_index == NONE`) with
/// `global_inverse_transform` as the initial parent transform, per
/// §4.7's evaluator invocation.
pub fn evaluate(
    nodes: &[Node],
    bones: &[Bone],
    animation: Option<&Animation>,
    time_in_ticks: f32,
    global_inverse_transform: Mat4,
    palette: &mut BonePalette,
) {
    let bones_by_name: HashMap<&str, &Bone> = bones
        .iter()
        .filter_map(|b| b.name.as_deref().map(|name| (name, b)))
        .collect();

    for (index, node) in nodes.iter().enumerate() {
        if node.parent_index == NO_PARENT {
            evaluate_node(index, nodes, &bones_by_name, animation, time_in_ticks, global_inverse_transform, palette);
        }
    }
}

fn evaluate_node(
    index: usize,
    nodes: &[Node],
    bones_by_name: &HashMap<&str, &Bone>,
    animation: Option<&Animation>,
    time_in_ticks: f32,
    parent_world: Mat4,
    palette: &mut BonePalette,
) {
    let node = &nodes[index];
    let channel = node
        .name
        .as_deref()
        .and_then(|name| animation.and_then(|anim| anim.find_channel(name)));

    let local = match channel {
        Some(channel) => compose_from_channel(channel, time_in_ticks),
        None => node.local_transform,
    };

    // Right-to-left composition, fixed to match the renderer's
    // expected multiplication order (§4.6).
    let world = local.mul(parent_world);

    if let Some(bone) = node.name.as_deref().and_then(|name| bones_by_name.get(name)) {
        if (bone.id as usize) < MAX_BONES {
            palette.0[bone.id as usize] = bone.offset_matrix.mul(world);
        } else {
            tracing::warn!(bone_id = bone.id, "bone id exceeds palette capacity, ignoring");
        }
    }

    for &child in &node.children {
        evaluate_node(child as usize, nodes, bones_by_name, animation, time_in_ticks, world, palette);
    }
}
