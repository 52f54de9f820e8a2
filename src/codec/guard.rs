//! The section guard tag and asset-type/magic constants (§4.2).

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Magic value stamped at the start of every model asset block.
pub const MODEL_MAGIC: u32 = u32::from_le_bytes(*b"K3DM");

/// The only asset type this codec currently serializes.
pub const ASSET_TYPE_MODEL: u32 = 1;

/// A `u32` tag preceding a section; verifies both its presence and its
/// position in the fixed section order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum Guard {
    Header = 0,
    Submeshes = 1,
    Bones = 2,
    Nodes = 3,
    Animations = 4,
    AnimChannels = 5,
    Strings = 6,
}

impl Guard {
    pub fn name(self) -> &'static str {
        match self {
            Guard::Header => "HEADER",
            Guard::Submeshes => "SUBMESHES",
            Guard::Bones => "BONES",
            Guard::Nodes => "NODES",
            Guard::Animations => "ANIMATIONS",
            Guard::AnimChannels => "ANIM_CHANNELS",
            Guard::Strings => "STRINGS",
        }
    }
}

/// `0xFFFF`: absence of a name in a parallel name-id array. No string
/// lookup is performed for a field carrying this value.
pub const INVALID_NAME_SENTINEL: u16 = 0xFFFF;
