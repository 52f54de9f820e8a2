//! The binary model asset codec (§4.1-4.2).

mod guard;
mod header;
mod model_asset;
mod reader;

pub use guard::{Guard, ASSET_TYPE_MODEL, INVALID_NAME_SENTINEL, MODEL_MAGIC};
pub use header::{AssetHeader, MeshType, STRING_TABLE_OFFSET_FIELD_OFFSET};
pub use model_asset::{
    Animation, Bone, Channel, ModelAsset, Node, QuatKey, Submesh, Vec3Key, NO_PARENT,
};
pub use reader::{Reader, Writer};
