//! Vertex/index geometry upload against the renderer surface (§4.5).

use crate::codec::Submesh;
use crate::error::RuntimeError;
use crate::renderer::{FrameWorkload, RenderBackend};

/// The render-buffer ranges a single uploaded submesh occupies.
#[derive(Debug, Clone, Copy)]
pub struct SubmeshGeometry {
    pub vertex_offset: u64,
    pub vertex_size: u64,
    pub index_offset: u64,
    pub index_size: u64,
}

/// Uploads every submesh's vertex/index bytes. A submesh whose
/// allocation or upload fails is skipped and logged (§4.5: "a partial
/// base is permitted but its generation number is not incremented for
/// the failed submesh"); its own partially-acquired ranges are freed
/// before moving on.
///
/// Returns one `(source_index, geometry)` pair per submesh that
/// uploaded successfully, in submesh order.
pub fn upload_submeshes<B: RenderBackend>(
    backend: &mut B,
    vertex_buffer: B::Handle,
    index_buffer: B::Handle,
    submeshes: &[Submesh],
) -> Vec<(usize, SubmeshGeometry)> {
    let mut uploaded = Vec::with_capacity(submeshes.len());
    for (i, submesh) in submeshes.iter().enumerate() {
        match upload_one(backend, vertex_buffer, index_buffer, submesh) {
            Ok(geometry) => uploaded.push((i, geometry)),
            Err(error) => {
                tracing::warn!(submesh = i, %error, "submesh geometry upload failed, skipping");
            }
        }
    }
    uploaded
}

fn upload_one<B: RenderBackend>(
    backend: &mut B,
    vertex_buffer: B::Handle,
    index_buffer: B::Handle,
    submesh: &Submesh,
) -> Result<SubmeshGeometry, RuntimeError> {
    let vertex_size = submesh.vertex_data.len() as u64;
    let vertex_offset = backend.renderbuffer_allocate(vertex_buffer, vertex_size)?;
    if let Err(error) = backend.renderbuffer_load_range(
        vertex_buffer,
        vertex_offset,
        &submesh.vertex_data,
        FrameWorkload::MainThread,
    ) {
        backend.renderbuffer_free(vertex_buffer, vertex_size, vertex_offset);
        return Err(error);
    }

    let index_size = submesh.index_data.len() as u64;
    let index_offset = match backend.renderbuffer_allocate(index_buffer, index_size) {
        Ok(offset) => offset,
        Err(error) => {
            backend.renderbuffer_free(vertex_buffer, vertex_size, vertex_offset);
            return Err(error);
        }
    };
    if let Err(error) = backend.renderbuffer_load_range(
        index_buffer,
        index_offset,
        &submesh.index_data,
        FrameWorkload::MainThread,
    ) {
        backend.renderbuffer_free(index_buffer, index_size, index_offset);
        backend.renderbuffer_free(vertex_buffer, vertex_size, vertex_offset);
        return Err(error);
    }

    Ok(SubmeshGeometry {
        vertex_offset,
        vertex_size,
        index_offset,
        index_size,
    })
}

/// Reverse of upload: free the index range then the vertex range.
pub fn free_submesh<B: RenderBackend>(
    backend: &mut B,
    vertex_buffer: B::Handle,
    index_buffer: B::Handle,
    geometry: &SubmeshGeometry,
) {
    backend.renderbuffer_free(index_buffer, geometry.index_size, geometry.index_offset);
    backend.renderbuffer_free(vertex_buffer, geometry.vertex_size, geometry.vertex_offset);
}
