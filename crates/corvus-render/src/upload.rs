use ash::vk;
use corvus_gfx::{
    commands::{barrier::GfxImageBarrier, command_buffer::GfxCommandBuffer},
    gfx::Gfx,
    resources::{
        buffer::GfxBuffer,
        image::{full_mip_levels, GfxImage},
    },
};

use crate::scene::{GPUMeshBuffers, Vertex};

/// 将 CPU 侧的顶点/索引数据上传为 GPU-local 的 mesh buffer
///
/// staging buffer 布局：vertices 在前，indices 紧随其后；
/// 两次 buffer copy 在同一次 immediate submit 内完成，
/// 返回前 staging buffer 已经销毁。
/// 顶点数据不走固定管线：记录 vertex buffer 的 device address 供 shader 读取
pub fn upload_mesh(gfx: &Gfx, indices: &[u32], vertices: &[Vertex]) -> GPUMeshBuffers {
    let vertex_buffer_size = std::mem::size_of_val(vertices) as vk::DeviceSize;
    let index_buffer_size = std::mem::size_of_val(indices) as vk::DeviceSize;

    let vertex_buffer = GfxBuffer::new(
        gfx,
        vertex_buffer_size,
        vk::BufferUsageFlags::STORAGE_BUFFER
            | vk::BufferUsageFlags::TRANSFER_DST
            | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
        false,
        "mesh-vertex",
    );
    let vertex_buffer_address = vertex_buffer.device_address();

    let index_buffer = GfxBuffer::new(
        gfx,
        index_buffer_size,
        vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
        false,
        "mesh-index",
    );

    let staging = GfxBuffer::new_stage_buffer(gfx, vertex_buffer_size + index_buffer_size, "mesh-staging");
    staging.transfer_data_by_mmap_offset(gfx, vertices, 0);
    staging.transfer_data_by_mmap_offset(gfx, indices, vertex_buffer_size);

    gfx.immediate_submit(|cmd| {
        cmd.cmd_copy_buffer(
            staging.vk_buffer(),
            vertex_buffer.vk_buffer(),
            &[vk::BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size: vertex_buffer_size,
            }],
        );
        cmd.cmd_copy_buffer(
            staging.vk_buffer(),
            index_buffer.vk_buffer(),
            &[vk::BufferCopy {
                src_offset: vertex_buffer_size,
                dst_offset: 0,
                size: index_buffer_size,
            }],
        );
    });

    staging.destroy(gfx);

    GPUMeshBuffers {
        index_buffer,
        vertex_buffer,
        vertex_buffer_address,
    }
}

/// 将 RGBA8 像素数据上传为 GPU image
///
/// staging buffer → buffer-image copy，之后要么生成完整 mip chain，
/// 要么直接转换到 shader-read layout。整个过程在 immediate submit 内，阻塞到完成
pub fn upload_image(
    gfx: &Gfx,
    data: &[u8],
    extent: vk::Extent3D,
    format: vk::Format,
    usage: vk::ImageUsageFlags,
    mipmapped: bool,
    name: impl AsRef<str>,
) -> GfxImage {
    let data_size = (extent.width * extent.height * extent.depth * 4) as usize;
    assert_eq!(data.len(), data_size);

    let staging = GfxBuffer::new_stage_buffer(gfx, data_size as vk::DeviceSize, "image-staging");
    staging.transfer_data_by_mmap(gfx, data);

    let image = GfxImage::new(
        gfx,
        extent,
        format,
        usage | vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::TRANSFER_SRC,
        mipmapped,
        name,
    );

    gfx.immediate_submit(|cmd| {
        cmd.transition_image(image.handle(), vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL);

        let copy_region = vk::BufferImageCopy2::default()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_extent(extent);

        cmd.cmd_copy_buffer_to_image(
            &vk::CopyBufferToImageInfo2::default()
                .src_buffer(staging.vk_buffer())
                .dst_image(image.handle())
                .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .regions(std::slice::from_ref(&copy_region)),
        );

        if mipmapped {
            generate_mipmaps(
                cmd,
                image.handle(),
                vk::Extent2D {
                    width: extent.width,
                    height: extent.height,
                },
            );
        } else {
            cmd.transition_image(
                image.handle(),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            );
        }
    });

    staging.destroy(gfx);

    image
}

/// 逐级 blit 生成 mip chain
///
/// 每级先把上一级转成 TRANSFER_SRC，再向下一级做减半 blit；
/// 全部完成后整条 chain 一起转到 shader-read layout
pub fn generate_mipmaps(cmd: &GfxCommandBuffer, image: vk::Image, image_size: vk::Extent2D) {
    let mip_levels = full_mip_levels(image_size);
    let mut level_size = image_size;

    for mip in 0..mip_levels {
        let half_size = vk::Extent2D {
            width: u32::max(1, level_size.width / 2),
            height: u32::max(1, level_size.height / 2),
        };

        let barrier = GfxImageBarrier::new()
            .image(image)
            .src_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
            .dst_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_READ)
            .layout_transfer(vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
            .image_aspect_flag(vk::ImageAspectFlags::COLOR)
            .mip_level(mip);
        cmd.image_memory_barrier(vk::DependencyFlags::empty(), std::slice::from_ref(&barrier));

        if mip < mip_levels - 1 {
            let blit_region = vk::ImageBlit2::default()
                .src_offsets([
                    vk::Offset3D::default(),
                    vk::Offset3D {
                        x: level_size.width as i32,
                        y: level_size.height as i32,
                        z: 1,
                    },
                ])
                .dst_offsets([
                    vk::Offset3D::default(),
                    vk::Offset3D {
                        x: half_size.width as i32,
                        y: half_size.height as i32,
                        z: 1,
                    },
                ])
                .src_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: mip,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .dst_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: mip + 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            let blit_info = vk::BlitImageInfo2::default()
                .src_image(image)
                .src_image_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
                .dst_image(image)
                .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .filter(vk::Filter::LINEAR)
                .regions(std::slice::from_ref(&blit_region));

            cmd.cmd_blit_image(&blit_info);

            level_size = half_size;
        }
    }

    cmd.transition_image(image, vk::ImageLayout::TRANSFER_SRC_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
}

#[cfg(test)]
mod test {
    use super::*;

    /// staging buffer 的布局约定：vertices 在前、indices 紧随其后
    #[test]
    fn staging_layout_offsets() {
        let vertices = [Vertex::default(); 3];
        let indices = [0u32, 1, 2];

        let vertex_size = std::mem::size_of_val(&vertices[..]);
        let index_size = std::mem::size_of_val(&indices[..]);

        assert_eq!(vertex_size, 3 * std::mem::size_of::<Vertex>());
        assert_eq!(index_size, 12);
        // index 的 copy 区域从 vertex 段的末尾开始
        assert_eq!(vertex_size as u64, 3 * 48);
    }

    #[test]
    fn vertex_layout_is_std430_compatible() {
        // position + uv_x | normal + uv_y | color，无 padding
        assert_eq!(std::mem::size_of::<Vertex>(), 48);
        assert_eq!(std::mem::offset_of!(Vertex, uv_x), 12);
        assert_eq!(std::mem::offset_of!(Vertex, normal), 16);
        assert_eq!(std::mem::offset_of!(Vertex, uv_y), 28);
        assert_eq!(std::mem::offset_of!(Vertex, color), 32);
    }
}
