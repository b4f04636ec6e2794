use std::{collections::HashMap, rc::Rc};

use ash::vk;
use corvus_gfx::{
    descriptors::allocator::DescriptorAllocatorGrowable, gfx::Gfx, resources::buffer::GfxBuffer,
    resources::image::GfxImage,
};
use corvus_model::{Model, TextureKind};

use crate::{
    material::{MaterialConstants, MaterialInstance, MaterialPass, MaterialResources, MetallicRoughness},
    scene::{Bounds, DrawContext, GeoSurface, MeshAsset, RenderObject, Vertex},
    upload::{upload_image, upload_mesh},
};

/// 上传完成的外部模型
///
/// 与 CPU 侧 Model 保持严格的并行关系：
/// meshes[i] 对应 model.meshes[i]，textures 以同样的解析路径为 key。
/// 每个 mesh 持有自己的 MaterialInstance，绘制路径和场景图完全一致，
/// 不依赖 draw list 中其他对象的 material
pub struct UploadedModel {
    pub meshes: Vec<Rc<MeshAsset>>,
    pub textures: HashMap<String, GfxImage>,
    pub materials: Vec<Rc<MaterialInstance>>,

    material_data_buffer: GfxBuffer,
    descriptor_pool: DescriptorAllocatorGrowable,
}

impl UploadedModel {
    /// 将 CPU 侧模型搬到 GPU：mesh buffer、纹理、material set
    #[allow(clippy::too_many_arguments)]
    pub fn upload(
        gfx: &Gfx,
        metal_rough: &mut MetallicRoughness,
        model: &Model,
        default_white_view: vk::ImageView,
        default_error_view: vk::ImageView,
        linear_sampler: vk::Sampler,
    ) -> Self {
        let mut descriptor_pool = DescriptorAllocatorGrowable::new(
            gfx,
            (model.materials.len() as u32).max(1),
            vec![
                corvus_gfx::descriptors::allocator::PoolSizeRatio {
                    descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                    ratio: 1.0,
                },
                corvus_gfx::descriptors::allocator::PoolSizeRatio {
                    descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    ratio: 2.0,
                },
            ],
        );

        // 纹理：与 CPU 缓存同 key
        let mut textures = HashMap::new();
        for (path, pixels) in &model.textures {
            // 1x1 或 2x2 的小纹理没有必要生成 mip
            let mipmapped = pixels.width > 2 && pixels.height > 2;
            let image = upload_image(
                gfx,
                &pixels.data,
                vk::Extent3D {
                    width: pixels.width,
                    height: pixels.height,
                    depth: 1,
                },
                vk::Format::R8G8B8A8_UNORM,
                vk::ImageUsageFlags::SAMPLED,
                mipmapped,
                path.as_str(),
            );
            textures.insert(path.clone(), image);
        }

        // material constants：所有 material 连续放在一个 uniform buffer 里
        let align = unsafe {
            gfx.instance()
                .ash_instance()
                .get_physical_device_properties(gfx.physical_device().handle())
                .limits
                .min_uniform_buffer_offset_alignment
        };
        let stride =
            (std::mem::size_of::<MaterialConstants>() as vk::DeviceSize).next_multiple_of(align.max(1));
        let material_count = model.materials.len().max(1);
        let material_data_buffer = GfxBuffer::new(
            gfx,
            stride * material_count as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            true,
            "model-material-constants",
        );

        let mut materials = Vec::with_capacity(model.materials.len());
        for (mat_idx, descriptor) in model.materials.iter().enumerate() {
            let offset = stride * mat_idx as vk::DeviceSize;
            material_data_buffer.transfer_data_by_mmap_offset(gfx, &[MaterialConstants::default()], offset);

            // diffuse → binding 1，normal → binding 2；其余类型暂不进入 material set
            let mut color_view = default_error_view;
            let mut normal_view = default_white_view;
            for (path, kind) in &descriptor.textures {
                let Some(texture) = textures.get(path) else { continue };
                match kind {
                    TextureKind::Diffuse => color_view = texture.view(),
                    TextureKind::Normal => normal_view = texture.view(),
                    _ => {}
                }
            }

            let instance = metal_rough.write_material(
                gfx,
                MaterialPass::Opaque,
                &MaterialResources {
                    color_image_view: color_view,
                    color_sampler: linear_sampler,
                    metal_rough_image_view: normal_view,
                    metal_rough_sampler: linear_sampler,
                    data_buffer: material_data_buffer.vk_buffer(),
                    data_buffer_offset: offset as u32,
                },
                &mut descriptor_pool,
            );
            materials.push(Rc::new(instance));
        }

        // 没有任何 material 的模型兜底一个默认 material
        if materials.is_empty() {
            let offset = 0u32;
            material_data_buffer.transfer_data_by_mmap_offset(gfx, &[MaterialConstants::default()], 0);
            let instance = metal_rough.write_material(
                gfx,
                MaterialPass::Opaque,
                &MaterialResources {
                    color_image_view: default_error_view,
                    color_sampler: linear_sampler,
                    metal_rough_image_view: default_white_view,
                    metal_rough_sampler: linear_sampler,
                    data_buffer: material_data_buffer.vk_buffer(),
                    data_buffer_offset: offset,
                },
                &mut descriptor_pool,
            );
            materials.push(Rc::new(instance));
        }

        // mesh：与 model.meshes 同下标
        let meshes = model
            .meshes
            .iter()
            .map(|mesh| {
                let vertices = mesh
                    .vertices
                    .iter()
                    .map(|v| Vertex {
                        position: glam::Vec3::from_array(v.position),
                        uv_x: v.uv[0],
                        normal: glam::Vec3::from_array(v.normal),
                        uv_y: v.uv[1],
                        color: glam::Vec4::ONE,
                    })
                    .collect::<Vec<_>>();

                let mesh_buffers = upload_mesh(gfx, &mesh.indices, &vertices);
                let material_index = (mesh.material_index as usize).min(materials.len() - 1);

                Rc::new(MeshAsset {
                    name: mesh.name.clone(),
                    surfaces: vec![GeoSurface {
                        start_index: 0,
                        count: mesh.indices.len() as u32,
                        bounds: bounds_of(&vertices),
                        material: materials[material_index].clone(),
                    }],
                    mesh_buffers,
                })
            })
            .collect();

        Self {
            meshes,
            textures,
            materials,
            material_data_buffer,
            descriptor_pool,
        }
    }

    /// 向 draw context 发射模型的全部 surface
    pub fn draw(&self, top_matrix: &glam::Mat4, ctx: &mut DrawContext) {
        for mesh in &self.meshes {
            for surface in &mesh.surfaces {
                let render_object = RenderObject {
                    index_count: surface.count,
                    first_index: surface.start_index,
                    index_buffer: mesh.mesh_buffers.index_buffer.vk_buffer(),
                    material: surface.material.clone(),
                    bounds: surface.bounds,
                    transform: *top_matrix,
                    vertex_buffer_address: mesh.mesh_buffers.vertex_buffer_address,
                };
                match surface.material.pass {
                    MaterialPass::Transparent => ctx.transparent_surfaces.push(render_object),
                    MaterialPass::Opaque => ctx.opaque_surfaces.push(render_object),
                }
            }
        }
    }

    pub fn destroy(mut self, gfx: &Gfx) {
        for mesh in self.meshes {
            let mesh = Rc::try_unwrap(mesh).unwrap_or_else(|_| panic!("mesh asset still referenced"));
            mesh.mesh_buffers.index_buffer.destroy(gfx);
            mesh.mesh_buffers.vertex_buffer.destroy(gfx);
        }
        for (_, texture) in self.textures {
            texture.destroy(gfx);
        }
        self.material_data_buffer.destroy(gfx);
        self.descriptor_pool.destroy_pools(gfx);
    }
}

/// 从顶点集合计算局部 AABB
pub fn bounds_of(vertices: &[Vertex]) -> Bounds {
    if vertices.is_empty() {
        return Bounds::default();
    }

    let mut min = vertices[0].position;
    let mut max = vertices[0].position;
    for vertex in vertices {
        min = min.min(vertex.position);
        max = max.max(vertex.position);
    }

    Bounds {
        origin: (max + min) / 2.0,
        extents: (max - min) / 2.0,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bounds_center_and_extents() {
        let vertices = vec![
            Vertex {
                position: glam::vec3(-1.0, 0.0, 2.0),
                ..Default::default()
            },
            Vertex {
                position: glam::vec3(3.0, 4.0, 6.0),
                ..Default::default()
            },
        ];

        let bounds = bounds_of(&vertices);
        assert_eq!(bounds.origin, glam::vec3(1.0, 2.0, 4.0));
        assert_eq!(bounds.extents, glam::vec3(2.0, 2.0, 2.0));
    }

    #[test]
    fn bounds_of_empty_is_unit_box() {
        let bounds = bounds_of(&[]);
        assert_eq!(bounds.extents, glam::Vec3::ONE);
    }
}
