use std::{cell::RefCell, collections::HashMap, path::Path, rc::Rc};

use anyhow::Context;
use ash::vk;
use corvus_gfx::{
    descriptors::allocator::{DescriptorAllocatorGrowable, PoolSizeRatio},
    gfx::Gfx,
    resources::{buffer::GfxBuffer, image::GfxImage},
};
use itertools::Itertools;

use crate::{
    material::{MaterialConstants, MaterialInstance, MaterialPass, MaterialResources, MetallicRoughness},
    model_upload::bounds_of,
    scene::{DrawContext, GeoSurface, MeshAsset, Node, NodeKind, Vertex},
    upload::{upload_image, upload_mesh},
};

/// 写 material set 时用到的引擎默认资源
#[derive(Copy, Clone)]
pub struct SceneDefaults {
    pub white_view: vk::ImageView,
    pub error_view: vk::ImageView,
    pub linear_sampler: vk::Sampler,
}

/// 从 glTF 加载的场景：带名字的可遍历节点层级 + 它拥有的 GPU 资源
pub struct LoadedScene {
    pub meshes: Vec<Rc<MeshAsset>>,
    pub nodes: HashMap<String, Rc<RefCell<Node>>>,
    pub top_nodes: Vec<Rc<RefCell<Node>>>,
    pub materials: Vec<Rc<MaterialInstance>>,

    images: Vec<GfxImage>,
    material_data_buffer: GfxBuffer,
    descriptor_pool: DescriptorAllocatorGrowable,
}

impl LoadedScene {
    /// 每帧一次：把整个层级的 render object 写入 draw context
    pub fn draw(&self, top_matrix: &glam::Mat4, ctx: &mut DrawContext) {
        for node in &self.top_nodes {
            node.borrow().draw(top_matrix, ctx);
        }
    }

    pub fn destroy(mut self, gfx: &Gfx) {
        self.nodes.clear();
        self.top_nodes.clear();
        self.materials.clear();

        for mesh in self.meshes {
            let mesh = Rc::try_unwrap(mesh).unwrap_or_else(|_| panic!("mesh asset still referenced"));
            mesh.mesh_buffers.index_buffer.destroy(gfx);
            mesh.mesh_buffers.vertex_buffer.destroy(gfx);
        }
        for image in self.images {
            image.destroy(gfx);
        }
        self.material_data_buffer.destroy(gfx);
        self.descriptor_pool.destroy_pools(gfx);
    }
}

/// 加载一个 glTF/GLB 场景
///
/// 失败是可恢复的：调用方记录日志，场景保持缺席
pub fn load_gltf(
    gfx: &Gfx,
    metal_rough: &mut MetallicRoughness,
    defaults: SceneDefaults,
    path: impl AsRef<Path>,
) -> anyhow::Result<LoadedScene> {
    let path = path.as_ref();
    let (document, buffers, image_data) =
        gltf::import(path).with_context(|| format!("failed to import gltf scene: {:?}", path))?;

    // 纹理：全部解码成 RGBA8 并生成 mip
    let images = image_data
        .iter()
        .enumerate()
        .map(|(idx, data)| {
            let pixels = to_rgba8(data);
            pixels.map(|pixels| {
                upload_image(
                    gfx,
                    &pixels,
                    vk::Extent3D {
                        width: data.width,
                        height: data.height,
                        depth: 1,
                    },
                    vk::Format::R8G8B8A8_UNORM,
                    vk::ImageUsageFlags::SAMPLED,
                    true,
                    format!("gltf-image-{idx}"),
                )
            })
        })
        .collect_vec();

    let mut descriptor_pool = DescriptorAllocatorGrowable::new(
        gfx,
        (document.materials().len() as u32).max(1),
        vec![
            PoolSizeRatio {
                descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                ratio: 1.0,
            },
            PoolSizeRatio {
                descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                ratio: 2.0,
            },
        ],
    );

    // material constants 连续放进一个 uniform buffer
    let align = unsafe {
        gfx.instance()
            .ash_instance()
            .get_physical_device_properties(gfx.physical_device().handle())
            .limits
            .min_uniform_buffer_offset_alignment
    };
    let stride = (std::mem::size_of::<MaterialConstants>() as vk::DeviceSize).next_multiple_of(align.max(1));
    let material_count = document.materials().len().max(1);
    let material_data_buffer = GfxBuffer::new(
        gfx,
        stride * material_count as vk::DeviceSize,
        vk::BufferUsageFlags::UNIFORM_BUFFER,
        true,
        "gltf-material-constants",
    );

    let image_view = |texture: Option<gltf::texture::Info<'_>>, fallback: vk::ImageView| {
        texture
            .and_then(|info| images[info.texture().source().index()].as_ref())
            .map_or(fallback, |img| img.view())
    };

    let mut materials = Vec::with_capacity(material_count);
    for (mat_idx, material) in document.materials().enumerate() {
        let pbr = material.pbr_metallic_roughness();
        let constants = MaterialConstants {
            color_factors: glam::Vec4::from_array(pbr.base_color_factor()),
            metal_rough_factors: glam::vec4(pbr.metallic_factor(), pbr.roughness_factor(), 0.0, 0.0),
            ..Default::default()
        };

        let offset = stride * mat_idx as vk::DeviceSize;
        material_data_buffer.transfer_data_by_mmap_offset(gfx, &[constants], offset);

        let pass = if material.alpha_mode() == gltf::material::AlphaMode::Blend {
            MaterialPass::Transparent
        } else {
            MaterialPass::Opaque
        };

        let instance = metal_rough.write_material(
            gfx,
            pass,
            &MaterialResources {
                color_image_view: image_view(pbr.base_color_texture(), defaults.white_view),
                color_sampler: defaults.linear_sampler,
                metal_rough_image_view: image_view(pbr.metallic_roughness_texture(), defaults.white_view),
                metal_rough_sampler: defaults.linear_sampler,
                data_buffer: material_data_buffer.vk_buffer(),
                data_buffer_offset: offset as u32,
            },
            &mut descriptor_pool,
        );
        materials.push(Rc::new(instance));
    }

    // 场景里一个 material 都没有时兜底一个默认的
    if materials.is_empty() {
        material_data_buffer.transfer_data_by_mmap_offset(gfx, &[MaterialConstants::default()], 0);
        let instance = metal_rough.write_material(
            gfx,
            MaterialPass::Opaque,
            &MaterialResources {
                color_image_view: defaults.error_view,
                color_sampler: defaults.linear_sampler,
                metal_rough_image_view: defaults.white_view,
                metal_rough_sampler: defaults.linear_sampler,
                data_buffer: material_data_buffer.vk_buffer(),
                data_buffer_offset: 0,
            },
            &mut descriptor_pool,
        );
        materials.push(Rc::new(instance));
    }

    // mesh：每个 primitive 一个 surface，顶点和索引拼接进同一对 buffer
    let mut meshes = Vec::new();
    for mesh in document.meshes() {
        let mut vertices: Vec<Vertex> = Vec::new();
        let mut indices: Vec<u32> = Vec::new();
        let mut surfaces = Vec::new();

        for primitive in mesh.primitives() {
            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()].0));

            let start_index = indices.len() as u32;
            let vertex_base = vertices.len() as u32;

            let positions = reader
                .read_positions()
                .with_context(|| format!("primitive of mesh {:?} has no positions", mesh.name()))?;
            let first_vertex = vertices.len();
            for position in positions {
                vertices.push(Vertex {
                    position: glam::Vec3::from_array(position),
                    ..Default::default()
                });
            }

            if let Some(normals) = reader.read_normals() {
                for (i, normal) in normals.enumerate() {
                    vertices[first_vertex + i].normal = glam::Vec3::from_array(normal);
                }
            }
            if let Some(uvs) = reader.read_tex_coords(0) {
                for (i, uv) in uvs.into_f32().enumerate() {
                    vertices[first_vertex + i].uv_x = uv[0];
                    vertices[first_vertex + i].uv_y = uv[1];
                }
            }
            if let Some(colors) = reader.read_colors(0) {
                for (i, color) in colors.into_rgba_f32().enumerate() {
                    vertices[first_vertex + i].color = glam::Vec4::from_array(color);
                }
            }

            match reader.read_indices() {
                Some(read_indices) => {
                    indices.extend(read_indices.into_u32().map(|i| i + vertex_base));
                }
                None => {
                    // 无索引的 primitive 按顶点顺序直接展开
                    indices.extend(vertex_base..vertices.len() as u32);
                }
            }

            let material_index =
                primitive.material().index().map_or(0, |i| i.min(materials.len() - 1));

            surfaces.push(GeoSurface {
                start_index,
                count: indices.len() as u32 - start_index,
                bounds: bounds_of(&vertices[first_vertex..]),
                material: materials[material_index].clone(),
            });
        }

        let mesh_buffers = upload_mesh(gfx, &indices, &vertices);
        meshes.push(Rc::new(MeshAsset {
            name: mesh.name().unwrap_or("mesh").to_string(),
            surfaces,
            mesh_buffers,
        }));
    }

    // 节点层级：先建节点，再挂 children，最后从 default scene 取顶层
    let gltf_nodes = document
        .nodes()
        .map(|node| {
            let kind = node
                .mesh()
                .map_or(NodeKind::Empty, |mesh| NodeKind::Mesh(meshes[mesh.index()].clone()));
            let local_transform = glam::Mat4::from_cols_array_2d(&node.transform().matrix());
            Rc::new(RefCell::new(Node::new(kind, local_transform)))
        })
        .collect_vec();

    let mut nodes = HashMap::new();
    for (gltf_node, node) in document.nodes().zip(gltf_nodes.iter()) {
        let children = gltf_node.children().map(|c| gltf_nodes[c.index()].clone()).collect_vec();
        node.borrow_mut().children = children;

        let name = gltf_node.name().map_or_else(|| format!("node-{}", gltf_node.index()), str::to_string);
        nodes.insert(name, node.clone());
    }

    let top_nodes = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .map(|scene| scene.nodes().map(|n| gltf_nodes[n.index()].clone()).collect_vec())
        .unwrap_or_default();

    for node in &top_nodes {
        node.borrow_mut().refresh_transform(&glam::Mat4::IDENTITY);
    }

    log::info!(
        "loaded gltf scene {:?}: {} meshes, {} materials, {} images",
        path,
        meshes.len(),
        materials.len(),
        images.len()
    );

    Ok(LoadedScene {
        meshes,
        nodes,
        top_nodes,
        materials,
        images: images.into_iter().flatten().collect_vec(),
        material_data_buffer,
        descriptor_pool,
    })
}

/// 将 glTF 解码出的像素统一转换为 RGBA8；不支持的格式返回 None
fn to_rgba8(data: &gltf::image::Data) -> Option<Vec<u8>> {
    use gltf::image::Format;

    let pixel_count = (data.width * data.height) as usize;
    match data.format {
        Format::R8G8B8A8 => Some(data.pixels.clone()),
        Format::R8G8B8 => {
            let mut out = Vec::with_capacity(pixel_count * 4);
            for rgb in data.pixels.chunks_exact(3) {
                out.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
            }
            Some(out)
        }
        Format::R8 => {
            let mut out = Vec::with_capacity(pixel_count * 4);
            for r in &data.pixels {
                out.extend_from_slice(&[*r, *r, *r, 255]);
            }
            Some(out)
        }
        Format::R8G8 => {
            let mut out = Vec::with_capacity(pixel_count * 4);
            for rg in data.pixels.chunks_exact(2) {
                out.extend_from_slice(&[rg[0], rg[1], 0, 255]);
            }
            Some(out)
        }
        other => {
            log::warn!("unsupported gltf image format {:?}, texture will be missing", other);
            None
        }
    }
}
