use std::{cell::RefCell, rc::Rc};

use ash::vk;

use crate::material::{MaterialInstance, MaterialPass};

/// 顶点格式
///
/// uv 拆成两个标量穿插在 position/normal 之后，保持 std430 下无 padding，
/// shader 侧通过 buffer device address 以同样的布局读取
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: glam::Vec3,
    pub uv_x: f32,
    pub normal: glam::Vec3,
    pub uv_y: f32,
    pub color: glam::Vec4,
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: glam::Vec3::ZERO,
            uv_x: 0.0,
            normal: glam::vec3(0.0, 0.0, 1.0),
            uv_y: 0.0,
            color: glam::Vec4::ONE,
        }
    }
}

/// 每帧写入 scene uniform buffer 的数据
#[repr(C)]
#[derive(Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GPUSceneData {
    pub view: glam::Mat4,
    pub proj: glam::Mat4,
    pub viewproj: glam::Mat4,
    pub ambient_color: glam::Vec4,
    /// w 分量是 sunlight power
    pub sunlight_direction: glam::Vec4,
    pub sunlight_color: glam::Vec4,
}

/// 每次 draw 前 push 的常量块：world matrix + 顶点数据的 device address
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GPUDrawPushConstants {
    pub world_matrix: glam::Mat4,
    pub vertex_buffer: vk::DeviceAddress,
    /// push constant 的大小按 16 对齐
    pub _padding: [u32; 2],
}

impl GPUDrawPushConstants {
    pub fn new(world_matrix: glam::Mat4, vertex_buffer: vk::DeviceAddress) -> Self {
        Self {
            world_matrix,
            vertex_buffer,
            _padding: [0; 2],
        }
    }
}

/// mesh 的 GPU 侧数据：index buffer + vertex buffer + 顶点数据的 device address
pub struct GPUMeshBuffers {
    pub index_buffer: corvus_gfx::resources::buffer::GfxBuffer,
    pub vertex_buffer: corvus_gfx::resources::buffer::GfxBuffer,
    pub vertex_buffer_address: vk::DeviceAddress,
}

/// 局部空间的 AABB：中心 + 半边长
#[derive(Copy, Clone, Debug)]
pub struct Bounds {
    pub origin: glam::Vec3,
    pub extents: glam::Vec3,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            origin: glam::Vec3::ZERO,
            extents: glam::Vec3::ONE,
        }
    }
}

/// mesh 内一段连续 index 构成的 surface，绑定一个 material
pub struct GeoSurface {
    pub start_index: u32,
    pub count: u32,
    pub bounds: Bounds,
    pub material: Rc<MaterialInstance>,
}

/// 上传完成的 mesh 资产
pub struct MeshAsset {
    pub name: String,
    pub surfaces: Vec<GeoSurface>,
    pub mesh_buffers: GPUMeshBuffers,
}

/// 一次 draw call 的瞬态记录，每帧从场景图重建
pub struct RenderObject {
    pub index_count: u32,
    pub first_index: u32,
    pub index_buffer: vk::Buffer,

    pub material: Rc<MaterialInstance>,

    pub bounds: Bounds,
    pub transform: glam::Mat4,
    pub vertex_buffer_address: vk::DeviceAddress,
}

/// 每帧的 draw list；提交结束后清空，从不跨帧保留
#[derive(Default)]
pub struct DrawContext {
    pub opaque_surfaces: Vec<RenderObject>,
    pub transparent_surfaces: Vec<RenderObject>,
}

impl DrawContext {
    pub fn clear(&mut self) {
        self.opaque_surfaces.clear();
        self.transparent_surfaces.clear();
    }
}

/// 场景图节点的变体：空节点只参与变换层级，Mesh 节点产生 render object
pub enum NodeKind {
    Empty,
    Mesh(Rc<MeshAsset>),
}

/// 场景图节点
///
/// 统一的遍历函数合并父子变换；只有 Mesh 变体会向 DrawContext 写入
pub struct Node {
    pub kind: NodeKind,

    pub children: Vec<Rc<RefCell<Node>>>,

    pub local_transform: glam::Mat4,
    pub world_transform: glam::Mat4,
}

impl Node {
    pub fn new(kind: NodeKind, local_transform: glam::Mat4) -> Self {
        Self {
            kind,
            children: vec![],
            local_transform,
            world_transform: glam::Mat4::IDENTITY,
        }
    }

    /// 自上而下刷新 world transform
    pub fn refresh_transform(&mut self, parent_matrix: &glam::Mat4) {
        self.world_transform = *parent_matrix * self.local_transform;
        for child in &self.children {
            child.borrow_mut().refresh_transform(&self.world_transform);
        }
    }

    /// 遍历并向 draw context 发射 render object
    ///
    /// material 的 pass 分类决定进入 opaque 还是 transparent 列表
    pub fn draw(&self, top_matrix: &glam::Mat4, ctx: &mut DrawContext) {
        if let NodeKind::Mesh(mesh) = &self.kind {
            let node_matrix = *top_matrix * self.world_transform;

            for surface in &mesh.surfaces {
                let render_object = RenderObject {
                    index_count: surface.count,
                    first_index: surface.start_index,
                    index_buffer: mesh.mesh_buffers.index_buffer.vk_buffer(),
                    material: surface.material.clone(),
                    bounds: surface.bounds,
                    transform: node_matrix,
                    vertex_buffer_address: mesh.mesh_buffers.vertex_buffer_address,
                };

                match surface.material.pass {
                    MaterialPass::Transparent => ctx.transparent_surfaces.push(render_object),
                    MaterialPass::Opaque => ctx.opaque_surfaces.push(render_object),
                }
            }
        }

        for child in &self.children {
            child.borrow().draw(top_matrix, ctx);
        }
    }
}
