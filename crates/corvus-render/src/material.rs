use std::{path::Path, rc::Rc};

use ash::vk;
use corvus_gfx::{
    descriptors::{
        allocator::DescriptorAllocatorGrowable, layout_builder::DescriptorLayoutBuilder, writer::DescriptorWriter,
    },
    gfx::Gfx,
    pipelines::{graphics_pipeline::PipelineBuilder, shader::ShaderModule},
};

use crate::{
    deletion_queue::{DeferredDestroy, DeletionQueue},
    scene::GPUDrawPushConstants,
};

/// pass 分类：决定 render object 进入哪个 draw list
#[derive(Copy, Clone, PartialEq, Eq)]
pub enum MaterialPass {
    Opaque,
    Transparent,
}

/// pipeline + layout，多个 material instance 共享
pub struct MaterialPipeline {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
}

/// pipeline 和一组 per-material 资源绑定的组合
///
/// 被 render object 以引用（Rc）方式使用，从不复制
pub struct MaterialInstance {
    pub pipeline: Rc<MaterialPipeline>,
    pub material_set: vk::DescriptorSet,
    pub pass: MaterialPass,
}

/// material uniform buffer 的内容
///
/// extra 纯粹是 uniform buffer 的 padding，保证 256 字节对齐
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialConstants {
    pub color_factors: glam::Vec4,
    pub metal_rough_factors: glam::Vec4,
    pub extra: [glam::Vec4; 14],
}

impl Default for MaterialConstants {
    fn default() -> Self {
        Self {
            color_factors: glam::Vec4::ONE,
            metal_rough_factors: glam::vec4(1.0, 0.5, 0.0, 0.0),
            extra: [glam::Vec4::ZERO; 14],
        }
    }
}

/// 写 material set 需要的具体资源
pub struct MaterialResources {
    pub color_image_view: vk::ImageView,
    pub color_sampler: vk::Sampler,
    pub metal_rough_image_view: vk::ImageView,
    pub metal_rough_sampler: vk::Sampler,
    pub data_buffer: vk::Buffer,
    pub data_buffer_offset: u32,
}

/// metallic-roughness material 系统
///
/// opaque / transparent 两条 pipeline 共享一个 pipeline layout：
/// set 0 = scene data，set 1 = material，push constant = 变换 + 顶点地址
pub struct MetallicRoughness {
    pub opaque_pipeline: Rc<MaterialPipeline>,
    pub transparent_pipeline: Rc<MaterialPipeline>,

    pub material_layout: vk::DescriptorSetLayout,

    writer: DescriptorWriter,
}

impl MetallicRoughness {
    /// 构建 opaque + transparent 两条 pipeline
    ///
    /// shader 缺失或 pipeline 对象创建失败是可恢复的：
    /// 返回 Err，调用方跳过 material 系统（场景绘制随之缺席）
    pub fn build_pipelines(
        gfx: &Gfx,
        scene_data_layout: vk::DescriptorSetLayout,
        color_format: vk::Format,
        depth_format: vk::Format,
        deletion_queue: &mut DeletionQueue,
    ) -> anyhow::Result<Self> {
        let vertex_shader = ShaderModule::load(gfx, Path::new("assets/shaders/mesh.vert.spv"))?;
        let fragment_shader = match ShaderModule::load(gfx, Path::new("assets/shaders/mesh.frag.spv")) {
            Ok(m) => m,
            Err(e) => {
                vertex_shader.destroy(gfx);
                return Err(e);
            }
        };

        let material_layout = DescriptorLayoutBuilder::new()
            .add_binding(0, vk::DescriptorType::UNIFORM_BUFFER)
            .add_binding(1, vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .add_binding(2, vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .build(gfx, vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT);

        let push_constant_range = vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::VERTEX)
            .offset(0)
            .size(std::mem::size_of::<GPUDrawPushConstants>() as u32);

        let set_layouts = [scene_data_layout, material_layout];
        let layout_ci = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(std::slice::from_ref(&push_constant_range));
        // layout 的创建失败仍然是 fatal
        let pipeline_layout = unsafe { gfx.device().create_pipeline_layout(&layout_ci, None).unwrap() };

        let mut builder = PipelineBuilder::new();
        builder
            .set_shaders(vertex_shader.handle(), fragment_shader.handle())
            .set_input_topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .set_polygon_mode(vk::PolygonMode::FILL)
            .set_cull_mode(vk::CullModeFlags::BACK, vk::FrontFace::COUNTER_CLOCKWISE)
            .set_multisampling_none()
            .disable_blending()
            // reversed-Z
            .enable_depthtest(true, vk::CompareOp::GREATER_OR_EQUAL)
            .set_color_attachment_format(color_format)
            .set_depth_format(depth_format)
            .set_pipeline_layout(pipeline_layout);

        let opaque = builder.build(gfx);

        // transparent 变体：additive blend，关闭深度写入
        builder.enable_blending_additive().enable_depthtest(false, vk::CompareOp::GREATER_OR_EQUAL);
        let transparent = builder.build(gfx);

        vertex_shader.destroy(gfx);
        fragment_shader.destroy(gfx);

        let (opaque, transparent) = match (opaque, transparent) {
            (Some(o), Some(t)) => (o, t),
            (o, t) => {
                // 只建出一半也没有意义，全部回收
                unsafe {
                    if let Some(p) = o {
                        gfx.device().destroy_pipeline(p, None);
                    }
                    if let Some(p) = t {
                        gfx.device().destroy_pipeline(p, None);
                    }
                    gfx.device().destroy_pipeline_layout(pipeline_layout, None);
                    gfx.device().destroy_descriptor_set_layout(material_layout, None);
                }
                anyhow::bail!("failed to build metallic-roughness pipelines");
            }
        };

        deletion_queue.push(DeferredDestroy::DescriptorSetLayout(material_layout));
        deletion_queue.push(DeferredDestroy::PipelineLayout(pipeline_layout));
        deletion_queue.push(DeferredDestroy::Pipeline(opaque));
        deletion_queue.push(DeferredDestroy::Pipeline(transparent));

        Ok(Self {
            opaque_pipeline: Rc::new(MaterialPipeline {
                pipeline: opaque,
                layout: pipeline_layout,
            }),
            transparent_pipeline: Rc::new(MaterialPipeline {
                pipeline: transparent,
                layout: pipeline_layout,
            }),
            material_layout,
            writer: DescriptorWriter::new(),
        })
    }

    /// 分配并写入一个 material set，产生 MaterialInstance
    pub fn write_material(
        &mut self,
        gfx: &Gfx,
        pass: MaterialPass,
        resources: &MaterialResources,
        descriptor_allocator: &mut DescriptorAllocatorGrowable,
    ) -> MaterialInstance {
        let pipeline = match pass {
            MaterialPass::Transparent => self.transparent_pipeline.clone(),
            MaterialPass::Opaque => self.opaque_pipeline.clone(),
        };

        let material_set = descriptor_allocator.allocate(gfx, self.material_layout);

        self.writer.clear();
        self.writer.write_buffer(
            0,
            resources.data_buffer,
            std::mem::size_of::<MaterialConstants>() as vk::DeviceSize,
            resources.data_buffer_offset as vk::DeviceSize,
            vk::DescriptorType::UNIFORM_BUFFER,
        );
        self.writer.write_image(
            1,
            resources.color_image_view,
            resources.color_sampler,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        );
        self.writer.write_image(
            2,
            resources.metal_rough_image_view,
            resources.metal_rough_sampler,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        );
        self.writer.update_set(gfx, material_set);

        MaterialInstance {
            pipeline,
            material_set,
            pass,
        }
    }
}
