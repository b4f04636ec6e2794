use std::rc::Rc;

use ash::vk::Handle;

use crate::scene::{DrawContext, RenderObject};

/// 视锥裁剪：保守的可见性测试
///
/// 将局部 AABB 的 8 个角点经 viewproj×model 变换到 clip space 并做透视除法，
/// 累积出 clip space 的 min/max box；只要该 box 在任一轴上完全超出
/// 规范视域（z∉[0,1] 或 x,y∉[-1,1]）就判不可见。
/// 允许 false positive（跨边界的对象保留），false negative 是缺陷。
pub fn is_visible(obj: &RenderObject, viewproj: &glam::Mat4) -> bool {
    const CORNERS: [glam::Vec3; 8] = [
        glam::vec3(1.0, 1.0, 1.0),
        glam::vec3(1.0, 1.0, -1.0),
        glam::vec3(1.0, -1.0, 1.0),
        glam::vec3(1.0, -1.0, -1.0),
        glam::vec3(-1.0, 1.0, 1.0),
        glam::vec3(-1.0, 1.0, -1.0),
        glam::vec3(-1.0, -1.0, 1.0),
        glam::vec3(-1.0, -1.0, -1.0),
    ];

    let matrix = *viewproj * obj.transform;

    let mut min = glam::vec3(1.5, 1.5, 1.5);
    let mut max = glam::vec3(-1.5, -1.5, -1.5);

    for corner in CORNERS {
        let v = matrix * (obj.bounds.origin + corner * obj.bounds.extents).extend(1.0);
        let v = glam::vec3(v.x / v.w, v.y / v.w, v.z / v.w);

        min = min.min(v);
        max = max.max(v);
    }

    !(min.z > 1.0 || max.z < 0.0 || min.x > 1.0 || max.x < -1.0 || min.y > 1.0 || max.y < -1.0)
}

/// 裁剪 opaque 列表，返回幸存对象的下标
pub fn cull_opaque(ctx: &DrawContext, viewproj: &glam::Mat4) -> Vec<usize> {
    (0..ctx.opaque_surfaces.len())
        .filter(|i| is_visible(&ctx.opaque_surfaces[*i], viewproj))
        .collect()
}

/// 对幸存的 opaque 下标排序，减少提交时的 pipeline/descriptor 重绑定
///
/// 第一关键字是 material 的指针标识，第二关键字是 index buffer 的 handle。
/// 这是性能启发，不是正确性要求；比较键构成全序
pub fn sort_opaque(ctx: &DrawContext, draws: &mut [usize]) {
    draws.sort_by(|&ia, &ib| {
        let a = &ctx.opaque_surfaces[ia];
        let b = &ctx.opaque_surfaces[ib];

        let mat_a = Rc::as_ptr(&a.material) as usize;
        let mat_b = Rc::as_ptr(&b.material) as usize;
        mat_a.cmp(&mat_b).then_with(|| a.index_buffer.as_raw().cmp(&b.index_buffer.as_raw()))
    });
}

#[cfg(test)]
mod test {
    use std::rc::Rc;

    use ash::vk;

    use super::*;
    use crate::{
        material::{MaterialInstance, MaterialPass, MaterialPipeline},
        scene::{Bounds, RenderObject},
    };

    fn test_material() -> Rc<MaterialInstance> {
        Rc::new(MaterialInstance {
            pipeline: Rc::new(MaterialPipeline {
                pipeline: vk::Pipeline::null(),
                layout: vk::PipelineLayout::null(),
            }),
            material_set: vk::DescriptorSet::null(),
            pass: MaterialPass::Opaque,
        })
    }

    fn object_at(material: Rc<MaterialInstance>, index_buffer_raw: u64, position: glam::Vec3) -> RenderObject {
        RenderObject {
            index_count: 3,
            first_index: 0,
            index_buffer: vk::Buffer::from_raw(index_buffer_raw),
            material,
            bounds: Bounds {
                origin: glam::Vec3::ZERO,
                extents: glam::Vec3::ONE,
            },
            transform: glam::Mat4::from_translation(position),
            vertex_buffer_address: 0,
        }
    }

    /// z 范围 [0, 1] 的右手投影，视线方向 -Z
    fn test_viewproj() -> glam::Mat4 {
        glam::Mat4::perspective_rh(70f32.to_radians(), 1.0, 0.1, 1000.0)
    }

    #[test]
    fn object_in_front_is_visible() {
        let obj = object_at(test_material(), 1, glam::vec3(0.0, 0.0, -10.0));
        assert!(is_visible(&obj, &test_viewproj()));
    }

    #[test]
    fn object_behind_camera_is_culled() {
        let obj = object_at(test_material(), 1, glam::vec3(0.0, 0.0, 50.0));
        assert!(!is_visible(&obj, &test_viewproj()));
    }

    #[test]
    fn object_far_off_axis_is_culled() {
        let obj = object_at(test_material(), 1, glam::vec3(500.0, 0.0, -10.0));
        assert!(!is_visible(&obj, &test_viewproj()));
    }

    #[test]
    fn object_straddling_frustum_edge_is_kept() {
        // AABB 比视锥大得多，跨越全部边界：保守测试必须保留它
        let mut obj = object_at(test_material(), 1, glam::vec3(0.0, 0.0, -5.0));
        obj.bounds.extents = glam::Vec3::splat(100.0);
        assert!(is_visible(&obj, &test_viewproj()));
    }

    #[test]
    fn cull_filters_draw_context() {
        let mut ctx = DrawContext::default();
        let mat = test_material();
        ctx.opaque_surfaces.push(object_at(mat.clone(), 1, glam::vec3(0.0, 0.0, -10.0)));
        ctx.opaque_surfaces.push(object_at(mat.clone(), 1, glam::vec3(0.0, 0.0, 50.0)));
        ctx.opaque_surfaces.push(object_at(mat, 1, glam::vec3(0.0, 2.0, -20.0)));

        let survivors = cull_opaque(&ctx, &test_viewproj());
        assert_eq!(survivors, vec![0, 2]);
    }

    #[test]
    fn sort_groups_by_material_then_index_buffer() {
        let mat_a = test_material();
        let mat_b = test_material();
        // Rc 地址决定顺序；先搞清楚谁小
        let (lo, hi) = if (Rc::as_ptr(&mat_a) as usize) < (Rc::as_ptr(&mat_b) as usize) {
            (mat_a, mat_b)
        } else {
            (mat_b, mat_a)
        };

        let mut ctx = DrawContext::default();
        ctx.opaque_surfaces.push(object_at(hi.clone(), 7, glam::Vec3::ZERO)); // 0
        ctx.opaque_surfaces.push(object_at(lo.clone(), 9, glam::Vec3::ZERO)); // 1
        ctx.opaque_surfaces.push(object_at(lo.clone(), 2, glam::Vec3::ZERO)); // 2
        ctx.opaque_surfaces.push(object_at(hi, 3, glam::Vec3::ZERO)); // 3
        ctx.opaque_surfaces.push(object_at(lo, 9, glam::Vec3::ZERO)); // 4

        let mut draws = vec![0, 1, 2, 3, 4];
        sort_opaque(&ctx, &mut draws);

        // lo material 在前（按 index buffer 2 < 9 = 9），然后 hi material（3 < 7）
        assert_eq!(&draws[..1], &[2]);
        assert!(draws[1..3].contains(&1) && draws[1..3].contains(&4));
        assert_eq!(&draws[3..], &[3, 0]);
    }

    #[test]
    fn sort_is_total_and_stable_under_equal_keys() {
        let mat = test_material();
        let mut ctx = DrawContext::default();
        for _ in 0..4 {
            ctx.opaque_surfaces.push(object_at(mat.clone(), 5, glam::Vec3::ZERO));
        }

        let mut draws = vec![3, 1, 0, 2];
        sort_opaque(&ctx, &mut draws);
        // 键完全相同时排序不会 panic，结果是某个排列
        let mut sorted = draws.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3]);
    }
}
