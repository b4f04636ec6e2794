use ash::vk;
use itertools::Itertools;

use crate::gfx::Gfx;

/// descriptor pool 的配比：每个 max_set 需要的某类 descriptor 的数量
#[derive(Copy, Clone)]
pub struct PoolSizeRatio {
    pub descriptor_type: vk::DescriptorType,
    pub ratio: f32,
}

fn create_pool(gfx: &Gfx, set_count: u32, ratios: &[PoolSizeRatio]) -> vk::DescriptorPool {
    let pool_sizes = ratios
        .iter()
        .map(|r| vk::DescriptorPoolSize {
            ty: r.descriptor_type,
            descriptor_count: (r.ratio * set_count as f32) as u32,
        })
        .collect_vec();

    let pool_ci = vk::DescriptorPoolCreateInfo::default().max_sets(set_count).pool_sizes(&pool_sizes);
    unsafe { gfx.device().create_descriptor_pool(&pool_ci, None).unwrap() }
}

/// 固定容量的 descriptor allocator
///
/// 一个 pool，容量在创建时确定；分配失败（pool 耗尽）视为 fatal
pub struct DescriptorAllocator {
    pool: vk::DescriptorPool,
}

// init & destroy
impl DescriptorAllocator {
    pub fn new(gfx: &Gfx, max_sets: u32, pool_ratios: &[PoolSizeRatio]) -> Self {
        Self {
            pool: create_pool(gfx, max_sets, pool_ratios),
        }
    }

    pub fn destroy_pool(&mut self, gfx: &Gfx) {
        unsafe {
            gfx.device().destroy_descriptor_pool(self.pool, None);
        }
    }
}

// tools
impl DescriptorAllocator {
    pub fn clear_descriptors(&mut self, gfx: &Gfx) {
        unsafe {
            gfx.device().reset_descriptor_pool(self.pool, vk::DescriptorPoolResetFlags::empty()).unwrap();
        }
    }

    pub fn allocate(&mut self, gfx: &Gfx, layout: vk::DescriptorSetLayout) -> vk::DescriptorSet {
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(std::slice::from_ref(&layout));

        unsafe { gfx.device().allocate_descriptor_sets(&alloc_info).unwrap()[0] }
    }
}

/// 可增长的 descriptor allocator，用于 per-frame 的 descriptor churn
///
/// pool 分为 ready / full 两组；当前 pool 耗尽时将其放入 full 组，
/// 并按几何级数（×1.5，上限 [`MAX_SETS_PER_POOL`]）创建更大的新 pool 重试。
/// `clear_pools` 将所有 pool reset 后归还 ready 组而不释放，
/// 长期运行下内存增长有界，分配成本被摊销。
pub struct DescriptorAllocatorGrowable {
    ratios: Vec<PoolSizeRatio>,
    full_pools: Vec<vk::DescriptorPool>,
    ready_pools: Vec<vk::DescriptorPool>,
    sets_per_pool: u32,
}

/// 单个 pool 的 set 数量上限
pub const MAX_SETS_PER_POOL: u32 = 4092;

/// pool 容量的增长策略：×1.5，有上限
#[inline]
pub fn next_sets_per_pool(sets: u32) -> u32 {
    u32::min(sets * 3 / 2, MAX_SETS_PER_POOL)
}

// init & destroy
impl DescriptorAllocatorGrowable {
    pub fn new(gfx: &Gfx, initial_sets: u32, pool_ratios: Vec<PoolSizeRatio>) -> Self {
        let first_pool = create_pool(gfx, initial_sets, &pool_ratios);

        Self {
            ratios: pool_ratios,
            full_pools: vec![],
            ready_pools: vec![first_pool],
            sets_per_pool: next_sets_per_pool(initial_sets),
        }
    }

    pub fn destroy_pools(&mut self, gfx: &Gfx) {
        unsafe {
            for pool in self.ready_pools.drain(..) {
                gfx.device().destroy_descriptor_pool(pool, None);
            }
            for pool in self.full_pools.drain(..) {
                gfx.device().destroy_descriptor_pool(pool, None);
            }
        }
    }
}

// tools
impl DescriptorAllocatorGrowable {
    /// 将所有 pool 设置回初始状态并归还 ready 组；pool 本身不会被释放
    pub fn clear_pools(&mut self, gfx: &Gfx) {
        unsafe {
            for pool in &self.ready_pools {
                gfx.device().reset_descriptor_pool(*pool, vk::DescriptorPoolResetFlags::empty()).unwrap();
            }
            for pool in self.full_pools.drain(..) {
                gfx.device().reset_descriptor_pool(pool, vk::DescriptorPoolResetFlags::empty()).unwrap();
                self.ready_pools.push(pool);
            }
        }
    }

    pub fn allocate(&mut self, gfx: &Gfx, layout: vk::DescriptorSetLayout) -> vk::DescriptorSet {
        let pool = self.get_pool(gfx);

        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(std::slice::from_ref(&layout));

        match unsafe { gfx.device().allocate_descriptor_sets(&alloc_info) } {
            Ok(sets) => {
                self.ready_pools.push(pool);
                sets[0]
            }
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {
                // 当前 pool 耗尽：换一个新 pool 重试，重试仍失败视为 fatal
                self.full_pools.push(pool);

                let pool = self.get_pool(gfx);
                let alloc_info = vk::DescriptorSetAllocateInfo::default()
                    .descriptor_pool(pool)
                    .set_layouts(std::slice::from_ref(&layout));
                let set = unsafe { gfx.device().allocate_descriptor_sets(&alloc_info).unwrap()[0] };
                self.ready_pools.push(pool);
                set
            }
            Err(e) => panic!("failed to allocate descriptor set: {:?}", e),
        }
    }

    fn get_pool(&mut self, gfx: &Gfx) -> vk::DescriptorPool {
        match self.ready_pools.pop() {
            Some(pool) => pool,
            None => {
                let pool = create_pool(gfx, self.sets_per_pool, &self.ratios);
                self.sets_per_pool = next_sets_per_pool(self.sets_per_pool);
                pool
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pool_size_grows_geometrically_with_cap() {
        let mut sets = 1000;
        let mut sizes = vec![];
        for _ in 0..8 {
            sizes.push(sets);
            sets = next_sets_per_pool(sets);
        }
        // 1000 → 1500 → 2250 → 3375 → 4092（封顶后不再增长）
        assert_eq!(&sizes[..5], &[1000, 1500, 2250, 3375, 4092]);
        assert!(sizes.iter().all(|s| *s <= MAX_SETS_PER_POOL));
    }

    #[test]
    fn pool_size_never_exceeds_cap() {
        assert_eq!(next_sets_per_pool(MAX_SETS_PER_POOL), MAX_SETS_PER_POOL);
        assert_eq!(next_sets_per_pool(4000), MAX_SETS_PER_POOL);
    }
}
