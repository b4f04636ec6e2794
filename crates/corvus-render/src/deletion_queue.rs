use ash::vk;
use corvus_gfx::{gfx::Gfx, resources::buffer::GfxBuffer, resources::image::GfxImage};

/// 按插入顺序记录、按逆序批量消费的容器
///
/// 后注册的资源先被销毁：依赖者总是晚于被依赖者注册，
/// 因此逆序 flush 天然满足销毁的依赖顺序
pub struct OrderedQueue<T> {
    items: Vec<T>,
}

impl<T> Default for OrderedQueue<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> OrderedQueue<T> {
    #[inline]
    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 按插入的逆序消费所有元素；flush 后队列为空
    pub fn flush_with(&mut self, mut consume: impl FnMut(T)) {
        for item in self.items.drain(..).rev() {
            consume(item);
        }
    }
}

/// 延迟销毁的资源记录
///
/// 不捕获闭包：每个变体只保存释放资源所需的数据，
/// 由 [`DeletionQueue::flush`] 做类型分发
pub enum DeferredDestroy {
    Buffer(GfxBuffer),
    Image(GfxImage),
    ImageView(vk::ImageView),
    Sampler(vk::Sampler),
    Pipeline(vk::Pipeline),
    PipelineLayout(vk::PipelineLayout),
    DescriptorSetLayout(vk::DescriptorSetLayout),
    DescriptorPool(vk::DescriptorPool),
}

impl DeferredDestroy {
    fn destroy(self, gfx: &Gfx) {
        unsafe {
            match self {
                DeferredDestroy::Buffer(buffer) => buffer.destroy(gfx),
                DeferredDestroy::Image(image) => image.destroy(gfx),
                DeferredDestroy::ImageView(view) => gfx.device().destroy_image_view(view, None),
                DeferredDestroy::Sampler(sampler) => gfx.device().destroy_sampler(sampler, None),
                DeferredDestroy::Pipeline(pipeline) => gfx.device().destroy_pipeline(pipeline, None),
                DeferredDestroy::PipelineLayout(layout) => gfx.device().destroy_pipeline_layout(layout, None),
                DeferredDestroy::DescriptorSetLayout(layout) => {
                    gfx.device().destroy_descriptor_set_layout(layout, None)
                }
                DeferredDestroy::DescriptorPool(pool) => gfx.device().destroy_descriptor_pool(pool, None),
            }
        }
    }
}

/// GPU 对象的延迟销毁队列
///
/// 两种作用域：
/// - global：引擎关闭时 flush 一次
/// - per frame-slot：该 slot 的 fence signal 之后、复用之前 flush，
///   保证 GPU 不再引用其中的资源（例如每帧的 scene uniform buffer）
#[derive(Default)]
pub struct DeletionQueue {
    queue: OrderedQueue<DeferredDestroy>,
}

impl DeletionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, resource: DeferredDestroy) {
        self.queue.push(resource);
    }

    /// 按注册的逆序销毁所有资源；空队列 flush 是 no-op
    pub fn flush(&mut self, gfx: &Gfx) {
        self.queue.flush_with(|resource| resource.destroy(gfx));
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flush_runs_in_reverse_insertion_order() {
        let mut queue = OrderedQueue::default();
        for i in 0..5 {
            queue.push(i);
        }

        let mut order = vec![];
        queue.flush_with(|i| order.push(i));

        assert_eq!(order, vec![4, 3, 2, 1, 0]);
        assert!(queue.is_empty());
    }

    #[test]
    fn flush_empties_the_queue() {
        let mut queue = OrderedQueue::default();
        queue.push("a");
        queue.push("b");

        let mut count = 0;
        queue.flush_with(|_| count += 1);
        assert_eq!(count, 2);

        // 第二次 flush 是 no-op
        queue.flush_with(|_| count += 1);
        assert_eq!(count, 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn flush_on_empty_queue_is_noop() {
        let mut queue: OrderedQueue<u32> = OrderedQueue::default();
        let mut called = false;
        queue.flush_with(|_| called = true);
        assert!(!called);
    }

    #[test]
    fn interleaved_push_flush_keeps_reverse_order() {
        let mut queue = OrderedQueue::default();
        queue.push(1);
        queue.push(2);

        let mut order = vec![];
        queue.flush_with(|i| order.push(i));

        queue.push(3);
        queue.push(4);
        queue.flush_with(|i| order.push(i));

        assert_eq!(order, vec![2, 1, 4, 3]);
    }
}
