/// 每帧更新的引擎统计，供 UI overlay 读取
#[derive(Default, Copy, Clone)]
pub struct EngineStats {
    pub frametime_ms: f32,
    pub mesh_draw_time_ms: f32,
    pub triangle_count: u32,
    pub drawcall_count: u32,
}
