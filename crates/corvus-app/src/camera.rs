use winit::{
    event::{DeviceEvent, ElementState, MouseButton, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

/// 自由视角相机：WASD 移动，按住右键用鼠标环视
pub struct Camera {
    pub position: glam::Vec3,
    pub velocity: glam::Vec3,

    /// 弧度
    pub pitch: f32,
    /// 弧度
    pub yaw: f32,

    rotating: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: glam::vec3(0.0, 0.0, 5.0),
            velocity: glam::Vec3::ZERO,
            pitch: 0.0,
            yaw: 0.0,
            rotating: false,
        }
    }
}

impl Camera {
    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                let value = if event.state == ElementState::Pressed { 1.0 } else { 0.0 };
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::KeyW) => self.velocity.z = -value,
                    PhysicalKey::Code(KeyCode::KeyS) => self.velocity.z = value,
                    PhysicalKey::Code(KeyCode::KeyA) => self.velocity.x = -value,
                    PhysicalKey::Code(KeyCode::KeyD) => self.velocity.x = value,
                    _ => {}
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Right,
                ..
            } => {
                self.rotating = *state == ElementState::Pressed;
            }
            _ => {}
        }
    }

    pub fn handle_device_event(&mut self, event: &DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            if self.rotating {
                self.yaw += *dx as f32 / 200.0;
                self.pitch -= *dy as f32 / 200.0;
                self.pitch = self.pitch.clamp(-1.5, 1.5);
            }
        }
    }

    pub fn update(&mut self) {
        let rotation = self.rotation_matrix();
        self.position += rotation.transform_vector3(self.velocity * 0.5);
    }

    pub fn view_matrix(&self) -> glam::Mat4 {
        // 相机变换是"把相机摆到世界里"，view 矩阵是它的逆
        let translation = glam::Mat4::from_translation(self.position);
        let rotation = glam::Mat4::from_quat(self.rotation_quat());
        (translation * rotation).inverse()
    }

    fn rotation_quat(&self) -> glam::Quat {
        glam::Quat::from_rotation_y(-self.yaw) * glam::Quat::from_rotation_x(self.pitch)
    }

    fn rotation_matrix(&self) -> glam::Affine3A {
        glam::Affine3A::from_quat(self.rotation_quat())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn identity_view_at_origin() {
        let camera = Camera {
            position: glam::Vec3::ZERO,
            ..Default::default()
        };
        let view = camera.view_matrix();
        assert!((view - glam::Mat4::IDENTITY).abs_diff_eq(glam::Mat4::ZERO, 1e-6));
    }

    #[test]
    fn view_inverts_translation() {
        let camera = Camera {
            position: glam::vec3(1.0, 2.0, 3.0),
            ..Default::default()
        };
        let view = camera.view_matrix();
        let eye = view.transform_point3(glam::vec3(1.0, 2.0, 3.0));
        assert!(eye.abs_diff_eq(glam::Vec3::ZERO, 1e-6));
    }
}
