use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

pub struct GfxSurface {
    pub(crate) handle: vk::SurfaceKHR,
    pub(crate) pf: ash::khr::surface::Instance,
}

// init & destroy
impl GfxSurface {
    pub fn new(gfx: &Gfx, window: &winit::window::Window) -> Self {
        let surface_pf = ash::khr::surface::Instance::new(gfx.entry(), gfx.instance().ash_instance());

        let surface = unsafe {
            ash_window::create_surface(
                gfx.entry(),
                gfx.instance().ash_instance(),
                window.display_handle().unwrap().as_raw(),
                window.window_handle().unwrap().as_raw(),
                None,
            )
            .unwrap()
        };

        let surface = GfxSurface {
            handle: surface,
            pf: surface_pf,
        };
        gfx.device().set_debug_name(&surface, "main");
        surface
    }

    pub fn destroy(self) {
        unsafe { self.pf.destroy_surface(self.handle, None) }
    }
}

// tools
impl GfxSurface {
    pub fn capabilities(&self, gfx: &Gfx) -> vk::SurfaceCapabilitiesKHR {
        unsafe {
            self.pf
                .get_physical_device_surface_capabilities(gfx.physical_device().handle(), self.handle)
                .unwrap()
        }
    }
}

impl DebugType for GfxSurface {
    fn debug_type_name() -> &'static str {
        "GfxSurface"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
