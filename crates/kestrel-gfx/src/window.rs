use {
    glam::Vec2,
    kestrel_vk::vk,
    raw_window_handle::{HasDisplayHandle, HasWindowHandle},
    std::{collections::HashSet, path::PathBuf},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CursorMode {
    #[default]
    Normal,
    Disabled,
}

/// Input state sampled once per frame by the host window layer.
#[derive(Clone, Debug, Default)]
pub struct WindowInput {
    pub keys_down: HashSet<u32>,
    pub mouse_buttons_down: HashSet<u8>,
    pub cursor: Vec2,
    pub scroll: Vec2,
    /// Files dropped onto the window this frame.
    pub drops: Vec<PathBuf>,
}

impl WindowInput {
    pub fn key_down(&self, key: u32) -> bool { self.keys_down.contains(&key) }

    pub fn mouse_down(&self, button: u8) -> bool { self.mouse_buttons_down.contains(&button) }
}

/// What the engine needs from the host window: raw handles for surface
/// creation, the framebuffer extent, and per-frame input.
pub trait Window: HasDisplayHandle + HasWindowHandle {
    fn framebuffer_extent(&self) -> vk::Extent2D;

    fn input(&self) -> &WindowInput;

    fn cursor_mode(&self) -> CursorMode { CursorMode::Normal }
}
