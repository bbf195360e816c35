use kestrel_vk::{vk, CommandBuffer};

/// Handed to the GUI callback while the UI render pass is recording; the
/// renderer guarantees an active dynamic-rendering context on `cmd`.
pub struct GuiContext<'a> {
    pub cmd: &'a CommandBuffer,
    pub extent: vk::Extent2D,
}

/// Immediate-mode GUI hook: one callback per frame, recorded at the end of
/// the UI pass.
pub trait GuiRenderer {
    fn draw(&mut self, ctx: &mut GuiContext);
}

/// Default no-op GUI.
pub struct NoGui;

impl GuiRenderer for NoGui {
    fn draw(&mut self, _ctx: &mut GuiContext) {}
}
