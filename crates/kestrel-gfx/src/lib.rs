pub mod camera;
pub mod draw;
pub mod gui;
pub mod light;
pub mod renderer;
pub mod targets;
pub mod vertex;
pub mod window;

pub use {
    camera::{Camera, Face, Projection, ViewPlane},
    draw::{DrawItem, RenderList},
    gui::{GuiContext, GuiRenderer, NoGui},
    light::{DirLight, Lights, MAX_DIR_LIGHTS},
    renderer::{FrameInput, Renderer, RendererConfig},
    targets::{RenderTargets, ShadowTarget},
    window::{CursorMode, Window, WindowInput},
};
