use {
    crate::{
        camera::{Camera, ViewPlane},
        draw::{DrawItem, RenderList},
        gui::{GuiContext, GuiRenderer},
        light::Lights,
        targets::{RenderTargets, ShadowTarget, COLOR_FORMAT, DEPTH_FORMAT},
        vertex,
    },
    anyhow::{anyhow, Result},
    bytemuck::{Pod, Zeroable},
    glam::{Mat4, Vec3, Vec4},
    kestrel_asset::{
        material::{Material, MaterialKind, PolygonMode, RenderMode},
        providers::DEFAULT_MATERIAL,
        texture::{FALLBACK_TEXTURE, WHITE_TEXTURE},
        AssetProviders,
    },
    kestrel_core::{util, Error, Rgba, Uri},
    kestrel_vk::{
        sync, vk, CommandBuffer, CommandPool, Device, DeviceConfig, FrameResources, Gpu,
        PipelineCache, PipelineState, ShaderInput, Surface, Swapchain, VertexLayout,
    },
    std::{collections::HashSet, sync::Arc},
};

pub const SHADOW_VERT: &str = "shaders/shadow.vert";
pub const SHADOW_FRAG: &str = "shaders/shadow.frag";
pub const FULLSCREEN_VERT: &str = "shaders/fullscreen.vert";
pub const FULLSCREEN_FRAG: &str = "shaders/fullscreen.frag";

/// Per-frame overridable renderer settings.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Scales the off-screen 3D target relative to the framebuffer.
    pub render_scale: f32,
    pub clear_colour: Rgba,
    /// Device-wide render mode that materials with `Default` polygon type
    /// inherit.
    pub default_render_mode: RenderMode,
    /// Half extent of the orthographic shadow volume. The light eye sits at
    /// the camera position, so scenes much larger than this frustum will
    /// peter-pan; a known trade-off of the single-cascade approach.
    pub shadow_frustum: f32,
    pub shadow_plane: ViewPlane,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            render_scale: 1.0,
            clear_colour: Rgba::BLACK,
            default_render_mode: RenderMode {
                polygon: PolygonMode::Fill,
                line_width: 1.0,
                depth_test: true,
            },
            shadow_frustum: 32.0,
            shadow_plane: ViewPlane {
                near: -50.0,
                far: 50.0,
            },
        }
    }
}

/// Scene constants bound at set 0 binding 0 of every material shader.
/// `camera_pos.w` carries exposure; `shadow_dir.w` carries the directional
/// light count.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct GpuViewData {
    view_proj: Mat4,
    shadow_mat: Mat4,
    camera_pos: Vec4,
    shadow_dir: Vec4,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
struct GpuDirLight {
    direction: Vec4,
    rgb: Vec4,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct GpuMaterialParams {
    albedo: Vec4,
    /// xyz = emissive factor, w = alpha cutoff.
    emissive: Vec4,
    /// x = metallic, y = roughness, z = alpha mode (0 opaque, 1 blend,
    /// 2 mask).
    metal_rough: Vec4,
}

struct Frame {
    pool: CommandPool,
    shadow_cmd: CommandBuffer,
    scene_cmd: CommandBuffer,
    ui_cmd: CommandBuffer,
    acquire_semaphore: vk::Semaphore,
    present_semaphore: vk::Semaphore,
    fence: vk::Fence,
    resources: FrameResources,
}

struct VertexLayouts {
    static_mesh: VertexLayout,
    skinned_mesh: VertexLayout,
    shadow: VertexLayout,
    blit: VertexLayout,
}

/// Everything the renderer needs from the caller for one frame.
pub struct FrameInput<'a> {
    pub list: &'a mut RenderList,
    pub camera: &'a Camera,
    pub lights: &'a Lights,
    /// Current framebuffer extent reported by the window.
    pub extent: vk::Extent2D,
    pub gui: Option<&'a mut dyn GuiRenderer>,
}

/// Frame graph: exactly three passes per frame (shadow depth, off-screen 3D,
/// UI to swapchain), recorded into three command buffers and submitted as
/// one batch.
pub struct Renderer {
    gpu: Arc<Gpu>,
    swapchain: Swapchain,
    pipelines: PipelineCache,
    frames: Vec<Frame>,
    frame_index: usize,
    targets: Option<RenderTargets>,
    shadow: ShadowTarget,
    layouts: VertexLayouts,
    device_config: DeviceConfig,
    pub config: RendererConfig,
    failed_pipelines: HashSet<u64>,
}

impl Renderer {
    pub fn new(
        gpu: Arc<Gpu>,
        surface: Surface,
        device_config: DeviceConfig,
        extent: vk::Extent2D,
    ) -> Result<Self> {
        let device = gpu.device().clone();
        let swapchain = Swapchain::new(
            gpu.instance(),
            &device,
            surface,
            gpu.deletion(),
            extent,
            device_config.vsync,
            device_config.color_space,
            kestrel_vk::gpu::IN_FLIGHT_FRAMES as u32,
        )?;
        let shadow = ShadowTarget::new(&gpu, device_config.shadow_map_resolution)?;

        let mut frames = Vec::new();
        for index in 0..kestrel_vk::gpu::IN_FLIGHT_FRAMES {
            let pool = CommandPool::new(&device, &format!("frame_{index}"))?;
            frames.push(Frame {
                shadow_cmd: pool.create_command_buffer("shadow")?,
                scene_cmd: pool.create_command_buffer("scene")?,
                ui_cmd: pool.create_command_buffer("ui")?,
                pool,
                acquire_semaphore: device.create_semaphore()?,
                present_semaphore: device.create_semaphore()?,
                fence: device.create_fence(true)?,
                resources: FrameResources::new(&device, gpu.allocator(), gpu.deletion())?,
            });
        }

        Ok(Self {
            pipelines: PipelineCache::new(&device),
            swapchain,
            frames,
            frame_index: 0,
            targets: None,
            shadow,
            layouts: VertexLayouts {
                static_mesh: vertex::static_layout(),
                skinned_mesh: vertex::skinned_layout(),
                shadow: vertex::shadow_layout(),
                blit: vertex::empty_layout(),
            },
            device_config,
            config: RendererConfig::default(),
            failed_pipelines: HashSet::new(),
            gpu,
        })
    }

    pub fn set_vsync(&mut self, vsync: kestrel_vk::Vsync, extent: vk::Extent2D) -> Result<()> {
        self.swapchain.refresh(extent, Some(vsync))
    }

    pub fn pipeline_cache(&self) -> &PipelineCache { &self.pipelines }

    pub fn render(&mut self, providers: &mut AssetProviders, input: FrameInput) -> Result<()> {
        let Self {
            gpu,
            swapchain,
            pipelines,
            frames,
            frame_index,
            targets,
            shadow,
            layouts,
            device_config,
            config,
            failed_pipelines,
        } = self;
        let device = gpu.device().clone();
        let frame = &mut frames[*frame_index];

        // The fence guards this frame's command buffers and per-frame pools;
        // advancing the deletion queue afterwards releases objects whose
        // last use was this frame, two frames ago.
        device.wait_for_fence(frame.fence)?;
        gpu.deletion().next();
        frame.resources.reset()?;

        let Some(acquired) = swapchain.acquire(input.extent, frame.acquire_semaphore)? else {
            return Ok(());
        };

        // Off-screen target tracks the framebuffer, scaled.
        let scale = config.render_scale.clamp(0.1, 2.0);
        let scene_extent = vk::Extent2D {
            width: ((input.extent.width as f32 * scale) as u32).max(1),
            height: ((input.extent.height as f32 * scale) as u32).max(1),
        };
        let samples = device_config.anti_aliasing;
        if !targets.as_ref().is_some_and(|t| t.matches(scene_extent, samples)) {
            *targets = Some(RenderTargets::new(gpu, scene_extent, samples)?);
        }
        let targets = targets.as_ref().expect("just created");

        input.list.sort(input.camera.position());

        let light_dir = input
            .lights
            .primary()
            .map(|light| light.direction_vector())
            .unwrap_or(Vec3::NEG_Y);
        let shadow_mat = shadow_matrix(input.camera.position(), light_dir, config);
        let gpu_lights: Vec<GpuDirLight> = input
            .lights
            .clamped()
            .iter()
            .map(|light| GpuDirLight {
                direction: light.direction_vector().extend(0.0),
                rgb: light.rgb.to_linear(),
            })
            .collect();
        let light_count = gpu_lights.len();
        let lights_bytes: Vec<u8> = if gpu_lights.is_empty() {
            bytemuck::bytes_of(&GpuDirLight::default()).to_vec()
        } else {
            bytemuck::cast_slice(&gpu_lights).to_vec()
        };

        let scene_view = GpuViewData {
            view_proj: input.camera.view_projection(scene_extent),
            shadow_mat,
            camera_pos: input.camera.position().extend(input.camera.exposure),
            shadow_dir: light_dir.extend(light_count as f32),
        };
        let ui_view = GpuViewData {
            view_proj: Camera::ui().view_projection(acquired.extent),
            shadow_mat: Mat4::IDENTITY,
            camera_pos: Vec4::new(0.0, 0.0, 0.0, 1.0),
            shadow_dir: Vec4::ZERO,
        };

        let shadow_sampler = gpu.sampler(kestrel_vk::SamplerDesc::shadow())?;
        let blit_sampler = gpu.sampler(kestrel_vk::SamplerDesc::default())?;

        let mut ctx = RecordContext {
            device: &device,
            pipelines,
            failed: failed_pipelines,
            resources: &mut frame.resources,
            providers,
            layouts,
        };

        // Pass 1: shadow depth. Opaque, unskinned draws only.
        {
            let cmd = &frame.shadow_cmd;
            cmd.reset()?;
            cmd.begin()?;
            cmd.pipeline_barrier(&[sync::image_memory_barrier(
                shadow.depth.handle(),
                vk::ImageAspectFlags::DEPTH,
                1,
                vk::PipelineStageFlags2::NONE,
                vk::AccessFlags2::NONE,
                vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS,
                vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            )]);
            let depth_attachment = depth_attachment(shadow.depth.view());
            cmd.begin_rendering(&[], Some(&depth_attachment), shadow.extent);
            cmd.set_viewport(shadow.extent);
            cmd.set_scissor(shadow.extent);
            if input.lights.primary().is_some() {
                for draw in &input.list.opaque {
                    if draw.joints.is_none() {
                        ctx.record_shadow_draw(cmd, draw, &shadow_mat)?;
                    }
                }
            }
            cmd.end_rendering();
            cmd.pipeline_barrier(&[sync::image_memory_barrier(
                shadow.depth.handle(),
                vk::ImageAspectFlags::DEPTH,
                1,
                vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
                vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
                vk::PipelineStageFlags2::FRAGMENT_SHADER,
                vk::AccessFlags2::SHADER_READ,
                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )]);
            cmd.end()?;
        }

        // Pass 2: 3D scene, off screen.
        {
            let cmd = &frame.scene_cmd;
            cmd.reset()?;
            cmd.begin()?;
            let mut barriers = vec![
                attachment_barrier(targets.color.handle(), vk::ImageAspectFlags::COLOR),
                sync::image_memory_barrier(
                    targets.depth.handle(),
                    vk::ImageAspectFlags::DEPTH,
                    1,
                    vk::PipelineStageFlags2::NONE,
                    vk::AccessFlags2::NONE,
                    vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS,
                    vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
                ),
            ];
            if let Some(resolve) = &targets.resolve {
                barriers.push(attachment_barrier(resolve.handle(), vk::ImageAspectFlags::COLOR));
            }
            cmd.pipeline_barrier(&barriers);

            let clear = config.clear_colour.to_linear();
            let mut color_attachment = vk::RenderingAttachmentInfo::default()
                .image_view(targets.color.view())
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(vk::ClearValue {
                    color: vk::ClearColorValue {
                        float32: clear.to_array(),
                    },
                });
            if let Some(resolve) = &targets.resolve {
                color_attachment = color_attachment
                    .resolve_mode(vk::ResolveModeFlags::AVERAGE)
                    .resolve_image_view(resolve.view())
                    .resolve_image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
            }
            let depth_attachment = depth_attachment(targets.depth.view());
            cmd.begin_rendering(&[color_attachment], Some(&depth_attachment), scene_extent);
            cmd.set_viewport(scene_extent);
            cmd.set_scissor(scene_extent);

            let pass = PassParams {
                color_format: COLOR_FORMAT,
                depth_format: DEPTH_FORMAT,
                samples,
                view_bytes: bytemuck::bytes_of(&scene_view),
                lights_bytes: &lights_bytes,
                shadow_view: shadow.depth.view(),
                shadow_sampler,
                default_mode: config.default_render_mode,
                force_depth_off: false,
            };
            for draw in input.list.opaque.iter().chain(&input.list.transparent) {
                ctx.record_draw(cmd, draw, &pass)?;
            }
            // Overlay draws follow opaque rules with depth testing disabled.
            let overlay_pass = PassParams {
                force_depth_off: true,
                ..pass
            };
            for draw in &input.list.overlay {
                ctx.record_draw(cmd, draw, &overlay_pass)?;
            }
            cmd.end_rendering();

            cmd.pipeline_barrier(&[sync::image_memory_barrier(
                targets.output().handle(),
                vk::ImageAspectFlags::COLOR,
                1,
                vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                vk::PipelineStageFlags2::FRAGMENT_SHADER,
                vk::AccessFlags2::SHADER_READ,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )]);
            cmd.end()?;
        }

        // Pass 3: UI onto the swapchain image, starting with a full-screen
        // sample of the 3D output.
        {
            let cmd = &frame.ui_cmd;
            cmd.reset()?;
            cmd.begin()?;
            cmd.pipeline_barrier(&[attachment_barrier(
                acquired.image,
                vk::ImageAspectFlags::COLOR,
            )]);
            let color_attachment = vk::RenderingAttachmentInfo::default()
                .image_view(acquired.view)
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(vk::ClearValue::default());
            cmd.begin_rendering(&[color_attachment], None, acquired.extent);
            cmd.set_viewport(acquired.extent);
            cmd.set_scissor(acquired.extent);

            ctx.record_blit(
                cmd,
                providers_blit_key(),
                targets.output().view(),
                blit_sampler,
                swapchain.format(),
            )?;

            let ui_pass = PassParams {
                color_format: swapchain.format(),
                depth_format: vk::Format::UNDEFINED,
                samples: vk::SampleCountFlags::TYPE_1,
                view_bytes: bytemuck::bytes_of(&ui_view),
                lights_bytes: &lights_bytes,
                shadow_view: shadow.depth.view(),
                shadow_sampler,
                default_mode: config.default_render_mode,
                force_depth_off: true,
            };
            for draw in &input.list.ui {
                ctx.record_draw(cmd, draw, &ui_pass)?;
            }

            if let Some(gui) = input.gui {
                gui.draw(&mut GuiContext {
                    cmd,
                    extent: acquired.extent,
                });
            }

            cmd.end_rendering();
            cmd.pipeline_barrier(&[sync::image_memory_barrier(
                acquired.image,
                vk::ImageAspectFlags::COLOR,
                1,
                vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                vk::PipelineStageFlags2::NONE,
                vk::AccessFlags2::NONE,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                vk::ImageLayout::PRESENT_SRC_KHR,
            )]);
            cmd.end()?;
        }

        let cmd_infos = [
            vk::CommandBufferSubmitInfo::default().command_buffer(frame.shadow_cmd.handle()),
            vk::CommandBufferSubmitInfo::default().command_buffer(frame.scene_cmd.handle()),
            vk::CommandBufferSubmitInfo::default().command_buffer(frame.ui_cmd.handle()),
        ];
        let waits = [vk::SemaphoreSubmitInfo::default()
            .semaphore(frame.acquire_semaphore)
            .stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)];
        let signals = [vk::SemaphoreSubmitInfo::default()
            .semaphore(frame.present_semaphore)
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];
        let submit = vk::SubmitInfo2::default()
            .command_buffer_infos(&cmd_infos)
            .wait_semaphore_infos(&waits)
            .signal_semaphore_infos(&signals);
        device.reset_fence(frame.fence)?;
        device.submit(&[submit], frame.fence)?;

        swapchain.present(acquired.index, frame.present_semaphore)?;
        *frame_index = (*frame_index + 1) % frames.len();
        Ok(())
    }

    /// Full teardown after a device wait; the Gpu itself is destroyed by its
    /// owner.
    pub fn destroy(&mut self) {
        self.gpu.device().wait_idle();
        self.pipelines.destroy();
        for frame in &mut self.frames {
            let device = self.gpu.device();
            unsafe {
                device.handle().destroy_semaphore(frame.acquire_semaphore, None);
                device.handle().destroy_semaphore(frame.present_semaphore, None);
                device.handle().destroy_fence(frame.fence, None);
            }
            frame.resources.descriptors.destroy();
            frame.resources.scratch.reset();
            frame.pool.destroy();
        }
        self.frames.clear();
        self.targets = None;
        self.swapchain.destroy();
    }
}

fn providers_blit_key() -> (Uri, Uri) {
    (Uri::from(FULLSCREEN_VERT), Uri::from(FULLSCREEN_FRAG))
}

fn write_material_set(
    resources: &mut FrameResources,
    providers: &mut AssetProviders,
    input: &mut ShaderInput,
    material: &Material,
    program: &kestrel_vk::pipeline::ShaderProgram,
) -> Result<()> {
    let mut bind_texture = |resources: &mut FrameResources,
                            providers: &mut AssetProviders,
                            input: &mut ShaderInput,
                            binding: u32,
                            uri: &Option<Uri>|
     -> Result<()> {
        if program.layout.binding(1, binding).is_none() {
            return Ok(());
        }
        // Unassigned slots sample white; failed loads sample magenta.
        let resolved = match uri {
            Some(uri) => {
                if providers.textures.load(uri).is_some() {
                    uri.clone()
                } else {
                    Uri::from(FALLBACK_TEXTURE)
                }
            }
            None => Uri::from(WHITE_TEXTURE),
        };
        let texture = providers
            .textures
            .find(&resolved)
            .ok_or_else(|| anyhow!(Error::NotFound(format!("texture {resolved}"))))?;
        input.update(
            resources,
            1,
            binding,
            texture.view(),
            texture.sampler,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
    };

    match &material.kind {
        MaterialKind::Lit(lit) | MaterialKind::Skinned(lit) => {
            bind_texture(resources, providers, input, 0, &lit.base_colour)?;
            bind_texture(resources, providers, input, 1, &lit.roughness_metallic)?;
            bind_texture(resources, providers, input, 2, &lit.emissive)?;
            if program.layout.binding(1, 3).is_some() {
                let params = GpuMaterialParams {
                    albedo: lit.albedo.to_linear(),
                    emissive: lit.emissive_factor.extend(lit.alpha_cutoff),
                    metal_rough: Vec4::new(
                        lit.metallic,
                        lit.roughness,
                        match lit.alpha_mode {
                            kestrel_asset::AlphaMode::Opaque => 0.0,
                            kestrel_asset::AlphaMode::Blend => 1.0,
                            kestrel_asset::AlphaMode::Mask => 2.0,
                        },
                        0.0,
                    ),
                };
                input.write(resources, 1, 3, bytemuck::bytes_of(&params))?;
            }
        }
        MaterialKind::Unlit(unlit) => {
            bind_texture(resources, providers, input, 0, &unlit.texture)?;
            if program.layout.binding(1, 1).is_some() {
                let tint = unlit.tint.to_linear();
                input.write(resources, 1, 1, bytemuck::bytes_of(&tint))?;
            }
        }
    }
    Ok(())
}

fn shadow_matrix(eye: Vec3, light_dir: Vec3, config: &RendererConfig) -> Mat4 {
    let up = if light_dir.dot(Vec3::Y).abs() > 0.99 {
        Vec3::Z
    } else {
        Vec3::Y
    };
    let view = Mat4::look_to_rh(eye, light_dir, up);
    let half = config.shadow_frustum;
    let projection = Mat4::orthographic_rh(
        -half,
        half,
        -half,
        half,
        config.shadow_plane.near,
        config.shadow_plane.far,
    );
    projection * view
}

fn depth_attachment(view: vk::ImageView) -> vk::RenderingAttachmentInfo<'static> {
    vk::RenderingAttachmentInfo::default()
        .image_view(view)
        .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .clear_value(vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        })
}

fn attachment_barrier(
    image: vk::Image,
    aspect: vk::ImageAspectFlags,
) -> vk::ImageMemoryBarrier2<'static> {
    sync::image_memory_barrier(
        image,
        aspect,
        1,
        vk::PipelineStageFlags2::NONE,
        vk::AccessFlags2::NONE,
        vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    )
}

/// Per-pass constants shared by every draw recorded in that pass.
#[derive(Clone, Copy)]
struct PassParams<'a> {
    color_format: vk::Format,
    depth_format: vk::Format,
    samples: vk::SampleCountFlags,
    view_bytes: &'a [u8],
    lights_bytes: &'a [u8],
    shadow_view: vk::ImageView,
    shadow_sampler: vk::Sampler,
    default_mode: RenderMode,
    force_depth_off: bool,
}

/// Mutable state threaded through draw recording.
struct RecordContext<'a> {
    device: &'a Device,
    pipelines: &'a mut PipelineCache,
    failed: &'a mut HashSet<u64>,
    resources: &'a mut FrameResources,
    providers: &'a mut AssetProviders,
    layouts: &'a VertexLayouts,
}

impl RecordContext<'_> {
    /// Resolves both shader stages and builds the pipeline. `Ok(None)` means
    /// the draw should be skipped (already logged, once per shader pair).
    fn resolve_pipeline(
        &mut self,
        vert_uri: &Uri,
        frag_uri: &Uri,
        layout: &VertexLayout,
        state: PipelineState,
    ) -> Result<Option<kestrel_vk::PipelineHandle>> {
        let pair_key = util::combine_hashes(
            util::hash_bytes(vert_uri.as_str().as_bytes()),
            util::hash_bytes(frag_uri.as_str().as_bytes()),
        );
        self.providers.shaders.load(vert_uri);
        self.providers.shaders.load(frag_uri);
        let (Some(vert), Some(frag)) = (
            self.providers.shaders.find(vert_uri),
            self.providers.shaders.find(frag_uri),
        ) else {
            if self.failed.insert(pair_key) {
                log::warn!("Missing shader(s) for {vert_uri} / {frag_uri}; draws skipped");
            }
            return Ok(None);
        };

        match self.pipelines.pipeline(
            (&vert.words, vert.hash),
            (&frag.words, frag.hash),
            layout,
            state,
        ) {
            Ok(handle) => Ok(Some(handle)),
            Err(e) => {
                if self.failed.insert(pair_key) {
                    log::warn!("Pipeline build failed for {vert_uri} / {frag_uri}: {e}");
                }
                Ok(None)
            }
        }
    }

    fn record_shadow_draw(
        &mut self,
        cmd: &CommandBuffer,
        draw: &DrawItem,
        light_vp: &Mat4,
    ) -> Result<()> {
        let state = PipelineState {
            color_format: vk::Format::UNDEFINED,
            depth_format: DEPTH_FORMAT,
            samples: vk::SampleCountFlags::TYPE_1,
            topology: draw.topology.to_vk(),
            polygon_mode: vk::PolygonMode::FILL,
            depth_test: true,
        };
        let (vert_uri, frag_uri) = (Uri::from(SHADOW_VERT), Uri::from(SHADOW_FRAG));
        let layout = self.layouts.shadow.clone();
        let Some(handle) = self.resolve_pipeline(&vert_uri, &frag_uri, &layout, state)? else {
            return Ok(());
        };
        let program = self.pipelines.program(handle.program).expect("cached");

        cmd.bind_pipeline(handle.pipeline);
        cmd.set_line_width(1.0);
        draw.geometry.bind_positions(cmd);

        let matrices: &[Mat4] = if draw.instances.is_empty() {
            std::slice::from_ref(&draw.matrix)
        } else {
            &draw.instances
        };
        for model in matrices {
            let mvp = *light_vp * *model;
            let mut input = ShaderInput::new(self.device, &program.layout, &program.set_layouts);
            input.write(self.resources, 0, 0, bytemuck::bytes_of(&mvp))?;
            input.bind(cmd, handle.layout);
            if draw.geometry.index_count > 0 {
                cmd.draw_indexed(draw.geometry.index_count, 1);
            } else {
                cmd.draw(draw.geometry.vertex_count, 1);
            }
        }
        Ok(())
    }

    fn record_draw(&mut self, cmd: &CommandBuffer, draw: &DrawItem, pass: &PassParams) -> Result<()> {
        let material_uri = if draw.material.is_empty() {
            Uri::from(DEFAULT_MATERIAL)
        } else {
            draw.material.clone()
        };
        let mut material = self
            .providers
            .materials
            .load(&material_uri)
            .cloned()
            .unwrap_or_default();
        if material.is_skinned() && draw.joints.is_none() {
            log::debug!("Skinned material {material_uri} on an unskinned draw; using default");
            material = Material::default();
        }

        let mode = material.render_mode.merged(pass.default_mode);
        let polygon_mode = match mode.polygon {
            PolygonMode::Line => vk::PolygonMode::LINE,
            PolygonMode::Point => vk::PolygonMode::POINT,
            PolygonMode::Fill | PolygonMode::Default => vk::PolygonMode::FILL,
        };
        let depth_test = mode.depth_test
            && !pass.force_depth_off
            && pass.depth_format != vk::Format::UNDEFINED;
        let state = PipelineState {
            color_format: pass.color_format,
            depth_format: pass.depth_format,
            samples: pass.samples,
            topology: draw.topology.to_vk(),
            polygon_mode,
            depth_test,
        };

        let skinned = material.is_skinned();
        let layout = if skinned {
            self.layouts.skinned_mesh.clone()
        } else {
            self.layouts.static_mesh.clone()
        };
        let Some(handle) = self.resolve_pipeline(
            &material.vertex_shader,
            &material.fragment_shader,
            &layout,
            state,
        )?
        else {
            return Ok(());
        };

        // Instance stream for static draws; written before descriptor work
        // so the scratch borrow ends early.
        let instance_handle = if skinned {
            None
        } else {
            let matrices: &[Mat4] = if draw.instances.is_empty() {
                std::slice::from_ref(&draw.matrix)
            } else {
                &draw.instances
            };
            let buffer = self.resources.scratch.allocate(
                (matrices.len() * std::mem::size_of::<Mat4>()) as u64,
                vk::BufferUsageFlags::VERTEX_BUFFER,
            )?;
            buffer.write_all(matrices)?;
            Some(buffer.handle())
        };

        let program = self.pipelines.program(handle.program).expect("cached");
        let mut input = ShaderInput::new(self.device, &program.layout, &program.set_layouts);

        // Set 0: scene constants, lights, shadow map.
        if program.layout.binding(0, 0).is_some() {
            input.write(self.resources, 0, 0, pass.view_bytes)?;
        }
        if program.layout.binding(0, 1).is_some() {
            input.write(self.resources, 0, 1, pass.lights_bytes)?;
        }
        if program.layout.binding(0, 2).is_some() {
            input.update(
                self.resources,
                0,
                2,
                pass.shadow_view,
                pass.shadow_sampler,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )?;
        }

        // Set 1: material textures + parameters.
        write_material_set(self.resources, self.providers, &mut input, &material, program)?;

        // Set 2: joint matrices for skinned draws.
        if let Some(joints) = &draw.joints {
            if program.layout.binding(2, 0).is_some() {
                input.write(self.resources, 2, 0, bytemuck::cast_slice(joints.as_slice()))?;
            }
        }

        cmd.bind_pipeline(handle.pipeline);
        cmd.set_line_width(mode.line_width.max(0.1));
        input.bind(cmd, handle.layout);
        draw.geometry.bind(cmd);
        if let Some(instances) = instance_handle {
            cmd.bind_vertex_buffers(4, &[instances], &[0]);
        }

        let instance_count = if skinned { 1 } else { draw.instance_count() };
        if draw.geometry.index_count > 0 {
            cmd.draw_indexed(draw.geometry.index_count, instance_count);
        } else {
            cmd.draw(draw.geometry.vertex_count, instance_count);
        }
        Ok(())
    }

    /// Full-screen sample of the 3D output into the current attachment.
    fn record_blit(
        &mut self,
        cmd: &CommandBuffer,
        (vert_uri, frag_uri): (Uri, Uri),
        source_view: vk::ImageView,
        sampler: vk::Sampler,
        color_format: vk::Format,
    ) -> Result<()> {
        let state = PipelineState {
            color_format,
            depth_format: vk::Format::UNDEFINED,
            samples: vk::SampleCountFlags::TYPE_1,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            depth_test: false,
        };
        let layout = self.layouts.blit.clone();
        let Some(handle) = self.resolve_pipeline(&vert_uri, &frag_uri, &layout, state)? else {
            return Ok(());
        };
        let program = self.pipelines.program(handle.program).expect("cached");

        let mut input = ShaderInput::new(self.device, &program.layout, &program.set_layouts);
        input.update(
            self.resources,
            0,
            0,
            source_view,
            sampler,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?;
        cmd.bind_pipeline(handle.pipeline);
        cmd.set_line_width(1.0);
        input.bind(cmd, handle.layout);
        cmd.draw(3, 1);
        Ok(())
    }
}
