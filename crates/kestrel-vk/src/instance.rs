use {
    anyhow::Result,
    ash::{
        ext,
        vk::{self, Handle},
    },
    derive_more::Debug,
    std::ffi,
};

const APP_NAME: &ffi::CStr = c"Kestrel";
const VALIDATION_LAYER: &ffi::CStr = c"VK_LAYER_KHRONOS_validation";

#[derive(Clone, Debug)]
pub struct Instance {
    #[debug("{:#x}", handle.handle().as_raw())]
    pub(crate) handle: ash::Instance,
    #[debug(skip)]
    pub(crate) entry: ash::Entry,
}

impl Instance {
    /// `surface_extensions` come from the host window layer
    /// (`ash_window::enumerate_required_extensions`); headless callers pass
    /// an empty slice.
    pub fn new(validation: bool, surface_extensions: &[*const ffi::c_char]) -> Result<Self> {
        let entry = unsafe { ash::Entry::load() }?;

        let mut layers: Vec<*const ffi::c_char> = Vec::new();
        if validation {
            layers.push(VALIDATION_LAYER.as_ptr());
        }
        let mut extensions: Vec<*const ffi::c_char> = surface_extensions.to_vec();
        if validation {
            extensions.push(ext::debug_utils::NAME.as_ptr());
        }

        let app_info = vk::ApplicationInfo::default()
            .application_name(APP_NAME)
            .application_version(0)
            .engine_name(APP_NAME)
            .engine_version(0)
            .api_version(vk::make_api_version(0, 1, 3, 0));
        let instance_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layers)
            .enabled_extension_names(&extensions);

        let handle = unsafe { entry.create_instance(&instance_info, None)? };
        let instance = Instance { handle, entry };
        if validation {
            instance.install_debug_messenger()?;
        }

        Ok(instance)
    }

    pub fn handle(&self) -> &ash::Instance { &self.handle }

    pub fn entry(&self) -> &ash::Entry { &self.entry }

    fn install_debug_messenger(&self) -> Result<()> {
        let loader = ext::debug_utils::Instance::new(&self.entry, &self.handle);
        let info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(vulkan_debug_callback));
        unsafe { loader.create_debug_utils_messenger(&info, None) }?;
        Ok(())
    }
}

#[allow(clippy::missing_safety_doc)]
pub unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut ffi::c_void,
) -> vk::Bool32 {
    let message = ffi::CStr::from_ptr((*p_callback_data).p_message)
        .to_str()
        .unwrap_or("[Error parsing message data]");

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::error!("{}", message),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::warn!("{}", message),
        vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE => log::trace!("{}", message),
        _ => log::info!("{}", message),
    }

    vk::FALSE
}
