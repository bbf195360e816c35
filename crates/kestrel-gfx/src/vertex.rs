use kestrel_vk::{vk, VertexLayout};

fn stream_bindings() -> Vec<vk::VertexInputBindingDescription> {
    vec![
        // positions
        vk::VertexInputBindingDescription::default()
            .binding(0)
            .stride(12)
            .input_rate(vk::VertexInputRate::VERTEX),
        // rgbs
        vk::VertexInputBindingDescription::default()
            .binding(1)
            .stride(12)
            .input_rate(vk::VertexInputRate::VERTEX),
        // normals
        vk::VertexInputBindingDescription::default()
            .binding(2)
            .stride(12)
            .input_rate(vk::VertexInputRate::VERTEX),
        // uvs
        vk::VertexInputBindingDescription::default()
            .binding(3)
            .stride(8)
            .input_rate(vk::VertexInputRate::VERTEX),
    ]
}

fn stream_attributes() -> Vec<vk::VertexInputAttributeDescription> {
    vec![
        vk::VertexInputAttributeDescription::default()
            .location(0)
            .binding(0)
            .format(vk::Format::R32G32B32_SFLOAT),
        vk::VertexInputAttributeDescription::default()
            .location(1)
            .binding(1)
            .format(vk::Format::R32G32B32_SFLOAT),
        vk::VertexInputAttributeDescription::default()
            .location(2)
            .binding(2)
            .format(vk::Format::R32G32B32_SFLOAT),
        vk::VertexInputAttributeDescription::default()
            .location(3)
            .binding(3)
            .format(vk::Format::R32G32_SFLOAT),
    ]
}

/// Static geometry: the four packed streams plus a per-instance model
/// matrix at binding 4 (one column per attribute location).
pub fn static_layout() -> VertexLayout {
    let mut bindings = stream_bindings();
    bindings.push(
        vk::VertexInputBindingDescription::default()
            .binding(4)
            .stride(64)
            .input_rate(vk::VertexInputRate::INSTANCE),
    );
    let mut attributes = stream_attributes();
    for column in 0..4u32 {
        attributes.push(
            vk::VertexInputAttributeDescription::default()
                .location(4 + column)
                .binding(4)
                .format(vk::Format::R32G32B32A32_SFLOAT)
                .offset(column * 16),
        );
    }
    VertexLayout::new(bindings, attributes)
}

/// Skinned geometry: the four packed streams plus joint indices and weights
/// at bindings 4 and 5. Joint matrices arrive via a storage buffer, so there
/// is no instance stream.
pub fn skinned_layout() -> VertexLayout {
    let mut bindings = stream_bindings();
    bindings.push(
        vk::VertexInputBindingDescription::default()
            .binding(4)
            .stride(16)
            .input_rate(vk::VertexInputRate::VERTEX),
    );
    bindings.push(
        vk::VertexInputBindingDescription::default()
            .binding(5)
            .stride(16)
            .input_rate(vk::VertexInputRate::VERTEX),
    );
    let mut attributes = stream_attributes();
    attributes.push(
        vk::VertexInputAttributeDescription::default()
            .location(4)
            .binding(4)
            .format(vk::Format::R32G32B32A32_UINT),
    );
    attributes.push(
        vk::VertexInputAttributeDescription::default()
            .location(5)
            .binding(5)
            .format(vk::Format::R32G32B32A32_SFLOAT),
    );
    VertexLayout::new(bindings, attributes)
}

/// Position-only stream for the shadow pass.
pub fn shadow_layout() -> VertexLayout {
    VertexLayout::new(
        vec![vk::VertexInputBindingDescription::default()
            .binding(0)
            .stride(12)
            .input_rate(vk::VertexInputRate::VERTEX)],
        vec![vk::VertexInputAttributeDescription::default()
            .location(0)
            .binding(0)
            .format(vk::Format::R32G32B32_SFLOAT)],
    )
}

/// The full-screen blit generates its triangle in the vertex shader.
pub fn empty_layout() -> VertexLayout { VertexLayout::new(Vec::new(), Vec::new()) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_have_distinct_hashes() {
        let hashes = [
            static_layout().hash(),
            skinned_layout().hash(),
            shadow_layout().hash(),
            empty_layout().hash(),
        ];
        for (index, hash) in hashes.iter().enumerate() {
            for other in &hashes[index + 1..] {
                assert_ne!(hash, other);
            }
        }
    }

    #[test]
    fn layouts_are_stable() {
        assert_eq!(static_layout().hash(), static_layout().hash());
        assert_eq!(skinned_layout().hash(), skinned_layout().hash());
    }
}
