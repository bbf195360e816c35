use {
    anyhow::{anyhow, Result},
    ash::vk,
    kestrel_core::Error,
    rspirv_reflect::{BindingCount, DescriptorInfo, Reflection},
    std::collections::BTreeMap,
};

/// One descriptor binding as seen by the shader interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BindingInfo {
    pub binding: u32,
    pub ty: vk::DescriptorType,
    pub count: u32,
    pub stages: vk::ShaderStageFlags,
}

/// Union of the descriptor interfaces of a vertex + fragment stage pair.
///
/// Sets are dense: gaps between used set numbers are filled with empty
/// binding lists so set N always lands at index N.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShaderLayout {
    pub sets: Vec<Vec<BindingInfo>>,
}

impl ShaderLayout {
    pub fn reflect(vert: &[u32], frag: &[u32]) -> Result<Self> {
        let vert_sets = reflect_stage(vert, vk::ShaderStageFlags::VERTEX)?;
        let frag_sets = reflect_stage(frag, vk::ShaderStageFlags::FRAGMENT)?;
        Self::merge(vert_sets, frag_sets)
    }

    fn merge(
        first: BTreeMap<u32, BTreeMap<u32, BindingInfo>>,
        second: BTreeMap<u32, BTreeMap<u32, BindingInfo>>,
    ) -> Result<Self> {
        let mut merged = first;
        for (set, bindings) in second {
            let target = merged.entry(set).or_default();
            for (binding, info) in bindings {
                match target.get_mut(&binding) {
                    Some(existing) => {
                        if existing.ty != info.ty {
                            return Err(anyhow!(Error::PipelineBuild(format!(
                                "descriptor (set {set}, binding {binding}) type mismatch \
                                 across stages: {:?} vs {:?}",
                                existing.ty, info.ty
                            ))));
                        }
                        existing.stages |= info.stages;
                        existing.count = existing.count.max(info.count);
                    }
                    None => {
                        target.insert(binding, info);
                    }
                }
            }
        }

        let set_count = merged.keys().next_back().map_or(0, |max| max + 1) as usize;
        let mut sets = vec![Vec::new(); set_count];
        for (set, bindings) in merged {
            // BTreeMap iteration keeps bindings sorted by binding number.
            sets[set as usize] = bindings.into_values().collect();
        }
        Ok(Self { sets })
    }

    pub fn binding(&self, set: u32, binding: u32) -> Option<&BindingInfo> {
        self.sets
            .get(set as usize)?
            .iter()
            .find(|info| info.binding == binding)
    }
}

fn reflect_stage(
    spirv: &[u32],
    stage: vk::ShaderStageFlags,
) -> Result<BTreeMap<u32, BTreeMap<u32, BindingInfo>>> {
    let bytes: &[u8] = bytemuck::cast_slice(spirv);
    let reflection = Reflection::new_from_spirv(bytes)
        .map_err(|e| anyhow!(Error::PipelineBuild(format!("SPIR-V reflection failed: {e}"))))?;
    let sets = reflection
        .get_descriptor_sets()
        .map_err(|e| anyhow!(Error::PipelineBuild(format!("SPIR-V reflection failed: {e}"))))?;

    let mut ret = BTreeMap::new();
    for (set, bindings) in sets {
        let mut out = BTreeMap::new();
        for (binding, info) in bindings {
            out.insert(
                binding,
                BindingInfo {
                    binding,
                    ty: descriptor_type(&info)?,
                    count: match info.binding_count {
                        BindingCount::One => 1,
                        BindingCount::StaticSized(count) => count as u32,
                        BindingCount::Unbounded => {
                            return Err(anyhow!(Error::PipelineBuild(format!(
                                "unbounded descriptor array at (set {set}, binding {binding})"
                            ))))
                        }
                    },
                    stages: stage,
                },
            );
        }
        ret.insert(set, out);
    }
    Ok(ret)
}

fn descriptor_type(info: &DescriptorInfo) -> Result<vk::DescriptorType> {
    use rspirv_reflect::DescriptorType as Dt;
    Ok(match info.ty {
        Dt::SAMPLER => vk::DescriptorType::SAMPLER,
        Dt::COMBINED_IMAGE_SAMPLER => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        Dt::SAMPLED_IMAGE => vk::DescriptorType::SAMPLED_IMAGE,
        Dt::STORAGE_IMAGE => vk::DescriptorType::STORAGE_IMAGE,
        Dt::UNIFORM_BUFFER => vk::DescriptorType::UNIFORM_BUFFER,
        Dt::STORAGE_BUFFER => vk::DescriptorType::STORAGE_BUFFER,
        Dt::UNIFORM_BUFFER_DYNAMIC => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        Dt::STORAGE_BUFFER_DYNAMIC => vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
        other => {
            return Err(anyhow!(Error::PipelineBuild(format!(
                "unsupported descriptor type {other:?} ({:?})",
                info.name
            ))))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(binding: u32, ty: vk::DescriptorType, stages: vk::ShaderStageFlags) -> BindingInfo {
        BindingInfo {
            binding,
            ty,
            count: 1,
            stages,
        }
    }

    fn stage_sets(
        entries: &[(u32, BindingInfo)],
    ) -> BTreeMap<u32, BTreeMap<u32, BindingInfo>> {
        let mut ret: BTreeMap<u32, BTreeMap<u32, BindingInfo>> = BTreeMap::new();
        for (set, info) in entries {
            ret.entry(*set).or_default().insert(info.binding, *info);
        }
        ret
    }

    #[test]
    fn merge_unions_stage_flags() {
        let vert = stage_sets(&[(
            0,
            binding(0, vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::VERTEX),
        )]);
        let frag = stage_sets(&[
            (0, binding(0, vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::FRAGMENT)),
            (
                0,
                binding(
                    1,
                    vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    vk::ShaderStageFlags::FRAGMENT,
                ),
            ),
        ]);

        let layout = ShaderLayout::merge(vert, frag).unwrap();
        assert_eq!(layout.sets.len(), 1);
        let shared = layout.binding(0, 0).unwrap();
        assert_eq!(shared.stages, vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT);
        let frag_only = layout.binding(0, 1).unwrap();
        assert_eq!(frag_only.stages, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn merge_fills_set_gaps() {
        let vert = stage_sets(&[(
            2,
            binding(0, vk::DescriptorType::STORAGE_BUFFER, vk::ShaderStageFlags::VERTEX),
        )]);
        let layout = ShaderLayout::merge(vert, BTreeMap::new()).unwrap();
        assert_eq!(layout.sets.len(), 3);
        assert!(layout.sets[0].is_empty());
        assert!(layout.sets[1].is_empty());
        assert_eq!(layout.sets[2].len(), 1);
    }

    #[test]
    fn merge_rejects_type_conflicts() {
        let vert = stage_sets(&[(
            0,
            binding(0, vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::VERTEX),
        )]);
        let frag = stage_sets(&[(
            0,
            binding(0, vk::DescriptorType::STORAGE_BUFFER, vk::ShaderStageFlags::FRAGMENT),
        )]);
        assert!(ShaderLayout::merge(vert, frag).is_err());
    }

    #[test]
    fn bindings_stay_sorted_by_number() {
        let vert = stage_sets(&[
            (0, binding(3, vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::VERTEX)),
            (0, binding(1, vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::VERTEX)),
            (0, binding(2, vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::VERTEX)),
        ]);
        let layout = ShaderLayout::merge(vert, BTreeMap::new()).unwrap();
        let numbers: Vec<u32> = layout.sets[0].iter().map(|info| info.binding).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }
}
