use {
    crate::{
        animation::SkeletalAnimation,
        codec::BinSkeletalAnimation,
        json::SkeletonDoc,
        provider::{AssetLoader, Payload},
        source::DataSource,
    },
    kestrel_core::{Transform, Uri},
    std::sync::Arc,
};

/// One joint of a skeleton. Indices are dense, `0..joints.len()`; for every
/// joint with `parent == Some(p)`, `joints[p].children` contains it.
#[derive(Clone, Debug, Default)]
pub struct Joint {
    pub name: String,
    pub transform: Transform,
    pub self_index: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

/// Skeleton asset: joint hierarchy plus its animations, loaded from the
/// animation uris recorded in the manifest.
#[derive(Clone, Debug, Default)]
pub struct Skeleton {
    pub name: String,
    pub joints: Vec<Joint>,
    pub animation_uris: Vec<Uri>,
    pub animations: Vec<SkeletalAnimation>,
}

pub type SkeletonProvider = crate::provider::Provider<SkeletonLoader>;

pub struct SkeletonLoader {
    source: Arc<dyn DataSource>,
}

impl SkeletonLoader {
    pub fn new(source: Arc<dyn DataSource>) -> Self { Self { source } }
}

impl AssetLoader for SkeletonLoader {
    type Asset = Skeleton;

    fn load_payload(&mut self, uri: &Uri) -> Payload<Skeleton> {
        let doc: SkeletonDoc = match self
            .source
            .read(uri)
            .and_then(|bytes| Ok(serde_json::from_slice(&bytes)?))
        {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("Failed to load skeleton {uri}: {e}");
                return Payload::missing(uri);
            }
        };

        let mut skeleton = match doc.into_skeleton() {
            Ok(skeleton) => skeleton,
            Err(e) => {
                log::warn!("Invalid skeleton {uri}: {e}");
                return Payload::missing(uri);
            }
        };

        let parent = uri.parent();
        let mut dependencies = vec![uri.clone()];
        for animation_uri in &skeleton.animation_uris {
            let resolved = parent.join(animation_uri.as_str());
            match self
                .source
                .read(&resolved)
                .and_then(|bytes| BinSkeletalAnimation::from_bytes(&bytes))
            {
                Ok(bin) => skeleton.animations.push(bin.into_animation()),
                Err(e) => log::warn!("Failed to load animation {resolved}: {e}"),
            }
            dependencies.push(resolved);
        }

        log::debug!(
            "Loaded skeleton {uri}: {} joint(s), {} animation(s)",
            skeleton.joints.len(),
            skeleton.animations.len(),
        );
        Payload {
            asset: Some(skeleton),
            dependencies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joint_invariant_holds_for_chain() {
        // 0 -> 1 -> 2
        let joints = vec![
            Joint {
                self_index: 0,
                children: vec![1],
                ..Default::default()
            },
            Joint {
                self_index: 1,
                parent: Some(0),
                children: vec![2],
                ..Default::default()
            },
            Joint {
                self_index: 2,
                parent: Some(1),
                ..Default::default()
            },
        ];
        for joint in &joints {
            if let Some(parent) = joint.parent {
                assert!(joints[parent].children.contains(&joint.self_index));
            }
        }
    }
}
