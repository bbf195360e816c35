use {
    crate::node::{Node, NodeInfo, NodeTree},
    kestrel_asset::Skeleton,
    kestrel_core::{Id, Uri},
};

/// One skeleton animation rewritten to target live nodes instead of joint
/// indices.
#[derive(Clone, Debug)]
pub struct InstanceAnimation {
    /// Index into the source skeleton's animation list.
    pub source_index: usize,
    pub target_nodes: Vec<Id<Node>>,
}

/// A skeleton instantiated onto the node tree. Holds node ids only; the
/// nodes themselves are owned by the tree.
#[derive(Clone, Debug)]
pub struct SkeletonInstance {
    pub source: Uri,
    /// The parent node the skeleton was instantiated under.
    pub root: Id<Node>,
    /// One node per joint, indexed by joint index.
    pub joints: Vec<Id<Node>>,
    pub animations: Vec<InstanceAnimation>,
}

/// Adds one node per joint under `parent`, preserving local transforms and
/// the joint hierarchy (a joint without a parent attaches to `parent`), and
/// rewrites every animation target to the created node ids.
pub fn instantiate(
    nodes: &mut NodeTree,
    skeleton: &Skeleton,
    source: Uri,
    parent: Id<Node>,
) -> SkeletonInstance {
    let mut joints = Vec::with_capacity(skeleton.joints.len());
    for joint in &skeleton.joints {
        let id = nodes
            .add(
                NodeInfo::named(joint.name.clone())
                    .with_parent(parent)
                    .with_transform(joint.transform.clone()),
            )
            .id();
        joints.push(id);
    }
    // Joint parents may come after their children in index order, so the
    // hierarchy is established in a second pass.
    for (index, joint) in skeleton.joints.iter().enumerate() {
        if let Some(parent_index) = joint.parent {
            nodes.reparent(joints[index], Some(joints[parent_index]));
        }
    }

    let animations = skeleton
        .animations
        .iter()
        .enumerate()
        .map(|(source_index, animation)| InstanceAnimation {
            source_index,
            target_nodes: animation
                .target_joints
                .iter()
                .map(|joint| joints[*joint])
                .collect(),
        })
        .collect();

    SkeletonInstance {
        source,
        root: parent,
        joints,
        animations,
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        glam::Vec3,
        kestrel_asset::{
            AnimationSampler, Interpolator, Joint, Keyframe, SkeletalAnimation,
        },
        kestrel_core::Transform,
    };

    fn chain_skeleton() -> Skeleton {
        let mut transform = Transform::default();
        transform.set_position(Vec3::Y);
        Skeleton {
            name: "rig".into(),
            joints: vec![
                Joint {
                    name: "root".into(),
                    self_index: 0,
                    children: vec![1],
                    ..Default::default()
                },
                Joint {
                    name: "mid".into(),
                    transform,
                    self_index: 1,
                    parent: Some(0),
                    children: vec![2],
                    ..Default::default()
                },
                Joint {
                    name: "tip".into(),
                    self_index: 2,
                    parent: Some(1),
                    ..Default::default()
                },
            ],
            animation_uris: vec![],
            animations: vec![SkeletalAnimation {
                name: "wave".into(),
                samplers: vec![AnimationSampler::Translate(Interpolator {
                    keyframes: vec![Keyframe {
                        timestamp: 0.0,
                        value: Vec3::ZERO,
                    }],
                    interpolation: Default::default(),
                })],
                target_joints: vec![2],
            }],
        }
    }

    #[test]
    fn instantiation_creates_one_node_per_joint() {
        let mut nodes = NodeTree::default();
        let parent = nodes.add(NodeInfo::named("armature")).id();
        let before = nodes.len();

        let instance = instantiate(&mut nodes, &chain_skeleton(), Uri::from("rig.json"), parent);
        assert_eq!(instance.joints.len(), 3);
        assert_eq!(nodes.len(), before + 3);

        // Rootless joints hang off the given parent; the rest mirror the
        // joint hierarchy.
        assert_eq!(nodes.get(instance.joints[0]).unwrap().parent(), Some(parent));
        assert_eq!(
            nodes.get(instance.joints[1]).unwrap().parent(),
            Some(instance.joints[0]),
        );
        assert_eq!(
            nodes.get(instance.joints[2]).unwrap().parent(),
            Some(instance.joints[1]),
        );
        assert_eq!(instance.root, parent);
    }

    #[test]
    fn animation_targets_map_to_created_nodes() {
        let mut nodes = NodeTree::default();
        let parent = nodes.add(NodeInfo::named("armature")).id();
        let instance = instantiate(&mut nodes, &chain_skeleton(), Uri::from("rig.json"), parent);

        assert_eq!(instance.animations.len(), 1);
        assert_eq!(instance.animations[0].source_index, 0);
        assert_eq!(instance.animations[0].target_nodes, vec![instance.joints[2]]);
    }

    #[test]
    fn joint_local_transforms_are_preserved() {
        let mut nodes = NodeTree::default();
        let parent = nodes.add(NodeInfo::named("armature")).id();
        let instance = instantiate(&mut nodes, &chain_skeleton(), Uri::from("rig.json"), parent);
        let mid = nodes.get(instance.joints[1]).unwrap();
        assert_eq!(mid.transform.position(), Vec3::Y);
        assert_eq!(mid.name, "mid");
    }
}
