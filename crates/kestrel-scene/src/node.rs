use {
    crate::entity::Entity,
    glam::Mat4,
    kestrel_core::{
        id::IdAllocator,
        Id, Transform,
    },
    std::collections::HashMap,
};

/// One node of the scene hierarchy. The tree owns nodes by id; reparenting
/// preserves ids.
#[derive(Debug, Default)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub entity: Option<Id<Entity>>,
    id: Option<Id<Node>>,
    parent: Option<Id<Node>>,
    children: Vec<Id<Node>>,
}

impl Node {
    pub fn id(&self) -> Id<Node> { self.id.expect("node outside a tree") }

    pub fn parent(&self) -> Option<Id<Node>> { self.parent }

    pub fn children(&self) -> &[Id<Node>] { &self.children }
}

/// Creation parameters for [NodeTree::add].
#[derive(Debug, Default)]
pub struct NodeInfo {
    pub name: String,
    pub transform: Transform,
    pub parent: Option<Id<Node>>,
    pub entity: Option<Id<Entity>>,
}

impl NodeInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent: Id<Node>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }
}

/// Parent/child node graph.
///
/// Invariants: every non-root node's parent lists it among its children;
/// there are no cycles; ids strictly increase and are never reissued;
/// removing a node removes its whole subtree.
#[derive(Debug, Default)]
pub struct NodeTree {
    nodes: HashMap<Id<Node>, Node>,
    roots: Vec<Id<Node>>,
    allocator: IdAllocator<Node>,
}

impl NodeTree {
    pub fn add(&mut self, info: NodeInfo) -> &mut Node {
        let id = self.allocator.next();
        self.insert(id, info)
    }

    /// Inserts a node under an externally assigned id (scene deserialization)
    /// and reserves it so it is never reissued.
    pub fn add_with_id(&mut self, id: Id<Node>, info: NodeInfo) -> Option<&mut Node> {
        if self.nodes.contains_key(&id) {
            return None;
        }
        self.allocator.reserve(id);
        Some(self.insert(id, info))
    }

    fn insert(&mut self, id: Id<Node>, info: NodeInfo) -> &mut Node {
        let parent = info.parent.filter(|parent| self.nodes.contains_key(parent));
        match parent {
            Some(parent) => {
                self.nodes.get_mut(&parent).expect("checked").children.push(id)
            }
            None => self.roots.push(id),
        }
        self.nodes.insert(
            id,
            Node {
                name: info.name,
                transform: info.transform,
                entity: info.entity,
                id: Some(id),
                parent,
                children: Vec::new(),
            },
        );
        self.nodes.get_mut(&id).expect("just inserted")
    }

    pub fn get(&self, id: Id<Node>) -> Option<&Node> { self.nodes.get(&id) }

    pub fn get_mut(&mut self, id: Id<Node>) -> Option<&mut Node> { self.nodes.get_mut(&id) }

    pub fn contains(&self, id: Id<Node>) -> bool { self.nodes.contains_key(&id) }

    pub fn roots(&self) -> &[Id<Node>] { &self.roots }

    pub fn len(&self) -> usize { self.nodes.len() }

    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    pub fn for_each(&self, mut callback: impl FnMut(&Node)) {
        for node in self.nodes.values() {
            callback(node);
        }
    }

    /// Removes `id` and its entire subtree; returns the entity ids that were
    /// attached anywhere in it, for the caller to destroy.
    pub fn remove(&mut self, id: Id<Node>) -> Vec<Id<Entity>> {
        if !self.nodes.contains_key(&id) {
            return Vec::new();
        }
        self.detach(id);

        let mut entities = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children);
                entities.extend(node.entity);
            }
        }
        entities
    }

    fn detach(&mut self, id: Id<Node>) {
        let parent = self.nodes.get(&id).and_then(Node::parent);
        match parent {
            Some(parent) => {
                if let Some(parent) = self.nodes.get_mut(&parent) {
                    parent.children.retain(|child| *child != id);
                }
            }
            None => self.roots.retain(|root| *root != id),
        }
    }

    /// Moves `id` under `new_parent` (or to the roots), preserving its id
    /// and subtree. Rejects unknown ids and cycles.
    pub fn reparent(&mut self, id: Id<Node>, new_parent: Option<Id<Node>>) -> bool {
        if !self.nodes.contains_key(&id) {
            return false;
        }
        if let Some(new_parent) = new_parent {
            if !self.nodes.contains_key(&new_parent) || self.is_descendant(new_parent, id) {
                return false;
            }
        }

        self.detach(id);
        match new_parent {
            Some(parent) => self.nodes.get_mut(&parent).expect("checked").children.push(id),
            None => self.roots.push(id),
        }
        self.nodes.get_mut(&id).expect("checked").parent = new_parent;
        true
    }

    /// Whether `node` is `ancestor` itself or inside its subtree.
    fn is_descendant(&self, node: Id<Node>, ancestor: Id<Node>) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(Node::parent);
        }
        false
    }

    /// Reorders `id`'s children; the new order must be a permutation of the
    /// current children.
    pub fn reorder_children(&mut self, id: Id<Node>, order: &[Id<Node>]) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        if node.children.len() != order.len()
            || !order.iter().all(|child| node.children.contains(child))
            || !node.children.iter().all(|child| order.contains(child))
        {
            return false;
        }
        node.children = order.to_vec();
        true
    }

    /// Walks to the root multiplying local matrices; no caching.
    pub fn global_transform(&self, node: &Node) -> Mat4 {
        let mut matrix = node.transform.matrix();
        let mut current = node.parent;
        while let Some(id) = current {
            let Some(parent) = self.nodes.get(&id) else {
                break;
            };
            matrix = parent.transform.matrix() * matrix;
            current = parent.parent;
        }
        matrix
    }

    pub fn global_transform_of(&self, id: Id<Node>) -> Option<Mat4> {
        self.get(id).map(|node| self.global_transform(node))
    }
}

#[cfg(test)]
mod tests {
    use {super::*, glam::Vec3};

    fn tree_abc() -> (NodeTree, Id<Node>, Id<Node>, Id<Node>) {
        let mut tree = NodeTree::default();
        let a = tree.add(NodeInfo::named("a")).id();
        let b = tree.add(NodeInfo::named("b").with_parent(a)).id();
        let c = tree.add(NodeInfo::named("c").with_parent(b)).id();
        (tree, a, b, c)
    }

    #[test]
    fn parent_child_invariant_holds() {
        let (tree, a, b, c) = tree_abc();
        assert_eq!(tree.roots(), &[a]);
        assert_eq!(tree.get(a).unwrap().children(), &[b]);
        assert_eq!(tree.get(b).unwrap().children(), &[c]);
        assert_eq!(tree.get(c).unwrap().parent(), Some(b));
    }

    #[test]
    fn reparent_moves_subtree_once() {
        let (mut tree, a, b, c) = tree_abc();
        assert!(tree.reparent(c, Some(a)));
        assert_eq!(tree.get(a).unwrap().children(), &[b, c]);
        assert!(tree.get(b).unwrap().children().is_empty());
        assert_eq!(tree.get(c).unwrap().parent(), Some(a));
        assert_eq!(
            tree.get(a).unwrap().children().iter().filter(|child| **child == c).count(),
            1,
        );
    }

    #[test]
    fn reparent_rejects_cycles_and_unknown_ids() {
        let (mut tree, a, _b, c) = tree_abc();
        assert!(!tree.reparent(a, Some(c)), "reparenting onto a descendant");
        assert!(!tree.reparent(a, Some(a)), "reparenting onto itself");
        let ghost = Id::new(999).unwrap();
        assert!(!tree.reparent(ghost, Some(a)));
        assert!(!tree.reparent(a, Some(ghost)));
    }

    #[test]
    fn global_transform_multiplies_to_root() {
        let (mut tree, a, _b, c) = tree_abc();
        tree.get_mut(a).unwrap().transform.set_position(Vec3::new(1.0, 0.0, 0.0));
        tree.get_mut(c).unwrap().transform.set_position(Vec3::new(0.0, 2.0, 0.0));
        assert!(tree.reparent(c, Some(a)));

        let global = tree.global_transform_of(c).unwrap();
        let expected = tree.get(a).unwrap().transform.matrix()
            * tree.get(c).unwrap().transform.matrix();
        assert_eq!(global, expected);
        assert_eq!(global.w_axis.truncate(), Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn remove_drops_whole_subtree() {
        let (mut tree, a, b, c) = tree_abc();
        tree.remove(b);
        assert!(tree.contains(a));
        assert!(!tree.contains(b));
        assert!(!tree.contains(c));
        assert!(tree.get(a).unwrap().children().is_empty());
    }

    #[test]
    fn ids_strictly_increase_and_never_recycle(){
        let mut tree = NodeTree::default();
        let a = tree.add(NodeInfo::named("a")).id();
        tree.remove(a);
        let b = tree.add(NodeInfo::named("b")).id();
        assert!(b > a);
    }

    #[test]
    fn add_with_id_reserves_the_id_space() {
        let mut tree = NodeTree::default();
        let id = Id::new(10).unwrap();
        assert!(tree.add_with_id(id, NodeInfo::named("restored")).is_some());
        assert!(tree.add_with_id(id, NodeInfo::named("dup")).is_none());
        assert!(tree.add(NodeInfo::named("next")).id().value() > 10);
    }

    #[test]
    fn reorder_validates_membership() {
        let (mut tree, a, b, c) = tree_abc();
        assert!(tree.reparent(c, Some(a)));
        assert!(tree.reorder_children(a, &[c, b]));
        assert_eq!(tree.get(a).unwrap().children(), &[c, b]);
        assert!(!tree.reorder_children(a, &[b]));
        assert!(!tree.reorder_children(a, &[b, b]));
    }
}
