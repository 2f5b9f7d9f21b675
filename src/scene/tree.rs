//! Scene hierarchy.

use glam::Mat4;
use slotmap::{SlotMap, new_key_type};

use crate::errors::{PbrError, Result};
use crate::scene::mesh::Mesh;

new_key_type! {
    /// Key of a node inside a [`SceneTree`].
    pub struct NodeKey;
}

#[derive(Debug, Clone)]
pub enum SceneNode {
    /// Transforms every descendant.
    Matrix(Mat4),
    Mesh(Mesh),
}

#[derive(Debug, Clone)]
struct Entry {
    node: SceneNode,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
}

/// Arena of scene nodes linked by parent keys.
#[derive(Debug, Clone, Default)]
pub struct SceneTree {
    nodes: SlotMap<NodeKey, Entry>,
    roots: Vec<NodeKey>,
}

impl SceneTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `node` under `parent`, or as a new root.
    pub fn add_node(&mut self, node: SceneNode, parent: Option<NodeKey>) -> Result<NodeKey> {
        if let Some(parent) = parent
            && !self.nodes.contains_key(parent)
        {
            return Err(PbrError::UnknownNode);
        }
        let key = self.nodes.insert(Entry {
            node,
            parent,
            children: Vec::new(),
        });
        match parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(entry) => entry.children.push(key),
            None => self.roots.push(key),
        }
        Ok(key)
    }

    #[must_use]
    pub fn get(&self, key: NodeKey) -> Option<&SceneNode> {
        self.nodes.get(key).map(|entry| &entry.node)
    }

    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut SceneNode> {
        self.nodes.get_mut(key).map(|entry| &mut entry.node)
    }

    #[must_use]
    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes.get(key).and_then(|entry| entry.parent)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every mesh with its accumulated world matrix, depth first, children
    /// in insertion order.
    #[must_use]
    pub fn meshes(&self) -> Vec<(Mat4, &Mesh)> {
        let mut out = Vec::new();
        let mut stack: Vec<(NodeKey, Mat4)> = self
            .roots
            .iter()
            .rev()
            .map(|&key| (key, Mat4::IDENTITY))
            .collect();

        while let Some((key, parent_world)) = stack.pop() {
            let Some(entry) = self.nodes.get(key) else {
                continue;
            };
            let world = match &entry.node {
                SceneNode::Matrix(matrix) => parent_world * *matrix,
                SceneNode::Mesh(mesh) => {
                    out.push((parent_world, mesh));
                    parent_world
                }
            };
            stack.extend(entry.children.iter().rev().map(|&child| (child, world)));
        }
        out
    }
}
