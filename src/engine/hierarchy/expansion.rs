use super::core::{HierarchyRecord, TreeNode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ==========================================
// ExpansionState - 展开状态
// ==========================================
// 独立于树结构保存；重建树（如搜索词变化）后按键继续生效
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionState {
    expanded: BTreeSet<String>,
}

impl ExpansionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_expanded(&self, key: &str) -> bool {
        self.expanded.contains(key)
    }

    /// 切换展开状态，返回切换后的状态
    pub fn toggle(&mut self, key: &str) -> bool {
        if self.expanded.remove(key) {
            false
        } else {
            self.expanded.insert(key.to_string());
            true
        }
    }

    pub fn expand(&mut self, key: &str) {
        self.expanded.insert(key.to_string());
    }

    pub fn collapse(&mut self, key: &str) {
        self.expanded.remove(key);
    }

    /// 展开森林中所有带子节点的节点
    pub fn expand_all<R: HierarchyRecord>(&mut self, roots: &[TreeNode<'_, R>]) {
        for node in roots {
            if node.has_children() {
                self.expanded.insert(node.key().to_string());
                self.expand_all(&node.children);
            }
        }
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }

    /// 可见节点及其深度（先序；折叠节点的子孙不可见，根深度为 0）
    pub fn visible<'a, 't, R: HierarchyRecord>(
        &self,
        roots: &'t [TreeNode<'a, R>],
    ) -> Vec<(usize, &'t TreeNode<'a, R>)> {
        let mut out = Vec::new();
        self.collect_visible(roots, 0, &mut out);
        out
    }

    fn collect_visible<'a, 't, R: HierarchyRecord>(
        &self,
        nodes: &'t [TreeNode<'a, R>],
        depth: usize,
        out: &mut Vec<(usize, &'t TreeNode<'a, R>)>,
    ) {
        for node in nodes {
            out.push((depth, node));
            if self.is_expanded(node.key()) {
                self.collect_visible(&node.children, depth + 1, out);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.expanded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }
}
