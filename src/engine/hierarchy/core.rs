// ==========================================
// 报表结构导入系统 - 层级重建引擎
// ==========================================
// 算法:
// 1) key → 记录下标（重复键以最后一条为准）
// 2) 父键存在于本批记录 → 挂到父节点下；否则（无父键 / 父键悬空）→ 根
// 3) 每层（含根）按 sibling_order 稳定升序
// ==========================================
// 每次调用全量重建，无增量路径；过滤后需对子集重新 build
// ==========================================

use crate::domain::line_item::ReportLineItem;
use std::collections::HashMap;
use tracing::{debug, warn};

// ==========================================
// HierarchyRecord - 层级记录
// ==========================================
// 实现者: ReportLineItem
pub trait HierarchyRecord {
    /// 结构内唯一键
    fn key(&self) -> &str;

    /// 父键（无父节点时为 None）
    fn parent_key(&self) -> Option<&str>;

    /// 兄弟排序键
    fn sibling_order(&self) -> i64;

    fn display_label(&self) -> &str {
        self.key()
    }

    /// 搜索匹配（默认: 键或标签包含搜索词，大小写不敏感；空白词全部匹配）
    fn matches_search(&self, term: &str) -> bool {
        let needle = term.trim().to_lowercase();
        needle.is_empty()
            || self.key().to_lowercase().contains(&needle)
            || self.display_label().to_lowercase().contains(&needle)
    }
}

impl HierarchyRecord for ReportLineItem {
    fn key(&self) -> &str {
        &self.line_item_key
    }

    fn parent_key(&self) -> Option<&str> {
        self.parent_key.as_deref().filter(|p| !p.trim().is_empty())
    }

    fn sibling_order(&self) -> i64 {
        self.sort_order
    }

    fn display_label(&self) -> &str {
        ReportLineItem::display_label(self)
    }

    fn matches_search(&self, term: &str) -> bool {
        ReportLineItem::matches_search(self, term)
    }
}

// ==========================================
// TreeNode - 树节点
// ==========================================
// 只引用输入记录，不复制；展开状态不在节点内（见 ExpansionState）
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode<'a, R> {
    pub record: &'a R,
    pub children: Vec<TreeNode<'a, R>>,
}

impl<'a, R: HierarchyRecord> TreeNode<'a, R> {
    pub fn key(&self) -> &'a str {
        self.record.key()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// 子树节点总数（含自身）
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(TreeNode::node_count).sum::<usize>()
    }
}

// ==========================================
// HierarchyBuild - 带诊断的构建结果
// ==========================================
// unreachable: 父链成环、从任何根都到不了的记录键（按输入顺序）
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyBuild<'a, R> {
    pub roots: Vec<TreeNode<'a, R>>,
    pub unreachable: Vec<&'a str>,
}

// ==========================================
// HierarchyBuilder - 层级构建器
// ==========================================
// 无状态，所有输入通过参数传入
#[derive(Debug, Default, Clone, Copy)]
pub struct HierarchyBuilder;

impl HierarchyBuilder {
    /// 创建新的层级构建器
    pub fn new() -> Self {
        Self
    }

    /// 构建森林（返回根节点列表）
    pub fn build<'a, R: HierarchyRecord>(&self, records: &'a [R]) -> Vec<TreeNode<'a, R>> {
        self.build_with_diagnostics(records).roots
    }

    /// 构建森林并报告不可达记录
    ///
    /// roots 与 build 的输出完全一致。
    pub fn build_with_diagnostics<'a, R: HierarchyRecord>(
        &self,
        records: &'a [R],
    ) -> HierarchyBuild<'a, R> {
        let mut index_by_key: HashMap<&str, usize> = HashMap::with_capacity(records.len());
        for (idx, record) in records.iter().enumerate() {
            index_by_key.insert(record.key(), idx);
        }

        // 每个节点只按声明的父键挂一次，不沿父链向上走
        let mut children_of: Vec<Vec<usize>> = vec![Vec::new(); records.len()];
        let mut root_indices = Vec::new();
        for (idx, record) in records.iter().enumerate() {
            match record.parent_key().and_then(|p| index_by_key.get(p)) {
                Some(&parent_idx) => children_of[parent_idx].push(idx),
                None => root_indices.push(idx),
            }
        }

        let mut visited = vec![false; records.len()];
        let roots = assemble(records, &root_indices, &children_of, &mut visited);

        let unreachable: Vec<&'a str> = records
            .iter()
            .zip(&visited)
            .filter(|(_, seen)| !**seen)
            .map(|(record, _)| record.key())
            .collect();

        debug!(
            records = records.len(),
            roots = roots.len(),
            unreachable = unreachable.len(),
            "层级重建完成"
        );
        if !unreachable.is_empty() {
            warn!(
                unreachable = unreachable.len(),
                keys = ?unreachable,
                "存在从根不可达的行项目（父链成环）"
            );
        }

        HierarchyBuild { roots, unreachable }
    }
}

// 从根向下组装；根之下不会进入环（环上节点的父节点都在环内）
fn assemble<'a, R: HierarchyRecord>(
    records: &'a [R],
    indices: &[usize],
    children_of: &[Vec<usize>],
    visited: &mut [bool],
) -> Vec<TreeNode<'a, R>> {
    let mut nodes: Vec<TreeNode<'a, R>> = Vec::with_capacity(indices.len());
    for &idx in indices {
        visited[idx] = true;
        let children = assemble(records, &children_of[idx], children_of, visited);
        nodes.push(TreeNode {
            record: &records[idx],
            children,
        });
    }

    nodes.sort_by_key(|node| node.record.sibling_order());
    nodes
}

/// 搜索过滤: 返回匹配记录的子集（保持输入顺序）
///
/// 子集中父节点被过滤掉的记录在重建时会成为根。
pub fn filter_records<R: HierarchyRecord + Clone>(records: &[R], term: &str) -> Vec<R> {
    records
        .iter()
        .filter(|record| record.matches_search(term))
        .cloned()
        .collect()
}
