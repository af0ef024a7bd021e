// ==========================================
// 报表结构导入系统 - 全局排序
// ==========================================
// 全局 sort_order = 森林先序遍历下标（0..n-1 连续）
// 拖拽重排只允许同一父节点下的兄弟之间
// ==========================================

use super::core::{HierarchyRecord, TreeNode};
use super::error::{HierarchyError, HierarchyResult};
use crate::domain::line_item::SortOrderUpdate;
use std::collections::HashSet;
use tracing::{debug, warn};

/// 先序展开森林（保持当前兄弟顺序）
pub fn flatten_preorder<'a, R: HierarchyRecord>(roots: &[TreeNode<'a, R>]) -> Vec<&'a R> {
    let mut out = Vec::new();
    flatten_into(roots, &mut out);
    out
}

fn flatten_into<'a, R: HierarchyRecord>(nodes: &[TreeNode<'a, R>], out: &mut Vec<&'a R>) {
    for node in nodes {
        out.push(node.record);
        flatten_into(&node.children, out);
    }
}

/// 按给定顺序重新编号为 0..n-1
pub fn assign_sequential_sort_order<R: HierarchyRecord>(ordered: &[&R]) -> Vec<SortOrderUpdate> {
    ordered
        .iter()
        .enumerate()
        .map(|(idx, record)| SortOrderUpdate {
            line_item_key: record.key().to_string(),
            sort_order: idx as i64,
        })
        .collect()
}

/// 校验排序回写载荷
///
/// 键不得重复；sort_order 必须恰好覆盖 0..n-1（不重复、无空洞）。空载荷视为有效。
pub fn validate_sort_order_payload(updates: &[SortOrderUpdate]) -> HierarchyResult<()> {
    if updates.is_empty() {
        return Ok(());
    }

    let mut keys = HashSet::with_capacity(updates.len());
    for update in updates {
        if !keys.insert(update.line_item_key.as_str()) {
            return Err(HierarchyError::DuplicateKey(update.line_item_key.clone()));
        }
    }

    let orders: HashSet<i64> = updates.iter().map(|u| u.sort_order).collect();
    let min = updates.iter().map(|u| u.sort_order).min().unwrap_or_default();
    let max = updates.iter().map(|u| u.sort_order).max().unwrap_or_default();
    let expected_len = updates.len();

    if orders.len() != expected_len || min != 0 || max != expected_len as i64 - 1 {
        warn!(expected_len, min, max, unique = orders.len(), "排序载荷无效");
        return Err(HierarchyError::InvalidSortOrder {
            expected_len,
            min,
            max,
            unique: orders.len(),
        });
    }

    Ok(())
}

/// 同父节点内拖拽重排
///
/// 把 active_key 移到 over_key 当前所在位置（其余兄弟顺延），
/// 返回整棵森林新的全局顺序。
///
/// # 返回
/// - Err(ItemNotFound): 任一键不在森林中
/// - Err(DifferentParents): 两个节点不是兄弟
pub fn reorder_within_parent<R: HierarchyRecord>(
    roots: &[TreeNode<'_, R>],
    active_key: &str,
    over_key: &str,
) -> HierarchyResult<Vec<SortOrderUpdate>> {
    let active_path =
        locate(roots, active_key).ok_or_else(|| HierarchyError::ItemNotFound(active_key.to_string()))?;
    let over_path =
        locate(roots, over_key).ok_or_else(|| HierarchyError::ItemNotFound(over_key.to_string()))?;

    let (active_idx, parent_path) = split_path(&active_path);
    let (over_idx, over_parent_path) = split_path(&over_path);
    if parent_path != over_parent_path {
        return Err(HierarchyError::DifferentParents {
            active_key: active_key.to_string(),
            over_key: over_key.to_string(),
        });
    }

    let mut ordered = Vec::new();
    let mut path = Vec::new();
    flatten_reordered(roots, &mut path, parent_path, active_idx, over_idx, &mut ordered);

    let updates = assign_sequential_sort_order(&ordered);
    validate_sort_order_payload(&updates)?;

    debug!(
        active_key,
        over_key,
        from = active_idx,
        to = over_idx,
        items = updates.len(),
        "同级重排完成"
    );
    Ok(updates)
}

// 先序查找，返回各层下标组成的路径
fn locate<R: HierarchyRecord>(nodes: &[TreeNode<'_, R>], key: &str) -> Option<Vec<usize>> {
    for (idx, node) in nodes.iter().enumerate() {
        if node.key() == key {
            return Some(vec![idx]);
        }
        if let Some(mut path) = locate(&node.children, key) {
            path.insert(0, idx);
            return Some(path);
        }
    }
    None
}

fn split_path(path: &[usize]) -> (usize, &[usize]) {
    match path.split_last() {
        Some((&last, parent)) => (last, parent),
        None => (0, path),
    }
}

fn flatten_reordered<'a, R: HierarchyRecord>(
    nodes: &[TreeNode<'a, R>],
    path: &mut Vec<usize>,
    move_parent: &[usize],
    from: usize,
    to: usize,
    out: &mut Vec<&'a R>,
) {
    let mut order: Vec<usize> = (0..nodes.len()).collect();
    if path.as_slice() == move_parent {
        let moved = order.remove(from);
        order.insert(to, moved);
    }

    for idx in order {
        let node = &nodes[idx];
        out.push(node.record);
        path.push(idx);
        flatten_reordered(&node.children, path, move_parent, from, to, out);
        path.pop();
    }
}
