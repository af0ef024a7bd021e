// ==========================================
// 报表结构浏览API
// ==========================================
// 职责: 结构列表、层级树、搜索、展开视图、同级重排
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::line_item::{format_line_item_id, ReportLineItem, ReportStructure, SortOrderUpdate};
use crate::domain::upload::UnmappedColumnsRecord;
use crate::engine::hierarchy::{
    assign_sequential_sort_order, filter_records, flatten_preorder, reorder_within_parent,
    validate_sort_order_payload, ExpansionState, HierarchyBuilder, TreeNode,
};
use crate::repository::StructureRepository;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// 树节点视图（可序列化）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemTreeNode {
    pub key: String,
    pub label: String,
    pub sort_order: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_id: Option<String>,
    pub is_leaf: bool,
    pub display: bool,
    pub children: Vec<LineItemTreeNode>,
}

impl LineItemTreeNode {
    fn from_node(node: &TreeNode<'_, ReportLineItem>) -> Self {
        let item = node.record;
        Self {
            key: item.line_item_key.clone(),
            label: item.display_label().to_string(),
            sort_order: item.sort_order,
            display_id: item.legacy_id.map(format_line_item_id),
            is_leaf: item.is_leaf,
            display: item.display,
            children: node.children.iter().map(Self::from_node).collect(),
        }
    }
}

/// 层级树响应
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureTreeResponse {
    pub structure: ReportStructure,
    pub roots: Vec<LineItemTreeNode>,
    /// 参与构建的行项目数（搜索时为命中数）
    pub total_items: usize,
    /// 父链成环、不在树中的行项目键
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unreachable_keys: Vec<String>,
}

/// 展开视图中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleRow {
    pub key: String,
    pub label: String,
    pub depth: usize,
    pub has_children: bool,
    pub expanded: bool,
}

/// 排序回写响应
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderResponse {
    pub updated_rows: usize,
    pub sort_orders: Vec<SortOrderUpdate>,
}

/// 报表结构API
pub struct StructureApi {
    repo: StructureRepository,
    builder: HierarchyBuilder,
}

impl StructureApi {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            repo: StructureRepository::new(conn),
            builder: HierarchyBuilder::new(),
        }
    }

    /// 全部结构
    pub fn list_structures(&self) -> ApiResult<Vec<ReportStructure>> {
        Ok(self.repo.list_structures()?)
    }

    /// 单个结构
    ///
    /// # 返回
    /// - Err(NotFound): 结构不存在
    pub fn get_structure(&self, structure_id: &str) -> ApiResult<ReportStructure> {
        self.repo
            .find_structure(structure_id)?
            .ok_or_else(|| ApiError::NotFound(format!("报表结构 {}", structure_id)))
    }

    /// 完整层级树
    pub fn get_structure_tree(&self, structure_id: &str) -> ApiResult<StructureTreeResponse> {
        let structure = self.get_structure(structure_id)?;
        let items = self.repo.list_line_items(structure_id)?;
        Ok(self.tree_response(structure, &items))
    }

    /// 搜索后重建的层级树
    ///
    /// 命中项的父节点未命中时，命中项作为根出现。
    pub fn search_structure_tree(
        &self,
        structure_id: &str,
        term: &str,
    ) -> ApiResult<StructureTreeResponse> {
        let structure = self.get_structure(structure_id)?;
        let items = self.repo.list_line_items(structure_id)?;
        let subset = filter_records(&items, term);
        debug!(structure_id, term, hits = subset.len(), total = items.len(), "搜索过滤完成");
        Ok(self.tree_response(structure, &subset))
    }

    fn tree_response(
        &self,
        structure: ReportStructure,
        items: &[ReportLineItem],
    ) -> StructureTreeResponse {
        let build = self.builder.build_with_diagnostics(items);
        StructureTreeResponse {
            structure,
            roots: build.roots.iter().map(LineItemTreeNode::from_node).collect(),
            total_items: items.len(),
            unreachable_keys: build.unreachable.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// 按展开状态列出可见行（先序，带深度）
    pub fn visible_rows(
        &self,
        structure_id: &str,
        term: &str,
        expansion: &ExpansionState,
    ) -> ApiResult<Vec<VisibleRow>> {
        let items = filter_records(&self.repo.list_line_items(structure_id)?, term);
        let roots = self.builder.build(&items);

        let rows = expansion
            .visible(&roots)
            .into_iter()
            .map(|(depth, node)| VisibleRow {
                key: node.key().to_string(),
                label: node.record.display_label().to_string(),
                depth,
                has_children: node.has_children(),
                expanded: expansion.is_expanded(node.key()),
            })
            .collect();
        Ok(rows)
    }

    /// 同级拖拽重排并回写
    ///
    /// # 返回
    /// - Err(NotFound): 结构或行项目不存在
    /// - Err(BusinessRuleViolation): 两个行项目不在同一父节点下
    pub fn reorder_line_item(
        &self,
        structure_id: &str,
        active_key: &str,
        over_key: &str,
    ) -> ApiResult<ReorderResponse> {
        self.get_structure(structure_id)?;
        let items = self.repo.list_line_items(structure_id)?;
        let roots = self.builder.build(&items);

        let sort_orders = reorder_within_parent(&roots, active_key, over_key)?;
        let updated_rows = self.repo.update_sort_orders(structure_id, &sort_orders)?;

        info!(structure_id, active_key, over_key, updated_rows, "同级重排已保存");
        Ok(ReorderResponse {
            updated_rows,
            sort_orders,
        })
    }

    /// 按当前树形把 sort_order 重新编号为 0..n-1 并回写
    pub fn normalize_sort_order(&self, structure_id: &str) -> ApiResult<ReorderResponse> {
        self.get_structure(structure_id)?;
        let items = self.repo.list_line_items(structure_id)?;
        let roots = self.builder.build(&items);

        let sort_orders = assign_sequential_sort_order(&flatten_preorder(&roots));
        validate_sort_order_payload(&sort_orders)?;
        let updated_rows = self.repo.update_sort_orders(structure_id, &sort_orders)?;

        Ok(ReorderResponse {
            updated_rows,
            sort_orders,
        })
    }

    /// 未映射列审计记录（缺省为当前版本）
    pub fn list_unmapped_columns(
        &self,
        structure_id: &str,
        version: Option<i64>,
    ) -> ApiResult<Vec<UnmappedColumnsRecord>> {
        let version = match version {
            Some(v) => v,
            None => self.get_structure(structure_id)?.version,
        };
        Ok(self.repo.list_unmapped_columns(structure_id, version)?)
    }
}
