// ==========================================
// 报表结构导入系统 - 引擎层
// ==========================================
// 职责: 纯计算逻辑（层级重建、排序），不拼 SQL
// 红线: Engine 不访问数据库，输入输出均为内存数据
// ==========================================

pub mod hierarchy;

// 重导出核心引擎
pub use hierarchy::{
    assign_sequential_sort_order, filter_records, flatten_preorder, reorder_within_parent,
    validate_sort_order_payload, ExpansionState, HierarchyBuild, HierarchyBuilder,
    HierarchyError, HierarchyRecord, HierarchyResult, TreeNode,
};
