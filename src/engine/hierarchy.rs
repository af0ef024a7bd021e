// ==========================================
// 报表结构导入系统 - 层级重建引擎
// ==========================================
// 红线: 父键找不到时降级为根节点，不报错
// 红线: 构建时不沿父链递归，环上节点只会"不可达"，不会死循环
// ==========================================
// 职责: 扁平行项目 → 森林；搜索过滤；展开状态；排序重排
// 输入: 已落库的行项目（只读）
// 输出: 引用输入记录的 TreeNode 森林（每次全量重建）
// ==========================================

mod core;
mod error;
mod expansion;
mod ordering;


pub use self::core::{filter_records, HierarchyBuild, HierarchyBuilder, HierarchyRecord, TreeNode};
pub use error::{HierarchyError, HierarchyResult};
pub use expansion::ExpansionState;
pub use ordering::{
    assign_sequential_sort_order, flatten_preorder, reorder_within_parent,
    validate_sort_order_payload,
};
