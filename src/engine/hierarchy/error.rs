use thiserror::Error;

/// 层级引擎错误类型
///
/// 构建本身从不失败；只有重排与排序回写校验会返回错误。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HierarchyError {
    #[error("行项目未找到: {0}")]
    ItemNotFound(String),

    #[error("只能在同一父节点下调整顺序: {active_key} / {over_key}")]
    DifferentParents { active_key: String, over_key: String },

    #[error("排序载荷中键重复: {0}")]
    DuplicateKey(String),

    #[error("排序载荷无效: 应为 0..{expected_len} 连续且不重复, 实际 min={min}, max={max}, 去重后 {unique}")]
    InvalidSortOrder {
        expected_len: usize,
        min: i64,
        max: i64,
        unique: usize,
    },
}

/// Result 类型别名
pub type HierarchyResult<T> = Result<T, HierarchyError>;
