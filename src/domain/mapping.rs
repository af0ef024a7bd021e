// ==========================================
// 报表结构导入系统 - 列映射模型
// ==========================================
// 职责: 源表头 → 目标字段 的映射条目
// 约定: 不强制目标字段唯一，多个源列指向同一字段时后者生效
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// 未映射哨兵值
pub const UNMAPPED: &str = "unmapped";

// ==========================================
// ColumnMapping - 列映射条目
// ==========================================
// 不变式: is_mapped == (target_field != "unmapped")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    pub source_header: String,
    pub target_field: String,
    pub is_mapped: bool,
}

impl ColumnMapping {
    /// 映射到目标字段；传入 "unmapped" 等价于 [`ColumnMapping::unmapped`]
    pub fn mapped(source_header: impl Into<String>, target_field: impl Into<String>) -> Self {
        let target_field = target_field.into();
        let is_mapped = target_field != UNMAPPED;
        Self {
            source_header: source_header.into(),
            target_field,
            is_mapped,
        }
    }

    pub fn unmapped(source_header: impl Into<String>) -> Self {
        Self {
            source_header: source_header.into(),
            target_field: UNMAPPED.to_string(),
            is_mapped: false,
        }
    }

    /// 已映射时返回目标字段
    pub fn target(&self) -> Option<&str> {
        if self.is_mapped {
            Some(self.target_field.as_str())
        } else {
            None
        }
    }
}

// ==========================================
// MappingValidation - 映射校验结果
// ==========================================
// 只检查必填字段覆盖；重复映射、可选字段缺失均不算错误
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingValidation {
    pub valid: bool,
    pub missing_required: BTreeSet<String>,
}

/// 有效映射视图: 目标字段 → 最后一个指向它的源表头
///
/// 原始映射序列保持不变（用于审计/撤销），这里只是派生视图。
pub fn effective_mapping(mapping: &[ColumnMapping]) -> BTreeMap<String, String> {
    let mut view = BTreeMap::new();
    for entry in mapping {
        if let Some(target) = entry.target() {
            view.insert(target.to_string(), entry.source_header.clone());
        }
    }
    view
}

/// 未被任何已映射条目使用的源表头（保持原顺序）
///
/// 导入时这些列会进入 unmappedColumns 审计通道。
pub fn unused_headers(headers: &[String], mapping: &[ColumnMapping]) -> Vec<String> {
    let used: BTreeSet<&str> = mapping
        .iter()
        .filter(|m| m.is_mapped)
        .map(|m| m.source_header.as_str())
        .collect();

    headers
        .iter()
        .filter(|h| !used.contains(h.as_str()))
        .cloned()
        .collect()
}
