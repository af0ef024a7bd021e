// ==========================================
// 报表结构导入系统 - 报表结构领域模型
// ==========================================
// 职责: 报表结构（带版本）与报表行项目
// 用途: 导入层写入（经对账落库），层级引擎只读
// ==========================================

use crate::domain::schema::LEVEL_DESCRIPTION_COUNT;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// ReportStructure - 报表结构
// ==========================================
// 同名结构覆盖导入时版本号 +1，structure_id 不变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportStructure {
    pub structure_id: String,                 // 结构 ID（UUID）
    pub structure_name: String,               // 结构名称
    pub version: i64,                         // 版本号（从 1 开始）
    pub is_active: bool,                      // 是否为当前启用结构
    pub imported_structure_id: Option<String>, // 源系统中的结构标识
    pub source_filename: Option<String>,      // 最近一次导入的源文件名
    pub line_items_count: i64,                // 行项目数量
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// ReportLineItem - 报表行项目
// ==========================================
// 层级重建的输入记录；key 在同一结构内应唯一，重复时层级查找以最后一条为准
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportLineItem {
    // ===== 标识 =====
    pub line_item_uuid: String,        // 行项目 UUID
    pub structure_id: String,          // 所属结构
    pub line_item_key: String,         // 行项目唯一键
    pub legacy_id: Option<i64>,        // 旧版数值 ID

    // ===== 层级 =====
    pub parent_key: Option<String>,    // 父行项目键
    pub is_parent_key_existing: bool,  // 导入时是否给出父键
    pub sort_order: i64,               // 兄弟排序键（导入时取文件行序）
    pub hierarchy_path: Option<String>,

    // ===== 描述 =====
    pub description: Option<String>,
    pub level_descriptions: [Option<String>; LEVEL_DESCRIPTION_COUNT],

    // ===== 标志 =====
    pub is_leaf: bool,
    pub is_calculated: bool,
    pub display: bool,
    pub data_source: Option<String>,
}

impl ReportLineItem {
    /// 创建只有键的行项目（其余字段取默认值）
    pub fn new(structure_id: impl Into<String>, line_item_key: impl Into<String>) -> Self {
        Self {
            line_item_uuid: uuid::Uuid::new_v4().to_string(),
            structure_id: structure_id.into(),
            line_item_key: line_item_key.into(),
            legacy_id: None,
            parent_key: None,
            is_parent_key_existing: false,
            sort_order: 0,
            hierarchy_path: None,
            description: None,
            level_descriptions: Default::default(),
            is_leaf: false,
            is_calculated: false,
            display: true,
            data_source: None,
        }
    }

    /// 显示标签: 描述优先，缺失时用键
    pub fn display_label(&self) -> &str {
        match self.description.as_deref() {
            Some(d) if !d.trim().is_empty() => d,
            _ => &self.line_item_key,
        }
    }

    /// 搜索匹配（键 / 描述 / 层级路径 / 各层描述，大小写不敏感）
    ///
    /// 空白搜索词匹配所有记录。
    pub fn matches_search(&self, term: &str) -> bool {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }

        let contains = |s: &str| s.to_lowercase().contains(&needle);

        contains(&self.line_item_key)
            || self.description.as_deref().is_some_and(contains)
            || self.hierarchy_path.as_deref().is_some_and(contains)
            || self
                .level_descriptions
                .iter()
                .flatten()
                .any(|d| contains(d.as_str()))
    }
}

// ==========================================
// SortOrderUpdate - 排序回写
// ==========================================
// 拖拽调整后的全局顺序，按键回写 sort_order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrderUpdate {
    pub line_item_key: String,
    pub sort_order: i64,
}

// ==========================================
// 拼接行项目 ID
// ==========================================
// 旧版数值 ID = 结构 ID * 10000 + 结构内序号

/// 拼接 ID 的结构位权
pub const LINE_ITEM_ID_FACTOR: i64 = 10_000;

/// 拼接: 结构 ID + 结构内序号
pub fn concat_line_item_id(structure_id: i64, local_id: i64) -> i64 {
    structure_id * LINE_ITEM_ID_FACTOR + local_id
}

/// 拆出结构 ID（向下取整）
pub fn structure_id_of(line_item_id: i64) -> i64 {
    line_item_id.div_euclid(LINE_ITEM_ID_FACTOR)
}

/// 拆出结构内序号
pub fn local_id_of(line_item_id: i64) -> i64 {
    line_item_id.rem_euclid(LINE_ITEM_ID_FACTOR)
}

/// 是否带结构前缀
pub fn is_concatenated_id(line_item_id: i64) -> bool {
    line_item_id >= LINE_ITEM_ID_FACTOR
}

/// 显示格式: 带前缀时为 "结构.0000"，否则原样
pub fn format_line_item_id(line_item_id: i64) -> String {
    if !is_concatenated_id(line_item_id) {
        return line_item_id.to_string();
    }
    format!(
        "{}.{:04}",
        structure_id_of(line_item_id),
        local_id_of(line_item_id)
    )
}
