// ==========================================
// 报表结构导入系统 - 目标字段表
// ==========================================
// 职责: 目标字段划分为必填 / 可选两组
// 红线: 枚举顺序即自动映射的匹配顺序，不可调整
// ==========================================

use serde::{Deserialize, Serialize};

// ===== 报表行项目字段名 =====
pub const FIELD_ITEM_KEY: &str = "report_line_item_key";
pub const FIELD_DESCRIPTION: &str = "report_line_item_description";
pub const FIELD_PARENT_KEY: &str = "parent_report_line_item_key";
pub const FIELD_HIERARCHY_PATH: &str = "hierarchy_path";
pub const FIELD_IS_LEAF: &str = "is_leaf";
pub const FIELD_IS_CALCULATED: &str = "is_calculated";
pub const FIELD_DISPLAY: &str = "display";
pub const FIELD_DATA_SOURCE: &str = "data_source";
pub const FIELD_SORT_ORDER: &str = "sort_order";
pub const FIELD_LEGACY_ID: &str = "report_line_item_id";

/// 层级描述字段数量（level_1 .. level_7）
pub const LEVEL_DESCRIPTION_COUNT: usize = 7;

/// 第 n 层描述字段名（n 从 1 开始）
pub fn level_description_field(level: usize) -> String {
    format!("level_{}_line_item_description", level)
}

// ==========================================
// TargetSchema - 目标字段表
// ==========================================
// 映射会话期间不可变；作为参数显式传入，不做全局状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSchema {
    required: Vec<String>,
    optional: Vec<String>,
}

impl TargetSchema {
    /// 创建字段表
    ///
    /// 同名字段只保留第一次出现的位置（必填组优先）。
    pub fn new<R, O>(required: R, optional: O) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        let mut seen = std::collections::HashSet::new();
        let required: Vec<String> = required
            .into_iter()
            .map(Into::into)
            .filter(|f: &String| seen.insert(f.clone()))
            .collect();
        let optional: Vec<String> = optional
            .into_iter()
            .map(Into::into)
            .filter(|f: &String| seen.insert(f.clone()))
            .collect();
        Self { required, optional }
    }

    /// 报表行项目的参考字段表
    ///
    /// 1 个必填字段（行项目唯一键）+ 16 个可选字段，顺序与存储表一致。
    pub fn report_line_items() -> Self {
        let mut optional = vec![
            FIELD_DESCRIPTION.to_string(),
            FIELD_PARENT_KEY.to_string(),
            FIELD_HIERARCHY_PATH.to_string(),
        ];
        optional.extend((1..=LEVEL_DESCRIPTION_COUNT).map(level_description_field));
        optional.extend(
            [
                FIELD_IS_LEAF,
                FIELD_IS_CALCULATED,
                FIELD_DISPLAY,
                FIELD_DATA_SOURCE,
                FIELD_SORT_ORDER,
                FIELD_LEGACY_ID,
            ]
            .iter()
            .map(|f| f.to_string()),
        );

        Self::new([FIELD_ITEM_KEY], optional)
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    pub fn optional(&self) -> &[String] {
        &self.optional
    }

    /// 按 必填 → 可选 的枚举顺序遍历全部字段
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.required
            .iter()
            .chain(self.optional.iter())
            .map(String::as_str)
    }

    pub fn is_required(&self, field: &str) -> bool {
        self.required.iter().any(|f| f == field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields().any(|f| f == field)
    }

    pub fn len(&self) -> usize {
        self.required.len() + self.optional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TargetSchema {
    fn default() -> Self {
        Self::report_line_items()
    }
}
