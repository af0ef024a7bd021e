// ==========================================
// 报表结构导入系统 - 导入管道中间产物
// ==========================================
// 职责: 预览 / 转换行 / 上传载荷 / 对账结果
// 生命周期: 仅在一次导入会话内
// ==========================================

use crate::domain::mapping::ColumnMapping;
use crate::domain::types::{CellValue, RawRow, SourceFormat};
use serde::{Deserialize, Serialize};

// ==========================================
// RawPreview - 文件预览
// ==========================================
// 不变式: headers.len() == sample_rows[i].len()
// total_row_count: CSV 流式预览为估算值，工作簿为精确值（见 row_count_exact）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPreview {
    pub format: SourceFormat,
    pub headers: Vec<String>,
    pub sample_rows: Vec<Vec<CellValue>>,
    pub total_row_count: usize,
    pub row_count_exact: bool,
}

// ==========================================
// TransformedRow - 转换后的行
// ==========================================
// ordinal_position: 原文件中的 0 基行序，不重新排序
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformedRow {
    pub mapped_fields: RawRow,
    pub extra_fields: RawRow,
    pub ordinal_position: usize,
}

impl TransformedRow {
    /// 合并为上传行: extra_fields 打底，mapped_fields 同名覆盖
    pub fn merged(&self) -> RawRow {
        let mut row = self.extra_fields.clone();
        for (k, v) in &self.mapped_fields {
            row.insert(k.clone(), v.clone());
        }
        row
    }
}

// ==========================================
// UnmappedColumnsRecord - 未映射列审计记录
// ==========================================
// 序列化为 { "row_index": n, ...extra_fields }
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmappedColumnsRecord {
    pub row_index: usize,
    #[serde(flatten)]
    pub columns: RawRow,
}

// ==========================================
// ImportOptions - 导入选项
// ==========================================
// 新建: 需要结构名称；覆盖: 需要目标结构 ID
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOptions {
    pub overwrite_mode: bool,
    pub target_structure_id: Option<String>,
    pub structure_name: Option<String>,
    pub imported_structure_id: Option<String>,
}

impl ImportOptions {
    /// 新建结构
    pub fn new_structure(name: impl Into<String>) -> Self {
        Self {
            structure_name: Some(name.into()),
            ..Default::default()
        }
    }

    /// 覆盖已有结构（版本 +1）
    pub fn overwrite(target_structure_id: impl Into<String>) -> Self {
        Self {
            overwrite_mode: true,
            target_structure_id: Some(target_structure_id.into()),
            ..Default::default()
        }
    }
}

// ==========================================
// UploadPayload - 上传载荷
// ==========================================
// 交给对账方的 JSON 请求体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPayload {
    pub rows: Vec<RawRow>,
    pub filename: String,
    pub total_rows: usize,
    pub mappings: Vec<ColumnMapping>,
    pub unmapped_columns: Vec<UnmappedColumnsRecord>,
    pub overwrite_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_structure_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imported_structure_id: Option<String>,
}

// ==========================================
// ReconcileOutcome - 对账结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    pub structure_id: String,
    pub structure_name: String,
    pub version: i64,
    pub line_items_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merged_prefers_mapped_fields() {
        let mut mapped = RawRow::new();
        mapped.insert("report_line_item_key".to_string(), json!("A"));
        let mut extra = RawRow::new();
        extra.insert("Notes".to_string(), json!("n/a"));
        extra.insert("report_line_item_key".to_string(), json!("shadow"));

        let row = TransformedRow {
            mapped_fields: mapped,
            extra_fields: extra,
            ordinal_position: 0,
        };
        let merged = row.merged();
        assert_eq!(merged["report_line_item_key"], json!("A"));
        assert_eq!(merged["Notes"], json!("n/a"));
    }

    #[test]
    fn test_unmapped_record_flattens() {
        let mut columns = RawRow::new();
        columns.insert("Owner".to_string(), json!("finance"));
        let record = UnmappedColumnsRecord {
            row_index: 3,
            columns,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({ "row_index": 3, "Owner": "finance" }));
    }

    #[test]
    fn test_payload_omits_absent_target() {
        let payload = UploadPayload {
            rows: vec![],
            filename: "coa.csv".to_string(),
            total_rows: 0,
            mappings: vec![],
            unmapped_columns: vec![],
            overwrite_mode: false,
            target_structure_id: None,
            structure_name: Some("coa".to_string()),
            imported_structure_id: None,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("targetStructureId").is_none());
        assert_eq!(value["totalRows"], json!(0));
        assert_eq!(value["overwriteMode"], json!(false));
    }
}
