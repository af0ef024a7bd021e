// ==========================================
// 报表结构导入系统 - 行转换与分批
// ==========================================
// 阶段 2: 按已确认映射转换全量行，拆分 已映射字段 / 额外字段
// ==========================================
// 约定:
// - 不丢行、不校验值（必填覆盖已在映射阶段校验）
// - ordinal_position = 行在全量解析结果中的 0 基下标
// - 同一目标字段被多条映射指向时，后出现的条目生效
// - 排序字段缺失时回填 ordinal_position
// ==========================================

use crate::domain::mapping::ColumnMapping;
use crate::domain::schema::FIELD_SORT_ORDER;
use crate::domain::types::{is_blank, CellValue, RawRow};
use crate::domain::upload::{ImportOptions, TransformedRow, UnmappedColumnsRecord, UploadPayload};
use std::collections::HashSet;
use tracing::info;

/// 默认上传批大小
pub const DEFAULT_UPLOAD_BATCH_SIZE: usize = 100;

// ==========================================
// RowTransformer - 行转换器
// ==========================================
pub struct RowTransformer {
    ordering_field: String,
}

impl Default for RowTransformer {
    fn default() -> Self {
        Self::new(FIELD_SORT_ORDER)
    }
}

impl RowTransformer {
    /// 创建转换器
    ///
    /// # 参数
    /// - ordering_field: 缺失时用行序回填的排序字段
    pub fn new(ordering_field: impl Into<String>) -> Self {
        Self {
            ordering_field: ordering_field.into(),
        }
    }

    /// 转换全量行（1:1，保持文件顺序）
    pub fn transform(&self, full_rows: &[RawRow], mapping: &[ColumnMapping]) -> Vec<TransformedRow> {
        let mapped_headers: HashSet<&str> = mapping
            .iter()
            .filter(|m| m.is_mapped)
            .map(|m| m.source_header.as_str())
            .collect();

        let rows: Vec<TransformedRow> = full_rows
            .iter()
            .enumerate()
            .map(|(ordinal_position, row)| {
                self.transform_row(row, ordinal_position, mapping, &mapped_headers)
            })
            .collect();

        let unmapped_rows = rows.iter().filter(|r| !r.extra_fields.is_empty()).count();
        info!(rows = rows.len(), unmapped_rows, "行转换完成");

        rows
    }

    fn transform_row(
        &self,
        row: &RawRow,
        ordinal_position: usize,
        mapping: &[ColumnMapping],
        mapped_headers: &HashSet<&str>,
    ) -> TransformedRow {
        let mut mapped_fields = RawRow::new();
        for entry in mapping {
            if let Some(target) = entry.target() {
                // 行上没有该列时不生成键（预览与全量之间的表头漂移）
                if let Some(value) = row.get(&entry.source_header) {
                    mapped_fields.insert(target.to_string(), value.clone());
                }
            }
        }

        // 未映射列 + 映射里不存在的列，原样保留用于审计
        let extra_fields: RawRow = row
            .iter()
            .filter(|(header, _)| !mapped_headers.contains(header.as_str()))
            .map(|(header, value)| (header.clone(), value.clone()))
            .collect();

        let has_order = mapped_fields
            .get(&self.ordering_field)
            .is_some_and(|v| !is_blank(v));
        if !has_order {
            mapped_fields.insert(
                self.ordering_field.clone(),
                CellValue::from(ordinal_position as u64),
            );
        }

        TransformedRow {
            mapped_fields,
            extra_fields,
            ordinal_position,
        }
    }
}

/// 使用默认排序字段转换
pub fn transform(full_rows: &[RawRow], mapping: &[ColumnMapping]) -> Vec<TransformedRow> {
    RowTransformer::default().transform(full_rows, mapping)
}

/// 未映射列审计通道: 只收集 extra_fields 非空的行
pub fn collect_unmapped_columns(rows: &[TransformedRow]) -> Vec<UnmappedColumnsRecord> {
    rows.iter()
        .filter(|r| !r.extra_fields.is_empty())
        .map(|r| UnmappedColumnsRecord {
            row_index: r.ordinal_position,
            columns: r.extra_fields.clone(),
        })
        .collect()
}

/// 组装上传载荷
pub fn build_payload(
    filename: impl Into<String>,
    rows: &[TransformedRow],
    mapping: &[ColumnMapping],
    options: &ImportOptions,
) -> UploadPayload {
    UploadPayload {
        rows: rows.iter().map(TransformedRow::merged).collect(),
        filename: filename.into(),
        total_rows: rows.len(),
        mappings: mapping.to_vec(),
        unmapped_columns: collect_unmapped_columns(rows),
        overwrite_mode: options.overwrite_mode,
        target_structure_id: if options.overwrite_mode {
            options.target_structure_id.clone()
        } else {
            None
        },
        structure_name: options.structure_name.clone(),
        imported_structure_id: options.imported_structure_id.clone(),
    }
}

/// 按批大小切分（批大小为 0 时按 1 处理）
pub fn batch_rows<T>(rows: &[T], batch_size: usize) -> Vec<&[T]> {
    rows.chunks(batch_size.max(1)).collect()
}
