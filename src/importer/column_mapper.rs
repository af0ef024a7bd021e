// ==========================================
// 报表结构导入系统 - 列映射器
// ==========================================
// 阶段 1: 源表头 → 目标字段 自动建议 + 人工修改 + 覆盖校验
// ==========================================
// 自动建议为"首个命中"而非"最佳命中":
// - 表头归一化: 小写 + 去掉所有非字母数字字符
// - 正向: 目标字段名包含归一化表头
// - 反向: 归一化表头包含去掉下划线的目标字段名
// - 按 必填 → 可选 的枚举顺序取第一个命中字段
// ==========================================

use crate::domain::mapping::{ColumnMapping, MappingValidation};
use crate::domain::schema::TargetSchema;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// 表头归一化
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// 单个表头的首个命中字段
///
/// 归一化后为空的表头（全是符号或空白）不参与匹配，
/// 否则空串会被任何字段名"包含"。
pub fn propose_target<'s>(header: &str, schema: &'s TargetSchema) -> Option<&'s str> {
    let normalized = normalize_header(header);
    if normalized.is_empty() {
        return None;
    }

    schema.fields().find(|field| {
        let compact = field.replace('_', "");
        field.contains(normalized.as_str()) || normalized.contains(compact.as_str())
    })
}

/// 为全部表头生成映射建议（一个表头一条，保持表头顺序）
pub fn propose_mapping(headers: &[String], schema: &TargetSchema) -> Vec<ColumnMapping> {
    let mapping: Vec<ColumnMapping> = headers
        .iter()
        .map(|header| match propose_target(header, schema) {
            Some(field) => ColumnMapping::mapped(header.clone(), field),
            None => ColumnMapping::unmapped(header.clone()),
        })
        .collect();

    let mapped = mapping.iter().filter(|m| m.is_mapped).count();
    debug!(
        headers = headers.len(),
        mapped,
        unmapped = headers.len() - mapped,
        "映射建议生成完成"
    );

    mapping
}

/// 人工修改一条映射
///
/// 无条件覆盖该表头首条映射的目标字段，不检查是否与其他条目重复；
/// 传入 "unmapped" 即取消映射。表头不存在时原样返回。
pub fn set_target_field(
    mut mapping: Vec<ColumnMapping>,
    source_header: &str,
    target_field: &str,
) -> Vec<ColumnMapping> {
    match mapping.iter_mut().find(|m| m.source_header == source_header) {
        Some(entry) => *entry = ColumnMapping::mapped(source_header, target_field),
        None => warn!(source_header, "映射修改忽略: 表头不存在"),
    }
    mapping
}

/// 校验必填字段覆盖
///
/// 仅当每个必填字段都是某条已映射条目的目标时有效；
/// 可选字段缺失、重复映射都不算错误。
pub fn validate(mapping: &[ColumnMapping], schema: &TargetSchema) -> MappingValidation {
    let covered: BTreeSet<&str> = mapping.iter().filter_map(ColumnMapping::target).collect();

    let missing_required: BTreeSet<String> = schema
        .required()
        .iter()
        .filter(|f| !covered.contains(f.as_str()))
        .cloned()
        .collect();

    MappingValidation {
        valid: missing_required.is_empty(),
        missing_required,
    }
}
