use crate::domain::line_item::ReportLineItem;
use crate::domain::schema::{
    level_description_field, FIELD_DATA_SOURCE, FIELD_DESCRIPTION, FIELD_DISPLAY,
    FIELD_HIERARCHY_PATH, FIELD_IS_CALCULATED, FIELD_IS_LEAF, FIELD_ITEM_KEY, FIELD_LEGACY_ID,
    FIELD_PARENT_KEY, FIELD_SORT_ORDER,
};
use crate::domain::types::{cell_as_flag, cell_as_i64, cell_as_text, RawRow};
use std::collections::BTreeSet;

// ==========================================
// 上传行 → 行项目 的字段转换
// ==========================================
// 规则:
// - 键/文本字段转文本（整数不带 .0），空值为 None
// - 标志接受 bool / "true"/"yes"/"1"/"x"，display 缺省为 true
// - sort_order 缺省取行下标
// - 键为空的行不生成行项目
// - 只读取 mapped_targets 中的字段（sort_order 由转换器回填，始终读取），
//   与目标字段同名的未映射列只进审计通道
pub(super) fn coerce_line_item(
    structure_id: &str,
    row_index: usize,
    row: &RawRow,
    mapped_targets: &BTreeSet<String>,
) -> Option<ReportLineItem> {
    let cell = |field: &str| {
        if field == FIELD_SORT_ORDER || mapped_targets.contains(field) {
            row.get(field)
        } else {
            None
        }
    };
    let text = |field: &str| cell(field).and_then(cell_as_text);
    let flag = |field: &str| cell(field).and_then(cell_as_flag);

    let key = text(FIELD_ITEM_KEY)?;
    let mut item = ReportLineItem::new(structure_id, key);

    item.description = text(FIELD_DESCRIPTION);
    item.parent_key = text(FIELD_PARENT_KEY);
    item.is_parent_key_existing = item.parent_key.is_some();
    item.hierarchy_path = text(FIELD_HIERARCHY_PATH);
    for (idx, slot) in item.level_descriptions.iter_mut().enumerate() {
        *slot = text(&level_description_field(idx + 1));
    }

    item.is_leaf = flag(FIELD_IS_LEAF).unwrap_or(false);
    item.is_calculated = flag(FIELD_IS_CALCULATED).unwrap_or(false);
    item.display = flag(FIELD_DISPLAY).unwrap_or(true);
    item.data_source = text(FIELD_DATA_SOURCE);

    item.sort_order = cell(FIELD_SORT_ORDER)
        .and_then(cell_as_i64)
        .unwrap_or(row_index as i64);
    item.legacy_id = cell(FIELD_LEGACY_ID).and_then(cell_as_i64);

    Some(item)
}
