// ==========================================
// 报表结构导入系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、字段表
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod line_item;
pub mod mapping;
pub mod schema;
pub mod types;
pub mod upload;

// 重导出核心类型
pub use line_item::{format_line_item_id, ReportLineItem, ReportStructure, SortOrderUpdate};
pub use mapping::{effective_mapping, unused_headers, ColumnMapping, MappingValidation, UNMAPPED};
pub use schema::TargetSchema;
pub use types::{CellValue, RawRow, SourceFormat};
pub use upload::{
    ImportOptions, RawPreview, ReconcileOutcome, TransformedRow, UnmappedColumnsRecord,
    UploadPayload,
};
