// ==========================================
// 报表结构导入系统 - 导入层
// ==========================================
// 职责: 电子表格 → 预览 → 列映射 → 行转换 → 上传载荷
// 支持: CSV, Excel (.xlsx/.xls)
// ==========================================

// 模块声明
pub mod column_mapper;
pub mod error;
pub mod file_parser;
pub mod row_transformer;
pub mod structure_importer_impl;
pub mod structure_importer_trait;

// 重导出核心类型
pub use error::{DecodeCause, ImportError, ImportResult};
pub use file_parser::{check_upload_size, CsvParser, ExcelParser, UniversalFileParser};
pub use row_transformer::{batch_rows, build_payload, collect_unmapped_columns, RowTransformer};
pub use structure_importer_impl::{
    default_structure_name, resolve_import_options, ImportSession, StructureImporterImpl,
};

// 重导出 Trait 接口
pub use structure_importer_trait::{FileParser, StructureReconciler};
