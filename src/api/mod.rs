// ==========================================
// 报表结构导入系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口，供命令行或上层应用调用
// ==========================================

pub mod error;
pub mod import_api;
pub mod structure_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::{ImportApi, ImportApiResponse, ImportPreviewResponse};
pub use structure_api::{
    LineItemTreeNode, ReorderResponse, StructureApi, StructureTreeResponse, VisibleRow,
};
