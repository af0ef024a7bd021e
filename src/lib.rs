// ==========================================
// 报表结构导入系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 流程: 文件解码 → 列映射 → 行转换/分批 → 对账落库 → 层级重建
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 对账落库与查询
pub mod repository;

// 引擎层 - 层级重建与排序
pub mod engine;

// 导入层 - 外部文件
pub mod importer;

// 配置层 - 导入配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    CellValue, ColumnMapping, ImportOptions, MappingValidation, RawPreview, RawRow,
    ReconcileOutcome, ReportLineItem, ReportStructure, SourceFormat, TargetSchema,
    TransformedRow, UploadPayload,
};

// 导入
pub use importer::{
    FileParser, ImportError, ImportResult, ImportSession, StructureImporterImpl,
    StructureReconciler, UniversalFileParser,
};

// 引擎
pub use engine::{HierarchyBuilder, HierarchyRecord, TreeNode};

// API
pub use api::{ImportApi, StructureApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "报表结构导入系统";
