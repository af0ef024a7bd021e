// ==========================================
// 报表结构导入系统 - 报表结构数据仓储
// ==========================================
// 职责: 上传载荷对账（新建 / 版本 +1）+ 行项目读取
// 存储: report_structures / report_line_items / unmapped_columns
// 红线: 对账在单个事务内完成，失败整体回滚
// ==========================================

mod coerce;
mod core;
mod queries;


pub use self::core::StructureRepository;
