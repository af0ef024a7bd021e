// ==========================================
// 报表结构导入系统 - 导入管道 Trait
// ==========================================
// 职责: 定义文件解析与对账两个外部接缝（不包含实现）
// ==========================================

use crate::domain::types::RawRow;
use crate::domain::upload::{RawPreview, ReconcileOutcome, UploadPayload};
use crate::importer::error::ImportResult;
use async_trait::async_trait;
use std::path::Path;

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件解码（预览 + 全量）
// 实现者: CsvParser, ExcelParser, UniversalFileParser
pub trait FileParser: Send + Sync {
    /// 读取表头 + 前 max_rows 行数据
    ///
    /// # 返回
    /// - Ok(RawPreview): 预览（行数可能为估算值）
    /// - Err(UnsupportedFormat): 格式不支持或读取失败（附带底层原因）
    /// - Err(EmptyFile): 表头之后没有数据行
    fn preview(&self, file_path: &Path, max_rows: usize) -> ImportResult<RawPreview>;

    /// 全量解析为 表头 → 值 的行对象（跳过全空行）
    ///
    /// # 返回
    /// - Ok(Vec<RawRow>): 按文件顺序排列的行
    /// - Err(UnsupportedFormat): 格式不支持或读取失败
    fn parse_full(&self, file_path: &Path) -> ImportResult<Vec<RawRow>>;
}

// ==========================================
// StructureReconciler Trait
// ==========================================
// 用途: 上传载荷的对账方（新建结构 或 版本 +1）
// 实现者: StructureRepository（SQLite）
#[async_trait]
pub trait StructureReconciler: Send + Sync {
    /// 提交上传载荷
    ///
    /// # 返回
    /// - Ok(ReconcileOutcome): 落库后的结构 ID 与版本号
    /// - Err(UpstreamFailure): 对账方拒绝，原样向上传递
    async fn reconcile(&self, payload: &UploadPayload) -> ImportResult<ReconcileOutcome>;
}
