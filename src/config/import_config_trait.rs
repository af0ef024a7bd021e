// ==========================================
// 报表结构导入系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入管道所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;

/// 配置读取结果
pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

pub use crate::importer::file_parser::DEFAULT_PREVIEW_ROWS;
pub use crate::importer::row_transformer::DEFAULT_UPLOAD_BATCH_SIZE;

/// 上传大小上限默认值（20 MB）
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入管道所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）, ImportSettings（固定值）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 预览数据行数
    ///
    /// # 默认值
    /// - 5
    async fn get_preview_rows(&self) -> ConfigResult<usize>;

    /// 上传文件大小上限（字节）
    ///
    /// # 默认值
    /// - 20971520
    async fn get_max_upload_bytes(&self) -> ConfigResult<u64>;

    /// 落库批大小
    ///
    /// # 默认值
    /// - 100
    async fn get_upload_batch_size(&self) -> ConfigResult<usize>;

    /// 一次性读取全部导入配置
    async fn load_import_settings(&self) -> ConfigResult<ImportSettings> {
        Ok(ImportSettings {
            preview_rows: self.get_preview_rows().await?,
            max_upload_bytes: self.get_max_upload_bytes().await?,
            upload_batch_size: self.get_upload_batch_size().await?,
        })
    }
}

// ==========================================
// ImportSettings - 已解析的导入配置
// ==========================================
// 一次导入会话内不可变，显式传入管道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSettings {
    pub preview_rows: usize,
    pub max_upload_bytes: u64,
    pub upload_batch_size: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            preview_rows: DEFAULT_PREVIEW_ROWS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            upload_batch_size: DEFAULT_UPLOAD_BATCH_SIZE,
        }
    }
}

#[async_trait]
impl ImportConfigReader for ImportSettings {
    async fn get_preview_rows(&self) -> ConfigResult<usize> {
        Ok(self.preview_rows)
    }

    async fn get_max_upload_bytes(&self) -> ConfigResult<u64> {
        Ok(self.max_upload_bytes)
    }

    async fn get_upload_batch_size(&self) -> ConfigResult<usize> {
        Ok(self.upload_batch_size)
    }
}
