// ==========================================
// 报表结构导入系统 - 配置管理器
// ==========================================
// 职责: 导入配置加载、查询、覆写
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::{
    ConfigResult, ImportConfigReader, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PREVIEW_ROWS,
    DEFAULT_UPLOAD_BATCH_SIZE,
};
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(value)
    }

    /// 写入 global scope 配置（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;

        Ok(())
    }

    /// 读取并解析配置，缺失或无法解析时返回默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T: FromStr + Copy,
    {
        let Some(raw) = self.get_global_config_value(key)? else {
            return Ok(default);
        };

        match raw.trim().parse::<T>() {
            Ok(value) => Ok(value),
            Err(_) => {
                tracing::warn!(config_key = key, raw_value = %raw, "配置值格式错误，使用默认值");
                Ok(default)
            }
        }
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_preview_rows(&self) -> ConfigResult<usize> {
        self.get_parsed_or_default(config_keys::IMPORT_PREVIEW_ROWS, DEFAULT_PREVIEW_ROWS)
    }

    async fn get_max_upload_bytes(&self) -> ConfigResult<u64> {
        self.get_parsed_or_default(config_keys::IMPORT_MAX_UPLOAD_BYTES, DEFAULT_MAX_UPLOAD_BYTES)
    }

    async fn get_upload_batch_size(&self) -> ConfigResult<usize> {
        self.get_parsed_or_default(
            config_keys::IMPORT_UPLOAD_BATCH_SIZE,
            DEFAULT_UPLOAD_BATCH_SIZE,
        )
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 预览
    pub const IMPORT_PREVIEW_ROWS: &str = "import_preview_rows";

    // 上传前置检查
    pub const IMPORT_MAX_UPLOAD_BYTES: &str = "import_max_upload_bytes";

    // 落库
    pub const IMPORT_UPLOAD_BATCH_SIZE: &str = "import_upload_batch_size";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImportSettings;
    use tempfile::NamedTempFile;

    fn manager() -> (NamedTempFile, ConfigManager) {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let conn = open_sqlite_connection(&path).unwrap();
        crate::db::init_schema(&conn).unwrap();
        drop(conn);
        (file, ConfigManager::new(&path).unwrap())
    }

    #[tokio::test]
    async fn test_defaults_when_absent() {
        let (_file, config) = manager();
        let settings = config.load_import_settings().await.unwrap();
        assert_eq!(settings, ImportSettings::default());
    }

    #[tokio::test]
    async fn test_override_and_fallback() {
        let (_file, config) = manager();
        config
            .set_global_config_value(config_keys::IMPORT_UPLOAD_BATCH_SIZE, "25")
            .unwrap();
        config
            .set_global_config_value(config_keys::IMPORT_PREVIEW_ROWS, "many")
            .unwrap();

        assert_eq!(config.get_upload_batch_size().await.unwrap(), 25);
        assert_eq!(config.get_preview_rows().await.unwrap(), DEFAULT_PREVIEW_ROWS);

        config
            .set_global_config_value(config_keys::IMPORT_UPLOAD_BATCH_SIZE, "50")
            .unwrap();
        assert_eq!(config.get_upload_batch_size().await.unwrap(), 50);
    }
}
