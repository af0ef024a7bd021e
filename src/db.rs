// ==========================================
// 报表结构导入系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 建库: config_kv / report_structures / report_line_items / unmapped_columns
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::path::PathBuf;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 显式指定数据库路径的环境变量
pub const DB_PATH_ENV: &str = "REPORT_STRUCTURE_IMPORT_DB_PATH";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建表（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS report_structures (
            structure_id TEXT PRIMARY KEY,
            structure_name TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            is_active INTEGER NOT NULL DEFAULT 1,
            imported_structure_id TEXT,
            source_filename TEXT,
            line_items_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS report_line_items (
            line_item_uuid TEXT PRIMARY KEY,
            structure_id TEXT NOT NULL REFERENCES report_structures(structure_id) ON DELETE CASCADE,
            line_item_key TEXT NOT NULL,
            legacy_id INTEGER,
            parent_key TEXT,
            is_parent_key_existing INTEGER NOT NULL DEFAULT 0,
            sort_order INTEGER NOT NULL DEFAULT 0,
            hierarchy_path TEXT,
            description TEXT,
            level_1_description TEXT,
            level_2_description TEXT,
            level_3_description TEXT,
            level_4_description TEXT,
            level_5_description TEXT,
            level_6_description TEXT,
            level_7_description TEXT,
            is_leaf INTEGER NOT NULL DEFAULT 0,
            is_calculated INTEGER NOT NULL DEFAULT 0,
            display INTEGER NOT NULL DEFAULT 1,
            data_source TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_line_items_structure_order
            ON report_line_items(structure_id, sort_order);
        CREATE INDEX IF NOT EXISTS idx_line_items_structure_key
            ON report_line_items(structure_id, line_item_key);

        CREATE TABLE IF NOT EXISTS unmapped_columns (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            structure_id TEXT NOT NULL REFERENCES report_structures(structure_id) ON DELETE CASCADE,
            version INTEGER NOT NULL,
            row_index INTEGER NOT NULL,
            columns_json TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 获取默认数据库路径
///
/// # 返回
/// - 环境变量 REPORT_STRUCTURE_IMPORT_DB_PATH（非空时）
/// - 用户数据目录/report-structure-import/report_structures.db
/// - 兜底: ./report_structures.db
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./report_structures.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("report-structure-import");
        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("report_structures.db");
        }
    }

    path.to_string_lossy().to_string()
}
