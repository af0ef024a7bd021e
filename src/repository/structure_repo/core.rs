use super::coerce::coerce_line_item;
use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::line_item::ReportLineItem;
use crate::domain::mapping::effective_mapping;
use crate::domain::upload::{ReconcileOutcome, UploadPayload};
use crate::importer::error::ImportResult;
use crate::importer::row_transformer::{batch_rows, DEFAULT_UPLOAD_BATCH_SIZE};
use crate::importer::structure_importer_trait::StructureReconciler;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

// ==========================================
// StructureRepository - 报表结构仓储
// ==========================================
// 红线: Repository 不做映射/层级逻辑，只做对账落库与数据映射
pub struct StructureRepository {
    conn: Arc<Mutex<Connection>>,
    batch_size: usize,
}

impl StructureRepository {
    /// 基于已有连接创建仓储（调用方负责建表）
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            conn,
            batch_size: DEFAULT_UPLOAD_BATCH_SIZE,
        }
    }

    /// 打开数据库文件并建表
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn open(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;
        Ok(Self::new(Arc::new(Mutex::new(conn))))
    }

    /// 设置落库批大小（0 按 1 处理）
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 对账
    // ==========================================

    /// 对账上传载荷
    ///
    /// # 流程
    /// 1) 新建: 生成 structure_id，版本 1
    ///    覆盖: 目标结构版本 +1，清空旧行项目
    /// 2) 上传行 → 行项目（只取已映射目标字段），按批插入
    /// 3) 未映射列逐行存 JSON
    /// 4) 回写 line_items_count，提交
    ///
    /// # 返回
    /// - Err(NotFound): 覆盖目标不存在
    /// - Err(ValidationError): 缺少结构名称 / 目标结构 ID
    pub fn reconcile_payload(&self, payload: &UploadPayload) -> RepositoryResult<ReconcileOutcome> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction().map_err(RepositoryError::transaction)?;
        let now = Utc::now();

        let (structure_id, structure_name, version) = if payload.overwrite_mode {
            Self::bump_structure_tx(&tx, payload, now)?
        } else {
            Self::create_structure_tx(&tx, payload, now)?
        };

        let mapped_targets: BTreeSet<String> =
            effective_mapping(&payload.mappings).into_keys().collect();
        let items: Vec<ReportLineItem> = payload
            .rows
            .iter()
            .enumerate()
            .filter_map(|(idx, row)| coerce_line_item(&structure_id, idx, row, &mapped_targets))
            .collect();

        let skipped = payload.rows.len() - items.len();
        if skipped > 0 {
            warn!(structure_id = %structure_id, skipped, "行项目键为空，已跳过");
        }

        let batches = batch_rows(&items, self.batch_size);
        for (batch_no, batch) in batches.iter().enumerate() {
            Self::insert_line_items_tx(&tx, batch)?;
            debug!(batch_no, size = batch.len(), "行项目批次写入完成");
        }

        for record in &payload.unmapped_columns {
            tx.execute(
                "INSERT INTO unmapped_columns (structure_id, version, row_index, columns_json)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    structure_id,
                    version,
                    record.row_index as i64,
                    serde_json::to_string(record)?,
                ],
            )?;
        }

        tx.execute(
            "UPDATE report_structures SET line_items_count = ?2 WHERE structure_id = ?1",
            params![structure_id, items.len() as i64],
        )?;

        tx.commit().map_err(RepositoryError::transaction)?;

        info!(
            structure_id = %structure_id,
            version,
            batches = batches.len(),
            line_items = items.len(),
            unmapped_rows = payload.unmapped_columns.len(),
            "结构对账完成"
        );

        Ok(ReconcileOutcome {
            structure_id,
            structure_name,
            version,
            line_items_count: items.len(),
        })
    }

    fn create_structure_tx(
        tx: &Transaction,
        payload: &UploadPayload,
        now: DateTime<Utc>,
    ) -> RepositoryResult<(String, String, i64)> {
        let structure_name = payload
            .structure_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| RepositoryError::ValidationError("新建结构缺少结构名称".to_string()))?
            .to_string();

        let structure_id = Uuid::new_v4().to_string();
        tx.execute(
            r#"
            INSERT INTO report_structures (
                structure_id, structure_name, version, is_active,
                imported_structure_id, source_filename, line_items_count,
                created_at, updated_at
            ) VALUES (?1, ?2, 1, 1, ?3, ?4, 0, ?5, ?5)
            "#,
            params![
                structure_id,
                structure_name,
                payload.imported_structure_id,
                payload.filename,
                now,
            ],
        )?;

        Ok((structure_id, structure_name, 1))
    }

    fn bump_structure_tx(
        tx: &Transaction,
        payload: &UploadPayload,
        now: DateTime<Utc>,
    ) -> RepositoryResult<(String, String, i64)> {
        let target = payload
            .target_structure_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                RepositoryError::ValidationError("覆盖模式缺少目标结构 ID".to_string())
            })?;

        let (current_name, current_version): (String, i64) = tx
            .query_row(
                "SELECT structure_name, version FROM report_structures WHERE structure_id = ?1",
                params![target],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "ReportStructure".to_string(),
                id: target.to_string(),
            })?;

        let structure_name = payload
            .structure_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or(current_name);
        let version = current_version + 1;

        tx.execute(
            "DELETE FROM report_line_items WHERE structure_id = ?1",
            params![target],
        )?;
        tx.execute(
            r#"
            UPDATE report_structures
            SET structure_name = ?2,
                version = ?3,
                source_filename = ?4,
                imported_structure_id = COALESCE(?5, imported_structure_id),
                updated_at = ?6
            WHERE structure_id = ?1
            "#,
            params![
                target,
                structure_name,
                version,
                payload.filename,
                payload.imported_structure_id,
                now,
            ],
        )?;

        Ok((target.to_string(), structure_name, version))
    }

    /// 在事务中插入一批行项目
    fn insert_line_items_tx(tx: &Transaction, items: &[ReportLineItem]) -> RepositoryResult<usize> {
        let mut stmt = tx.prepare(
            r#"
            INSERT INTO report_line_items (
                line_item_uuid, structure_id, line_item_key, legacy_id,
                parent_key, is_parent_key_existing, sort_order, hierarchy_path,
                description,
                level_1_description, level_2_description, level_3_description,
                level_4_description, level_5_description, level_6_description,
                level_7_description,
                is_leaf, is_calculated, display, data_source
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20
            )
            "#,
        )?;

        for item in items {
            let [l1, l2, l3, l4, l5, l6, l7] = &item.level_descriptions;
            stmt.execute(params![
                item.line_item_uuid,
                item.structure_id,
                item.line_item_key,
                item.legacy_id,
                item.parent_key,
                item.is_parent_key_existing,
                item.sort_order,
                item.hierarchy_path,
                item.description,
                l1,
                l2,
                l3,
                l4,
                l5,
                l6,
                l7,
                item.is_leaf,
                item.is_calculated,
                item.display,
                item.data_source,
            ])?;
        }

        Ok(items.len())
    }
}

// ==========================================
// StructureReconciler Trait 实现
// ==========================================
#[async_trait]
impl StructureReconciler for StructureRepository {
    async fn reconcile(&self, payload: &UploadPayload) -> ImportResult<ReconcileOutcome> {
        Ok(self.reconcile_payload(payload)?)
    }
}
