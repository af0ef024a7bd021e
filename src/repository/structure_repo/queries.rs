use super::core::StructureRepository;
use crate::domain::line_item::{ReportLineItem, ReportStructure, SortOrderUpdate};
use crate::domain::upload::UnmappedColumnsRecord;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Result as SqliteResult, Row};

const STRUCTURE_COLUMNS: &str = r#"
    structure_id, structure_name, version, is_active, imported_structure_id,
    source_filename, line_items_count, created_at, updated_at
"#;

const LINE_ITEM_COLUMNS: &str = r#"
    line_item_uuid, structure_id, line_item_key, legacy_id,
    parent_key, is_parent_key_existing, sort_order, hierarchy_path,
    description,
    level_1_description, level_2_description, level_3_description,
    level_4_description, level_5_description, level_6_description,
    level_7_description,
    is_leaf, is_calculated, display, data_source
"#;

impl StructureRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 全部结构（最近更新在前）
    pub fn list_structures(&self) -> RepositoryResult<Vec<ReportStructure>> {
        let conn = self.get_conn()?;

        let sql = format!(
            "SELECT {} FROM report_structures ORDER BY updated_at DESC, structure_name",
            STRUCTURE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let structures = stmt
            .query_map([], map_structure_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(structures)
    }

    /// 按 structure_id 查询结构
    pub fn find_structure(&self, structure_id: &str) -> RepositoryResult<Option<ReportStructure>> {
        let conn = self.get_conn()?;

        let sql = format!(
            "SELECT {} FROM report_structures WHERE structure_id = ?1",
            STRUCTURE_COLUMNS
        );
        let structure = conn
            .query_row(&sql, params![structure_id], map_structure_row)
            .optional()?;

        Ok(structure)
    }

    /// 结构下全部行项目（按 sort_order 升序，同序按插入顺序）
    pub fn list_line_items(&self, structure_id: &str) -> RepositoryResult<Vec<ReportLineItem>> {
        let conn = self.get_conn()?;

        let sql = format!(
            "SELECT {} FROM report_line_items WHERE structure_id = ?1 ORDER BY sort_order, rowid",
            LINE_ITEM_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params![structure_id], map_line_item_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(items)
    }

    /// 指定版本的未映射列审计记录（按行序）
    pub fn list_unmapped_columns(
        &self,
        structure_id: &str,
        version: i64,
    ) -> RepositoryResult<Vec<UnmappedColumnsRecord>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT columns_json FROM unmapped_columns
            WHERE structure_id = ?1 AND version = ?2
            ORDER BY row_index
            "#,
        )?;
        let raw = stmt
            .query_map(params![structure_id, version], |row| row.get::<_, String>(0))?
            .collect::<SqliteResult<Vec<_>>>()?;

        let mut records = Vec::with_capacity(raw.len());
        for json in raw {
            records.push(serde_json::from_str(&json)?);
        }
        Ok(records)
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 批量回写排序（拖拽调整后的全局顺序）
    ///
    /// # 返回
    /// - Ok(rows): 被更新的行数
    /// - Err(NotFound): 结构不存在
    pub fn update_sort_orders(
        &self,
        structure_id: &str,
        updates: &[SortOrderUpdate],
    ) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction().map_err(RepositoryError::transaction)?;

        let exists = tx
            .query_row(
                "SELECT 1 FROM report_structures WHERE structure_id = ?1",
                params![structure_id],
                |_row| Ok(()),
            )
            .optional()?
            .is_some();
        if !exists {
            return Err(RepositoryError::NotFound {
                entity: "ReportStructure".to_string(),
                id: structure_id.to_string(),
            });
        }

        let mut rows = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE report_line_items SET sort_order = ?3
                 WHERE structure_id = ?1 AND line_item_key = ?2",
            )?;
            for update in updates {
                rows += stmt.execute(params![structure_id, update.line_item_key, update.sort_order])?;
            }
        }
        tx.execute(
            "UPDATE report_structures SET updated_at = ?2 WHERE structure_id = ?1",
            params![structure_id, Utc::now()],
        )?;

        tx.commit().map_err(RepositoryError::transaction)?;
        Ok(rows)
    }
}

fn map_structure_row(row: &Row) -> SqliteResult<ReportStructure> {
    Ok(ReportStructure {
        structure_id: row.get(0)?,
        structure_name: row.get(1)?,
        version: row.get(2)?,
        is_active: row.get(3)?,
        imported_structure_id: row.get(4)?,
        source_filename: row.get(5)?,
        line_items_count: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn map_line_item_row(row: &Row) -> SqliteResult<ReportLineItem> {
    Ok(ReportLineItem {
        line_item_uuid: row.get(0)?,
        structure_id: row.get(1)?,
        line_item_key: row.get(2)?,
        legacy_id: row.get(3)?,
        parent_key: row.get(4)?,
        is_parent_key_existing: row.get(5)?,
        sort_order: row.get(6)?,
        hierarchy_path: row.get(7)?,
        description: row.get(8)?,
        level_descriptions: [
            row.get(9)?,
            row.get(10)?,
            row.get(11)?,
            row.get(12)?,
            row.get(13)?,
            row.get(14)?,
            row.get(15)?,
        ],
        is_leaf: row.get(16)?,
        is_calculated: row.get(17)?,
        display: row.get(18)?,
        data_source: row.get(19)?,
    })
}
