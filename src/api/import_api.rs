// ==========================================
// 报表结构导入API
// ==========================================
// 职责: 预览 → 调整映射 → 提交
// 会话由调用方持有，API 本身无状态
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, ImportConfigReader};
use crate::domain::mapping::{ColumnMapping, MappingValidation, UNMAPPED};
use crate::domain::schema::TargetSchema;
use crate::domain::upload::{ImportOptions, RawPreview, ReconcileOutcome};
use crate::importer::{ImportSession, StructureImporterImpl, UniversalFileParser};
use crate::repository::StructureRepository;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::info;

/// 预览响应
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreviewResponse {
    pub session_id: String,
    pub filename: String,
    pub preview: RawPreview,
    /// 当前映射（每个表头一条）
    pub mapping: Vec<ColumnMapping>,
    /// 目标字段 → 生效的源表头
    pub effective_mapping: BTreeMap<String, String>,
    /// 提交后将作为未映射列保存的表头
    pub unused_headers: Vec<String>,
    pub validation: MappingValidation,
    pub default_structure_name: String,
}

/// 导入API响应
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportApiResponse {
    #[serde(flatten)]
    pub outcome: ReconcileOutcome,
    /// 未映射列表头
    pub unmapped_headers: Vec<String>,
    /// 导入耗时（毫秒）
    pub elapsed_ms: i64,
}

/// 导入API
pub struct ImportApi {
    conn: Arc<Mutex<Connection>>,
    schema: TargetSchema,
}

impl ImportApi {
    /// 创建新的ImportApi实例（参考字段集）
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self::with_schema(conn, TargetSchema::report_line_items())
    }

    pub fn with_schema(conn: Arc<Mutex<Connection>>, schema: TargetSchema) -> Self {
        Self { conn, schema }
    }

    pub fn schema(&self) -> &TargetSchema {
        &self.schema
    }

    /// 创建导入器（批大小取自配置）
    async fn create_importer(
        &self,
    ) -> ApiResult<StructureImporterImpl<StructureRepository, ConfigManager>> {
        let config = ConfigManager::from_connection(self.conn.clone())
            .map_err(|e| ApiError::InternalError(format!("创建配置管理器失败: {}", e)))?;
        let batch_size = config
            .get_upload_batch_size()
            .await
            .map_err(|e| ApiError::InternalError(format!("读取批大小失败: {}", e)))?;

        let repo = StructureRepository::new(self.conn.clone()).with_batch_size(batch_size);
        Ok(StructureImporterImpl::new(
            repo,
            config,
            self.schema.clone(),
            Box::new(UniversalFileParser),
        ))
    }

    /// 打开导入会话（预览 + 建议映射）
    ///
    /// # 返回
    /// - Ok(ImportSession): 会话，由调用方持有直到提交
    /// - Err(FileNotFound / FileTooLarge / UnsupportedFile / EmptyFile)
    pub async fn open_session(&self, file_path: &str) -> ApiResult<ImportSession> {
        if file_path.trim().is_empty() {
            return Err(ApiError::InvalidInput("文件路径不能为空".to_string()));
        }
        let importer = self.create_importer().await?;
        Ok(importer.open_session(Path::new(file_path)).await?)
    }

    /// 会话的预览视图
    pub fn describe_session(&self, session: &ImportSession) -> ImportPreviewResponse {
        ImportPreviewResponse {
            session_id: session.session_id().to_string(),
            filename: session.filename().to_string(),
            preview: session.preview().clone(),
            mapping: session.mapping().to_vec(),
            effective_mapping: session.effective_mapping(),
            unused_headers: session.unused_headers(),
            validation: session.validate(&self.schema),
            default_structure_name: session.default_structure_name(),
        }
    }

    /// 修改一条映射
    ///
    /// # 参数
    /// - target_field: 字段集中的字段，或 "unmapped" 取消映射
    ///
    /// # 返回
    /// - Ok(MappingValidation): 修改后的校验结果
    /// - Err(InvalidInput): 表头不在文件中 / 目标字段不在字段集中
    pub fn update_mapping(
        &self,
        session: &mut ImportSession,
        source_header: &str,
        target_field: &str,
    ) -> ApiResult<MappingValidation> {
        if !session.preview().headers.iter().any(|h| h == source_header) {
            return Err(ApiError::InvalidInput(format!("表头不存在: {}", source_header)));
        }
        if target_field != UNMAPPED && !self.schema.contains(target_field) {
            return Err(ApiError::InvalidInput(format!("未知目标字段: {}", target_field)));
        }

        session.set_target_field(source_header, target_field);
        Ok(session.validate(&self.schema))
    }

    /// 提交导入会话
    ///
    /// # 返回
    /// - Ok(ImportApiResponse): 对账结果
    /// - Err(MappingIncomplete): 必填字段未映射
    /// - Err(InvalidInput): 导入选项无效
    /// - Err(UpstreamFailure): 对账失败（事务已回滚）
    pub async fn commit(
        &self,
        session: &ImportSession,
        options: ImportOptions,
    ) -> ApiResult<ImportApiResponse> {
        let start_time = Instant::now();
        let importer = self.create_importer().await?;
        let outcome = importer.commit(session, options).await?;

        Ok(ImportApiResponse {
            outcome,
            unmapped_headers: session.unused_headers(),
            elapsed_ms: start_time.elapsed().as_millis() as i64,
        })
    }

    /// 一步导入（使用建议映射）
    pub async fn import_file(
        &self,
        file_path: &str,
        options: ImportOptions,
    ) -> ApiResult<ImportApiResponse> {
        let session = self.open_session(file_path).await?;
        let response = self.commit(&session, options).await?;
        info!(
            file = %file_path,
            structure_id = %response.outcome.structure_id,
            version = response.outcome.version,
            "一步导入完成"
        );
        Ok(response)
    }
}
