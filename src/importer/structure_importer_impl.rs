// ==========================================
// 报表结构导入系统 - 导入会话编排
// ==========================================
// 职责: 整合导入流程，从文件到对账方
// 流程: 大小预检 → 预览 → 映射建议 →（人工修改）→ 校验 → 全量解析 → 转换 → 组装载荷 → 对账
// ==========================================

use crate::config::{ImportConfigReader, ImportSettings};
use crate::domain::mapping::{self, ColumnMapping, MappingValidation};
use crate::domain::schema::TargetSchema;
use crate::domain::upload::{ImportOptions, RawPreview, ReconcileOutcome};
use crate::importer::column_mapper;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::check_upload_size;
use crate::importer::row_transformer::{build_payload, RowTransformer};
use crate::importer::structure_importer_trait::{FileParser, StructureReconciler};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 可识别的文件扩展名（生成默认结构名称时去除）
const KNOWN_EXTENSIONS: [&str; 3] = [".csv", ".xlsx", ".xls"];

// ==========================================
// ImportSession - 一次导入会话
// ==========================================
// 持有预览与当前映射；映射可在提交前反复修改
#[derive(Debug, Clone)]
pub struct ImportSession {
    session_id: String,
    file_path: PathBuf,
    filename: String,
    preview: RawPreview,
    mapping: Vec<ColumnMapping>,
}

impl ImportSession {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn preview(&self) -> &RawPreview {
        &self.preview
    }

    pub fn mapping(&self) -> &[ColumnMapping] {
        &self.mapping
    }

    /// 人工修改一条映射（"unmapped" 取消映射）
    pub fn set_target_field(&mut self, source_header: &str, target_field: &str) {
        let current = std::mem::take(&mut self.mapping);
        self.mapping = column_mapper::set_target_field(current, source_header, target_field);
    }

    pub fn validate(&self, schema: &TargetSchema) -> MappingValidation {
        column_mapper::validate(&self.mapping, schema)
    }

    /// 目标字段 → 生效的源表头
    pub fn effective_mapping(&self) -> BTreeMap<String, String> {
        mapping::effective_mapping(&self.mapping)
    }

    /// 未被任何映射使用的表头（提交后作为未映射列保存）
    pub fn unused_headers(&self) -> Vec<String> {
        mapping::unused_headers(&self.preview.headers, &self.mapping)
    }

    pub fn default_structure_name(&self) -> String {
        default_structure_name(&self.filename)
    }
}

/// 文件名去掉 .csv/.xlsx/.xls 扩展名（不区分大小写）
pub fn default_structure_name(filename: &str) -> String {
    let lower = filename.to_lowercase();
    let stem = KNOWN_EXTENSIONS
        .iter()
        .find(|ext| lower.ends_with(*ext) && lower.len() > ext.len())
        .map(|ext| &filename[..filename.len() - ext.len()])
        .unwrap_or(filename);
    stem.trim().to_string()
}

/// 补全并校验导入选项
///
/// # 规则
/// - 覆盖模式: 必须给出非空的目标结构 ID；名称可省略（沿用原名称）
/// - 新建模式: 名称缺省时取文件名（去扩展名）；显式给出空白名称报错
pub fn resolve_import_options(options: ImportOptions, filename: &str) -> ImportResult<ImportOptions> {
    let mut options = options;

    if options.overwrite_mode {
        let target = options
            .target_structure_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ImportError::InvalidImportOptions("覆盖模式需要选择目标结构".to_string()))?
            .to_string();
        options.target_structure_id = Some(target);
        if let Some(name) = options.structure_name.as_deref() {
            if name.trim().is_empty() {
                options.structure_name = None;
            }
        }
        return Ok(options);
    }

    let name = match options.structure_name.as_deref() {
        Some(name) => name.trim().to_string(),
        None => default_structure_name(filename),
    };
    if name.is_empty() {
        return Err(ImportError::InvalidImportOptions("结构名称不能为空".to_string()));
    }
    options.structure_name = Some(name);
    options.target_structure_id = None;
    Ok(options)
}

// ==========================================
// StructureImporterImpl - 导入器实现
// ==========================================
pub struct StructureImporterImpl<R, C>
where
    R: StructureReconciler,
    C: ImportConfigReader,
{
    // 对账方
    reconciler: R,

    // 配置读取器
    config: C,

    // 目标字段集（会话期间不可变）
    schema: TargetSchema,

    // 导入组件
    file_parser: Box<dyn FileParser>,
    transformer: RowTransformer,
}

impl<R, C> StructureImporterImpl<R, C>
where
    R: StructureReconciler,
    C: ImportConfigReader,
{
    /// 创建导入器
    ///
    /// # 参数
    /// - reconciler: 对账方
    /// - config: 配置读取器
    /// - schema: 目标字段集
    /// - file_parser: 文件解析器
    pub fn new(
        reconciler: R,
        config: C,
        schema: TargetSchema,
        file_parser: Box<dyn FileParser>,
    ) -> Self {
        Self {
            reconciler,
            config,
            schema,
            file_parser,
            transformer: RowTransformer::default(),
        }
    }

    /// 替换行转换器（自定义排序字段）
    pub fn with_transformer(mut self, transformer: RowTransformer) -> Self {
        self.transformer = transformer;
        self
    }

    pub fn schema(&self) -> &TargetSchema {
        &self.schema
    }

    pub fn reconciler(&self) -> &R {
        &self.reconciler
    }

    /// 读取导入配置
    pub async fn settings(&self) -> ImportResult<ImportSettings> {
        self.config.load_import_settings().await.map_err(|e| {
            error!(error = %e, "读取导入配置失败");
            ImportError::Other(anyhow::anyhow!(e).context("读取导入配置失败"))
        })
    }

    /// 打开导入会话
    ///
    /// # 返回
    /// - Ok(ImportSession): 预览 + 建议映射
    /// - Err(FileNotFound / FileTooLarge): 大小预检失败
    /// - Err(UnsupportedFormat / EmptyFile): 预览失败
    #[instrument(skip(self, file_path), fields(file = %file_path.display(), session_id))]
    pub async fn open_session(&self, file_path: &Path) -> ImportResult<ImportSession> {
        let session_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("session_id", session_id.as_str());

        let settings = self.settings().await?;

        // === 步骤 1: 大小预检 ===
        let size = check_upload_size(file_path, settings.max_upload_bytes)?;
        debug!(size, limit = settings.max_upload_bytes, "大小预检通过");

        // === 步骤 2: 预览 ===
        let preview = self
            .file_parser
            .preview(file_path, settings.preview_rows)
            .map_err(|e| {
                warn!(error = %e, "文件预览失败");
                e
            })?;

        // === 步骤 3: 映射建议 ===
        let mapping = column_mapper::propose_mapping(&preview.headers, &self.schema);

        let filename = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_path.display().to_string());

        info!(
            format = ?preview.format,
            headers = preview.headers.len(),
            total_row_count = preview.total_row_count,
            row_count_exact = preview.row_count_exact,
            "导入会话已打开"
        );

        Ok(ImportSession {
            session_id,
            file_path: file_path.to_path_buf(),
            filename,
            preview,
            mapping,
        })
    }

    /// 提交导入会话
    ///
    /// # 返回
    /// - Ok(ReconcileOutcome): 对账结果
    /// - Err(ValidationFailure): 必填字段未映射（不读取全量数据）
    /// - Err(InvalidImportOptions): 导入选项无效
    /// - Err(UpstreamFailure): 对账方拒绝
    #[instrument(skip(self, session, options), fields(session_id = %session.session_id, file = %session.filename))]
    pub async fn commit(
        &self,
        session: &ImportSession,
        options: ImportOptions,
    ) -> ImportResult<ReconcileOutcome> {
        let start_time = Instant::now();

        // === 步骤 1: 映射校验 ===
        let validation = session.validate(&self.schema);
        if !validation.valid {
            warn!(missing = ?validation.missing_required, "必填字段未映射");
            return Err(ImportError::ValidationFailure {
                missing_required: validation.missing_required,
            });
        }

        // === 步骤 2: 选项校验 ===
        let options = resolve_import_options(options, &session.filename)?;

        // === 步骤 3: 全量解析 ===
        let rows = self.file_parser.parse_full(&session.file_path)?;
        debug!(rows = rows.len(), "全量解析完成");

        // === 步骤 4: 转换 + 组装载荷 ===
        let transformed = self.transformer.transform(&rows, &session.mapping);
        let payload = build_payload(&session.filename, &transformed, &session.mapping, &options);

        // === 步骤 5: 对账 ===
        let outcome = self.reconciler.reconcile(&payload).await.map_err(|e| {
            error!(error = %e, "对账失败");
            e
        })?;

        info!(
            structure_id = %outcome.structure_id,
            version = outcome.version,
            line_items = outcome.line_items_count,
            unmapped_rows = payload.unmapped_columns.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "导入完成"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::upload::UploadPayload;
    use crate::importer::file_parser::UniversalFileParser;
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::{Builder, NamedTempFile};

    // 记录收到的载荷，可配置为拒绝
    #[derive(Default)]
    struct RecordingReconciler {
        payloads: Mutex<Vec<UploadPayload>>,
        reject: bool,
    }

    #[async_trait]
    impl StructureReconciler for RecordingReconciler {
        async fn reconcile(&self, payload: &UploadPayload) -> ImportResult<ReconcileOutcome> {
            if self.reject {
                return Err(ImportError::UpstreamFailure("rejected".to_string()));
            }
            self.payloads.lock().unwrap().push(payload.clone());
            Ok(ReconcileOutcome {
                structure_id: payload
                    .target_structure_id
                    .clone()
                    .unwrap_or_else(|| "S-NEW".to_string()),
                structure_name: payload.structure_name.clone().unwrap_or_default(),
                version: 1,
                line_items_count: payload.total_rows,
            })
        }
    }

    fn importer(reject: bool) -> StructureImporterImpl<RecordingReconciler, ImportSettings> {
        StructureImporterImpl::new(
            RecordingReconciler {
                reject,
                ..Default::default()
            },
            ImportSettings::default(),
            TargetSchema::report_line_items(),
            Box::new(UniversalFileParser),
        )
    }

    fn csv_file(lines: &[&str]) -> NamedTempFile {
        let mut temp_file = Builder::new()
            .prefix("Balance Sheet ")
            .suffix(".csv")
            .tempfile()
            .unwrap();
        for line in lines {
            writeln!(temp_file, "{}", line).unwrap();
        }
        temp_file
    }

    #[test]
    fn test_default_structure_name() {
        assert_eq!(default_structure_name("coa.csv"), "coa");
        assert_eq!(default_structure_name("Balance Sheet.XLSX"), "Balance Sheet");
        assert_eq!(default_structure_name("legacy.xls"), "legacy");
        assert_eq!(default_structure_name("notes.txt"), "notes.txt");
        assert_eq!(default_structure_name(".csv"), ".csv");
    }

    #[test]
    fn test_resolve_import_options() {
        let resolved = resolve_import_options(ImportOptions::default(), "coa.csv").unwrap();
        assert_eq!(resolved.structure_name.as_deref(), Some("coa"));

        let resolved =
            resolve_import_options(ImportOptions::new_structure("  Income  "), "coa.csv").unwrap();
        assert_eq!(resolved.structure_name.as_deref(), Some("Income"));

        assert!(matches!(
            resolve_import_options(ImportOptions::new_structure("   "), "coa.csv"),
            Err(ImportError::InvalidImportOptions(_))
        ));

        let overwrite = ImportOptions {
            overwrite_mode: true,
            ..Default::default()
        };
        assert!(matches!(
            resolve_import_options(overwrite, "coa.csv"),
            Err(ImportError::InvalidImportOptions(_))
        ));

        let resolved = resolve_import_options(ImportOptions::overwrite(" S-1 "), "coa.csv").unwrap();
        assert_eq!(resolved.target_structure_id.as_deref(), Some("S-1"));
        assert!(resolved.structure_name.is_none());
    }

    #[tokio::test]
    async fn test_open_session_proposes_mapping() {
        let file = csv_file(&["Key,Description,Owner", "A,Assets,fin", "B,Cash,fin"]);
        let importer = importer(false);

        let session = importer.open_session(file.path()).await.unwrap();
        assert_eq!(session.preview().headers.len(), 3);
        assert_eq!(session.mapping()[0].target(), Some("report_line_item_key"));
        assert_eq!(session.mapping()[2].target(), None);
        assert_eq!(session.unused_headers(), vec!["Owner".to_string()]);
        assert!(session.validate(importer.schema()).valid);
        assert!(session.default_structure_name().starts_with("Balance Sheet"));
    }

    #[tokio::test]
    async fn test_open_session_rejects_oversized_file() {
        let file = csv_file(&["Key", "A", "B", "C"]);
        let importer = StructureImporterImpl::new(
            RecordingReconciler::default(),
            ImportSettings {
                max_upload_bytes: 4,
                ..Default::default()
            },
            TargetSchema::report_line_items(),
            Box::new(UniversalFileParser),
        );

        assert!(matches!(
            importer.open_session(file.path()).await,
            Err(ImportError::FileTooLarge { limit: 4, .. })
        ));
    }

    #[tokio::test]
    async fn test_commit_builds_payload() {
        let file = csv_file(&["Key,Parent,Owner", "A,,fin", "B,A,ops"]);
        let importer = importer(false);

        let mut session = importer.open_session(file.path()).await.unwrap();
        session.set_target_field("Parent", "parent_report_line_item_key");

        let outcome = importer
            .commit(&session, ImportOptions::new_structure("COA"))
            .await
            .unwrap();
        assert_eq!(outcome.structure_name, "COA");
        assert_eq!(outcome.line_items_count, 2);

        let payloads = importer.reconciler().payloads.lock().unwrap();
        let payload = &payloads[0];
        assert_eq!(payload.total_rows, 2);
        assert_eq!(payload.rows[1]["parent_report_line_item_key"], "A");
        assert_eq!(payload.rows[1]["sort_order"], 1);
        assert_eq!(payload.unmapped_columns.len(), 2);
        assert_eq!(payload.unmapped_columns[1].columns["Owner"], "ops");
        assert!(payload.target_structure_id.is_none());
    }

    #[tokio::test]
    async fn test_commit_fails_validation_without_key_mapping() {
        let file = csv_file(&["Key,Description", "A,Assets"]);
        let importer = importer(false);

        let mut session = importer.open_session(file.path()).await.unwrap();
        session.set_target_field("Key", "unmapped");

        match importer.commit(&session, ImportOptions::default()).await {
            Err(ImportError::ValidationFailure { missing_required }) => {
                assert!(missing_required.contains("report_line_item_key"));
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
        assert!(importer.reconciler().payloads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_propagates_upstream_failure() {
        let file = csv_file(&["Key", "A"]);
        let importer = importer(true);

        let session = importer.open_session(file.path()).await.unwrap();
        assert!(matches!(
            importer.commit(&session, ImportOptions::default()).await,
            Err(ImportError::UpstreamFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_commit_overwrite_carries_target() {
        let file = csv_file(&["Key", "A"]);
        let importer = importer(false);

        let session = importer.open_session(file.path()).await.unwrap();
        let outcome = importer
            .commit(&session, ImportOptions::overwrite("S-OLD"))
            .await
            .unwrap();
        assert_eq!(outcome.structure_id, "S-OLD");

        let payloads = importer.reconciler().payloads.lock().unwrap();
        assert!(payloads[0].overwrite_mode);
        assert_eq!(payloads[0].target_structure_id.as_deref(), Some("S-OLD"));
    }
}
