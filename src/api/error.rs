// ==========================================
// 报表结构导入系统 - API层错误类型
// ==========================================
// 职责: 把导入层 / 仓储层 / 层级引擎的错误统一为调用方可读的错误
// ==========================================

use crate::engine::hierarchy::HierarchyError;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 文件错误
    // ==========================================
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件过大: {size} 字节（上限 {limit} 字节）")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("文件无法读取: {0}")]
    UnsupportedFile(String),

    #[error("文件无数据行")]
    EmptyFile,

    // ==========================================
    // 映射 / 输入错误
    // ==========================================
    #[error("必填字段未映射: {}", .missing_required.join(", "))]
    MappingIncomplete { missing_required: Vec<String> },

    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 对账 / 数据访问错误
    // ==========================================
    #[error("对账服务失败: {0}")]
    UpstreamFailure(String),

    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::FileNotFound(path) => ApiError::FileNotFound(path),
            ImportError::FileTooLarge { size, limit } => ApiError::FileTooLarge { size, limit },
            ImportError::UnsupportedFormat { .. } => ApiError::UnsupportedFile(err.to_string()),
            ImportError::EmptyFile => ApiError::EmptyFile,
            ImportError::ValidationFailure { missing_required } => ApiError::MappingIncomplete {
                missing_required: missing_required.into_iter().collect(),
            },
            ImportError::InvalidImportOptions(msg) => ApiError::InvalidInput(msg),
            ImportError::UpstreamFailure(msg) => ApiError::UpstreamFailure(msg),
            ImportError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将Repository层的技术错误转换为用户友好的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::ValidationError(msg) => ApiError::InvalidInput(msg),
            RepositoryError::SerializationError(e) => ApiError::InternalError(e.to_string()),
        }
    }
}

// ==========================================
// 从 HierarchyError 转换
// ==========================================
impl From<HierarchyError> for ApiError {
    fn from(err: HierarchyError) -> Self {
        match err {
            HierarchyError::ItemNotFound(key) => ApiError::NotFound(format!("行项目 {}", key)),
            HierarchyError::DifferentParents { .. } => {
                ApiError::BusinessRuleViolation(err.to_string())
            }
            HierarchyError::DuplicateKey(_) | HierarchyError::InvalidSortOrder { .. } => {
                ApiError::InvalidInput(err.to_string())
            }
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_validation_failure_lists_missing_fields() {
        let missing: BTreeSet<String> = ["report_line_item_key".to_string()].into_iter().collect();
        let err: ApiError = ImportError::ValidationFailure {
            missing_required: missing,
        }
        .into();

        match &err {
            ApiError::MappingIncomplete { missing_required } => {
                assert_eq!(missing_required, &vec!["report_line_item_key".to_string()]);
            }
            other => panic!("Expected MappingIncomplete, got {:?}", other),
        }
        assert!(err.to_string().contains("report_line_item_key"));
    }

    #[test]
    fn test_upstream_failure_passes_through() {
        let repo_err = RepositoryError::NotFound {
            entity: "ReportStructure".to_string(),
            id: "S-1".to_string(),
        };
        let import_err: ImportError = repo_err.into();
        let err: ApiError = import_err.into();
        match err {
            ApiError::UpstreamFailure(msg) => assert!(msg.contains("S-1")),
            other => panic!("Expected UpstreamFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_repository_not_found() {
        let err: ApiError = RepositoryError::NotFound {
            entity: "ReportStructure".to_string(),
            id: "S-9".to_string(),
        }
        .into();
        assert!(matches!(err, ApiError::NotFound(msg) if msg.contains("S-9")));
    }

    #[test]
    fn test_hierarchy_errors() {
        let err: ApiError = HierarchyError::DifferentParents {
            active_key: "B".to_string(),
            over_key: "D".to_string(),
        }
        .into();
        assert!(matches!(err, ApiError::BusinessRuleViolation(_)));

        let err: ApiError = HierarchyError::ItemNotFound("X".to_string()).into();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_transaction_failure_keeps_its_kind() {
        let err: ApiError = RepositoryError::transaction(rusqlite::Error::InvalidQuery).into();
        assert!(matches!(err, ApiError::DatabaseTransactionError(_)));
    }
}
