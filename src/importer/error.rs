// ==========================================
// 报表结构导入系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 原则: 数据质量问题宽松放行，只有必填字段覆盖是硬门槛
// ==========================================

use std::collections::BTreeSet;
use thiserror::Error;

/// 底层解析失败原因（随 UnsupportedFormat 附带，用于诊断）
#[derive(Error, Debug)]
pub enum DecodeCause {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Workbook(#[from] calamine::Error),
}

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件过大: {size} 字节（上限 {limit} 字节）")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("文件格式不支持: {detail}（仅支持 .csv/.xlsx/.xls）")]
    UnsupportedFormat {
        detail: String,
        #[source]
        cause: Option<DecodeCause>,
    },

    #[error("文件无数据行（表头之后为空）")]
    EmptyFile,

    // ===== 映射错误 =====
    #[error("必填字段未映射: {}", join_fields(.missing_required))]
    ValidationFailure { missing_required: BTreeSet<String> },

    #[error("导入选项无效: {0}")]
    InvalidImportOptions(String),

    // ===== 对账错误 =====
    #[error("对账服务失败: {0}")]
    UpstreamFailure(String),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 不支持的格式（无底层原因）
    pub fn unsupported(detail: impl Into<String>) -> Self {
        ImportError::UnsupportedFormat {
            detail: detail.into(),
            cause: None,
        }
    }

    /// 读取失败，附带底层原因
    pub fn unreadable(detail: impl Into<String>, cause: impl Into<DecodeCause>) -> Self {
        ImportError::UnsupportedFormat {
            detail: detail.into(),
            cause: Some(cause.into()),
        }
    }
}

fn join_fields(fields: &BTreeSet<String>) -> String {
    fields.iter().cloned().collect::<Vec<_>>().join(", ")
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::unreadable("文件读取失败", err)
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::unreadable("CSV 解析失败", err)
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::unreadable("Excel 解析失败", err)
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_validation_failure_message_lists_fields() {
        let err = ImportError::ValidationFailure {
            missing_required: ["report_line_item_key".to_string()].into_iter().collect(),
        };
        assert!(err.to_string().contains("report_line_item_key"));
    }

    #[test]
    fn test_io_error_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ImportError = io.into();
        assert!(matches!(err, ImportError::UnsupportedFormat { .. }));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_unsupported_has_no_cause() {
        let err = ImportError::unsupported("pdf");
        assert!(err.source().is_none());
        assert!(err.to_string().contains("pdf"));
    }
}
