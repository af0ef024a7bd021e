// ==========================================
// 报表结构导入系统 - 领域类型定义
// ==========================================
// 职责: 源文件格式、单元格值、原始行
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// 单元格值（字符串 / 数值 / 布尔 / 空）
///
/// 直接复用 JSON 值模型，上传载荷本身就是 JSON 形态。
pub type CellValue = serde_json::Value;

/// 原始行: 表头 → 单元格值
///
/// 只包含该行实际出现的列；CSV 短行、Excel 空单元格都不会生成键。
pub type RawRow = serde_json::Map<String, CellValue>;

// ==========================================
// 源文件格式 (Source Format)
// ==========================================
// 按扩展名分派，大小写不敏感
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceFormat {
    Csv,  // 分隔文本
    Xlsx, // Office Open XML 工作簿
    Xls,  // 旧版二进制工作簿
}

impl SourceFormat {
    /// 从扩展名识别格式（不含点）
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim().to_lowercase().as_str() {
            "csv" => Some(SourceFormat::Csv),
            "xlsx" => Some(SourceFormat::Xlsx),
            "xls" => Some(SourceFormat::Xls),
            _ => None,
        }
    }

    /// 从文件路径识别格式
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// 是否为整表读入内存的工作簿格式
    pub fn is_workbook(&self) -> bool {
        matches!(self, SourceFormat::Xlsx | SourceFormat::Xls)
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::Csv => write!(f, "csv"),
            SourceFormat::Xlsx => write!(f, "xlsx"),
            SourceFormat::Xls => write!(f, "xls"),
        }
    }
}

/// 单元格是否为空（Null 或仅空白字符串）
pub fn is_blank(value: &CellValue) -> bool {
    match value {
        CellValue::Null => true,
        CellValue::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// 单元格转文本
///
/// 整数值的浮点数不带 `.0`（Excel 中的 1000 读出来是 1000.0）。
/// 空值返回 None。
pub fn cell_as_text(value: &CellValue) -> Option<String> {
    match value {
        CellValue::Null => None,
        CellValue::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        CellValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(f) = n.as_f64() {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    Some(format!("{}", f as i64))
                } else {
                    Some(f.to_string())
                }
            } else {
                Some(n.to_string())
            }
        }
        CellValue::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// 单元格转布尔标志
///
/// 接受 true/yes/y/x/1（大小写不敏感）和非零数值；无法识别返回 None。
pub fn cell_as_flag(value: &CellValue) -> Option<bool> {
    match value {
        CellValue::Bool(b) => Some(*b),
        CellValue::Number(n) => n.as_f64().map(|f| f != 0.0),
        CellValue::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "y" | "x" | "1" => Some(true),
            "false" | "no" | "n" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// 单元格转整数（数值或可解析字符串）
pub fn cell_as_i64(value: &CellValue) -> Option<i64> {
    match value {
        CellValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        CellValue::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(SourceFormat::from_extension("CSV"), Some(SourceFormat::Csv));
        assert_eq!(SourceFormat::from_extension("xlsx"), Some(SourceFormat::Xlsx));
        assert_eq!(SourceFormat::from_extension("xls"), Some(SourceFormat::Xls));
        assert_eq!(SourceFormat::from_extension("pdf"), None);
        assert_eq!(SourceFormat::from_path(Path::new("no_extension")), None);
    }

    #[test]
    fn test_cell_as_text_drops_trailing_zero() {
        assert_eq!(cell_as_text(&json!(1000.0)), Some("1000".to_string()));
        assert_eq!(cell_as_text(&json!(12.5)), Some("12.5".to_string()));
        assert_eq!(cell_as_text(&json!("  A100 ")), Some("A100".to_string()));
        assert_eq!(cell_as_text(&json!("   ")), None);
        assert_eq!(cell_as_text(&CellValue::Null), None);
    }

    #[test]
    fn test_cell_as_flag() {
        assert_eq!(cell_as_flag(&json!("Yes")), Some(true));
        assert_eq!(cell_as_flag(&json!("x")), Some(true));
        assert_eq!(cell_as_flag(&json!(0)), Some(false));
        assert_eq!(cell_as_flag(&json!(true)), Some(true));
        assert_eq!(cell_as_flag(&json!("maybe")), None);
    }

    #[test]
    fn test_cell_as_i64() {
        assert_eq!(cell_as_i64(&json!(7)), Some(7));
        assert_eq!(cell_as_i64(&json!("12")), Some(12));
        assert_eq!(cell_as_i64(&json!(3.0)), Some(3));
        assert_eq!(cell_as_i64(&json!("abc")), None);
    }
}
