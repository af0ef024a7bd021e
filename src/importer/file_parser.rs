// ==========================================
// 报表结构导入系统 - 文件解析器实现
// ==========================================
// 阶段 0: 文件读取与解析（预览 / 全量）
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// ==========================================
// CSV: 流式读取，预览读到上限即停，总行数为按字节位置的估算
// Excel: 整表读入内存后切片（大文件的已知扩展性限制），总行数精确
// ==========================================

use crate::domain::types::{is_blank, CellValue, RawRow, SourceFormat};
use crate::domain::upload::RawPreview;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::structure_importer_trait::FileParser;
use calamine::{open_workbook_auto, Data, Range, Reader};
use csv::{ReaderBuilder, StringRecord};
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// 预览默认数据行数
pub const DEFAULT_PREVIEW_ROWS: usize = 5;

/// 上传大小预检（在解码之前执行）
///
/// # 返回
/// - Ok(u64): 文件大小（字节）
/// - Err(FileNotFound / FileTooLarge)
pub fn check_upload_size(file_path: &Path, limit: u64) -> ImportResult<u64> {
    let metadata = std::fs::metadata(file_path)
        .map_err(|_| ImportError::FileNotFound(file_path.display().to_string()))?;
    let size = metadata.len();
    if size > limit {
        return Err(ImportError::FileTooLarge { size, limit });
    }
    Ok(size)
}

/// 按扩展名识别格式，不支持时报错
fn detect_format(file_path: &Path) -> ImportResult<SourceFormat> {
    SourceFormat::from_path(file_path).ok_or_else(|| {
        let ext = file_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        ImportError::unsupported(if ext.is_empty() {
            "无扩展名".to_string()
        } else {
            ext
        })
    })
}

/// 把预览行补齐/截断到表头宽度
fn fit_to_width(mut row: Vec<CellValue>, width: usize) -> Vec<CellValue> {
    row.resize(width, CellValue::Null);
    row
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl CsvParser {
    fn open(file_path: &Path) -> ImportResult<csv::Reader<File>> {
        let format = detect_format(file_path)?;
        if format != SourceFormat::Csv {
            return Err(ImportError::unsupported(format.to_string()));
        }

        let file = File::open(file_path)
            .map_err(|e| ImportError::unreadable(file_path.display().to_string(), e))?;

        // 表头手动识别，预览与全量共用一套规则
        Ok(ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .from_reader(file))
    }

    fn is_blank_record(record: &StringRecord) -> bool {
        record.iter().all(|v| v.trim().is_empty())
    }

    /// 读取表头（第一条非空记录）
    ///
    /// 文件没有任何非空记录时返回 None。
    fn read_headers(
        reader: &mut csv::Reader<File>,
        record: &mut StringRecord,
    ) -> ImportResult<Option<Vec<String>>> {
        while reader.read_record(record)? {
            if Self::is_blank_record(record) {
                continue;
            }
            let headers = record
                .iter()
                .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
                .collect();
            return Ok(Some(headers));
        }
        Ok(None)
    }

    /// 读取下一条非空记录；到达文件末尾返回 false
    fn next_data_record(
        reader: &mut csv::Reader<File>,
        record: &mut StringRecord,
    ) -> ImportResult<bool> {
        while reader.read_record(record)? {
            if !Self::is_blank_record(record) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl FileParser for CsvParser {
    fn preview(&self, file_path: &Path, max_rows: usize) -> ImportResult<RawPreview> {
        let file_size = std::fs::metadata(file_path)
            .map_err(|e| ImportError::unreadable(file_path.display().to_string(), e))?
            .len();
        let mut reader = Self::open(file_path)?;
        let mut record = StringRecord::new();

        let headers = Self::read_headers(&mut reader, &mut record)?.ok_or(ImportError::EmptyFile)?;
        let header_end = reader.position().byte();

        // 读取样本行，再多探测一行判断是否已到文件末尾
        let mut sample_rows = Vec::new();
        let mut rows_seen = 0usize;
        let mut exhausted = false;
        while rows_seen <= max_rows {
            if !Self::next_data_record(&mut reader, &mut record)? {
                exhausted = true;
                break;
            }
            rows_seen += 1;
            if sample_rows.len() < max_rows {
                let row = record
                    .iter()
                    .map(|v| CellValue::String(v.trim().to_string()))
                    .collect();
                sample_rows.push(fit_to_width(row, headers.len()));
            }
        }

        if rows_seen == 0 {
            return Err(ImportError::EmptyFile);
        }

        let (total_row_count, row_count_exact) = if exhausted {
            (rows_seen, true)
        } else {
            // 按已读字节的平均行长估算
            let consumed = reader.position().byte().saturating_sub(header_end).max(1);
            let remaining = file_size.saturating_sub(header_end);
            let avg_row_bytes = consumed as f64 / rows_seen as f64;
            let estimate = (remaining as f64 / avg_row_bytes).round() as usize;
            (estimate.max(rows_seen), false)
        };

        debug!(
            file = %file_path.display(),
            headers = headers.len(),
            total_row_count,
            row_count_exact,
            "CSV 预览完成"
        );

        Ok(RawPreview {
            format: SourceFormat::Csv,
            headers,
            sample_rows,
            total_row_count,
            row_count_exact,
        })
    }

    fn parse_full(&self, file_path: &Path) -> ImportResult<Vec<RawRow>> {
        let mut reader = Self::open(file_path)?;
        let mut record = StringRecord::new();

        let headers = match Self::read_headers(&mut reader, &mut record)? {
            Some(h) => h,
            None => return Ok(Vec::new()),
        };

        let mut records = Vec::new();
        while Self::next_data_record(&mut reader, &mut record)? {
            let mut row = RawRow::new();
            for (col_idx, value) in record.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    // 空表头的列不生成键
                    if header.is_empty() {
                        continue;
                    }
                    row.insert(header.clone(), CellValue::String(value.trim().to_string()));
                }
            }
            records.push(row);
        }

        Ok(records)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl ExcelParser {
    /// 读取第一个工作表（整表读入内存）
    fn first_sheet(file_path: &Path) -> ImportResult<(SourceFormat, Range<Data>)> {
        let format = detect_format(file_path)?;
        if !format.is_workbook() {
            return Err(ImportError::unsupported(format.to_string()));
        }

        let mut workbook = open_workbook_auto(file_path)
            .map_err(|e| ImportError::unreadable(file_path.display().to_string(), e))?;

        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ImportError::unsupported("Excel 文件无工作表"))?;

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| ImportError::unreadable(format!("工作表 {}", sheet_name), e))?;

        Ok((format, range))
    }

    /// 单元格转值
    fn cell_value(cell: &Data) -> CellValue {
        match cell {
            Data::Empty => CellValue::Null,
            Data::Int(i) => CellValue::from(*i),
            Data::Float(f) => serde_json::Number::from_f64(*f)
                .map(CellValue::Number)
                .unwrap_or(CellValue::Null),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::String(s) => CellValue::String(s.trim().to_string()),
            other => CellValue::String(other.to_string().trim().to_string()),
        }
    }

    fn header_text(cell: &Data) -> String {
        cell.to_string().trim().to_string()
    }

    /// 拆分为 表头 + 非空数据行
    fn split_rows(range: &Range<Data>) -> (Vec<String>, Vec<Vec<CellValue>>) {
        let mut rows = range.rows();
        let headers: Vec<String> = match rows.next() {
            Some(header_row) => header_row.iter().map(Self::header_text).collect(),
            None => return (Vec::new(), Vec::new()),
        };

        let data = rows
            .map(|r| r.iter().map(Self::cell_value).collect::<Vec<_>>())
            .filter(|r| !r.iter().all(is_blank))
            .collect();

        (headers, data)
    }
}

impl ExcelParser {
    /// 工作表 → 预览（总行数为非空数据行的精确计数）
    fn preview_range(
        format: SourceFormat,
        range: &Range<Data>,
        max_rows: usize,
    ) -> ImportResult<RawPreview> {
        let (headers, data) = Self::split_rows(range);

        if data.is_empty() {
            return Err(ImportError::EmptyFile);
        }

        let total_row_count = data.len();
        let sample_rows = data
            .into_iter()
            .take(max_rows)
            .map(|r| fit_to_width(r, headers.len()))
            .collect();

        Ok(RawPreview {
            format,
            headers,
            sample_rows,
            total_row_count,
            row_count_exact: true,
        })
    }

    /// 工作表 → 以表头为键的行
    fn records_from_range(range: &Range<Data>) -> Vec<RawRow> {
        let (headers, data) = Self::split_rows(range);

        let mut records = Vec::with_capacity(data.len());
        for data_row in data {
            let mut row = RawRow::new();
            for (col_idx, value) in data_row.into_iter().enumerate() {
                let Some(header) = headers.get(col_idx) else {
                    continue;
                };
                // 空单元格与空表头不生成键
                if header.is_empty() || value.is_null() {
                    continue;
                }
                row.insert(header.clone(), value);
            }
            records.push(row);
        }
        records
    }
}

impl FileParser for ExcelParser {
    fn preview(&self, file_path: &Path, max_rows: usize) -> ImportResult<RawPreview> {
        let (format, range) = Self::first_sheet(file_path)?;
        let preview = Self::preview_range(format, &range, max_rows)?;

        debug!(
            file = %file_path.display(),
            headers = preview.headers.len(),
            total_row_count = preview.total_row_count,
            "Excel 预览完成"
        );

        Ok(preview)
    }

    fn parse_full(&self, file_path: &Path) -> ImportResult<Vec<RawRow>> {
        let (_, range) = Self::first_sheet(file_path)?;
        Ok(Self::records_from_range(&range))
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl UniversalFileParser {
    fn dispatch(file_path: &Path) -> ImportResult<&'static dyn FileParser> {
        match detect_format(file_path)? {
            SourceFormat::Csv => Ok(&CsvParser),
            SourceFormat::Xlsx | SourceFormat::Xls => Ok(&ExcelParser),
        }
    }
}

impl FileParser for UniversalFileParser {
    fn preview(&self, file_path: &Path, max_rows: usize) -> ImportResult<RawPreview> {
        Self::dispatch(file_path)?.preview(file_path, max_rows)
    }

    fn parse_full(&self, file_path: &Path) -> ImportResult<Vec<RawRow>> {
        Self::dispatch(file_path)?.parse_full(file_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    fn csv_file(lines: &[&str]) -> NamedTempFile {
        let mut temp_file = Builder::new().suffix(".csv").tempfile().unwrap();
        for line in lines {
            writeln!(temp_file, "{}", line).unwrap();
        }
        temp_file
    }

    #[test]
    fn test_csv_preview_small_file_is_exact() {
        let file = csv_file(&["Key,Description", "A,Assets", "B,Cash"]);

        let preview = CsvParser.preview(file.path(), 5).unwrap();
        assert_eq!(preview.headers, vec!["Key", "Description"]);
        assert_eq!(preview.sample_rows.len(), 2);
        assert_eq!(preview.total_row_count, 2);
        assert!(preview.row_count_exact);
    }

    #[test]
    fn test_csv_preview_stops_at_limit_and_estimates() {
        let mut lines = vec!["Key,Description".to_string()];
        for i in 0..50 {
            lines.push(format!("K{:03},Item {:03}", i, i));
        }
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let file = csv_file(&refs);

        let preview = CsvParser.preview(file.path(), 5).unwrap();
        assert_eq!(preview.sample_rows.len(), 5);
        assert!(!preview.row_count_exact);
        // 行长一致时估算应接近真实值
        assert!(preview.total_row_count >= 45 && preview.total_row_count <= 55);
    }

    #[test]
    fn test_csv_preview_rows_match_header_width() {
        let file = csv_file(&["Key,Description,Parent", "A,Assets", "B,Cash,A,extra"]);

        let preview = CsvParser.preview(file.path(), 5).unwrap();
        for row in &preview.sample_rows {
            assert_eq!(row.len(), preview.headers.len());
        }
        assert_eq!(preview.sample_rows[0][2], CellValue::Null);
    }

    #[test]
    fn test_csv_header_only_is_empty_file() {
        let file = csv_file(&["Key,Description"]);
        let result = CsvParser.preview(file.path(), 5);
        assert!(matches!(result, Err(ImportError::EmptyFile)));
    }

    #[test]
    fn test_csv_zero_bytes_is_empty_file() {
        let file = Builder::new().suffix(".csv").tempfile().unwrap();
        let result = CsvParser.preview(file.path(), 5);
        assert!(matches!(result, Err(ImportError::EmptyFile)));
    }

    #[test]
    fn test_csv_parse_full_skips_blank_rows() {
        let file = csv_file(&["Key,Description", "A,Assets", ",", "B,Cash"]);

        let rows = CsvParser.parse_full(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Key"), Some(&json!("A")));
        assert_eq!(rows[1].get("Description"), Some(&json!("Cash")));
    }

    #[test]
    fn test_csv_short_row_has_no_missing_keys() {
        let file = csv_file(&["Key,Description,Notes", "A,Assets"]);

        let rows = CsvParser.parse_full(file.path()).unwrap();
        assert!(rows[0].contains_key("Description"));
        assert!(!rows[0].contains_key("Notes"));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = Builder::new().suffix(".pdf").tempfile().unwrap();
        let result = UniversalFileParser.preview(file.path(), 5);
        assert!(matches!(result, Err(ImportError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_missing_file_is_unsupported_with_cause() {
        use std::error::Error as _;
        let result = CsvParser.preview(Path::new("does_not_exist.csv"), 5);
        let err = result.unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat { .. }));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_corrupt_workbook_is_unsupported_with_cause() {
        use std::error::Error as _;
        let mut file = Builder::new().suffix(".xlsx").tempfile().unwrap();
        file.write_all(b"this is not a zip archive").unwrap();

        let err = UniversalFileParser.preview(file.path(), 5).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat { .. }));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_check_upload_size() {
        let file = csv_file(&["Key", "A"]);
        assert!(check_upload_size(file.path(), 1024).is_ok());
        assert!(matches!(
            check_upload_size(file.path(), 2),
            Err(ImportError::FileTooLarge { .. })
        ));
        assert!(matches!(
            check_upload_size(Path::new("missing.csv"), 1024),
            Err(ImportError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_excel_cell_value_conversion() {
        assert_eq!(ExcelParser::cell_value(&Data::Empty), CellValue::Null);
        assert_eq!(ExcelParser::cell_value(&Data::Int(3)), json!(3));
        assert_eq!(ExcelParser::cell_value(&Data::Float(1.5)), json!(1.5));
        assert_eq!(
            ExcelParser::cell_value(&Data::String(" Cash ".to_string())),
            json!("Cash")
        );
    }

    /// 内存工作表: 表头 Key/Description/Parent，第 3 行全空，第 4 行缺父键
    fn sheet() -> Range<Data> {
        let mut range = Range::new((0, 0), (4, 2));
        let cells: [(u32, u32, Data); 9] = [
            (0, 0, Data::String("Key".to_string())),
            (0, 1, Data::String("Description".to_string())),
            (0, 2, Data::String("Parent".to_string())),
            (1, 0, Data::String("BS".to_string())),
            (1, 1, Data::String("Balance Sheet".to_string())),
            (2, 0, Data::Int(1000)),
            (2, 1, Data::String(" Assets ".to_string())),
            (2, 2, Data::String("BS".to_string())),
            (4, 0, Data::Float(1100.0)),
        ];
        for (row, col, value) in cells {
            range.set_value((row, col), value);
        }
        range
    }

    #[test]
    fn test_excel_split_rows_drops_blank_rows() {
        let (headers, data) = ExcelParser::split_rows(&sheet());
        assert_eq!(headers, vec!["Key", "Description", "Parent"]);
        assert_eq!(data.len(), 3);
        assert_eq!(data[2][0], json!(1100.0));
        assert_eq!(data[2][1], CellValue::Null);

        let (headers, data) = ExcelParser::split_rows(&Range::<Data>::empty());
        assert!(headers.is_empty() && data.is_empty());
    }

    #[test]
    fn test_excel_preview_count_is_exact() {
        let preview = ExcelParser::preview_range(SourceFormat::Xlsx, &sheet(), 2).unwrap();
        assert_eq!(preview.format, SourceFormat::Xlsx);
        assert_eq!(preview.sample_rows.len(), 2);
        assert_eq!(preview.total_row_count, 3);
        assert!(preview.row_count_exact);
        for row in &preview.sample_rows {
            assert_eq!(row.len(), preview.headers.len());
        }
        assert_eq!(preview.sample_rows[0][2], CellValue::Null);
    }

    #[test]
    fn test_excel_header_only_is_empty_file() {
        let mut range = Range::new((0, 0), (2, 1));
        range.set_value((0, 0), Data::String("Key".to_string()));
        range.set_value((0, 1), Data::String("Description".to_string()));

        let result = ExcelParser::preview_range(SourceFormat::Xls, &range, 5);
        assert!(matches!(result, Err(ImportError::EmptyFile)));
    }

    #[test]
    fn test_excel_records_skip_empty_cells() {
        let records = ExcelParser::records_from_range(&sheet());
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].get("Key"), Some(&json!("BS")));
        assert!(!records[0].contains_key("Parent"));
        assert_eq!(records[1].get("Key"), Some(&json!(1000)));
        assert_eq!(records[1].get("Description"), Some(&json!("Assets")));
        assert_eq!(records[1].get("Parent"), Some(&json!("BS")));
        assert_eq!(records[2].len(), 1);
    }
}
