// ==========================================
// 日志系统初始化
// ==========================================
// 命令行约定: stdout 只输出结果 JSON，日志一律写 stderr
// 导入管道的阶段日志在 report_structure_import::importer 目标下，
// 对账批次明细为 debug 级别
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 日志格式环境变量（取值 "json" 时输出结构化日志）
pub const LOG_FORMAT_ENV: &str = "REPORT_IMPORT_LOG_FORMAT";

/// 未设置 RUST_LOG 时的过滤器
const DEFAULT_FILTER: &str = "info";

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// 人读格式（默认）
    Pretty,
    /// 每行一个 JSON 对象，便于批量导入时汇总
    Json,
}

impl LogFormat {
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// 初始化日志系统
///
/// # 环境变量
/// - RUST_LOG: 日志级别过滤器（默认: info）
///   例如 RUST_LOG=report_structure_import::repository=debug 查看每个插入批次
/// - REPORT_IMPORT_LOG_FORMAT: "json" 时输出 JSON 行
///
/// # 示例
/// ```no_run
/// use report_structure_import::logging;
/// logging::init();
/// tracing::info!("导入开始");
/// ```
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let format = LogFormat::from_env_value(std::env::var(LOG_FORMAT_ENV).ok().as_deref());

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.with_line_number(true).init(),
    }
}

/// 初始化测试环境的日志系统
///
/// debug 级别，输出交给测试框架捕获；重复调用无副作用
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
