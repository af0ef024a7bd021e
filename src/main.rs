// ==========================================
// 报表结构导入系统 - 命令行入口
// ==========================================
// 用法:
//   report-structure-import preview <file>
//   report-structure-import import <file> [name]
//   report-structure-import reimport <structure_id> <file>
//   report-structure-import list
//   report-structure-import tree <structure_id> [search]
//
// 数据库路径: REPORT_STRUCTURE_IMPORT_DB_PATH，缺省为用户数据目录
// 结果以 JSON 输出到 stdout，日志输出到 stderr
// ==========================================

use report_structure_import::api::{ImportApi, StructureApi};
use report_structure_import::db::{get_default_db_path, init_schema, open_sqlite_connection};
use report_structure_import::domain::ImportOptions;
use report_structure_import::logging;
use serde::Serialize;
use std::sync::{Arc, Mutex};

const USAGE: &str = "用法: report-structure-import <preview <file> | import <file> [name] | reimport <structure_id> <file> | list | tree <structure_id> [search]>";

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).ok_or(USAGE)?;

    let db_path = get_default_db_path();
    tracing::info!(version = report_structure_import::VERSION, db_path = %db_path, "启动");

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;
    let conn = Arc::new(Mutex::new(conn));

    match (command, &args[1..]) {
        ("preview", [file]) => {
            let api = ImportApi::new(conn);
            let session = api.open_session(file).await?;
            print_json(&api.describe_session(&session))?;
        }
        ("import", [file, rest @ ..]) if rest.len() <= 1 => {
            let api = ImportApi::new(conn);
            let options = ImportOptions {
                structure_name: rest.first().cloned(),
                ..Default::default()
            };
            print_json(&api.import_file(file, options).await?)?;
        }
        ("reimport", [structure_id, file]) => {
            let api = ImportApi::new(conn);
            print_json(&api.import_file(file, ImportOptions::overwrite(structure_id.as_str())).await?)?;
        }
        ("list", []) => {
            print_json(&StructureApi::new(conn).list_structures()?)?;
        }
        ("tree", [structure_id]) => {
            print_json(&StructureApi::new(conn).get_structure_tree(structure_id)?)?;
        }
        ("tree", [structure_id, term]) => {
            print_json(&StructureApi::new(conn).search_structure_tree(structure_id, term)?)?;
        }
        _ => return Err(USAGE.into()),
    }

    Ok(())
}
