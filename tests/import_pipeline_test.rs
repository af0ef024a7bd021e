// ==========================================
// 导入管道集成测试
// ==========================================
// 测试目标: 文件 → 预览 → 映射 → 转换 → SQLite 对账 的完整流程
// ==========================================


use report_structure_import::api::{ApiError, ImportApi, StructureApi};
use report_structure_import::config::config_keys;
use report_structure_import::domain::ImportOptions;
use report_structure_import::logging;
use test_helpers::{balance_sheet_lines, create_test_db, insert_test_config, write_csv};

#[tokio::test]
async fn test_import_new_structure_end_to_end() {
    logging::init_test();
    let db = create_test_db().unwrap();
    let file = write_csv("Balance Sheet ", &balance_sheet_lines()).unwrap();

    let import_api = ImportApi::new(db.conn.clone());
    let session = import_api
        .open_session(file.path().to_str().unwrap())
        .await
        .unwrap();

    let preview = import_api.describe_session(&session);
    assert_eq!(preview.preview.headers.len(), 5);
    // 预览只读到第 6 行，总行数为估算值
    assert!(!preview.preview.row_count_exact);
    assert!(preview.preview.total_row_count >= 6);
    assert_eq!(preview.preview.sample_rows.len(), 5);
    assert!(preview.validation.valid);
    assert_eq!(preview.unused_headers, vec!["Owner".to_string()]);
    assert_eq!(
        preview.effective_mapping.get("report_line_item_key").map(String::as_str),
        Some("Key")
    );

    let response = import_api
        .commit(&session, ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(response.outcome.version, 1);
    assert_eq!(response.outcome.line_items_count, 6);
    assert!(response.outcome.structure_name.starts_with("Balance Sheet"));
    assert!(!response.outcome.structure_name.ends_with(".csv"));

    let structure_api = StructureApi::new(db.conn.clone());
    let structures = structure_api.list_structures().unwrap();
    assert_eq!(structures.len(), 1);
    assert_eq!(structures[0].line_items_count, 6);

    // 未映射列逐行保存
    let unmapped = structure_api
        .list_unmapped_columns(&response.outcome.structure_id, None)
        .unwrap();
    assert_eq!(unmapped.len(), 6);
    assert_eq!(unmapped[2].row_index, 2);
    assert_eq!(unmapped[2].columns["Owner"], "treasury");
}

#[tokio::test]
async fn test_overwrite_bumps_version_and_replaces_items() {
    logging::init_test();
    let db = create_test_db().unwrap();
    let import_api = ImportApi::new(db.conn.clone());

    let first = write_csv("coa ", &balance_sheet_lines()).unwrap();
    let created = import_api
        .import_file(
            first.path().to_str().unwrap(),
            ImportOptions::new_structure("Chart of Accounts"),
        )
        .await
        .unwrap();

    let second = write_csv("coa-v2 ", &["Key,Description", "X,Only item"]).unwrap();
    let replaced = import_api
        .import_file(
            second.path().to_str().unwrap(),
            ImportOptions::overwrite(created.outcome.structure_id.clone()),
        )
        .await
        .unwrap();

    assert_eq!(replaced.outcome.structure_id, created.outcome.structure_id);
    assert_eq!(replaced.outcome.version, 2);
    assert_eq!(replaced.outcome.structure_name, "Chart of Accounts");
    assert_eq!(replaced.outcome.line_items_count, 1);

    let tree = StructureApi::new(db.conn.clone())
        .get_structure_tree(&created.outcome.structure_id)
        .unwrap();
    assert_eq!(tree.structure.version, 2);
    assert_eq!(tree.total_items, 1);
    assert_eq!(tree.roots[0].label, "Only item");
}

#[tokio::test]
async fn test_overwrite_missing_structure_is_upstream_failure() {
    let db = create_test_db().unwrap();
    let file = write_csv("coa ", &["Key", "A"]).unwrap();

    let result = ImportApi::new(db.conn.clone())
        .import_file(file.path().to_str().unwrap(), ImportOptions::overwrite("no-such-id"))
        .await;

    assert!(matches!(result, Err(ApiError::UpstreamFailure(_))));
    assert!(StructureApi::new(db.conn.clone())
        .list_structures()
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_missing_key_mapping_blocks_commit() {
    let db = create_test_db().unwrap();
    let file = write_csv("codes ", &["Code,Label", "A,Assets"]).unwrap();
    let import_api = ImportApi::new(db.conn.clone());

    let mut session = import_api
        .open_session(file.path().to_str().unwrap())
        .await
        .unwrap();
    assert!(!import_api.describe_session(&session).validation.valid);

    match import_api.commit(&session, ImportOptions::default()).await {
        Err(ApiError::MappingIncomplete { missing_required }) => {
            assert_eq!(missing_required, vec!["report_line_item_key".to_string()]);
        }
        other => panic!("Expected MappingIncomplete, got {:?}", other.map(|r| r.outcome)),
    }
    assert!(StructureApi::new(db.conn.clone())
        .list_structures()
        .unwrap()
        .is_empty());

    // 人工补齐映射后可提交
    let validation = import_api
        .update_mapping(&mut session, "Code", "report_line_item_key")
        .unwrap();
    assert!(validation.valid);
    assert!(matches!(
        import_api.update_mapping(&mut session, "Code", "no_such_field"),
        Err(ApiError::InvalidInput(_))
    ));
    assert!(matches!(
        import_api.update_mapping(&mut session, "Missing", "report_line_item_key"),
        Err(ApiError::InvalidInput(_))
    ));

    let response = import_api
        .commit(&session, ImportOptions::new_structure("Codes"))
        .await
        .unwrap();
    assert_eq!(response.outcome.line_items_count, 1);
    assert_eq!(response.unmapped_headers, vec!["Label".to_string()]);
}

#[tokio::test]
async fn test_blank_structure_name_is_rejected() {
    let db = create_test_db().unwrap();
    let file = write_csv("coa ", &["Key", "A"]).unwrap();

    let result = ImportApi::new(db.conn.clone())
        .import_file(file.path().to_str().unwrap(), ImportOptions::new_structure("  "))
        .await;
    assert!(matches!(result, Err(ApiError::InvalidInput(_))));
}

#[tokio::test]
async fn test_config_overrides_apply() {
    let db = create_test_db().unwrap();
    insert_test_config(&db, config_keys::IMPORT_PREVIEW_ROWS, "2").unwrap();
    let file = write_csv("coa ", &balance_sheet_lines()).unwrap();
    let import_api = ImportApi::new(db.conn.clone());

    let session = import_api
        .open_session(file.path().to_str().unwrap())
        .await
        .unwrap();
    assert_eq!(session.preview().sample_rows.len(), 2);

    insert_test_config(&db, config_keys::IMPORT_MAX_UPLOAD_BYTES, "16").unwrap();
    assert!(matches!(
        import_api.open_session(file.path().to_str().unwrap()).await,
        Err(ApiError::FileTooLarge { limit: 16, .. })
    ));
}

#[tokio::test]
async fn test_small_batch_size_imports_all_rows() {
    let db = create_test_db().unwrap();
    insert_test_config(&db, config_keys::IMPORT_UPLOAD_BATCH_SIZE, "2").unwrap();
    let file = write_csv("coa ", &balance_sheet_lines()).unwrap();

    let response = ImportApi::new(db.conn.clone())
        .import_file(file.path().to_str().unwrap(), ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(response.outcome.line_items_count, 6);
}

#[tokio::test]
async fn test_unsupported_and_missing_files() {
    let db = create_test_db().unwrap();
    let import_api = ImportApi::new(db.conn.clone());

    assert!(matches!(
        import_api.open_session("/definitely/not/here.csv").await,
        Err(ApiError::FileNotFound(_))
    ));
    assert!(matches!(
        import_api.open_session("").await,
        Err(ApiError::InvalidInput(_))
    ));

    let text = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    std::fs::write(text.path(), "Key\nA\n").unwrap();
    assert!(matches!(
        import_api.open_session(text.path().to_str().unwrap()).await,
        Err(ApiError::UnsupportedFile(_))
    ));

    let header_only = write_csv("empty ", &["Key,Description"]).unwrap();
    assert!(matches!(
        import_api.open_session(header_only.path().to_str().unwrap()).await,
        Err(ApiError::EmptyFile)
    ));
}

#[tokio::test]
async fn test_unmapped_column_named_like_target_is_not_applied() {
    let db = create_test_db().unwrap();
    let file = write_csv("flags ", &["Key,Description,display", "A,Assets,no"]).unwrap();
    let import_api = ImportApi::new(db.conn.clone());

    let mut session = import_api
        .open_session(file.path().to_str().unwrap())
        .await
        .unwrap();
    assert_eq!(
        import_api
            .describe_session(&session)
            .effective_mapping
            .get("display")
            .map(String::as_str),
        Some("display")
    );
    import_api
        .update_mapping(&mut session, "display", "unmapped")
        .unwrap();

    let response = import_api
        .commit(&session, ImportOptions::new_structure("Flags"))
        .await
        .unwrap();
    assert_eq!(response.unmapped_headers, vec!["display".to_string()]);

    let structure_api = StructureApi::new(db.conn.clone());
    let tree = structure_api
        .get_structure_tree(&response.outcome.structure_id)
        .unwrap();
    assert!(tree.roots[0].display);

    // 原值保留在审计通道
    let unmapped = structure_api
        .list_unmapped_columns(&response.outcome.structure_id, None)
        .unwrap();
    assert_eq!(unmapped[0].columns["display"], "no");
}
