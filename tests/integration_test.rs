/// End-to-end integration tests for the boardcore pipeline.
///
/// Tests the complete flow:
///   Config → Store → Schema → Items → Relationships → Lead conversion → Export
use boardcore::config::Config;
use boardcore::error::StoreError;
use boardcore::prefs::{self, FilePrefs, PrefStore};
use boardcore::store::Store;
use boardcore::store::models::*;
use serde_json::json;
use tempfile::tempdir;

fn data(entries: serde_json::Value) -> DataMap {
    entries.as_object().unwrap().clone()
}

/// Full pipeline: schema → records → links → conversion → export
#[test]
fn test_full_pipeline() {
    // 1. Store on disk, reopened between stages
    let temp_dir = tempdir().unwrap();
    let db_path = temp_dir.path().join("boards.db");
    let mut store = Store::open(&db_path).unwrap();

    // 2. Boards and columns
    let customers = store.create_board("Customers", Some("All accounts")).unwrap();
    let deals = store.create_board("Deals", None).unwrap();

    store
        .create_column(customers.id, "Name", ColumnType::Text, ColumnOptions::default(), true, None)
        .unwrap();
    store
        .create_column(customers.id, "Since", ColumnType::Date, ColumnOptions::default(), false, None)
        .unwrap();
    store
        .create_column(deals.id, "Title", ColumnType::Text, ColumnOptions::default(), true, None)
        .unwrap();
    store
        .create_column(deals.id, "Amount", ColumnType::Number, ColumnOptions::default(), false, None)
        .unwrap();
    store
        .create_column(deals.id, "Stage", ColumnType::Status, ColumnOptions::default(), false, None)
        .unwrap();
    store
        .create_column(
            deals.id,
            "Customer",
            ColumnType::BoardLink,
            ColumnOptions::linked_to(customers.id),
            false,
            None,
        )
        .unwrap();

    // 3. Required validation rejects before writing
    let err = store
        .create_item(deals.id, data(json!({"Amount": 10_000})))
        .unwrap_err();
    match err {
        StoreError::MissingRequired { missing } => assert_eq!(missing, vec!["Title"]),
        other => panic!("expected MissingRequired, got {other:?}"),
    }
    assert!(store.list_items(deals.id).unwrap().is_empty());

    // 4. Items, with number coercion and a status from the fallback list
    let acme = store
        .create_item(
            customers.id,
            data(json!({"Name": "Acme", "Since": "2024-06-01"})),
        )
        .unwrap();
    let renewal = store
        .create_item(
            deals.id,
            data(json!({
                "Title": "Acme renewal",
                "Amount": "12500",
                "Stage": "בעבודה",
                "Customer": acme.id
            })),
        )
        .unwrap();
    assert_eq!(renewal.data["Amount"], json!(12500));
    assert_eq!(renewal.item_order, 0);

    // 5. Board-link search over the linked board
    let hits = store.search_items(customers.id, "acm").unwrap();
    assert_eq!(hits.len(), 1);
    assert!(store.search_items(customers.id, "initech").unwrap().is_empty());
    let seeded = store.create_linked_item(customers.id, "Initech").unwrap();
    assert_eq!(seeded.data["Name"], json!("Initech"));

    // 6. Relationship and links
    let rel = store
        .create_relationship(deals.id, customers.id, RelationshipType::ManyToMany, "customer", "deals")
        .unwrap();
    store
        .create_item_relationship(rel.id, renewal.id, acme.id)
        .unwrap();

    let deals_rels = store.relationships_for_board(deals.id).unwrap();
    assert_eq!(deals_rels.len(), 1);
    let customers_rels = store.relationships_for_board(customers.id).unwrap();
    assert_eq!(customers_rels.len(), 1);
    assert_eq!(deals_rels[0].id, customers_rels[0].id);

    let linked = store.linked_items(renewal.id, LinkDirection::Both).unwrap();
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].id, acme.id);

    // 7. Lead conversion lands in the board and stamps the lead once
    let lead = store.create_lead("Dana Cohen", "webform", Some(5), None).unwrap();
    let (converted, item) = store
        .convert_lead(lead.id, customers.id, data(json!({"Name": "Dana Cohen"})))
        .unwrap();
    assert_eq!(converted.status, LeadStatus::Converted);
    assert_eq!(converted.converted_to_board_id, Some(customers.id));
    assert_eq!(converted.converted_to_item_id, Some(item.id));
    assert_eq!(item.data["Name"], json!("Dana Cohen"));

    let again = store.convert_lead(lead.id, customers.id, data(json!({"Name": "Dana"})));
    assert!(matches!(again, Err(StoreError::LeadAlreadyConverted(_))));
    assert_eq!(store.list_items(customers.id).unwrap().len(), 3);

    // 8. CSV export in column order
    let mut out = Vec::new();
    boardcore::export::export_board(&store, customers.id, &mut out).unwrap();
    let csv = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "Name,Since");
    assert_eq!(lines.len(), 4);
    assert!(lines[1].starts_with("Acme,"));

    // 9. Reopen: everything survived
    drop(store);
    let store = Store::open(&db_path).unwrap();
    assert_eq!(store.list_boards().unwrap().len(), 2);
    assert_eq!(store.list_items(customers.id).unwrap().len(), 3);
    assert_eq!(
        store.get_lead(lead.id).unwrap().status,
        LeadStatus::Converted
    );
}

/// Test config defaults, validation and file round trip
#[test]
fn test_config_defaults_and_validation() {
    let config = Config::default();
    assert_eq!(config.db_path, "./boards.db");
    assert_eq!(config.search_limit, 50);
    assert!(config.validate().is_ok());

    let mut bad_config = Config::default();
    bad_config.listen_addr = "nowhere".to_string();
    assert!(bad_config.validate().is_err());

    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("config.json");
    config.save(path.to_str().unwrap()).unwrap();
    let loaded = Config::load(path.to_str().unwrap()).unwrap();
    assert_eq!(loaded.db_path, config.db_path);
}

/// Test tenancy provisioning and permission checks
#[test]
fn test_tenancy_flow() {
    let store = Store::open_in_memory().unwrap();

    let org = store.create_organization("Acme Ltd", "acme").unwrap();
    let tenant = store.create_tenant(org.id).unwrap();
    assert_eq!(
        store.get_tenant_by_subdomain("acme").unwrap().unwrap().id,
        tenant.id
    );

    let board = store.create_board("Deals", None).unwrap();
    store
        .grant_board_permission(board.id, "dana", Permission::View)
        .unwrap();
    assert!(store.check_board_permission(board.id, "dana", Permission::View).unwrap());
    assert!(!store.check_board_permission(board.id, "dana", Permission::Edit).unwrap());

    let template = store.create_template("Sales pipeline").unwrap();
    store.increment_template_usage(template.id).unwrap();
    assert_eq!(store.increment_template_usage(template.id).unwrap(), 2);
}

/// Test preference store round trip through a real file
#[test]
fn test_prefs_round_trip() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("prefs.json");

    {
        let mut store = FilePrefs::open(&path).unwrap();
        let view = prefs::BoardViewSettings {
            version: 1,
            visible_columns: vec!["Name".into()],
            sort_column: None,
            sort_descending: false,
        };
        prefs::set_pref(&mut store, &prefs::board_view_key(1), &view).unwrap();
        prefs::set_pref(&mut store, prefs::TOP_TABS_KEY, &vec!["Deals", "Leads"]).unwrap();
    }

    let store = FilePrefs::open(&path).unwrap();
    let view: prefs::BoardViewSettings =
        prefs::get_pref(&store, &prefs::board_view_key(1)).unwrap();
    assert_eq!(view.visible_columns, vec!["Name"]);
    let tabs: Vec<String> = prefs::get_pref(&store, prefs::TOP_TABS_KEY).unwrap();
    assert_eq!(tabs, vec!["Deals", "Leads"]);

    // The raw document is plain JSON under fixed keys.
    let raw = store.get_raw(prefs::TOP_TABS_KEY).unwrap();
    assert_eq!(raw, r#"["Deals","Leads"]"#);
}
