use dbmsdb::{
    Client, DeleteOptions, Error, ErrorKind, ExplainOptions, InsertOptions, QueryOptions, ReadOptions,
    ReplaceOptions, UpdateOptions,
};
use dbmsdb_mock::{MockConfig, MockServer};
use serde_json::{json, Map};

fn start() -> (MockServer, Client) {
    let server = MockServer::start(MockConfig::ephemeral()).unwrap();
    let client = Client::from_url(server.url()).unwrap();
    (server, client)
}

#[tokio::test]
async fn test_relation_lifecycle() {
    let (_server, client) = start();
    let db = client.database("school");

    assert!(!db.version().await.unwrap().is_empty());
    assert!(!db.has_relation("students").await.unwrap());

    let props = db.create_relation("students", Some(true)).await.unwrap();
    assert_eq!(props["name"], "students");
    assert_eq!(props["waitForSync"], true);
    assert!(props.get("error").is_none());

    let err = db.create_relation("students", None).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::RelationCreate));
    assert_eq!(err.http_code(), Some(409));

    assert!(db.has_relation("students").await.unwrap());
    assert_eq!(db.relations().await.unwrap().len(), 1);

    assert!(db.delete_relation("students", false).await.unwrap());
    assert!(!db.delete_relation("students", true).await.unwrap());
    let err = db.delete_relation("students", false).await.unwrap_err();
    assert_eq!(err.error_code(), Some(dbmsdb::errno::DATA_SOURCE_NOT_FOUND));
}

#[tokio::test]
async fn test_document_crud() {
    let (_server, client) = start();
    let db = client.database("school");
    db.create_relation("students", None).await.unwrap();
    let students = db.relation("students");

    let meta = students
        .insert(
            json!({"_key": "Kris", "age": 20, "address": {"city": "Oslo"}}),
            InsertOptions { return_new: true, ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(meta["new"]["age"], 20);
    let first_rev = meta["_rev"].as_str().unwrap().to_string();

    let err = students
        .insert(json!({"_key": "Kris"}), InsertOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::DocumentInsert));
    assert_eq!(err.error_code(), Some(dbmsdb::errno::UNIQUE_CONSTRAINT_VIOLATED));

    let updated = students
        .update(
            json!({"_key": "Kris", "address": {"zip": "0150"}}),
            UpdateOptions { return_new: true, ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(updated["_old_rev"], first_rev.as_str());
    assert_eq!(updated["new"]["address"], json!({"city": "Oslo", "zip": "0150"}));

    // The stored revision moved on, so the old one no longer matches
    let stale = ReadOptions { rev: Some(first_rev.clone()), check_rev: true };
    let err = students.get("Kris", stale).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::DocumentRevision));

    let replaced = students
        .replace(json!({"_id": "students/Kris", "name": "Kris"}), ReplaceOptions::default())
        .await
        .unwrap();
    assert!(replaced["_rev"].is_string());
    let doc = students.get("students/Kris", ReadOptions::default()).await.unwrap().unwrap();
    assert!(doc.get("address").is_none());
    assert_eq!(doc["name"], "Kris");

    assert_eq!(students.count().await.unwrap(), 1);
    assert!(students.has("Kris", ReadOptions::default()).await.unwrap());

    let silent = DeleteOptions { silent: true, ..Default::default() };
    assert_eq!(students.delete("Kris", silent).await.unwrap(), json!(true));
    assert!(!students.has("Kris", ReadOptions::default()).await.unwrap());
    assert_eq!(students.get("Kris", ReadOptions::default()).await.unwrap(), None);

    let missing = DeleteOptions { ignore_missing: true, ..Default::default() };
    assert_eq!(students.delete("Kris", missing).await.unwrap(), json!(false));
    let err = students.delete("Kris", DeleteOptions::default()).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::DocumentDelete));

    let err = students.get("courses/Rita", ReadOptions::default()).await.unwrap_err();
    assert!(matches!(err, Error::DocumentParse(_)));
}

#[tokio::test]
async fn test_cursor_paging_and_truncate() {
    let (server, client) = start();
    let db = client.database("school");
    db.create_relation("students", None).await.unwrap();
    let students = db.relation("students");
    for key in ["a", "b", "c", "d", "e"] {
        students.insert(json!({"_key": key}), InsertOptions::default()).await.unwrap();
    }

    let options = QueryOptions { count: true, batch_size: Some(2), ..Default::default() };
    let mut cursor = db.sql().execute("FOR s IN students RETURN s", options).await.unwrap();
    assert_eq!(cursor.count(), Some(5));
    assert!(cursor.has_more());
    assert_eq!(cursor.batch().len(), 2);
    assert!(cursor.statistics().is_some());

    let keys: Vec<String> = cursor
        .all()
        .await
        .unwrap()
        .iter()
        .map(|doc| doc["_key"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(keys, vec!["a", "b", "c", "d", "e"]);

    // The exhausted cursor is already gone on the server
    assert_eq!(cursor.close(true).await.unwrap(), Some(false));
    assert_eq!(server.with_store(|store| store.open_cursors("school")), 0);

    let options = QueryOptions { batch_size: Some(1), ..Default::default() };
    let mut early = db.sql().execute("FOR s IN students RETURN s", options).await.unwrap();
    assert_eq!(early.close(false).await.unwrap(), Some(true));

    assert!(students.truncate().await.unwrap());
    assert_eq!(students.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_query_validation_and_explain() {
    let (_server, client) = start();
    let db = client.database("school");
    db.create_relation("students", None).await.unwrap();

    let parsed = db.sql().validate("RETURN @name").await.unwrap();
    assert_eq!(parsed["bind_vars"], json!(["name"]));
    assert!(parsed.get("bindVars").is_none());

    let err = db.sql().validate("INVALID QUERY").await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::SqlQueryValidate));
    assert_eq!(err.error_code(), Some(dbmsdb::errno::QUERY_PARSE));

    let plan = db
        .sql()
        .explain("FOR s IN students RETURN s", ExplainOptions::default())
        .await
        .unwrap();
    assert!(plan["nodes"].is_array());

    let plans = db
        .sql()
        .explain("FOR s IN students RETURN s", ExplainOptions { all_plans: true, ..Default::default() })
        .await
        .unwrap();
    assert_eq!(plans.as_array().map(Vec::len), Some(1));

    let mut bind_vars = Map::new();
    bind_vars.insert("name".to_string(), json!("Rita"));
    let options = QueryOptions { bind_vars: Some(bind_vars), ..Default::default() };
    let mut cursor = db.sql().execute("RETURN @name", options).await.unwrap();
    assert_eq!(cursor.pop().unwrap(), json!("Rita"));

    let err = db.sql().execute("RETURN @name", QueryOptions::default()).await.unwrap_err();
    assert_eq!(err.error_code(), Some(dbmsdb::errno::QUERY_BIND_PARAMETER_MISSING));
}
