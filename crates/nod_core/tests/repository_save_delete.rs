mod common;

use common::{registry, setup, Entry, Task};
use nod_core::repo::content_repo::ContentRepository;
use nod_core::repo::kv_repo::KvRepository;
use nod_core::repo::node_repo::NodeRepository;
use nod_core::repo::tag_repo::TagRepository;
use nod_core::{KvValue, MapperRegistry, Node, NodError, NodeRecord, Repository, Tag};

#[test]
fn save_assigns_id_and_round_trips_through_mapper() {
    let conn = setup();
    let repo = Repository::try_new(&conn, registry()).unwrap();

    let mut task = Task::new("write report");
    task.namespace_id = Some("team".to_string());
    task.priority = 3;
    task.body = Some("draft the summary".to_string());
    task.labels = vec!["urgent".to_string(), "work".to_string()];

    let id = repo.save(&task).unwrap();
    assert!(!id.is_empty());
    task.id = id.clone();

    let loaded: Task = repo.query().node_id(&id).with_all().first().unwrap();
    assert_eq!(loaded, task);
}

#[test]
fn save_replaces_side_data_instead_of_merging() {
    let conn = setup();
    let repo = Repository::new(&conn, MapperRegistry::new());

    let mut node = Node::new(NodeRecord::new("task", "", "a"));
    node.set_kv("a", 1_i64);
    node.set_content("old", "text");
    node = node.with_tag(Tag::new("first"));
    let id = repo.save_node(node).unwrap();

    let mut next = Node::new(NodeRecord::new("task", "", "a"));
    next.record.id = id.clone();
    next.set_kv("b", 2_i64);
    repo.save_node(next).unwrap();

    let stored = repo.get_node(&id).unwrap();
    assert_eq!(stored.kv.keys().collect::<Vec<_>>(), vec!["b"]);
    assert_eq!(stored.kv_value("b"), Some(&KvValue::Int(2)));
    assert!(stored.content.is_empty());
    assert!(stored.tags.is_empty());
}

#[test]
fn resave_keeps_created_at_and_moves_updated_at() {
    let conn = setup();
    let repo = Repository::new(&conn, MapperRegistry::new());

    let id = repo
        .save_node(Node::new(NodeRecord::new("task", "", "a")))
        .unwrap();
    conn.execute(
        "UPDATE nodes SET created_at = 1000, updated_at = 1000 WHERE id = ?1;",
        [id.as_str()],
    )
    .unwrap();

    let mut record = repo.get_node(&id).unwrap().record;
    record.name = "b".to_string();
    repo.save_node(Node::new(record)).unwrap();

    let stored = repo.get_node(&id).unwrap().record;
    assert_eq!(stored.name, "b");
    assert_eq!(stored.created_at.unwrap().timestamp_millis(), 1000);
    assert!(stored.updated_at.unwrap().timestamp_millis() > 1000);
}

#[test]
fn nan_number_aborts_the_save() {
    let conn = setup();
    let repo = Repository::new(&conn, MapperRegistry::new());

    let mut node = Node::new(NodeRecord::new("task", "", "a"));
    node.set_kv("ratio", f64::NAN);
    let err = repo.save_node(node).unwrap_err();
    assert!(matches!(err, NodError::InvalidData(_)));
    assert_eq!(repo.nodes().count().unwrap(), 0);

    let mut node = Node::new(NodeRecord::new("task", "", "b"));
    node.set_kv("ratio", 0.5);
    let id = repo.save_node(node).unwrap();
    assert_eq!(
        repo.get_node(&id).unwrap().kv_value("ratio"),
        Some(&KvValue::Number(0.5))
    );
}

#[test]
fn resave_keeps_content_created_at() {
    let conn = setup();
    let repo = Repository::new(&conn, MapperRegistry::new());

    let mut node = Node::new(NodeRecord::new("task", "", "a"));
    node.set_content("body", "first");
    let id = repo.save_node(node).unwrap();
    conn.execute(
        "UPDATE contents SET created_at = 1000, updated_at = 1000 WHERE node_id = ?1;",
        [id.as_str()],
    )
    .unwrap();

    let mut record = repo.get_node(&id).unwrap().record;
    record.name = "b".to_string();
    let mut next = Node::new(record);
    next.set_content("body", "second");
    next.set_content("notes", "new");
    next.content.get_mut("notes").unwrap().created_at =
        chrono::DateTime::from_timestamp_millis(2000);
    repo.save_node(next).unwrap();

    let stored = repo.get_node(&id).unwrap().content;
    let body = &stored["body"];
    assert_eq!(body.value.as_deref(), Some("second"));
    assert_eq!(body.created_at.unwrap().timestamp_millis(), 1000);
    assert!(body.updated_at.unwrap().timestamp_millis() > 1000);
    assert_eq!(stored["notes"].created_at.unwrap().timestamp_millis(), 2000);
}

#[test]
fn save_reuses_existing_tag_rows() {
    let conn = setup();
    let repo = Repository::new(&conn, MapperRegistry::new());

    let shared = Tag::with_id("tag-1", "shared");
    let first = repo
        .save_node(Node::new(NodeRecord::new("task", "", "a")).with_tag(shared.clone()))
        .unwrap();
    let second = repo
        .save_node(Node::new(NodeRecord::new("task", "", "b")).with_tag(shared))
        .unwrap();

    let tag_rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM tags;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(tag_rows, 1);
    assert_eq!(repo.tags().list_bindings(&first).unwrap().len(), 1);
    assert_eq!(repo.tags().list_for_node(&second).unwrap()[0].name, "shared");
}

#[test]
fn tag_without_id_gets_a_new_row_per_save() {
    let conn = setup();
    let repo = Repository::new(&conn, MapperRegistry::new());

    let id = repo
        .save_node(Node::new(NodeRecord::new("task", "", "a")).with_tag(Tag::new("loose")))
        .unwrap();
    let mut record = repo.get_node(&id).unwrap().record;
    record.name = "b".to_string();
    repo.save_node(Node::new(record).with_tag(Tag::new("loose")))
        .unwrap();

    let tag_rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM tags;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(tag_rows, 2);
    assert_eq!(repo.tags().list_bindings(&id).unwrap().len(), 1);
}

#[test]
fn delete_childless_node_removes_record_and_side_data() {
    let conn = setup();
    let repo = Repository::try_new(&conn, registry()).unwrap();

    let mut task = Task::new("done");
    task.body = Some("notes".to_string());
    task.labels = vec!["x".to_string()];
    let id = repo.save(&task).unwrap();

    repo.delete(&id).unwrap();

    let err = repo.query::<Task>().node_id(&id).first().unwrap_err();
    assert!(matches!(err, NodError::NotFound(_)));
    assert!(repo.tags().list_for_node(&id).unwrap().is_empty());
    assert!(repo.kv().list_for_node(&id).unwrap().is_empty());
    assert!(repo.content().list_for_node(&id).unwrap().is_empty());
}

#[test]
fn delete_node_with_child_fails_and_keeps_record() {
    let conn = setup();
    let repo = Repository::try_new(&conn, registry()).unwrap();

    let root = repo.save(&Entry::folder("root", None, "root")).unwrap();
    repo.save(&Entry::file("child", Some("root"), "a.txt", 4))
        .unwrap();

    let err = repo.delete(&root).unwrap_err();
    assert!(matches!(err, NodError::HasChildren(ref id) if id == "root"));
    assert!(repo.nodes().node_id("root").exists().unwrap());

    repo.delete("child").unwrap();
    repo.delete(&root).unwrap();
    assert_eq!(repo.nodes().count().unwrap(), 0);
}

#[test]
fn unregistered_pair_is_lookup_error() {
    let conn = setup();
    let repo = Repository::new(&conn, MapperRegistry::new());

    let err = repo.save(&Task::new("orphan")).unwrap_err();
    assert!(matches!(
        err,
        NodError::Lookup { ref node_type, ref node_kind } if node_type == "task" && node_kind.is_empty()
    ));

    repo.save_node(Node::new(NodeRecord::new("task", "", "raw")))
        .unwrap();
    let err = repo.query::<Task>().first().unwrap_err();
    assert!(matches!(err, NodError::Lookup { .. }));
}

#[test]
fn failed_transaction_rolls_back_all_writes() {
    let conn = setup();
    let repo = Repository::try_new(&conn, registry()).unwrap();

    let result = repo.transaction(|tx| {
        tx.save(&Task::new("one"))?;
        tx.transaction(|inner| inner.save(&Task::new("two")))?;
        Err::<(), _>(NodError::mapping("abort"))
    });

    assert!(matches!(result, Err(NodError::Mapping(_))));
    assert_eq!(repo.nodes().count().unwrap(), 0);
    assert!(conn.is_autocommit());
}

#[test]
fn failed_nested_transaction_keeps_outer_writes() {
    let conn = setup();
    let repo = Repository::try_new(&conn, registry()).unwrap();

    repo.transaction(|tx| {
        tx.save(&Task::new("kept"))?;
        let inner = tx.transaction(|inner| {
            inner.save(&Task::new("dropped"))?;
            Err::<(), _>(NodError::mapping("inner abort"))
        });
        assert!(inner.is_err());
        Ok(())
    })
    .unwrap();

    let titles: Vec<String> = repo
        .query::<Task>()
        .list()
        .unwrap()
        .into_iter()
        .map(|task| task.title)
        .collect();
    assert_eq!(titles, vec!["kept".to_string()]);
}

#[test]
fn typed_repository_is_bound_to_one_model() {
    let conn = setup();
    let repo = Repository::try_new(&conn, registry()).unwrap();
    let tasks = repo.typed::<Task>();

    let id = tasks
        .transaction(|tx| {
            let mut task = Task::new("typed");
            task.priority = 9;
            tx.save(&task)
        })
        .unwrap();

    let loaded = tasks.get(&id).unwrap();
    assert_eq!(loaded.priority, 9);
    assert_eq!(tasks.query().count().unwrap(), 1);

    tasks.delete(&id).unwrap();
    assert!(!tasks.query().exists().unwrap());
}

#[test]
fn node_records_keep_metadata_json() {
    let conn = setup();
    let repo = Repository::new(&conn, MapperRegistry::new());

    let mut record = NodeRecord::new("task", "", "meta");
    record.metadata = serde_json::json!({"color": "red", "weight": 2});
    let id = repo.save_node(Node::new(record)).unwrap();

    let stored = repo.node_records().get_node(&id).unwrap().unwrap();
    assert_eq!(stored.metadata["color"], "red");
    assert!(!repo.node_records().has_children(&id).unwrap());
    assert!(repo.node_records().delete_node(&id).unwrap());
    assert!(repo.node_records().get_node(&id).unwrap().is_none());
}
