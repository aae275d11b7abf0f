// crates/flowsession/tests/store_test.rs

use flowcore::{DocumentFormat, FlowGraph, FlowNode, Position, Value};
use flowsession::{FileFlowStore, FlowStore, MemoryFlowStore, StoreError};
use tempfile::TempDir;

fn document() -> flowcore::FlowDocument {
    let mut graph = FlowGraph::new();
    graph
        .add_node(
            FlowNode::new("sum", "math:add".parse().unwrap())
                .with_input("a", Value::Number(1.0))
                .with_position(5.0, 6.0),
        )
        .unwrap();
    graph.set_meta_value("title", Value::from("Stored"));
    graph.to_document()
}

#[tokio::test]
async fn file_store_round_trips_each_format() {
    for format in [DocumentFormat::Json, DocumentFormat::Yaml] {
        let dir = TempDir::new().unwrap();
        let store = FileFlowStore::new(dir.path(), format);

        assert!(store.load("demo").await.unwrap().is_none());
        store.save("demo", &document()).await.unwrap();

        let file = dir.path().join(format!("demo.{}", format.extension()));
        assert!(file.exists());

        let loaded = store.load("demo").await.unwrap().unwrap();
        assert_eq!(loaded, document());
        let graph = loaded.into_graph().unwrap();
        assert_eq!(graph.node("sum").unwrap().meta.position, Position::new(5.0, 6.0));
    }
}

#[tokio::test]
async fn file_store_lists_and_deletes() {
    let dir = TempDir::new().unwrap();
    let store = FileFlowStore::new(dir.path().join("flows"), DocumentFormat::Json);

    assert!(store.list().await.unwrap().is_empty());
    store.save("b", &document()).await.unwrap();
    store.save("a", &document()).await.unwrap();
    std::fs::write(dir.path().join("flows").join("notes.txt"), "ignored").unwrap();

    assert_eq!(store.list().await.unwrap(), vec!["a", "b"]);
    assert!(store.delete("a").await.unwrap());
    assert!(!store.delete("a").await.unwrap());
    assert_eq!(store.list().await.unwrap(), vec!["b"]);
}

#[tokio::test]
async fn file_store_rejects_path_like_ids() {
    let dir = TempDir::new().unwrap();
    let store = FileFlowStore::new(dir.path(), DocumentFormat::Json);

    for id in ["../escape", "", "a/b", "name.json"] {
        assert!(matches!(
            store.save(id, &document()).await,
            Err(StoreError::InvalidId(_))
        ));
    }
}

#[tokio::test]
async fn memory_store_keeps_documents() {
    let store = MemoryFlowStore::new();
    store.save("x", &document()).await.unwrap();
    assert_eq!(store.load("x").await.unwrap(), Some(document()));
    assert_eq!(store.list().await.unwrap(), vec!["x"]);
    assert!(store.delete("x").await.unwrap());
    assert!(store.load("x").await.unwrap().is_none());
}
