//! Cross-session behavior: lock waiting and independent maintenance.

use std::thread;
use std::time::Duration;
use vireo_database::{AggFunc, Database, DataType, QueryNode, TableDef, Value};

fn setup() -> std::sync::Arc<Database> {
    let db = Database::new();
    db.create_table(
        TableDef::builder("t")
            .column("a", DataType::Int64)
            .column("b", DataType::Int64)
            .build()
            .unwrap(),
    )
    .unwrap();
    db
}

#[test]
fn refresh_waits_for_concurrent_maintainer() {
    let db = setup();
    let mut s1 = db.connect();
    s1.create_view(
        "counts",
        QueryNode::scan("t").aggregate(vec![0], vec![AggFunc::CountStar]),
        true,
    )
    .unwrap();

    s1.begin().unwrap();
    s1.insert("t", vec![Value::Int64(1), Value::Int64(10)]).unwrap();

    let refresher = {
        let db = db.clone();
        thread::spawn(move || {
            let mut s2 = db.connect();
            // Blocks until s1 commits and releases the view lock.
            s2.refresh_view("counts", true).unwrap();
            s2.query_view("counts").unwrap()
        })
    };

    thread::sleep(Duration::from_millis(50));
    s1.commit().unwrap();

    let rows = refresher.join().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values, vec![Value::Int64(1), Value::Int64(1)]);
}

#[test]
fn sessions_maintain_disjoint_views_independently() {
    let db = Database::new();
    for name in ["x", "y"] {
        db.create_table(
            TableDef::builder(name)
                .column("a", DataType::Int64)
                .build()
                .unwrap(),
        )
        .unwrap();
    }
    let mut s = db.connect();
    s.create_view("vx", QueryNode::scan("x"), true).unwrap();
    s.create_view("vy", QueryNode::scan("y"), true).unwrap();

    let mut s1 = db.connect();
    s1.begin().unwrap();
    s1.insert("x", vec![Value::Int64(1)]).unwrap();

    // A different session can maintain the other view while s1 is open.
    let writer = {
        let db = db.clone();
        thread::spawn(move || {
            let mut s2 = db.connect();
            s2.insert("y", vec![Value::Int64(2)]).unwrap();
        })
    };
    writer.join().unwrap();

    s1.commit().unwrap();
    assert_eq!(s.query_view("vx").unwrap().len(), 1);
    assert_eq!(s.query_view("vy").unwrap().len(), 1);
}

#[test]
fn many_writers_one_view() {
    let db = setup();
    let mut s = db.connect();
    s.create_view(
        "counts",
        QueryNode::scan("t").aggregate(vec![0], vec![AggFunc::CountStar]),
        true,
    )
    .unwrap();

    let mut handles = Vec::new();
    for i in 0..4 {
        let db = db.clone();
        handles.push(thread::spawn(move || {
            let mut session = db.connect();
            let mut done = 0;
            for j in 0..25 {
                // Autocommit statements retry when another writer holds the
                // view lock for the duration of its own statement.
                loop {
                    match session.insert("t", vec![Value::Int64(i), Value::Int64(j)]) {
                        Ok(()) => break,
                        Err(_) => thread::sleep(Duration::from_millis(1)),
                    }
                }
                done += 1;
            }
            done
        }));
    }
    let total: i64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(total, 100);

    let rows = s.query_view("counts").unwrap();
    assert_eq!(rows.len(), 4);
    for row in rows {
        assert_eq!(row.values[1], Value::Int64(25));
    }
}
