//! End-to-end tests for incremental view maintenance.

use vireo_database::{
    AggFunc, CmpOp, Database, DataType, MaintenanceError, Predicate, QueryNode, Row, SetOpKind,
    TableDef, Value,
};

fn db_with_table() -> std::sync::Arc<Database> {
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

fn values(rows: &[Row]) -> Vec<Vec<Value>> {
    rows.iter().map(|r| r.values.clone()).collect()
}

#[test]
fn count_per_group_tracks_inserts_and_deletes() {
    let db = db_with_table();
    let mut s = db.connect();
    s.create_view(
        "counts",
        QueryNode::scan("t").aggregate(vec![0], vec![AggFunc::CountStar]),
        true,
    )
    .unwrap();

    s.insert("t", vec![Value::Int64(1), Value::Int64(10)]).unwrap();
    s.insert("t", vec![Value::Int64(1), Value::Int64(20)]).unwrap();
    s.insert("t", vec![Value::Int64(2), Value::Int64(30)]).unwrap();

    assert_eq!(
        values(&s.query_view("counts").unwrap()),
        vec![
            vec![Value::Int64(1), Value::Int64(2)],
            vec![Value::Int64(2), Value::Int64(1)],
        ]
    );

    s.delete_where("t", &Predicate::compare(1, CmpOp::Eq, Value::Int64(20)))
        .unwrap();
    assert_eq!(
        values(&s.query_view("counts").unwrap()),
        vec![
            vec![Value::Int64(1), Value::Int64(1)],
            vec![Value::Int64(2), Value::Int64(1)],
        ]
    );

    // Deleting the last row of a group removes the group's view row.
    s.delete_where("t", &Predicate::compare(0, CmpOp::Eq, Value::Int64(1)))
        .unwrap();
    assert_eq!(
        values(&s.query_view("counts").unwrap()),
        vec![vec![Value::Int64(2), Value::Int64(1)]]
    );
}

#[test]
fn update_moves_row_between_groups() {
    let db = db_with_table();
    let mut s = db.connect();
    s.create_view(
        "sums",
        QueryNode::scan("t").aggregate(vec![0], vec![AggFunc::Sum(1)]),
        true,
    )
    .unwrap();

    s.insert("t", vec![Value::Int64(1), Value::Int64(10)]).unwrap();
    s.insert("t", vec![Value::Int64(2), Value::Int64(5)]).unwrap();

    let updated = s
        .update_where(
            "t",
            &Predicate::compare(0, CmpOp::Eq, Value::Int64(1)),
            &[(0, Value::Int64(2))],
        )
        .unwrap();
    assert_eq!(updated, 1);

    assert_eq!(
        values(&s.query_view("sums").unwrap()),
        vec![vec![Value::Int64(2), Value::Float64(15.0)]]
    );
}

#[test]
fn min_survives_extremum_deletion() {
    let db = db_with_table();
    let mut s = db.connect();
    s.create_view(
        "mins",
        QueryNode::scan("t").aggregate(vec![0], vec![AggFunc::Min(1)]),
        true,
    )
    .unwrap();

    s.insert("t", vec![Value::Int64(1), Value::Int64(3)]).unwrap();
    s.insert("t", vec![Value::Int64(1), Value::Int64(9)]).unwrap();
    s.insert("t", vec![Value::Int64(1), Value::Int64(7)]).unwrap();

    s.delete_where("t", &Predicate::compare(1, CmpOp::Eq, Value::Int64(3)))
        .unwrap();
    assert_eq!(
        values(&s.query_view("mins").unwrap()),
        vec![vec![Value::Int64(1), Value::Int64(7)]]
    );
}

#[test]
fn global_aggregate_keeps_one_row() {
    let db = db_with_table();
    let mut s = db.connect();
    s.create_view(
        "totals",
        QueryNode::scan("t").aggregate(vec![], vec![AggFunc::CountStar, AggFunc::Sum(1)]),
        true,
    )
    .unwrap();

    assert_eq!(
        values(&s.query_view("totals").unwrap()),
        vec![vec![Value::Int64(0), Value::Null]]
    );

    s.insert("t", vec![Value::Int64(1), Value::Int64(10)]).unwrap();
    assert_eq!(
        values(&s.query_view("totals").unwrap()),
        vec![vec![Value::Int64(1), Value::Float64(10.0)]]
    );

    s.delete_where("t", &Predicate::compare(0, CmpOp::Eq, Value::Int64(1)))
        .unwrap();
    assert_eq!(
        values(&s.query_view("totals").unwrap()),
        vec![vec![Value::Int64(0), Value::Null]]
    );
}

#[test]
fn join_view_updates_from_either_side() {
    let db = Database::new();
    db.create_table(
        TableDef::builder("users")
            .column("id", DataType::Int64)
            .build()
            .unwrap(),
    )
    .unwrap();
    db.create_table(
        TableDef::builder("orders")
            .column("user_id", DataType::Int64)
            .column("amount", DataType::Int64)
            .build()
            .unwrap(),
    )
    .unwrap();

    let mut s = db.connect();
    s.create_view(
        "user_orders",
        QueryNode::scan("users").join(QueryNode::scan("orders"), vec![(0, 0)]),
        true,
    )
    .unwrap();

    s.insert("orders", vec![Value::Int64(1), Value::Int64(10)]).unwrap();
    assert!(s.query_view("user_orders").unwrap().is_empty());

    s.insert("users", vec![Value::Int64(1)]).unwrap();
    assert_eq!(
        values(&s.query_view("user_orders").unwrap()),
        vec![vec![Value::Int64(1), Value::Int64(1), Value::Int64(10)]]
    );

    s.delete_where("orders", &Predicate::compare(0, CmpOp::Eq, Value::Int64(1)))
        .unwrap();
    assert!(s.query_view("user_orders").unwrap().is_empty());
}

#[test]
fn distinct_view_hides_duplicates() {
    let db = db_with_table();
    let mut s = db.connect();
    s.create_view(
        "distinct_a",
        QueryNode::scan("t").project(vec![0]).distinct(),
        true,
    )
    .unwrap();

    s.insert("t", vec![Value::Int64(1), Value::Int64(10)]).unwrap();
    s.insert("t", vec![Value::Int64(1), Value::Int64(20)]).unwrap();
    assert_eq!(
        values(&s.query_view("distinct_a").unwrap()),
        vec![vec![Value::Int64(1)]]
    );

    // One duplicate goes away; the distinct row stays until the last one.
    s.delete_where("t", &Predicate::compare(1, CmpOp::Eq, Value::Int64(10)))
        .unwrap();
    assert_eq!(
        values(&s.query_view("distinct_a").unwrap()),
        vec![vec![Value::Int64(1)]]
    );

    s.delete_where("t", &Predicate::compare(1, CmpOp::Eq, Value::Int64(20)))
        .unwrap();
    assert!(s.query_view("distinct_a").unwrap().is_empty());
}

#[test]
fn set_operation_views() {
    let db = Database::new();
    for name in ["a", "b"] {
        db.create_table(
            TableDef::builder(name)
                .column("x", DataType::Int64)
                .build()
                .unwrap(),
        )
        .unwrap();
    }
    let mut s = db.connect();
    let left = || QueryNode::scan("a");
    let right = || QueryNode::scan("b");
    s.create_view("u", QueryNode::set_op(SetOpKind::Union, left(), right()), true)
        .unwrap();
    s.create_view(
        "ua",
        QueryNode::set_op(SetOpKind::UnionAll, left(), right()),
        true,
    )
    .unwrap();
    s.create_view(
        "i",
        QueryNode::set_op(SetOpKind::Intersect, left(), right()),
        true,
    )
    .unwrap();
    s.create_view(
        "e",
        QueryNode::set_op(SetOpKind::Except, left(), right()),
        true,
    )
    .unwrap();

    s.insert("a", vec![Value::Int64(1)]).unwrap();
    s.insert("a", vec![Value::Int64(2)]).unwrap();
    s.insert("b", vec![Value::Int64(2)]).unwrap();

    assert_eq!(
        values(&s.query_view("u").unwrap()),
        vec![vec![Value::Int64(1)], vec![Value::Int64(2)]]
    );
    assert_eq!(
        values(&s.query_view("ua").unwrap()),
        vec![
            vec![Value::Int64(1)],
            vec![Value::Int64(2)],
            vec![Value::Int64(2)]
        ]
    );
    assert_eq!(
        values(&s.query_view("i").unwrap()),
        vec![vec![Value::Int64(2)]]
    );
    assert_eq!(
        values(&s.query_view("e").unwrap()),
        vec![vec![Value::Int64(1)]]
    );

    // Removing the right-hand copy brings 2 back into the difference.
    s.delete_where("b", &Predicate::compare(0, CmpOp::Eq, Value::Int64(2)))
        .unwrap();
    assert_eq!(
        values(&s.query_view("e").unwrap()),
        vec![vec![Value::Int64(1)], vec![Value::Int64(2)]]
    );
    assert!(s.query_view("i").unwrap().is_empty());
}

#[test]
fn unpopulated_view_rejects_queries_until_refreshed() {
    let db = db_with_table();
    let mut s = db.connect();
    s.create_view("v", QueryNode::scan("t"), false).unwrap();

    let err = s.query_view("v").unwrap_err();
    assert!(matches!(err, MaintenanceError::ViewNotPopulated { .. }));

    // Base writes while unpopulated are fine; maintenance is a no-op.
    s.insert("t", vec![Value::Int64(1), Value::Int64(10)]).unwrap();

    s.refresh_view("v", true).unwrap();
    assert_eq!(
        values(&s.query_view("v").unwrap()),
        vec![vec![Value::Int64(1), Value::Int64(10)]]
    );
}

#[test]
fn refresh_matches_incremental_result() {
    let db = db_with_table();
    let mut s = db.connect();
    s.create_view(
        "v",
        QueryNode::scan("t").aggregate(vec![0], vec![AggFunc::CountStar, AggFunc::Avg(1)]),
        true,
    )
    .unwrap();

    for i in 0..20 {
        s.insert("t", vec![Value::Int64(i % 3), Value::Int64(i)]).unwrap();
    }
    s.delete_where("t", &Predicate::compare(1, CmpOp::Lt, Value::Int64(5)))
        .unwrap();

    let incremental = values(&s.query_view("v").unwrap());
    s.refresh_view("v", true).unwrap();
    let refreshed = values(&s.query_view("v").unwrap());
    assert_eq!(incremental, refreshed);

    // Refresh is idempotent.
    s.refresh_view("v", true).unwrap();
    assert_eq!(values(&s.query_view("v").unwrap()), refreshed);
}

#[test]
fn refresh_with_no_data_unpopulates() {
    let db = db_with_table();
    let mut s = db.connect();
    s.create_view("v", QueryNode::scan("t"), true).unwrap();
    s.insert("t", vec![Value::Int64(1), Value::Int64(10)]).unwrap();

    s.refresh_view("v", false).unwrap();
    assert!(matches!(
        s.query_view("v").unwrap_err(),
        MaintenanceError::ViewNotPopulated { .. }
    ));
}

#[test]
fn ineligible_queries_rejected_at_creation() {
    let db = db_with_table();
    let mut s = db.connect();
    let nested = QueryNode::scan("t")
        .aggregate(vec![0], vec![AggFunc::CountStar])
        .distinct();
    assert!(matches!(
        s.create_view("v", nested, true).unwrap_err(),
        MaintenanceError::IneligibleQueryShape { .. }
    ));

    // Unknown tables are caught before the catalog changes.
    assert!(matches!(
        s.create_view("v", QueryNode::scan("missing"), true).unwrap_err(),
        MaintenanceError::TableNotFound { .. }
    ));
    assert!(matches!(
        s.query_view("v").unwrap_err(),
        MaintenanceError::ViewNotFound { .. }
    ));
}

#[test]
fn drop_view_stops_maintenance() {
    let db = db_with_table();
    let mut s = db.connect();
    s.create_view("v", QueryNode::scan("t"), true).unwrap();
    s.drop_view("v").unwrap();
    s.insert("t", vec![Value::Int64(1), Value::Int64(10)]).unwrap();
    assert!(matches!(
        s.query_view("v").unwrap_err(),
        MaintenanceError::ViewNotFound { .. }
    ));
}

#[test]
fn self_join_maintained_in_one_statement() {
    let db = db_with_table();
    let mut s = db.connect();
    s.create_view(
        "pairs",
        QueryNode::scan("t").join(QueryNode::scan("t"), vec![(0, 0)]),
        true,
    )
    .unwrap();

    s.insert("t", vec![Value::Int64(1), Value::Int64(10)]).unwrap();
    // One matching row on each side joins with itself exactly once.
    assert_eq!(s.query_view("pairs").unwrap().len(), 1);

    s.insert("t", vec![Value::Int64(1), Value::Int64(20)]).unwrap();
    // Two rows with the same key produce four pairs.
    assert_eq!(s.query_view("pairs").unwrap().len(), 4);
}
