//! Integration tests for the in-memory hash join.

use chrono::{TimeZone, Utc};
use joinery::core::{PrimaryKey, Scalar};
use joinery::error::{JoinSide, JoineryError};
use joinery::prelude::*;

fn users() -> TabularDataset {
    TabularDataset::from_values(
        &["id", "name", "created"],
        vec![
            vec![Scalar::Int(1), Scalar::from("Ada"), Scalar::from("2024-01-01")],
            vec![Scalar::Int(2), Scalar::from("Grace"), Scalar::from("2024-02-01")],
            vec![Scalar::Int(3), Scalar::from("Linus"), Scalar::from("2024-03-01")],
        ],
    )
    .with_primary_key(PrimaryKey::Single("id".to_string()))
}

fn profiles() -> TabularDataset {
    TabularDataset::from_values(
        &["id", "bio", "created"],
        vec![
            vec![Scalar::from("1"), Scalar::from("math"), Scalar::from("2024-01-05")],
            vec![Scalar::Float(2.0), Scalar::from("navy"), Scalar::from("2024-02-05")],
            vec![Scalar::Int(3), Scalar::from("kernels"), Scalar::from("2024-03-05")],
        ],
    )
}

#[test]
fn test_one_to_one_left_join_keeps_row_count() {
    let joined = hash_join(&users(), &profiles(), &JoinOptions::new("id").how(JoinType::Left)).unwrap();

    assert_eq!(joined.len(), users().len());
    assert_eq!(
        joined.column_names(),
        vec!["id_left", "name", "created_left", "id_right", "bio", "created_right"]
    );
    assert_eq!(joined.value(1, "bio"), &Scalar::from("navy"));
    assert_eq!(
        joined.primary_key,
        Some(PrimaryKey::Single("id_left".to_string()))
    );
}

#[test]
fn test_outer_join_row_count() {
    let left = TabularDataset::from_values(
        &["k", "l"],
        vec![
            vec![Scalar::Int(1), Scalar::from("a")],
            vec![Scalar::Int(2), Scalar::from("b")],
            vec![Scalar::Int(3), Scalar::from("c")],
        ],
    );
    let right = TabularDataset::from_values(
        &["k", "r"],
        vec![
            vec![Scalar::Int(2), Scalar::from("x")],
            vec![Scalar::Int(3), Scalar::from("y")],
            vec![Scalar::Int(4), Scalar::from("z")],
        ],
    );

    let matched = 2;
    let outer = hash_join(&left, &right, &JoinOptions::new("k").how(JoinType::Outer)).unwrap();
    assert_eq!(outer.len(), left.len() + right.len() - matched);
    assert_eq!(outer.primary_key, None);

    // the unmatched right row comes last with null left fields
    let last = outer.len() - 1;
    assert_eq!(outer.value(last, "k_left"), &Scalar::Null);
    assert_eq!(outer.value(last, "l"), &Scalar::Null);
    assert_eq!(outer.value(last, "r"), &Scalar::from("z"));

    let inner = hash_join(&left, &right, &JoinOptions::new("k")).unwrap();
    assert_eq!(inner.len(), matched);

    let right_join = hash_join(&left, &right, &JoinOptions::new("k").how(JoinType::Right)).unwrap();
    assert_eq!(right_join.len(), right.len());
}

#[test]
fn test_fan_out_on_duplicate_keys() {
    let customers = TabularDataset::from_values(
        &["id", "name"],
        vec![vec![Scalar::Int(1), Scalar::from("Ada")]],
    );
    let orders = TabularDataset::from_values(
        &["order_no", "customer_id"],
        vec![
            vec![Scalar::Int(10), Scalar::Int(1)],
            vec![Scalar::Int(11), Scalar::Int(1)],
            vec![Scalar::Int(12), Scalar::Int(2)],
        ],
    );

    let joined = hash_join(
        &customers,
        &orders,
        &JoinOptions::on_columns("id", "customer_id"),
    )
    .unwrap();

    assert_eq!(joined.len(), 2);
    assert_eq!(joined.column_names(), vec!["id", "name", "order_no", "customer_id"]);
    assert!(joined.rows.iter().all(|row| row["name"] == Scalar::from("Ada")));
}

#[test]
fn test_dates_join_with_their_strings() {
    let ts = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let left = TabularDataset::from_values(&["day"], vec![vec![Scalar::Timestamp(ts)]]);
    let right = TabularDataset::from_values(
        &["date", "sales"],
        vec![
            vec![Scalar::from("2024-03-01"), Scalar::Int(7)],
            vec![Scalar::from("03/02/2024"), Scalar::Int(9)],
        ],
    );

    let joined = hash_join(&left, &right, &JoinOptions::on_columns("day", "date")).unwrap();
    assert_eq!(joined.len(), 1);
    assert_eq!(joined.value(0, "sales"), &Scalar::Int(7));
}

#[test]
fn test_nulls_never_match() {
    let left = TabularDataset::from_values(&["k"], vec![vec![Scalar::Null], vec![Scalar::Int(1)]]);
    let right = TabularDataset::from_values(&["k"], vec![vec![Scalar::Null], vec![Scalar::Int(1)]]);

    assert_eq!(hash_join(&left, &right, &JoinOptions::new("k")).unwrap().len(), 1);
    assert_eq!(
        hash_join(&left, &right, &JoinOptions::new("k").how(JoinType::Outer))
            .unwrap()
            .len(),
        3
    );
}

#[test]
fn test_custom_suffixes() {
    let options = JoinOptions::new("id").suffixes(Suffixes::new("_u", "_p"));
    let joined = hash_join(&users(), &profiles(), &options).unwrap();
    assert!(joined.has_column("created_u"));
    assert!(joined.has_column("created_p"));
    assert!(joined.has_column("name"));
}

#[test]
fn test_missing_columns_name_their_side() {
    let err = hash_join(&users(), &profiles(), &JoinOptions::on_columns("uid", "id")).unwrap_err();
    assert!(matches!(
        err,
        JoineryError::ColumnNotFound { ref column, side: JoinSide::Left } if column == "uid"
    ));

    let err = hash_join(&users(), &profiles(), &JoinOptions::on_columns("id", "user")).unwrap_err();
    assert!(matches!(
        err,
        JoineryError::ColumnNotFound { side: JoinSide::Right, .. }
    ));
}

#[test]
fn test_options_deserialize_from_json() {
    let options: JoinOptions =
        serde_json::from_str(r#"{"on": {"left": "id", "right": "user_id"}, "how": "outer"}"#).unwrap();
    assert_eq!(options.on.left(), "id");
    assert_eq!(options.on.right(), "user_id");
    assert_eq!(options.how, JoinType::Outer);
    assert_eq!(options.suffixes, Suffixes::default());

    let options: JoinOptions = serde_json::from_str(r#"{"on": "id"}"#).unwrap();
    assert_eq!(options.how, JoinType::Inner);
}
