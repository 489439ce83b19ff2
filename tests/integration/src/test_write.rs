//! Write transaction tests.

#[cfg(test)]
mod tests {
    use dynatx_core::{TransactWrite, TransactionConfig, TransactionError, UsageError, attr};
    use dynatx_model::error::{CancellationReason, DynamoDBError};
    use dynatx_model::types::{ReturnConsumedCapacity, ReturnValuesOnConditionCheckFailure};
    use serde_json::json;

    use crate::{MockModel, Profile, RecordingConnection};

    #[tokio::test]
    async fn test_should_commit_all_member_types_in_bucket_order() {
        let conn = RecordingConnection::new();
        let mut saved = MockModel::new(3, 5);
        let mut updated = MockModel::new(4, 6);

        let mut tx = TransactWrite::new(&conn, TransactionConfig::default());
        // Appended in reverse order to check the grouping on commit.
        tx.update(
            &mut updated,
            &[attr("mock_toot").set("hello")],
            None,
            Some(ReturnValuesOnConditionCheckFailure::AllOld),
        )
        .unwrap();
        tx.put(&mut saved, None, None).unwrap();
        tx.delete(&MockModel::new(2, 4), None, None).unwrap();
        tx.condition_check::<MockModel>(1, Some(json!(3)), Some(attr("mock_hash").does_not_exist()), None)
            .unwrap();
        tx.commit().await.unwrap();

        let calls = conn.write_calls();
        assert_eq!(calls.len(), 1);
        let payload = serde_json::to_value(&calls[0]).unwrap();
        assert_eq!(
            payload,
            json!({
                "TransactItems": [
                    {"ConditionCheck": {
                        "TableName": "mock",
                        "Key": {"mock_hash": {"N": "1"}, "mock_range": {"N": "3"}},
                        "ConditionExpression": "attribute_not_exists (#0)",
                        "ExpressionAttributeNames": {"#0": "mock_hash"}
                    }},
                    {"Delete": {
                        "TableName": "mock",
                        "Key": {"mock_hash": {"N": "2"}, "mock_range": {"N": "4"}},
                        "ConditionExpression": "attribute_not_exists (#0)",
                        "ExpressionAttributeNames": {"#0": "mock_version"}
                    }},
                    {"Put": {
                        "TableName": "mock",
                        "Item": {
                            "mock_hash": {"N": "3"},
                            "mock_range": {"N": "5"},
                            "mock_version": {"N": "1"}
                        },
                        "ConditionExpression": "attribute_not_exists (#0)",
                        "ExpressionAttributeNames": {"#0": "mock_version"}
                    }},
                    {"Update": {
                        "TableName": "mock",
                        "Key": {"mock_hash": {"N": "4"}, "mock_range": {"N": "6"}},
                        "UpdateExpression": "SET #1 = :0, #0 = :1",
                        "ConditionExpression": "attribute_not_exists (#0)",
                        "ExpressionAttributeNames": {"#0": "mock_version", "#1": "mock_toot"},
                        "ExpressionAttributeValues": {":0": {"S": "hello"}, ":1": {"N": "1"}},
                        "ReturnValuesOnConditionCheckFailure": "ALL_OLD"
                    }}
                ]
            })
        );
        assert_eq!(saved.mock_version, Some(1));
        assert_eq!(updated.mock_version, Some(1));
        assert!(updated.mock_toot.is_none());
    }

    #[tokio::test]
    async fn test_should_guard_on_current_version_and_advance_it() {
        let conn = RecordingConnection::new();
        let mut model = MockModel {
            mock_version: Some(7),
            ..MockModel::new(1, 1)
        };

        TransactWrite::run(&conn, TransactionConfig::default(), |tx| {
            tx.update(
                &mut model,
                &[attr("mock_toot").set("again")],
                Some(attr("mock_toot").exists()),
                None,
            )
        })
        .await
        .unwrap();

        let payload = serde_json::to_value(&conn.write_calls()[0].transact_items[0]).unwrap();
        assert_eq!(
            payload["Update"]["ConditionExpression"],
            "(attribute_exists (#0) AND #1 = :0)"
        );
        assert_eq!(payload["Update"]["UpdateExpression"], "SET #0 = :1, #1 = :2");
        assert_eq!(
            payload["Update"]["ExpressionAttributeValues"],
            json!({":0": {"N": "7"}, ":1": {"S": "again"}, ":2": {"N": "8"}})
        );
        assert_eq!(model.mock_version, Some(8));
    }

    #[tokio::test]
    async fn test_should_reject_condition_check_without_condition() {
        let conn = RecordingConnection::new();
        let result = TransactWrite::run(&conn, TransactionConfig::default(), |tx| {
            tx.condition_check::<MockModel>(1, Some(json!(3)), None, None)
        })
        .await;

        assert!(matches!(
            result,
            Err(TransactionError::Usage(UsageError::MissingCondition))
        ));
        assert_eq!(conn.call_count(), 0);
    }

    #[tokio::test]
    async fn test_should_not_call_store_when_discarded() {
        let conn = RecordingConnection::new();
        let mut model = MockModel::new(1, 2);
        {
            let mut tx = TransactWrite::new(&conn, TransactionConfig::default());
            tx.put(&mut model, None, None).unwrap();
            tx.discard();
        }
        {
            let mut tx = TransactWrite::new(&conn, TransactionConfig::default());
            tx.delete(&model, None, None).unwrap();
        }
        assert_eq!(conn.call_count(), 0);
    }

    #[tokio::test]
    async fn test_should_keep_advanced_version_after_failed_or_discarded_write() {
        let conn = RecordingConnection::new()
            .with_failure(DynamoDBError::transaction_canceled("Transaction cancelled", Vec::new()));
        let mut model = MockModel {
            mock_version: Some(2),
            ..MockModel::new(1, 1)
        };

        let mut tx = TransactWrite::new(&conn, TransactionConfig::default());
        tx.put(&mut model, None, None).unwrap();
        assert!(tx.commit().await.is_err());
        assert_eq!(model.mock_version, Some(3));

        let mut tx = TransactWrite::new(&conn, TransactionConfig::default());
        tx.update(&mut model, &[attr("mock_toot").set("x")], None, None)
            .unwrap();
        tx.discard();
        assert_eq!(model.mock_version, Some(4));
        assert_eq!(conn.write_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_should_surface_cancellation_reasons() {
        let reasons = vec![
            CancellationReason {
                code: Some("None".to_owned()),
                ..Default::default()
            },
            CancellationReason {
                code: Some("ConditionalCheckFailed".to_owned()),
                message: Some("The conditional request failed".to_owned()),
                ..Default::default()
            },
        ];
        let conn = RecordingConnection::new()
            .with_failure(DynamoDBError::transaction_canceled("Transaction cancelled", reasons));
        let mut first = MockModel::new(1, 1);
        let mut second = MockModel::new(2, 2);

        let mut tx = TransactWrite::new(&conn, TransactionConfig::default());
        tx.put(&mut first, None, None).unwrap();
        tx.put(&mut second, None, None).unwrap();
        let err = tx.commit().await.unwrap_err();

        assert!(err.is_conditional_check_failed());
        let store = err.store_error().unwrap();
        assert_eq!(store.cancellation_reasons.len(), 2);
        assert!(!store.cancellation_reasons[0].is_conditional_check_failed());
        assert!(store.cancellation_reasons[1].is_conditional_check_failed());
        assert_eq!(conn.write_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_should_compile_rich_update_and_condition() {
        let conn = RecordingConnection::new();
        let mut profile = Profile {
            user_id: "u1".to_owned(),
            name: "Ada".to_owned(),
            ..Default::default()
        };

        let mut tx = TransactWrite::new(&conn, TransactionConfig::default());
        tx.update(
            &mut profile,
            &[
                attr("logins").set(attr("logins").if_not_exists(0).plus(1)),
                attr("tags").add(json!(["admin"])),
                attr("active").remove(),
            ],
            Some(attr("name").begins_with("A").and(attr("logins").lt(100).or(attr("logins").does_not_exist()))),
            None,
        )
        .unwrap();
        tx.commit().await.unwrap();

        let payload = serde_json::to_value(&conn.write_calls()[0].transact_items[0]).unwrap();
        let update = &payload["Update"];
        assert_eq!(update["Key"], json!({"user_id": {"S": "u1"}}));
        assert_eq!(
            update["ConditionExpression"],
            "(begins_with (#0, :0) AND (#1 < :1 OR attribute_not_exists (#1)))"
        );
        assert_eq!(
            update["UpdateExpression"],
            "SET #1 = if_not_exists (#1, :2) + :3 REMOVE #2 ADD #3 :4"
        );
        assert_eq!(
            update["ExpressionAttributeNames"],
            json!({"#0": "name", "#1": "logins", "#2": "active", "#3": "tags"})
        );
        assert_eq!(
            update["ExpressionAttributeValues"],
            json!({
                ":0": {"S": "A"},
                ":1": {"N": "100"},
                ":2": {"N": "0"},
                ":3": {"N": "1"},
                ":4": {"SS": ["admin"]}
            })
        );
    }

    #[tokio::test]
    async fn test_should_send_configured_request_options() {
        let conn = RecordingConnection::new();
        let config = TransactionConfig::default()
            .with_return_consumed_capacity(ReturnConsumedCapacity::Total)
            .with_client_request_token("token-1");
        let mut model = MockModel::new(1, 1);

        let mut tx = TransactWrite::new(&conn, config);
        tx.put(&mut model, None, None).unwrap();
        tx.commit().await.unwrap();

        let payload = serde_json::to_value(&conn.write_calls()[0]).unwrap();
        assert_eq!(payload["ClientRequestToken"], "token-1");
        assert_eq!(payload["ReturnConsumedCapacity"], "TOTAL");
        assert!(payload.get("ReturnItemCollectionMetrics").is_none());
    }

    #[tokio::test]
    async fn test_should_reject_key_attribute_update() {
        let conn = RecordingConnection::new();
        let mut model = MockModel::new(1, 1);
        let mut tx = TransactWrite::new(&conn, TransactionConfig::default());

        let err = tx
            .update(&mut model, &[attr("mock_hash").set(5)], None, None)
            .unwrap_err();

        assert!(matches!(err, TransactionError::Expression(_)));
        assert!(tx.operations().is_empty());
        assert_eq!(model.mock_version, None);
    }
}
