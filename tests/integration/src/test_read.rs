//! Read transaction tests.

#[cfg(test)]
mod tests {
    use dynatx_core::{TransactGet, TransactionConfig, TransactionError, attr};
    use dynatx_model::AttributeValue;
    use dynatx_model::error::{DynamoDBError, DynamoDBErrorCode};
    use dynatx_model::types::{Item, ReturnConsumedCapacity};
    use serde_json::json;

    use crate::{MockModel, Profile, RecordingConnection};

    fn profile_item() -> Item {
        Item::from([
            ("user_id".to_owned(), AttributeValue::S("u1".to_owned())),
            ("name".to_owned(), AttributeValue::S("Ada".to_owned())),
            (
                "tags".to_owned(),
                AttributeValue::Ss(vec!["admin".to_owned(), "ops".to_owned()]),
            ),
            ("logins".to_owned(), AttributeValue::N("3".to_owned())),
            ("active".to_owned(), AttributeValue::Bool(true)),
            ("legacy".to_owned(), AttributeValue::S("ignored".to_owned())),
        ])
    }

    #[tokio::test]
    async fn test_should_send_single_get_with_key() {
        let conn = RecordingConnection::new();
        let mut tx = TransactGet::new(&conn, TransactionConfig::default());
        tx.get::<MockModel>(1, Some(json!(2))).unwrap();
        tx.commit().await.unwrap();

        let calls = conn.get_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            serde_json::to_value(&calls[0]).unwrap(),
            json!({
                "TransactItems": [
                    {"Get": {
                        "TableName": "mock",
                        "Key": {"mock_hash": {"N": "1"}, "mock_range": {"N": "2"}}
                    }}
                ]
            })
        );
        assert!(calls[0].return_consumed_capacity.is_none());
    }

    #[tokio::test]
    async fn test_should_hydrate_models_in_request_order() {
        let conn = RecordingConnection::new().with_items([Some(profile_item()), None]);

        let ((profile, missing), result) =
            TransactGet::run(&conn, TransactionConfig::default(), |tx| {
                Ok((
                    tx.get::<Profile>("u1", None)?,
                    tx.get::<MockModel>(9, Some(json!(9)))?,
                ))
            })
            .await
            .unwrap();

        assert_eq!(
            result.get(profile).unwrap(),
            Profile {
                user_id: "u1".to_owned(),
                name: "Ada".to_owned(),
                tags: vec!["admin".to_owned(), "ops".to_owned()],
                logins: Some(3),
                active: true,
            }
        );
        assert!(result.try_get(missing).unwrap().is_none());
        assert!(matches!(
            result.get(missing),
            Err(TransactionError::DoesNotExist { table }) if table == "mock"
        ));
        assert_eq!(result.items().len(), 2);
    }

    #[tokio::test]
    async fn test_should_send_projection_with_name_placeholders() {
        let conn = RecordingConnection::new()
            .with_items([Some(profile_item())]);
        let config = TransactionConfig::default().with_return_consumed_capacity(ReturnConsumedCapacity::Indexes);

        let mut tx = TransactGet::new(&conn, config);
        tx.get_with_projection::<Profile>("u1", None, &[attr("name"), attr("tags")])
            .unwrap();
        tx.commit().await.unwrap();

        let payload = serde_json::to_value(&conn.get_calls()[0]).unwrap();
        assert_eq!(payload["ReturnConsumedCapacity"], "INDEXES");
        let get = &payload["TransactItems"][0]["Get"];
        assert_eq!(get["ProjectionExpression"], "#0, #1");
        assert_eq!(
            get["ExpressionAttributeNames"],
            json!({"#0": "name", "#1": "tags"})
        );
    }

    #[tokio::test]
    async fn test_should_reject_range_key_on_hash_only_table() {
        let conn = RecordingConnection::new();
        let mut tx = TransactGet::new(&conn, TransactionConfig::default());

        let err = tx.get::<Profile>("u1", Some(json!("extra"))).unwrap_err();

        assert!(matches!(err, TransactionError::Serialize(_)));
        tx.commit().await.unwrap();
        assert_eq!(conn.call_count(), 0);
    }

    #[tokio::test]
    async fn test_should_propagate_store_failure() {
        let conn = RecordingConnection::new()
            .with_failure(DynamoDBError::with_message(
                DynamoDBErrorCode::ResourceNotFoundException,
                "Requested resource not found",
            ));
        let mut tx = TransactGet::new(&conn, TransactionConfig::default());
        tx.get::<MockModel>(1, Some(json!(2))).unwrap();

        let err = tx.commit().await.unwrap_err();

        assert!(err.is_store_error());
        assert!(!err.is_conditional_check_failed());
        assert_eq!(conn.get_calls().len(), 1);
    }
}
