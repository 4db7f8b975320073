use super::*;

#[tokio::test]
async fn get_returns_none_for_unknown_key() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    assert_eq!(storage.get("client_identity").await.expect("get"), None);
}

#[tokio::test]
async fn put_then_get_round_trips() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .put("client_identity", "user-ab12cd34e")
        .await
        .expect("put");
    assert_eq!(
        storage.get("client_identity").await.expect("get"),
        Some("user-ab12cd34e".to_string())
    );
}

#[tokio::test]
async fn put_overwrites_existing_value() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.put("otp_channel", "whatsapp").await.expect("put");
    storage.put("otp_channel", "sms").await.expect("put again");
    assert_eq!(
        storage.get("otp_channel").await.expect("get"),
        Some("sms".to_string())
    );
}

#[tokio::test]
async fn delete_removes_value() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.put("user_email", "sam@example.com").await.expect("put");
    storage.delete("user_email").await.expect("delete");
    assert_eq!(storage.get("user_email").await.expect("get"), None);
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn values_survive_reopening_the_same_file() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("teller_storage_test_{suffix}"));
    let db_path = temp_root.join("nested").join("state.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    {
        let storage = Storage::new(&database_url).await.expect("db");
        storage
            .put("active_conversation_sid", "CH0123456789")
            .await
            .expect("put");
    }

    let reopened = Storage::new(&database_url).await.expect("reopen");
    assert_eq!(
        reopened
            .get("active_conversation_sid")
            .await
            .expect("get"),
        Some("CH0123456789".to_string())
    );

    drop(reopened);
    std::fs::remove_dir_all(temp_root).expect("cleanup");
}
