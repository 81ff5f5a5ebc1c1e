use chrono::Utc;
use futures_util::future::join_all;
use migrato_store::{
    Engine, MigrationStatus, RecordPatch, RecordQuery, Store, StoreError, WriteRecord,
};

pub async fn test_create_claims_once<E: Engine>(store: &Store<E>) -> anyhow::Result<()> {
    let record = store.create(WriteRecord::new("001_a"), None).await?;

    assert_eq!(record.name, "001_a");
    assert_eq!(record.status, MigrationStatus::Running);
    assert!(record.started_at.is_some());

    let err = store
        .create(WriteRecord::new("001_a"), None)
        .await
        .unwrap_err();

    assert!(err.is_unique_violation());

    let records = store.records().await?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, record.id);

    Ok(())
}

pub async fn test_concurrent_claims<E: Engine>(store: &Store<E>) -> anyhow::Result<()> {
    let results = join_all((0..5).map(|_| store.create(WriteRecord::new("001_a"), None))).await;

    let claimed = results.iter().filter(|res| res.is_ok()).count();
    let lost = results
        .iter()
        .filter(|res| matches!(res, Err(StoreError::UniqueViolation(_))))
        .count();

    assert_eq!(claimed, 1);
    assert_eq!(lost, 4);

    Ok(())
}

pub async fn test_list<E: Engine>(store: &Store<E>) -> anyhow::Result<()> {
    store.create(WriteRecord::new("002_b"), None).await?;
    store
        .create(
            WriteRecord::new("003_c")
                .status(MigrationStatus::Failed)
                .failed_at(Utc::now()),
            None,
        )
        .await?;
    store.create(WriteRecord::new("001_a"), None).await?;

    let all = store.list(RecordQuery::new()).await?;
    assert_eq!(all.count, 3);
    assert_eq!(
        all.items.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
        vec!["001_a", "002_b", "003_c"]
    );

    let running = store.records_with_status(MigrationStatus::Running).await?;
    assert_eq!(
        running.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
        vec!["001_a", "002_b"]
    );

    let named = store
        .list(
            RecordQuery::new()
                .name("003_c")
                .status(MigrationStatus::Failed),
        )
        .await?;
    assert_eq!(named.count, 1);
    assert!(named.items[0].failed_at.is_some());

    let none = store
        .list(
            RecordQuery::new()
                .name("003_c")
                .status(MigrationStatus::Completed),
        )
        .await?;
    assert_eq!(none.count, 0);

    Ok(())
}

pub async fn test_update<E: Engine>(store: &Store<E>) -> anyhow::Result<()> {
    let created = store.create(WriteRecord::new("001_a"), None).await?;
    let at = Utc::now();

    let updated = store
        .update("001_a", RecordPatch::completed(at), None)
        .await?;

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.status, MigrationStatus::Completed);
    assert!(updated.executed_at.is_some());
    assert!(updated.failed_at.is_none());
    assert!(updated.updated_at >= created.updated_at);

    let fetched = store.get("001_a", None).await?.unwrap();
    assert_eq!(fetched.status, MigrationStatus::Completed);
    assert!(fetched.is_executed());

    let err = store
        .update("404_missing", RecordPatch::failed(at), None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(name) if name == "404_missing"));

    assert!(store.get("404_missing", None).await?.is_none());

    Ok(())
}

pub async fn test_delete<E: Engine>(store: &Store<E>) -> anyhow::Result<()> {
    let now = Utc::now();

    store
        .create(
            WriteRecord::new("001_a")
                .status(MigrationStatus::Completed)
                .executed_at(now),
            None,
        )
        .await?;
    store
        .create(
            WriteRecord::new("002_b")
                .status(MigrationStatus::Failed)
                .failed_at(now),
            None,
        )
        .await?;
    store
        .create(
            WriteRecord::new("003_c")
                .status(MigrationStatus::Stuck)
                .failed_at(now),
            None,
        )
        .await?;

    let deleted = store
        .delete(RecordQuery::new().status(MigrationStatus::Failed), None)
        .await?;

    assert_eq!(deleted, 1);
    assert_eq!(
        store
            .records()
            .await?
            .iter()
            .map(|r| r.name.as_str())
            .collect::<Vec<_>>(),
        vec!["001_a", "003_c"]
    );

    let deleted = store
        .delete(RecordQuery::new().name("404_missing"), None)
        .await?;
    assert_eq!(deleted, 0);

    Ok(())
}

pub async fn test_transaction_commit<E: Engine>(store: &Store<E>) -> anyhow::Result<()> {
    let mut tx = store.begin().await?;

    store.create(WriteRecord::new("001_a"), Some(&mut tx)).await?;
    store
        .update("001_a", RecordPatch::completed(Utc::now()), Some(&mut tx))
        .await?;

    let inside = store.get("001_a", Some(&mut tx)).await?.unwrap();
    assert_eq!(inside.status, MigrationStatus::Completed);

    store.commit(tx).await?;

    let records = store.records().await?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, MigrationStatus::Completed);

    Ok(())
}

pub async fn test_transaction_rollback<E: Engine>(store: &Store<E>) -> anyhow::Result<()> {
    store.create(WriteRecord::new("001_a"), None).await?;

    let mut tx = store.begin().await?;

    store.create(WriteRecord::new("002_b"), Some(&mut tx)).await?;
    store
        .delete(RecordQuery::new().name("001_a"), Some(&mut tx))
        .await?;

    assert!(store.get("001_a", Some(&mut tx)).await?.is_none());

    let err = store
        .create(WriteRecord::new("002_b"), Some(&mut tx))
        .await
        .unwrap_err();
    assert!(err.is_unique_violation());

    store.rollback(tx).await?;

    assert_eq!(
        store
            .records()
            .await?
            .iter()
            .map(|r| r.name.as_str())
            .collect::<Vec<_>>(),
        vec!["001_a"]
    );

    Ok(())
}
