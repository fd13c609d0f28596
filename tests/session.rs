#![cfg(not(target_family = "wasm"))]

use std::sync::Arc;

use carkv::config::{SessionConfig, StorageBackend};
use carkv::session::{self, Car, SessionEvent, CARS, COLOUR_AND_MAKE_INDEX, COLOUR_INDEX};
use carkv::{Factory, MemProvider, SqliteProvider, TransactionMode};
use tokio::sync::mpsc::unbounded_channel;

fn sqlite_config(directory: &std::path::Path) -> SessionConfig {
    SessionConfig {
        backend: StorageBackend::Sqlite {
            directory: directory.to_path_buf(),
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn test_session_persists_across_factories() {
    let dir = tempfile::tempdir().unwrap();
    let config = sqlite_config(dir.path());

    let factory = Factory::new(config.backend.provider());
    let (events, mut receiver) = unbounded_channel();
    session::run(&factory, &config, &events).await.unwrap();
    assert_eq!(receiver.recv().await, Some(SessionEvent::Opened));
    drop(factory);

    // A new factory is as good as a new process
    let factory = Factory::new(Arc::new(SqliteProvider::new(dir.path())));
    let db = factory
        .open(session::DATABASE_NAME, session::SCHEMA_VERSION, |_| {
            panic!("schema is already defined")
        })
        .await
        .unwrap();

    let schema = db.schema().collection(CARS).unwrap();
    assert_eq!(
        schema.index_names().collect::<Vec<_>>(),
        [COLOUR_INDEX, COLOUR_AND_MAKE_INDEX]
    );

    let tx = db.transaction(TransactionMode::ReadOnly).await;
    let cars = tx.collection(CARS).unwrap();
    assert_eq!(cars.get_all::<Car>().await.unwrap(), session::sample_cars());
}

#[tokio::test]
async fn test_index_lookups() {
    let factory = Factory::new(Arc::new(MemProvider::default()));
    let db = factory
        .open("CarsDatabase", 1, session::define_schema)
        .await
        .unwrap();

    let tx = db.transaction(TransactionMode::ReadWrite).await;
    let cars = tx.collection(CARS).unwrap();
    for car in session::sample_cars() {
        cars.put(&car).await.unwrap();
    }
    tx.commit().await.unwrap();

    let tx = db.transaction(TransactionMode::ReadOnly).await;
    let cars = tx.collection(CARS).unwrap();
    let colour = cars.index(COLOUR_INDEX).unwrap();
    let colour_make = cars.index(COLOUR_AND_MAKE_INDEX).unwrap();

    assert_eq!(
        cars.get::<Car>(4).await.unwrap(),
        Some(Car::new(4, "Silver", "Subaru"))
    );
    assert_eq!(cars.get::<Car>(5).await.unwrap(), None);

    let red = colour.get_all::<Car>(["Red"]).await.unwrap();
    assert_eq!(red.iter().map(|car| car.id).collect::<Vec<_>>(), [1, 2]);
    assert!(colour.get_all::<Car>(["Green"]).await.unwrap().is_empty());
    // The index key path is compound, a bare string is a different key
    assert!(colour.get_all::<Car>("Red").await.unwrap().is_empty());

    assert_eq!(
        colour_make.get::<Car>(["Blue", "Honda"]).await.unwrap(),
        Some(Car::new(3, "Blue", "Honda"))
    );
    assert_eq!(colour_make.get::<Car>(["Blue", "Toyota"]).await.unwrap(), None);
    assert_eq!(colour_make.get::<Car>(["Blue"]).await.unwrap(), None);
}

#[tokio::test]
async fn test_upsert_reflects_newest_values() {
    let factory = Factory::new(Arc::new(MemProvider::default()));
    let db = factory
        .open("CarsDatabase", 1, session::define_schema)
        .await
        .unwrap();

    let tx = db.transaction(TransactionMode::ReadWrite).await;
    let cars = tx.collection(CARS).unwrap();
    for car in session::sample_cars() {
        cars.put(&car).await.unwrap();
    }
    cars.put(&Car::new(4, "Red", "Saab")).await.unwrap();

    assert_eq!(cars.count().await.unwrap(), 4);
    assert_eq!(
        cars.get::<Car>(4).await.unwrap(),
        Some(Car::new(4, "Red", "Saab"))
    );
    let red = cars
        .index(COLOUR_INDEX)
        .unwrap()
        .get_all::<Car>(["Red"])
        .await
        .unwrap();
    assert_eq!(red.iter().map(|car| car.id).collect::<Vec<_>>(), [1, 2, 4]);
    assert!(cars
        .index(COLOUR_AND_MAKE_INDEX)
        .unwrap()
        .get::<Car>(["Silver", "Subaru"])
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_blocked_open_runs_nothing() {
    let provider = Arc::new(MemProvider::default());
    let factory = Factory::new(provider.clone());
    let _old = factory.open("CarsDatabase", 1, |_| Ok(())).await.unwrap();
    let operations = provider.storage("CarsDatabase").unwrap().operations();

    let config = SessionConfig {
        schema_version: 2,
        backend: StorageBackend::Memory,
        ..Default::default()
    };
    let (events, mut receiver) = unbounded_channel();
    session::run(&factory, &config, &events).await.unwrap();
    drop(events);

    let mut received = Vec::new();
    while let Some(event) = receiver.recv().await {
        received.push(event);
    }
    assert_eq!(received.len(), 1);
    assert!(matches!(&received[0], SessionEvent::OpenFailed(message) if message.contains("blocked")));
    // Only the version and schema lookups of the failed open reached the storage
    assert_eq!(
        provider.storage("CarsDatabase").unwrap().operations(),
        operations + 2
    );
}
