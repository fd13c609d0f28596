#![cfg(target_family = "wasm")]

use std::sync::Arc;

use carkv::session::{Car, CARS, COLOUR_AND_MAKE_INDEX, COLOUR_INDEX};
use carkv::{Factory, IdbProvider, TransactionMode};
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
async fn test_cars_in_indexed_db() {
    let factory = Factory::new(Arc::new(IdbProvider));
    factory.delete_database("carkv-test").await.unwrap();

    let db = factory
        .open("carkv-test", 1, carkv::session::define_schema)
        .await
        .unwrap();
    let tx = db.transaction(TransactionMode::ReadWrite).await;
    let cars = tx.collection(CARS).unwrap();
    for car in carkv::session::sample_cars() {
        cars.put(&car).await.unwrap();
    }
    tx.commit().await.unwrap();
    db.close();

    // Reopen to read through a fresh IndexedDB connection
    let db = factory
        .open("carkv-test", 1, |_| panic!("schema is already defined"))
        .await
        .unwrap();
    let tx = db.transaction(TransactionMode::ReadOnly).await;
    let cars = tx.collection(CARS).unwrap();

    assert_eq!(
        cars.get::<Car>(4).await.unwrap(),
        Some(Car::new(4, "Silver", "Subaru"))
    );
    let red = cars
        .index(COLOUR_INDEX)
        .unwrap()
        .get_all::<Car>(["Red"])
        .await
        .unwrap();
    assert_eq!(red.iter().map(|car| car.id).collect::<Vec<_>>(), [1, 2]);
    assert_eq!(
        cars.index(COLOUR_AND_MAKE_INDEX)
            .unwrap()
            .get::<Car>(["Blue", "Toyota"])
            .await
            .unwrap(),
        None
    );
}
