//! The cars session: open `CarsDatabase`, define its schema on first use, store four cars and
//! look them up by id, by colour and by colour and make.
//!
//! Progress is logged with `tracing` and reported as [`SessionEvent`]s on a channel, so callers
//! can observe every completion without scraping logs.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info};

use crate::config::SessionConfig;
use crate::{Factory, IndexOptions, TransactionMode, VersionChange};

pub const DATABASE_NAME: &str = "CarsDatabase";
pub const SCHEMA_VERSION: u32 = 1;

pub const CARS: &str = "cars";
pub const COLOUR_INDEX: &str = "cars_colour";
pub const COLOUR_AND_MAKE_INDEX: &str = "colour_and_make";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Car {
    pub id: u32,
    pub colour: String,
    pub make: String,
}

impl Car {
    pub fn new(id: u32, colour: &str, make: &str) -> Self {
        Self {
            id,
            colour: colour.to_owned(),
            make: make.to_owned(),
        }
    }
}

pub fn sample_cars() -> Vec<Car> {
    vec![
        Car::new(1, "Red", "Toyota"),
        Car::new(2, "Red", "Kia"),
        Car::new(3, "Blue", "Honda"),
        Car::new(4, "Silver", "Subaru"),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Opened,
    OpenFailed(String),
    IdQuery(Option<Car>),
    ColourQuery(Vec<Car>),
    ColourMakeQuery(Option<Car>),
    Closed,
}

/// Upgrade callback of the cars database
pub fn define_schema(change: &mut VersionChange) -> anyhow::Result<()> {
    if change.has_collection(CARS) {
        return Ok(());
    }
    change
        .create_collection(CARS, "id")?
        .create_index(COLOUR_INDEX, ["colour"], IndexOptions::default())?
        .create_index(
            COLOUR_AND_MAKE_INDEX,
            ["colour", "make"],
            IndexOptions::default(),
        )?;
    Ok(())
}

/// Runs the session once.
///
/// Failing to open the database is reported and ends the session without an error. Any later
/// failure is returned, and the unit of work is discarded with it.
pub async fn run(
    factory: &Factory,
    config: &SessionConfig,
    events: &UnboundedSender<SessionEvent>,
) -> anyhow::Result<()> {
    let db = match factory
        .open(&config.database_name, config.schema_version, define_schema)
        .await
    {
        Ok(db) => db,
        Err(err) => {
            error!("An error occurred with the database");
            error!("{err}");
            let _ = events.send(SessionEvent::OpenFailed(err.to_string()));
            return Ok(());
        }
    };
    info!("Database opened successfully");
    let _ = events.send(SessionEvent::Opened);

    let tx = db.transaction(TransactionMode::ReadWrite).await;
    let cars = tx.collection(CARS)?;
    let colour_index = cars.index(COLOUR_INDEX)?;
    let colour_make_index = cars.index(COLOUR_AND_MAKE_INDEX)?;

    for car in sample_cars() {
        cars.put(&car).await?;
    }

    let (id_query, colour_query, colour_make_query) = futures::try_join!(
        cars.get::<Car>(4),
        colour_index.get_all::<Car>(["Red"]),
        colour_make_index.get::<Car>(["Blue", "Honda"]),
    )?;

    info!("idQuery {:?}", id_query);
    let _ = events.send(SessionEvent::IdQuery(id_query));
    info!("colourQuery {:?}", colour_query);
    let _ = events.send(SessionEvent::ColourQuery(colour_query));
    info!("colourMakeQuery {:?}", colour_make_query);
    let _ = events.send(SessionEvent::ColourMakeQuery(colour_make_query));

    tx.commit().await?;
    db.close();
    let _ = events.send(SessionEvent::Closed);

    Ok(())
}

/// Browser entry point, runs the session against IndexedDB
#[cfg(target_family = "wasm")]
#[wasm_bindgen::prelude::wasm_bindgen]
pub fn start() {
    crate::util::spawn("cars_session", async {
        let config = SessionConfig::default();
        let factory = Factory::new(config.backend.provider());
        let (events, _receiver) = tokio::sync::mpsc::unbounded_channel();
        if let Err(err) = run(&factory, &config, &events).await {
            error!("Cars session failed: {err:#}");
        }
    });
}
