use std::env;

use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use tracking_engine::{
    db_types::{Coordinates, NewOrder, OrderStatus},
    OrderDirectory,
    SqliteDatabase,
};

pub fn random_db_path() -> String {
    format!("sqlite://{}/tracking_test_{}.db", env::temp_dir().display(), rand::random::<u64>())
}

/// Creates a throwaway database, runs the migrations and hands back a connected handle.
pub async fn prepare_test_db() -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let url = random_db_path();
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("Error dropping database {url}: {e:?}");
    }
    Sqlite::create_database(&url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
    db.run_migrations().await.expect("Error running DB migrations");
    debug!("🚀️ Test database ready at {url}");
    db
}

pub async fn seed_order(
    db: &SqliteDatabase,
    id: i64,
    customer_id: i64,
    pharmacy_id: i64,
    assigned_agent_id: Option<i64>,
    destination: Option<Coordinates>,
) {
    let order = NewOrder {
        id,
        customer_id,
        pharmacy_id,
        assigned_agent_id,
        status: OrderStatus::OutForDelivery,
        destination,
        pharmacy_location: Some(Coordinates::new(5.3400, -4.0300).unwrap()),
    };
    db.insert_order(order).await.expect("Error seeding order");
}
