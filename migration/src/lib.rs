pub use sea_orm_migration::prelude::*;

pub mod entities;
mod m20250301_000001_users_wallets;
mod m20250301_000002_events;
mod m20250301_000003_challenges;
mod m20250301_000004_notifications;
mod m20250315_000001_telegram_links;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_users_wallets::Migration),
            Box::new(m20250301_000002_events::Migration),
            Box::new(m20250301_000003_challenges::Migration),
            Box::new(m20250301_000004_notifications::Migration),
            Box::new(m20250315_000001_telegram_links::Migration),
        ]
    }
}
