pub mod challenge;
pub mod event;
pub mod event_participant;
pub mod notification;
pub mod telegram_link;
pub mod user;
pub mod wallet;
pub mod wallet_transaction;

pub use challenge::Entity as ChallengeEntity;
pub use event::Entity as EventEntity;
pub use event_participant::Entity as EventParticipantEntity;
pub use notification::Entity as NotificationEntity;
pub use telegram_link::Entity as TelegramLinkEntity;
pub use user::Entity as UserEntity;
pub use wallet::Entity as WalletEntity;
pub use wallet_transaction::Entity as WalletTransactionEntity;
