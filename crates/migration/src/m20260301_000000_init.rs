//! Initial schema migration.
//!
//! Creates the complete schema for fincore:
//!
//! - `accounts`: one logical account per user
//! - `bank_accounts`: money locations owned by an account
//! - `categories`: spending categories owned by an account
//! - `ledger_entries`: append-only signed movements (income, expense, transfer legs)
//! - `budgets`: monthly limits per category
//! - `budget_alert_marks`: last alert level emitted per budget period
//! - `notifications`: alerts delivered to users
//! - `user_notification_settings`: per-user alert preferences
//! - `outbox`: events waiting to be relayed, and their delivery outcome

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Accounts {
    Table,
    Id,
    UserId,
    Name,
    CreatedAt,
}

#[derive(Iden)]
enum BankAccounts {
    Table,
    Id,
    AccountId,
    Name,
    Currency,
    Active,
    CreatedAt,
}

#[derive(Iden)]
enum Categories {
    Table,
    Id,
    AccountId,
    Name,
    CreatedAt,
}

#[derive(Iden)]
enum LedgerEntries {
    Table,
    Id,
    BankAccountId,
    CategoryId,
    AmountMinor,
    Description,
    Kind,
    OccurredAt,
    CreatedAt,
    UpdatedAt,
    CounterpartBankAccountId,
    FxRate,
    TransferId,
}

#[derive(Iden)]
enum Budgets {
    Table,
    Id,
    AccountId,
    CategoryId,
    Name,
    LimitMinor,
    Currency,
    PeriodStart,
    PeriodEnd,
    Active,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum BudgetAlertMarks {
    Table,
    BudgetId,
    PeriodStart,
    Level,
    UpdatedAt,
}

#[derive(Iden)]
enum Notifications {
    Table,
    Id,
    UserId,
    Kind,
    Title,
    Message,
    Data,
    IsRead,
    Priority,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum UserNotificationSettings {
    Table,
    UserId,
    BudgetAlertsEnabled,
    BalanceAlertsEnabled,
    BudgetWarningPercent,
    LowBalanceThresholdMinor,
    PreferredChannel,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Outbox {
    Table,
    Id,
    Channel,
    Payload,
    CreatedAt,
    PublishedAt,
    SettledAt,
    DeadLetteredAt,
    Attempts,
    LastError,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Accounts
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Accounts::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Accounts::UserId).string().not_null())
                    .col(ColumnDef::new(Accounts::Name).string().not_null())
                    .col(
                        ColumnDef::new(Accounts::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-accounts-user_id-unique")
                    .table(Accounts::Table)
                    .col(Accounts::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Bank accounts
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(BankAccounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BankAccounts::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BankAccounts::AccountId).string().not_null())
                    .col(ColumnDef::new(BankAccounts::Name).string().not_null())
                    .col(
                        ColumnDef::new(BankAccounts::Currency)
                            .string()
                            .not_null()
                            .default("EUR"),
                    )
                    .col(
                        ColumnDef::new(BankAccounts::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(BankAccounts::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-bank_accounts-account_id")
                            .from(BankAccounts::Table, BankAccounts::AccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-bank_accounts-account_id-name-unique")
                    .table(BankAccounts::Table)
                    .col(BankAccounts::AccountId)
                    .col(BankAccounts::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Categories
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Categories::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Categories::AccountId).string().not_null())
                    .col(ColumnDef::new(Categories::Name).string().not_null())
                    .col(
                        ColumnDef::new(Categories::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-categories-account_id")
                            .from(Categories::Table, Categories::AccountId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Ledger entries
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(LedgerEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LedgerEntries::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(LedgerEntries::BankAccountId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LedgerEntries::CategoryId).string())
                    .col(
                        ColumnDef::new(LedgerEntries::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LedgerEntries::Description)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LedgerEntries::Kind).string().not_null())
                    .col(
                        ColumnDef::new(LedgerEntries::OccurredAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LedgerEntries::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LedgerEntries::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LedgerEntries::CounterpartBankAccountId).string())
                    .col(ColumnDef::new(LedgerEntries::FxRate).string())
                    .col(ColumnDef::new(LedgerEntries::TransferId).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-ledger_entries-bank_account_id")
                            .from(LedgerEntries::Table, LedgerEntries::BankAccountId)
                            .to(BankAccounts::Table, BankAccounts::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-ledger_entries-category_id")
                            .from(LedgerEntries::Table, LedgerEntries::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-ledger_entries-bank_account_id-occurred_at")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::BankAccountId)
                    .col(LedgerEntries::OccurredAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-ledger_entries-category_id-occurred_at")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::CategoryId)
                    .col(LedgerEntries::OccurredAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-ledger_entries-transfer_id")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::TransferId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Budgets
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Budgets::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Budgets::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Budgets::AccountId).string().not_null())
                    .col(ColumnDef::new(Budgets::CategoryId).string().not_null())
                    .col(ColumnDef::new(Budgets::Name).string().not_null())
                    .col(ColumnDef::new(Budgets::LimitMinor).big_integer().not_null())
                    .col(
                        ColumnDef::new(Budgets::Currency)
                            .string()
                            .not_null()
                            .default("EUR"),
                    )
                    .col(ColumnDef::new(Budgets::PeriodStart).date().not_null())
                    .col(ColumnDef::new(Budgets::PeriodEnd).date().not_null())
                    .col(
                        ColumnDef::new(Budgets::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Budgets::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Budgets::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-budgets-account_id")
                            .from(Budgets::Table, Budgets::AccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-budgets-category_id")
                            .from(Budgets::Table, Budgets::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One budget per (category, month).
        manager
            .create_index(
                Index::create()
                    .name("idx-budgets-category_id-period_start-unique")
                    .table(Budgets::Table)
                    .col(Budgets::CategoryId)
                    .col(Budgets::PeriodStart)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BudgetAlertMarks::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(BudgetAlertMarks::BudgetId).string().not_null())
                    .col(
                        ColumnDef::new(BudgetAlertMarks::PeriodStart)
                            .date()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BudgetAlertMarks::Level).string().not_null())
                    .col(
                        ColumnDef::new(BudgetAlertMarks::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(BudgetAlertMarks::BudgetId)
                            .col(BudgetAlertMarks::PeriodStart),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-budget_alert_marks-budget_id")
                            .from(BudgetAlertMarks::Table, BudgetAlertMarks::BudgetId)
                            .to(Budgets::Table, Budgets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Notifications
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Notifications::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Notifications::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Notifications::UserId).string().not_null())
                    .col(ColumnDef::new(Notifications::Kind).string().not_null())
                    .col(ColumnDef::new(Notifications::Title).string().not_null())
                    .col(ColumnDef::new(Notifications::Message).text().not_null())
                    .col(ColumnDef::new(Notifications::Data).text().not_null())
                    .col(
                        ColumnDef::new(Notifications::IsRead)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Notifications::Priority).string().not_null())
                    .col(
                        ColumnDef::new(Notifications::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Notifications::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-notifications-user_id-created_at")
                    .table(Notifications::Table)
                    .col(Notifications::UserId)
                    .col(Notifications::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserNotificationSettings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserNotificationSettings::UserId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UserNotificationSettings::BudgetAlertsEnabled)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserNotificationSettings::BalanceAlertsEnabled)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserNotificationSettings::BudgetWarningPercent)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserNotificationSettings::LowBalanceThresholdMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserNotificationSettings::PreferredChannel)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserNotificationSettings::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserNotificationSettings::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 7. Outbox
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Outbox::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Outbox::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Outbox::Channel).string().not_null())
                    .col(ColumnDef::new(Outbox::Payload).text().not_null())
                    .col(
                        ColumnDef::new(Outbox::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Outbox::PublishedAt).timestamp())
                    .col(ColumnDef::new(Outbox::SettledAt).timestamp())
                    .col(ColumnDef::new(Outbox::DeadLetteredAt).timestamp())
                    .col(
                        ColumnDef::new(Outbox::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Outbox::LastError).text())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-outbox-published_at")
                    .table(Outbox::Table)
                    .col(Outbox::PublishedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-outbox-settled_at")
                    .table(Outbox::Table)
                    .col(Outbox::SettledAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(Outbox::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserNotificationSettings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Notifications::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BudgetAlertMarks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Budgets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LedgerEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BankAccounts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        Ok(())
    }
}
