//! Wallet balance tests: top-ups, payouts and admin transfers

mod common;

use rust_decimal_macros::dec;

use common::TestApp;
use rideway_server::store::WalletRepo;
use rideway_server::wallet::{RequestStatus, Review, TransactionKind, WalletError};

#[tokio::test]
async fn test_manual_top_up_moves_exact_amount() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let customer = app.customer().await;
    let wallet = &app.state.wallet_service;

    app.fund(&admin, &admin, dec!(500)).await;
    let transfer = wallet
        .manual_top_up(admin.user_id, customer.user_id, dec!(125.50))
        .await
        .unwrap();

    assert_eq!(transfer.debit.amount, dec!(-125.50));
    assert_eq!(transfer.debit.kind, TransactionKind::ManualTopUpDebit);
    assert_eq!(transfer.credit.amount, dec!(125.50));
    assert_eq!(transfer.credit.reference_id, Some(admin.user_id));

    assert_eq!(wallet.balance(admin.user_id).await.unwrap(), dec!(374.50));
    assert_eq!(wallet.balance(customer.user_id).await.unwrap(), dec!(125.50));
}

#[tokio::test]
async fn test_failed_manual_top_up_changes_nothing() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let customer = app.customer().await;
    let wallet = &app.state.wallet_service;

    app.fund(&admin, &admin, dec!(50)).await;
    let before = app.store.list_transactions(admin.user_id).await.unwrap().len();

    let result = wallet
        .manual_top_up(admin.user_id, customer.user_id, dec!(80))
        .await;
    assert!(matches!(
        result,
        Err(WalletError::InsufficientFunds { available, requested })
            if available == dec!(50) && requested == dec!(80)
    ));

    assert_eq!(wallet.balance(admin.user_id).await.unwrap(), dec!(50));
    assert_eq!(wallet.balance(customer.user_id).await.unwrap(), dec!(0));
    assert_eq!(
        app.store.list_transactions(admin.user_id).await.unwrap().len(),
        before
    );
    assert!(app
        .store
        .list_transactions(customer.user_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_manual_top_up_rejects_bad_amounts() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let customer = app.customer().await;
    let wallet = &app.state.wallet_service;
    app.fund(&admin, &admin, dec!(100)).await;

    for amount in [dec!(0), dec!(-5), dec!(1.001)] {
        assert!(matches!(
            wallet.manual_top_up(admin.user_id, customer.user_id, amount).await,
            Err(WalletError::InvalidAmount(_))
        ));
    }
    assert!(matches!(
        wallet.manual_top_up(admin.user_id, admin.user_id, dec!(10)).await,
        Err(WalletError::SelfTransfer)
    ));
}

#[tokio::test]
async fn test_top_up_resolves_once() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let customer = app.customer().await;
    let wallet = &app.state.wallet_service;

    let request = wallet
        .request_top_up(customer.user_id, dec!(40), Some("cash at office".into()))
        .await
        .unwrap();
    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(wallet.balance(customer.user_id).await.unwrap(), dec!(0));

    let approved = wallet
        .review_top_up(admin.user_id, request.id, Review::Approve, None)
        .await
        .unwrap();
    assert_eq!(approved.status, RequestStatus::Completed);
    assert_eq!(approved.reviewed_by, Some(admin.user_id));

    // A second review must not credit again
    assert!(wallet
        .review_top_up(admin.user_id, request.id, Review::Approve, None)
        .await
        .is_err());
    assert_eq!(wallet.balance(customer.user_id).await.unwrap(), dec!(40));
}

#[tokio::test]
async fn test_rejected_top_up_credits_nothing() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let customer = app.customer().await;
    let wallet = &app.state.wallet_service;

    let request = wallet
        .request_top_up(customer.user_id, dec!(40), None)
        .await
        .unwrap();
    let rejected = wallet
        .review_top_up(admin.user_id, request.id, Review::Reject, Some("no receipt".into()))
        .await
        .unwrap();

    assert_eq!(rejected.status, RequestStatus::Rejected);
    assert_eq!(rejected.note.as_deref(), Some("no receipt"));
    assert_eq!(wallet.balance(customer.user_id).await.unwrap(), dec!(0));
}

#[tokio::test]
async fn test_payout_rechecks_balance_on_approval() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let driver = app.online_driver(&admin).await;
    let wallet = &app.state.wallet_service;

    assert!(matches!(
        wallet
            .request_payout(driver.user_id, dec!(10), "acct-001".into())
            .await,
        Err(WalletError::InsufficientFunds { .. })
    ));

    app.fund(&admin, &driver, dec!(100)).await;

    // Each fits the balance on its own, not both together
    let first = wallet
        .request_payout(driver.user_id, dec!(80), "acct-001".into())
        .await
        .unwrap();
    let second = wallet
        .request_payout(driver.user_id, dec!(80), "acct-001".into())
        .await
        .unwrap();

    let paid = wallet
        .review_payout(admin.user_id, first.id, Review::Approve, None)
        .await
        .unwrap();
    assert_eq!(paid.status, RequestStatus::Completed);
    assert_eq!(wallet.balance(driver.user_id).await.unwrap(), dec!(20));

    assert!(matches!(
        wallet
            .review_payout(admin.user_id, second.id, Review::Approve, None)
            .await,
        Err(WalletError::InsufficientFunds { .. })
    ));
    assert_eq!(wallet.balance(driver.user_id).await.unwrap(), dec!(20));

    let pending = wallet
        .list_payouts(Some(driver.user_id), Some(RequestStatus::Pending))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, second.id);

    let payouts: Vec<_> = app
        .store
        .list_transactions(driver.user_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.kind == TransactionKind::Payout)
        .collect();
    assert_eq!(payouts.len(), 1);
    assert_eq!(payouts[0].amount, dec!(-80));
    assert_eq!(payouts[0].balance_after, dec!(20));
}
