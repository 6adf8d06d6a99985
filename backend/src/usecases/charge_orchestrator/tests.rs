use anyhow::anyhow;
use chrono::Utc;
use rust_decimal_macros::dec;
use serde_json::json;
use settlement::{
    domain::{
        entities::{
            billing_profiles::{BillingProfileEntity, SavedCard},
            invoices::{InvoiceEntity, LineItem},
            orders::OrderEntity,
            products::ProductEntity,
            subscriptions::SubscriptionEntity,
        },
        repositories::{
            billing_profiles::MockBillingProfileRepository, invoices::MockInvoiceRepository,
            locks::MockLockRepository, orders::MockOrderRepository,
            products::MockProductRepository, subscriptions::MockSubscriptionRepository,
        },
        value_objects::{
            enums::{
                billing_periods::{BillingPeriod, PlanInterval},
                product_types::ProductType,
                subscription_statuses::SubscriptionStatus,
            },
            payment_errors::PaymentErrorKind,
            payment_methods::PaymentMethod,
            request_context::AuthenticatedUser,
        },
    },
    payments::gateway::{GatewaySubscription, MockPaymentGateway},
};

use super::*;
use crate::usecases::{
    payment_guard::{LockSettings, PaymentStateGuard},
    payment_methods::{CardHandler, ClientTokenHandler},
    source_resolver::SourceResolver,
};

type TestOrchestrator = ChargeOrchestrator<
    MockInvoiceRepository,
    MockOrderRepository,
    MockProductRepository,
    MockSubscriptionRepository,
    MockPaymentGateway,
>;

#[derive(Default)]
struct Fixture {
    invoice_repo: MockInvoiceRepository,
    order_repo: MockOrderRepository,
    product_repo: MockProductRepository,
    subscription_repo: MockSubscriptionRepository,
    billing_repo: MockBillingProfileRepository,
    gateway: MockPaymentGateway,
}

impl Fixture {
    fn with_invoice(mut self, invoice: InvoiceEntity, products: Vec<ProductEntity>) -> Self {
        self.invoice_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(invoice.clone())));
        self.product_repo
            .expect_find_by_ids()
            .returning(move |_| Ok(products.clone()));
        self
    }

    fn with_subscriptions(mut self, order: OrderEntity, subscriptions: Vec<SubscriptionEntity>) -> Self {
        self.order_repo
            .expect_find_by_invoice_id()
            .returning(move |_| Ok(vec![order.clone()]));
        self.subscription_repo
            .expect_find_by_order_ids()
            .returning(move |_| Ok(subscriptions.clone()));
        self
    }

    fn with_saved_card(mut self, profile: BillingProfileEntity) -> Self {
        self.billing_repo
            .expect_find_by_user_id()
            .returning(move |_| Ok(Some(profile.clone())));
        self
    }

    fn build(self) -> TestOrchestrator {
        let gateway = Arc::new(self.gateway);

        let mut lock_repo = MockLockRepository::new();
        lock_repo.expect_try_acquire().returning(|_, _, _| Ok(true));
        lock_repo.expect_release().returning(|_, _| Ok(()));
        let guard = Arc::new(PaymentStateGuard::new(
            Arc::new(lock_repo),
            LockSettings::default(),
        ));

        let resolver = Arc::new(SourceResolver::new(
            Arc::new(self.billing_repo),
            guard,
            Arc::clone(&gateway),
        ));
        let handlers = PaymentMethodRegistry::new()
            .register(Arc::new(CardHandler::new(resolver)))
            .register(Arc::new(ClientTokenHandler));

        ChargeOrchestrator::new(
            Arc::new(self.invoice_repo),
            Arc::new(self.order_repo),
            Arc::new(self.product_repo),
            Arc::new(self.subscription_repo),
            gateway,
            handlers,
            "usd".to_string(),
        )
    }
}

fn line(
    product_id: Uuid,
    title: &str,
    unit_price: Decimal,
    discount: Decimal,
    period: Option<BillingPeriod>,
) -> LineItem {
    LineItem {
        product_id,
        sku: None,
        title: title.to_string(),
        unit_price,
        quantity: 1,
        discount,
        total: unit_price - discount,
        period,
    }
}

fn invoice(lines: Vec<LineItem>) -> InvoiceEntity {
    let total = lines.iter().map(|line| line.total).sum();
    InvoiceEntity {
        id: Uuid::new_v4(),
        currency: "usd".to_string(),
        total,
        lines,
        trial_ends_at: None,
        created_at: Utc::now(),
    }
}

fn product(id: Uuid, product_type: ProductType) -> ProductEntity {
    ProductEntity {
        id,
        name: "product".to_string(),
        product_type,
        created_at: Utc::now(),
    }
}

fn order(invoice_id: Uuid) -> OrderEntity {
    OrderEntity {
        id: Uuid::new_v4(),
        invoice_id,
        user_id: None,
        redirect: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn subscription(order_id: Uuid, product_id: Uuid, period: BillingPeriod) -> SubscriptionEntity {
    SubscriptionEntity {
        id: Uuid::new_v4(),
        order_id,
        user_id: None,
        product_id,
        period,
        status: SubscriptionStatus::Pending,
        gateway_plan_id: None,
        provider_subscription_id: None,
        gateway_snapshot: None,
        cancel_snapshot: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn token_payment(invoice_id: Option<Uuid>, amount: Decimal) -> PaymentEntity {
    PaymentEntity::new(
        Uuid::new_v4(),
        invoice_id,
        None,
        amount,
        "USD",
        PaymentMethod::ClientToken {
            token: "tok_visa".to_string(),
        },
    )
    .unwrap()
}

/// Profile with one saved card backed by `card_1` on customer `cus_1`.
fn saved_card_payment(
    invoice_id: Uuid,
    amount: Decimal,
) -> (RequestContext, BillingProfileEntity, PaymentEntity) {
    let user_id = Uuid::new_v4();
    let mut profile = BillingProfileEntity::new(user_id, "cus_1".to_string());
    profile.add_card(SavedCard {
        id: Uuid::new_v4(),
        brand: "visa".to_string(),
        last4: "4242".to_string(),
        funding: None,
        country: None,
        source: "card_1".to_string(),
    });

    let payment = PaymentEntity::new(
        Uuid::new_v4(),
        Some(invoice_id),
        Some(user_id),
        amount,
        "usd",
        PaymentMethod::SavedCard {
            card_id: profile.cards[0].id,
        },
    )
    .unwrap();

    let ctx = RequestContext::for_user(AuthenticatedUser {
        id: user_id,
        email: Some("buyer@example.com".to_string()),
    });

    (ctx, profile, payment)
}

fn gateway_subscription() -> GatewaySubscription {
    GatewaySubscription {
        id: "sub_1".to_string(),
        status: "active".to_string(),
        cancel_at_period_end: false,
        raw: json!({"id": "sub_1", "status": "active"}),
    }
}

#[tokio::test]
async fn single_item_is_charged_in_minor_units() {
    let product_id = Uuid::new_v4();
    let invoice = invoice(vec![line(product_id, "Mug", dec!(49.99), dec!(0), None)]);
    let payment = token_payment(Some(invoice.id), dec!(49.99));
    let description = payment.describe();

    let mut fixture =
        Fixture::default().with_invoice(invoice, vec![product(product_id, ProductType::Physical)]);
    fixture
        .gateway
        .expect_create_charge()
        .withf(move |request| {
            request.amount_minor == 4999
                && request.currency == "usd"
                && request.source == "tok_visa"
                && request.customer.is_none()
                && request.description == description
        })
        .times(1)
        .returning(|_| Ok(json!({"id": "ch_1", "paid": true})));
    let orchestrator = fixture.build();

    let payment = orchestrator
        .attempt(&RequestContext::anonymous(), payment)
        .await
        .unwrap();

    assert!(payment.is_complete());
    assert!(payment.error().is_none());
    assert_eq!(payment.gateway_response(), Some(&json!({"id": "ch_1", "paid": true})));
}

#[tokio::test]
async fn subscription_only_invoice_registers_without_charging() {
    let product_id = Uuid::new_v4();
    let invoice = invoice(vec![line(
        product_id,
        "Coffee club",
        dec!(30.00),
        dec!(0),
        Some(BillingPeriod::Monthly),
    )]);
    let order = order(invoice.id);
    let pending = subscription(order.id, product_id, BillingPeriod::Monthly);
    let subscription_id = pending.id;
    let (ctx, profile, payment) = saved_card_payment(invoice.id, dec!(30.00));

    let mut fixture = Fixture::default()
        .with_invoice(invoice, vec![product(product_id, ProductType::Subscription)])
        .with_subscriptions(order, vec![pending])
        .with_saved_card(profile);
    fixture
        .gateway
        .expect_create_plan()
        .withf(|request| {
            request.amount_minor == 3000
                && request.currency == "usd"
                && request.interval == PlanInterval::Month
                && request.interval_count == 1
                && request.product_name == "Coffee club"
        })
        .times(1)
        .returning(|_| Ok("plan_1".to_string()));
    fixture
        .gateway
        .expect_create_subscription()
        .withf(|request| {
            request.customer == "cus_1"
                && request.items
                    == vec![SubscriptionItemRequest {
                        plan_id: "plan_1".to_string(),
                        quantity: 1,
                    }]
                && request.coupon.is_none()
                && request.trial_end.is_none()
        })
        .times(1)
        .returning(|_| Ok(gateway_subscription()));
    fixture.gateway.expect_create_coupon().times(0);
    fixture.gateway.expect_create_charge().times(0);
    fixture
        .subscription_repo
        .expect_save_all()
        .withf(move |saved| {
            saved.len() == 1
                && saved[0].id == subscription_id
                && saved[0].status == SubscriptionStatus::Active
                && saved[0].provider_subscription_id.as_deref() == Some("sub_1")
                && saved[0].gateway_plan_id.as_deref() == Some("plan_1")
        })
        .times(1)
        .returning(|_| Ok(()));
    let orchestrator = fixture.build();

    let payment = orchestrator.attempt(&ctx, payment).await.unwrap();

    assert!(payment.is_complete());
    assert!(payment.gateway_response().is_none());
}

#[tokio::test]
async fn discounted_subscription_gets_coupon_and_remainder_is_charged() {
    let club_id = Uuid::new_v4();
    let mug_id = Uuid::new_v4();
    let invoice = invoice(vec![
        line(
            club_id,
            "Coffee club",
            dec!(30.00),
            dec!(5.00),
            Some(BillingPeriod::Monthly),
        ),
        line(mug_id, "Mug", dec!(20.00), dec!(0), None),
    ]);
    let order = order(invoice.id);
    let pending = subscription(order.id, club_id, BillingPeriod::Monthly);
    let (ctx, profile, payment) = saved_card_payment(invoice.id, dec!(45.00));

    let mut fixture = Fixture::default()
        .with_invoice(
            invoice,
            vec![
                product(club_id, ProductType::Subscription),
                product(mug_id, ProductType::Physical),
            ],
        )
        .with_subscriptions(order, vec![pending])
        .with_saved_card(profile);
    fixture
        .gateway
        .expect_create_plan()
        .withf(|request| request.amount_minor == 3000)
        .times(1)
        .returning(|_| Ok("plan_1".to_string()));
    fixture
        .gateway
        .expect_create_coupon()
        .withf(|request| request.amount_off_minor == 500 && request.currency == "usd")
        .times(1)
        .returning(|_| Ok("coupon_1".to_string()));
    fixture
        .gateway
        .expect_create_subscription()
        .withf(|request| request.coupon.as_deref() == Some("coupon_1"))
        .times(1)
        .returning(|_| Ok(gateway_subscription()));
    fixture
        .gateway
        .expect_create_charge()
        .withf(|request| {
            request.amount_minor == 2000
                && request.source == "card_1"
                && request.customer.as_deref() == Some("cus_1")
        })
        .times(1)
        .returning(|_| Ok(json!({"id": "ch_2"})));
    fixture
        .subscription_repo
        .expect_save_all()
        .times(1)
        .returning(|_| Ok(()));
    let orchestrator = fixture.build();

    let payment = orchestrator.attempt(&ctx, payment).await.unwrap();

    assert!(payment.is_complete());
    assert_eq!(payment.gateway_response(), Some(&json!({"id": "ch_2"})));
}

#[tokio::test]
async fn coupon_covers_only_subscriptions_being_registered() {
    let club_id = Uuid::new_v4();
    let tea_id = Uuid::new_v4();
    let invoice = invoice(vec![
        line(
            club_id,
            "Coffee club",
            dec!(30.00),
            dec!(5.00),
            Some(BillingPeriod::Monthly),
        ),
        line(tea_id, "Tea box", dec!(10.00), dec!(0), Some(BillingPeriod::Monthly)),
    ]);
    let order = order(invoice.id);
    let mut club = subscription(order.id, club_id, BillingPeriod::Monthly);
    club.activate("plan_club".to_string(), "sub_club".to_string(), json!({}));
    let tea_box = subscription(order.id, tea_id, BillingPeriod::Monthly);
    let tea_box_id = tea_box.id;
    let (ctx, profile, payment) = saved_card_payment(invoice.id, dec!(35.00));

    let mut fixture = Fixture::default()
        .with_invoice(
            invoice,
            vec![
                product(club_id, ProductType::Subscription),
                product(tea_id, ProductType::Subscription),
            ],
        )
        .with_subscriptions(order, vec![club, tea_box])
        .with_saved_card(profile);
    fixture
        .gateway
        .expect_create_plan()
        .withf(|request| request.amount_minor == 1000 && request.product_name == "Tea box")
        .times(1)
        .returning(|_| Ok("plan_tea".to_string()));
    fixture.gateway.expect_create_coupon().times(0);
    fixture
        .gateway
        .expect_create_subscription()
        .withf(|request| request.coupon.is_none() && request.items.len() == 1)
        .times(1)
        .returning(|_| Ok(gateway_subscription()));
    fixture.gateway.expect_create_charge().times(0);
    fixture
        .subscription_repo
        .expect_save_all()
        .withf(move |saved| saved.len() == 1 && saved[0].id == tea_box_id)
        .times(1)
        .returning(|_| Ok(()));
    let orchestrator = fixture.build();

    let payment = orchestrator.attempt(&ctx, payment).await.unwrap();

    assert!(payment.is_complete());
}

#[tokio::test]
async fn unsaved_registration_is_reported_and_retry_reuses_gateway_keys() {
    let product_id = Uuid::new_v4();
    let invoice = invoice(vec![
        line(
            product_id,
            "Coffee club",
            dec!(30.00),
            dec!(0),
            Some(BillingPeriod::Monthly),
        ),
        line(Uuid::new_v4(), "Mug", dec!(20.00), dec!(0), None),
    ]);
    let mug_id = invoice.lines[1].product_id;
    let order = order(invoice.id);
    let pending = subscription(order.id, product_id, BillingPeriod::Monthly);
    let (ctx, profile, payment) = saved_card_payment(invoice.id, dec!(50.00));

    let keys = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
    let seen = Arc::clone(&keys);

    let mut fixture = Fixture::default()
        .with_invoice(
            invoice,
            vec![
                product(product_id, ProductType::Subscription),
                product(mug_id, ProductType::Physical),
            ],
        )
        .with_subscriptions(order, vec![pending])
        .with_saved_card(profile);
    fixture
        .gateway
        .expect_create_plan()
        .times(2)
        .returning(|_| Ok("plan_1".to_string()));
    fixture
        .gateway
        .expect_create_subscription()
        .times(2)
        .returning(move |request| {
            seen.lock().unwrap().push(request.idempotency_key.clone());
            Ok(gateway_subscription())
        });
    let mut saves = 0;
    fixture
        .subscription_repo
        .expect_save_all()
        .times(2)
        .returning(move |_| {
            saves += 1;
            if saves == 1 {
                Err(anyhow!("duplicate key value violates unique constraint \"subscriptions_pkey\""))
            } else {
                Ok(())
            }
        });
    fixture
        .gateway
        .expect_create_charge()
        .withf(|request| request.amount_minor == 2000)
        .times(1)
        .returning(|_| Ok(json!({"id": "ch_4"})));
    let orchestrator = fixture.build();

    let payment = orchestrator.attempt(&ctx, payment).await.unwrap();

    assert!(!payment.is_complete());
    let error = payment.error().unwrap();
    assert_eq!(error.kind, PaymentErrorKind::RecordingFailed);
    assert!(!error.message.contains("duplicate key"));
    assert!(!error.message.contains("subscriptions_pkey"));

    let payment = orchestrator.attempt(&ctx, payment).await.unwrap();

    assert!(payment.is_complete());
    let keys = keys.lock().unwrap();
    assert_eq!(keys.len(), 2);
    assert!(!keys[0].is_empty());
    assert_eq!(keys[0], keys[1]);
}

#[tokio::test]
async fn cancelled_subscription_is_never_registered() {
    let product_id = Uuid::new_v4();
    let invoice = invoice(vec![line(
        product_id,
        "Coffee club",
        dec!(30.00),
        dec!(0),
        Some(BillingPeriod::Monthly),
    )]);
    let order = order(invoice.id);
    let mut cancelled = subscription(order.id, product_id, BillingPeriod::Monthly);
    cancelled.cancel(None);
    let (ctx, profile, payment) = saved_card_payment(invoice.id, dec!(30.00));

    let mut fixture = Fixture::default()
        .with_invoice(invoice, vec![product(product_id, ProductType::Subscription)])
        .with_subscriptions(order, vec![cancelled])
        .with_saved_card(profile);
    fixture.gateway.expect_create_plan().times(0);
    fixture.gateway.expect_create_subscription().times(0);
    fixture.gateway.expect_create_charge().times(0);
    fixture.subscription_repo.expect_save_all().times(0);
    let orchestrator = fixture.build();

    let payment = orchestrator.attempt(&ctx, payment).await.unwrap();

    assert!(!payment.is_complete());
    let error = payment.error().unwrap();
    assert_eq!(error.kind, PaymentErrorKind::NotFound);
    assert!(error.message.contains("Coffee club"));
}

#[tokio::test]
async fn declined_charge_is_recorded_as_gateway_error() {
    let mut fixture = Fixture::default();
    fixture
        .gateway
        .expect_create_charge()
        .times(1)
        .returning(|_| Err(anyhow!("Your card was declined.")));
    let orchestrator = fixture.build();

    let payment = orchestrator
        .attempt(&RequestContext::anonymous(), token_payment(None, dec!(10.00)))
        .await
        .unwrap();

    assert!(!payment.is_complete());
    let error = payment.error().unwrap();
    assert_eq!(error.kind, PaymentErrorKind::GatewayError);
    assert!(error.message.contains("Your card was declined."));
}

#[tokio::test]
async fn token_cannot_pay_for_subscriptions() {
    let product_id = Uuid::new_v4();
    let invoice = invoice(vec![line(
        product_id,
        "Coffee club",
        dec!(30.00),
        dec!(0),
        Some(BillingPeriod::Monthly),
    )]);
    let payment = token_payment(Some(invoice.id), dec!(30.00));
    let orchestrator = Fixture::default()
        .with_invoice(invoice, vec![product(product_id, ProductType::Subscription)])
        .build();

    let payment = orchestrator
        .attempt(&RequestContext::anonymous(), payment)
        .await
        .unwrap();

    assert!(!payment.is_complete());
    assert_eq!(
        payment.error().map(|err| err.kind),
        Some(PaymentErrorKind::RecurringUnsupported)
    );
}

#[tokio::test]
async fn re_attempt_skips_registered_subscriptions() {
    let club_id = Uuid::new_v4();
    let mug_id = Uuid::new_v4();
    let invoice = invoice(vec![
        line(
            club_id,
            "Coffee club",
            dec!(30.00),
            dec!(0),
            Some(BillingPeriod::Monthly),
        ),
        line(mug_id, "Mug", dec!(20.00), dec!(0), None),
    ]);
    let order = order(invoice.id);
    let mut registered = subscription(order.id, club_id, BillingPeriod::Monthly);
    registered.activate("plan_1".to_string(), "sub_1".to_string(), json!({}));
    let (ctx, profile, payment) = saved_card_payment(invoice.id, dec!(50.00));

    let mut fixture = Fixture::default()
        .with_invoice(
            invoice,
            vec![
                product(club_id, ProductType::Subscription),
                product(mug_id, ProductType::Physical),
            ],
        )
        .with_subscriptions(order, vec![registered])
        .with_saved_card(profile);
    fixture.gateway.expect_create_plan().times(0);
    fixture.gateway.expect_create_subscription().times(0);
    fixture
        .gateway
        .expect_create_charge()
        .withf(|request| request.amount_minor == 2000)
        .times(1)
        .returning(|_| Ok(json!({"id": "ch_3"})));
    let orchestrator = fixture.build();

    let payment = orchestrator.attempt(&ctx, payment).await.unwrap();

    assert!(payment.is_complete());
}

#[tokio::test]
async fn mismatched_subscription_period_fails_before_gateway() {
    let product_id = Uuid::new_v4();
    let invoice = invoice(vec![line(
        product_id,
        "Coffee club",
        dec!(30.00),
        dec!(0),
        Some(BillingPeriod::Monthly),
    )]);
    let order = order(invoice.id);
    let annual = subscription(order.id, product_id, BillingPeriod::Annually);
    let (ctx, profile, payment) = saved_card_payment(invoice.id, dec!(30.00));

    let orchestrator = Fixture::default()
        .with_invoice(invoice, vec![product(product_id, ProductType::Subscription)])
        .with_subscriptions(order, vec![annual])
        .with_saved_card(profile)
        .build();

    let payment = orchestrator.attempt(&ctx, payment).await.unwrap();

    assert!(!payment.is_complete());
    assert_eq!(
        payment.error().map(|err| err.kind),
        Some(PaymentErrorKind::NotFound)
    );
}

#[tokio::test]
async fn missing_subscription_record_fails_before_gateway() {
    let product_id = Uuid::new_v4();
    let invoice = invoice(vec![line(
        product_id,
        "Coffee club",
        dec!(30.00),
        dec!(0),
        Some(BillingPeriod::Monthly),
    )]);
    let order = order(invoice.id);
    let (ctx, profile, payment) = saved_card_payment(invoice.id, dec!(30.00));

    let orchestrator = Fixture::default()
        .with_invoice(invoice, vec![product(product_id, ProductType::Subscription)])
        .with_subscriptions(order, Vec::new())
        .with_saved_card(profile)
        .build();

    let payment = orchestrator.attempt(&ctx, payment).await.unwrap();

    let error = payment.error().unwrap();
    assert_eq!(error.kind, PaymentErrorKind::NotFound);
    assert!(error.message.contains("Coffee club"));
}

#[tokio::test]
async fn unknown_product_fails_as_not_found() {
    let invoice = invoice(vec![line(Uuid::new_v4(), "Ghost", dec!(5.00), dec!(0), None)]);
    let payment = token_payment(Some(invoice.id), dec!(5.00));
    let orchestrator = Fixture::default().with_invoice(invoice, Vec::new()).build();

    let payment = orchestrator
        .attempt(&RequestContext::anonymous(), payment)
        .await
        .unwrap();

    assert_eq!(
        payment.error().map(|err| err.kind),
        Some(PaymentErrorKind::NotFound)
    );
}

#[tokio::test]
async fn completed_payment_is_returned_untouched() {
    let mut payment = token_payment(Some(Uuid::new_v4()), dec!(10.00));
    payment.mark_complete(Some(json!({"id": "ch_old"})));
    let orchestrator = Fixture::default().build();

    let payment = orchestrator
        .attempt(&RequestContext::anonymous(), payment)
        .await
        .unwrap();

    assert!(payment.is_complete());
    assert_eq!(payment.gateway_response(), Some(&json!({"id": "ch_old"})));
}

#[test]
fn matching_pairs_each_record_with_its_line() {
    let product_id = Uuid::new_v4();
    let lines = vec![PricedLine {
        product_id,
        product_type: ProductType::Subscription,
        title: "Coffee club".to_string(),
        unit_price: dec!(10),
        quantity: 2,
        discount: dec!(0),
        period: Some(BillingPeriod::Quarterly),
    }];
    let proration = Proration::calculate(dec!(20), &lines);
    let record = subscription(Uuid::new_v4(), product_id, BillingPeriod::Quarterly);

    let pairs = match_subscriptions(&proration, vec![record.clone()]).unwrap();

    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].0, record);
    assert_eq!(pairs[0].1.quantity, 2);
}

#[test]
fn matching_ignores_cancelled_records() {
    let product_id = Uuid::new_v4();
    let lines = vec![PricedLine {
        product_id,
        product_type: ProductType::Subscription,
        title: "Coffee club".to_string(),
        unit_price: dec!(10),
        quantity: 1,
        discount: dec!(0),
        period: Some(BillingPeriod::Monthly),
    }];
    let proration = Proration::calculate(dec!(10), &lines);
    let mut cancelled = subscription(Uuid::new_v4(), product_id, BillingPeriod::Monthly);
    cancelled.cancel(None);
    let live = subscription(Uuid::new_v4(), product_id, BillingPeriod::Monthly);

    let err = match_subscriptions(&proration, vec![cancelled.clone()]).unwrap_err();
    assert_eq!(err.kind, PaymentErrorKind::NotFound);

    let pairs = match_subscriptions(&proration, vec![cancelled, live.clone()]).unwrap();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].0.id, live.id);
}

#[test]
fn registration_key_ignores_record_order() {
    let (_, _, payment) = saved_card_payment(Uuid::new_v4(), dec!(10));
    let line = PricedLine {
        product_id: Uuid::new_v4(),
        product_type: ProductType::Subscription,
        title: "Coffee club".to_string(),
        unit_price: dec!(10),
        quantity: 1,
        discount: dec!(0),
        period: Some(BillingPeriod::Monthly),
    };
    let first = subscription(Uuid::new_v4(), line.product_id, BillingPeriod::Monthly);
    let second = subscription(Uuid::new_v4(), line.product_id, BillingPeriod::Monthly);

    let forward = registration_key(
        &payment,
        "cus_1",
        &[(first.clone(), line.clone()), (second.clone(), line.clone())],
    );
    let reversed = registration_key(
        &payment,
        "cus_1",
        &[(second.clone(), line.clone()), (first.clone(), line.clone())],
    );
    let other_customer = registration_key(&payment, "cus_2", &[(first, line)]);

    assert_eq!(forward, reversed);
    assert_ne!(forward, other_customer);
}
