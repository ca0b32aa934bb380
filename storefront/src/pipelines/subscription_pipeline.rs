// storefront/src/pipelines/subscription_pipeline.rs

use crate::errors::AppError;
use crate::models::{NewTransaction, TransactionStatus};
use crate::pipelines::common_steps::{record_customer, record_order, record_transaction};
use crate::pipelines::contexts::SubscriptionCtxData;
use crate::pipelines::journal::StoreJournal;
use crate::services::gateway::SubscriptionMetadata;
use crate::state::AppState;
use sagaflow::{ContextData, Control, Effect, Flow, Flows};
use tracing::{event, warn, Level};

pub const FLOW_NAME: &str = "subscription_signup";
pub const SUBSCRIPTION_NOTICE: &str = "the subscription was created, but the order could not be recorded";

/// Subscription signup.
///
/// The remote customer and subscription are created first; local rows are
/// written afterwards. If a local write fails the subscription is cancelled
/// at period end and the caller gets a reconciliation error.
pub fn register_subscription_pipeline(flows: &Flows<AppError>, app: &AppState) {
  let mut flow = Flow::<SubscriptionCtxData, AppError>::new(
    FLOW_NAME,
    &[
      ("load_widget", Effect::None, None),
      ("create_remote_customer", Effect::Remote, None),
      ("create_remote_subscription", Effect::Settlement, None),
      ("persist_customer", Effect::Local, None),
      ("persist_transaction", Effect::Local, None),
      ("persist_order", Effect::Local, None),
    ],
  );
  flow
    .with_journal(StoreJournal::new(app.store.clone()))
    .describe_with(SubscriptionCtxData::journal_subject)
    .reconciliation_notice(SUBSCRIPTION_NOTICE);

  flow.on_step("load_widget", |ctx_data: ContextData<SubscriptionCtxData>| async move {
    let (store, widget_id) = ctx_data.with_read(|d| (d.app.store.clone(), d.widget_id));

    let widget = store
      .get_widget(widget_id)
      .await?
      .ok_or_else(|| AppError::NotFound(format!("widget {} not found", widget_id)))?;
    if !widget.is_recurring {
      return Err(AppError::BadRequest(format!("widget {} is not a subscription product", widget_id)));
    }

    let mut guard = ctx_data.write();
    if guard.plan.trim().is_empty() {
      guard.plan = widget.plan_id.clone();
    }
    if guard.plan.trim().is_empty() {
      return Err(AppError::BadRequest("no plan given for this widget".to_string()));
    }
    guard.widget = Some(widget);
    Ok::<_, AppError>(Control::Continue)
  });

  flow.on_step("create_remote_customer", |ctx_data: ContextData<SubscriptionCtxData>| async move {
    let (gateway, payment_method, name, email) = ctx_data.with_read(|d| {
      (
        d.app.gateway.clone(),
        d.payment_method.clone(),
        format!("{} {}", d.buyer.first_name, d.buyer.last_name).trim().to_string(),
        d.buyer.email.clone(),
      )
    });

    let customer = gateway.create_customer(&payment_method, &name, &email).await?;
    event!(Level::INFO, remote_customer_id = %customer.id, "Remote customer created.");
    ctx_data.write().remote_customer_id = Some(customer.id);
    Ok::<_, AppError>(Control::Continue)
  });

  flow.on_step("create_remote_subscription", |ctx_data: ContextData<SubscriptionCtxData>| async move {
    let (gateway, customer_id, plan, metadata) = ctx_data.with_read(|d| {
      (
        d.app.gateway.clone(),
        d.remote_customer_id.clone(),
        d.plan.clone(),
        SubscriptionMetadata {
          last_four: d.last_four.clone(),
          card_type: d.card_brand.clone(),
        },
      )
    });
    let customer_id =
      customer_id.ok_or_else(|| AppError::Internal("remote customer missing before subscribing".to_string()))?;

    let subscription = gateway.create_subscription(&customer_id, &plan, &metadata).await?;
    event!(Level::INFO, subscription_id = %subscription.id, %plan, "Remote subscription created.");
    ctx_data.write().subscription_id = Some(subscription.id);
    Ok::<_, AppError>(Control::Continue)
  });

  flow.compensate_step(
    "create_remote_subscription",
    |ctx_data: ContextData<SubscriptionCtxData>| async move {
      let (gateway, subscription_id) = ctx_data.with_read(|d| (d.app.gateway.clone(), d.subscription_id.clone()));
      let Some(subscription_id) = subscription_id else {
        return Ok(());
      };
      warn!(%subscription_id, "Cancelling subscription at period end after a failed signup.");
      gateway.cancel_subscription(&subscription_id).await.map(|_| ())
    },
  );

  flow.on_step("persist_customer", |ctx_data: ContextData<SubscriptionCtxData>| async move {
    let (app, buyer) = ctx_data.with_read(|d| (d.app.clone(), d.buyer.clone()));
    let customer_id = record_customer(&app, &buyer).await?;
    ctx_data.write().recorded.customer_id = Some(customer_id);
    Ok::<_, AppError>(Control::Continue)
  });

  flow.on_step("persist_transaction", |ctx_data: ContextData<SubscriptionCtxData>| async move {
    let (app, txn) = ctx_data.with_read(|d| {
      let txn = NewTransaction {
        amount: d.widget.as_ref().map(|w| w.price).unwrap_or_default(),
        currency: d.app.config.default_currency.clone(),
        last_four: d.last_four.clone(),
        expiry_month: d.expiry_month,
        expiry_year: d.expiry_year,
        payment_intent: d.subscription_id.clone().unwrap_or_default(),
        payment_method: d.payment_method.clone(),
        bank_return_code: String::new(),
        status: TransactionStatus::Cleared,
      };
      (d.app.clone(), txn)
    });
    let transaction_id = record_transaction(&app, &txn).await?;
    ctx_data.write().recorded.transaction_id = Some(transaction_id);
    Ok::<_, AppError>(Control::Continue)
  });

  flow.on_step("persist_order", |ctx_data: ContextData<SubscriptionCtxData>| async move {
    let (app, widget, recorded) = ctx_data.with_read(|d| (d.app.clone(), d.widget.clone(), d.recorded.clone()));
    let (Some(widget), Some(transaction_id), Some(customer_id)) =
      (widget, recorded.transaction_id, recorded.customer_id)
    else {
      return Err(AppError::Internal("subscription order is missing its references".to_string()));
    };

    let order_id = record_order(&app, widget.id, transaction_id, customer_id, widget.price).await?;
    ctx_data.write().recorded.order_id = Some(order_id);
    Ok::<_, AppError>(Control::Continue)
  });

  flows.register(flow);
  tracing::info!("Subscription signup pipeline registered.");
}
