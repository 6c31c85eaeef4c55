use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

use super::actions::{self, PendingEvent};
use super::derivation::derive_order_state;
use super::errors::{OrderError, OrderResult};
use super::guards::{check_confirmation, check_item_transition, check_order_transition};
use super::persistence::{self, Attribution};
use super::states::{ItemState, OrderState};
use crate::collaborators::{MenuCatalog, MenuItemSnapshot, TableDirectory};
use crate::context::RequestContext;
use crate::database::{TransactionPolicy, TransactionScope};
use crate::events::EventBroadcaster;
use crate::logging::log_order_operation;
use crate::models::{NewOrder, Order, OrderItem, OrderItemTransition, OrderTransition};

/// Result of one committed transition, before its events are published
struct Applied {
    order: Order,
    from: Option<OrderState>,
    events: Vec<PendingEvent>,
}

/// Owns the lifecycle of orders and their line items.
///
/// Every mutating call locks the order row first (`SELECT ... FOR UPDATE`),
/// validates against the locked state, writes the change together with its
/// history rows, commits, and only then publishes notifications.
#[derive(Clone)]
pub struct OrderStateMachine {
    pool: PgPool,
    catalog: Arc<dyn MenuCatalog>,
    tables: Arc<dyn TableDirectory>,
    broadcaster: EventBroadcaster,
    policy: TransactionPolicy,
    auto_confirm: bool,
}

impl OrderStateMachine {
    pub fn new(
        pool: PgPool,
        catalog: Arc<dyn MenuCatalog>,
        tables: Arc<dyn TableDirectory>,
        broadcaster: EventBroadcaster,
        policy: TransactionPolicy,
    ) -> Self {
        Self {
            pool,
            catalog,
            tables,
            broadcaster,
            policy,
            auto_confirm: false,
        }
    }

    /// Start new orders in `confirmado` instead of `pendiente_confirmacion`
    pub fn with_auto_confirm(mut self, auto_confirm: bool) -> Self {
        self.auto_confirm = auto_confirm;
        self
    }

    /// Create an order, snapshotting menu names and prices.
    pub async fn create_order(&self, ctx: RequestContext, new_order: NewOrder) -> OrderResult<Order> {
        validate_new_order(&new_order)?;

        let applied = self
            .policy
            .run("order.create", ctx.deadline, || self.create_once(ctx, &new_order))
            .await
            .inspect_err(|err| log_failure("order.create", err))?;

        Ok(self.finish("create", ctx, applied))
    }

    /// Accept a submitted order; legal only from `pendiente_confirmacion`.
    pub async fn confirm_order(&self, ctx: RequestContext, order_id: Uuid) -> OrderResult<Order> {
        let applied = self
            .policy
            .run("order.confirm", ctx.deadline, || {
                self.change_order_once(ctx, order_id, OrderState::Confirmado, None, true)
            })
            .await
            .inspect_err(|err| log_failure("order.confirm", err))?;

        Ok(self.finish("confirm", ctx, applied))
    }

    /// Move an order one stage forward, or cancel it.
    ///
    /// Moving to `listo` or `entregado` brings lagging items along; cancelling
    /// cancels every item still in progress.
    pub async fn change_order_state(
        &self,
        ctx: RequestContext,
        order_id: Uuid,
        target: OrderState,
        notes: Option<&str>,
    ) -> OrderResult<Order> {
        let applied = self
            .policy
            .run("order.change_state", ctx.deadline, || {
                self.change_order_once(ctx, order_id, target, notes, false)
            })
            .await
            .inspect_err(|err| log_failure("order.change_state", err))?;

        Ok(self.finish("change_state", ctx, applied))
    }

    /// Move one item forward (or cancel it) and reconcile the order state.
    pub async fn change_item_state(
        &self,
        ctx: RequestContext,
        order_item_id: Uuid,
        target: ItemState,
        notes: Option<&str>,
    ) -> OrderResult<Order> {
        let applied = self
            .policy
            .run("order.change_item_state", ctx.deadline, || {
                self.change_item_once(ctx, order_item_id, target, notes)
            })
            .await
            .inspect_err(|err| log_failure("order.change_item_state", err))?;

        Ok(self.finish("change_item_state", ctx, applied))
    }

    pub async fn get_order(&self, ctx: RequestContext, order_id: Uuid) -> OrderResult<Order> {
        let mut conn = self.pool.acquire().await?;
        Order::find_with_items(&mut conn, ctx.restaurant_id, order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))
    }

    /// Full order-level history, creation entry first
    pub async fn get_history(
        &self,
        ctx: RequestContext,
        order_id: Uuid,
    ) -> OrderResult<Vec<OrderTransition>> {
        let mut conn = self.pool.acquire().await?;
        ensure_order_visible(&mut conn, ctx.restaurant_id, order_id).await?;
        Ok(OrderTransition::list_by_order(&mut conn, order_id).await?)
    }

    /// Order-level history within `[from, to)`
    pub async fn get_history_range(
        &self,
        ctx: RequestContext,
        order_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> OrderResult<Vec<OrderTransition>> {
        let mut conn = self.pool.acquire().await?;
        ensure_order_visible(&mut conn, ctx.restaurant_id, order_id).await?;
        Ok(OrderTransition::list_in_range(&mut conn, order_id, from, to).await?)
    }

    pub async fn get_item_history(
        &self,
        ctx: RequestContext,
        order_item_id: Uuid,
    ) -> OrderResult<Vec<OrderItemTransition>> {
        let mut conn = self.pool.acquire().await?;
        if OrderItem::find(&mut conn, ctx.restaurant_id, order_item_id)
            .await?
            .is_none()
        {
            return Err(OrderError::ItemNotFound(order_item_id));
        }
        Ok(OrderItemTransition::list_by_item(&mut conn, order_item_id).await?)
    }

    /// Soft-delete a finished order; history is kept.
    pub async fn delete_order(&self, ctx: RequestContext, order_id: Uuid) -> OrderResult<()> {
        self.policy
            .run("order.delete", ctx.deadline, || self.delete_once(ctx, order_id))
            .await
            .inspect_err(|err| log_failure("order.delete", err))?;

        debug!(restaurant_id = %ctx.restaurant_id, order_id = %order_id, "Order deleted");
        Ok(())
    }

    async fn create_once(&self, ctx: RequestContext, new_order: &NewOrder) -> OrderResult<Applied> {
        let mut scope = TransactionScope::begin(&self.pool, "order.create").await?;

        if let Some(table_id) = new_order.table_id {
            let table = self
                .tables
                .find_table(scope.connection(), ctx.restaurant_id, table_id)
                .await?;
            if !table.is_some_and(|table| table.active) {
                return Err(OrderError::TableNotFound(table_id));
            }
        }

        let snapshots = self
            .snapshot_menu(scope.connection(), ctx.restaurant_id, new_order)
            .await?;

        let initial = if self.auto_confirm {
            OrderState::Confirmado
        } else {
            OrderState::default()
        };
        let by = Attribution::new(ctx.actor, None);

        let mut order = Order::insert(scope.connection(), ctx.restaurant_id, new_order, initial).await?;

        for (position, line) in new_order.items.iter().enumerate() {
            let snapshot = snapshots
                .get(&line.menu_item_id)
                .ok_or_else(|| unavailable(line.menu_item_id, "not on the menu"))?;
            let item = OrderItem::insert(
                scope.connection(),
                order.order_id,
                position as i32,
                line,
                snapshot,
            )
            .await?;
            persistence::record_item_created(scope.connection(), item.order_item_id, by).await?;
            order.items.push(item);
        }

        persistence::record_order_created(scope.connection(), order.order_id, initial, by).await?;
        scope.commit().await?;

        let events = vec![actions::order_created(&order)];
        Ok(Applied {
            order,
            from: None,
            events,
        })
    }

    /// Every distinct menu item must exist and be available
    async fn snapshot_menu(
        &self,
        conn: &mut PgConnection,
        restaurant_id: Uuid,
        new_order: &NewOrder,
    ) -> OrderResult<HashMap<Uuid, MenuItemSnapshot>> {
        let mut ids: Vec<Uuid> = new_order.items.iter().map(|line| line.menu_item_id).collect();
        ids.sort_unstable();
        ids.dedup();

        let snapshots: HashMap<Uuid, MenuItemSnapshot> = self
            .catalog
            .lookup_items(conn, restaurant_id, &ids)
            .await?
            .into_iter()
            .map(|snapshot| (snapshot.menu_item_id, snapshot))
            .collect();

        for line in &new_order.items {
            match snapshots.get(&line.menu_item_id) {
                None => return Err(unavailable(line.menu_item_id, "not on the menu")),
                Some(snapshot) if !snapshot.available => {
                    return Err(unavailable(line.menu_item_id, "currently unavailable"))
                }
                Some(_) => {}
            }
        }

        Ok(snapshots)
    }

    async fn change_order_once(
        &self,
        ctx: RequestContext,
        order_id: Uuid,
        target: OrderState,
        notes: Option<&str>,
        confirmation: bool,
    ) -> OrderResult<Applied> {
        let mut scope = TransactionScope::begin(&self.pool, "order.change_state").await?;
        let order = lock_order(scope.connection(), ctx.restaurant_id, order_id).await?;
        let current = parse_order_state(&order)?;

        if confirmation {
            check_confirmation(order_id, current)?;
        } else {
            check_order_transition(order_id, current, target)?;
        }

        let by = Attribution::new(ctx.actor, notes);
        let items = OrderItem::list_by_order(scope.connection(), order_id).await?;
        let mut events = Vec::new();

        let cascade = match target {
            OrderState::Cancelado => Some((ItemState::Cancelado, "order cancelled")),
            OrderState::Listo => Some((ItemState::Listo, "order marked listo")),
            OrderState::Entregado => Some((ItemState::Entregado, "order marked entregado")),
            _ => None,
        };

        let mut cascaded = Vec::new();
        if let Some((item_target, reason)) = cascade {
            for item in &items {
                let item_state = parse_item_state(item)?;
                if !item_needs_cascade(item_state, item_target) {
                    continue;
                }
                persistence::transition_item(
                    scope.connection(),
                    item.order_item_id,
                    item_state,
                    item_target,
                    Attribution::new(ctx.actor, None).with_notes(reason),
                )
                .await?;
                cascaded.push((item.order_item_id, item_state, item_target));
            }
        }

        persistence::transition_order(scope.connection(), order_id, current, target, by).await?;

        let order = reload(scope.connection(), ctx.restaurant_id, order_id).await?;
        scope.commit().await?;

        for (order_item_id, from, to) in cascaded {
            if let Some(item) = order.items.iter().find(|item| item.order_item_id == order_item_id) {
                events.push(actions::item_state_changed(&order, item, from, to, ctx.actor));
            }
        }
        events.push(actions::order_state_changed(&order, current, target, ctx.actor));

        Ok(Applied {
            order,
            from: Some(current),
            events,
        })
    }

    async fn change_item_once(
        &self,
        ctx: RequestContext,
        order_item_id: Uuid,
        target: ItemState,
        notes: Option<&str>,
    ) -> OrderResult<Applied> {
        let mut scope = TransactionScope::begin(&self.pool, "order.change_item_state").await?;

        let order_id = OrderItem::find(scope.connection(), ctx.restaurant_id, order_item_id)
            .await?
            .ok_or(OrderError::ItemNotFound(order_item_id))?
            .order_id;

        // Item state is re-read under the order lock
        let order = lock_order(scope.connection(), ctx.restaurant_id, order_id).await?;
        let order_state = parse_order_state(&order)?;
        let mut items = OrderItem::list_by_order(scope.connection(), order_id).await?;

        let item = items
            .iter_mut()
            .find(|item| item.order_item_id == order_item_id)
            .ok_or(OrderError::ItemNotFound(order_item_id))?;
        let current = parse_item_state(item)?;

        check_item_transition(order_id, order_state, order_item_id, current, target)?;

        persistence::transition_item(
            scope.connection(),
            order_item_id,
            current,
            target,
            Attribution::new(ctx.actor, notes),
        )
        .await?;
        item.state = target.to_string();

        let item_states = items
            .iter()
            .map(parse_item_state)
            .collect::<OrderResult<Vec<_>>>()?;
        let derived = derive_order_state(order_state, &item_states);

        if derived != order_state {
            persistence::transition_order(
                scope.connection(),
                order_id,
                order_state,
                derived,
                Attribution::new(ctx.actor, None).with_notes("derived from item states"),
            )
            .await?;
        }

        let order = reload(scope.connection(), ctx.restaurant_id, order_id).await?;
        scope.commit().await?;

        let mut events = Vec::new();
        if let Some(item) = order.items.iter().find(|item| item.order_item_id == order_item_id) {
            events.push(actions::item_state_changed(&order, item, current, target, ctx.actor));
        }
        if derived != order_state {
            events.push(actions::order_state_changed(&order, order_state, derived, ctx.actor));
        }

        Ok(Applied {
            order,
            from: Some(order_state),
            events,
        })
    }

    async fn delete_once(&self, ctx: RequestContext, order_id: Uuid) -> OrderResult<()> {
        let mut scope = TransactionScope::begin(&self.pool, "order.delete").await?;
        let order = lock_order(scope.connection(), ctx.restaurant_id, order_id).await?;
        let state = parse_order_state(&order)?;

        if !state.is_terminal() {
            return Err(OrderError::OrderNotTerminal { order_id, state });
        }

        Order::soft_delete(scope.connection(), order_id).await?;
        scope.commit().await?;
        Ok(())
    }

    /// Log and publish after commit, then hand the order back
    fn finish(&self, operation: &str, ctx: RequestContext, applied: Applied) -> Order {
        let Applied {
            order,
            from,
            events,
        } = applied;

        log_order_operation(
            operation,
            order.restaurant_id,
            order.order_id,
            from.map(|state| state.as_str()),
            &order.state,
            ctx.actor,
        );
        actions::publish_all(&self.broadcaster, events);
        order
    }
}

/// Item lags behind a cascading order-level target
fn item_needs_cascade(current: ItemState, target: ItemState) -> bool {
    if current.is_terminal() {
        return false;
    }
    match (current.rank(), target.rank()) {
        (Some(current), Some(target)) => current < target,
        // Cancelling reaches every non-terminal item
        (_, None) => true,
        (None, Some(_)) => false,
    }
}

fn validate_new_order(new_order: &NewOrder) -> OrderResult<()> {
    if new_order.items.is_empty() {
        return Err(OrderError::InvalidOrder("an order needs at least one item".to_string()));
    }
    if let Some(line) = new_order.items.iter().find(|line| line.quantity <= 0) {
        return Err(OrderError::InvalidOrder(format!(
            "quantity for menu item {} must be positive, got {}",
            line.menu_item_id, line.quantity
        )));
    }
    Ok(())
}

fn unavailable(menu_item_id: Uuid, reason: &str) -> OrderError {
    OrderError::ItemUnavailable {
        menu_item_id,
        reason: reason.to_string(),
    }
}

async fn lock_order(conn: &mut PgConnection, restaurant_id: Uuid, order_id: Uuid) -> OrderResult<Order> {
    Order::find_for_update(conn, restaurant_id, order_id)
        .await?
        .ok_or(OrderError::OrderNotFound(order_id))
}

async fn reload(conn: &mut PgConnection, restaurant_id: Uuid, order_id: Uuid) -> OrderResult<Order> {
    Order::find_with_items(conn, restaurant_id, order_id)
        .await?
        .ok_or(OrderError::OrderNotFound(order_id))
}

async fn ensure_order_visible(
    conn: &mut PgConnection,
    restaurant_id: Uuid,
    order_id: Uuid,
) -> OrderResult<()> {
    if Order::exists_in_restaurant(conn, restaurant_id, order_id).await? {
        Ok(())
    } else {
        Err(OrderError::OrderNotFound(order_id))
    }
}

fn parse_order_state(order: &Order) -> OrderResult<OrderState> {
    order.order_state().map_err(OrderError::CorruptState)
}

fn parse_item_state(item: &OrderItem) -> OrderResult<ItemState> {
    item.item_state().map_err(OrderError::CorruptState)
}

fn log_failure(operation: &'static str, err: &OrderError) {
    if err.is_rejection() {
        debug!(operation = operation, reason = %err, "Order request rejected");
    } else if matches!(
        err,
        OrderError::Database(_) | OrderError::Timeout(_) | OrderError::CorruptState(_)
    ) {
        error!(operation = operation, error = %err, "Order operation failed");
    }
}
