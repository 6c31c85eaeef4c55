//! Transition guards.
//!
//! Forward progress is strictly sequential at both granularities; `cancelado`
//! is reachable from every non-terminal state. Guards are pure: the caller
//! reads current state under the order row lock and passes it in.

use uuid::Uuid;

use super::errors::{illegal_order_transition, OrderError, OrderResult};
use super::states::{ItemState, OrderState};

/// Validate an order-level transition requested by staff.
pub fn check_order_transition(
    order_id: Uuid,
    current: OrderState,
    target: OrderState,
) -> OrderResult<()> {
    if current.is_terminal() {
        return Err(OrderError::OrderAlreadyTerminal {
            order_id,
            state: current,
        });
    }

    if target == OrderState::Cancelado || current.next() == Some(target) {
        return Ok(());
    }

    Err(illegal_order_transition(order_id, current, target))
}

/// Validate `confirm`: only legal from `pendiente_confirmacion`.
pub fn check_confirmation(order_id: Uuid, current: OrderState) -> OrderResult<()> {
    match current {
        OrderState::PendienteConfirmacion => Ok(()),
        other => Err(illegal_order_transition(order_id, other, OrderState::Confirmado)),
    }
}

/// Validate an item-level transition against the item and its parent order.
pub fn check_item_transition(
    order_id: Uuid,
    order_state: OrderState,
    item_id: Uuid,
    current: ItemState,
    target: ItemState,
) -> OrderResult<()> {
    if order_state.is_terminal() {
        return Err(OrderError::OrderAlreadyTerminal {
            order_id,
            state: order_state,
        });
    }

    let illegal = || OrderError::IllegalTransition {
        entity: "item",
        id: item_id,
        from: current.to_string(),
        to: target.to_string(),
    };

    if current.is_terminal() {
        return Err(illegal());
    }

    if target == ItemState::Cancelado {
        return Ok(());
    }

    // Kitchen work starts only once staff accepted the order
    if order_state == OrderState::PendienteConfirmacion {
        return Err(illegal());
    }

    if current.next() == Some(target) {
        Ok(())
    } else {
        Err(illegal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ORDER_STATES: [OrderState; 6] = [
        OrderState::PendienteConfirmacion,
        OrderState::Confirmado,
        OrderState::EnPreparacion,
        OrderState::Listo,
        OrderState::Entregado,
        OrderState::Cancelado,
    ];

    #[test]
    fn test_sequential_order_progress() {
        let id = Uuid::new_v4();
        assert!(check_order_transition(id, OrderState::Confirmado, OrderState::EnPreparacion).is_ok());
        assert!(check_order_transition(id, OrderState::EnPreparacion, OrderState::Listo).is_ok());
        assert!(check_order_transition(id, OrderState::Listo, OrderState::Entregado).is_ok());
    }

    #[test]
    fn test_skipping_is_rejected() {
        let id = Uuid::new_v4();
        let err = check_order_transition(id, OrderState::EnPreparacion, OrderState::Entregado)
            .unwrap_err();
        match err {
            OrderError::IllegalTransition { from, to, .. } => {
                assert_eq!(from, "en_preparacion");
                assert_eq!(to, "entregado");
            }
            other => panic!("expected IllegalTransition, got {other:?}"),
        }
    }

    #[test]
    fn test_backwards_and_self_transitions_rejected() {
        let id = Uuid::new_v4();
        assert!(check_order_transition(id, OrderState::Listo, OrderState::EnPreparacion).is_err());
        assert!(check_order_transition(id, OrderState::Confirmado, OrderState::Confirmado).is_err());
    }

    #[test]
    fn test_cancel_reachable_from_every_non_terminal_state() {
        let id = Uuid::new_v4();
        for state in ALL_ORDER_STATES.iter().filter(|s| !s.is_terminal()) {
            assert!(check_order_transition(id, *state, OrderState::Cancelado).is_ok());
        }
    }

    #[test]
    fn test_terminal_orders_reject_every_target() {
        let id = Uuid::new_v4();
        for from in [OrderState::Entregado, OrderState::Cancelado] {
            for to in ALL_ORDER_STATES {
                assert!(matches!(
                    check_order_transition(id, from, to),
                    Err(OrderError::OrderAlreadyTerminal { .. })
                ));
            }
        }
    }

    #[test]
    fn test_confirmation_only_from_pending() {
        let id = Uuid::new_v4();
        assert!(check_confirmation(id, OrderState::PendienteConfirmacion).is_ok());
        for state in &ALL_ORDER_STATES[1..] {
            assert!(matches!(
                check_confirmation(id, *state),
                Err(OrderError::IllegalTransition { .. })
            ));
        }
    }

    #[test]
    fn test_item_progress_requires_confirmed_order() {
        let (order, item) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(check_item_transition(
            order,
            OrderState::PendienteConfirmacion,
            item,
            ItemState::Pendiente,
            ItemState::Preparando
        )
        .is_err());
        assert!(check_item_transition(
            order,
            OrderState::PendienteConfirmacion,
            item,
            ItemState::Pendiente,
            ItemState::Cancelado
        )
        .is_ok());
        assert!(check_item_transition(
            order,
            OrderState::Confirmado,
            item,
            ItemState::Pendiente,
            ItemState::Preparando
        )
        .is_ok());
    }

    #[test]
    fn test_item_skipping_and_terminal_items_rejected() {
        let (order, item) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(check_item_transition(
            order,
            OrderState::EnPreparacion,
            item,
            ItemState::Pendiente,
            ItemState::Listo
        )
        .is_err());
        assert!(check_item_transition(
            order,
            OrderState::EnPreparacion,
            item,
            ItemState::Cancelado,
            ItemState::Pendiente
        )
        .is_err());
        assert!(check_item_transition(
            order,
            OrderState::EnPreparacion,
            item,
            ItemState::Entregado,
            ItemState::Cancelado
        )
        .is_err());
    }

    #[test]
    fn test_items_of_terminal_orders_are_frozen() {
        let (order, item) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(matches!(
            check_item_transition(
                order,
                OrderState::Cancelado,
                item,
                ItemState::Pendiente,
                ItemState::Preparando
            ),
            Err(OrderError::OrderAlreadyTerminal { .. })
        ));
    }
}
