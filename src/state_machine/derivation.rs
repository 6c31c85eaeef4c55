//! Order state derived from item states.
//!
//! The least-advanced non-cancelled item determines how far the order has
//! progressed. The result never moves an order backwards and never touches a
//! terminal order.

use super::states::{ItemState, OrderState};

/// Minimum order stage implied by `items`, if any.
///
/// - every item cancelled → `cancelado`
/// - every remaining item delivered → `entregado`
/// - every remaining item at least ready → `listo`
/// - any remaining item at least preparing → `en_preparacion`
pub fn implied_by_items(items: &[ItemState]) -> Option<OrderState> {
    if items.is_empty() {
        return None;
    }

    let active: Vec<u8> = items.iter().filter_map(ItemState::rank).collect();

    let Some(least) = active.iter().min().copied() else {
        return Some(OrderState::Cancelado);
    };
    let most = active.iter().max().copied().unwrap_or(least);

    let entregado = ItemState::Entregado.rank().unwrap_or(u8::MAX);
    let listo = ItemState::Listo.rank().unwrap_or(u8::MAX);
    let preparando = ItemState::Preparando.rank().unwrap_or(u8::MAX);

    if least >= entregado {
        Some(OrderState::Entregado)
    } else if least >= listo {
        Some(OrderState::Listo)
    } else if most >= preparando {
        Some(OrderState::EnPreparacion)
    } else {
        None
    }
}

/// Reconcile `current` with its items; monotonic in `current`.
pub fn derive_order_state(current: OrderState, items: &[ItemState]) -> OrderState {
    if current.is_terminal() {
        return current;
    }

    match implied_by_items(items) {
        Some(OrderState::Cancelado) => OrderState::Cancelado,
        Some(implied) if implied.rank() > current.rank() => implied,
        _ => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use ItemState::*;

    #[test]
    fn test_first_item_in_preparation_moves_order() {
        assert_eq!(
            derive_order_state(OrderState::Confirmado, &[Preparando, Pendiente]),
            OrderState::EnPreparacion
        );
    }

    #[test]
    fn test_least_advanced_item_holds_order_back() {
        assert_eq!(
            derive_order_state(OrderState::EnPreparacion, &[Entregado, Pendiente]),
            OrderState::EnPreparacion
        );
        assert_eq!(
            derive_order_state(OrderState::EnPreparacion, &[Entregado, Listo]),
            OrderState::Listo
        );
    }

    #[test]
    fn test_cancelled_items_are_ignored() {
        assert_eq!(
            derive_order_state(OrderState::EnPreparacion, &[Entregado, Cancelado]),
            OrderState::Entregado
        );
    }

    #[test]
    fn test_all_cancelled_cancels_order() {
        assert_eq!(
            derive_order_state(OrderState::PendienteConfirmacion, &[Cancelado, Cancelado]),
            OrderState::Cancelado
        );
    }

    #[test]
    fn test_pending_items_do_not_advance_confirmed_order() {
        assert_eq!(
            derive_order_state(OrderState::Confirmado, &[Pendiente, Pendiente]),
            OrderState::Confirmado
        );
    }

    #[test]
    fn test_never_regresses() {
        assert_eq!(
            derive_order_state(OrderState::Listo, &[Preparando, Listo]),
            OrderState::Listo
        );
    }

    #[test]
    fn test_terminal_orders_untouched() {
        assert_eq!(
            derive_order_state(OrderState::Entregado, &[Cancelado]),
            OrderState::Entregado
        );
    }

    fn item_state() -> impl Strategy<Value = ItemState> {
        prop_oneof![
            Just(Pendiente),
            Just(Preparando),
            Just(Listo),
            Just(Entregado),
            Just(Cancelado),
        ]
    }

    fn live_order_state() -> impl Strategy<Value = OrderState> {
        prop_oneof![
            Just(OrderState::Confirmado),
            Just(OrderState::EnPreparacion),
            Just(OrderState::Listo),
        ]
    }

    proptest! {
        /// Property: derivation never moves a live order backwards
        #[test]
        fn derivation_is_monotonic(
            current in live_order_state(),
            items in prop::collection::vec(item_state(), 1..8),
        ) {
            let derived = derive_order_state(current, &items);
            if derived != OrderState::Cancelado {
                prop_assert!(derived.rank() >= current.rank());
            } else {
                prop_assert!(items.iter().all(|s| s.is_cancelled()));
            }
        }

        /// Property: derivation is idempotent
        #[test]
        fn derivation_is_idempotent(
            current in live_order_state(),
            items in prop::collection::vec(item_state(), 1..8),
        ) {
            let once = derive_order_state(current, &items);
            prop_assert_eq!(derive_order_state(once, &items), once);
        }

        /// Property: a delivered order has every non-cancelled item delivered
        #[test]
        fn delivered_means_all_active_items_delivered(
            current in live_order_state(),
            items in prop::collection::vec(item_state(), 1..8),
        ) {
            if derive_order_state(current, &items) == OrderState::Entregado {
                prop_assert!(items.iter().all(|s| matches!(s, Entregado | Cancelado)));
            }
        }

        /// Property: replaying item progress step by step never regresses the order
        #[test]
        fn stepwise_item_progress_never_regresses(
            targets in prop::collection::vec((0usize..4, item_state()), 1..24),
        ) {
            let mut items = vec![Pendiente; 4];
            let mut order = OrderState::Confirmado;
            for (index, target) in targets {
                let current = items[index];
                let legal = !current.is_terminal()
                    && (target == Cancelado || current.next() == Some(target));
                if !legal || order.is_terminal() {
                    continue;
                }
                items[index] = target;
                let next = derive_order_state(order, &items);
                if next != OrderState::Cancelado {
                    prop_assert!(next.rank() >= order.rank());
                }
                order = next;
            }
        }
    }
}
