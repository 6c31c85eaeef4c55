use serde::{Deserialize, Serialize};
use std::fmt;

/// Order-level lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// Submitted, waiting for staff confirmation
    PendienteConfirmacion,
    /// Accepted by staff
    Confirmado,
    /// At least one item is being prepared
    EnPreparacion,
    /// Every remaining item is ready to serve
    Listo,
    /// Every remaining item was delivered
    Entregado,
    /// Order was cancelled
    Cancelado,
}

impl OrderState {
    /// Forward sequence, excluding `Cancelado`
    pub const PROGRESSION: [OrderState; 5] = [
        Self::PendienteConfirmacion,
        Self::Confirmado,
        Self::EnPreparacion,
        Self::Listo,
        Self::Entregado,
    ];

    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Entregado | Self::Cancelado)
    }

    /// Position in the forward sequence; `None` for `Cancelado`
    pub fn rank(&self) -> Option<u8> {
        match self {
            Self::PendienteConfirmacion => Some(0),
            Self::Confirmado => Some(1),
            Self::EnPreparacion => Some(2),
            Self::Listo => Some(3),
            Self::Entregado => Some(4),
            Self::Cancelado => None,
        }
    }

    /// The state directly after this one in the forward sequence
    pub fn next(&self) -> Option<OrderState> {
        self.rank()
            .and_then(|rank| Self::PROGRESSION.get(rank as usize + 1).copied())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendienteConfirmacion => "pendiente_confirmacion",
            Self::Confirmado => "confirmado",
            Self::EnPreparacion => "en_preparacion",
            Self::Listo => "listo",
            Self::Entregado => "entregado",
            Self::Cancelado => "cancelado",
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pendiente_confirmacion" => Ok(Self::PendienteConfirmacion),
            "confirmado" => Ok(Self::Confirmado),
            "en_preparacion" => Ok(Self::EnPreparacion),
            "listo" => Ok(Self::Listo),
            "entregado" => Ok(Self::Entregado),
            "cancelado" => Ok(Self::Cancelado),
            _ => Err(format!("Invalid order state: {s}")),
        }
    }
}

impl Default for OrderState {
    fn default() -> Self {
        Self::PendienteConfirmacion
    }
}

/// Item-level lifecycle states, independent per line item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Pendiente,
    Preparando,
    Listo,
    Entregado,
    Cancelado,
}

impl ItemState {
    pub const PROGRESSION: [ItemState; 4] =
        [Self::Pendiente, Self::Preparando, Self::Listo, Self::Entregado];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Entregado | Self::Cancelado)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelado)
    }

    pub fn rank(&self) -> Option<u8> {
        match self {
            Self::Pendiente => Some(0),
            Self::Preparando => Some(1),
            Self::Listo => Some(2),
            Self::Entregado => Some(3),
            Self::Cancelado => None,
        }
    }

    pub fn next(&self) -> Option<ItemState> {
        self.rank()
            .and_then(|rank| Self::PROGRESSION.get(rank as usize + 1).copied())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pendiente => "pendiente",
            Self::Preparando => "preparando",
            Self::Listo => "listo",
            Self::Entregado => "entregado",
            Self::Cancelado => "cancelado",
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ItemState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pendiente" => Ok(Self::Pendiente),
            "preparando" => Ok(Self::Preparando),
            "listo" => Ok(Self::Listo),
            "entregado" => Ok(Self::Entregado),
            "cancelado" => Ok(Self::Cancelado),
            _ => Err(format!("Invalid item state: {s}")),
        }
    }
}

impl Default for ItemState {
    fn default() -> Self {
        Self::Pendiente
    }
}
