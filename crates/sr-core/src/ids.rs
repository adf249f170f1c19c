use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Process tank in the syrup line, ordered upstream to downstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TankId {
    ProveUp,
    IonExchange,
    Polisher,
    Evaporator,
}

impl TankId {
    /// All tanks in topological (flow) order.
    pub const ALL: [TankId; 4] = [
        TankId::ProveUp,
        TankId::IonExchange,
        TankId::Polisher,
        TankId::Evaporator,
    ];

    /// Position in the state vector.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The controlled flow leaving this tank.
    pub fn outflow(self) -> ChannelId {
        ChannelId::ALL[self.index()]
    }

    /// The controlled flow entering this tank, `None` for the Precoat-fed tank.
    pub fn inflow(self) -> Option<ChannelId> {
        self.index().checked_sub(1).map(|i| ChannelId::ALL[i])
    }

    pub fn name(self) -> &'static str {
        match self {
            TankId::ProveUp => "proveup",
            TankId::IonExchange => "ion_exchange",
            TankId::Polisher => "polisher",
            TankId::Evaporator => "evaporator",
        }
    }
}

impl fmt::Display for TankId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Controlled outflow of a tank. Each channel drains the tank of the same name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ChannelId {
    ProveUp,
    IonExchange,
    Polisher,
    Evaporator,
}

impl ChannelId {
    /// All channels in evaluation order.
    pub const ALL: [ChannelId; 4] = [
        ChannelId::ProveUp,
        ChannelId::IonExchange,
        ChannelId::Polisher,
        ChannelId::Evaporator,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Tank this channel drains.
    pub fn source(self) -> TankId {
        TankId::ALL[self.index()]
    }

    /// Tank this channel fills, `None` for the evaporator product draw.
    pub fn target(self) -> Option<TankId> {
        TankId::ALL.get(self.index() + 1).copied()
    }

    /// Short tag used in reports (matches the plant's historian tags).
    pub fn tag(self) -> &'static str {
        match self {
            ChannelId::ProveUp => "PU",
            ChannelId::IonExchange => "IX",
            ChannelId::Polisher => "PIX",
            ChannelId::Evaporator => "EVAP",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
