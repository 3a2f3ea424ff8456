//! Fleet orders and their lifecycle.
//!
//! An [`Admiral`] issues [`FleetOrder`]s on behalf of one fleet. Issuing an order
//! replaces the command confidence of every recipient; from then on the order
//! weakens as the recipients' confidence decays.
//!
//! ```text
//! Issued ──(confidence < min_confidence)──→ Stale
//!   │                                        │
//!   └──(newer order to the same vessels)──→ Superseded
//!   └──(match end)──────────────────────→ Expired
//! ```
//!
//! Orders carry no success or failure state; outcomes are measured per match.

use std::collections::BTreeMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{FleetSide, Roster, VesselId};

use super::pilot::VesselAction;

/// Error returned when an order cannot be issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum CommandError {
    /// The order names a target that does not exist, is destroyed, or is not an enemy.
    #[display("order target {_0} is not a live enemy vessel")]
    InvalidTarget(#[error(not(source))] VesselId),
    /// The order names a recipient that is not a live vessel of the issuing fleet.
    #[display("order recipient {_0} is not a live vessel of the issuing fleet")]
    InvalidRecipient(#[error(not(source))] VesselId),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandParams {
    /// Confidence lost per simulated second.
    pub confidence_decay_rate: f32,
    /// Confidence below which a vessel ignores orders and fights autonomously.
    pub min_confidence: f32,
    /// Ticks between two admiral decisions.
    pub command_interval_ticks: u32,
}

impl Default for CommandParams {
    fn default() -> Self {
        Self {
            confidence_decay_rate: 0.1,
            min_confidence: 0.3,
            command_interval_ticks: 30,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display,
)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderKind {
    #[display("focus-fire on {target}")]
    FocusFire { target: VesselId },
    #[display("hold")]
    Hold,
    #[display("retreat")]
    Retreat,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[display("order#{_0}")]
#[serde(transparent)]
pub struct OrderId(pub u32);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetOrder {
    pub id: OrderId,
    pub side: FleetSide,
    pub kind: OrderKind,
    pub recipients: Vec<VesselId>,
    /// Confidence at issuance.
    pub confidence: f32,
    pub issued_at_tick: u64,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::IsVariant,
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[display("issued")]
    Issued,
    #[display("stale")]
    Stale,
    #[display("superseded")]
    Superseded,
    #[display("expired")]
    Expired,
}

/// What an obeyed order means for one vessel this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Focus(VesselId),
    Hold,
    Disengage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order: FleetOrder,
    pub status: OrderStatus,
    /// Highest decayed confidence among the living vessels still holding the order.
    pub current_confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSummary {
    pub side: FleetSide,
    pub orders: Vec<OrderSnapshot>,
}

/// Issues and tracks the orders of one fleet.
#[derive(Debug, Clone)]
pub struct Admiral {
    side: FleetSide,
    params: CommandParams,
    orders: Vec<FleetOrder>,
    active: BTreeMap<VesselId, OrderId>,
    expired: bool,
}

impl Admiral {
    #[must_use]
    pub fn new(side: FleetSide, params: CommandParams) -> Self {
        Self {
            side,
            params,
            orders: vec![],
            active: BTreeMap::new(),
            expired: false,
        }
    }

    #[must_use]
    pub fn side(&self) -> FleetSide {
        self.side
    }

    /// Every order issued during the match, superseded ones included.
    #[must_use]
    pub fn orders(&self) -> &[FleetOrder] {
        &self.orders
    }

    /// Issues an order to every living vessel of the fleet.
    ///
    /// Returns `Ok(None)` when the order would be obeyed by no one: its confidence
    /// is already below `min_confidence`, or the fleet has no living vessels. The
    /// fleet then keeps fighting under whatever it was doing before.
    pub fn issue_order(
        &mut self,
        roster: &mut Roster,
        kind: OrderKind,
        confidence: f32,
        tick: u64,
    ) -> Result<Option<FleetOrder>, CommandError> {
        let recipients = roster.fleet(self.side).map(|v| v.id()).collect::<Vec<_>>();
        self.issue_order_to(roster, kind, confidence, tick, &recipients)
    }

    /// Issues an order to selected vessels of the fleet.
    pub fn issue_order_to(
        &mut self,
        roster: &mut Roster,
        kind: OrderKind,
        confidence: f32,
        tick: u64,
        recipients: &[VesselId],
    ) -> Result<Option<FleetOrder>, CommandError> {
        match kind {
            OrderKind::FocusFire { target } => {
                if !roster
                    .living(target)
                    .is_some_and(|v| v.side() == self.side.opponent())
                {
                    return Err(CommandError::InvalidTarget(target));
                }
            }
            OrderKind::Hold | OrderKind::Retreat => {}
        }
        if let Some(bad) = recipients
            .iter()
            .find(|id| !roster.living(**id).is_some_and(|v| v.side() == self.side))
        {
            return Err(CommandError::InvalidRecipient(*bad));
        }
        if self.expired || recipients.is_empty() {
            return Ok(None);
        }
        if confidence < self.params.min_confidence {
            tracing::debug!(side = %self.side, %kind, confidence, "order below minimum confidence ignored");
            return Ok(None);
        }

        let id = OrderId(u32::try_from(self.orders.len()).unwrap_or(u32::MAX));
        for recipient in recipients {
            if let Some(vessel) = roster.get_mut(*recipient) {
                vessel.apply_order_confidence(confidence);
            }
            self.active.insert(*recipient, id);
        }
        let order = FleetOrder {
            id,
            side: self.side,
            kind,
            recipients: recipients.to_vec(),
            confidence: confidence.clamp(0.0, 1.0),
            issued_at_tick: tick,
        };
        tracing::debug!(side = %self.side, %kind, confidence, tick, "order issued");
        self.orders.push(order.clone());
        Ok(Some(order))
    }

    /// Marks every order as expired; called once the match is over.
    pub fn expire_all(&mut self) {
        self.expired = true;
    }

    #[must_use]
    pub fn status(&self, order: &FleetOrder, roster: &Roster) -> (OrderStatus, f32) {
        let holders = order
            .recipients
            .iter()
            .filter(|id| self.active.get(*id) == Some(&order.id))
            .collect::<Vec<_>>();
        let confidence = holders
            .iter()
            .filter_map(|id| roster.living(**id))
            .map(|v| v.command_confidence())
            .fold(0.0_f32, f32::max);
        let status = if self.expired {
            OrderStatus::Expired
        } else if holders.is_empty() {
            OrderStatus::Superseded
        } else if confidence < self.params.min_confidence {
            OrderStatus::Stale
        } else {
            OrderStatus::Issued
        };
        (status, confidence)
    }

    /// Read-only view of the orders still held by at least one vessel.
    #[must_use]
    pub fn command_summary(&self, roster: &Roster) -> CommandSummary {
        let orders = self
            .orders
            .iter()
            .filter_map(|order| {
                let (status, current_confidence) = self.status(order, roster);
                (!status.is_superseded()).then(|| OrderSnapshot {
                    order: order.clone(),
                    status,
                    current_confidence,
                })
            })
            .collect();
        CommandSummary {
            side: self.side,
            orders,
        }
    }

    /// Directives for the vessels that still obey their order.
    #[must_use]
    pub fn directives(&self, roster: &Roster) -> BTreeMap<VesselId, Directive> {
        if self.expired {
            return BTreeMap::new();
        }
        self.active
            .iter()
            .filter_map(|(vessel, order)| {
                let vessel = roster.living(*vessel)?;
                if vessel.command_confidence() < self.params.min_confidence {
                    return None;
                }
                let order = self.orders.get(usize::try_from(order.0).ok()?)?;
                let directive = match order.kind {
                    OrderKind::FocusFire { target } => {
                        roster.living(target)?;
                        Directive::Focus(target)
                    }
                    OrderKind::Hold => Directive::Hold,
                    OrderKind::Retreat => Directive::Disengage,
                };
                Some((vessel.id(), directive))
            })
            .collect()
    }

    /// Turns the fleet's pilot intents into an order, if any intent is shared.
    ///
    /// A living enemy preferred by the most vessels becomes a focus-fire target with
    /// confidence equal to the share of the fleet preferring it. Without any target
    /// preference, a fleet that mostly idles holds and a fleet that mostly thrusts
    /// away from the enemy retreats.
    #[must_use]
    pub fn decide(
        &self,
        roster: &Roster,
        intents: &[(VesselId, VesselAction)],
    ) -> Option<(OrderKind, f32)> {
        const IDLE_THRUST: f32 = 0.1;

        let living = intents
            .iter()
            .filter(|(id, _)| roster.living(*id).is_some_and(|v| v.side() == self.side))
            .collect::<Vec<_>>();
        if living.is_empty() {
            return None;
        }
        #[expect(clippy::cast_precision_loss)]
        let fleet_size = living.len() as f32;

        let mut tally = BTreeMap::<VesselId, usize>::new();
        for (_, action) in &living {
            if let Some(target) = action.target_preference {
                if roster
                    .living(target)
                    .is_some_and(|v| v.side() == self.side.opponent())
                {
                    *tally.entry(target).or_default() += 1;
                }
            }
        }
        // BTreeMap iteration is ascending, so on equal counts the lower id wins
        let best = tally
            .iter()
            .fold(None, |best: Option<(VesselId, usize)>, (target, count)| match best {
                Some((_, best_count)) if best_count >= *count => best,
                _ => Some((*target, *count)),
            });
        if let Some((target, count)) = best {
            #[expect(clippy::cast_precision_loss)]
            let share = count as f32 / fleet_size;
            return Some((OrderKind::FocusFire { target }, share));
        }

        let own = roster.centroid(self.side)?;
        let enemy = roster.centroid(self.side.opponent())?;
        let toward = (enemy - own).normalize_or_zero();
        let (idle, fleeing) = living.iter().fold((0_u16, 0_u16), |(idle, fleeing), (_, a)| {
            if a.thrust.length() < IDLE_THRUST {
                (idle + 1, fleeing)
            } else if a.thrust.dot(toward) < 0.0 {
                (idle, fleeing + 1)
            } else {
                (idle, fleeing)
            }
        });
        let share = |n: u16| f32::from(n) / fleet_size;
        if idle == 0 && fleeing == 0 {
            None
        } else if idle >= fleeing {
            Some((OrderKind::Hold, share(idle)))
        } else {
            Some((OrderKind::Retreat, share(fleeing)))
        }
    }
}

/// Thrust that brings a holding vessel to a stop.
#[must_use]
pub fn braking_thrust(velocity: Vec2, max_thrust: f32) -> Vec2 {
    (-velocity).clamp_length_max(max_thrust)
}
