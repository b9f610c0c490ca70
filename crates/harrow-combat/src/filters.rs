//! Stock Filter-stage systems.

use tracing::debug;

use crate::components::{Invulnerable, Resistance};
use crate::source::{EnvironmentKind, Source};
use crate::system::{DamageSystem, Stage, SystemContext};

// ---------------------------------------------------------------------------
// ResistanceFilter
// ---------------------------------------------------------------------------

/// Scales incoming damage by the target's [`Resistance`], unless the cause
/// bypasses resistances.
pub struct ResistanceFilter;

impl ResistanceFilter {
    /// Well-known name for ordering edges.
    pub const NAME: &'static str = "resistance";
}

impl DamageSystem for ResistanceFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn stages(&self) -> &'static [Stage] {
        &[Stage::Filter]
    }

    fn handle(&mut self, ctx: &mut SystemContext<'_>) {
        if ctx.cause_flags().bypasses_resistances {
            return;
        }
        let Some(resistance) = ctx.world().get::<Resistance>(ctx.target()).copied() else {
            return;
        };
        let factor = (1.0 - resistance.reduction).clamp(0.0, 1.0);
        ctx.set_amount(ctx.amount() * factor);
    }
}

// ---------------------------------------------------------------------------
// ArmorFilter
// ---------------------------------------------------------------------------

/// Subtracts the target's flat [`Armor`](crate::components::Armor) value.
///
/// Flat reduction does not commute with percentage scaling, so where this
/// system sits relative to the resistance and sequence filters is gameplay-
/// visible; fix it with ordering edges or registration order.
pub struct ArmorFilter;

impl ArmorFilter {
    /// Well-known name for ordering edges.
    pub const NAME: &'static str = "armor";
}

impl DamageSystem for ArmorFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn stages(&self) -> &'static [Stage] {
        &[Stage::Filter]
    }

    fn handle(&mut self, ctx: &mut SystemContext<'_>) {
        if ctx.cause_flags().bypasses_resistances {
            return;
        }
        let Some(armor) = ctx.world().get::<crate::components::Armor>(ctx.target()).copied()
        else {
            return;
        };
        // Flat armor may push the working amount negative; later filters can
        // still compose and the apply step clamps.
        ctx.set_amount(ctx.amount() - armor.flat);
    }
}

// ---------------------------------------------------------------------------
// InvulnerabilityFilter
// ---------------------------------------------------------------------------

/// Cancels damage against [`Invulnerable`] targets. Void damage pierces
/// invulnerability so entities cannot idle below the world forever.
pub struct InvulnerabilityFilter;

impl InvulnerabilityFilter {
    /// Well-known name for ordering edges.
    pub const NAME: &'static str = "invulnerability";
}

impl DamageSystem for InvulnerabilityFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn stages(&self) -> &'static [Stage] {
        &[Stage::Filter]
    }

    fn handle(&mut self, ctx: &mut SystemContext<'_>) {
        if matches!(ctx.source(), Source::Environment(EnvironmentKind::Void)) {
            return;
        }
        if ctx.world().has::<Invulnerable>(ctx.target()) {
            debug!(target = %ctx.target(), "damage cancelled: target is invulnerable");
            ctx.cancel();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
