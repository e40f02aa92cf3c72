//! Plan catalogue lookups for admission and the subscription endpoint.

use std::collections::HashMap;
use std::path::Path;

use goldrush_core::error::CoreError;
use goldrush_core::generation::GenerationKind;
use goldrush_core::plan::{default_plans, parse_plans, Plan, PlanTier};
use goldrush_core::types::Gold;

#[derive(Debug, Clone)]
pub struct PlanService {
    plans: HashMap<PlanTier, Plan>,
}

impl PlanService {
    /// Build from a catalogue that defines every tier.
    pub fn new(plans: Vec<Plan>) -> Result<Self, CoreError> {
        for plan in &plans {
            plan.validate()?;
        }
        let plans: HashMap<_, _> = plans.into_iter().map(|p| (p.tier, p)).collect();
        if let Some(missing) = PlanTier::ALL.into_iter().find(|t| !plans.contains_key(t)) {
            return Err(CoreError::Validation(format!("Plan {missing} is not defined")));
        }
        Ok(Self { plans })
    }

    /// Load the catalogue from `path`, or fall back to the built-in plans.
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        let Some(path) = path else {
            return Self::new(default_plans());
        };
        let json = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Internal(format!("Failed to read plans from {}: {e}", path.display()))
        })?;
        let plans = parse_plans(&json)?;
        tracing::info!(path = %path.display(), "Loaded plan catalogue");
        Self::new(plans)
    }

    pub fn plan(&self, tier: PlanTier) -> Result<&Plan, CoreError> {
        self.plans
            .get(&tier)
            .ok_or_else(|| CoreError::Internal(format!("Plan {tier} is not defined")))
    }

    pub fn cost(&self, tier: PlanTier, kind: GenerationKind) -> Result<Gold, CoreError> {
        self.plan(tier)?
            .cost(kind)
            .ok_or_else(|| CoreError::Internal(format!("Plan {tier} has no price for {kind}")))
    }
}

impl Default for PlanService {
    fn default() -> Self {
        Self {
            plans: default_plans().into_iter().map(|p| (p.tier, p)).collect(),
        }
    }
}
