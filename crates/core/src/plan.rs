//! Subscription plans: credit grants, per-kind costs, and concurrency
//! entitlements.
//!
//! Plans are read-only reference data. The defaults below can be replaced
//! wholesale from a JSON file (see [`parse_plans`]).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::generation::GenerationKind;
use crate::types::Gold;

/// Named subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanTier {
    Free,
    Pro,
    Enterprise,
}

impl PlanTier {
    pub const ALL: [PlanTier; 3] = [PlanTier::Free, PlanTier::Pro, PlanTier::Enterprise];

    pub fn as_str(self) -> &'static str {
        match self {
            PlanTier::Free => "FREE",
            PlanTier::Pro => "PRO",
            PlanTier::Enterprise => "ENTERPRISE",
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown plan tier '{s}'")))
    }
}

/// A subscription plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub tier: PlanTier,
    /// Gold credited to a new account on this plan.
    pub credit_grant: Gold,
    /// Price of one job of each kind.
    pub costs: BTreeMap<GenerationKind, Gold>,
    /// Maximum number of QUEUED + RUNNING jobs per account.
    pub max_concurrent_jobs: i32,
    /// Dispatch priority; higher runs first.
    pub priority: i32,
}

impl Plan {
    pub fn cost(&self, kind: GenerationKind) -> Option<Gold> {
        self.costs.get(&kind).copied()
    }

    /// Check internal consistency: every kind priced, positive costs,
    /// non-negative grant, at least one concurrent job.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.credit_grant < 0 {
            return Err(CoreError::Validation(format!(
                "{}: credit_grant must not be negative",
                self.tier
            )));
        }
        if self.max_concurrent_jobs < 1 {
            return Err(CoreError::Validation(format!(
                "{}: max_concurrent_jobs must be at least 1",
                self.tier
            )));
        }
        for kind in GenerationKind::ALL {
            match self.cost(kind) {
                Some(c) if c > 0 => {}
                Some(_) => {
                    return Err(CoreError::Validation(format!(
                        "{}: cost for {kind} must be positive",
                        self.tier
                    )))
                }
                None => {
                    return Err(CoreError::Validation(format!(
                        "{}: missing cost for {kind}",
                        self.tier
                    )))
                }
            }
        }
        Ok(())
    }
}

fn cost_table(text: Gold, image: Gold, video: Gold, auto_content: Gold) -> BTreeMap<GenerationKind, Gold> {
    BTreeMap::from([
        (GenerationKind::Text, text),
        (GenerationKind::Image, image),
        (GenerationKind::Video, video),
        (GenerationKind::AutoContent, auto_content),
    ])
}

/// Built-in plan catalogue.
pub fn default_plans() -> Vec<Plan> {
    vec![
        Plan {
            tier: PlanTier::Free,
            credit_grant: 50,
            costs: cost_table(10, 20, 50, 15),
            max_concurrent_jobs: 1,
            priority: 0,
        },
        Plan {
            tier: PlanTier::Pro,
            credit_grant: 500,
            costs: cost_table(10, 20, 50, 15),
            max_concurrent_jobs: 3,
            priority: 10,
        },
        Plan {
            tier: PlanTier::Enterprise,
            credit_grant: 5000,
            costs: cost_table(8, 16, 40, 12),
            max_concurrent_jobs: 10,
            priority: 20,
        },
    ]
}

/// Parse a plan catalogue from JSON and validate that every tier is present
/// exactly once and internally consistent.
pub fn parse_plans(json: &str) -> Result<Vec<Plan>, CoreError> {
    let plans: Vec<Plan> = serde_json::from_str(json)
        .map_err(|e| CoreError::Validation(format!("Invalid plan catalogue: {e}")))?;

    for tier in PlanTier::ALL {
        let count = plans.iter().filter(|p| p.tier == tier).count();
        if count != 1 {
            return Err(CoreError::Validation(format!(
                "Plan catalogue must define {tier} exactly once (found {count})"
            )));
        }
    }
    for plan in &plans {
        plan.validate()?;
    }
    Ok(plans)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn default_plans_are_valid_and_complete() {
        let plans = default_plans();
        assert_eq!(plans.len(), PlanTier::ALL.len());
        for plan in &plans {
            plan.validate().expect("default plan should validate");
        }
    }

    #[test]
    fn free_plan_prices_match_generator_costs() {
        let free = default_plans()
            .into_iter()
            .find(|p| p.tier == PlanTier::Free)
            .unwrap();
        assert_eq!(free.cost(GenerationKind::Text), Some(10));
        assert_eq!(free.cost(GenerationKind::Image), Some(20));
        assert_eq!(free.cost(GenerationKind::Video), Some(50));
        assert_eq!(free.cost(GenerationKind::AutoContent), Some(15));
    }

    #[test]
    fn tier_parses_upper_case_names() {
        assert_eq!("PRO".parse::<PlanTier>().unwrap(), PlanTier::Pro);
        assert!("pro".parse::<PlanTier>().is_err());
    }

    #[test]
    fn catalogue_round_trips_through_json() {
        let json = serde_json::to_string(&default_plans()).unwrap();
        let parsed = parse_plans(&json).unwrap();
        assert_eq!(parsed, default_plans());
    }

    #[test]
    fn catalogue_missing_a_tier_is_rejected() {
        let mut plans = default_plans();
        plans.retain(|p| p.tier != PlanTier::Enterprise);
        let json = serde_json::to_string(&plans).unwrap();
        assert_matches!(parse_plans(&json), Err(CoreError::Validation(msg)) if msg.contains("ENTERPRISE"));
    }

    #[test]
    fn zero_cost_is_rejected() {
        let mut plan = default_plans().remove(0);
        plan.costs.insert(GenerationKind::Video, 0);
        assert_matches!(plan.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut plan = default_plans().remove(0);
        plan.max_concurrent_jobs = 0;
        assert_matches!(plan.validate(), Err(CoreError::Validation(_)));
    }
}
