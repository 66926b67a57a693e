//! Data-driven gamification rules
//!
//! The XP-to-level curve and the achievement catalog are configuration, not
//! code: both load from a TOML file and fall back to built-in defaults.
//!
//! ```toml
//! [curve]
//! k = 100
//!
//! [[achievements]]
//! id = "first-expense"
//! description = "Log your first expense"
//! predicate = { kind = "event_count_at_least", action = "expense_logged", count = 1 }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::db::ActionStats;
use crate::error::Result;
use crate::models::{ActionKind, GamificationState};

/// Monotonic XP-to-level curve: level = floor(sqrt(total_xp / k))
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LevelCurve {
    pub k: i64,
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self { k: 100 }
    }
}

impl LevelCurve {
    pub fn level_for(&self, total_xp: i64) -> u32 {
        if total_xp <= 0 || self.k <= 0 {
            return 0;
        }
        ((total_xp / self.k) as f64).sqrt().floor() as u32
    }
}

/// A pure predicate over the updated state and the user's event history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    TotalXpAtLeast { xp: i64 },
    LevelAtLeast { level: u32 },
    EventCountAtLeast { action: ActionKind, count: i64 },
    /// Cumulative effective XP from one action kind
    ActionXpAtLeast { action: ActionKind, xp: i64 },
}

impl Predicate {
    pub fn satisfied(
        &self,
        state: &GamificationState,
        stats: &HashMap<String, ActionStats>,
    ) -> bool {
        match self {
            Self::TotalXpAtLeast { xp } => state.total_xp >= *xp,
            Self::LevelAtLeast { level } => state.level >= *level,
            Self::EventCountAtLeast { action, count } => stats
                .get(action.as_str())
                .map(|s| s.count >= *count)
                .unwrap_or(false),
            Self::ActionXpAtLeast { action, xp } => stats
                .get(action.as_str())
                .map(|s| s.xp_sum >= *xp)
                .unwrap_or(false),
        }
    }
}

/// A static catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub description: String,
    pub predicate: Predicate,
}

/// The full rules table: curve + achievement catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rules {
    #[serde(default)]
    pub curve: LevelCurve,
    #[serde(default)]
    pub achievements: Vec<Achievement>,
}

impl Default for Rules {
    fn default() -> Self {
        fn achievement(id: &str, description: &str, predicate: Predicate) -> Achievement {
            Achievement {
                id: id.to_string(),
                description: description.to_string(),
                predicate,
            }
        }

        Self {
            curve: LevelCurve::default(),
            achievements: vec![
                achievement(
                    "first-expense",
                    "Log your first expense",
                    Predicate::EventCountAtLeast {
                        action: ActionKind::ExpenseLogged,
                        count: 1,
                    },
                ),
                achievement(
                    "bookkeeper",
                    "Log 50 expenses",
                    Predicate::EventCountAtLeast {
                        action: ActionKind::ExpenseLogged,
                        count: 50,
                    },
                ),
                achievement(
                    "goal-getter",
                    "Reach your first savings goal",
                    Predicate::EventCountAtLeast {
                        action: ActionKind::GoalReached,
                        count: 1,
                    },
                ),
                achievement(
                    "monthly-saver",
                    "Bank 100 XP from reached savings goals",
                    Predicate::ActionXpAtLeast {
                        action: ActionKind::GoalReached,
                        xp: 100,
                    },
                ),
                achievement(
                    "century-club",
                    "Earn 100 XP",
                    Predicate::TotalXpAtLeast { xp: 100 },
                ),
                achievement(
                    "xp-collector",
                    "Earn 1000 XP",
                    Predicate::TotalXpAtLeast { xp: 1000 },
                ),
                achievement(
                    "level-five",
                    "Reach level 5",
                    Predicate::LevelAtLeast { level: 5 },
                ),
                achievement(
                    "week-streak",
                    "Keep a streak going seven times",
                    Predicate::EventCountAtLeast {
                        action: ActionKind::StreakKept,
                        count: 7,
                    },
                ),
            ],
        }
    }
}

impl Rules {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load rules from a TOML file, or the built-in defaults when no path is
    /// given or the file doesn't exist
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) if p.exists() => {
                let content = std::fs::read_to_string(p)?;
                Self::from_toml_str(&content)
            }
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_is_monotonic() {
        let curve = LevelCurve::default();
        let mut last = 0;
        for xp in (0..50_000).step_by(37) {
            let level = curve.level_for(xp);
            assert!(level >= last, "level dropped at xp={}", xp);
            last = level;
        }
    }

    #[test]
    fn test_curve_reference_points() {
        let curve = LevelCurve { k: 100 };
        assert_eq!(curve.level_for(0), 0);
        assert_eq!(curve.level_for(99), 0);
        assert_eq!(curve.level_for(100), 1);
        assert_eq!(curve.level_for(400), 2);
        assert_eq!(curve.level_for(2500), 5);
        assert_eq!(curve.level_for(-50), 0);
    }

    #[test]
    fn test_default_catalog_has_unique_ids() {
        let rules = Rules::default();
        let mut ids: Vec<_> = rules.achievements.iter().map(|a| a.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), rules.achievements.len());
    }

    #[test]
    fn test_rules_from_toml() {
        let rules = Rules::from_toml_str(
            r#"
            [curve]
            k = 50

            [[achievements]]
            id = "starter"
            description = "Get going"
            predicate = { kind = "total_xp_at_least", xp = 10 }

            [[achievements]]
            id = "logger"
            description = "Log an expense"
            predicate = { kind = "event_count_at_least", action = "expense_logged", count = 1 }
            "#,
        )
        .unwrap();

        assert_eq!(rules.curve.k, 50);
        assert_eq!(rules.achievements.len(), 2);
        assert_eq!(
            rules.achievements[1].predicate,
            Predicate::EventCountAtLeast {
                action: ActionKind::ExpenseLogged,
                count: 1
            }
        );
    }

    #[test]
    fn test_predicate_event_count() {
        let mut stats = HashMap::new();
        stats.insert(
            "expense_logged".to_string(),
            ActionStats { count: 3, xp_sum: 30 },
        );
        let state = GamificationState::new("u1");

        let yes = Predicate::EventCountAtLeast {
            action: ActionKind::ExpenseLogged,
            count: 3,
        };
        let no = Predicate::EventCountAtLeast {
            action: ActionKind::GoalReached,
            count: 1,
        };
        assert!(yes.satisfied(&state, &stats));
        assert!(!no.satisfied(&state, &stats));
    }
}
