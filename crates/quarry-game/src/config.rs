//! Game rules configuration.
//!
//! Every tunable has a default matching the classic game. `GameRules::from_env`
//! overrides them from `QUARRY_*` environment variables.

use chrono::TimeDelta;
use thiserror::Error;

use crate::domain::submission::Vote;

/// Errors raised while reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was set but could not be parsed.
    #[error("{variable} must be {expected}, got `{value}`")]
    Invalid {
        /// The offending variable.
        variable: &'static str,
        /// What a valid value looks like.
        expected: &'static str,
        /// The raw value.
        value: String,
    },

    /// The values parse but cannot run a game.
    #[error("inconsistent rules: {0}")]
    Inconsistent(String),
}

/// Tunable rules of a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRules {
    /// Charactors required before a game can start.
    pub min_charactors: usize,
    /// Coin every charactor receives when the game starts.
    pub starting_coin: i64,
    /// Flat award of a generated mission.
    pub mission_award: i64,
    /// Number of potential missions (one per prey) in a batch.
    pub prey_per_batch: usize,
    /// Age after which a potential mission is stale.
    pub mission_freshness: TimeDelta,
    /// Base pay of a judge who votes yes.
    pub judge_base_pay_yes: i64,
    /// Base pay of a judge who votes no.
    pub judge_base_pay_no: i64,
    /// Attempts made by side-effect updates that hit a concurrency conflict.
    pub save_attempts: u32,
    /// Lifetime of an issued auth token.
    pub auth_token_ttl: TimeDelta,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            min_charactors: 6,
            starting_coin: 100,
            mission_award: 200,
            prey_per_batch: 2,
            mission_freshness: TimeDelta::hours(24),
            judge_base_pay_yes: 0,
            judge_base_pay_no: 25,
            save_attempts: 3,
            auth_token_ttl: TimeDelta::hours(24),
        }
    }
}

/// Hunter, prey and two judges.
const MIN_ROSTER: usize = 4;

impl GameRules {
    /// Reads rules from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is malformed or the resulting
    /// rules are inconsistent.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads rules through `lookup`, falling back to defaults for unset
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is malformed or the resulting
    /// rules are inconsistent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let rules = Self {
            min_charactors: parse_or(&lookup, "QUARRY_MIN_CHARACTORS", defaults.min_charactors)?,
            starting_coin: parse_or(&lookup, "QUARRY_STARTING_COIN", defaults.starting_coin)?,
            mission_award: parse_or(&lookup, "QUARRY_MISSION_AWARD", defaults.mission_award)?,
            prey_per_batch: parse_or(&lookup, "QUARRY_PREY_PER_BATCH", defaults.prey_per_batch)?,
            mission_freshness: hours_or(
                &lookup,
                "QUARRY_MISSION_FRESHNESS_HOURS",
                defaults.mission_freshness,
            )?,
            judge_base_pay_yes: parse_or(
                &lookup,
                "QUARRY_JUDGE_BASE_PAY_YES",
                defaults.judge_base_pay_yes,
            )?,
            judge_base_pay_no: parse_or(
                &lookup,
                "QUARRY_JUDGE_BASE_PAY_NO",
                defaults.judge_base_pay_no,
            )?,
            save_attempts: parse_or(&lookup, "QUARRY_SAVE_ATTEMPTS", defaults.save_attempts)?,
            auth_token_ttl: hours_or(
                &lookup,
                "QUARRY_AUTH_TOKEN_TTL_HOURS",
                defaults.auth_token_ttl,
            )?,
        };
        rules.validate()?;
        Ok(rules)
    }

    /// Checks that the rules can run a game.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Inconsistent` describing the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_charactors < MIN_ROSTER {
            return Err(ConfigError::Inconsistent(format!(
                "min_charactors must be at least {MIN_ROSTER}, got {}",
                self.min_charactors
            )));
        }
        if self.prey_per_batch == 0 {
            return Err(ConfigError::Inconsistent("prey_per_batch must be positive".into()));
        }
        if self.starting_coin < 0
            || self.mission_award < 0
            || self.judge_base_pay_yes < 0
            || self.judge_base_pay_no < 0
        {
            return Err(ConfigError::Inconsistent("coin amounts must not be negative".into()));
        }
        if self.save_attempts == 0 {
            return Err(ConfigError::Inconsistent("save_attempts must be positive".into()));
        }
        Ok(())
    }

    /// Base pay of a judge who cast `vote`.
    #[must_use]
    pub fn judge_base_pay(&self, vote: Vote) -> i64 {
        match vote {
            Vote::Yes => self.judge_base_pay_yes,
            Vote::No => self.judge_base_pay_no,
        }
    }
}

fn parse_or<F, T>(lookup: &F, variable: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(variable) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            variable,
            expected: "a number",
            value,
        }),
    }
}

fn hours_or<F>(
    lookup: &F,
    variable: &'static str,
    default: TimeDelta,
) -> Result<TimeDelta, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(variable) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|hours| *hours > 0)
            .and_then(TimeDelta::try_hours)
            .ok_or(ConfigError::Invalid {
                variable,
                expected: "a positive number of hours",
                value,
            }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_unset_variables_fall_back_to_defaults() {
        let rules = GameRules::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(rules, GameRules::default());
        assert_eq!(rules.min_charactors, 6);
        assert_eq!(rules.judge_base_pay(Vote::No), 25);
    }

    #[test]
    fn test_variables_override_defaults() {
        let rules = GameRules::from_lookup(lookup_from(&[
            ("QUARRY_MIN_CHARACTORS", "8"),
            ("QUARRY_MISSION_FRESHNESS_HOURS", "12"),
        ]))
        .unwrap();

        assert_eq!(rules.min_charactors, 8);
        assert_eq!(rules.mission_freshness, TimeDelta::hours(12));
        assert_eq!(rules.starting_coin, 100);
    }

    #[test]
    fn test_malformed_variable_is_rejected() {
        let result = GameRules::from_lookup(lookup_from(&[("QUARRY_STARTING_COIN", "lots")]));

        assert_eq!(
            result,
            Err(ConfigError::Invalid {
                variable: "QUARRY_STARTING_COIN",
                expected: "a number",
                value: "lots".to_owned(),
            })
        );
    }

    #[test]
    fn test_roster_too_small_for_judging_is_rejected() {
        let result = GameRules::from_lookup(lookup_from(&[("QUARRY_MIN_CHARACTORS", "3")]));

        assert!(matches!(result, Err(ConfigError::Inconsistent(_))));
    }

    #[test]
    fn test_non_positive_freshness_is_rejected() {
        let result =
            GameRules::from_lookup(lookup_from(&[("QUARRY_MISSION_FRESHNESS_HOURS", "0")]));

        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_out_of_range_hours_are_rejected() {
        let result = GameRules::from_lookup(lookup_from(&[(
            "QUARRY_MISSION_FRESHNESS_HOURS",
            "9223372036854775807",
        )]));

        assert_eq!(
            result,
            Err(ConfigError::Invalid {
                variable: "QUARRY_MISSION_FRESHNESS_HOURS",
                expected: "a positive number of hours",
                value: "9223372036854775807".to_owned(),
            })
        );
    }
}
