use serde::{Deserialize, Serialize};

/// What a level asks of the configuration when a directive is synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelAction {
    Enable,
    Disable,
    Ignore,
}

/// One entry of the level vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelDefinition {
    pub name: String,
    pub action: LevelAction,
    /// Whether a violation of this level is a hard failure rather than advice.
    #[serde(default)]
    pub mandatory: bool,
}

impl LevelDefinition {
    #[must_use]
    pub fn new(name: &str, action: LevelAction, mandatory: bool) -> Self {
        Self {
            name: name.to_owned(),
            action,
            mandatory,
        }
    }
}

/// Precedence among support levels, highest first.
///
/// The vocabulary is configuration. Lookups are ASCII case-insensitive and
/// unknown levels rank below every known one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelPolicy {
    levels: Vec<LevelDefinition>,
}

impl Default for LevelPolicy {
    fn default() -> Self {
        Self::new(vec![
            LevelDefinition::new("must", LevelAction::Enable, true),
            LevelDefinition::new("must not", LevelAction::Disable, true),
            LevelDefinition::new("recommended", LevelAction::Enable, false),
            LevelDefinition::new("not recommended", LevelAction::Disable, false),
            LevelDefinition::new("may", LevelAction::Ignore, false),
            LevelDefinition::new("optional", LevelAction::Ignore, false),
        ])
    }
}

impl LevelPolicy {
    #[must_use]
    pub fn new(levels: Vec<LevelDefinition>) -> Self {
        Self { levels }
    }

    #[must_use]
    pub fn definition(&self, level: &str) -> Option<&LevelDefinition> {
        let level = level.trim();
        self.levels
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(level))
    }

    /// Rank of `level`; lower is stronger. Unknown levels share the weakest rank.
    #[must_use]
    pub fn rank(&self, level: &str) -> usize {
        let level = level.trim();
        self.levels
            .iter()
            .position(|d| d.name.eq_ignore_ascii_case(level))
            .unwrap_or(self.levels.len())
    }

    #[must_use]
    pub fn is_known(&self, level: &str) -> bool {
        self.definition(level).is_some()
    }

    /// The synthesis action for `level`; unknown levels are ignored.
    #[must_use]
    pub fn action(&self, level: &str) -> LevelAction {
        self.definition(level).map_or(LevelAction::Ignore, |d| d.action)
    }

    #[must_use]
    pub fn is_mandatory(&self, level: &str) -> bool {
        self.definition(level).is_some_and(|d| d.mandatory)
    }

    /// Choose which of `candidates` takes precedence, returning its index.
    ///
    /// The strongest level wins. Ties go to levels injected by conditions over the
    /// rule's nominal level, and among injected levels to the most recently
    /// triggered one. The nominal level sits at index 0 when
    /// `own_level_at_front`, otherwise at the end. An empty slice yields 0.
    #[must_use]
    pub fn resolve(&self, candidates: &[String], own_level_at_front: bool) -> usize {
        let own = if own_level_at_front {
            0
        } else {
            candidates.len().saturating_sub(1)
        };
        let mut best: Option<(usize, usize)> = None;
        for (index, level) in candidates.iter().enumerate() {
            let rank = self.rank(level);
            best = match best {
                None => Some((index, rank)),
                Some((_, best_rank)) if rank < best_rank => Some((index, rank)),
                Some((best_index, best_rank)) if rank == best_rank => {
                    if best_index == own || index != own {
                        Some((index, rank))
                    } else {
                        Some((best_index, best_rank))
                    }
                }
                keep => keep,
            };
        }
        best.map_or(0, |(index, _)| index)
    }

    /// Prepend `own` to the `injected` levels and resolve, returning the winner.
    #[must_use]
    pub fn resolve_with_own(&self, own: &str, injected: &[String]) -> String {
        let mut candidates = Vec::with_capacity(injected.len() + 1);
        candidates.push(own.to_owned());
        candidates.extend(injected.iter().cloned());
        let index = self.resolve(&candidates, true);
        candidates.swap_remove(index)
    }

    pub fn levels(&self) -> impl Iterator<Item = &LevelDefinition> {
        self.levels.iter()
    }
}
