//! Recomputation strategies.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// When a fusion recomputes and propagates.
///
/// `Alive` and `Any` are the modern pair. `Weak`, `Some` and `Strong` are
/// the legacy family; their `safe` flavour only recomputes when the updating
/// source's value actually differs from the one last seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Propagate only while every source value is truthy.
    Alive,
    /// Recompute on every source change.
    Any,
    /// Recompute on every source update, empty sources included.
    Weak { safe: bool },
    /// Recompute on every source update once no source is empty.
    Some { safe: bool },
    /// Resolve getters eagerly; trace the first complete combination once.
    Strong { safe: bool },
}

impl Strategy {
    pub fn is_safe(&self) -> bool {
        matches!(
            self,
            Strategy::Weak { safe: true } | Strategy::Some { safe: true } | Strategy::Strong { safe: true }
        )
    }

    pub fn is_legacy(&self) -> bool {
        !matches!(self, Strategy::Alive | Strategy::Any)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Alive => "alive",
            Strategy::Any => "any",
            Strategy::Weak { safe: false } => "weak",
            Strategy::Weak { safe: true } => "weak_safe",
            Strategy::Some { safe: false } => "some",
            Strategy::Some { safe: true } => "some_safe",
            Strategy::Strong { safe: false } => "strong",
            Strategy::Strong { safe: true } => "strong_safe",
        }
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Ok(match name {
            "alive" => Strategy::Alive,
            "any" => Strategy::Any,
            "weak" => Strategy::Weak { safe: false },
            "weak_safe" => Strategy::Weak { safe: true },
            "some" => Strategy::Some { safe: false },
            "some_safe" => Strategy::Some { safe: true },
            "strong" => Strategy::Strong { safe: false },
            "strong_safe" => Strategy::Strong { safe: true },
            other => return Err(Error::UnknownStrategy(other.to_string())),
        })
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_back() {
        for strategy in [
            Strategy::Alive,
            Strategy::Any,
            Strategy::Weak { safe: false },
            Strategy::Weak { safe: true },
            Strategy::Some { safe: false },
            Strategy::Some { safe: true },
            Strategy::Strong { safe: false },
            Strategy::Strong { safe: true },
        ] {
            assert_eq!(strategy.name().parse::<Strategy>().unwrap(), strategy);
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert!(matches!(
            "eventually".parse::<Strategy>(),
            Err(Error::UnknownStrategy(name)) if name == "eventually"
        ));
    }

    #[test]
    fn classification() {
        assert!(!Strategy::Alive.is_legacy());
        assert!(Strategy::Some { safe: false }.is_legacy());
        assert!(Strategy::Strong { safe: true }.is_safe());
        assert!(!Strategy::Weak { safe: false }.is_safe());
    }
}
