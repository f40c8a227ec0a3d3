//! Coarse process grouping by pid band.
//!
//! Static and config-free; stands in for a real partition-aware grouping.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessGroup {
    System,
    User,
    Background,
}

impl ProcessGroup {
    /// `..=100` System, `101..=1000` User, everything above Background.
    pub fn classify(pid: u32) -> Self {
        match pid {
            0..=100 => ProcessGroup::System,
            101..=1000 => ProcessGroup::User,
            _ => ProcessGroup::Background,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ProcessGroup::System => "System",
            ProcessGroup::User => "User",
            ProcessGroup::Background => "Background",
        }
    }
}

impl fmt::Display for ProcessGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_edges() {
        assert_eq!(ProcessGroup::classify(0), ProcessGroup::System);
        assert_eq!(ProcessGroup::classify(100), ProcessGroup::System);
        assert_eq!(ProcessGroup::classify(101), ProcessGroup::User);
        assert_eq!(ProcessGroup::classify(1000), ProcessGroup::User);
        assert_eq!(ProcessGroup::classify(1001), ProcessGroup::Background);
        assert_eq!(ProcessGroup::classify(u32::MAX).to_string(), "Background");
    }
}
