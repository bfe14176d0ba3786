//! Analysis configuration
//!
//! This module provides the switches that decide which passes the [`crate::Analyzer`]
//! runs before emitting facts, and how a module is scheduled.

/// Configuration for method analysis
///
/// The stack analyzer always runs; everything else is optional. The defaults enable every
/// rewrite and phi insertion, run modules in parallel, and leave the instruction counter
/// off.
///
/// # Examples
///
/// ```rust
/// use scil::AnalysisConfig;
///
/// let config = AnalysisConfig::default()
///     .with_parallel(false)
///     .with_count_instructions(true);
/// assert!(config.insert_phis);
/// assert!(!config.parallel);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct AnalysisConfig {
    /// Rewrite macro and short forms (`ldloc.0`, `br.s`, `ldc.i4.5`) to their long forms
    pub normalize_short_forms: bool,

    /// Remove `nop` and `break` instructions that are not exception handler entries
    pub eliminate_nops: bool,

    /// Insert phi nodes at joins that carry stack values
    pub insert_phis: bool,

    /// Count analysed instructions per module through the registry's counter
    pub count_instructions: bool,

    /// Analyse the methods of a module in parallel
    pub parallel: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            normalize_short_forms: true,
            eliminate_nops: true,
            insert_phis: true,
            count_instructions: false,
            parallel: true,
        }
    }
}

impl AnalysisConfig {
    /// Creates a configuration that runs only the stack analyzer, sequentially
    ///
    /// Facts are emitted for the instructions exactly as decoded.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            normalize_short_forms: false,
            eliminate_nops: false,
            insert_phis: false,
            count_instructions: false,
            parallel: false,
        }
    }

    /// Sets [`AnalysisConfig::normalize_short_forms`].
    #[must_use]
    pub fn with_normalize_short_forms(mut self, enabled: bool) -> Self {
        self.normalize_short_forms = enabled;
        self
    }

    /// Sets [`AnalysisConfig::eliminate_nops`].
    #[must_use]
    pub fn with_eliminate_nops(mut self, enabled: bool) -> Self {
        self.eliminate_nops = enabled;
        self
    }

    /// Sets [`AnalysisConfig::insert_phis`].
    #[must_use]
    pub fn with_insert_phis(mut self, enabled: bool) -> Self {
        self.insert_phis = enabled;
        self
    }

    /// Sets [`AnalysisConfig::count_instructions`].
    #[must_use]
    pub fn with_count_instructions(mut self, enabled: bool) -> Self {
        self.count_instructions = enabled;
        self
    }

    /// Sets [`AnalysisConfig::parallel`].
    #[must_use]
    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AnalysisConfig::default();
        assert!(config.normalize_short_forms);
        assert!(config.eliminate_nops);
        assert!(config.insert_phis);
        assert!(!config.count_instructions);
        assert!(config.parallel);
    }

    #[test]
    fn minimal_disables_optional_passes() {
        let config = AnalysisConfig::minimal();
        assert!(!config.normalize_short_forms && !config.eliminate_nops && !config.insert_phis);
        assert!(config.with_insert_phis(true).insert_phis);
    }
}
