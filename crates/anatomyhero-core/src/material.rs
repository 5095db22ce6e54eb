//! Material state store: baseline appearances and the states derived from them

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::appearance::{Appearance, AppearanceLevels};
use crate::part::{Part, PartId};

/// Per-part baseline appearance plus the fixed levels used to derive
/// hover, select and fade states.
///
/// Baselines are shared immutably; every apply/clear writes a fresh copy to
/// the part's live appearance.
#[derive(Debug, Default)]
pub struct MaterialStore {
    baselines: HashMap<PartId, Arc<Appearance>>,
    levels: AppearanceLevels,
}

impl MaterialStore {
    pub fn new(levels: AppearanceLevels) -> Self {
        Self {
            baselines: HashMap::new(),
            levels,
        }
    }

    pub fn levels(&self) -> &AppearanceLevels {
        &self.levels
    }

    /// Record the part's current appearance as its baseline. No-op if one
    /// already exists.
    pub fn capture_baseline(&mut self, part: &Part) {
        self.baselines
            .entry(part.id)
            .or_insert_with(|| Arc::new(part.appearance));
    }

    pub fn baseline(&self, id: PartId) -> Option<&Arc<Appearance>> {
        self.baselines.get(&id)
    }

    /// Hover state: baseline with the hover tint, faded when fade is on
    pub fn apply_hover(&self, part: &mut Part, fade_active: bool) {
        let Some(mut next) = self.derive(part) else {
            return;
        };
        next.emissive = self.levels.hover_emissive;
        if fade_active {
            next = next.with_opacity(self.levels.faded_opacity);
        }
        part.appearance = next;
    }

    /// Select state: baseline with the highlight tint, fully opaque
    pub fn apply_select(&self, part: &mut Part) {
        let Some(mut next) = self.derive(part) else {
            return;
        };
        next.emissive = self.levels.select_emissive;
        next.emissive_intensity = self.levels.select_emissive_intensity;
        next.opacity = 1.0;
        next.transparent = true;
        part.appearance = next;
    }

    /// Back to baseline, optionally with opacity forced
    pub fn clear_to_baseline(&self, part: &mut Part, opacity_override: Option<f32>) {
        let Some(mut next) = self.derive(part) else {
            return;
        };
        if let Some(opacity) = opacity_override {
            next = next.with_opacity(opacity);
        }
        part.appearance = next;
    }

    /// Opacity a part at rest should have for the current fade setting
    pub fn rest_opacity(&self, fade_active: bool) -> f32 {
        if fade_active {
            self.levels.faded_opacity
        } else {
            self.levels.resting_opacity
        }
    }

    fn derive(&self, part: &Part) -> Option<Appearance> {
        match self.baselines.get(&part.id) {
            Some(baseline) => Some(**baseline),
            None => {
                warn!(part = %part.id, "No baseline captured; appearance left unchanged");
                None
            }
        }
    }
}
