//! Element masking – hide interactive chrome for the duration of a capture.
//!
//! Masked elements get `visibility: hidden`, which keeps them in layout flow
//! so the captured region does not reflow. Each element's previous inline
//! `visibility` declaration (or its absence) is saved and put back verbatim
//! on restore. The returned [`MaskToken`] restores on drop as well, so an
//! abandoned export never leaves the surface masked.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::surface::{ElementHandle, VisualSurface};

/// Inline style property used to hide elements.
pub const MASK_PROPERTY: &str = "visibility";
const MASK_VALUE: &str = "hidden";

/// Something to hide during capture: a selector resolved at mask time, or a
/// direct element handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HideTarget {
    Selector(String),
    Element(ElementHandle),
}

impl From<&str> for HideTarget {
    fn from(selector: &str) -> Self {
        HideTarget::Selector(selector.to_string())
    }
}

impl From<ElementHandle> for HideTarget {
    fn from(element: ElementHandle) -> Self {
        HideTarget::Element(element)
    }
}

/// Resolve hide targets to unique, attached handles in first-seen order.
pub fn resolve_targets(surface: &dyn VisualSurface, targets: &[HideTarget]) -> Vec<ElementHandle> {
    let mut seen = HashSet::new();
    let mut resolved = Vec::new();
    for target in targets {
        let candidates = match target {
            HideTarget::Selector(sel) => surface.query_selector_all(sel),
            HideTarget::Element(el) if surface.is_attached(*el) => vec![*el],
            HideTarget::Element(el) => {
                log::warn!("hide target {el:?} is not attached; skipping");
                Vec::new()
            }
        };
        resolved.extend(candidates.into_iter().filter(|el| seen.insert(*el)));
    }
    resolved
}

/// Saved pre-mask state of every element hidden by one [`mask`] call.
///
/// Restoring is idempotent; dropping an unrestored token restores it.
#[must_use = "dropping the token immediately restores the masked elements"]
pub struct MaskToken<'a> {
    surface: &'a dyn VisualSurface,
    saved: Vec<(ElementHandle, Option<String>)>,
    restored: bool,
}

/// Hide every element `targets` resolves to and return the restore token.
pub fn mask<'a>(surface: &'a dyn VisualSurface, targets: &[HideTarget]) -> MaskToken<'a> {
    let elements = resolve_targets(surface, targets);
    let mut saved = Vec::with_capacity(elements.len());
    for el in elements {
        let previous = surface.style_property(el, MASK_PROPERTY);
        surface.set_style_property(el, MASK_PROPERTY, Some(MASK_VALUE));
        saved.push((el, previous));
    }
    log::debug!("masked {} element(s)", saved.len());
    MaskToken {
        surface,
        saved,
        restored: false,
    }
}

impl MaskToken<'_> {
    /// Elements hidden by this token, in the order they were masked.
    pub fn elements(&self) -> impl Iterator<Item = ElementHandle> + '_ {
        self.saved.iter().map(|(el, _)| *el)
    }

    pub fn len(&self) -> usize {
        self.saved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }

    pub fn is_restored(&self) -> bool {
        self.restored
    }

    /// Put every saved declaration back. A second call does nothing.
    pub fn restore(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        for (el, previous) in self.saved.iter().rev() {
            self.surface
                .set_style_property(*el, MASK_PROPERTY, previous.as_deref());
        }
        log::debug!("restored {} masked element(s)", self.saved.len());
    }
}

impl Drop for MaskToken<'_> {
    fn drop(&mut self) {
        if !self.restored {
            log::warn!("mask token dropped before restore; restoring now");
            self.restore();
        }
    }
}

impl fmt::Debug for MaskToken<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaskToken")
            .field("saved", &self.saved)
            .field("restored", &self.restored)
            .finish()
    }
}
