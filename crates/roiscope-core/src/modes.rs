//! Interaction modes and the handlers that live while a mode is active.
//!
//! [`resolve_modes`] is a pure function from a requested mode list to the
//! effective mode set; [`ModeState::set_modes`] then creates and disposes
//! handlers to match.

use crate::geometry::ShapeKind;
use crate::regions::ShapeId;
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Interaction modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum Mode {
    /// No interaction.
    #[default]
    Default,
    Select,
    Translate,
    Modify,
    Draw,
}

/// Compute the effective mode set for a request.
///
/// DEFAULT overrides everything, DRAW excludes the selection modes, and
/// TRANSLATE or MODIFY pull in SELECT. An empty request means DEFAULT.
pub fn resolve_modes(requested: &[Mode]) -> BTreeSet<Mode> {
    if requested.is_empty() || requested.contains(&Mode::Default) {
        return BTreeSet::from([Mode::Default]);
    }
    if requested.contains(&Mode::Draw) {
        return BTreeSet::from([Mode::Draw]);
    }
    let mut modes: BTreeSet<Mode> = requested.iter().copied().collect();
    if modes.contains(&Mode::Translate) || modes.contains(&Mode::Modify) {
        modes.insert(Mode::Select);
    }
    modes
}

/// Rubber-band selection in progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxSelect {
    pub start: Point,
    pub current: Point,
}

impl BoxSelect {
    /// The selection rectangle.
    pub fn rect(&self) -> Rect {
        Rect::from_points(self.start, self.current)
    }
}

/// Click and box selection.
#[derive(Debug, Clone, Default)]
pub struct SelectHandler {
    /// Auxiliary box-select interaction, alive only while dragging a box.
    pub box_select: Option<BoxSelect>,
}

/// A translate drag in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct DragState {
    pub hist_id: u64,
    pub last: Point,
    pub shapes: Vec<ShapeId>,
}

/// Moves selected shapes.
#[derive(Debug, Clone, Default)]
pub struct TranslateHandler {
    pub drag: Option<DragState>,
}

/// Edits the geometry of a single selected shape.
#[derive(Debug, Clone, Default)]
pub struct ModifyHandler {
    /// Shape whose vertices are being edited.
    pub editing: Option<ShapeId>,
}

/// Draws new shapes.
#[derive(Debug, Clone, Default)]
pub struct DrawHandler {
    /// Kind of shape to draw.
    pub kind: Option<ShapeKind>,
    /// ROI id shared by the shapes of this drawing session.
    pub roi_id: Option<i64>,
    /// Modes that were active before drawing started.
    pub prior_modes: BTreeSet<Mode>,
}

/// What a mode change did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeTransition {
    pub created: Vec<Mode>,
    pub disposed: Vec<Mode>,
    /// The selection must be cleared (SELECT went away).
    pub clear_selection: bool,
    pub modes: BTreeSet<Mode>,
}

impl ModeTransition {
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.disposed.is_empty()
    }
}

/// Active modes plus their live handlers.
#[derive(Debug, Clone)]
pub struct ModeState {
    modes: BTreeSet<Mode>,
    select: Option<SelectHandler>,
    translate: Option<TranslateHandler>,
    modify: Option<ModifyHandler>,
    draw: Option<DrawHandler>,
}

impl Default for ModeState {
    fn default() -> Self {
        Self {
            modes: BTreeSet::from([Mode::Default]),
            select: None,
            translate: None,
            modify: None,
            draw: None,
        }
    }
}

impl ModeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The active modes.
    pub fn modes(&self) -> &BTreeSet<Mode> {
        &self.modes
    }

    pub fn is_active(&self, mode: Mode) -> bool {
        self.modes.contains(&mode)
    }

    /// Switch to the requested modes, creating and disposing handlers.
    ///
    /// Requesting the current mode set again changes nothing.
    pub fn set_modes(&mut self, requested: &[Mode]) -> ModeTransition {
        let next = resolve_modes(requested);
        let mut transition = ModeTransition {
            modes: next.clone(),
            ..Default::default()
        };
        if next == self.modes {
            return transition;
        }

        let prior = self.modes.clone();
        let wants = |mode: Mode| next.contains(&mode);

        // Tear down in dependency order: modify and translate before select.
        if !wants(Mode::Modify) && self.modify.take().is_some() {
            transition.disposed.push(Mode::Modify);
        }
        if !wants(Mode::Translate) && self.translate.take().is_some() {
            transition.disposed.push(Mode::Translate);
        }
        if !wants(Mode::Select) && self.select.take().is_some() {
            transition.disposed.push(Mode::Select);
            transition.clear_selection = true;
        }
        if !wants(Mode::Draw) && self.draw.take().is_some() {
            transition.disposed.push(Mode::Draw);
        }

        if wants(Mode::Select) && self.select.is_none() {
            self.select = Some(SelectHandler::default());
            transition.created.push(Mode::Select);
        }
        if wants(Mode::Translate) && self.translate.is_none() {
            self.translate = Some(TranslateHandler::default());
            transition.created.push(Mode::Translate);
        }
        if wants(Mode::Modify) && self.modify.is_none() {
            self.modify = Some(ModifyHandler::default());
            transition.created.push(Mode::Modify);
        }
        if wants(Mode::Draw) && self.draw.is_none() {
            self.draw = Some(DrawHandler {
                prior_modes: prior.clone(),
                ..Default::default()
            });
            transition.created.push(Mode::Draw);
        }

        log::debug!("Modes {:?} -> {:?}", prior, next);
        self.modes = next;
        transition
    }

    pub fn select_handler(&self) -> Option<&SelectHandler> {
        self.select.as_ref()
    }

    pub fn select_handler_mut(&mut self) -> Option<&mut SelectHandler> {
        self.select.as_mut()
    }

    pub fn translate_handler(&self) -> Option<&TranslateHandler> {
        self.translate.as_ref()
    }

    pub fn translate_handler_mut(&mut self) -> Option<&mut TranslateHandler> {
        self.translate.as_mut()
    }

    pub fn modify_handler_mut(&mut self) -> Option<&mut ModifyHandler> {
        self.modify.as_mut()
    }

    pub fn draw_handler(&self) -> Option<&DrawHandler> {
        self.draw.as_ref()
    }

    pub fn draw_handler_mut(&mut self) -> Option<&mut DrawHandler> {
        self.draw.as_mut()
    }
}
