//! Confirmation of the host's modal equation editor.
//!
//! Depending on version and settings, the host either renders the selection
//! as an equation in place or opens a small modal with the expression in an
//! editable field and a confirm control. The modal has no stable identifier,
//! so it is recognized structurally and confirmed heuristically.

use smol_str::SmolStr;

use crate::config::HostContract;
use crate::keys::KeyChord;
use crate::platform::{DocumentTree, EditSurface};

/// Which heuristic closed the modal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmStrategy {
    /// A control whose label matched a known confirm label.
    Label(SmolStr),
    /// A control carrying the confirm icon.
    Icon,
    /// The last control in the modal.
    LastControl,
    /// Enter pressed on the modal's input.
    EnterKey,
}

/// The open equation modal, if any: the dialog container around the first
/// editable leaf that sits inside a dialog.
pub fn find_dialog<T: DocumentTree>(tree: &T, contract: &HostContract) -> Option<T::Node> {
    tree.query_all(&contract.dialog_editor)
        .into_iter()
        .find_map(|editor| tree.closest(&editor, &contract.dialog))
}

/// Try each strategy in priority order until one acts on the modal.
///
/// Returns `None` only when the modal has neither controls nor an input;
/// the caller then relies on inline-render detection or the skip timeout.
pub fn confirm_dialog<S: EditSurface>(
    surface: &mut S,
    dialog: &S::Node,
    contract: &HostContract,
    confirm_labels: &[String],
) -> Option<ConfirmStrategy> {
    let controls = surface.query_within(dialog, &contract.dialog_control);

    for control in &controls {
        let label = surface.text_content(control).trim().to_lowercase();
        if let Some(hit) = confirm_labels
            .iter()
            .find(|l| !l.is_empty() && label.contains(l.to_lowercase().as_str()))
        {
            tracing::debug!(
                target: "equate::dialog",
                label = %label,
                "confirm control matched by label"
            );
            surface.click(control);
            return Some(ConfirmStrategy::Label(SmolStr::new(hit)));
        }
    }

    for control in &controls {
        if !surface.query_within(control, &contract.confirm_icon).is_empty() {
            tracing::debug!(target: "equate::dialog", "confirm control matched by icon");
            surface.click(control);
            return Some(ConfirmStrategy::Icon);
        }
    }

    if let Some(last) = controls.last() {
        tracing::debug!(
            target: "equate::dialog",
            count = controls.len(),
            "falling back to last control"
        );
        surface.click(last);
        return Some(ConfirmStrategy::LastControl);
    }

    let input = surface
        .query_within(dialog, &contract.dialog_input)
        .into_iter()
        .next()?;
    tracing::debug!(target: "equate::dialog", "no controls, pressing Enter on the input");
    surface.dispatch_chord_at(&input, &KeyChord::enter());
    Some(ConfirmStrategy::EnterKey)
}
