//! Profile resolution for hotkey presses
//!
//! Decides which profile a binding activates given the profile set and the
//! last applied profile. Pure: the caller updates the applied slot after a
//! successful apply.

use crate::settings::{HotkeyBinding, LogicType, Profile, ProfileId};

/// Why a binding press has nothing to apply
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Unresolved {
    #[error("binding has no target displays")]
    NoTargetDisplays,

    #[error("binding references {found} profile(s), needs {expected}")]
    MissingProfileIds { expected: usize, found: usize },

    #[error("profile {0} no longer exists")]
    StaleProfile(ProfileId),
}

/// Pick the profile a press of `binding` should activate
///
/// Toggles return the first profile only when the second one is the last
/// applied; in every other case (including nothing applied yet) they return
/// the second, which keeps the first press after a restart deterministic.
pub fn resolve<'a>(
    binding: &HotkeyBinding,
    profiles: &'a [Profile],
    last_applied: Option<ProfileId>,
) -> Result<&'a Profile, Unresolved> {
    if binding.target_displays.is_empty() {
        return Err(Unresolved::NoTargetDisplays);
    }

    let expected = binding.logic.required_profiles();
    if binding.profile_ids.len() < expected {
        return Err(Unresolved::MissingProfileIds {
            expected,
            found: binding.profile_ids.len(),
        });
    }

    let lookup = |id: ProfileId| {
        profiles
            .iter()
            .find(|p| p.id == id)
            .ok_or(Unresolved::StaleProfile(id))
    };

    match binding.logic {
        LogicType::DirectSwitch => lookup(binding.profile_ids[0]),
        LogicType::TwoProfileToggle => {
            let first = lookup(binding.profile_ids[0])?;
            let second = lookup(binding.profile_ids[1])?;
            if last_applied == Some(second.id) {
                Ok(first)
            } else {
                Ok(second)
            }
        }
    }
}
