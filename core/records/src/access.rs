//! Access-control lists for user records.
//!
//! A user is either unrestricted, restricted to an allow-list of drive IDs,
//! or excluded from a deny-list of drive IDs. The two lists are mutually
//! exclusive; [`AccessControl`] makes the invalid "both set" state
//! unrepresentable.
//!
//! The interactive editor is modelled as a state machine over
//! [`AccessMode`] driven by [`AccessEdit`] transitions, so it can be
//! exercised with a scripted sequence of edits and no terminal.

use std::fmt;

use gdir_common::{parse_drive_list, Error, Result};

/// Resolved access control of one user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AccessControl {
    /// Global access to all drives.
    #[default]
    Unrestricted,
    /// Access only to the listed drives.
    Allow(Vec<String>),
    /// Access to every drive except the listed ones.
    Deny(Vec<String>),
}

impl AccessControl {
    /// Build from the two stored lists.
    ///
    /// # Errors
    /// - Both lists are non-empty
    pub fn from_lists(allow: Vec<String>, deny: Vec<String>) -> Result<Self> {
        match (allow.is_empty(), deny.is_empty()) {
            (true, true) => Ok(Self::Unrestricted),
            (false, true) => Ok(Self::Allow(allow)),
            (true, false) => Ok(Self::Deny(deny)),
            (false, false) => Err(Error::InputValidation(
                "Allow-list and deny-list are mutually exclusive".to_string(),
            )),
        }
    }

    /// Split back into (allow, deny) lists for storage.
    pub fn into_lists(self) -> (Vec<String>, Vec<String>) {
        match self {
            Self::Unrestricted => (Vec::new(), Vec::new()),
            Self::Allow(list) => (list, Vec::new()),
            Self::Deny(list) => (Vec::new(), list),
        }
    }

    /// Current editor state.
    pub fn mode(&self) -> AccessMode {
        match self {
            Self::Unrestricted => AccessMode::Unrestricted,
            Self::Allow(_) => AccessMode::AllowListActive,
            Self::Deny(_) => AccessMode::DenyListActive,
        }
    }

    /// Drives of the active list, empty when unrestricted.
    pub fn drives(&self) -> &[String] {
        match self {
            Self::Unrestricted => &[],
            Self::Allow(list) | Self::Deny(list) => list,
        }
    }

    /// Re-establish the invariant that an active list is never empty.
    fn normalized(self) -> Self {
        match self {
            Self::Allow(list) | Self::Deny(list) if list.is_empty() => Self::Unrestricted,
            other => other,
        }
    }
}

impl fmt::Display for AccessControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unrestricted => write!(f, "unrestricted"),
            Self::Allow(list) => write!(f, "white-list [{}]", list.join(", ")),
            Self::Deny(list) => write!(f, "black-list [{}]", list.join(", ")),
        }
    }
}

/// State of the list editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Unrestricted,
    AllowListActive,
    DenyListActive,
}

impl AccessMode {
    /// Operator-facing name of the active list.
    pub fn list_name(&self) -> &'static str {
        match self {
            Self::Unrestricted => "global",
            Self::AllowListActive => "white-list",
            Self::DenyListActive => "black-list",
        }
    }

    /// Name of the list `ConvertToOpposite` switches to.
    pub fn opposite_list_name(&self) -> &'static str {
        match self {
            Self::Unrestricted => "global",
            Self::AllowListActive => "black-list",
            Self::DenyListActive => "white-list",
        }
    }

    /// Menu entries offered in this state, in display order.
    ///
    /// Entry `i` is selected by typing `i + 1`; an empty answer confirms.
    pub fn menu(&self) -> &'static [MenuAction] {
        match self {
            Self::Unrestricted => &[
                MenuAction::Confirm,
                MenuAction::ConvertToAllow,
                MenuAction::ConvertToDeny,
            ],
            Self::AllowListActive | Self::DenyListActive => &[
                MenuAction::Confirm,
                MenuAction::Append,
                MenuAction::Remove,
                MenuAction::Replace,
                MenuAction::ConvertToOpposite,
                MenuAction::ClearToUnrestricted,
            ],
        }
    }

    /// Map a menu answer to an action, `None` for anything unrecognized.
    pub fn parse_choice(&self, input: &str) -> Option<MenuAction> {
        let input = input.trim();
        if input.is_empty() {
            return Some(MenuAction::Confirm);
        }
        let choice: usize = input.parse().ok()?;
        self.menu().get(choice.checked_sub(1)?).copied()
    }
}

/// Menu entry chosen by the operator, before any list input is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Confirm,
    ConvertToAllow,
    ConvertToDeny,
    Append,
    Remove,
    Replace,
    ConvertToOpposite,
    ClearToUnrestricted,
}

impl MenuAction {
    /// Menu label for this action in `mode`.
    pub fn label(&self, mode: AccessMode) -> String {
        match self {
            Self::Confirm => "Confirm                         (default)".to_string(),
            Self::ConvertToAllow => "Convert to white-list access control list".to_string(),
            Self::ConvertToDeny => "Convert to black-list access control list".to_string(),
            Self::Append => "Append drives to the list".to_string(),
            Self::Remove => "Remove drives from the list".to_string(),
            Self::Replace => "Replace with a new list of drives".to_string(),
            Self::ConvertToOpposite => {
                format!("Convert to {} access control", mode.opposite_list_name())
            }
            Self::ClearToUnrestricted => "Disable access control on the user".to_string(),
        }
    }

    /// Whether the action needs a comma separated answer.
    pub fn needs_input(&self) -> bool {
        matches!(
            self,
            Self::ConvertToAllow
                | Self::ConvertToDeny
                | Self::Append
                | Self::Remove
                | Self::Replace
        )
    }

    /// Turn the action plus its answer into an edit.
    ///
    /// # Errors
    /// - `Remove` with an answer that is not a list of positive integers;
    ///   nothing is removed and the caller should ask again
    pub fn into_edit(self, input: &str) -> Result<AccessEdit> {
        Ok(match self {
            Self::Confirm => AccessEdit::Confirm,
            Self::ConvertToAllow => AccessEdit::ConvertToAllow(parse_drive_list(input)),
            Self::ConvertToDeny => AccessEdit::ConvertToDeny(parse_drive_list(input)),
            Self::Append => AccessEdit::Append(parse_drive_list(input)),
            Self::Remove => AccessEdit::Remove(parse_removal_indices(input)?),
            Self::Replace => AccessEdit::Replace(parse_drive_list(input)),
            Self::ConvertToOpposite => AccessEdit::ConvertToOpposite,
            Self::ClearToUnrestricted => AccessEdit::ClearToUnrestricted,
        })
    }
}

/// Transition of the list editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessEdit {
    /// Accept the current state and end the session.
    Confirm,
    /// Unrestricted → allow-list.
    ConvertToAllow(Vec<String>),
    /// Unrestricted → deny-list.
    ConvertToDeny(Vec<String>),
    /// Add drives not already present.
    Append(Vec<String>),
    /// Drop entries by 1-based index.
    Remove(Vec<usize>),
    /// Swap the whole active list.
    Replace(Vec<String>),
    /// Allow ↔ deny, keeping the drives.
    ConvertToOpposite,
    /// Drop the active list.
    ClearToUnrestricted,
}

/// Parse a comma separated list of 1-based indices.
///
/// Validation is atomic: one bad token rejects the whole answer.
///
/// # Errors
/// - Empty answer, unparsable token, or index `0`
pub fn parse_removal_indices(input: &str) -> Result<Vec<usize>> {
    input
        .split(',')
        .map(str::trim)
        .map(|token| match token.parse::<usize>() {
            Ok(index) if index > 0 => Ok(index),
            _ => Err(Error::InputValidation(format!(
                "'{}' is not a list number",
                token
            ))),
        })
        .collect()
}

/// List editor session.
#[derive(Debug, Clone)]
pub struct AccessEditor {
    control: AccessControl,
    confirmed: bool,
}

impl AccessEditor {
    /// Start editing from an existing access control.
    pub fn new(control: AccessControl) -> Self {
        Self {
            control: control.normalized(),
            confirmed: false,
        }
    }

    /// Current state.
    pub fn mode(&self) -> AccessMode {
        self.control.mode()
    }

    /// Current access control.
    pub fn control(&self) -> &AccessControl {
        &self.control
    }

    /// Whether `Confirm` has been applied.
    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    /// Apply one transition.
    ///
    /// # Errors
    /// - Transition not offered in the current state, or an empty list
    ///   where a list is required. The state is unchanged on error.
    pub fn apply(&mut self, edit: AccessEdit) -> Result<()> {
        if self.confirmed {
            return Err(Error::InputValidation(
                "Access control already confirmed".to_string(),
            ));
        }

        let current = std::mem::take(&mut self.control);
        match transition(current.clone(), edit) {
            Ok(Some(next)) => {
                self.control = next.normalized();
                Ok(())
            }
            Ok(None) => {
                self.control = current;
                self.confirmed = true;
                Ok(())
            }
            Err(e) => {
                self.control = current;
                Err(e)
            }
        }
    }

    /// Apply scripted edits until one confirms.
    ///
    /// # Errors
    /// - The first rejected edit, or running out of edits unconfirmed
    pub fn run(mut self, edits: impl IntoIterator<Item = AccessEdit>) -> Result<AccessControl> {
        for edit in edits {
            self.apply(edit)?;
            if self.confirmed {
                return Ok(self.control);
            }
        }
        Err(Error::InputValidation(
            "Access list editing ended without confirmation".to_string(),
        ))
    }

    /// Finish the session, returning the edited access control.
    pub fn finish(self) -> AccessControl {
        self.control
    }
}

/// `Ok(None)` means confirmed without change.
fn transition(control: AccessControl, edit: AccessEdit) -> Result<Option<AccessControl>> {
    use AccessControl::{Allow, Deny, Unrestricted};

    let mode = control.mode();
    let next = match (control, edit) {
        (_, AccessEdit::Confirm) => return Ok(None),

        (Unrestricted, AccessEdit::ConvertToAllow(list)) => Allow(non_empty(list)?),
        (Unrestricted, AccessEdit::ConvertToDeny(list)) => Deny(non_empty(list)?),

        (Allow(list), AccessEdit::Append(add)) => Allow(append_unique(list, add)),
        (Deny(list), AccessEdit::Append(add)) => Deny(append_unique(list, add)),

        (Allow(list), AccessEdit::Remove(indices)) => Allow(remove_indices(list, &indices)),
        (Deny(list), AccessEdit::Remove(indices)) => Deny(remove_indices(list, &indices)),

        (Allow(_), AccessEdit::Replace(list)) => Allow(non_empty(list)?),
        (Deny(_), AccessEdit::Replace(list)) => Deny(non_empty(list)?),

        (Allow(list), AccessEdit::ConvertToOpposite) => Deny(list),
        (Deny(list), AccessEdit::ConvertToOpposite) => Allow(list),

        (Allow(_) | Deny(_), AccessEdit::ClearToUnrestricted) => Unrestricted,

        (_, edit) => {
            return Err(Error::InputValidation(format!(
                "{:?} is not available for a {} user",
                edit,
                mode.list_name()
            )))
        }
    };
    Ok(Some(next))
}

fn non_empty(list: Vec<String>) -> Result<Vec<String>> {
    if list.is_empty() {
        return Err(Error::InputValidation(
            "Drive list cannot be empty".to_string(),
        ));
    }
    Ok(list)
}

fn append_unique(mut list: Vec<String>, add: Vec<String>) -> Vec<String> {
    for drive in add {
        if !list.contains(&drive) {
            list.push(drive);
        }
    }
    list
}

fn remove_indices(list: Vec<String>, indices: &[usize]) -> Vec<String> {
    list.into_iter()
        .enumerate()
        .filter(|(i, _)| !indices.contains(&(i + 1)))
        .map(|(_, drive)| drive)
        .collect()
}

/// Access-list change requested without the interactive editor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AccessUpdate {
    /// Carry the previous lists forward.
    #[default]
    Keep,
    /// Set the allow-list, clearing any deny-list.
    Allow(Vec<String>),
    /// Set the deny-list, clearing any allow-list.
    Deny(Vec<String>),
    /// Drop both lists.
    Unrestricted,
}

impl AccessUpdate {
    /// Build from command line flags.
    ///
    /// # Errors
    /// - More than one of the flags is given
    pub fn from_flags(allow: Option<&str>, deny: Option<&str>, unrestricted: bool) -> Result<Self> {
        match (allow, deny, unrestricted) {
            (None, None, false) => Ok(Self::Keep),
            (Some(list), None, false) => Ok(Self::Allow(parse_drive_list(list))),
            (None, Some(list), false) => Ok(Self::Deny(parse_drive_list(list))),
            (None, None, true) => Ok(Self::Unrestricted),
            _ => Err(Error::InputValidation(
                "Only one of allow-list, deny-list or unrestricted may be given".to_string(),
            )),
        }
    }
}

impl From<AccessControl> for AccessUpdate {
    fn from(control: AccessControl) -> Self {
        match control {
            AccessControl::Unrestricted => Self::Unrestricted,
            AccessControl::Allow(list) => Self::Allow(list),
            AccessControl::Deny(list) => Self::Deny(list),
        }
    }
}

/// Resolve an update against the previously stored access control.
///
/// Setting one list clears the other; an empty list resolves to
/// unrestricted.
pub fn merge_access_lists(old: &AccessControl, update: AccessUpdate) -> AccessControl {
    let resolved = match update {
        AccessUpdate::Keep => old.clone(),
        AccessUpdate::Allow(list) => AccessControl::Allow(list),
        AccessUpdate::Deny(list) => AccessControl::Deny(list),
        AccessUpdate::Unrestricted => AccessControl::Unrestricted,
    };
    resolved.normalized()
}
