//! Terminal prompts and the interactive access-list editor.

use anyhow::{bail, Context, Result};
use std::io::{self, BufRead, Write};

use gdir_crypto::MasterSecret;
use gdir_records::{
    parse_removal_indices, AccessControl, AccessEdit, AccessEditor, AccessMode, MenuAction,
};

/// Source of operator answers.
pub trait Prompt {
    /// Print `prompt` and read one visible line.
    fn line(&mut self, prompt: &str) -> Result<String>;

    /// Print `prompt` and read one line without echo.
    fn hidden(&mut self, prompt: &str) -> Result<String>;

    /// Show a line of text to the operator.
    fn say(&mut self, text: &str);
}

/// Prompts on the controlling terminal.
pub struct Terminal;

impl Prompt for Terminal {
    fn line(&mut self, prompt: &str) -> Result<String> {
        print!("{}", prompt);
        io::stdout().flush().context("Failed to flush stdout")?;

        let mut line = String::new();
        let read = io::stdin()
            .lock()
            .read_line(&mut line)
            .context("Failed to read input")?;
        if read == 0 {
            bail!("Unexpected end of input");
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn hidden(&mut self, prompt: &str) -> Result<String> {
        rpassword::prompt_password(prompt).context("Failed to read password")
    }

    fn say(&mut self, text: &str) {
        println!("{}", text);
    }
}

/// Ask for a new password twice.
///
/// Mismatches and empty answers ask again; nothing is echoed.
pub fn new_password(prompt: &mut impl Prompt, user: &str) -> Result<String> {
    loop {
        let password = prompt.hidden(&format!("Please enter the password for {}: ", user))?;
        if password.is_empty() {
            prompt.say("Password cannot be empty.");
            continue;
        }
        let confirm = prompt.hidden("Please re-enter the password: ")?;
        if password == confirm {
            return Ok(password);
        }
        prompt.say("Passwords do not match.");
    }
}

/// Ask for an operator-chosen master secret twice.
pub fn new_secret(prompt: &mut impl Prompt) -> Result<MasterSecret> {
    loop {
        let entered = prompt.hidden("Please enter your gdir master secret key: ")?;
        let Ok(secret) = MasterSecret::new(entered.trim()) else {
            prompt.say("Secret key cannot be empty.");
            continue;
        };
        let confirm = prompt.hidden("Please re-enter the secret key: ")?;
        if secret.matches(confirm.trim()) {
            return Ok(secret);
        }
        prompt.say("Secret keys do not match.");
    }
}

/// Run the menu-driven list editor until the operator confirms.
pub fn edit_access(
    prompt: &mut impl Prompt,
    user: &str,
    control: AccessControl,
) -> Result<AccessControl> {
    let mut editor = AccessEditor::new(control);

    while !editor.is_confirmed() {
        let mode = editor.mode();
        show_state(prompt, user, editor.control());

        prompt.say(&format!(
            "Specify how you want to configure the {} access control:",
            mode.list_name()
        ));
        for (i, action) in mode.menu().iter().enumerate() {
            prompt.say(&format!("    ({}) {}", i + 1, action.label(mode)));
        }

        let answer = prompt.line("Please enter your choice: ")?;
        let Some(action) = mode.parse_choice(&answer) else {
            continue;
        };

        let edit = match action {
            MenuAction::Remove => ask_removal(prompt, mode)?,
            _ if action.needs_input() => {
                let input = prompt.line(&input_question(action, mode))?;
                match action.into_edit(&input) {
                    Ok(edit) => edit,
                    Err(e) => {
                        prompt.say(&e.to_string());
                        continue;
                    }
                }
            }
            _ => action.into_edit("")?,
        };

        if let Err(e) = editor.apply(edit) {
            prompt.say(&e.to_string());
        }
    }

    Ok(editor.finish())
}

/// Ask for list numbers until every one of them parses.
fn ask_removal(prompt: &mut impl Prompt, mode: AccessMode) -> Result<AccessEdit> {
    loop {
        let input = prompt.line(&input_question(MenuAction::Remove, mode))?;
        match parse_removal_indices(&input) {
            Ok(indices) => return Ok(AccessEdit::Remove(indices)),
            Err(e) => prompt.say(&e.to_string()),
        }
    }
}

fn show_state(prompt: &mut impl Prompt, user: &str, control: &AccessControl) {
    match control {
        AccessControl::Unrestricted => {
            prompt.say(&format!("User {} has global access to all drives.", user));
        }
        AccessControl::Allow(list) | AccessControl::Deny(list) => {
            prompt.say(&format!(
                "User {} has the following {}:",
                user,
                control.mode().list_name()
            ));
            for (i, drive) in list.iter().enumerate() {
                prompt.say(&format!("    ({}) {}", i + 1, drive));
            }
        }
    }
}

fn input_question(action: MenuAction, mode: AccessMode) -> String {
    match action {
        MenuAction::ConvertToAllow => {
            "Please enter the white-list drive IDs (comma separated): ".to_string()
        }
        MenuAction::ConvertToDeny => {
            "Please enter the black-list drive IDs (comma separated): ".to_string()
        }
        MenuAction::Remove => format!(
            "Please enter the list numbers to remove from the {} (comma separated): ",
            mode.list_name()
        ),
        _ => format!(
            "Please enter the {} drive IDs (comma separated): ",
            mode.list_name()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Answers from a fixed script, recording everything shown.
    struct Scripted {
        answers: VecDeque<&'static str>,
        shown: Vec<String>,
    }

    impl Scripted {
        fn new(answers: &[&'static str]) -> Self {
            Self {
                answers: answers.iter().copied().collect(),
                shown: Vec::new(),
            }
        }
    }

    impl Prompt for Scripted {
        fn line(&mut self, _prompt: &str) -> Result<String> {
            match self.answers.pop_front() {
                Some(answer) => Ok(answer.to_string()),
                None => bail!("script exhausted"),
            }
        }

        fn hidden(&mut self, prompt: &str) -> Result<String> {
            self.line(prompt)
        }

        fn say(&mut self, text: &str) {
            self.shown.push(text.to_string());
        }
    }

    fn drives(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_edit_new_allow_list() {
        let mut prompt = Scripted::new(&["2", "a, b", "2", "c,a", ""]);
        let control = edit_access(&mut prompt, "alice", AccessControl::Unrestricted).unwrap();

        assert_eq!(control, AccessControl::Allow(drives(&["a", "b", "c"])));
    }

    #[test]
    fn test_bad_removal_asks_again_for_numbers() {
        // Only the number question repeats; the menu is not shown again.
        let mut prompt = Scripted::new(&["3", "1,x,3", "0", "1,3", "1"]);
        let control = edit_access(
            &mut prompt,
            "alice",
            AccessControl::Deny(drives(&["a", "b", "c"])),
        )
        .unwrap();

        assert_eq!(control, AccessControl::Deny(drives(&["b"])));
        assert!(prompt.shown.iter().any(|s| s.contains("'x'")));
        assert!(prompt.shown.iter().any(|s| s.contains("'0'")));
        let menus = prompt
            .shown
            .iter()
            .filter(|s| s.starts_with("Specify how"))
            .count();
        assert_eq!(menus, 2);
    }

    #[test]
    fn test_unknown_choice_and_clear() {
        let mut prompt = Scripted::new(&["9", "nope", "6", ""]);
        let control =
            edit_access(&mut prompt, "alice", AccessControl::Allow(drives(&["a"]))).unwrap();

        assert_eq!(control, AccessControl::Unrestricted);
    }

    #[test]
    fn test_convert_to_opposite() {
        let mut prompt = Scripted::new(&["5", "1"]);
        let control =
            edit_access(&mut prompt, "alice", AccessControl::Allow(drives(&["a"]))).unwrap();

        assert_eq!(control, AccessControl::Deny(drives(&["a"])));
    }

    #[test]
    fn test_exhausted_script_errors() {
        let mut prompt = Scripted::new(&["2"]);
        assert!(edit_access(&mut prompt, "alice", AccessControl::Unrestricted).is_err());
    }

    #[test]
    fn test_new_password_confirms() {
        let mut prompt = Scripted::new(&["", "one", "two", "pw", "pw"]);
        assert_eq!(new_password(&mut prompt, "alice").unwrap(), "pw");
        assert!(prompt.shown.iter().any(|s| s.contains("do not match")));
    }

    #[test]
    fn test_new_secret_confirms() {
        let mut prompt = Scripted::new(&["s3cr3t", "other", "s3cr3t", "s3cr3t"]);
        let secret = new_secret(&mut prompt).unwrap();
        assert_eq!(secret.expose(), "s3cr3t");
    }
}
