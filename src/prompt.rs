use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::warn;

/// Asks the user whether a command may run.
pub trait Confirm {
    /// `banner` names who is asking, `text` is the fully rendered command.
    fn confirm(&self, banner: &str, text: &str) -> bool;
}

/// Reads a single line from the terminal; only answers starting with `y`
/// or `Y` confirm.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl Confirm for TerminalPrompt {
    fn confirm(&self, banner: &str, text: &str) -> bool {
        println!("{} wants to run: \n{}", banner, text);

        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(err) => {
                warn!("Cannot open terminal for confirmation: {}", err);
                return false;
            }
        };

        match rl.readline("Confirm (y/n): ") {
            Ok(line) => is_yes(&line),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => false,
            Err(err) => {
                warn!("Error reading confirmation: {}", err);
                false
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim_start().chars().next(), Some('y' | 'Y'))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Answers with a fixed value and remembers what it was shown.
    #[derive(Debug, Clone, Default)]
    pub struct ScriptedConfirm {
        pub answer: bool,
        pub shown: Rc<RefCell<Vec<String>>>,
    }

    impl ScriptedConfirm {
        pub fn answering(answer: bool) -> Self {
            Self {
                answer,
                ..Self::default()
            }
        }

        pub fn prompts(&self) -> Vec<String> {
            self.shown.borrow().clone()
        }
    }

    impl Confirm for ScriptedConfirm {
        fn confirm(&self, _banner: &str, text: &str) -> bool {
            self.shown.borrow_mut().push(text.to_string());
            self.answer
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y"));
        assert!(is_yes("Yes"));
        assert!(is_yes("  yep"));
        assert!(!is_yes("n"));
        assert!(!is_yes(""));
        assert!(!is_yes("sure"));
    }
}
