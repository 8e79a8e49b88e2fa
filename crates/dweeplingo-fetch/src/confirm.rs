//! Yes/no decisions taken during acquisition

use dweeplingo_core::{ConfirmMode, Direction};
use std::io::{self, BufRead, Write};

/// A question the acquirer needs answered before acting.
#[derive(Debug, Clone, Copy)]
pub enum Prompt {
    /// Start downloading at all.
    Proceed,
    /// Replace an existing, non-empty bundle.
    Redownload(Direction),
}

pub trait Confirm {
    fn confirm(&mut self, prompt: Prompt) -> bool;
}

/// Asks on stdin. Anything other than `y` declines, including EOF.
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, prompt: Prompt) -> bool {
        let question = match prompt {
            Prompt::Proceed => "\nProceed with download? (y/n): ".to_string(),
            Prompt::Redownload(direction) => format!("   Re-download {}? (y/n): ", direction),
        };
        print!("{}", question);
        if io::stdout().flush().is_err() {
            return false;
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => false,
            Ok(_) => answer.trim().eq_ignore_ascii_case("y"),
        }
    }
}

/// Says yes to everything, re-downloads included.
pub struct AlwaysYes;

impl Confirm for AlwaysYes {
    fn confirm(&mut self, _prompt: Prompt) -> bool {
        true
    }
}

/// Proceeds, but keeps any bundle already on disk.
pub struct NeverOverwrite;

impl Confirm for NeverOverwrite {
    fn confirm(&mut self, prompt: Prompt) -> bool {
        matches!(prompt, Prompt::Proceed)
    }
}

pub fn from_mode(mode: ConfirmMode) -> Box<dyn Confirm> {
    match mode {
        ConfirmMode::Ask => Box::new(StdinConfirm),
        ConfirmMode::Yes => Box::new(AlwaysYes),
        ConfirmMode::Keep => Box::new(NeverOverwrite),
    }
}

impl<C: Confirm + ?Sized> Confirm for Box<C> {
    fn confirm(&mut self, prompt: Prompt) -> bool {
        (**self).confirm(prompt)
    }
}
