//! Operator confirmation

use crate::error::{ClusterError, Result};
use std::io::{BufRead, Write};

/// Asks the operator before a destructive operation
pub trait Confirmer: Send + Sync {
    /// Return `Ok` to proceed or [`ClusterError::UserAborted`] to stop
    fn confirm(&self, prompt: &str) -> Result<()>;
}

/// `[y/N]` prompt on the terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinConfirmer;

impl Confirmer for StdinConfirmer {
    fn confirm(&self, prompt: &str) -> Result<()> {
        let mut stdout = std::io::stdout();
        write!(stdout, "{} [y/N]: ", prompt)?;
        stdout.flush()?;

        let mut answer = String::new();
        std::io::stdin().lock().read_line(&mut answer)?;
        check_answer(&answer)
    }
}

/// Proceeds without asking
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Confirmer for AssumeYes {
    fn confirm(&self, _prompt: &str) -> Result<()> {
        Ok(())
    }
}

fn check_answer(answer: &str) -> Result<()> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Ok(()),
        _ => Err(ClusterError::UserAborted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answers() {
        assert!(check_answer("y\n").is_ok());
        assert!(check_answer(" YES ").is_ok());
        assert!(check_answer("\n").unwrap_err().is_user_abort());
        assert!(check_answer("no").unwrap_err().is_user_abort());
    }
}
