use std::{
    collections::VecDeque,
    fmt,
    sync::{Arc, Mutex},
};

use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use primitive_types::U256;

use crate::errors::{Error, Result};

/// Wei per whole token (1e18).
pub fn one_token() -> U256 {
    U256::exp10(18)
}

/// Operator interaction used by the interactive flows.
/// Options are passed as rendered labels; use [`select`] to get an enum value back.
pub trait Prompter: Send + Sync {
    fn capture_index(&self, prompt: &str, labels: &[String]) -> Result<usize>;
    fn capture_string(&self, prompt: &str) -> Result<String>;
    fn capture_u64(&self, prompt: &str) -> Result<u64>;
    fn capture_yes_no(&self, prompt: &str) -> Result<bool>;

    /// Prints an informational message to the operator.
    fn info(&self, msg: &str);

    /// Asks again until the answer is a valid address.
    fn capture_address(&self, prompt: &str) -> Result<String> {
        loop {
            let s = self.capture_string(prompt)?;
            match validate_address(s.trim()) {
                Ok(()) => return Ok(s.trim().to_string()),
                Err(e) => self.info(&e.to_string()),
            }
        }
    }

    /// Captures a whole-token amount and returns it in wei.
    fn capture_balance(&self, prompt: &str) -> Result<U256> {
        let tokens = self.capture_u64(prompt)?;
        U256::from(tokens)
            .checked_mul(one_token())
            .ok_or_else(|| Error::Prompt {
                message: format!("balance {tokens} overflows"),
            })
    }
}

/// Runs prompts on the blocking pool so async callers keep their worker thread.
pub async fn blocking<T, F>(prompter: &Arc<dyn Prompter>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn Prompter) -> Result<T> + Send + 'static,
{
    let prompter = Arc::clone(prompter);
    tokio::task::spawn_blocking(move || f(prompter.as_ref()))
        .await
        .map_err(|e| Error::Prompt {
            message: format!("prompt task failed: {e}"),
        })?
}

/// Shows the options rendered from their Display impl and returns the chosen one.
pub fn select<T>(prompter: &dyn Prompter, prompt: &str, options: &[T]) -> Result<T>
where
    T: fmt::Display + Copy,
{
    let labels: Vec<String> = options.iter().map(|o| o.to_string()).collect();
    let idx = prompter.capture_index(prompt, &labels)?;
    options.get(idx).copied().ok_or_else(|| Error::Prompt {
        message: format!("selected index {idx} out of range for '{prompt}'"),
    })
}

/// Answers to a "yes, no, explain" question.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum YesNoExplain {
    Yes,
    No,
    Explain,
}

impl fmt::Display for YesNoExplain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            YesNoExplain::Yes => write!(f, "Yes"),
            YesNoExplain::No => write!(f, "No"),
            YesNoExplain::Explain => write!(f, "Explain"),
        }
    }
}

/// Asks until the operator answers yes or no, printing the explanation on request.
pub fn yes_no_explain(prompter: &dyn Prompter, prompt: &str, explanation: &str) -> Result<bool> {
    loop {
        match select(
            prompter,
            prompt,
            &[YesNoExplain::Yes, YesNoExplain::No, YesNoExplain::Explain],
        )? {
            YesNoExplain::Yes => return Ok(true),
            YesNoExplain::No => return Ok(false),
            YesNoExplain::Explain => prompter.info(explanation),
        }
    }
}

/// Decision while editing a list of entries.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ListDecision {
    Add,
    Remove,
    Preview,
    Done,
    Cancel,
}

impl fmt::Display for ListDecision {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ListDecision::Add => write!(f, "Add"),
            ListDecision::Remove => write!(f, "Remove"),
            ListDecision::Preview => write!(f, "Preview"),
            ListDecision::Done => write!(f, "Done"),
            ListDecision::Cancel => write!(f, "Cancel"),
        }
    }
}

pub const LIST_DECISIONS: [ListDecision; 5] = [
    ListDecision::Add,
    ListDecision::Remove,
    ListDecision::Preview,
    ListDecision::Done,
    ListDecision::Cancel,
];

/// Checks for a "0x"-prefixed 20-byte hex address.
pub fn validate_address(s: &str) -> Result<()> {
    let hex = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| Error::Prompt {
            message: format!("address '{s}' must start with 0x"),
        })?;
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::Prompt {
            message: format!("'{s}' is not a 20-byte hex address"),
        });
    }
    Ok(())
}

/// Prompter backed by the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct Terminal;

fn prompt_err(e: impl fmt::Display) -> Error {
    Error::Prompt {
        message: e.to_string(),
    }
}

impl Prompter for Terminal {
    fn capture_index(&self, prompt: &str, labels: &[String]) -> Result<usize> {
        Select::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .items(labels)
            .default(0)
            .interact()
            .map_err(prompt_err)
    }

    fn capture_string(&self, prompt: &str) -> Result<String> {
        Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .interact_text()
            .map_err(prompt_err)
    }

    fn capture_address(&self, prompt: &str) -> Result<String> {
        let s = Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .validate_with(|input: &String| -> std::result::Result<(), String> {
                validate_address(input.trim()).map_err(|e| e.to_string())
            })
            .interact_text()
            .map_err(prompt_err)?;
        Ok(s.trim().to_string())
    }

    fn capture_u64(&self, prompt: &str) -> Result<u64> {
        Input::<u64>::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .interact_text()
            .map_err(prompt_err)
    }

    fn capture_yes_no(&self, prompt: &str) -> Result<bool> {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(prompt_err)
    }

    fn info(&self, msg: &str) {
        println!("{msg}");
    }
}

/// One pre-recorded answer for [`Scripted`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Answer {
    /// Picks the option whose label matches.
    Choose(String),
    Index(usize),
    Text(String),
    Number(u64),
    Bool(bool),
}

impl Answer {
    pub fn choose(option: impl fmt::Display) -> Self {
        Answer::Choose(option.to_string())
    }
}

/// Prompter that replays a fixed list of answers, for non-interactive runs.
/// Running out of answers fails the prompt the same way a cancelled input does.
#[derive(Debug, Default)]
pub struct Scripted {
    answers: Mutex<VecDeque<Answer>>,
    asked: Mutex<Vec<String>>,
    printed: Mutex<Vec<String>>,
}

impl Scripted {
    pub fn new(answers: Vec<Answer>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            ..Default::default()
        }
    }

    /// Prompts shown so far, in order.
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Informational messages shown so far, in order.
    pub fn printed(&self) -> Vec<String> {
        self.printed.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.answers.lock().map(|v| v.len()).unwrap_or_default()
    }

    fn next(&self, prompt: &str) -> Result<Answer> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(prompt.to_string());
        }
        let mut answers = self.answers.lock().map_err(prompt_err)?;
        answers.pop_front().ok_or_else(|| Error::Prompt {
            message: format!("no answer left for '{prompt}'"),
        })
    }

    fn mismatch(prompt: &str, answer: &Answer) -> Error {
        Error::Prompt {
            message: format!("unexpected answer {answer:?} for '{prompt}'"),
        }
    }
}

impl Prompter for Scripted {
    fn capture_index(&self, prompt: &str, labels: &[String]) -> Result<usize> {
        match self.next(prompt)? {
            Answer::Index(i) if i < labels.len() => Ok(i),
            Answer::Choose(label) => labels
                .iter()
                .position(|l| *l == label)
                .ok_or_else(|| Self::mismatch(prompt, &Answer::Choose(label))),
            other => Err(Self::mismatch(prompt, &other)),
        }
    }

    fn capture_string(&self, prompt: &str) -> Result<String> {
        match self.next(prompt)? {
            Answer::Text(s) => Ok(s),
            other => Err(Self::mismatch(prompt, &other)),
        }
    }

    fn capture_u64(&self, prompt: &str) -> Result<u64> {
        match self.next(prompt)? {
            Answer::Number(n) => Ok(n),
            other => Err(Self::mismatch(prompt, &other)),
        }
    }

    fn capture_yes_no(&self, prompt: &str) -> Result<bool> {
        match self.next(prompt)? {
            Answer::Bool(b) => Ok(b),
            other => Err(Self::mismatch(prompt, &other)),
        }
    }

    fn info(&self, msg: &str) {
        if let Ok(mut printed) = self.printed.lock() {
            printed.push(msg.to_string());
        }
    }
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- prompt::test_scripted_select --exact --show-output
#[test]
fn test_scripted_select() {
    let p = Scripted::new(vec![
        Answer::choose(YesNoExplain::Explain),
        Answer::choose(YesNoExplain::No),
        Answer::Number(7),
    ]);
    assert!(!yes_no_explain(&p, "Enable it?", "it does things").unwrap());
    assert_eq!(p.printed(), vec!["it does things".to_string()]);
    assert_eq!(p.capture_balance("amount").unwrap(), U256::from(7) * one_token());

    // out of answers behaves like a cancelled prompt
    assert!(matches!(p.capture_u64("more"), Err(Error::Prompt { .. })));
    assert_eq!(p.asked().len(), 4);
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- prompt::test_validate_address --exact --show-output
#[test]
fn test_validate_address() {
    assert!(validate_address("0x8db97C7cEcE249c2b98bDC0226Cc4C2A57BF52FC").is_ok());
    assert!(validate_address("8db97C7cEcE249c2b98bDC0226Cc4C2A57BF52FC").is_err());
    assert!(validate_address("0x8db97C7cEcE249c2b98bDC0226Cc4C2A57BF52F").is_err());
    assert!(validate_address("0x8db97C7cEcE249c2b98bDC0226Cc4C2A57BF52FZ").is_err());
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- prompt::test_capture_address_asks_again --exact --show-output
#[test]
fn test_capture_address_asks_again() {
    let _ = env_logger::builder().is_test(true).try_init();

    let p = Scripted::new(vec![
        Answer::Text("0x123".to_string()),
        Answer::Text(" 0x8db97C7cEcE249c2b98bDC0226Cc4C2A57BF52FC ".to_string()),
    ]);
    assert_eq!(
        p.capture_address("Address").unwrap(),
        "0x8db97C7cEcE249c2b98bDC0226Cc4C2A57BF52FC"
    );
    assert_eq!(p.asked().len(), 2);
    assert_eq!(p.printed().len(), 1);
    assert!(p.printed()[0].contains("0x123"));
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- prompt::test_blocking --exact --show-output
#[tokio::test]
async fn test_blocking() {
    let _ = env_logger::builder().is_test(true).try_init();

    let scripted = Arc::new(Scripted::new(vec![Answer::Bool(true)]));
    let p: Arc<dyn Prompter> = scripted.clone();
    assert!(blocking(&p, |p| p.capture_yes_no("Continue?")).await.unwrap());
    assert!(matches!(
        blocking(&p, |p| p.capture_yes_no("Again?")).await,
        Err(Error::Prompt { .. })
    ));
    assert_eq!(scripted.asked().len(), 2);
}
