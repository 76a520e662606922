//! Command and callback parsing
//!
//! Parsing is pure so the handler only deals with well-formed input.

use super::types::BotCommand;

/// Arguments of `/challenge @user amount title…`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeArgs {
    /// Opponent username without the leading `@`
    pub opponent: String,
    pub amount: i64,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeArgsError {
    /// Fewer than three arguments
    Usage,
    /// Amount is not a positive integer
    InvalidAmount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Balance,
    Wallet,
    MyChallenges,
    Challenge(Result<ChallengeArgs, ChallengeArgsError>),
    Leaderboard,
    Unknown(String),
}

/// Inline button actions on challenge cards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Accept(i64),
    Decline(i64),
}

/// Parse a message as a command.
///
/// Returns `None` for plain text and for commands addressed to a different
/// bot (`/cmd@otherbot`).
pub fn parse_command(text: &str, bot_username: &str) -> Option<Command> {
    let text = text.trim();
    let rest = text.strip_prefix('/')?;

    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };

    let name = match head.split_once('@') {
        Some((name, target)) => {
            let ours = bot_username.trim_start_matches('@');
            if !ours.is_empty() && !target.eq_ignore_ascii_case(ours) {
                return None;
            }
            name
        }
        None => head,
    };

    let command = match name.to_lowercase().as_str() {
        "start" => Command::Start,
        "help" => Command::Help,
        "balance" => Command::Balance,
        "wallet" => Command::Wallet,
        "mychallenges" => Command::MyChallenges,
        "challenge" => Command::Challenge(parse_challenge_args(args)),
        "leaderboard" => Command::Leaderboard,
        other => Command::Unknown(other.to_string()),
    };
    Some(command)
}

pub fn parse_challenge_args(args: &str) -> Result<ChallengeArgs, ChallengeArgsError> {
    let mut parts = args.split_whitespace();
    let (Some(opponent), Some(amount)) = (parts.next(), parts.next()) else {
        return Err(ChallengeArgsError::Usage);
    };
    let title = parts.collect::<Vec<_>>().join(" ");
    if title.is_empty() {
        return Err(ChallengeArgsError::Usage);
    }

    let amount = amount
        .parse::<i64>()
        .ok()
        .filter(|a| *a > 0)
        .ok_or(ChallengeArgsError::InvalidAmount)?;

    let opponent = opponent.trim_start_matches('@');
    if opponent.is_empty() {
        return Err(ChallengeArgsError::Usage);
    }

    Ok(ChallengeArgs {
        opponent: opponent.to_string(),
        amount,
        title,
    })
}

fn parse_id(value: &str) -> Option<i64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// `accept_{id}`, `decline_{id}` or `decline_challenge_{id}`
pub fn parse_callback(data: &str) -> Option<CallbackAction> {
    if let Some(id) = data.strip_prefix("accept_") {
        return parse_id(id).map(CallbackAction::Accept);
    }
    if let Some(id) = data.strip_prefix("decline_challenge_") {
        return parse_id(id).map(CallbackAction::Decline);
    }
    if let Some(id) = data.strip_prefix("decline_") {
        return parse_id(id).map(CallbackAction::Decline);
    }
    None
}

/// Command menu registered with `setMyCommands`
pub fn bot_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "Link your Telegram account to Bantah"),
        BotCommand::new("help", "Show available commands and usage"),
        BotCommand::new("balance", "Check your wallet balance"),
        BotCommand::new("mychallenges", "View your active challenges"),
        BotCommand::new("challenge", "Create a new challenge"),
        BotCommand::new("leaderboard", "View the global leaderboard"),
        BotCommand::new("wallet", "Access your wallet"),
    ]
}
