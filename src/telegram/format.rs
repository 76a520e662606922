//! Message formatting for chats and the broadcast channel
//!
//! All templates produce legacy Telegram Markdown. Anything a user typed
//! (titles, descriptions, names) goes through [`escape_markdown`] first.

use chrono::{DateTime, Utc};

use crate::storage::models::{
    Challenge, ChallengeOutcome, ChallengeStatus, Event, LeaderboardEntry, Prediction,
};

pub const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━";

/// Fallback emoji for event categories without their own
pub const EVENT_EMOJI: &str = "🎯";
/// Fallback emoji for challenge categories without their own
pub const CHALLENGE_EMOJI: &str = "⚔️";

// ============ Primitives ============

/// `1234567` -> `1,234,567`
pub fn format_number(value: i64) -> String {
    let out = group_thousands(value.unsigned_abs());
    if value < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Naira amount with thousands separators: `₦1,234`
pub fn format_amount(value: i64) -> String {
    if value < 0 {
        format!("-₦{}", group_thousands(value.unsigned_abs()))
    } else {
        format!("₦{}", format_number(value))
    }
}

pub fn category_emoji(category: &str, fallback: &'static str) -> &'static str {
    match category.to_lowercase().as_str() {
        "crypto" => "₿",
        "sports" => "⚽",
        "gaming" => "🎮",
        "music" => "🎵",
        "politics" => "🏛️",
        "entertainment" => "🎬",
        "tech" => "💻",
        "science" => "🔬",
        "trading" => "📈",
        "fitness" => "🏃",
        "skill" => "🧠",
        _ => fallback,
    }
}

/// Escape the legacy Markdown control characters `_ * ` [`
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `@username` when known, otherwise the plain name
pub fn display_name(username: Option<&str>, name: &str) -> String {
    match username.filter(|u| !u.is_empty()) {
        Some(username) => format!("@{}", username.trim_start_matches('@')),
        None => name.to_string(),
    }
}

/// `2d 5h`, `7h`, or `None` when less than an hour is left
pub fn time_left(end: DateTime<Utc>, now: DateTime<Utc>) -> Option<String> {
    let hours = (end - now).num_hours();
    let days = hours / 24;
    if days > 0 {
        Some(format!("{}d {}h", days, hours % 24))
    } else if hours > 0 {
        Some(format!("{}h", hours))
    } else {
        None
    }
}

fn hashtag(text: &str) -> String {
    text.chars().filter(|c| c.is_alphanumeric()).collect()
}

fn category_line(category: &str, emoji: &str) -> String {
    if category.is_empty() {
        String::new()
    } else {
        format!(
            "{} *Category:* {}\n",
            emoji,
            escape_markdown(&capitalize(category))
        )
    }
}

fn description_line(description: Option<&str>) -> String {
    match description.filter(|d| !d.trim().is_empty()) {
        Some(d) => format!("💭 _{}_\n\n", escape_markdown(d.trim())),
        None => String::new(),
    }
}

// ============ Channel broadcasts ============

pub fn event_broadcast(event: &Event, creator: &str, event_url: &str, now: DateTime<Utc>) -> String {
    let emoji = category_emoji(&event.category, EVENT_EMOJI);
    let (privacy_emoji, privacy) = if event.is_private {
        ("🔒", "Private")
    } else {
        ("🌍", "Public")
    };
    let max_players = event
        .max_participants
        .map(|m| m.to_string())
        .unwrap_or_else(|| "Unlimited".to_string());
    let time_info = match time_left(event.end_date, now) {
        Some(left) => format!("⏰ *{} remaining*", left),
        None => "⏰ *Ending soon!*".to_string(),
    };

    format!(
        "🔥 *NEW PREDICTION EVENT*\n\n\
         {RULE}\n{emoji} *{title}*\n{RULE}\n\n\
         {description}\
         👤 *Creator:* {creator}\n\
         💰 *Current Pool:* {pool}\n\
         🎫 *Entry Fee:* {fee}\n\
         👥 *Max Players:* {max_players}\n\
         {privacy_emoji} *{privacy}* • {emoji} *{category}*\n\n\
         {time_info}\n\n\
         {RULE}\n🚀 [*JOIN EVENT NOW*]({event_url})\n{RULE}\n\n\
         #BetChat #Prediction #{tag}",
        title = escape_markdown(&event.title),
        description = description_line(event.description.as_deref()),
        creator = escape_markdown(creator),
        pool = format_amount(event.total_pool()),
        fee = format_amount(event.entry_fee),
        category = escape_markdown(&capitalize(&event.category)),
        tag = hashtag(&capitalize(&event.category)),
    )
}

pub fn challenge_broadcast(
    challenge: &Challenge,
    challenger: &str,
    challenged: Option<&str>,
    challenge_url: &str,
    now: DateTime<Utc>,
) -> String {
    let emoji = category_emoji(&challenge.category, CHALLENGE_EMOJI);
    let status_emoji = match challenge.status {
        ChallengeStatus::Pending => "⏳",
        ChallengeStatus::Active => "🔥",
        ChallengeStatus::Completed => "✅",
        _ => "📋",
    };
    let opponent_line = match challenged {
        Some(name) => format!("🎯 *Challenged:* {}", escape_markdown(name)),
        None => "🌍 *Open Challenge - Anyone can accept!*".to_string(),
    };
    let time_info = match challenge.due_date {
        Some(due) => match time_left(due, now) {
            Some(left) => format!("⏰ *{} to accept*\n\n", left),
            None => "⏰ *Accept soon!*\n\n".to_string(),
        },
        None => String::new(),
    };

    format!(
        "⚔️ *NEW P2P CHALLENGE*\n\n\
         {RULE}\n{emoji} *{title}*\n{RULE}\n\n\
         {description}\
         🚀 *Challenger:* {challenger}\n\
         {opponent_line}\n\
         💰 *Stake Amount:* {stake}\n\
         {status_emoji} *Status:* {status}\n\
         {category_line}\n\
         {time_info}\
         {RULE}\n🎯 [*VIEW CHALLENGE*]({challenge_url})\n{RULE}\n\n\
         #BetChat #Challenge #P2P #{tag}",
        title = escape_markdown(&challenge.title),
        description = description_line(challenge.description.as_deref()),
        challenger = escape_markdown(challenger),
        stake = format_amount(challenge.stake_amount),
        status = capitalize(challenge.status.as_ref()),
        category_line = category_line(&challenge.category, emoji),
        tag = hashtag(&capitalize(&challenge.category)),
    )
}

/// `winner`/`loser` are the two sides; on a draw their order does not matter
pub fn challenge_result_broadcast(
    challenge: &Challenge,
    winner: &str,
    loser: &str,
    draw: bool,
) -> String {
    let emoji = category_emoji(&challenge.category, CHALLENGE_EMOJI);
    let (result_emoji, result_text, result_tag) = if draw {
        ("🤝", "DRAW", "Draw")
    } else {
        ("🏆", "VICTORY", "Victory")
    };
    let body = if draw {
        format!(
            "🤝 *Both players fought well!*\n💰 *Stakes returned:* {} each\n👥 *{}* vs *{}*",
            format_amount(challenge.stake_amount),
            escape_markdown(winner),
            escape_markdown(loser)
        )
    } else {
        format!(
            "🏆 *Winner:* {}\n💸 *Loser:* {}\n💰 *Prize:* {}",
            escape_markdown(winner),
            escape_markdown(loser),
            format_amount(challenge.total_pool())
        )
    };

    format!(
        "{result_emoji} *CHALLENGE {result_text}*\n\n\
         {RULE}\n{emoji} *{title}*\n{RULE}\n\n\
         {body}\n\n\
         {category_line}\n\
         {RULE}\n\n\
         #BetChat #Challenge #{result_tag} #{tag}",
        title = escape_markdown(&challenge.title),
        category_line = category_line(&challenge.category, emoji),
        tag = hashtag(&capitalize(&challenge.category)),
    )
}

pub fn matchmaking_broadcast(challenge: &Challenge, challenger: &str, challenged: &str) -> String {
    let emoji = category_emoji(&challenge.category, CHALLENGE_EMOJI);
    format!(
        "🔥 *CHALLENGE ACCEPTED*\n\n\
         {RULE}\n⚔️ *BATTLE BEGINS*\n{RULE}\n\n\
         🚀 *Challenger:* {challenger}\n\
         🎯 *Accepted by:* {challenged}\n\
         💰 *Stakes:* {stake} each\n\
         {category_line}\n\
         🍿 *The battle is ON! May the best player win!*\n\n\
         {RULE}\n\n\
         #BetChat #MatchMade #Battle #{tag}",
        challenger = escape_markdown(challenger),
        challenged = escape_markdown(challenged),
        stake = format_amount(challenge.stake_amount),
        category_line = category_line(&challenge.category, emoji),
        tag = hashtag(&capitalize(&challenge.category)),
    )
}

pub fn leaderboard_broadcast(
    player: &str,
    new_rank: u64,
    old_rank: Option<u64>,
    total_wins: i64,
    total_earnings: i64,
    achievement: Option<&str>,
) -> String {
    let rank_emoji = match new_rank {
        1 => "🥇",
        2 => "🥈",
        3 => "🥉",
        _ => "🏅",
    };
    let (change_emoji, change_text) = match old_rank {
        Some(old) if new_rank < old => ("📈", format!("climbed from #{} to #{}", old, new_rank)),
        Some(old) if new_rank > old => ("📉", format!("dropped from #{} to #{}", old, new_rank)),
        Some(_) => ("➡️", format!("maintained #{}", new_rank)),
        None => ("⭐", format!("entered the leaderboard at #{}", new_rank)),
    };
    let achievement_line = achievement
        .map(|a| format!("🎯 *Achievement:* {}\n", escape_markdown(a)))
        .unwrap_or_default();
    let player = escape_markdown(player);

    format!(
        "{rank_emoji} *LEADERBOARD UPDATE*\n\n\
         {RULE}\n{change_emoji} *RANK CHANGE*\n{RULE}\n\n\
         👤 *Player:* {player}\n\
         {rank_emoji} *New Rank:* #{new_rank}\n\
         {change_emoji} *{player}* {change_text}\n\n\
         📊 *Stats:*\n\
         🏆 *Total Wins:* {total_wins}\n\
         💰 *Total Earnings:* {earnings}\n\
         {achievement_line}\n\
         {RULE}\n🏆 *Climb the ranks and dominate!*\n{RULE}\n\n\
         #BetChat #Leaderboard #Ranking #Champion",
        earnings = format_amount(total_earnings),
    )
}

// ============ Linking ============

pub fn welcome_link(first_name: &str) -> String {
    format!(
        "👋 *Welcome to Bantah, {}!*\n\n\
         🔗 *Link Your Account*\n\n\
         To start using Bantah through Telegram, you need to link your Telegram account to your Bantah account.\n\n\
         Click the button below to securely link your account. You'll be able to:\n\n\
         ✅ Create challenges from Telegram\n\
         ✅ Accept challenges with one tap\n\
         ✅ Get instant notifications\n\
         ✅ View your balance and stats\n\n\
         🔒 *Secure & Private* - Your data is protected\n\n\
         #Bantah #GetStarted",
        escape_markdown(first_name)
    )
}

pub fn already_linked() -> String {
    "✅ *Already Linked*\n\n\
     Your Telegram account is already linked to a Bantah account.\n\n\
     Use /help to see available commands."
        .to_string()
}

pub fn link_expired() -> String {
    "⚠️ *Link Expired*\n\n\
     Your login link has expired for security reasons.\n\n\
     Please use /start to get a new link."
        .to_string()
}

pub fn generic_error() -> String {
    "❌ *Error Occurred*\n\n\
     Something went wrong. Please try again or contact support.\n\n\
     Use /start to try linking again."
        .to_string()
}

pub fn account_linked(username: &str, balance: i64) -> String {
    format!(
        "✅ *Account Linked Successfully!*\n\n\
         {RULE}\n🎉 *Welcome to Bantah, {username}!*\n{RULE}\n\n\
         Your Telegram account is now linked to your Bantah account.\n\n\
         💰 *Current Balance:* {balance}\n\n\
         🎯 *What's Next?*\n\
         • Create challenges using /challenge\n\
         • Check your balance with /balance\n\
         • View active challenges with /mychallenges\n\
         • Get help anytime with /help\n\n\
         {RULE}\n🔥 *You're all set! Let's start betting!*\n{RULE}\n\n\
         #Bantah #Linked #Ready",
        username = escape_markdown(username),
        balance = format_amount(balance),
    )
}

// ============ Commands ============

pub fn help() -> String {
    format!(
        "🎮 *Bantah Bot Commands*\n\n\
         {RULE}\n\n\
         📋 *Available Commands:*\n\n\
         /start - Link your Telegram account\n\
         /help - Show this help message\n\
         /balance - Check your wallet balance\n\
         /mychallenges - View your active challenges\n\
         /challenge - Create a new challenge\n\
         /leaderboard - View the global leaderboard\n\n\
         {RULE}\n\n\
         💡 *How to create a challenge:*\n\
         `/challenge @username 1000 Who wins the game?`\n\n\
         Format: /challenge @opponent amount title\n\n\
         {RULE}\n\n\
         🔗 Need more? Visit the web app for full features!"
    )
}

pub fn not_linked() -> String {
    "⚠️ *Account Not Linked*\n\n\
     You need to link your Telegram account to use this command.\n\n\
     Type /start to link your account first!"
        .to_string()
}

pub fn greeting() -> String {
    "👋 Hey there! Use /help to see available commands or /start to open the Bantah app!"
        .to_string()
}

pub fn balance(handle: &str, balance: i64, coins: i64) -> String {
    format!(
        "💰 *Your Wallet*\n\n\
         Balance: {}\n\
         Coins: 🪙 {}\n\
         User: {}",
        format_amount(balance),
        format_number(coins),
        escape_markdown(handle)
    )
}

/// `/mychallenges`: each entry is a challenge and the opponent's display name
pub fn my_challenges(entries: &[(Challenge, String)]) -> String {
    if entries.is_empty() {
        return "📋 You have no active challenges".to_string();
    }

    let mut message = String::from("📋 *Your Active Challenges*\n\n");
    for (challenge, opponent) in entries {
        message.push_str(&format!(
            "• *{}*\n  {} vs {}\n  Status: {}\n\n",
            escape_markdown(&challenge.title),
            format_amount(challenge.stake_amount),
            escape_markdown(opponent),
            challenge.status
        ));
    }
    message
}

pub fn leaderboard_top(entries: &[LeaderboardEntry]) -> String {
    if entries.is_empty() {
        return "🏆 *Leaderboard*\n\nNo winners yet. Be the first!".to_string();
    }

    let mut message = format!("🏆 *Leaderboard*\n\n{RULE}\n\n");
    for entry in entries {
        let medal = match entry.rank {
            1 => "🥇".to_string(),
            2 => "🥈".to_string(),
            3 => "🥉".to_string(),
            n => format!("#{}", n),
        };
        message.push_str(&format!(
            "{} @{} • {} wins • {}\n",
            medal,
            escape_markdown(&entry.username),
            entry.total_wins,
            format_amount(entry.total_earnings)
        ));
    }
    message
}

pub fn invalid_challenge_format() -> String {
    "❌ *Invalid Format*\n\n\
     Use: `/challenge @username amount title`\n\n\
     Example:\n\
     `/challenge @john 1000 Who wins the match?`"
        .to_string()
}

pub fn invalid_amount() -> String {
    "❌ Invalid amount. Please enter a valid number.".to_string()
}

pub fn user_not_found(username: &str) -> String {
    format!(
        "❌ User @{} not found.",
        escape_markdown(username.trim_start_matches('@'))
    )
}

pub fn self_challenge() -> String {
    "❌ You can't challenge yourself!".to_string()
}

pub fn challenge_created(title: &str, challenger: &str, opponent: &str, stake: i64) -> String {
    let opponent = escape_markdown(opponent);
    format!(
        "✅ *Challenge Created!*\n\n\
         {RULE}\n🎯 *{title}*\n{RULE}\n\n\
         👤 Challenger: {challenger}\n\
         🎮 Opponent: {opponent}\n\
         💰 Stake: {stake}\n\n\
         📱 {opponent} will be notified to accept!",
        title = escape_markdown(title),
        challenger = escape_markdown(challenger),
        stake = format_amount(stake),
    )
}

pub fn insufficient_funds(required: i64, available: i64) -> String {
    format!(
        "⚠️ *Insufficient Funds*\n\n\
         {RULE}\n\
         💰 *Current Balance:* {balance}\n\
         📊 *Required:* {required}\n\
         ❌ *Shortfall:* {shortfall}\n\
         {RULE}\n\n\
         Please deposit funds to accept this challenge.\n\n\
         💡 *Tip:* Use the \"Deposit & Accept\" button to fund your wallet and accept in one step!",
        balance = format_amount(available),
        required = format_amount(required),
        shortfall = format_amount((required - available).max(0)),
    )
}

// ============ Notifications ============

pub fn challenge_received(
    title: &str,
    challenger: &str,
    stake: i64,
    category: &str,
    description: Option<&str>,
) -> String {
    let emoji = category_emoji(category, CHALLENGE_EMOJI);
    format!(
        "⚔️ *CHALLENGE RECEIVED*\n\n\
         {RULE}\n{emoji} *{title}*\n{RULE}\n\n\
         {description}\
         🚀 *Challenger:* {challenger}\n\
         🎯 *You've been challenged!*\n\
         💰 *Stake Amount:* {stake}\n\
         {category_line}\n\
         ⏰ *Quick Actions Below* ⬇️\n\n\
         {RULE}\n\n\
         #Bantah #Challenge #YourMove",
        title = escape_markdown(title),
        description = description_line(description),
        challenger = escape_markdown(challenger),
        stake = format_amount(stake),
        category_line = category_line(category, emoji),
    )
}

pub fn challenge_accepted(title: &str, opponent: &str, stake: i64) -> String {
    format!(
        "✅ *Challenge Accepted!*\n\n\
         {RULE}\n🎯 *{title}*\n{RULE}\n\n\
         🎮 *{opponent}* accepted your challenge!\n\
         💰 Stake: {stake}\n\
         🏆 Total Pool: {pool}\n\
         🔒 Funds are now in escrow\n\n\
         Game on! 🔥",
        title = escape_markdown(title),
        opponent = escape_markdown(opponent),
        stake = format_amount(stake),
        pool = format_amount(stake * 2),
    )
}

pub fn challenge_declined(title: &str, opponent: &str, refund: i64) -> String {
    format!(
        "❌ *Challenge Declined*\n\n\
         {RULE}\n🎯 *{title}*\n{RULE}\n\n\
         {opponent} declined your challenge.\n\
         💰 {refund} has been returned to your wallet.",
        title = escape_markdown(title),
        opponent = escape_markdown(opponent),
        refund = format_amount(refund),
    )
}

pub fn challenge_cancelled(title: &str, challenger: &str) -> String {
    format!(
        "🚫 *Challenge Cancelled*\n\n\
         {RULE}\n🎯 *{title}*\n{RULE}\n\n\
         {challenger} withdrew this challenge.",
        title = escape_markdown(title),
        challenger = escape_markdown(challenger),
    )
}

pub fn challenge_expired(title: &str, refund: i64) -> String {
    format!(
        "⌛ *Challenge Expired*\n\n\
         {RULE}\n🎯 *{title}*\n{RULE}\n\n\
         Nobody accepted in time.\n\
         💰 {refund} has been returned to your wallet.",
        title = escape_markdown(title),
        refund = format_amount(refund),
    )
}

pub fn challenge_result(title: &str, outcome: ChallengeOutcome, payout: i64) -> String {
    let title = escape_markdown(title);
    match outcome {
        ChallengeOutcome::Won => format!(
            "🏆 *You Won!*\n\n\
             {RULE}\n🎯 *{title}*\n{RULE}\n\n\
             🎉 Congratulations!\n\
             💰 Winnings: {payout}\n\n\
             Keep the winning streak going! 🔥",
            payout = format_amount(payout),
        ),
        ChallengeOutcome::Lost => format!(
            "😔 *Challenge Lost*\n\n\
             {RULE}\n🎯 *{title}*\n{RULE}\n\n\
             Better luck next time!\n\
             💡 Create a new challenge to win it back!"
        ),
        ChallengeOutcome::Draw => format!(
            "🤝 *It's a Draw!*\n\n\
             {RULE}\n🎯 *{title}*\n{RULE}\n\n\
             💰 Your stake of {payout} has been returned.",
            payout = format_amount(payout),
        ),
    }
}

pub fn event_ending_soon(title: &str, end_date: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let left = time_left(end_date, now).unwrap_or_else(|| "less than an hour".to_string());
    format!(
        "⏰ *Event Ending Soon*\n\n\
         {RULE}\n🎯 *{title}*\n{RULE}\n\n\
         Only {left} left before predictions close!",
        title = escape_markdown(title),
    )
}

pub fn event_closed(title: &str) -> String {
    format!(
        "🔒 *Event Closed*\n\n\
         {RULE}\n🎯 *{title}*\n{RULE}\n\n\
         Predictions are closed. Results will be announced soon!",
        title = escape_markdown(title),
    )
}

pub fn event_result(
    title: &str,
    outcome: Prediction,
    won: bool,
    refunded: bool,
    payout: i64,
) -> String {
    let headline = if refunded {
        format!("↩️ Nobody picked the winning side. {} refunded.", format_amount(payout))
    } else if won {
        format!("🎉 You predicted right! Winnings: {}", format_amount(payout))
    } else {
        "😔 Your prediction missed this time.".to_string()
    };
    format!(
        "📢 *Event Resolved*\n\n\
         {RULE}\n🎯 *{title}*\n{RULE}\n\n\
         ✅ Outcome: *{outcome}*\n\
         {headline}",
        title = escape_markdown(title),
        outcome = outcome.as_ref().to_uppercase(),
    )
}

pub fn event_cancelled(title: &str, refund: i64) -> String {
    format!(
        "🚫 *Event Cancelled*\n\n\
         {RULE}\n🎯 *{title}*\n{RULE}\n\n\
         💰 Your stake of {refund} has been returned.",
        title = escape_markdown(title),
        refund = format_amount(refund),
    )
}

pub fn payment_received(amount: i64, new_balance: i64) -> String {
    format!(
        "💰 *Payment Received!*\n\n\
         {RULE}\n\n\
         ✅ {amount} added to your wallet!\n\
         💵 New Balance: {balance}\n\n\
         Ready to place some bets? 🎯",
        amount = format_amount(amount),
        balance = format_amount(new_balance),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0), "₦0");
        assert_eq!(format_amount(999), "₦999");
        assert_eq!(format_amount(1000), "₦1,000");
        assert_eq!(format_amount(1234567), "₦1,234,567");
        assert_eq!(format_amount(-2500), "-₦2,500");
        assert_eq!(format_amount(i64::MIN), "-₦9,223,372,036,854,775,808");
    }

    #[test]
    fn test_category_emoji() {
        assert_eq!(category_emoji("Crypto", EVENT_EMOJI), "₿");
        assert_eq!(category_emoji("skill", CHALLENGE_EMOJI), "🧠");
        assert_eq!(category_emoji("cooking", EVENT_EMOJI), "🎯");
        assert_eq!(category_emoji("cooking", CHALLENGE_EMOJI), "⚔️");
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("a_b*c`d[e]"), "a\\_b\\*c\\`d\\[e]");
        assert_eq!(escape_markdown("plain"), "plain");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(Some("ada"), "Ada"), "@ada");
        assert_eq!(display_name(Some("@ada"), "Ada"), "@ada");
        assert_eq!(display_name(None, "Ada"), "Ada");
        assert_eq!(display_name(Some(""), "Ada"), "Ada");
    }

    #[test]
    fn test_time_left() {
        let now = Utc::now();
        assert_eq!(
            time_left(now + Duration::hours(53) + Duration::minutes(5), now).as_deref(),
            Some("2d 5h")
        );
        assert_eq!(
            time_left(now + Duration::hours(7) + Duration::minutes(5), now).as_deref(),
            Some("7h")
        );
        assert_eq!(time_left(now + Duration::minutes(30), now), None);
    }

    #[test]
    fn test_leaderboard_broadcast_change_text() {
        let climbed = leaderboard_broadcast("@ada", 1, Some(4), 10, 50_000, Some("Reached #1"));
        assert!(climbed.contains("🥇"));
        assert!(climbed.contains("climbed from #4 to #1"));
        assert!(climbed.contains("Reached #1"));

        let entered = leaderboard_broadcast("@bob", 7, None, 1, 200, None);
        assert!(entered.contains("entered the leaderboard at #7"));
        assert!(!entered.contains("Achievement"));
    }

    #[test]
    fn test_insufficient_funds_shows_shortfall() {
        let text = insufficient_funds(5000, 1200);
        assert!(text.contains("₦1,200"));
        assert!(text.contains("₦5,000"));
        assert!(text.contains("*Shortfall:* ₦3,800"));
    }

    #[test]
    fn test_user_text_is_escaped_in_templates() {
        let text = challenge_created("who_wins*", "@al_ice", "@bob", 1000);
        assert!(text.contains("who\\_wins\\*"));
        assert!(text.contains("@al\\_ice"));
    }

    #[test]
    fn test_my_challenges_empty() {
        assert_eq!(my_challenges(&[]), "📋 You have no active challenges");
    }
}
