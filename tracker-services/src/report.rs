//! Chat message formatting
//!
//! All messages use Telegram's HTML parse mode, so any user-supplied text is
//! escaped before it is embedded.

use std::fmt::Write;
use tracker_core::{returns, Chain, MarketSnapshot, Signal};
use tracker_market::SecurityReport;

use crate::aggregation::{RankedSignal, SignalSummary, WIN_MULTIPLIER};
use crate::notifier::AlertEvent;
use crate::telegram::{InlineButton, InlineKeyboard};

/// Signals listed in the recent section of a summary message
const SUMMARY_RECENT_LINES: usize = 5;
/// Risks listed in a security section
const SECURITY_RISK_LINES: usize = 3;

/// `1234567.0` -> `1.23M`
pub fn format_number(value: f64) -> String {
    if value >= 1e9 {
        format!("{:.2}B", value / 1e9)
    } else if value >= 1e6 {
        format!("{:.2}M", value / 1e6)
    } else if value >= 1e3 {
        format!("{:.2}K", value / 1e3)
    } else {
        format!("{:.2}", value)
    }
}

/// Price with precision chosen by magnitude
pub fn format_price(price: f64) -> String {
    if price < 0.000001 {
        format!("{:.4e}", price)
    } else if price < 0.01 {
        format!("{:.8}", price)
    } else {
        format!("{:.6}", price)
    }
}

fn format_percent(percent: f64) -> String {
    if percent >= 0.0 {
        format!("+{:.2}%", percent)
    } else {
        format!("{:.2}%", percent)
    }
}

fn trend(change: f64) -> &'static str {
    if change >= 0.0 {
        "🟢"
    } else {
        "🔴"
    }
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Chart / trade / safety links for a token
pub fn signal_buttons(address: &str, chain: Chain) -> InlineKeyboard {
    let chart = InlineButton::url(
        "📈 Chart",
        format!("https://dexscreener.com/{}/{}", chain.dexscreener_id(), address),
    );

    match chain {
        Chain::Sol => vec![
            vec![
                chart,
                InlineButton::url("💰 Buy", format!("https://jup.ag/swap/USDC-{}", address)),
            ],
            vec![
                InlineButton::url(
                    "🔍 BullX",
                    format!(
                        "https://bullx.io/terminal?chainId=1399811149&address={}",
                        address
                    ),
                ),
                InlineButton::url("🛡️ Check", format!("https://rugcheck.xyz/tokens/{}", address)),
            ],
        ],
        Chain::Bsc => vec![vec![
            chart,
            InlineButton::url(
                "💰 Buy",
                format!("https://pancakeswap.finance/swap?outputCurrency={}", address),
            ),
        ]],
    }
}

/// Reply to a newly admitted signal
pub fn admission_message(
    signal: &Signal,
    snapshot: Option<&MarketSnapshot>,
    security: Option<&SecurityReport>,
) -> String {
    let mut message = String::new();
    let _ = writeln!(
        message,
        "🚀 <b>{}</b> {}",
        escape_html(&signal.name),
        escape_html(&signal.symbol)
    );
    let _ = writeln!(message, "⛓ {}", signal.chain.display_name());
    let _ = writeln!(message, "🔗 <code>{}</code>\n", signal.contract_address);
    let _ = writeln!(
        message,
        "🏦 <b>Called at:</b> ${}",
        format_number(signal.market_cap_at_call)
    );

    if let Some(snapshot) = snapshot {
        let _ = writeln!(message, "💵 <b>Price:</b> ${}", format_price(snapshot.price));
        if let Some(r) = returns::for_snapshot(signal.market_cap_at_call, snapshot) {
            let _ = writeln!(
                message,
                "📊 <b>Return:</b> {:.2}x ({})",
                r.multiplier,
                format_percent(r.percent)
            );
        }

        let change = &snapshot.price_change;
        message.push_str("\n📈 <b>Price change:</b>\n");
        for (label, value) in [
            ("5m", change.m5),
            ("1h", change.h1),
            ("6h", change.h6),
            ("24h", change.h24),
        ] {
            let _ = writeln!(message, "  {}: {} {:.2}%", label, trend(value), value);
        }

        let _ = writeln!(message, "\n💧 <b>Liquidity:</b> ${}", format_number(snapshot.liquidity));
        let _ = writeln!(message, "📊 <b>24h volume:</b> ${}", format_number(snapshot.volume_24h));
        let _ = writeln!(message, "🏦 <b>Market cap:</b> ${}", format_number(snapshot.market_cap));
    }

    if let Some(security) = security {
        message.push('\n');
        message.push_str(&security_section(security));
    }

    message.push_str("\n⏱ Tracking started");
    message
}

/// Short notice for a contract address that is already tracked
pub fn duplicate_message(signal: &Signal) -> String {
    format!(
        "ℹ️ {} is already tracked\n🔗 <code>{}</code>",
        escape_html(&signal.symbol),
        signal.contract_address
    )
}

pub fn security_section(report: &SecurityReport) -> String {
    let emoji = if report.score < 50.0 {
        "🔴"
    } else if report.score < 80.0 {
        "🟡"
    } else {
        "🟢"
    };

    let mut section = format!("{} <b>Safety score:</b> {:.0}/100\n", emoji, report.score);

    match &report.mint_authority {
        Some(authority) => {
            let _ = writeln!(section, "⚠️ Mint authority: {}", short(authority));
        }
        None => section.push_str("✅ Mint authority: revoked\n"),
    }
    match &report.freeze_authority {
        Some(authority) => {
            let _ = writeln!(section, "⚠️ Freeze authority: {}", short(authority));
        }
        None => section.push_str("✅ Freeze authority: revoked\n"),
    }

    if report.lp_burned {
        section.push_str("✅ LP burned\n");
    } else if report.lp_locked {
        section.push_str("🔒 LP locked\n");
    }

    if report.top10_holder_pct > 0.0 {
        let _ = writeln!(section, "👥 Top 10 holders: {:.2}%", report.top10_holder_pct);
    }

    if !report.risks.is_empty() {
        section.push_str("\n⚠️ Risks:\n");
        for risk in report.risks.iter().take(SECURITY_RISK_LINES) {
            let _ = writeln!(section, "  • {}", escape_html(risk));
        }
    }

    section
}

fn short(text: &str) -> String {
    let head: String = text.chars().take(8).collect();
    format!("{}...", head)
}

/// Threshold-crossing notification
pub fn alert_message(event: &AlertEvent) -> String {
    let percent = (event.current_multiplier - 1.0) * 100.0;
    format!(
        "🎯 <b>{}</b> hit {}x!\n\n\
         Price: ${}\n\
         Market cap: ${}\n\
         Return: {:.2}x ({})\n\n\
         🔗 <code>{}</code>",
        escape_html(&event.symbol),
        event.threshold,
        format_price(event.current_price),
        format_number(event.current_value),
        event.current_multiplier,
        format_percent(percent),
        event.contract_address
    )
}

pub fn summary_message(summary: &SignalSummary, final_label: &str) -> String {
    let mut message = format!("📊 <b>Call stats ({})</b>\n\n", summary.timeframe);

    let _ = writeln!(message, "📈 Total calls: {}", summary.total_calls);
    let _ = writeln!(message, "✅ Completed: {}", summary.completed_count);
    let _ = writeln!(
        message,
        "🎯 Win rate ({}x+): {:.1}%",
        WIN_MULTIPLIER, summary.win_rate
    );
    let _ = writeln!(message, "📊 Avg return: {:.2}x\n", summary.avg_return);

    if let Some(best) = &summary.best_call {
        let _ = writeln!(
            message,
            "🏆 <b>Best call:</b>\n  {} {:.2}x\n",
            escape_html(&best.symbol),
            best.return_multiplier
        );
    }

    if !summary.recent_signals.is_empty() {
        message.push_str("📋 <b>Recent calls:</b>\n");
        for signal in summary.recent_signals.iter().take(SUMMARY_RECENT_LINES) {
            let multiplier = signal
                .milestone(final_label)
                .map(|m| m.return_multiplier)
                .unwrap_or(0.0);
            let _ = writeln!(
                message,
                "  {} {} {}",
                result_emoji(multiplier),
                escape_html(&signal.symbol),
                describe_multiplier(multiplier)
            );
        }
    }

    message
}

pub fn hot_signals_message(ranked: &[RankedSignal]) -> String {
    let mut message = String::from("🔥 <b>Hot calls (by return)</b>\n\n");

    if ranked.is_empty() {
        message.push_str("No calls yet");
        return message;
    }

    for entry in ranked {
        let medal = match entry.rank {
            1 => "🥇".to_string(),
            2 => "🥈".to_string(),
            3 => "🥉".to_string(),
            n => format!("{}.", n),
        };
        let _ = writeln!(
            message,
            "{} {} {}",
            medal,
            escape_html(&entry.symbol),
            describe_multiplier(entry.return_multiplier.unwrap_or(0.0))
        );
    }

    message
}

pub fn help_message() -> String {
    "🚀 <b>Signal Call Tracker</b>\n\n\
     Post a call with a contract address and it is tracked for 24 hours.\n\n\
     /stats [24h|7d|30d] - call stats for this chat\n\
     /hot - best calls of this chat"
        .to_string()
}

fn result_emoji(multiplier: f64) -> &'static str {
    if multiplier >= WIN_MULTIPLIER {
        "🟢"
    } else if multiplier >= 1.0 {
        "⚪"
    } else {
        "🔴"
    }
}

fn describe_multiplier(multiplier: f64) -> String {
    if multiplier > 0.0 {
        format!("{:.2}x", multiplier)
    } else {
        "monitoring".to_string()
    }
}
