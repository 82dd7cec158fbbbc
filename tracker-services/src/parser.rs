//! Call message parsing
//!
//! Calls are posted as free text, one field per line, in the format used by
//! the signal channels we follow:
//!
//! ```text
//! 🤑 最新看涨预测 | #SOLANA 🤑
//! ✅ 代币：The Claudinator
//! 📍 代币符号：$HAL9000
//! 🏦 市值：26.58K
//! 🏷 合约：A3XLb1tbaaPgkJijSCEmR6GhUM1ZBCyc59s2evXtUx5x
//! ```
//!
//! English field markers are accepted as well. A message without a contract
//! address is not a call.

use tracker_core::{Chain, ParsedSignal};

const SYMBOL_MARKERS: &[&str] = &["代币符号：", "Symbol:"];
const NAME_MARKERS: &[&str] = &["代币：", "Token:"];
const MARKET_CAP_MARKERS: &[&str] = &["市值：", "MC:"];
const ADDRESS_MARKERS: &[&str] = &["合约：", "CA:"];

/// Text after the first marker found in `line`, trimmed
fn field<'a>(line: &'a str, markers: &[&str]) -> Option<&'a str> {
    markers
        .iter()
        .find_map(|marker| line.split_once(marker).map(|(_, rest)| rest.trim()))
}

/// Extract call fields from a message
pub fn parse_message(text: &str) -> Option<ParsedSignal> {
    let mut chain = Chain::Sol;
    let mut name = None;
    let mut symbol = None;
    let mut market_cap = None;
    let mut address = None;

    for line in text.lines() {
        if line.contains("#SOLANA") {
            chain = Chain::Sol;
        }
        if line.contains("#BSC") {
            chain = Chain::Bsc;
        }

        if let Some(value) = field(line, SYMBOL_MARKERS) {
            symbol = Some(value.to_string());
        } else if let Some(value) = field(line, NAME_MARKERS) {
            name = Some(value.to_string());
        }

        if let Some(value) = field(line, MARKET_CAP_MARKERS) {
            market_cap = Some(parse_market_cap(value));
        }

        if let Some(value) = field(line, ADDRESS_MARKERS) {
            if let Some(token) = value.split_whitespace().next() {
                address = Some(token.to_string());
            }
        }
    }

    let address = address?;
    Some(ParsedSignal {
        contract_address: address,
        chain: Some(chain),
        symbol,
        name,
        market_cap,
        scope: None,
    })
}

/// `26.58K` -> 26580. Unparsable text yields 0.
pub fn parse_market_cap(text: &str) -> f64 {
    let cleaned: String = text
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();

    let number_len = cleaned
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit() || *c == '.')
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);

    let Ok(number) = cleaned[..number_len].parse::<f64>() else {
        return 0.0;
    };

    let multiplier = match cleaned[number_len..].trim_start().chars().next() {
        Some('K') | Some('k') => 1e3,
        Some('M') | Some('m') => 1e6,
        Some('B') | Some('b') => 1e9,
        _ => 1.0,
    };

    number * multiplier
}
