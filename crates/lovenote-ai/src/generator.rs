use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{info, warn};

use lovenote_types::models::{Memory, Message, Reaction};

use crate::model::TextModel;
use crate::prompt::{
    DAILY_SYSTEM_PROMPT, DailyPromptInput, QUICK_REPLY_STYLES, QUICK_REPLY_SYSTEM_PROMPT,
    build_daily_prompt, build_quick_reply_prompt, select_topics,
};

pub const FALLBACK_DAILY_MESSAGE: &str =
    "Chào buổi sáng! Chúc bạn một ngày thật nhiều năng lượng, nhớ ăn sáng đầy đủ và uống nhiều nước nhé ☀️";

pub const FALLBACK_QUICK_REPLIES: [&str; 3] = [
    "Cảm ơn nha 😊",
    "Hôm nay của bạn thế nào?",
    "Chúc bạn một ngày vui vẻ!",
];

const BASE_EMOTION: u8 = 50;
const MAX_REPLY_CHARS: usize = 80;
const MAX_REPLIES: usize = 3;

/// Emojis that count toward the emotion score.
const POSITIVE_EMOJIS: &[&str] = &[
    "❤️", "🥰", "😍", "😘", "💕", "💖", "💗", "😊", "🤗", "😄", "😂", "👍", "🌸", "✨",
];

/// Recent activity, newest first.
#[derive(Debug, Clone, Default)]
pub struct InteractionHistory {
    pub reactions: Vec<Reaction>,
    pub messages: Vec<Message>,
    pub memories: Vec<Memory>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedMessage {
    pub content: String,
    pub emotion_level: u8,
}

impl GeneratedMessage {
    pub fn fallback() -> Self {
        Self {
            content: FALLBACK_DAILY_MESSAGE.to_string(),
            emotion_level: BASE_EMOTION,
        }
    }
}

/// Cosmetic 0-100 score from the last 24h of activity.
pub fn emotion_level(history: &InteractionHistory, now: DateTime<Utc>) -> u8 {
    let since = now - Duration::hours(24);

    let positive = history
        .reactions
        .iter()
        .filter(|r| r.created_at >= since && POSITIVE_EMOJIS.contains(&r.emoji.as_str()))
        .count();
    let reaction_bonus = (positive.min(3) * 10) as u8;

    let message_bonus = if history.messages.iter().any(|m| m.created_at >= since) {
        15
    } else {
        0
    };

    (BASE_EMOTION + reaction_bonus + message_bonus).min(100)
}

pub struct DailyMessageGenerator {
    model: Arc<dyn TextModel>,
    local_offset: FixedOffset,
}

impl DailyMessageGenerator {
    pub fn new(model: Arc<dyn TextModel>, local_offset: FixedOffset) -> Self {
        Self { model, local_offset }
    }

    /// Never fails: model errors collapse to the fallback message.
    pub async fn generate_daily_message(
        &self,
        history: &InteractionHistory,
        city: Option<&str>,
        horoscope: Option<&str>,
    ) -> GeneratedMessage {
        self.generate_daily_message_at(history, city, horoscope, Utc::now()).await
    }

    pub async fn generate_daily_message_at(
        &self,
        history: &InteractionHistory,
        city: Option<&str>,
        horoscope: Option<&str>,
        now: DateTime<Utc>,
    ) -> GeneratedMessage {
        let topics = select_topics(&mut rand::rng());
        let prompt = build_daily_prompt(&DailyPromptInput {
            now: now.with_timezone(&self.local_offset),
            topics: &topics,
            city,
            horoscope,
            reactions: &history.reactions,
            messages: &history.messages,
            memories: &history.memories,
        });

        match self.model.generate(DAILY_SYSTEM_PROMPT, &prompt).await {
            Ok(text) => {
                let content = clean_line(&text);
                if content.is_empty() {
                    warn!("Daily message came back empty, using fallback");
                    return GeneratedMessage::fallback();
                }
                let level = emotion_level(history, now);
                info!("Generated daily message ({} chars, emotion {})", content.chars().count(), level);
                GeneratedMessage {
                    content,
                    emotion_level: level,
                }
            }
            Err(e) => {
                warn!("Daily message generation failed, using fallback: {}", e);
                GeneratedMessage::fallback()
            }
        }
    }

    /// Up to three short replies. `seed` pins the style choice.
    pub async fn generate_quick_replies(
        &self,
        message: &str,
        context: Option<&str>,
        seed: Option<u64>,
    ) -> Vec<String> {
        let seed = seed.unwrap_or_else(|| rand::rng().random());
        let mut rng = StdRng::seed_from_u64(seed);
        let style = QUICK_REPLY_STYLES
            .choose(&mut rng)
            .copied()
            .unwrap_or(QUICK_REPLY_STYLES[0]);
        let prompt = build_quick_reply_prompt(message, context, style);

        let replies = match self.model.generate(QUICK_REPLY_SYSTEM_PROMPT, &prompt).await {
            Ok(text) => parse_quick_replies(&text),
            Err(e) => {
                warn!("Quick reply generation failed: {}", e);
                Vec::new()
            }
        };

        if replies.is_empty() {
            return fallback_quick_replies();
        }
        replies
    }
}

pub fn fallback_quick_replies() -> Vec<String> {
    FALLBACK_QUICK_REPLIES.iter().map(|s| s.to_string()).collect()
}

/// Trim a model line: list markers, numbering and wrapping quotes go.
fn clean_line(line: &str) -> String {
    let mut s = line.trim();
    s = s.trim_start_matches(['-', '*', '•']).trim_start();

    let digits = s.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &s[digits..];
        if let Some(stripped) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            s = stripped.trim_start();
        }
    }

    s.trim_matches(['"', '“', '”', '\'']).trim().to_string()
}

pub fn parse_quick_replies(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.lines()
        .map(clean_line)
        .filter(|line| !line.is_empty() && line.chars().count() <= MAX_REPLY_CHARS)
        .filter(|line| seen.insert(line.clone()))
        .take(MAX_REPLIES)
        .collect()
}
