//! Prompt text for the daily message and quick replies.

use chrono::{DateTime, FixedOffset};
use rand::Rng;
use rand::seq::SliceRandom;

use lovenote_types::models::{Memory, Message, Reaction};

pub const WEATHER_TOPIC: &str = "thời tiết hôm nay";

/// Topics the daily message may touch besides the weather.
pub const EXTRA_TOPICS: &[&str] = &[
    "một lời nhắc uống đủ nước",
    "một mẹo nhỏ cho công việc",
    "một món ăn gợi ý cho bữa trưa",
    "một bài hát nên nghe hôm nay",
    "một câu danh ngôn ngắn",
    "một lời nhắc vận động nhẹ",
    "cung hoàng đạo hôm nay",
    "một sự thật thú vị",
    "một gợi ý thư giãn buổi tối",
    "một lời động viên cho ngày mới",
];

/// Style hints for quick replies, picked per request for variety.
pub const QUICK_REPLY_STYLES: &[&str] = &[
    "vui vẻ, dí dỏm",
    "ngắn gọn, ấm áp",
    "tinh nghịch, dùng một emoji",
    "nhẹ nhàng, quan tâm",
    "hài hước kiểu bạn thân",
];

pub const DAILY_SYSTEM_PROMPT: &str = "Bạn viết một lời nhắn ngắn bằng tiếng Việt gửi cho một người bạn thân \
mỗi buổi sáng. Giọng văn tự nhiên, ấm áp, tối đa 4 câu. \
TUYỆT ĐỐI KHÔNG dùng từ ngữ lãng mạn như \"yêu\", \"thương\", \"anh yêu\", \"em yêu\", \"người yêu\", \"nhớ em\", \"hôn\". \
Chỉ trả về nội dung lời nhắn, không giải thích.";

pub const QUICK_REPLY_SYSTEM_PROMPT: &str = "Bạn gợi ý câu trả lời nhanh bằng tiếng Việt cho một tin nhắn. \
Trả về đúng 3 câu, mỗi câu một dòng, mỗi câu dưới 80 ký tự, không đánh số.";

/// Weather plus three or four other topics, in random order.
pub fn select_topics<R: Rng + ?Sized>(rng: &mut R) -> Vec<&'static str> {
    let mut extra = EXTRA_TOPICS.to_vec();
    extra.shuffle(rng);
    extra.truncate(rng.random_range(3..=4));

    let mut topics = Vec::with_capacity(extra.len() + 1);
    topics.push(WEATHER_TOPIC);
    topics.extend(extra);
    topics
}

pub struct DailyPromptInput<'a> {
    pub now: DateTime<FixedOffset>,
    pub topics: &'a [&'static str],
    pub city: Option<&'a str>,
    pub horoscope: Option<&'a str>,
    pub reactions: &'a [Reaction],
    pub messages: &'a [Message],
    pub memories: &'a [Memory],
}

/// How many recent items of each kind are quoted back to the model.
const RECENT_LIMIT: usize = 5;

pub fn build_daily_prompt(input: &DailyPromptInput<'_>) -> String {
    let mut prompt = format!(
        "Hôm nay là {}, bây giờ là {}.\n",
        input.now.format("%d/%m/%Y"),
        input.now.format("%H:%M")
    );

    if let Some(city) = input.city {
        prompt.push_str(&format!("Thành phố: {}.\n", city));
    }
    if let Some(horoscope) = input.horoscope {
        prompt.push_str(&format!("Cung hoàng đạo: {}.\n", horoscope));
    }

    prompt.push_str("Hãy lồng ghép các chủ đề sau:\n");
    for topic in input.topics {
        prompt.push_str(&format!("- {}\n", topic));
    }

    prompt.push_str("\nHoạt động gần đây:\n");
    if input.reactions.is_empty() && input.messages.is_empty() && input.memories.is_empty() {
        prompt.push_str("- Chưa có hoạt động nào.\n");
    }
    if !input.reactions.is_empty() {
        let emojis: Vec<&str> = input
            .reactions
            .iter()
            .take(RECENT_LIMIT)
            .map(|r| r.emoji.as_str())
            .collect();
        prompt.push_str(&format!("- Cảm xúc đã gửi: {}\n", emojis.join(" ")));
    }
    for message in input.messages.iter().take(RECENT_LIMIT) {
        prompt.push_str(&format!("- Tin nhắn: \"{}\"\n", message.content));
    }
    if !input.memories.is_empty() {
        prompt.push_str(&format!("- Đã bấm nút nhớ {} lần\n", input.memories.len()));
    }

    prompt.push_str("\nKhông dùng bất kỳ từ ngữ lãng mạn nào.");
    prompt
}

pub fn build_quick_reply_prompt(message: &str, context: Option<&str>, style: &str) -> String {
    let mut prompt = format!("Tin nhắn nhận được: \"{}\"\n", message);
    if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
        prompt.push_str(&format!("Ngữ cảnh: {}\n", context));
    }
    prompt.push_str(&format!("Phong cách trả lời: {}\n", style));
    prompt
}
