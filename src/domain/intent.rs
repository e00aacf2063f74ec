//! Intent Classification - 关键词意图分类
//!
//! 无状态的子串扫描实现。生产环境应替换为真正的 NLU 服务，
//! 这里仅为 API 形状提供一个确定性的玩具实现。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 意图关键词模式表（日语）
///
/// 顺序即平分时的优先级
const INTENT_PATTERNS: &[(&str, &[&str])] = &[
    ("Greeting", &["こんにちは", "おはよう", "こんばんは", "はじめまして"]),
    ("Farewell", &["さようなら", "じゃあね", "また明日", "お疲れ様"]),
    ("Question", &["何", "どこ", "いつ", "だれ", "なぜ", "どうして", "か？", "ですか"]),
    ("Affirmation", &["はい", "そうです", "分かりました", "了解"]),
    ("Negation", &["いいえ", "ちがいます", "違います", "じゃない"]),
    ("Request", &["ください", "お願いします", "頂けますか", "欲しい"]),
    ("Opinion", &["思います", "考えます", "と思う", "だと思う"]),
];

/// 意图分析结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentAnalysis {
    pub query: String,
    pub top_intent: String,
    pub confidence: f64,
    /// 每个意图的匹配计数
    pub intents: BTreeMap<String, u32>,
    /// 实体抽取占位（本实现不抽取实体）
    pub entities: Vec<String>,
}

/// 从文本分类意图
///
/// 每个意图的得分 = 命中的关键词数量；
/// 全部为 0 时 top intent 为 "None"，置信度 0.1
pub fn classify_intent(text: &str) -> IntentAnalysis {
    let mut intents = BTreeMap::new();
    let mut top_intent = "None";
    let mut top_score = 0u32;

    for (intent, patterns) in INTENT_PATTERNS {
        let score = patterns.iter().filter(|p| text.contains(*p)).count() as u32;
        intents.insert(intent.to_string(), score);
        if score > top_score {
            top_intent = intent;
            top_score = score;
        }
    }

    let confidence = if top_score > 0 {
        (0.3 + f64::from(top_score) * 0.1).min(0.99)
    } else {
        0.1
    };

    IntentAnalysis {
        query: text.to_string(),
        top_intent: top_intent.to_string(),
        confidence,
        intents,
        entities: Vec::new(),
    }
}
