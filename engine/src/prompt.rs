//! Prompt construction: pure, deterministic, no I/O.

use zenreply_types::PresetRole;

/// Fully-resolved communication target for one prompt: a preset, or a
/// confirmed custom label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleTarget {
    Preset(PresetRole),
    Custom(String),
}

const EMPTY_RAW_PLACEHOLDER: &str = "（用户未提供原始情绪文本）";
const EMPTY_CONTEXT_PLACEHOLDER: &str = "（无额外背景）";

/// Relational strategy inferred for a custom role label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelationStrategy {
    /// Upward communication: the target holds power over the user.
    Authority,
    /// Close relationship: warmth before business.
    Intimate,
    /// Neutral peer fallback.
    Peer,
}

/// Ordered (keyword, strategy) pairs; first match wins.
///
/// Ambiguous labels that match more than one pattern resolve by declaration
/// order. That tie-breaking is intentional and must not be reordered without
/// product input.
const CUSTOM_ROLE_PATTERNS: &[(&str, RelationStrategy)] = &[
    ("老板", RelationStrategy::Authority),
    ("领导", RelationStrategy::Authority),
    ("上司", RelationStrategy::Authority),
    ("经理", RelationStrategy::Authority),
    ("甲方", RelationStrategy::Authority),
    ("导师", RelationStrategy::Authority),
    ("老师", RelationStrategy::Authority),
    ("教授", RelationStrategy::Authority),
    ("房东", RelationStrategy::Authority),
    ("老公", RelationStrategy::Intimate),
    ("老婆", RelationStrategy::Intimate),
    ("男友", RelationStrategy::Intimate),
    ("女友", RelationStrategy::Intimate),
    ("对象", RelationStrategy::Intimate),
    ("闺蜜", RelationStrategy::Intimate),
    ("兄弟", RelationStrategy::Intimate),
    ("妈", RelationStrategy::Intimate),
    ("爸", RelationStrategy::Intimate),
];

fn classify_custom_role(label: &str) -> RelationStrategy {
    CUSTOM_ROLE_PATTERNS
        .iter()
        .find(|(keyword, _)| label.contains(keyword))
        .map_or(RelationStrategy::Peer, |(_, strategy)| *strategy)
}

fn preset_instruction(role: PresetRole) -> &'static str {
    match role {
        PresetRole::Boss => {
            "对象是老板：表达要稳、短、准。先对齐目标，再给执行动作和时间节点，传递掌控感。"
        }
        PresetRole::Client => {
            "对象是甲方：表达要礼貌专业、重协同。避免对抗措辞，突出风险意识、方案路径和交付承诺。"
        }
        PresetRole::GreenTea => {
            "对象是绿茶：表达要自然克制，礼貌但保持边界。避免暧昧和情绪化，让文字看起来有分寸。"
        }
        PresetRole::PigTeammate => {
            "对象是猪队友：表达要坚定直接，不阴阳怪气。指出事实、影响和下一步动作，推进问题解决。"
        }
    }
}

fn strategy_instruction(strategy: RelationStrategy) -> &'static str {
    match strategy {
        RelationStrategy::Authority => {
            "对方处于强势位置：表达要稳、短、有分寸。先表态，再给方案和时间点，不卑不亢。"
        }
        RelationStrategy::Intimate => {
            "对方是亲近关系：表达要温和真诚，先照顾情绪，再说清楚想法，不要公事公办的腔调。"
        }
        RelationStrategy::Peer => {
            "对方是平级关系：表达要平和坦率，就事论事，明确诉求和下一步动作。"
        }
    }
}

fn role_instruction(target: &RoleTarget) -> String {
    match target {
        RoleTarget::Preset(role) => preset_instruction(*role).to_string(),
        RoleTarget::Custom(label) => {
            let strategy = classify_custom_role(label);
            format!("对象是{label}：{}", strategy_instruction(strategy))
        }
    }
}

/// Build the complete instruction string for the remote model.
///
/// Blank raw text and missing/blank context are replaced with explicit
/// placeholders rather than omitted, so the model always receives a complete
/// template. Identical inputs produce identical output.
#[must_use]
pub fn build_prompt(raw_text: &str, target: &RoleTarget, context_text: Option<&str>) -> String {
    let raw = raw_text.trim();
    let safe_raw = if raw.is_empty() {
        EMPTY_RAW_PLACEHOLDER
    } else {
        raw
    };
    let context = context_text.map(str::trim).unwrap_or_default();
    let safe_context = if context.is_empty() {
        EMPTY_CONTEXT_PLACEHOLDER
    } else {
        context
    };

    [
        "你是中国语境下的顶级沟通润色专家，擅长把情绪表达转化为高情商、可执行、可直接发送的回复。".to_string(),
        String::new(),
        "【绝对目标】".to_string(),
        "1) 过滤所有攻击性、粗口、抱怨和情绪化词汇。".to_string(),
        "2) 提炼用户真正诉求：对齐目标、澄清边界、争取资源、推进进度、维护关系。".to_string(),
        "3) 仅输出一段可直接发送的中文回复，不要解释过程，不要加前后缀。".to_string(),
        "4) 语言必须像真人，不要机器味，不要模板腔，不要官话。".to_string(),
        String::new(),
        "【风格硬约束】".to_string(),
        "- 语气：体面、克制、自然，有礼但不卑微。".to_string(),
        "- 结构：先接住对方，再给行动方案，最后给时间点或预期结果。".to_string(),
        "- 长度：60~140 字，最多两句，避免冗长。".to_string(),
        "- 禁止：说教、威胁、夸张承诺、英文夹杂、表情符号。".to_string(),
        String::new(),
        format!("【目标对象策略】{}", role_instruction(target)),
        String::new(),
        "【输入材料】".to_string(),
        format!("- 用户原始情绪文本：{safe_raw}"),
        format!("- 对方原话/背景补充：{safe_context}"),
        String::new(),
        "现在直接输出最终回复正文。".to_string(),
    ]
    .join("\n")
}
