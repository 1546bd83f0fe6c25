//! Prompt assembly and the grounding protocol.
//!
//! Turns retrieved evidence, conversation history and the new question into
//! one structured multi-turn generation request, in a fixed order: system
//! instruction with the grounding rules and the formatted context, a system
//! header introducing the history, the history turns themselves, and the
//! user question. When retrieval comes back empty the context is replaced
//! by a fixed fallback sentence so the model states that the knowledge base
//! cannot answer instead of hallucinating.

use crate::history::{ChatTurn, TurnRole};
use handlebars::Handlebars;
use ragdesk_core::{AppError, AppResult};
use ragdesk_knowledge::ScoredChunk;
use ragdesk_llm::{ChatMessage, ChatRequest};
use serde_json::json;

/// System instruction: the four grounding rules plus the reference
/// material, rendered with the `context` variable.
const SYSTEM_TEMPLATE: &str = "你是一个严格基于知识库内容回答问题的AI助手。你必须遵守以下规则：\n\
1. 严格基于我提供的参考资料回答问题，不要编造任何内容\n\
2. 如果参考资料中没有相关信息，请明确说明'根据现有资料无法回答此问题'\n\
3. 不要添加参考资料以外的推测或假设\n\
4. 回答应简洁专业，直接引用相关资料内容\n\
参考资料:{{context}}";

/// Header introducing the history turns.
const HISTORY_HEADER: &str = "用户的对话历史记录如下：";

/// User message template, rendered with the `question` variable.
const QUESTION_TEMPLATE: &str = "请严格基于上述参考资料回答我的问题:{{question}}";

/// Substituted for the context when retrieval returned no chunks.
pub const NO_CONTEXT_FALLBACK: &str =
    "未找到相关参考资料。请明确告知用户：根据现有知识库内容无法回答此问题，建议提供更多相关信息或询问其他问题。";

/// Assembles generation requests from evidence, history and the question.
pub struct PromptAssembler {
    handlebars: Handlebars<'static>,
    chat_model: String,
}

impl PromptAssembler {
    pub fn new(chat_model: impl Into<String>) -> AppResult<Self> {
        let mut handlebars = Handlebars::new();

        // Plain text prompts, no HTML escaping
        handlebars.register_escape_fn(handlebars::no_escape);

        handlebars
            .register_template_string("system", SYSTEM_TEMPLATE)
            .map_err(|e| AppError::Other(format!("Failed to register system template: {}", e)))?;
        handlebars
            .register_template_string("question", QUESTION_TEMPLATE)
            .map_err(|e| AppError::Other(format!("Failed to register question template: {}", e)))?;

        Ok(Self {
            handlebars,
            chat_model: chat_model.into(),
        })
    }

    /// Format retrieved chunks into the context block: content followed by
    /// metadata, one chunk per paragraph.
    pub fn format_context(&self, chunks: &[ScoredChunk]) -> String {
        if chunks.is_empty() {
            return NO_CONTEXT_FALLBACK.to_string();
        }

        chunks
            .iter()
            .map(|scored| {
                let metadata = json!({
                    "source": scored.chunk.metadata.source,
                    "create_time": scored
                        .chunk
                        .metadata
                        .created_at
                        .format("%Y-%m-%d %H:%M:%S")
                        .to_string(),
                    "operator": scored.chunk.metadata.operator,
                });
                format!("文档片段: {}\n文档元数据: {}", scored.chunk.text, metadata)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Assemble the full generation request.
    ///
    /// Message order is fixed: grounding rules + context, history header,
    /// history turns, new question.
    pub fn build_request(
        &self,
        question: &str,
        history: &[ChatTurn],
        chunks: &[ScoredChunk],
    ) -> AppResult<ChatRequest> {
        let context = self.format_context(chunks);

        let system = self
            .handlebars
            .render("system", &json!({ "context": context }))
            .map_err(|e| AppError::Other(format!("Failed to render system prompt: {}", e)))?;

        let user = self
            .handlebars
            .render("question", &json!({ "question": question }))
            .map_err(|e| AppError::Other(format!("Failed to render question: {}", e)))?;

        let mut messages = Vec::with_capacity(history.len() + 3);
        messages.push(ChatMessage::system(system));
        messages.push(ChatMessage::system(HISTORY_HEADER));

        for turn in history {
            messages.push(match turn.role {
                TurnRole::User => ChatMessage::user(turn.content.clone()),
                TurnRole::Assistant => ChatMessage::assistant(turn.content.clone()),
            });
        }

        messages.push(ChatMessage::user(user));

        Ok(ChatRequest::new(messages, self.chat_model.clone()))
    }
}
