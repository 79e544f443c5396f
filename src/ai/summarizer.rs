//! Bilingual headlines, summaries and importance scores per article

use crate::ai::{extract_json, AIResult, LlmClient};
use crate::database::{Article, ArticleSummary, NewsDatabase};
use crate::html::{take_chars, truncate_chars};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const SUMMARIZE_SYSTEM_PROMPT: &str = r#"你是一个AI行业资讯编辑。你的任务是：

1. **生成中文标题**（15-30字）：提炼新闻核心信息，写一个有信息量的中文标题。
   - 好标题示例："Anthropic发布Claude 3.5 Sonnet，编程能力超越GPT-4o"
   - 好标题示例："Meta开源Llama 3.1 405B，首个可商用千亿参数模型"
   - 坏标题（太泛）："一个新的AI模型"

2. **生成英文标题**（concise, 8-15 words）：Same news summarized as an English headline.
   - Good: "Anthropic Launches Claude 3.5 Sonnet, Outperforming GPT-4o in Coding"
   - Good: "Meta Open-Sources Llama 3.1 405B, First Commercial Trillion-Param Model"
   - Bad (too vague): "A new AI model"

3. **生成中文摘要**（1-2句话）：补充标题没有覆盖的关键信息。

4. **生成英文摘要**（1-2 sentences）：Key information not covered by the English title.

5. **评估重要性**（1-5分）：
   - 5分：重大突破（新旗舰模型、行业变革性事件）
   - 4分：重要进展（知名厂商更新、重要论文、显著技术进步）
   - 3分：值得关注（有趣的开源项目、热门讨论）
   - 2分：一般信息（常规更新、小改进）
   - 1分：低价值（重复内容、低相关性）

请严格以JSON格式返回，不要有其他内容：
{"title": "中文标题", "title_en": "English Title", "summary": "中文摘要", "summary_en": "English summary", "score": 4}
"#;

const SUMMARIZE_TEMPERATURE: f32 = 0.2;
const SUMMARIZE_MAX_TOKENS: u32 = 800;
const CONTENT_LIMIT: usize = 1500;
const DEFAULT_SCORE: f64 = 3.0;

pub struct Summarizer {
    llm: Arc<LlmClient>,
    db: Arc<NewsDatabase>,
    /// Pause between two articles
    pause: Duration,
}

impl Summarizer {
    pub fn new(llm: Arc<LlmClient>, db: Arc<NewsDatabase>) -> Self {
        Self {
            llm,
            db,
            pause: Duration::from_secs(1),
        }
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Ask the LLM for headlines, summaries and a score for one article
    pub async fn summarize_article(&self, article: &Article) -> AIResult<ArticleSummary> {
        let prompt = build_prompt(article);
        let model = self.llm.config().summarize_model.clone();
        let reply = self
            .llm
            .call(
                &prompt,
                Some(SUMMARIZE_SYSTEM_PROMPT),
                Some(&model),
                Some(SUMMARIZE_TEMPERATURE),
                Some(SUMMARIZE_MAX_TOKENS),
            )
            .await?;
        parse_summary(&reply)
    }

    /// Summarize up to `batch_size` articles that have no summary yet.
    /// Returns how many were updated; failed articles stay pending.
    pub async fn summarize_unsummarized(&self, batch_size: i64) -> AIResult<usize> {
        let articles = self.db.unsummarized(batch_size).await?;
        let mut count = 0;

        for (i, article) in articles.iter().enumerate() {
            if i > 0 && !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }

            match self.summarize_article(article).await {
                Ok(summary) => {
                    self.db.apply_summary(article.id, &summary).await?;
                    count += 1;
                    debug!(
                        "Summarized article {}: score={}, title={}",
                        article.id,
                        summary.importance_score,
                        take_chars(&summary.ai_title, 40)
                    );
                }
                Err(e) => warn!("Skip summarizing article {}: {}", article.id, e),
            }
        }

        info!("Summarized {}/{} articles", count, articles.len());
        Ok(count)
    }
}

fn build_prompt(article: &Article) -> String {
    let content = truncate_chars(article.content.as_deref().unwrap_or(""), CONTENT_LIMIT);
    format!(
        "来源: {}\n原始标题: {}\n内容: {}\n链接: {}\n",
        article.source,
        article.title,
        content,
        article.url.as_deref().unwrap_or("")
    )
}

fn parse_summary(reply: &str) -> AIResult<ArticleSummary> {
    let data: Value = serde_json::from_str(extract_json(reply))?;
    let text = |key: &str| {
        data.get(key)
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string()
    };

    let score = match data.get("score") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|s| s.is_finite())
    .unwrap_or(DEFAULT_SCORE)
    .clamp(1.0, 5.0);

    Ok(ArticleSummary {
        ai_title: text("title"),
        ai_title_en: text("title_en"),
        summary: text("summary"),
        summary_en: text("summary_en"),
        importance_score: score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::ScriptedProvider;
    use crate::ai::AIError;
    use crate::config::LlmConfig;
    use crate::database::NewArticle;

    fn client(provider: Arc<ScriptedProvider>) -> Arc<LlmClient> {
        let config = LlmConfig {
            min_interval_secs: 0.0,
            max_retries: 1,
            summarize_model: "summary-model".to_string(),
            ..LlmConfig::default()
        };
        Arc::new(LlmClient::new(provider, config))
    }

    #[test]
    fn test_parse_summary_clamps_score() {
        let summary = parse_summary(
            r#"{"title": "标题", "title_en": "Title", "summary": "摘要", "summary_en": "Summary", "score": 9}"#,
        )
        .unwrap();
        assert_eq!(summary.ai_title, "标题");
        assert_eq!(summary.importance_score, 5.0);

        let summary = parse_summary(r#"{"title": "标题", "score": "0.5"}"#).unwrap();
        assert_eq!(summary.importance_score, 1.0);
        assert_eq!(summary.summary_en, "");

        let summary = parse_summary("```json\n{\"title\": \"t\"}\n```").unwrap();
        assert_eq!(summary.importance_score, 3.0);
    }

    #[test]
    fn test_parse_summary_rejects_garbage() {
        assert!(parse_summary("not json at all").is_err());
    }

    #[tokio::test]
    async fn test_prompt_truncates_content() {
        let db = Arc::new(NewsDatabase::new_in_memory().await.unwrap());
        db.save_articles(&[NewArticle::new("hackernews", "hn-1", "Long post")
            .content("字".repeat(2000))
            .url("https://news.example.com/1")])
            .await
            .unwrap();
        let article = db.unsummarized(1).await.unwrap().remove(0);

        let provider = Arc::new(ScriptedProvider::new(vec![Ok(r#"{"title":"t","score":4}"#.to_string())]));
        let summarizer = Summarizer::new(client(provider.clone()), db);
        summarizer.summarize_article(&article).await.unwrap();

        let request = &provider.requests()[0];
        assert_eq!(request.model, "summary-model");
        assert_eq!(request.max_tokens, 800);
        assert!(request.prompt.contains(&format!("内容: {}...", "字".repeat(1500))));
        assert!(request.prompt.contains("链接: https://news.example.com/1"));
        assert!(request.system.as_deref().unwrap_or("").contains("评估重要性"));
    }

    #[tokio::test]
    async fn test_failed_articles_stay_pending() {
        let db = Arc::new(NewsDatabase::new_in_memory().await.unwrap());
        db.save_articles(&[
            NewArticle::new("arxiv", "1", "first"),
            NewArticle::new("arxiv", "2", "second"),
        ])
        .await
        .unwrap();

        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(r#"{"title":"中文","title_en":"English","summary":"s","summary_en":"e","score":4}"#.to_string()),
            Err(AIError::invalid_response("broken")),
        ]));
        let summarizer = Summarizer::new(client(provider), db.clone()).with_pause(Duration::ZERO);

        assert_eq!(summarizer.summarize_unsummarized(10).await.unwrap(), 1);

        let remaining = db.unsummarized(10).await.unwrap();
        assert_eq!(remaining.len(), 1);
        let stats = db.stats().await.unwrap();
        assert_eq!(stats.summarized_count, 1);
    }
}
