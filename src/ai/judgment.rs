//! Importance judgment and Chinese headline translation in one LLM pass

use crate::ai::{extract_json, AIError, AIResult, LlmClient};
use crate::database::{Article, JudgmentOutcome, NewsDatabase};
use crate::html::take_chars;
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

const JUDGMENT_PROMPT_HEADER: &str = "你是AI资讯编辑。请处理以下今日资讯标题：\n\n";

const JUDGMENT_PROMPT_FOOTER: &str = r#"
任务：
1. 判断每条是否重要（AI/LLM相关的研究、模型发布、行业动态）
2. 翻译标题为中文（简洁准确）
3. 输出JSON数组：

[
  {"index": 0, "important": true, "title_zh": "中文标题", "summary": "一句话摘要（可选）"},
  ...
]

只输出JSON，不要其他内容。
"#;

/// Outcome counts of one judgment batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JudgmentReport {
    pub selected: usize,
    pub ignored: usize,
    /// Articles the reply did not mention
    pub untouched: usize,
    /// The reply was unusable and every article was selected as-is
    pub fallback: bool,
}

pub struct JudgmentService {
    llm: Arc<LlmClient>,
    db: Arc<NewsDatabase>,
}

impl JudgmentService {
    pub fn new(llm: Arc<LlmClient>, db: Arc<NewsDatabase>) -> Self {
        Self { llm, db }
    }

    /// Judge a batch of articles with a single LLM call and store the outcome
    pub async fn process_articles(&self, articles: &[Article]) -> AIResult<JudgmentReport> {
        if articles.is_empty() {
            return Ok(JudgmentReport::default());
        }

        let prompt = build_prompt(articles);
        let decisions = match self.request_decisions(&prompt).await {
            Ok(decisions) => decisions,
            Err(e) => {
                warn!("Judgment failed, keeping all {} articles: {}", articles.len(), e);
                for article in articles {
                    let outcome = JudgmentOutcome::Selected {
                        ai_title: article.title.clone(),
                    };
                    self.db.apply_judgment(article.id, &outcome).await?;
                }
                return Ok(JudgmentReport {
                    selected: articles.len(),
                    fallback: true,
                    ..JudgmentReport::default()
                });
            }
        };

        let mut report = JudgmentReport::default();
        let mut touched = vec![false; articles.len()];

        for (index, outcome) in interpret_decisions(&decisions, articles) {
            if touched[index] {
                continue;
            }
            touched[index] = true;
            let article = &articles[index];

            match &outcome {
                JudgmentOutcome::Selected { ai_title } => {
                    report.selected += 1;
                    debug!("[+] {} -> {}", take_chars(&article.title, 50), take_chars(ai_title, 30));
                }
                JudgmentOutcome::Ignored => {
                    report.ignored += 1;
                    debug!("[-] {} (not important)", take_chars(&article.title, 50));
                }
            }
            self.db.apply_judgment(article.id, &outcome).await?;
        }

        report.untouched = touched.iter().filter(|t| !**t).count();
        info!(
            "Judgment selected {}/{} articles ({} ignored)",
            report.selected,
            articles.len(),
            report.ignored
        );
        Ok(report)
    }

    async fn request_decisions(&self, prompt: &str) -> AIResult<Vec<Value>> {
        let reply = self.llm.call(prompt, None, None, None, None).await?;
        let parsed: Value = serde_json::from_str(extract_json(&reply))?;
        match parsed {
            Value::Array(items) => Ok(items),
            other => Err(AIError::invalid_response(format!(
                "expected a JSON array of decisions, got {}",
                other
            ))),
        }
    }
}

fn build_prompt(articles: &[Article]) -> String {
    let mut prompt = String::from(JUDGMENT_PROMPT_HEADER);
    for (i, article) in articles.iter().enumerate() {
        let _ = writeln!(prompt, "{}. [{}] {}", i, article.source, take_chars(&article.title, 150));
    }
    prompt.push_str(JUDGMENT_PROMPT_FOOTER);
    prompt
}

/// Map reply entries to (article index, outcome), skipping malformed or out-of-range entries
fn interpret_decisions(decisions: &[Value], articles: &[Article]) -> Vec<(usize, JudgmentOutcome)> {
    decisions
        .iter()
        .filter_map(|decision| {
            let index = decision.get("index")?.as_u64()? as usize;
            let article = articles.get(index)?;
            let important = decision.get("important").and_then(Value::as_bool).unwrap_or(false);

            let outcome = if important {
                let ai_title = decision
                    .get("title_zh")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .unwrap_or(&article.title)
                    .to_string();
                JudgmentOutcome::Selected { ai_title }
            } else {
                JudgmentOutcome::Ignored
            };
            Some((index, outcome))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::ScriptedProvider;
    use crate::config::LlmConfig;
    use crate::database::NewArticle;

    async fn setup(replies: Vec<AIResult<String>>) -> (JudgmentService, Arc<NewsDatabase>, Vec<Article>) {
        let db = Arc::new(NewsDatabase::new_in_memory().await.unwrap());
        db.save_articles(&[
            NewArticle::new("arxiv", "a", "[Arxiv] Scaling laws revisited"),
            NewArticle::new("reddit", "b", "[r/LocalLLaMA] My cat photo"),
            NewArticle::new("github", "c", "[GitHub Trending] org/repo ⭐100"),
        ])
        .await
        .unwrap();
        let mut articles = db.pending_judgment(30).await.unwrap();
        articles.sort_by_key(|a| a.id);

        let config = LlmConfig {
            min_interval_secs: 0.0,
            max_retries: 1,
            ..LlmConfig::default()
        };
        let llm = Arc::new(LlmClient::new(Arc::new(ScriptedProvider::new(replies)), config));
        (JudgmentService::new(llm, db.clone()), db, articles)
    }

    #[test]
    fn test_prompt_lists_articles() {
        let article = Article {
            id: 1,
            source: "arxiv".to_string(),
            source_id: None,
            title: "x".repeat(200),
            ai_title: None,
            ai_title_en: None,
            url: None,
            content: None,
            summary: None,
            summary_en: None,
            category: None,
            importance_score: None,
            author: None,
            tags: None,
            extra_data: None,
            published_at: None,
            fetched_at: chrono::Utc::now(),
            ignored: false,
            summarized: false,
        };
        let prompt = build_prompt(&[article]);
        assert!(prompt.contains(&format!("0. [arxiv] {}\n", "x".repeat(150))));
        assert!(prompt.contains("只输出JSON"));
    }

    #[tokio::test]
    async fn test_applies_decisions() {
        let reply = r#"```json
[
  {"index": 0, "important": true, "title_zh": "重新审视缩放定律"},
  {"index": 1, "important": false},
  {"index": 7, "important": true, "title_zh": "越界"}
]
```"#;
        let (service, db, articles) = setup(vec![Ok(reply.to_string())]).await;

        let report = service.process_articles(&articles).await.unwrap();
        assert_eq!(
            report,
            JudgmentReport {
                selected: 1,
                ignored: 1,
                untouched: 1,
                fallback: false
            }
        );

        let first = db.get_article(articles[0].id).await.unwrap().unwrap();
        assert_eq!(first.ai_title.as_deref(), Some("重新审视缩放定律"));
        let second = db.get_article(articles[1].id).await.unwrap().unwrap();
        assert!(second.ignored);
        let third = db.get_article(articles[2].id).await.unwrap().unwrap();
        assert!(third.ai_title.is_none());
        assert!(!third.ignored);
    }

    #[tokio::test]
    async fn test_missing_title_falls_back_to_original() {
        let reply = r#"[{"index": 2, "important": true}]"#;
        let (service, db, articles) = setup(vec![Ok(reply.to_string())]).await;

        service.process_articles(&articles).await.unwrap();
        let stored = db.get_article(articles[2].id).await.unwrap().unwrap();
        assert_eq!(stored.ai_title.as_deref(), Some(articles[2].title.as_str()));
    }

    #[tokio::test]
    async fn test_unparseable_reply_selects_everything() {
        let (service, db, articles) = setup(vec![Ok("I cannot help with that".to_string())]).await;

        let report = service.process_articles(&articles).await.unwrap();
        assert!(report.fallback);
        assert_eq!(report.selected, 3);
        assert!(db.pending_judgment(30).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_llm_error_selects_everything() {
        let (service, db, articles) = setup(vec![Err(AIError::auth_failure("Scripted"))]).await;

        let report = service.process_articles(&articles).await.unwrap();
        assert!(report.fallback);
        for article in &articles {
            let stored = db.get_article(article.id).await.unwrap().unwrap();
            assert_eq!(stored.ai_title.as_deref(), Some(article.title.as_str()));
        }
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_call() {
        let (service, _db, _articles) = setup(vec![]).await;
        assert_eq!(service.process_articles(&[]).await.unwrap(), JudgmentReport::default());
    }
}
