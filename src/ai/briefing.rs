//! Daily and weekly briefing generation

use crate::ai::{AIResult, LlmClient};
use crate::database::{Article, Briefing, BriefingPeriod, NewBriefing, NewsDatabase};
use crate::html::truncate_chars;
use chrono::{DateTime, Duration, Utc};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, warn};

const BRIEFING_SYSTEM_PROMPT: &str = r#"你是一位资深AI行业分析师，负责编写每日AI行业简报。

要求：
1. 使用中文撰写
2. 按以下分类组织内容：
   - 🔥 重要动态（重大发布、突破性进展）
   - 📝 论文亮点（值得关注的新论文）
   - 🛠️ 开源项目（热门新项目、重要版本更新）
   - 💬 社区热议（Reddit、Twitter上的热门讨论）
   - 📊 排行榜变化（Benchmark变动、新纪录）
   - 📰 行业新闻（厂商博客更新、行业动态）
3. 每个分类下的条目应包含：标题、简短摘要（1-2句话）、来源链接
4. 如果某个分类没有内容，可以跳过
5. 开头写一段总结（3-5句话），概述今日AI领域最重要的进展
6. 使用Markdown格式

请生成一篇专业、信息密度高、易于阅读的AI行业简报。"#;

const BRIEFING_SYSTEM_PROMPT_EN: &str = r#"You are a senior AI industry analyst responsible for writing AI industry briefings.

Requirements:
1. Write in English
2. Organize content by the following categories:
   - 🔥 Key Highlights (major releases, breakthroughs)
   - 📝 Notable Papers (papers worth following)
   - 🛠️ Open Source (trending new projects, major version updates)
   - 💬 Community Buzz (hot discussions on Reddit, Twitter)
   - 📊 Leaderboard Changes (benchmark shifts, new records)
   - 📰 Industry News (vendor blog updates, industry developments)
3. Each item should include: title, brief summary (1-2 sentences), source link
4. Skip categories that have no content
5. Start with a summary paragraph (3-5 sentences) highlighting the most important developments
6. Use Markdown format

Generate a professional, information-dense, and easy-to-read AI industry briefing."#;

const BRIEFING_TEMPERATURE: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Language {
    Chinese,
    English,
}

/// Window, size and wording of one briefing period
struct PeriodProfile {
    window: Duration,
    article_limit: i64,
    max_tokens: u32,
    span_zh: &'static str,
    name_zh: &'static str,
    span_en: &'static str,
    name_en: &'static str,
    title_zh: &'static str,
    title_en: &'static str,
}

impl PeriodProfile {
    fn of(period: BriefingPeriod) -> Self {
        match period {
            BriefingPeriod::Daily => Self {
                window: Duration::hours(24),
                article_limit: 20,
                max_tokens: 4096,
                span_zh: "24小时",
                name_zh: "每日",
                span_en: "24 hours",
                name_en: "daily",
                title_zh: "AI 行业日报",
                title_en: "AI Daily Briefing",
            },
            BriefingPeriod::Weekly => Self {
                window: Duration::days(7),
                article_limit: 30,
                max_tokens: 8000,
                span_zh: "一周",
                name_zh: "每周",
                span_en: "one week",
                name_en: "weekly",
                title_zh: "AI 行业周报",
                title_en: "AI Weekly Briefing",
            },
        }
    }
}

pub struct BriefingGenerator {
    llm: Arc<LlmClient>,
    db: Arc<NewsDatabase>,
    /// Pause between the Chinese and the English call
    pause: std::time::Duration,
}

impl BriefingGenerator {
    pub fn new(llm: Arc<LlmClient>, db: Arc<NewsDatabase>) -> Self {
        Self {
            llm,
            db,
            pause: std::time::Duration::from_secs(3),
        }
    }

    pub fn with_pause(mut self, pause: std::time::Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Generate (or return the existing) briefing for the UTC date of `target`.
    /// Returns `None` when no judged articles fall inside the window.
    pub async fn generate(&self, period: BriefingPeriod, target: DateTime<Utc>) -> AIResult<Option<Briefing>> {
        let date = briefing_date(target);

        if let Some(existing) = self.db.find_briefing(&date, period).await? {
            info!("{} briefing for {} already exists, skipping", period, date);
            return Ok(Some(existing));
        }

        let profile = PeriodProfile::of(period);
        let articles = self
            .db
            .briefing_candidates(target - profile.window, profile.article_limit)
            .await?;

        if articles.is_empty() {
            warn!("No articles found for {} briefing on {}", period, date);
            return Ok(None);
        }

        info!("Generating {} briefing for {} with {} articles", period, date, articles.len());
        let model = self.llm.config().briefing_model.clone();

        let prompt_zh = format!(
            "以下是过去{}收集到的AI行业重要资讯（按重要性排序）：\n\n{}\n\n请基于以上资讯，生成一篇{}简报。日期：{}",
            profile.span_zh,
            format_articles(&articles, Language::Chinese),
            profile.name_zh,
            date
        );
        let content_zh = self
            .llm
            .call(
                &prompt_zh,
                Some(BRIEFING_SYSTEM_PROMPT),
                Some(&model),
                Some(BRIEFING_TEMPERATURE),
                Some(profile.max_tokens),
            )
            .await?;

        if !self.pause.is_zero() {
            tokio::time::sleep(self.pause).await;
        }

        info!("Generating English {} briefing for {}", period, date);
        let prompt_en = format!(
            "Below are important AI industry updates collected over the past {} (sorted by importance):\n\n{}\n\nBased on the above, generate a {} briefing. Date: {}",
            profile.span_en,
            format_articles(&articles, Language::English),
            profile.name_en,
            date
        );
        let content_en = self
            .llm
            .call(
                &prompt_en,
                Some(BRIEFING_SYSTEM_PROMPT_EN),
                Some(&model),
                Some(BRIEFING_TEMPERATURE),
                Some(profile.max_tokens),
            )
            .await?;

        let briefing = self
            .db
            .insert_briefing(&NewBriefing {
                title: format!("{} - {}", profile.title_zh, date),
                title_en: Some(format!("{} - {}", profile.title_en, date)),
                date,
                period,
                content_markdown: content_zh,
                content_markdown_en: Some(content_en),
                content_html: None,
                article_count: articles.len() as i64,
            })
            .await?;

        info!("{} briefing generated for {}", period, briefing.date);
        Ok(Some(briefing))
    }
}

/// `YYYY-MM-DD` of `target` in UTC, the key of a briefing
pub fn briefing_date(target: DateTime<Utc>) -> String {
    target.format("%Y-%m-%d").to_string()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn format_articles(articles: &[Article], lang: Language) -> String {
    let mut blocks = Vec::with_capacity(articles.len());
    for (i, article) in articles.iter().enumerate() {
        let (title, summary, labels) = match lang {
            Language::Chinese => (
                non_empty(&article.ai_title).unwrap_or(&article.title),
                non_empty(&article.summary).or(non_empty(&article.content)),
                ("摘要", "链接", "重要性"),
            ),
            Language::English => (
                non_empty(&article.ai_title_en)
                    .or(non_empty(&article.ai_title))
                    .unwrap_or(&article.title),
                non_empty(&article.summary_en)
                    .or(non_empty(&article.summary))
                    .or(non_empty(&article.content)),
                ("Summary", "Link", "Importance"),
            ),
        };

        let summary = truncate_chars(summary.unwrap_or(""), 200);
        let score = article.importance_score.unwrap_or(3.0);

        let mut block = String::new();
        let _ = write!(
            block,
            "{}. [{}] {}\n   {}: {}\n   {}: {}\n   {}: {}/5",
            i + 1,
            article.source,
            title,
            labels.0,
            summary,
            labels.1,
            article.url.as_deref().unwrap_or(""),
            labels.2,
            score
        );
        blocks.push(block);
    }
    blocks.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::ScriptedProvider;
    use crate::ai::AIError;
    use crate::config::LlmConfig;
    use crate::database::{ArticleSummary, JudgmentOutcome, NewArticle};

    async fn seeded_db() -> Arc<NewsDatabase> {
        let db = Arc::new(NewsDatabase::new_in_memory().await.unwrap());
        db.save_articles(&[
            NewArticle::new("arxiv", "1", "[Arxiv] Paper one").url("https://arxiv.org/abs/1"),
            NewArticle::new("github", "2", "[GitHub Trending] repo").content("raw readme"),
        ])
        .await
        .unwrap();

        for article in db.pending_judgment(10).await.unwrap() {
            if article.source == "arxiv" {
                db.apply_summary(
                    article.id,
                    &ArticleSummary {
                        ai_title: "论文一".to_string(),
                        ai_title_en: "Paper One".to_string(),
                        summary: "中文摘要".to_string(),
                        summary_en: "English summary".to_string(),
                        importance_score: 5.0,
                    },
                )
                .await
                .unwrap();
            } else {
                db.apply_judgment(article.id, &JudgmentOutcome::Selected { ai_title: "仓库".to_string() })
                    .await
                    .unwrap();
            }
        }
        db
    }

    fn generator(db: Arc<NewsDatabase>, provider: Arc<ScriptedProvider>) -> BriefingGenerator {
        let config = LlmConfig {
            min_interval_secs: 0.0,
            max_retries: 1,
            briefing_model: "brief-model".to_string(),
            ..LlmConfig::default()
        };
        BriefingGenerator::new(Arc::new(LlmClient::new(provider, config)), db).with_pause(std::time::Duration::ZERO)
    }

    #[tokio::test]
    async fn test_generates_bilingual_daily_briefing() {
        let db = seeded_db().await;
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok("# 今日要闻".to_string()),
            Ok("# Today".to_string()),
        ]));
        let now = Utc::now();
        let briefing = generator(db.clone(), provider.clone())
            .generate(BriefingPeriod::Daily, now)
            .await
            .unwrap()
            .unwrap();

        let date = briefing_date(now);
        assert_eq!(briefing.title, format!("AI 行业日报 - {}", date));
        assert_eq!(briefing.title_en.as_deref(), Some(format!("AI Daily Briefing - {}", date).as_str()));
        assert_eq!(briefing.content_markdown, "# 今日要闻");
        assert_eq!(briefing.content_markdown_en.as_deref(), Some("# Today"));
        assert_eq!(briefing.article_count, 2);

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].model, "brief-model");
        assert_eq!(requests[0].max_tokens, 4096);
        // Highest score first, zh fields in the zh prompt
        assert!(requests[0].prompt.contains("1. [arxiv] 论文一\n   摘要: 中文摘要"));
        assert!(requests[0].prompt.contains("重要性: 5/5"));
        assert!(requests[0].prompt.contains("2. [github] 仓库\n   摘要: raw readme"));
        assert!(requests[0].prompt.contains("重要性: 3/5"));
        // en prompt falls back from en fields to zh fields
        assert!(requests[1].prompt.contains("1. [arxiv] Paper One\n   Summary: English summary"));
        assert!(requests[1].prompt.contains("2. [github] 仓库"));
        assert!(requests[1].system.as_deref().unwrap_or("").starts_with("You are a senior"));
    }

    #[tokio::test]
    async fn test_existing_briefing_is_returned() {
        let db = seeded_db().await;
        let now = Utc::now();
        let first = generator(db.clone(), Arc::new(ScriptedProvider::new(vec![Ok("zh".into()), Ok("en".into())])))
            .generate(BriefingPeriod::Weekly, now)
            .await
            .unwrap()
            .unwrap();

        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let second = generator(db, provider.clone())
            .generate(BriefingPeriod::Weekly, now)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first.id, second.id);
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_no_candidates_yields_none() {
        let db = Arc::new(NewsDatabase::new_in_memory().await.unwrap());
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let result = generator(db, provider.clone())
            .generate(BriefingPeriod::Daily, Utc::now())
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_llm_failure_stores_nothing() {
        let db = seeded_db().await;
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok("zh".to_string()),
            Err(AIError::auth_failure("Scripted")),
        ]));
        let result = generator(db.clone(), provider).generate(BriefingPeriod::Daily, Utc::now()).await;
        assert!(result.is_err());
        assert!(db.list_briefings().await.unwrap().is_empty());
    }

    fn stored(title: &str) -> Article {
        Article {
            id: 1,
            source: "reddit".to_string(),
            source_id: Some("reddit-1".to_string()),
            title: title.to_string(),
            ai_title: None,
            ai_title_en: None,
            url: Some("https://reddit.com/r/x/1".to_string()),
            content: None,
            summary: None,
            summary_en: None,
            category: Some("discussion".to_string()),
            importance_score: None,
            author: None,
            tags: None,
            extra_data: None,
            published_at: None,
            fetched_at: Utc::now(),
            ignored: false,
            summarized: false,
        }
    }

    #[test]
    fn test_format_articles_fallback_chain() {
        let full = Article {
            ai_title: Some("中文标题".to_string()),
            ai_title_en: Some("English title".to_string()),
            summary: Some("中文摘要".to_string()),
            summary_en: Some("English summary".to_string()),
            importance_score: Some(4.5),
            ..stored("[r/x] full")
        };
        let zh_only = Article {
            ai_title: Some("只有中文".to_string()),
            ai_title_en: Some(String::new()),
            summary: Some("只有中文摘要".to_string()),
            ..stored("[r/x] zh only")
        };
        let raw = Article {
            ai_title: Some(String::new()),
            content: Some("raw body".to_string()),
            ..stored("[r/x] raw")
        };
        let articles = vec![full, zh_only, raw];

        let zh = format_articles(&articles, Language::Chinese);
        assert!(zh.contains("1. [reddit] 中文标题\n   摘要: 中文摘要\n   链接: https://reddit.com/r/x/1\n   重要性: 4.5/5"));
        assert!(zh.contains("2. [reddit] 只有中文\n   摘要: 只有中文摘要"));
        assert!(zh.contains("3. [reddit] [r/x] raw\n   摘要: raw body\n   链接: https://reddit.com/r/x/1\n   重要性: 3/5"));

        let en = format_articles(&articles, Language::English);
        assert!(en.contains("1. [reddit] English title\n   Summary: English summary"));
        assert!(en.contains("2. [reddit] 只有中文\n   Summary: 只有中文摘要"));
        assert!(en.contains("3. [reddit] [r/x] raw\n   Summary: raw body\n   Link: https://reddit.com/r/x/1\n   Importance: 3/5"));
    }

    #[test]
    fn test_briefing_date_is_utc() {
        use chrono::TimeZone;
        assert_eq!(briefing_date(Utc.with_ymd_and_hms(2026, 10, 16, 23, 30, 0).unwrap()), "2026-10-16");
        assert_eq!(briefing_date(Utc.with_ymd_and_hms(2026, 10, 17, 0, 5, 0).unwrap()), "2026-10-17");
    }
}
