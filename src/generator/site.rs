//! Static site: index, one page per briefing, archive and a JSON index

use super::{io_error, SiteResult};
use crate::config::AppConfig;
use crate::database::{Article, Briefing, BriefingPeriod, NewsDatabase, SourceStatus};
use crate::html::{escape_html, markdown_to_html, truncate_chars};
use chrono::Utc;
use std::fmt::Write as _;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};
use walkdir::WalkDir;

const STYLE_CSS: &str = r#":root {
  --fg: #1f2328;
  --muted: #656d76;
  --accent: #0969da;
  --border: #d0d7de;
  --bg-soft: #f6f8fa;
}
* { box-sizing: border-box; }
body {
  margin: 0;
  font-family: -apple-system, "Segoe UI", "PingFang SC", "Noto Sans CJK SC", sans-serif;
  color: var(--fg);
  line-height: 1.65;
}
a { color: var(--accent); text-decoration: none; }
a:hover { text-decoration: underline; }
header, main, footer { max-width: 860px; margin: 0 auto; padding: 0 1rem; }
header { border-bottom: 1px solid var(--border); padding-top: 1.5rem; }
header h1 { margin: 0; font-size: 1.6rem; }
header p { margin: 0.25rem 0 1rem; color: var(--muted); }
nav a { margin-right: 1rem; }
section { margin: 2rem 0; }
.meta { color: var(--muted); font-size: 0.9rem; }
.briefing h2 { border-bottom: 1px solid var(--border); padding-bottom: 0.3rem; }
.lang-en { border-top: 2px dashed var(--border); margin-top: 3rem; padding-top: 1rem; }
.articles li { margin-bottom: 0.8rem; }
.score { display: inline-block; min-width: 2.5rem; color: var(--muted); }
table { border-collapse: collapse; width: 100%; }
th, td { border: 1px solid var(--border); padding: 0.35rem 0.6rem; text-align: left; }
th { background: var(--bg-soft); }
.status-success { color: #1a7f37; }
.status-error { color: #cf222e; }
.status-running { color: #9a6700; }
footer { color: var(--muted); font-size: 0.85rem; border-top: 1px solid var(--border); padding: 1rem; }
"#;

/// Values shared by every page
struct SiteContext {
    title: String,
    description: String,
    url: String,
    generated_at: String,
}

impl SiteContext {
    fn from_config(config: &AppConfig) -> Self {
        Self {
            title: config.publish.site_title.clone(),
            description: config.publish.site_description.clone(),
            url: config.publish.site_url.clone(),
            generated_at: Utc::now().format("%Y-%m-%d %H:%M UTC").to_string(),
        }
    }

    fn page(&self, page_title: &str, body: &str) -> String {
        let full_title = if page_title == self.title {
            escape_html(&self.title)
        } else {
            format!("{} | {}", escape_html(page_title), escape_html(&self.title))
        };

        format!(
            r#"<!DOCTYPE html>
<html lang="zh-CN">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<meta name="description" content="{description}">
<title>{full_title}</title>
<link rel="stylesheet" href="static/style.css">
<link rel="canonical" href="{url}">
</head>
<body>
<header>
<h1><a href="index.html">{title}</a></h1>
<p>{description}</p>
<nav><a href="index.html">首页</a><a href="archive.html">归档</a><a href="api.json">API</a></nav>
</header>
<main>
{body}
</main>
<footer>Generated at {generated_at}</footer>
</body>
</html>
"#,
            description = escape_html(&self.description),
            full_title = full_title,
            url = escape_html(&self.url),
            title = escape_html(&self.title),
            body = body,
            generated_at = escape_html(&self.generated_at),
        )
    }
}

fn period_label(period: BriefingPeriod) -> &'static str {
    match period {
        BriefingPeriod::Daily => "日报",
        BriefingPeriod::Weekly => "周报",
    }
}

fn briefing_link(briefing: &Briefing) -> String {
    format!(
        r#"<a href="{}">{}</a> <span class="meta">{} · {} · {} 篇</span>"#,
        escape_html(&briefing.page_name()),
        escape_html(&briefing.title),
        escape_html(&briefing.date),
        period_label(briefing.period),
        briefing.article_count
    )
}

fn briefing_list(briefings: &[&Briefing]) -> String {
    if briefings.is_empty() {
        return "<p class=\"meta\">暂无</p>".to_string();
    }
    let mut html = String::from("<ul>\n");
    for briefing in briefings {
        let _ = writeln!(html, "<li>{}</li>", briefing_link(briefing));
    }
    html.push_str("</ul>");
    html
}

fn article_list(articles: &[Article]) -> String {
    if articles.is_empty() {
        return "<p class=\"meta\">暂无</p>".to_string();
    }
    let mut html = String::from("<ol class=\"articles\">\n");
    for article in articles {
        let title = escape_html(article.display_title());
        let heading = match article.url.as_deref() {
            Some(url) if !url.is_empty() => format!(r#"<a href="{}">{}</a>"#, escape_html(url), title),
            _ => title,
        };
        let score = article
            .importance_score
            .map(|s| format!("{:.1}", s))
            .unwrap_or_else(|| "-".to_string());
        let _ = write!(
            html,
            r#"<li><span class="score">★{}</span>{} <span class="meta">[{}]</span>"#,
            score,
            heading,
            escape_html(&article.source)
        );
        if let Some(summary) = article.summary.as_deref().filter(|s| !s.is_empty()) {
            let _ = write!(html, "<br><span class=\"meta\">{}</span>", escape_html(&truncate_chars(summary, 200)));
        }
        html.push_str("</li>\n");
    }
    html.push_str("</ol>");
    html
}

fn status_table(statuses: &[SourceStatus]) -> String {
    let mut html = String::from(
        "<table>\n<thead><tr><th>Source</th><th>Status</th><th>Last run</th><th>Total</th></tr></thead>\n<tbody>\n",
    );
    for status in statuses {
        let last_run = status
            .last_run
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let state = status.status.as_str();
        let title = status
            .error_message
            .as_deref()
            .map(|e| format!(r#" title="{}""#, escape_html(e)))
            .unwrap_or_default();
        let _ = writeln!(
            html,
            r#"<tr><td>{}</td><td class="status-{}"{}>{}</td><td>{}</td><td>{}</td></tr>"#,
            escape_html(&status.source_name),
            state,
            title,
            state,
            last_run,
            status.total_articles
        );
    }
    html.push_str("</tbody>\n</table>");
    html
}

fn render_index(
    ctx: &SiteContext,
    briefings: &[Briefing],
    top_articles: &[Article],
    statuses: &[SourceStatus],
) -> String {
    let mut body = String::new();

    match briefings.first() {
        Some(latest) => {
            let _ = write!(
                body,
                r#"<section class="briefing">
<h2><a href="{}">{}</a></h2>
<p class="meta">{} · {} 篇文章</p>
{}
</section>
"#,
                escape_html(&latest.page_name()),
                escape_html(&latest.title),
                escape_html(&latest.date),
                latest.article_count,
                markdown_to_html(&latest.content_markdown)
            );
        }
        None => body.push_str("<section><p class=\"meta\">还没有简报。</p></section>\n"),
    }

    let recent: Vec<&Briefing> = briefings.iter().take(10).collect();
    let _ = write!(
        body,
        "<section>\n<h2>重要资讯</h2>\n{}\n</section>\n<section>\n<h2>最近简报</h2>\n{}\n</section>\n<section>\n<h2>数据源状态</h2>\n{}\n</section>\n",
        article_list(top_articles),
        briefing_list(&recent),
        status_table(statuses)
    );

    ctx.page(&ctx.title, &body)
}

fn render_briefing(ctx: &SiteContext, briefing: &Briefing) -> String {
    let mut body = format!(
        r#"<article class="briefing">
<h2>{}</h2>
<p class="meta">{} · {} · {} 篇文章</p>
<div class="lang-zh">
{}
</div>
"#,
        escape_html(&briefing.title),
        escape_html(&briefing.date),
        period_label(briefing.period),
        briefing.article_count,
        markdown_to_html(&briefing.content_markdown)
    );

    if let Some(english) = briefing.content_markdown_en.as_deref().filter(|md| !md.trim().is_empty()) {
        let title_en = briefing.title_en.as_deref().unwrap_or(&briefing.title);
        let _ = write!(
            body,
            "<div class=\"lang-en\" lang=\"en\">\n<h2>{}</h2>\n{}\n</div>\n",
            escape_html(title_en),
            markdown_to_html(english)
        );
    }
    body.push_str("</article>\n<p><a href=\"archive.html\">← 归档</a></p>\n");

    ctx.page(&briefing.title, &body)
}

fn render_archive(ctx: &SiteContext, briefings: &[Briefing]) -> String {
    let daily: Vec<&Briefing> = briefings.iter().filter(|b| b.period == BriefingPeriod::Daily).collect();
    let weekly: Vec<&Briefing> = briefings.iter().filter(|b| b.period == BriefingPeriod::Weekly).collect();

    let body = format!(
        "<section>\n<h2>日报</h2>\n{}\n</section>\n<section>\n<h2>周报</h2>\n{}\n</section>\n",
        briefing_list(&daily),
        briefing_list(&weekly)
    );
    ctx.page("归档", &body)
}

fn render_api(ctx: &SiteContext, briefings: &[Briefing]) -> SiteResult<String> {
    let latest = briefings.first();
    let api = serde_json::json!({
        "site": {
            "title": ctx.title,
            "description": ctx.description,
            "url": ctx.url,
            "generated_at": ctx.generated_at,
        },
        "latest_briefing": {
            "date": latest.map(|b| b.date.as_str()),
            "title": latest.map(|b| b.title.as_str()),
            "period": latest.map(|b| b.period.as_str()),
        },
        "briefings": briefings.iter().take(30).map(|b| serde_json::json!({
            "date": b.date,
            "period": b.period.as_str(),
            "title": b.title,
            "title_en": b.title_en,
            "article_count": b.article_count,
            "url": b.page_name(),
        })).collect::<Vec<_>>(),
    });
    Ok(serde_json::to_string_pretty(&api)?)
}

async fn write_file(path: &Path, content: &str) -> SiteResult<()> {
    fs::write(path, content).await.map_err(io_error(path))
}

/// Copy every file under `from` into `to`, keeping relative paths
async fn copy_tree(from: &Path, to: &Path) -> SiteResult<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry?;
        let Ok(relative) = entry.path().strip_prefix(from) else {
            continue;
        };
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).await.map_err(io_error(&target))?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).await.map_err(io_error(parent))?;
            }
            fs::copy(entry.path(), &target).await.map_err(io_error(&target))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Render the whole site into `config.paths.site_dir`. Returns the number of briefing pages.
pub async fn build_site(config: &AppConfig, db: &NewsDatabase) -> SiteResult<usize> {
    let site_dir = config.paths.site_dir.as_path();
    let static_out = site_dir.join("static");
    fs::create_dir_all(&static_out).await.map_err(io_error(&static_out))?;

    write_file(&static_out.join("style.css"), STYLE_CSS).await?;
    if let Some(static_dir) = config.paths.static_dir.as_deref().filter(|dir| dir.is_dir()) {
        let copied = copy_tree(static_dir, &static_out).await?;
        debug!("Copied {} static assets from {}", copied, static_dir.display());
    }

    let briefings = db.list_briefings().await?;
    let top_articles = db.top_articles(15).await?;
    let statuses = db.source_statuses().await?;
    let ctx = SiteContext::from_config(config);

    write_file(
        &site_dir.join("index.html"),
        &render_index(&ctx, &briefings, &top_articles, &statuses),
    )
    .await?;

    for briefing in &briefings {
        write_file(&site_dir.join(briefing.page_name()), &render_briefing(&ctx, briefing)).await?;
    }

    write_file(&site_dir.join("archive.html"), &render_archive(&ctx, &briefings)).await?;
    write_file(&site_dir.join("api.json"), &render_api(&ctx, &briefings)?).await?;

    info!(
        "Static site built: {} briefing pages + index + archive in {}",
        briefings.len(),
        site_dir.display()
    );
    Ok(briefings.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{NewBriefing, SourceState};

    fn ctx() -> SiteContext {
        SiteContext {
            title: "AI <Daily>".to_string(),
            description: "desc".to_string(),
            url: "https://news.example.com".to_string(),
            generated_at: "2026-10-16 08:00 UTC".to_string(),
        }
    }

    fn briefing(date: &str, period: BriefingPeriod, english: Option<&str>) -> Briefing {
        Briefing {
            id: 1,
            date: date.to_string(),
            period,
            title: format!("AI 行业日报 - {}", date),
            title_en: english.map(|_| format!("AI Daily Briefing - {}", date)),
            content_markdown: "## 今日要点\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n<script>alert(1)</script>".to_string(),
            content_markdown_en: english.map(str::to_string),
            content_html: None,
            article_count: 3,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_page_escapes_site_text() {
        let html = ctx().page("x", "<p>body</p>");
        assert!(html.contains("<title>x | AI &lt;Daily&gt;</title>"));
        assert!(html.contains("<p>body</p>"));
        assert!(html.contains("href=\"static/style.css\""));
    }

    #[test]
    fn test_briefing_page_sections() {
        let page = render_briefing(&ctx(), &briefing("2026-10-16", BriefingPeriod::Daily, Some("## Highlights")));
        assert!(page.contains("<table>"));
        assert!(!page.contains("<script>"));
        assert!(page.contains("class=\"lang-en\""));
        assert!(page.contains("AI Daily Briefing - 2026-10-16"));
        assert!(page.contains("<h2>Highlights</h2>"));

        let zh_only = render_briefing(&ctx(), &briefing("2026-10-16", BriefingPeriod::Daily, None));
        assert!(!zh_only.contains("lang-en"));
    }

    #[test]
    fn test_archive_splits_periods() {
        let briefings = vec![
            briefing("2026-10-16", BriefingPeriod::Daily, None),
            briefing("2026-10-12", BriefingPeriod::Weekly, None),
        ];
        let page = render_archive(&ctx(), &briefings);
        let daily_at = page.find("<h2>日报</h2>").unwrap();
        let weekly_at = page.find("<h2>周报</h2>").unwrap();
        let daily_link = page.find("briefing-daily-2026-10-16.html").unwrap();
        let weekly_link = page.find("briefing-weekly-2026-10-12.html").unwrap();
        assert!(daily_at < daily_link && daily_link < weekly_at && weekly_at < weekly_link);
    }

    #[test]
    fn test_api_json() {
        let briefings: Vec<Briefing> = (0..35)
            .map(|i| briefing(&format!("2026-09-{:02}", 30 - (i % 30)), BriefingPeriod::Daily, None))
            .collect();
        let api: serde_json::Value = serde_json::from_str(&render_api(&ctx(), &briefings).unwrap()).unwrap();
        assert_eq!(api["briefings"].as_array().unwrap().len(), 30);
        assert_eq!(api["latest_briefing"]["date"], "2026-09-30");
        assert_eq!(api["briefings"][0]["url"], "briefing-daily-2026-09-30.html");

        let empty: serde_json::Value = serde_json::from_str(&render_api(&ctx(), &[]).unwrap()).unwrap();
        assert!(empty["latest_briefing"]["date"].is_null());
    }

    #[tokio::test]
    async fn test_build_site_writes_every_page() {
        let dir = tempfile::tempdir().unwrap();
        let assets = dir.path().join("assets");
        std::fs::create_dir_all(assets.join("img")).unwrap();
        std::fs::write(assets.join("img/logo.svg"), "<svg/>").unwrap();

        let mut config = AppConfig::default();
        config.paths.site_dir = dir.path().join("site");
        config.paths.static_dir = Some(assets);

        let db = NewsDatabase::new_in_memory().await.unwrap();
        db.insert_briefing(&NewBriefing {
            date: "2026-10-16".to_string(),
            period: BriefingPeriod::Daily,
            title: "AI 行业日报 - 2026-10-16".to_string(),
            title_en: None,
            content_markdown: "## 今日要点".to_string(),
            content_markdown_en: None,
            content_html: None,
            article_count: 5,
        })
        .await
        .unwrap();
        db.update_source_status("arxiv", SourceState::Error, 0, Some("boom"))
            .await
            .unwrap();

        let pages = build_site(&config, &db).await.unwrap();
        assert_eq!(pages, 1);

        let site = dir.path().join("site");
        for file in [
            "index.html",
            "archive.html",
            "api.json",
            "briefing-daily-2026-10-16.html",
            "static/style.css",
            "static/img/logo.svg",
        ] {
            assert!(site.join(file).is_file(), "missing {}", file);
        }
        let index = std::fs::read_to_string(site.join("index.html")).unwrap();
        assert!(index.contains("<h2>今日要点</h2>"));
        assert!(index.contains("status-error"));
        assert!(index.contains("title=\"boom\""));
    }
}
