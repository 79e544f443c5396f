use super::{io_error, SiteResult};
use crate::database::Briefing;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Write `{period}-{date}.md` into `dir` and return its path
pub async fn save_briefing_markdown(briefing: &Briefing, dir: &Path) -> SiteResult<PathBuf> {
    fs::create_dir_all(dir).await.map_err(io_error(dir))?;
    let path = dir.join(format!("{}-{}.md", briefing.period, briefing.date));

    let content = format!(
        "# {}\n\n> 生成时间: {}\n> 文章数量: {}\n\n---\n\n{}",
        briefing.title,
        briefing.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        briefing.article_count,
        briefing.content_markdown
    );

    fs::write(&path, content).await.map_err(io_error(&path))?;
    info!("Saved briefing to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::BriefingPeriod;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_save_briefing_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("briefings");
        let briefing = Briefing {
            id: 1,
            date: "2026-10-16".to_string(),
            period: BriefingPeriod::Weekly,
            title: "AI 行业周报 - 2026-10-16".to_string(),
            title_en: None,
            content_markdown: "## 本周要点\n\n- 一".to_string(),
            content_markdown_en: None,
            content_html: None,
            article_count: 12,
            created_at: Utc.with_ymd_and_hms(2026, 10, 16, 0, 30, 0).unwrap(),
        };

        let path = save_briefing_markdown(&briefing, &out).await.unwrap();
        assert_eq!(path, out.join("weekly-2026-10-16.md"));

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# AI 行业周报 - 2026-10-16\n\n> 生成时间: 2026-10-16 00:30:00 UTC\n"));
        assert!(written.contains("> 文章数量: 12\n\n---\n\n## 本周要点"));
    }
}
